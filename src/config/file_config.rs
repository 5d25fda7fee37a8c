use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub cron: Option<CronConfig>,
    pub restic: Option<ResticConfig>,
    pub discord: Option<DiscordConfig>,

    /// Extra environment variables passed to every command.
    pub env: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CronConfig {
    pub backup: Option<String>,
    pub check: Option<String>,
    pub prune: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ResticConfig {
    pub binary: Option<String>,
    pub shell: Option<String>,
    pub backup_path: Option<String>,
    pub rclone_args: Option<String>,
    pub backup_args: Option<String>,
    pub forget_args: Option<String>,
    pub check_args: Option<String>,
    pub prune_args: Option<String>,
    pub unlock_on_failure: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhook_id: Option<String>,
    pub webhook_token: Option<String>,
    pub character_limit: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
