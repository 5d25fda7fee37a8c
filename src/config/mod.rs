mod file_config;

pub use file_config::{CronConfig, DiscordConfig, FileConfig, ResticConfig};

use crate::jobs::{CommandTemplate, JobKind, JobSpec, JobStep, CHECK_SUBSET_BUCKETS};
use crate::notifications::{DEFAULT_CHARACTER_LIMIT, WRAPPER_OVERHEAD};
use anyhow::{bail, Context, Result};
use std::collections::HashMap;

pub const DEFAULT_BACKUP_CRON: &str = "0 */6 * * *";
pub const DEFAULT_CHECK_CRON: &str = "0 7 * * 1";
pub const DEFAULT_PRUNE_CRON: &str = "0 1 2 * *";
pub const DEFAULT_RESTIC_BINARY: &str = "restic";
pub const DEFAULT_SHELL: &str = "sh";
pub const DEFAULT_BACKUP_PATH: &str = "/data";
pub const DEFAULT_RCLONE_ARGS: &str =
    "serve restic --stdio --b2-hard-delete --drive-use-trash=false --fast-list --transfers=32";

/// Settings read from environment variables.
///
/// Empty values are treated as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub backup_cron: Option<String>,
    pub check_cron: Option<String>,
    pub prune_cron: Option<String>,
    pub backup_args: Option<String>,
    pub forget_args: Option<String>,
    pub check_args: Option<String>,
    pub prune_args: Option<String>,
    pub discord_webhook_id: Option<String>,
    pub discord_webhook_token: Option<String>,
    pub restic_binary: Option<String>,
    pub backup_path: Option<String>,
    pub rclone_args: Option<String>,
    pub unlock_on_failure: Option<String>,
    pub notify_char_limit: Option<String>,
}

impl EnvConfig {
    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            backup_cron: get("BACKUP_CRON"),
            check_cron: get("CHECK_CRON"),
            prune_cron: get("PRUNE_CRON"),
            backup_args: get("RESTIC_JOB_ARGS"),
            forget_args: get("RESTIC_FORGET_ARGS"),
            check_args: get("RESTIC_CHECK_ARGS"),
            prune_args: get("RESTIC_PRUNE_ARGS"),
            discord_webhook_id: get("DISCORD_WEBHOOK_ID"),
            discord_webhook_token: get("DISCORD_WEBHOOK_TOKEN"),
            restic_binary: get("RESTIC_BINARY"),
            backup_path: get("BACKUP_PATH"),
            rclone_args: get("RCLONE_ARGS"),
            unlock_on_failure: get("RESTIC_UNLOCK_ON_FAILURE"),
            notify_char_limit: get("NOTIFY_CHAR_LIMIT"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backup_cron: String,
    pub check_cron: String,
    pub prune_cron: String,
    pub restic: ResticSettings,

    /// `None` when either webhook credential is missing.
    pub discord: Option<DiscordSettings>,
    pub character_limit: usize,

    /// Environment overrides for every command.
    pub command_env: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResticSettings {
    pub binary: String,
    pub shell: String,
    pub backup_path: String,
    pub rclone_args: String,
    pub backup_args: String,
    pub forget_args: String,
    pub check_args: String,
    pub prune_args: String,
    pub unlock_on_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordSettings {
    pub webhook_id: String,
    pub webhook_token: String,
}

impl AppConfig {
    /// Resolve configuration from the environment and an optional TOML file.
    /// File values override environment values where present.
    pub fn resolve(env: &EnvConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let cron = file.cron.unwrap_or_default();
        let restic = file.restic.unwrap_or_default();
        let discord = file.discord.unwrap_or_default();

        let backup_cron = pick(cron.backup, &env.backup_cron, DEFAULT_BACKUP_CRON);
        let check_cron = pick(cron.check, &env.check_cron, DEFAULT_CHECK_CRON);
        let prune_cron = pick(cron.prune, &env.prune_cron, DEFAULT_PRUNE_CRON);

        let unlock_on_failure = match restic.unlock_on_failure {
            Some(value) => value,
            None => match env.unlock_on_failure.as_deref() {
                Some(value) => parse_bool(value).with_context(|| {
                    format!("RESTIC_UNLOCK_ON_FAILURE is not a boolean: {}", value)
                })?,
                None => false,
            },
        };

        let restic = ResticSettings {
            binary: pick(restic.binary, &env.restic_binary, DEFAULT_RESTIC_BINARY),
            shell: restic.shell.unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            backup_path: pick(restic.backup_path, &env.backup_path, DEFAULT_BACKUP_PATH),
            rclone_args: pick(restic.rclone_args, &env.rclone_args, DEFAULT_RCLONE_ARGS),
            backup_args: pick(restic.backup_args, &env.backup_args, ""),
            forget_args: pick(restic.forget_args, &env.forget_args, ""),
            check_args: pick(restic.check_args, &env.check_args, ""),
            prune_args: pick(restic.prune_args, &env.prune_args, ""),
            unlock_on_failure,
        };

        let character_limit = match discord.character_limit {
            Some(limit) => limit,
            None => match env.notify_char_limit.as_deref() {
                Some(value) => value
                    .trim()
                    .parse()
                    .with_context(|| format!("NOTIFY_CHAR_LIMIT is not a number: {}", value))?,
                None => DEFAULT_CHARACTER_LIMIT,
            },
        };
        if character_limit <= WRAPPER_OVERHEAD {
            bail!(
                "Notification character limit must be greater than {}, got {}",
                WRAPPER_OVERHEAD,
                character_limit
            );
        }

        let webhook_id = discord
            .webhook_id
            .filter(|v| !v.is_empty())
            .or_else(|| env.discord_webhook_id.clone());
        let webhook_token = discord
            .webhook_token
            .filter(|v| !v.is_empty())
            .or_else(|| env.discord_webhook_token.clone());
        let discord = match (webhook_id, webhook_token) {
            (Some(webhook_id), Some(webhook_token)) => Some(DiscordSettings {
                webhook_id,
                webhook_token,
            }),
            _ => None,
        };

        Ok(Self {
            backup_cron,
            check_cron,
            prune_cron,
            restic,
            discord,
            character_limit,
            command_env: file.env,
        })
    }

    /// Build the three job definitions from the resolved settings.
    pub fn job_specs(&self) -> Result<Vec<JobSpec>> {
        let restic = &self.restic;
        let binary = restic.binary.as_str();
        let transport = restic.transport_option()?;
        let backup_path = shlex::try_quote(&restic.backup_path)
            .with_context(|| format!("Backup path cannot be quoted: {:?}", restic.backup_path))?;
        let subset = format!("--read-data-subset={{week}}/{}", CHECK_SUBSET_BUCKETS);

        let cleanup = restic
            .unlock_on_failure
            .then(|| CommandTemplate::new(join_args(&[binary, "unlock", &transport])));

        let backup = JobSpec {
            kind: JobKind::Backup,
            steps: vec![
                JobStep::new(
                    "backup",
                    CommandTemplate::new(join_args(&[
                        binary,
                        "backup",
                        &backup_path,
                        &restic.backup_args,
                        &transport,
                    ])),
                    "Backup successful",
                ),
                JobStep::new(
                    "forget",
                    CommandTemplate::new(join_args(&[
                        binary,
                        "forget",
                        &restic.forget_args,
                        &transport,
                    ])),
                    "Forget successful",
                ),
            ],
            cadence: self.backup_cron.clone(),
            cleanup: cleanup.clone(),
        };

        let check = JobSpec {
            kind: JobKind::Check,
            steps: vec![JobStep::new(
                "check",
                CommandTemplate::new(join_args(&[
                    binary,
                    "check",
                    &subset,
                    &restic.check_args,
                    &transport,
                ])),
                "Check successful",
            )],
            cadence: self.check_cron.clone(),
            cleanup: cleanup.clone(),
        };

        let prune = JobSpec {
            kind: JobKind::Prune,
            steps: vec![JobStep::new(
                "prune",
                CommandTemplate::new(join_args(&[
                    binary,
                    "prune",
                    &restic.prune_args,
                    &transport,
                ])),
                "Prune successful",
            )],
            cadence: self.prune_cron.clone(),
            cleanup,
        };

        Ok(vec![backup, check, prune])
    }
}

impl ResticSettings {
    /// Prefix for collected command output: the binary's file name.
    pub fn output_label(&self) -> String {
        std::path::Path::new(&self.binary)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.binary.clone())
    }

    /// The `-o rclone.args=...` option, or an empty string when no rclone args are set.
    pub fn transport_option(&self) -> Result<String> {
        if self.rclone_args.trim().is_empty() {
            return Ok(String::new());
        }
        let quoted = shlex::try_quote(&self.rclone_args)
            .with_context(|| format!("rclone args cannot be quoted: {:?}", self.rclone_args))?;
        Ok(format!("-o rclone.args={}", quoted))
    }
}

fn pick(file_value: Option<String>, env_value: &Option<String>, default: &str) -> String {
    file_value
        .or_else(|| env_value.clone())
        .unwrap_or_else(|| default.to_string())
}

fn join_args(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected true/false"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::RenderContext;

    fn env_from(pairs: &[(&str, &str)]) -> EnvConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(|key| map.get(key).cloned())
    }

    fn rendered_steps(spec: &JobSpec) -> Vec<String> {
        spec.steps
            .iter()
            .map(|s| s.command.render(&RenderContext { week: 9 }))
            .collect()
    }

    #[test]
    fn test_defaults_with_empty_environment() {
        let config = AppConfig::resolve(&EnvConfig::default(), None).unwrap();

        assert_eq!(config.backup_cron, DEFAULT_BACKUP_CRON);
        assert_eq!(config.check_cron, DEFAULT_CHECK_CRON);
        assert_eq!(config.prune_cron, DEFAULT_PRUNE_CRON);
        assert_eq!(config.restic.binary, "restic");
        assert_eq!(config.restic.backup_path, "/data");
        assert!(!config.restic.unlock_on_failure);
        assert_eq!(config.character_limit, 1900);
        assert!(config.discord.is_none());
        assert!(config.command_env.is_empty());
    }

    #[test]
    fn test_environment_values_are_used() {
        let env = env_from(&[
            ("BACKUP_CRON", "15 2 * * *"),
            ("RESTIC_JOB_ARGS", "--exclude-caches"),
            ("DISCORD_WEBHOOK_ID", "1"),
            ("DISCORD_WEBHOOK_TOKEN", "tok"),
            ("NOTIFY_CHAR_LIMIT", "500"),
            ("RESTIC_UNLOCK_ON_FAILURE", "yes"),
        ]);
        let config = AppConfig::resolve(&env, None).unwrap();

        assert_eq!(config.backup_cron, "15 2 * * *");
        assert_eq!(config.restic.backup_args, "--exclude-caches");
        assert_eq!(
            config.discord,
            Some(DiscordSettings {
                webhook_id: "1".to_string(),
                webhook_token: "tok".to_string(),
            })
        );
        assert_eq!(config.character_limit, 500);
        assert!(config.restic.unlock_on_failure);
    }

    #[test]
    fn test_empty_environment_values_fall_back_to_defaults() {
        let env = env_from(&[("BACKUP_CRON", ""), ("DISCORD_WEBHOOK_ID", " ")]);
        let config = AppConfig::resolve(&env, None).unwrap();
        assert_eq!(config.backup_cron, DEFAULT_BACKUP_CRON);
        assert!(config.discord.is_none());
    }

    #[test]
    fn test_discord_requires_both_credentials() {
        let env = env_from(&[("DISCORD_WEBHOOK_ID", "1")]);
        assert!(AppConfig::resolve(&env, None).unwrap().discord.is_none());

        let env = env_from(&[("DISCORD_WEBHOOK_TOKEN", "tok")]);
        assert!(AppConfig::resolve(&env, None).unwrap().discord.is_none());
    }

    #[test]
    fn test_file_overrides_environment() {
        let env = env_from(&[("CHECK_CRON", "0 5 * * 2"), ("RESTIC_CHECK_ARGS", "--env")]);
        let file = FileConfig {
            cron: Some(CronConfig {
                check: Some("0 6 * * 3".to_string()),
                ..Default::default()
            }),
            restic: Some(ResticConfig {
                check_args: Some("--file".to_string()),
                shell: Some("bash".to_string()),
                ..Default::default()
            }),
            env: HashMap::from([("RESTIC_PASSWORD".to_string(), "pw".to_string())]),
            ..Default::default()
        };

        let config = AppConfig::resolve(&env, Some(file)).unwrap();

        assert_eq!(config.check_cron, "0 6 * * 3");
        assert_eq!(config.restic.check_args, "--file");
        assert_eq!(config.restic.shell, "bash");
        assert_eq!(config.command_env.get("RESTIC_PASSWORD").unwrap(), "pw");
    }

    #[test]
    fn test_cadences_are_carried_unparsed() {
        let env = env_from(&[("PRUNE_CRON", "every tuesday")]);
        let config = AppConfig::resolve(&env, None).unwrap();
        let specs = config.job_specs().unwrap();
        assert_eq!(specs[2].cadence, "every tuesday");
    }

    #[test]
    fn test_invalid_character_limit_is_rejected() {
        let env = env_from(&[("NOTIFY_CHAR_LIMIT", "lots")]);
        assert!(AppConfig::resolve(&env, None).is_err());

        let env = env_from(&[("NOTIFY_CHAR_LIMIT", "6")]);
        assert!(AppConfig::resolve(&env, None).is_err());
    }

    #[test]
    fn test_invalid_unlock_flag_is_rejected() {
        let env = env_from(&[("RESTIC_UNLOCK_ON_FAILURE", "maybe")]);
        assert!(AppConfig::resolve(&env, None).is_err());
    }

    #[test]
    fn test_default_job_commands() {
        let config = AppConfig::resolve(&EnvConfig::default(), None).unwrap();
        let specs = config.job_specs().unwrap();
        let transport = format!("-o rclone.args='{}'", DEFAULT_RCLONE_ARGS);

        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].kind, JobKind::Backup);
        assert_eq!(
            rendered_steps(&specs[0]),
            vec![
                format!("restic backup /data {}", transport),
                format!("restic forget {}", transport),
            ]
        );
        assert_eq!(
            rendered_steps(&specs[1]),
            vec![format!("restic check --read-data-subset=9/52 {}", transport)]
        );
        assert_eq!(
            rendered_steps(&specs[2]),
            vec![format!("restic prune {}", transport)]
        );
        assert!(specs.iter().all(|s| s.cleanup.is_none()));
        assert_eq!(specs[2].cadence, DEFAULT_PRUNE_CRON);
    }

    #[test]
    fn test_extra_args_and_unlock_cleanup() {
        let env = env_from(&[
            ("RESTIC_FORGET_ARGS", "--keep-daily 7 --prune"),
            ("RESTIC_PRUNE_ARGS", "--max-unused 5%"),
            ("RCLONE_ARGS", ""),
            ("RESTIC_UNLOCK_ON_FAILURE", "true"),
            ("BACKUP_PATH", "/srv/my data"),
        ]);
        let config = AppConfig::resolve(&env, None).unwrap();
        let specs = config.job_specs().unwrap();

        // Empty RCLONE_ARGS falls back to the default, so the option is present
        assert!(rendered_steps(&specs[0])[0].starts_with("restic backup '/srv/my data' -o"));
        assert!(rendered_steps(&specs[0])[1].starts_with("restic forget --keep-daily 7 --prune -o"));
        assert!(rendered_steps(&specs[2])[0].starts_with("restic prune --max-unused 5% -o"));
        for spec in &specs {
            let cleanup = spec.cleanup.as_ref().unwrap();
            assert!(cleanup.as_str().starts_with("restic unlock -o rclone.args="));
        }
    }

    #[test]
    fn test_transport_option_omitted_without_rclone_args() {
        let config = AppConfig::resolve(&EnvConfig::default(), None).unwrap();
        let mut restic = config.restic.clone();
        restic.rclone_args = String::new();
        assert_eq!(restic.transport_option().unwrap(), "");
    }

    #[test]
    fn test_output_label_is_binary_file_name() {
        let env = env_from(&[("RESTIC_BINARY", "/usr/local/bin/restic")]);
        let config = AppConfig::resolve(&env, None).unwrap();
        assert_eq!(config.restic.output_label(), "restic");
    }
}
