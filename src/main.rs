use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use restic_runner::app;
use restic_runner::config::{AppConfig, EnvConfig, FileConfig};
use restic_runner::jobs::JobRunner;
use restic_runner::notifications::{DiscordWebhook, Notifier};
use restic_runner::process::ShellExecutor;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[clap(version, about = "Runs restic backup, check and prune jobs")]
struct CliArgs {
    /// One of `backup`, `check`, `prune` or `cron`.
    #[clap(default_value = "backup")]
    pub mode: String,

    /// Path to TOML configuration file. Values in the file override environment variables.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

fn build_runner(config_path: Option<&Path>) -> Result<JobRunner> {
    let file_config = match config_path {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&EnvConfig::from_env(), file_config)?;

    let notifier = Arc::new(build_notifier(&config)?);
    let executor = Arc::new(ShellExecutor::new(
        config.restic.shell.clone(),
        config.restic.output_label(),
    ));
    Ok(JobRunner::new(
        config.job_specs()?,
        executor,
        notifier,
        config.command_env.clone(),
    ))
}

fn build_notifier(config: &AppConfig) -> Result<Notifier> {
    match &config.discord {
        Some(discord) => {
            let webhook = DiscordWebhook::new(&discord.webhook_id, &discord.webhook_token)?;
            Ok(Notifier::new(Arc::new(webhook), config.character_limit))
        }
        None => {
            warn!("DISCORD_WEBHOOK_ID or DISCORD_WEBHOOK_TOKEN not set, notifications disabled");
            Ok(Notifier::disabled())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    app::dispatch(&cli_args.mode, || build_runner(cli_args.config.as_deref())).await
}
