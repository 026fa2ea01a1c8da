use anyhow::{Context, Result};
use clap::Parser;
use config_agent::queue::abort_on_saturation;
use config_agent::transport::StorePollingFactory;
use config_agent::{Agent, AgentConfig, Subscription};
use config_publish::PublishModule;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "config-agent")]
#[command(about = "Delivers published configuration to local files and reload hooks")]
#[command(version)]
struct Args {
    /// Config file path; overrides the single-subscription flags
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Selectors string, single configuration
    #[arg(long, default_value = "")]
    sel: String,

    /// Optional selectors string, single configuration
    #[arg(long, default_value = "")]
    optsel: String,

    /// Group, single configuration
    #[arg(long)]
    group: Option<String>,

    /// Key, single configuration
    #[arg(long)]
    key: Option<String>,

    /// Output file path, single configuration
    #[arg(long)]
    output: Option<PathBuf>,

    /// Hook executable run after every update, single configuration
    #[arg(long)]
    hook: Option<PathBuf>,

    /// Artifact store DSN
    #[arg(long)]
    database_url: Option<String>,

    /// Pause between store polls (e.g. "5s")
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Log level used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn single_subscription(&self) -> Option<Subscription> {
        if self.config.is_some() {
            return None;
        }
        Some(Subscription {
            selectors: self.sel.clone(),
            optional_selectors: self.optsel.clone(),
            group: self.group.clone().unwrap_or_default(),
            key: self.key.clone().unwrap_or_default(),
            output: self.output.clone().unwrap_or_default(),
            hook: self.hook.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut config = AgentConfig::load(args.config.as_deref(), args.single_subscription())?;
    if let Some(url) = &args.database_url {
        config.source.database_url = url.clone();
    }
    if let Some(interval) = args.poll_interval {
        config.source.poll_interval = interval;
    }
    config.validate().context("invalid agent configuration")?;

    let store = PublishModule::init(&config.source.store_config(), false).await?;
    let factory = StorePollingFactory::new(store.feed(), config.source.poll_interval);

    info!(subscriptions = config.config_list.len(), "starting config agent");
    let agent = Agent::start(&config, &factory, abort_on_saturation()).await?;

    wait_for_shutdown_signal().await?;
    info!("shutting down");
    agent.shutdown().await
}

fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
