use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config_publish::{
    AddConfigurationRequest, Config, PublishContext, PublishModule, UpdateConfigurationRequest,
};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "config-publisher")]
#[command(about = "Publish versioned configuration to the artifact store")]
#[command(version)]
struct Cli {
    /// Store config file (TOML); CONFIG_PUBLISH_* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store DSN, overrides the config file
    #[arg(long)]
    database_url: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations
    Migrate,

    /// Create a configuration and publish its first version
    Add {
        #[arg(long)]
        app: String,
        #[arg(long)]
        env: String,
        #[arg(long)]
        dc: String,
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        key: String,
        #[arg(long, default_value = "general")]
        content_type: String,
        /// File holding the configuration value
        #[arg(long)]
        file: PathBuf,
    },

    /// Replace a configuration's content and publish a new version
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long, default_value = "general")]
        content_type: String,
        #[arg(long)]
        file: PathBuf,
    },

    /// Print a configuration row
    Show {
        #[arg(long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    let run_migrations = matches!(cli.command, Command::Migrate);
    let module = PublishModule::init(&config, run_migrations).await?;
    let client = module.client();

    match cli.command {
        Command::Migrate => {
            info!("store is up to date");
        }
        Command::Add {
            app,
            env,
            dc,
            namespace,
            key,
            content_type,
            file,
        } => {
            let receipt = client
                .add_configuration(AddConfigurationRequest {
                    context: PublishContext::new(app, env, dc),
                    namespace,
                    key,
                    content_type,
                    content: read_content(&file)?,
                })
                .await?;
            println!(
                "config_id={} version={} artifact_id={}",
                receipt.config_id, receipt.version, receipt.artifact_id
            );
        }
        Command::Update {
            id,
            content_type,
            file,
        } => {
            let receipt = client
                .update_configuration(UpdateConfigurationRequest {
                    config_id: id,
                    content_type,
                    content: read_content(&file)?,
                })
                .await?;
            println!(
                "config_id={} version={} artifact_id={}",
                receipt.config_id, receipt.version, receipt.artifact_id
            );
        }
        Command::Show { id } => {
            let entry = client.get_configuration(id).await?;
            println!("config_id:    {}", entry.config_id);
            println!(
                "scope:        {}/{}/{}/{}/{}",
                entry.context.app, entry.context.env, entry.context.dc, entry.namespace, entry.key
            );
            println!("content_type: {}", entry.content_type);
            println!("version:      {}", entry.version);
            println!("updated_at:   {}", entry.updated_at);
            println!("content:      {} bytes", entry.content.len());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment
        .merge(Env::prefixed("CONFIG_PUBLISH_"))
        .extract()
        .context("invalid publish store configuration")
}

fn read_content(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
