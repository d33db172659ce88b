use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod chart;
mod cli;
mod cluster;
mod error;
mod registry;
mod settings;
mod wait;

use cli::pull_secret::PullSecretArgs;
use settings::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy the internal registry if missing and wait until it is ready
    Ensure,
    /// Create or update an image pull secret for a registry
    PullSecret(PullSecretArgs),
    /// Print the pull secret name derived from a registry URL
    SecretName {
        /// Registry URL (empty means the public registry)
        #[arg(default_value = "")]
        url: String,
    },
    /// Print the fully qualified reference of a configured image
    ImageUrl {
        /// Image name from the configuration
        image: String,
        /// Leave the tag off
        #[arg(long)]
        no_tag: bool,
    },
    /// Check configuration for errors and unused options
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Ensure => {
            let settings = Settings::new()?;
            let cancel = CancellationToken::new();

            let token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling");
                    token.cancel();
                }
            });

            cli::ensure::ensure_registry(&settings, cancel).await?;
        }
        Commands::PullSecret(args) => {
            // Only a configured registry needs the settings
            let settings = match args.registry {
                Some(_) => Some(Settings::new()?),
                None => None,
            };
            cli::pull_secret::create_pull_secret(args, settings.as_ref()).await?;
        }
        Commands::SecretName { url } => cli::lookup::print_secret_name(url),
        Commands::ImageUrl { image, no_tag } => {
            let settings = Settings::new()?;
            cli::lookup::print_image_url(&settings, image, !no_tag)?;
        }
        Commands::CheckConfig => cli::lookup::check_config()?,
    }

    Ok(())
}
