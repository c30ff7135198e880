use clap::Parser;
use mockredis::config::{Config, Overrides};
use mockredis::{server, Error};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a YAML, JSON or TOML configuration file
    #[arg(short, long, env = "MOCKREDIS_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load(args.config.as_deref(), &args.overrides)?;
    info!(?config, "configuration loaded");

    server::run(config).await
}
