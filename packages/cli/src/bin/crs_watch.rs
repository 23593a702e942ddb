use clap::Parser;
use crs_cli::{run, Args};
use crs_config::SyncConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = SyncConfig::from_env()?;
    args.apply_to(&mut config)?;

    run(args, config).await
}
