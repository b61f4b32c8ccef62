//! Vaultkeep CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vaultkeep_cli::{load_config, run, Cli};
use vaultkeep_core::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let default_level = match cli.verbose {
        0 => format!("vaultkeep={}", config.logging.level),
        1 => "vaultkeep=info".to_string(),
        _ => "vaultkeep=debug".to_string(),
    };
    let filter = env::get_var(env::vars::VAULTKEEP_LOG)
        .map(EnvFilter::new)
        .unwrap_or_else(|| {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_level))
        });

    // Logs go to stderr so exports written to stdout stay clean
    let json = config.logging.json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    run(cli, config).await
}
