use anyhow::Result;
use clap::Parser;
use claat_update::cli::{run, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment (CLAAT_ACCESS_TOKEN may live in .env)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "claat-update exited with error");
    }
    result
}
