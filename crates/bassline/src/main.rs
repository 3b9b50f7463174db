//! The `bassline` server binary.

use std::path::PathBuf;

use anyhow::Context;
use bassline::App;
use bassline_config::{ConfigLoader, DEFAULT_ENV_PREFIX};
use bassline_session::UserDirectory;
use clap::Parser;
use tracing::info;

/// Bassline admin server.
#[derive(Debug, Parser)]
#[command(name = "bassline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, env = "BASSLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(long)]
    http_addr: Option<String>,

    /// Seed demo users and resources into the in-memory store
    #[arg(long)]
    seed_demo: bool,

    /// Print a single-use sign-in nonce for USERNAME before serving
    #[arg(long, value_name = "USERNAME")]
    issue_nonce: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new().with_defaults();
    if let Some(path) = &cli.config {
        loader = loader
            .with_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
    }
    let mut config = loader
        .with_dotenv()?
        .with_env_prefix(DEFAULT_ENV_PREFIX)
        .load()
        .context("invalid configuration")?;

    if let Some(addr) = cli.http_addr {
        config.server.http_addr = addr;
        config.validate().context("invalid --http-addr")?;
    }

    bassline_telemetry::init_telemetry(&bassline::telemetry_config(&config))
        .context("initializing telemetry")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        site = %config.site.site_name,
        "starting bassline"
    );

    let app = App::new(config);
    if cli.seed_demo {
        bassline::seed::seed_demo(app.store(), app.directory());
    }
    if let Some(username) = &cli.issue_nonce {
        let nonce = app
            .directory()
            .issue_nonce(username)
            .await
            .with_context(|| format!("issuing nonce for {username}"))?;
        println!("/login/attempt?auth=nonce&nonce={nonce}");
    }

    app.server().run().await?;
    Ok(())
}
