use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use dropkick::adapters;
use dropkick::config::AppConfig;
use dropkick::outcome::OutcomeSink;
use dropkick::roster;
use dropkick::runner::CampaignRunner;
use dropkick::session::ResourceManager;

#[derive(Parser)]
#[command(name = "dropkick", version, about = "Multi-account restock purchasing bot")]
struct Cli {
    /// Path to the accounts sheet (CSV export: Email,Password,Card,Address,URL)
    #[arg(short, long)]
    accounts: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let file_appender = tracing_appender::rolling::daily("logs", "dropkick.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dropkick=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    // Startup failures exit non-zero; once the batch starts, individual
    // account and target failures are reported through logs and
    // notifications only.
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let accounts = roster::load_accounts(&cli.accounts)
        .with_context(|| format!("Failed to read accounts file {}", cli.accounts.display()))?;
    if accounts.is_empty() {
        bail!("Accounts file {} contains no accounts", cli.accounts.display());
    }

    let adapter = adapters::for_site(&config.site).context("Failed to select site adapter")?;
    let provider = Arc::new(
        ResourceManager::new(config.browser.clone(), &config.proxy)
            .context("Failed to initialize browser resources")?,
    );
    let sink = Arc::new(
        OutcomeSink::from_config(&config.order_log, &config.notifications)
            .context("Failed to initialize order log")?,
    );

    info!(
        site = %config.site,
        accounts = accounts.len(),
        pool_width = config.monitor.pool_width,
        "Starting campaign"
    );

    let runner = CampaignRunner::new(provider, adapter, sink, config.monitor.clone());
    let records = runner.run(&accounts).await;

    let purchased = records.iter().filter(|r| r.status.is_purchased()).count();
    info!(
        records = records.len(),
        purchased, "Campaign finished"
    );
    Ok(())
}
