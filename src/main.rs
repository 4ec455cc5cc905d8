mod config;
mod core;
mod llm;
mod marketdata;
mod news;
mod persistence;
mod pipeline;
mod secondary;
mod strategy;
mod universe;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crate::config::config::AppCfg;
use crate::core::retry::TokioSleeper;
use marketdata::bse::BseQuoteClient;
use pipeline::run::TradingRun;
use reqwest::Client;
use tracing::{error, info, info_span};
use tracing_subscriber::EnvFilter;
use universe::Universe;
use universe::scrips::{load_scrip_table, resolve_scrips};

#[derive(Parser)]
#[command(name = "sentitrade")]
#[command(about = "News-sentiment paper trader", long_about = None)]
struct Cli {
    /// Config file (YAML); env vars override with `SECTION__KEY`
    #[arg(short, long, default_value = "config.yml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score today's news and place simulated orders (default)
    Run,

    /// Resolve exchange scrip codes for the stock universe
    ResolveScrips,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = AppCfg::load(&cli.config)?;

    let span = info_span!(
        "Run",
        pid = %std::process::id(),
        version = env!("CARGO_PKG_VERSION"),
    );
    let _enter = span.enter();

    info!("Starting up");

    let client = Client::builder()
        .user_agent(cfg.http.user_agent.clone())
        .pool_idle_timeout(cfg.http.pool_idle_timeout)
        .pool_max_idle_per_host(cfg.http.pool_max_idle_per_host)
        .timeout(cfg.http.timeout)
        .build()
        .context("building http client")?;

    let res = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => trade(&cfg, client).await,
        Commands::ResolveScrips => refresh_scrips(&cfg, client).await,
    };

    if let Err(e) = &res {
        error!(error = ?e, "run aborted");
    }
    info!("Exit");
    res
}

async fn trade(cfg: &AppCfg, client: Client) -> Result<()> {
    let run = TradingRun::from_cfg(cfg, client)?;
    let portfolio_path = run.store.path().display().to_string();
    let report = run.run().await?;

    info!(
        articles = report.articles_fetched,
        scored = report.articles_scored,
        stocks = report.stocks_scored,
        orders = report.transactions.len(),
        balance = %report.balance,
        pnl = %report.pnl,
        portfolio = %portfolio_path,
        "Run complete"
    );
    Ok(())
}

async fn refresh_scrips(cfg: &AppCfg, client: Client) -> Result<()> {
    let mut universe = Universe::load(&cfg.files.universe)?;
    let table = load_scrip_table(&cfg.files.scrip_codes)?;
    let quotes = BseQuoteClient::new(cfg.quotes.clone(), client);

    let resolved = resolve_scrips(&mut universe, &table, &quotes, &TokioSleeper).await?;
    universe.save(&cfg.files.universe)?;

    info!(resolved, total = universe.len(), "scrip codes refreshed");
    Ok(())
}
