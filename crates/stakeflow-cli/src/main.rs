//! stakeflow command-line tool: local ledger maintenance, DEX quote check
//! and the supported-chain table.

use alloy_primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stakeflow_common::{
    config::supported_chains,
    utils::format_timestamp,
    StakeflowConfig,
};
use stakeflow_ledger::{ConfiguredLedgerFactory, Ledger, LedgerFactory};
use stakeflow_orchestrator::{DexBridge, HttpDexAggregator, QuoteRequest};
use std::{io::Write, path::PathBuf, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stakeflow", author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, env = "STAKEFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect or maintain the local activity ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerCommand,
    },

    /// Ask the DEX aggregator for a price
    Quote {
        /// Token to sell
        #[arg(long)]
        from: Address,

        /// Token to buy
        #[arg(long)]
        to: Address,

        /// Amount to sell, in base units of the sold token
        #[arg(long)]
        amount: U256,

        /// Defaults to the configured target chain
        #[arg(long)]
        chain_id: Option<u64>,

        /// Defaults to the configured slippage
        #[arg(long)]
        slippage_bps: Option<u16>,
    },

    /// List chains the wallet can be asked to add
    Chains,
}

#[derive(Subcommand, Debug)]
enum LedgerCommand {
    /// Print recorded events, newest first
    List {
        /// Only events for this subject (case-insensitive)
        #[arg(long)]
        subject: Option<String>,

        /// Only the most recent N events
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Totals over stake events
    Summary,

    /// Per-subject aggregate balances
    Balances,

    /// Write the raw CSV log to a file, or stdout
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Delete the activity log and every aggregate balance
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Rebuild aggregate balances from the activity log
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = StakeflowConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.log_level);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Ledger { action } => run_ledger(&config, action, &mut out).await,
        Command::Quote {
            from,
            to,
            amount,
            chain_id,
            slippage_bps,
        } => {
            let chain_id = chain_id
                .or(config.chain.chain_id)
                .context("No chain id: pass --chain-id or set chain.chain_id")?;
            let request = QuoteRequest {
                chain_id,
                from_token: from,
                to_token: to,
                amount_in: amount,
                slippage_bps: slippage_bps.unwrap_or(config.dex.slippage_bps),
            };
            run_quote(&config, &request, &mut out).await
        }
        Command::Chains => print_chains(&mut out),
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: Failed to set global tracing subscriber: {}", e);
    }
}

async fn run_ledger(config: &StakeflowConfig, action: LedgerCommand, out: &mut impl Write) -> Result<()> {
    let ledger = ConfiguredLedgerFactory::new(config.clone())
        .open_ledger()
        .await
        .context("Failed to open ledger")?;

    let result = ledger_action(&ledger, action, out).await;
    ledger.close().await.context("Failed to close ledger")?;
    result
}

async fn ledger_action(ledger: &Ledger, action: LedgerCommand, out: &mut impl Write) -> Result<()> {
    match action {
        LedgerCommand::List { subject, limit } => {
            let events = match subject {
                Some(subject) => ledger.store().records_for_subject(&subject).await?,
                None => ledger.store().load_all().await?,
            };
            for event in events.iter().take(limit.unwrap_or(usize::MAX)) {
                writeln!(
                    out,
                    "{}  {:<12} {:<28} {:>14} {:<6} {:<6} {}",
                    format_timestamp(&event.timestamp),
                    event.subject_name,
                    event.pool_name,
                    format!("{:+}", event.amount),
                    event.token_symbol,
                    event.apy,
                    event.transaction_hash.as_deref().unwrap_or("-")
                )?;
            }
        }
        LedgerCommand::Summary => {
            let summary = ledger.store().summarize().await?;
            writeln!(out, "Stake records:   {}", summary.total_records)?;
            writeln!(out, "Total staked:    {}", summary.total_amount)?;
            writeln!(out, "Unique subjects: {}", summary.unique_subjects)?;
            match summary.last_event_at {
                Some(at) => writeln!(out, "Last activity:   {}", format_timestamp(&at))?,
                None => writeln!(out, "Last activity:   never")?,
            }
        }
        LedgerCommand::Balances => {
            let balances = ledger.balances().get_all_balances().await?;
            if balances.is_empty() {
                writeln!(out, "No balances recorded")?;
            }
            for (subject, balance) in balances {
                writeln!(out, "{:<16} {} {}", subject, balance.total_staked, balance.token_symbol)?;
            }
        }
        LedgerCommand::Export { out: path } => {
            let csv = ledger.store().export_csv().await?;
            match path {
                Some(path) => {
                    tokio::fs::write(&path, csv)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Ledger exported to {}", path.display());
                }
                None => out.write_all(csv.as_bytes())?,
            }
        }
        LedgerCommand::Clear { yes } => {
            if !yes {
                bail!("Refusing to clear the ledger without --yes");
            }
            ledger.clear_all().await?;
            writeln!(out, "Ledger cleared")?;
        }
        LedgerCommand::Reconcile => {
            let report = ledger.reconcile_from_ledger().await?;
            for subject in &report.updated {
                writeln!(out, "updated   {}", subject)?;
            }
            writeln!(out, "{} updated, {} unchanged", report.updated.len(), report.unchanged)?;
        }
    }
    Ok(())
}

async fn run_quote(config: &StakeflowConfig, request: &QuoteRequest, out: &mut impl Write) -> Result<()> {
    let aggregator = HttpDexAggregator::from_config(&config.dex).context("Failed to build DEX client")?;
    let bridge = DexBridge::new(Arc::new(aggregator), config.dex.estimate_ratio_bps);

    let quote = bridge.get_quote(request).await;
    if quote.is_estimate_only {
        warn!(
            "Aggregator unavailable ({}); showing a local estimate",
            quote.fallback_reason.as_deref().unwrap_or("unknown")
        );
    }
    writeln!(out, "{}", serde_json::to_string_pretty(&quote)?)?;
    if quote.is_estimate_only {
        writeln!(out, "ESTIMATE ONLY: not executable")?;
    }
    Ok(())
}

fn print_chains(out: &mut impl Write) -> Result<()> {
    for (chain_id, params) in supported_chains() {
        writeln!(
            out,
            "{:>6}  {:<8} {:<14} {:<6} {}",
            chain_id,
            params.chain_id,
            params.chain_name,
            params.native_currency.symbol,
            params.rpc_urls.join(",")
        )?;
    }
    Ok(())
}
