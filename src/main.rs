use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table};
use configuration::Config;
use database::{DbRepository, connect, run_migrations};
use executor::{Discrepancy, ReconciliationReport, reconcile};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// The main entry point for the Folio portfolio tracker.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file, if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = configuration::load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(&config);

    match cli.command {
        Commands::Serve => web_server::run_server(config).await,
        Commands::Migrate => handle_migrate(&config).await,
        Commands::Audit(args) => handle_audit(args, &config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A simulated brokerage ledger: cash, holdings, and an append-only trade log.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Replay transaction logs and compare them with stored balances and holdings.
    Audit(AuditArgs),
}

#[derive(Parser)]
struct AuditArgs {
    /// Audit a single account. Every account is audited when omitted.
    #[arg(long)]
    user: Option<Uuid>,
}

/// Console logging filtered by `RUST_LOG` (default `info`), teed to a daily
/// rolling file when `logging.directory` is set.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.logging.directory {
        Some(directory) => {
            let file_appender = tracing_appender::rolling::daily(directory, "folio.log");
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
            None
        }
    }
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_migrate(config: &Config) -> anyhow::Result<()> {
    let db_pool = connect(&config.database).await?;
    run_migrations(&db_pool).await?;
    tracing::info!("Migrations applied.");
    Ok(())
}

async fn handle_audit(args: AuditArgs, config: &Config) -> anyhow::Result<()> {
    let db_pool = connect(&config.database).await?;
    let repo = DbRepository::new(db_pool);

    let accounts = match args.user {
        Some(user_id) => vec![user_id],
        None => repo.account_ids().await?,
    };

    let mut reports = Vec::with_capacity(accounts.len());
    for user_id in accounts {
        let report = reconcile(&repo, user_id)
            .await
            .with_context(|| format!("auditing account {user_id}"))?;
        reports.push(report);
    }

    let inconsistent = reports.iter().filter(|r| !r.is_consistent()).count();
    println!("{}", render_reports(&reports));
    println!(
        "Audited {} account(s): {} consistent, {} with discrepancies.",
        reports.len(),
        reports.len() - inconsistent,
        inconsistent
    );

    if inconsistent > 0 {
        anyhow::bail!("{inconsistent} account(s) disagree with their transaction log");
    }
    Ok(())
}

fn describe(discrepancy: &Discrepancy) -> String {
    match discrepancy {
        Discrepancy::Balance { stored, replayed } => {
            format!("balance: stored {stored}, log says {replayed}")
        }
        Discrepancy::Holding { symbol, stored, replayed } => {
            format!("{symbol}: stored {stored}, log says {replayed}")
        }
    }
}

fn render_reports(reports: &[ReconciliationReport]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Account", "Log entries", "Replayed balance", "Positions", "Status"]);

    for report in reports {
        let status = if report.is_consistent() {
            Cell::new("OK").fg(Color::Green)
        } else {
            let details: Vec<String> = report.discrepancies.iter().map(describe).collect();
            Cell::new(details.join("\n")).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(report.user_id),
            Cell::new(report.entries_replayed),
            Cell::new(report.replayed.balance),
            Cell::new(report.replayed.holdings.len()),
            status,
        ]);
    }
    table
}
