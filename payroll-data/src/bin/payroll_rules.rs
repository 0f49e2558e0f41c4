use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use payroll_core::db::{DbConfig, InMemoryRepositoryFactory, RepositoryRegistry, SQLITE_BACKEND};
use payroll_core::{
    DeductionBreakdown, DeductionEngine, RuleParameters, TaxKind, TaxRuleRepository, WorkerPay,
};
use payroll_data::{LoadMode, RuleVersionLoader};
use payroll_db_sqlite::factory::database_url;
use payroll_db_sqlite::{SqliteRepositoryFactory, SqliteRuleRepository};
use rust_decimal::Decimal;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Manage statutory deduction rules and compute payroll deductions.
#[derive(Parser, Debug)]
#[command(name = "payroll-rules")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Storage backend for rule lookups (`sqlite`, `memory`)
    #[arg(short, long, global = true, default_value = SQLITE_BACKEND)]
    backend: String,

    /// SQLite database URL or path (e.g. sqlite:payroll.db?mode=rwc)
    #[arg(short, long, global = true, default_value = "sqlite:payroll.db?mode=rwc")]
    database: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load rule versions from a CSV file (one row per bracket or tier).
    Load {
        /// Path to the rules CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Run database migrations before loading data
        #[arg(short, long, default_value_t = false)]
        migrate: bool,

        /// Run seed files from the specified directory after migrations
        #[arg(short, long)]
        seeds: Option<PathBuf>,

        /// Close open-ended predecessors of each loaded version
        #[arg(long, default_value_t = false)]
        supersede: bool,
    },

    /// Compute the deduction breakdown for one gross salary.
    Calculate {
        /// Gross salary for the pay period
        #[arg(short, long)]
        gross: Decimal,

        /// Date whose rules apply (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Insurance premiums paid in the period, for insurance relief
        #[arg(short, long, default_value = "0")]
        premiums: Decimal,
    },

    /// Compute deductions for every worker in a CSV file
    /// (columns: worker_id, gross_salary, insurance_premiums).
    Batch {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long)]
        date: NaiveDate,
    },

    /// List every version of a rule kind, newest first.
    History {
        /// PAYE, NSSF_TIER1, NSSF_TIER2, SHIF or HOUSING_LEVY
        #[arg(short, long, value_parser = parse_kind)]
        kind: TaxKind,
    },
}

fn parse_kind(s: &str) -> Result<TaxKind, String> {
    TaxKind::parse(&s.to_ascii_uppercase()).ok_or_else(|| {
        let known: Vec<&str> = TaxKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown tax kind '{s}'; expected one of {}", known.join(", "))
    })
}

// ─── tracing ─────────────────────────────────────────────────────────────────

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let db_config = DbConfig {
        backend: cli.backend,
        connection_string: cli.database,
    };

    match cli.command {
        Command::Load {
            file,
            migrate,
            seeds,
            supersede,
        } => {
            ensure_persistent_backend(&db_config.backend)?;
            load(&db_config.connection_string, file, migrate, seeds, supersede).await
        }
        Command::Calculate {
            gross,
            date,
            premiums,
        } => {
            let engine = DeductionEngine::new(open_repository(&db_config).await?);
            let breakdown = engine
                .calculate_with_premiums(gross, date, premiums)
                .await
                .with_context(|| format!("Failed to calculate deductions for {gross} on {date}"))?;
            print_breakdown(&breakdown);
            Ok(())
        }
        Command::Batch { file, date } => {
            let workers = read_workers(&file)?;
            let engine = DeductionEngine::new(open_repository(&db_config).await?);
            let run = engine
                .calculate_batch(date, &workers)
                .await
                .with_context(|| format!("Failed to resolve rules for {date}"))?;

            for item in &run.items {
                match &item.outcome {
                    Ok(b) => println!(
                        "{:<16} gross {:>12}  deductions {:>12}  net {:>12}",
                        item.worker_id, b.gross_salary, b.total_deductions, b.net_pay
                    ),
                    Err(err) => println!("{:<16} FAILED: {err}", item.worker_id),
                }
            }
            println!();
            println!(
                "{} workers, {} failed. Gross {}, deductions {}, net {}",
                run.summary.worker_count,
                run.summary.failed_count,
                run.summary.total_gross,
                run.summary.total_deductions,
                run.summary.total_net_pay
            );
            Ok(())
        }
        Command::History { kind } => {
            let repo = open_repository(&db_config).await?;
            let versions = repo
                .list_versions(kind)
                .await
                .with_context(|| format!("Failed to list {kind} versions"))?;

            if versions.is_empty() {
                println!("No {kind} versions stored.");
            }
            for v in versions {
                let to = v
                    .effective_to
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "open".to_string());
                let status = if v.is_active { "active" } else { "inactive" };
                println!(
                    "#{:<4} {} .. {:<10} {:<8} {}",
                    v.id,
                    v.effective_from,
                    to,
                    status,
                    describe(&v.parameters)
                );
            }
            Ok(())
        }
    }
}

// ─── commands ────────────────────────────────────────────────────────────────

async fn open_repository(config: &DbConfig) -> Result<Box<dyn TaxRuleRepository>> {
    let registry = RepositoryRegistry::new()
        .with(Box::new(SqliteRepositoryFactory))
        .with(Box::new(InMemoryRepositoryFactory));

    debug!("connecting to {} backend", config.backend);
    registry
        .create(config)
        .await
        .with_context(|| format!("Failed to open {} backend", config.backend))
}

/// `load` migrates, seeds and writes through SQLite; loading into any other
/// backend would be lost when the process exits.
fn ensure_persistent_backend(backend: &str) -> Result<()> {
    if backend != SQLITE_BACKEND {
        bail!("`load` requires the sqlite backend, got --backend {backend}");
    }
    Ok(())
}

async fn load(
    database: &str,
    file: PathBuf,
    migrate: bool,
    seeds: Option<PathBuf>,
    supersede: bool,
) -> Result<()> {
    let repo = SqliteRuleRepository::new(&database_url(database))
        .await
        .with_context(|| format!("Failed to connect to database: {}", database))?;

    if migrate {
        println!("Running migrations...");
        repo.run_migrations()
            .await
            .context("Failed to run migrations")?;
        println!("Migrations complete.");
    }

    if let Some(seeds_dir) = &seeds {
        println!("Running seeds from: {}", seeds_dir.display());
        repo.run_seeds(seeds_dir)
            .await
            .with_context(|| format!("Failed to run seeds from: {}", seeds_dir.display()))?;
        println!("Seeds complete.");
    }

    println!("Loading rule versions from: {}", file.display());

    let reader =
        File::open(&file).with_context(|| format!("Failed to open: {}", file.display()))?;
    let records = RuleVersionLoader::parse(reader)
        .with_context(|| format!("Failed to parse CSV: {}", file.display()))?;

    println!("Parsed {} rows from CSV", records.len());

    let mode = if supersede {
        LoadMode::Supersede
    } else {
        LoadMode::Append
    };
    let report = RuleVersionLoader::load(&repo, &records, mode)
        .await
        .context("Failed to load rule versions into database")?;

    println!(
        "Loaded {} rule versions ({} already present, {} superseded).",
        report.inserted, report.skipped, report.closed
    );

    Ok(())
}

fn read_workers(path: &Path) -> Result<Vec<WorkerPay>> {
    let file = File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);
    reader
        .deserialize()
        .collect::<Result<Vec<WorkerPay>, _>>()
        .with_context(|| format!("Failed to parse workers CSV: {}", path.display()))
}

// ─── output ──────────────────────────────────────────────────────────────────

fn print_breakdown(b: &DeductionBreakdown) {
    let line = |label: &str, amount: Decimal| println!("  {label:<22}{amount:>14}");

    println!("Deductions under rules in force on {}", b.as_of_date);
    line("Gross salary", b.gross_salary);
    line("NSSF tier I", b.pension_tier1);
    line("NSSF tier II", b.pension_tier2);
    line("Taxable income", b.taxable_income);
    line("PAYE", b.income_tax);
    if b.insurance_relief > Decimal::ZERO {
        line("  insurance relief", b.insurance_relief);
    }
    line("SHIF", b.health_levy);
    line("Housing levy", b.housing_levy);
    line("Total deductions", b.total_deductions);
    line("Net pay", b.net_pay);

    let versions: Vec<String> = b
        .rule_versions_used
        .iter()
        .map(|v| format!("{}#{} ({})", v.kind, v.id, v.effective_from))
        .collect();
    println!("Rule versions: {}", versions.join(", "));
}

fn describe(parameters: &RuleParameters) -> String {
    match parameters {
        RuleParameters::Graduated(p) => format!(
            "{} brackets, personal relief {}",
            p.brackets.len(),
            p.personal_relief
        ),
        RuleParameters::Tiered(p) => p
            .tiers
            .iter()
            .map(|t| {
                let high = t
                    .salary_range_high
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "..".to_string());
                format!("{} {}-{} @ {}", t.label, t.salary_range_low, high, t.rate)
            })
            .collect::<Vec<_>>()
            .join("; "),
        RuleParameters::Percentage(p) => {
            let mut text = format!("{} of gross", p.rate);
            if let Some(min) = p.min_amount {
                text.push_str(&format!(", min {min}"));
            }
            if let Some(max) = p.max_amount {
                text.push_str(&format!(", max {max}"));
            }
            text
        }
    }
}
