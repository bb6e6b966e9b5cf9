use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

mod aggregate;
mod calendar;
mod config;
mod db;
mod ingest;
mod insight;
mod logging;
mod models;
mod navigator;
mod notes;
mod report;
mod rollup;
mod roster;
mod session;
mod store;

use calendar::FiscalCalendar;
use config::Config;
use models::{ComparisonMode, Kpi, Period, PeriodType, View};
use rollup::Rollup;
use roster::Roster;
use session::RollupSession;
use store::MemoryStore;

#[derive(Parser)]
#[command(name = "store-kpi-rollup")]
#[command(about = "Weekly store KPI roll-ups by director and company", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    /// Period label such as "P3 FY2026"; defaults to the current period
    #[arg(long)]
    period: Option<String>,
    #[arg(long = "type", value_enum, default_value_t = PeriodType::Month)]
    period_type: PeriodType,
    #[arg(long, value_enum, default_value_t = ComparisonMode::PriorPeriod)]
    mode: ComparisonMode,
    /// Director to break down by store; omit for the company view
    #[arg(long)]
    director: Option<String>,
    /// Use generated sample data instead of Postgres
    #[arg(long)]
    sample: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample actuals and budgets for the current month
    Seed,
    /// Import weekly store actuals from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import monthly store budgets from a CSV file
    ImportBudget {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List fiscal periods
    Periods {
        #[arg(long = "type", value_enum, default_value_t = PeriodType::Month)]
        period_type: PeriodType,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Generate a roll-up report
    Report {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, value_enum)]
        rank_by: Option<Kpi>,
        /// Emit the roll-up as JSON instead of markdown
        #[arg(long)]
        json: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Ask the narrative service about a roll-up
    Insight {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        query: String,
    },
    /// Ad-hoc notes attached to a period
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },
}

#[derive(Subcommand)]
enum NoteAction {
    Add {
        #[arg(long)]
        period: String,
        #[arg(long)]
        store: Option<String>,
        #[arg(long)]
        body: String,
    },
    List {
        #[arg(long)]
        period: Option<String>,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

fn resolve_period<'a>(calendar: &'a FiscalCalendar, selection: &Selection) -> anyhow::Result<&'a Period> {
    match &selection.period {
        Some(label) => calendar
            .find_by_label(label)
            .with_context(|| format!("unknown period {label:?}")),
        None => Ok(calendar.current_period(Utc::now().date_naive(), selection.period_type)),
    }
}

async fn build_rollup(
    config: &Config,
    calendar: &FiscalCalendar,
    roster: &Roster,
    selection: &Selection,
) -> anyhow::Result<Rollup> {
    let period = resolve_period(calendar, selection)?;
    let view = match &selection.director {
        Some(name) => View::Director(roster.director_name(name)?.to_string()),
        None => View::Company,
    };

    info!(view = %view, period = %period.label, mode = %selection.mode, "building roll-up");
    let rollup = if selection.sample {
        let (records, budgets) = db::sample_data(calendar, roster, Utc::now().date_naive());
        let store = MemoryStore::new(records, budgets);
        RollupSession::new(calendar, roster, &store)
            .request(&view, period, selection.mode)
            .await?
    } else {
        let store = db::PgStore::new(connect(config).await?);
        RollupSession::new(calendar, roster, &store)
            .request(&view, period, selection.mode)
            .await?
    };
    match rollup {
        Some(rollup) => Ok(rollup),
        None => bail!("roll-up request was superseded"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    logging::init_logging(config.is_production());
    let cli = Cli::parse();

    let calendar = FiscalCalendar::new(config.fiscal_start_year, config.fiscal_end_year)?;
    let roster = match &config.roster_path {
        Some(path) => Roster::from_json_file(path)
            .with_context(|| format!("failed to load roster from {}", path.display()))?,
        None => Roster::builtin(),
    };

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect(&config).await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool, &calendar, &roster, Utc::now().date_naive()).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let file = File::open(&csv).with_context(|| format!("cannot open {}", csv.display()))?;
            let records = ingest::read_weekly(file, &calendar, &roster)?;
            let pool = connect(&config).await?;
            let written = db::upsert_weekly(&pool, &records).await?;
            println!("Imported {written} weekly records from {}.", csv.display());
        }
        Commands::ImportBudget { csv } => {
            let file = File::open(&csv).with_context(|| format!("cannot open {}", csv.display()))?;
            let budgets = ingest::read_budgets(file, &roster)?;
            let pool = connect(&config).await?;
            let written = db::upsert_budget(&pool, &budgets).await?;
            println!("Imported {written} budget rows from {}.", csv.display());
        }
        Commands::Periods { period_type, year } => {
            for period in calendar
                .of_type(period_type)
                .iter()
                .filter(|p| year.map_or(true, |y| p.fiscal_year == y))
            {
                println!("{:<12} {} .. {}", period.label, period.start, period.end);
            }
        }
        Commands::Report {
            selection,
            rank_by,
            json,
            out,
        } => {
            let rollup = build_rollup(&config, &calendar, &roster, &selection).await?;
            let rendered = if json {
                serde_json::to_string_pretty(&rollup)?
            } else {
                report::build_report(&rollup, rank_by)
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Insight { selection, query } => {
            let client = insight::InsightClient::new(config.insight_proxy_url.as_deref())?;
            let rollup = build_rollup(&config, &calendar, &roster, &selection).await?;
            let narrative = client.narrate(&query, &rollup).await?;
            println!("{narrative}");
        }
        Commands::Note { action } => {
            let pool = connect(&config).await?;
            match action {
                NoteAction::Add { period, store, body } => {
                    let period = calendar
                        .find_by_label(&period)
                        .with_context(|| format!("unknown period {period:?}"))?;
                    if let Some(store_id) = &store {
                        if !roster.contains_store(store_id) {
                            bail!("unknown store {store_id}");
                        }
                    }
                    let note = db::add_note(&pool, &period.label, store.as_deref(), &body).await?;
                    println!("Note {} saved for {}.", note.id, note.period_label);
                }
                NoteAction::List { period } => {
                    let saved = db::list_notes(&pool, period.as_deref()).await?;
                    print!("{}", notes::render_notes(&saved));
                }
            }
        }
    }

    Ok(())
}
