// Module declarations
pub mod config;
pub mod domain;
pub mod error;
pub mod etl;
pub mod logging;
pub mod mart;
pub mod orchestrator;
pub mod query;
pub mod sink;
pub mod strategy;
pub mod transform;
pub mod warehouse;
pub mod watermark_store;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orchestrator::{CampaignOrchestrator, PerCampaignPipeline};
use sink::{Database, SinkWriter};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use warehouse::{BigQueryClient, WarehouseClient};
use watermark_store::WatermarkStore;

#[derive(Parser, Debug)]
#[command(
    name = "campaign-etl",
    version,
    author,
    about = "Incremental ETL engine for debt-collection campaign dashboards",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run extraction and loading
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Watermark inspection and maintenance
    Watermark {
        #[command(subcommand)]
        command: WatermarkCommands,
    },
    /// Generate report from the watermark store
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand, Debug)]
enum RunCommands {
    /// Catch up every campaign whose watermark shows it needs a refresh
    Campaigns {
        /// Campaigns processed concurrently per chunk
        #[arg(long)]
        batch_size: Option<usize>,
        /// Stop after this many eligible campaigns
        #[arg(long)]
        max_campaigns: Option<i64>,
        /// Ignore watermark eligibility and refresh every campaign found
        #[arg(long, default_value = "false")]
        force_refresh_all: bool,
    },
    /// Run one logical table, optionally scoped to a single campaign
    Table {
        /// Logical table name, e.g. "assignments" or "debts"
        name: String,
        /// Campaign archivo to scope the extraction to
        #[arg(long)]
        campaign: Option<String>,
        /// Ignore the watermark and incremental column, reload everything
        #[arg(long, default_value = "false")]
        force_full_refresh: bool,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Run the etl_watermarks migration and create the raw/aux/mart schemas
    Init,
}

#[derive(Subcommand, Debug)]
enum WatermarkCommands {
    /// Show the current watermark for one table, or every table if omitted
    Show {
        table: Option<String>,
    },
    /// Force a table's watermark back to "reset", so the next run does a full incremental catch-up
    Reset {
        table: String,
    },
    /// Fail out any watermark stuck at "running" past the stale-run timeout
    Reap,
}

#[derive(Subcommand, Debug)]
enum ReportCommands {
    /// Aggregate counts across every table's watermark
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;
    let config = config::Config::from_env()?;
    let cli = Cli::parse();

    let db = Database::connect(&config.database).await.context("connecting to sink database")?;
    let watermarks = Arc::new(WatermarkStore::new(db.clone()));

    match cli.command {
        Commands::Db { command } => match command {
            DbCommands::Init => {
                info!("initializing sink database");
                db.migrate().await?;
                db.ensure_project_schemas(&config.warehouse.project_uid).await?;
                println!("sink database initialized (etl_watermarks + raw/aux/mart schemas)");
                Ok(())
            }
        },

        Commands::Watermark { command } => match command {
            WatermarkCommands::Show { table } => {
                match table {
                    Some(name) => match watermarks.get_watermark(&name).await? {
                        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                        None => println!("no watermark recorded for table '{name}'"),
                    },
                    None => {
                        for name in domain::catalog().names() {
                            if let Some(record) = watermarks.get_watermark(name).await? {
                                println!("{name}: {} last_extracted_at={:?}", record.status.as_str(), record.last_extracted_at);
                            } else {
                                println!("{name}: (no watermark yet)");
                            }
                        }
                    }
                }
                Ok(())
            }
            WatermarkCommands::Reset { table } => {
                domain::catalog().require(&table)?;
                watermarks
                    .complete(
                        &table,
                        chrono::Utc::now(),
                        domain::WatermarkStatus::Reset,
                        0,
                        0.0,
                        "manual-reset",
                        None,
                        serde_json::json!({"reset_by": "cli"}),
                    )
                    .await?;
                println!("watermark for '{table}' reset; next run will re-extract from its lookback floor");
                Ok(())
            }
            WatermarkCommands::Reap => {
                let reaped = watermarks.reap_stale(config.engine.stale_run_timeout_minutes).await?;
                println!("reaped {reaped} stale watermark(s)");
                Ok(())
            }
        },

        Commands::Report { command } => match command {
            ReportCommands::Summary => {
                let summary = watermarks.summary().await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
                Ok(())
            }
        },

        Commands::Run { command } => {
            let warehouse: Arc<dyn WarehouseClient> = Arc::new(BigQueryClient::new(
                config.warehouse.project_id.clone(),
                config.warehouse.bearer_token.clone(),
                config.warehouse.max_billed_bytes,
                std::time::Duration::from_secs(config.warehouse.query_timeout_seconds),
                warehouse::RetryPolicy {
                    max_attempts: config.engine.retry_max_attempts,
                    base_delay: std::time::Duration::from_secs(config.engine.retry_base_delay_seconds),
                    exponent: config.engine.retry_exponent,
                },
            ));
            let sink = Arc::new(SinkWriter::new(db.clone()));
            let engine = Arc::new(etl::StreamingEtlEngine::new(
                warehouse,
                sink,
                watermarks.clone(),
                config.warehouse.project_id.clone(),
                config.warehouse.dataset_id.clone(),
                config.warehouse.project_uid.clone(),
                config.engine.max_batch_size,
            ));
            let cancelled = Arc::new(AtomicBool::new(false));

            match command {
                RunCommands::Table { name, campaign, force_full_refresh } => {
                    let table_config = domain::catalog().require(&name)?;
                    let campaign_window = match campaign {
                        Some(archivo) => Some(lookup_campaign(&db, &config.warehouse.project_uid, &archivo).await?),
                        None => None,
                    };

                    let result = engine
                        .run_table_for_campaign(table_config, campaign_window.as_ref(), force_full_refresh, cancelled)
                        .await?;

                    println!("{}", serde_json::to_string_pretty(&result.load_result)?);
                    Ok(())
                }
                RunCommands::Campaigns { batch_size, max_campaigns, force_refresh_all } => {
                    let mart_builder = Arc::new(mart::NoopMartBuilder);
                    let pipeline = Arc::new(PerCampaignPipeline::new(
                        engine,
                        mart_builder,
                        watermarks.clone(),
                        config.engine.per_campaign_concurrency,
                    ));
                    let orchestrator = CampaignOrchestrator::new(
                        db.clone(),
                        watermarks,
                        pipeline,
                        config.warehouse.project_uid.clone(),
                    );

                    let summary = orchestrator
                        .run_all_pending_campaigns(
                            batch_size.unwrap_or(config.engine.default_campaign_batch_size),
                            max_campaigns,
                            force_refresh_all,
                        )
                        .await?;

                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    Ok(())
                }
            }
        }
    }
}

/// Looks up a single campaign window by archivo for the `run table --campaign` path.
async fn lookup_campaign(db: &Database, project_uid: &str, archivo: &str) -> Result<domain::CampaignWindow> {
    use sqlx::Row;

    let calendar = domain::catalog().require("calendar")?;
    let fq_table = calendar.fq_name(project_uid);
    let sql = format!(
        "SELECT archivo, fecha_apertura, fecha_cierre, tipo_cartera, estado_cartera \
         FROM {fq_table} WHERE archivo = $1"
    );

    let row = sqlx::query(&sql)
        .bind(archivo)
        .fetch_optional(db.pool())
        .await
        .context("looking up campaign window")?
        .ok_or_else(|| anyhow::anyhow!("no campaign found with archivo '{archivo}'"))?;

    let estado: Option<String> = row.get("estado_cartera");
    let status = match estado.as_deref() {
        Some("cerrada") | Some("closed") => domain::CampaignStatus::Closed,
        _ => domain::CampaignStatus::Open,
    };

    domain::CampaignWindow::new(
        row.get("archivo"),
        row.get("fecha_apertura"),
        row.get("fecha_cierre"),
        row.get::<Option<String>, _>("tipo_cartera").unwrap_or_default(),
        status,
    )
    .map_err(|e| anyhow::anyhow!(e))
}
