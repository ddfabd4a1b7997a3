// campaign-etl - incremental ETL engine that copies debt-collection campaign
// data from a BigQuery warehouse into a PostgreSQL raw/aux/mart sink.
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

pub use config::Config;
pub use error::{EtlError, Result};
pub use orchestrator::{CampaignOrchestrator, PerCampaignPipeline, RunSummary};
