// Domain models and types
pub mod campaign;
pub mod catalog;
pub mod row;
pub mod watermark;

pub use campaign::{CampaignStatus, CampaignWindow};
pub use catalog::{catalog, ExtractionMode, Layer, TableCatalog, TableConfig};
pub use row::{
    CampaignLoadResult, EtlStats, LoadResult, LoadStatus, RowBatch, RowValue, TableLoadResult,
};
pub use watermark::{WatermarkRecord, WatermarkStatus};
