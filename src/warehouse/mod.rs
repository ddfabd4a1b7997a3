// Warehouse Reader (C1) - the source side of the pipeline.
mod bigquery;
mod client;
mod stub;

pub use bigquery::BigQueryClient;
pub use client::{RetryPolicy, RowPageStream, WarehouseClient};
pub use stub::StubWarehouse;
