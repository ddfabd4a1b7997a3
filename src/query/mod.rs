// Query Builder (C5) - turns (table, strategy, campaign?, watermark?) into SQL.
mod builder;
mod windows;

pub use builder::{build_query, ExtractionStrategy};
