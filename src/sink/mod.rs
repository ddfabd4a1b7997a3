// Sink Writer (C2) - the destination side of the pipeline.
pub mod connection;
pub mod writer;

pub use connection::Database;
pub use writer::SinkWriter;
