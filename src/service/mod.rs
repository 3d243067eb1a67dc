pub mod ingest;

pub use ingest::{InboundMessage, IngestOutcome, Ingestor};
