//! Decoding and table state for the rocket result browser

pub mod decode;
pub mod store;
pub mod table;
pub mod worker;

use thiserror::Error;

// Re-exports
pub use decode::{decode_payload, Decoded, RecordIssue, FIELD_MAPPINGS};
pub use store::RowStore;
pub use table::{TableEvent, TableInstance};
pub use worker::{DecodeRequest, DecodeResponse, DecodeWorker, Notifier};

/// Failure of a whole decode attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Decode task failed: {0}")]
    Task(String),
}

/// Errors that can occur while driving a table instance
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Decode worker has shut down")]
    WorkerClosed,

    #[error("Filter error: {0}")]
    Filter(#[from] rt_core::FilterError),
}
