use thiserror::Error;

use super::types::{PageId, TransactionId};

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Tuple schema does not match the page schema")]
    SchemaMismatch,

    #[error("Schema must contain at least one column")]
    EmptySchema,

    #[error("Page {0} has no empty slots")]
    PageFull(PageId),

    #[error("Tuple is not stored on this page")]
    TupleNotOnPage,

    #[error("Invalid page {page_id}: {reason}")]
    InvalidPage { page_id: PageId, reason: String },

    #[error("Malformed field bytes: {0}")]
    Malformed(String),

    #[error("Transaction {0} aborted")]
    TransactionAborted(TransactionId),

    #[error("Buffer pool is full, no evictable pages available")]
    BufferPoolFull,

    #[error("Page {0} is held by an outstanding guard")]
    PageLatched(PageId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Schema file line {line}: {reason}")]
    SchemaFile { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, DbError>;
