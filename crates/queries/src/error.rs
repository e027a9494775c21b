//! Error types for queries

use crate::driver::Capability;
use thiserror::Error;

/// Result type alias for queries operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for driver, runtime, builder and scanner operations
#[derive(Debug, Error)]
pub enum DbError {
    /// The driver cannot serve this call on its fast path.
    ///
    /// Returned by `ExecerContext`/`QueryerContext` (and by a
    /// `NamedValueChecker`) to ask the runtime to try an alternate strategy,
    /// i.e. to fall back to a prepared statement.
    #[error("driver: skip fast-path; continue as if unimplemented")]
    Skip,

    /// The connection is no longer usable and must be discarded.
    #[error("driver: bad connection")]
    BadConn,

    /// The wrapped connection lacks a capability that has no fallback path.
    #[error("queries: driver connection does not implement {0}")]
    Unsupported(Capability),

    /// Error reported by the underlying driver, passed through unchanged.
    #[error(transparent)]
    Driver(Box<dyn std::error::Error + Send + Sync>),

    /// The context was canceled.
    #[error("context canceled")]
    Canceled,

    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A single-row query returned no rows.
    #[error("queries: no rows in result set")]
    NoRows,

    /// The query result has no columns.
    #[error("queries: no columns in the query")]
    NoColumns,

    /// A non-struct type was scanned from a multi-column result.
    #[error("queries: T must be a struct if the query has more than one column ({0} columns)")]
    NonStructT(usize),

    /// A result column has no tagged struct field.
    #[error("queries: no struct field for the column {0:?}")]
    NoStructField(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// The query format or its arguments are invalid.
    #[error("queries: bad query: {0}")]
    BadQuery(String),

    /// A driver is already registered under this name.
    #[error("queries: register called twice for driver {0:?}")]
    DuplicateDriver(String),

    /// No driver is registered under this name.
    #[error("queries: unknown driver {0:?} (forgotten register?)")]
    UnknownDriver(String),

    /// The database handle was closed.
    #[error("queries: database is closed")]
    DbClosed,

    /// The transaction was already committed or rolled back.
    #[error("queries: transaction has already been committed or rolled back")]
    TxDone,

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Wrap an arbitrary driver error.
    pub fn driver<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Driver(Box::new(err))
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a bad query error
    pub fn bad_query(reason: impl Into<String>) -> Self {
        Self::BadQuery(reason.into())
    }

    /// Check if this is the soft "fall back to a prepared statement" signal
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }

    /// Check if this is a hard missing-capability error
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// The missing capability, if this is a hard missing-capability error.
    pub fn unsupported_capability(&self) -> Option<Capability> {
        match self {
            Self::Unsupported(capability) => Some(*capability),
            _ => None,
        }
    }

    /// Check if this is a bad connection error
    pub fn is_bad_conn(&self) -> bool {
        matches!(self, Self::BadConn)
    }

    /// Check if this is a no rows error
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }

    /// Downcast a wrapped driver error to its concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Driver(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}
