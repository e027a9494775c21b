//! The driver plugin contract.
//!
//! A database driver implements [`Driver`] and hands out [`Conn`]s. Beyond
//! the mandatory baseline (`prepare`, `close`, `begin`) a connection may
//! implement any subset of eight optional capability traits; it advertises
//! them through the `as_*` accessors on [`Conn`], which return `None` by
//! default.
//!
//! ```ignore
//! struct MyConn { /* ... */ }
//!
//! #[async_trait]
//! impl Conn for MyConn {
//!     async fn prepare(&self, query: &str) -> DbResult<Box<dyn Stmt>> { /* ... */ }
//!     async fn close(&self) -> DbResult<()> { Ok(()) }
//!     async fn begin(&self) -> DbResult<Box<dyn Tx>> { /* ... */ }
//!
//!     fn as_execer(&self) -> Option<&dyn ExecerContext> {
//!         Some(self)
//!     }
//! }
//! ```

mod capability;
mod value;

pub use capability::{Capabilities, Capability};
pub use value::{IsolationLevel, NamedValue, TxOptions, Value};

use crate::context::Context;
use crate::error::DbResult;
use async_trait::async_trait;
use std::sync::Arc;

/// A database driver.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Open a new connection using a driver-specific name (usually a DSN).
    ///
    /// Runtimes prefer [`DriverContext::open_connector`] when the driver
    /// provides it.
    async fn open(&self, name: &str) -> DbResult<Box<dyn Conn>>;

    /// The connector-based entry point, if implemented.
    fn as_driver_context(&self) -> Option<&dyn DriverContext> {
        None
    }
}

/// Optional driver entry point that parses the name once and returns a
/// reusable [`Connector`].
pub trait DriverContext: Send + Sync {
    fn open_connector(&self, name: &str) -> DbResult<Arc<dyn Connector>>;
}

/// Produces connections with a fixed configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, ctx: &Context) -> DbResult<Box<dyn Conn>>;

    /// The driver this connector belongs to.
    fn driver(&self) -> Arc<dyn Driver>;
}

/// A connector that calls [`Driver::open`] with a fixed name, for drivers
/// without a [`DriverContext`].
pub struct DsnConnector {
    dsn: String,
    driver: Arc<dyn Driver>,
}

impl DsnConnector {
    pub fn new(dsn: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        Self {
            dsn: dsn.into(),
            driver,
        }
    }
}

#[async_trait]
impl Connector for DsnConnector {
    async fn connect(&self, _ctx: &Context) -> DbResult<Box<dyn Conn>> {
        self.driver.open(&self.dsn).await
    }

    fn driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }
}

/// A connection to a database.
///
/// The runtime never uses one connection from two callers at the same time.
#[async_trait]
pub trait Conn: Send + Sync {
    /// Prepare a statement (legacy, no context).
    async fn prepare(&self, query: &str) -> DbResult<Box<dyn Stmt>>;

    async fn close(&self) -> DbResult<()>;

    /// Start a transaction with default options (legacy, no context).
    async fn begin(&self) -> DbResult<Box<dyn Tx>>;

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        None
    }

    fn as_execer(&self) -> Option<&dyn ExecerContext> {
        None
    }

    fn as_queryer(&self) -> Option<&dyn QueryerContext> {
        None
    }

    fn as_preparer(&self) -> Option<&dyn ConnPrepareContext> {
        None
    }

    fn as_beginner(&self) -> Option<&dyn ConnBeginTx> {
        None
    }

    fn as_session_resetter(&self) -> Option<&dyn SessionResetter> {
        None
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        None
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        None
    }
}

#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, ctx: &Context) -> DbResult<()>;
}

/// Direct execution without a prepared statement.
///
/// May return [`DbError::Skip`](crate::DbError::Skip) to make the runtime
/// fall back to prepare + exec.
#[async_trait]
pub trait ExecerContext: Send + Sync {
    async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<Box<dyn ExecResult>>;
}

/// Direct querying without a prepared statement.
///
/// May return [`DbError::Skip`](crate::DbError::Skip) to make the runtime
/// fall back to prepare + query.
#[async_trait]
pub trait QueryerContext: Send + Sync {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<Box<dyn Rows>>;
}

#[async_trait]
pub trait ConnPrepareContext: Send + Sync {
    async fn prepare_context(&self, ctx: &Context, query: &str) -> DbResult<Box<dyn Stmt>>;
}

#[async_trait]
pub trait ConnBeginTx: Send + Sync {
    async fn begin_tx(&self, ctx: &Context, opts: TxOptions) -> DbResult<Box<dyn Tx>>;
}

/// Called before a pooled connection is reused.
///
/// Returning [`DbError::BadConn`](crate::DbError::BadConn) discards the connection.
#[async_trait]
pub trait SessionResetter: Send + Sync {
    async fn reset_session(&self, ctx: &Context) -> DbResult<()>;
}

/// Called before a connection is returned to the idle list.
pub trait Validator: Send + Sync {
    fn is_valid(&self) -> bool;
}

/// Checks and optionally converts an argument before it reaches the driver.
///
/// Returning [`DbError::Skip`](crate::DbError::Skip) applies the default
/// conversion.
pub trait NamedValueChecker: Send + Sync {
    fn check_named_value(&self, value: &mut NamedValue) -> DbResult<()>;
}

/// A prepared statement, bound to the connection that prepared it.
#[async_trait]
pub trait Stmt: Send + Sync {
    async fn close(&self) -> DbResult<()>;

    /// Number of placeholders, if the driver knows it.
    fn num_input(&self) -> Option<usize> {
        None
    }

    async fn exec(&self, ctx: &Context, args: &[NamedValue]) -> DbResult<Box<dyn ExecResult>>;

    async fn query(&self, ctx: &Context, args: &[NamedValue]) -> DbResult<Box<dyn Rows>>;
}

#[async_trait]
pub trait Tx: Send + Sync {
    async fn commit(&self) -> DbResult<()>;

    async fn rollback(&self) -> DbResult<()>;
}

/// The outcome of an exec.
pub trait ExecResult: Send + Sync {
    fn last_insert_id(&self) -> DbResult<i64>;

    fn rows_affected(&self) -> DbResult<i64>;
}

/// A result set cursor.
#[async_trait]
pub trait Rows: Send {
    fn columns(&self) -> &[String];

    /// Fill `dest` (one slot per column) with the next row.
    ///
    /// Returns `false` once the rows are exhausted.
    async fn next(&mut self, dest: &mut [Value]) -> DbResult<bool>;

    async fn close(&mut self) -> DbResult<()>;
}
