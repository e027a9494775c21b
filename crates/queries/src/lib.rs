//! # queries
//!
//! Convenience helpers for working with SQL databases.
//!
//! ## Features
//!
//! - **Driver interception**: wrap any driver with [`Interceptor`] to observe or
//!   replace exec, query, prepare and begin-tx calls (logging, metrics, tracing)
//!   without changing the driver or the code that uses it
//! - **Placeholder builder**: [`Builder`] expands `%?`, `%$`, `%@` and `%:` verbs
//!   into the parameter syntax of MySQL/SQLite, PostgreSQL, SQL Server and Oracle
//! - **Row scanning**: decode rows into scalars or `#[derive(FromRow)]` structs
//!   with [`query_all`], [`query_row`] and friends
//!
//! ## Interception
//!
//! ```ignore
//! use queries::{Context, Db, Interceptor, StatsHook, TracingHook, registry};
//! use std::sync::Arc;
//!
//! let stats = Arc::new(StatsHook::new());
//! let interceptor = Interceptor::new(my_driver)
//!     .with_hooks(Arc::new(TracingHook::new()))
//!     .with_exec_hook_arc(stats.clone());
//! registry::register("logged", interceptor)?;
//!
//! let db = Db::open("logged", "dsn")?;
//! db.exec(&Context::background(), "DELETE FROM sessions", &[]).await?;
//! ```
//!
//! ## Builder and scanner
//!
//! ```ignore
//! use queries::{Arg, FromRow, build};
//!
//! #[derive(FromRow)]
//! struct User {
//!     #[sql(column = "id")]
//!     id: i64,
//!     #[sql(column = "name")]
//!     name: String,
//! }
//!
//! let (query, args) = queries::build!("SELECT id, name FROM users WHERE id IN (%+?)", Arg::list(ids))?;
//! let users: Vec<User> = queries::query_all(&db, &ctx, &query, &args).await?;
//! ```

// Lets `#[derive(FromRow)]` expand to `::queries::...` inside this crate's own tests.
extern crate self as queries;

pub mod context;
pub mod db;
pub mod driver;
pub mod error;
pub mod interceptor;
pub mod query;
pub mod registry;
pub mod row;
pub mod sql;

pub use context::{CancelHandle, Context};
pub use db::{Db, DbConfig, DbRows, DbStmt, DbTx};
pub use driver::{
    Capabilities, Capability, Driver, IsolationLevel, NamedValue, TxOptions, Value,
};
pub use error::{DbError, DbResult};
pub use interceptor::{
    BeginTxHook, ExecHook, HookStats, InterceptedConn, InterceptedConnector, Interceptor,
    OpStats, PrepareHook, QueryHook, StatsHook,
};
pub use query::{Queryer, TypedRows, query_all, query_as, query_row, scan_all, scan_row};
pub use row::{FromRow, FromValue, Row};
pub use sql::{Arg, Builder, Placeholder, build};

#[cfg(feature = "tracing")]
pub use interceptor::TracingHook;

#[cfg(feature = "derive")]
pub use queries_derive::FromRow;
