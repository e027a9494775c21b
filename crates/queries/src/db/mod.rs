//! The host runtime: a database handle on top of the driver contract.
//!
//! [`Db`] opens connections through a [`Connector`], keeps a few of them for
//! reuse and performs the fallback rules drivers rely on:
//!
//! - arguments pass through the connection's `NamedValueChecker` first;
//! - exec/query try `ExecerContext`/`QueryerContext` and fall back to a
//!   prepared statement when the facet is missing or returns
//!   [`DbError::Skip`];
//! - a reused connection is reset with `SessionResetter`, and a connection
//!   that reports [`DbError::BadConn`] or fails its `Validator` is closed.
//!
//! It is not a pool manager: there is no limit on open connections and no
//! retry on bad connections.

mod config;
mod rows;
mod stmt;
mod tx;


pub use config::DbConfig;
pub use rows::DbRows;
pub use stmt::DbStmt;
pub use tx::DbTx;

use crate::context::Context;
use crate::driver::{
    Capability, Conn, Connector, Driver, DsnConnector, ExecResult, NamedValue, Rows, Stmt,
    TxOptions, Value,
};
use crate::error::{DbError, DbResult};
use crate::registry;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A handle to a database, safe for concurrent use.
///
/// Cloning is cheap; clones share connections.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

struct DbInner {
    connector: Arc<dyn Connector>,
    config: DbConfig,
    idle: Mutex<Vec<Box<dyn Conn>>>,
    closed: AtomicBool,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("config", &self.inner.config)
            .field("idle", &self.idle_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Db {
    /// Open a database using a registered driver.
    ///
    /// No connection is made here; use [`Db::ping`] to check the DSN.
    pub fn open(driver_name: &str, dsn: &str) -> DbResult<Self> {
        let driver = registry::lookup(driver_name)?;
        let connector = match driver.as_driver_context() {
            Some(driver) => driver.open_connector(dsn)?,
            None => Arc::new(DsnConnector::new(dsn, driver.clone())),
        };
        Ok(Self::open_db(connector))
    }

    /// Open a database directly from a connector, bypassing the registry.
    pub fn open_db(connector: Arc<dyn Connector>) -> Self {
        Self::with_parts(connector, DbConfig::default(), Vec::new())
    }

    fn with_parts(
        connector: Arc<dyn Connector>,
        config: DbConfig,
        idle: Vec<Box<dyn Conn>>,
    ) -> Self {
        Self {
            inner: Arc::new(DbInner {
                connector,
                config,
                idle: Mutex::new(idle),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Replace the configuration. Idle connections are carried over.
    pub fn with_config(self, config: DbConfig) -> Self {
        let idle = std::mem::take(&mut *self.lock_idle());
        Self::with_parts(self.inner.connector.clone(), config, idle)
    }

    pub fn config(&self) -> &DbConfig {
        &self.inner.config
    }

    /// The driver behind this handle's connector.
    pub fn driver(&self) -> Arc<dyn Driver> {
        self.inner.connector.driver()
    }

    /// Number of connections currently kept for reuse.
    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close idle connections and reject further use with [`DbError::DbClosed`].
    ///
    /// Connections held by open rows, statements or transactions are closed
    /// when those are released.
    pub async fn close(&self) -> DbResult<()> {
        self.inner.closed.store(true, Ordering::Release);
        let idle = std::mem::take(&mut *self.lock_idle());
        let mut first_err = None;
        for conn in idle {
            if let Err(err) = conn.close().await {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Verify a connection to the database is still alive.
    ///
    /// Connections without a `Pinger` are considered alive once connected.
    pub async fn ping(&self, ctx: &Context) -> DbResult<()> {
        let conn = self.conn(ctx).await?;
        let result = match conn.as_pinger() {
            Some(pinger) => run(ctx, pinger.ping(ctx)).await,
            None => Ok(()),
        };
        self.release(conn, is_bad_conn(&result)).await;
        result
    }

    /// Execute a statement that returns no rows.
    pub async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> DbResult<Box<dyn ExecResult>> {
        let conn = self.conn(ctx).await?;
        let result = exec_conn(conn.as_ref(), ctx, query, args).await;
        self.release(conn, is_bad_conn(&result)).await;
        result
    }

    /// Execute a query. The connection is held until the rows are closed.
    pub async fn query(&self, ctx: &Context, query: &str, args: &[Value]) -> DbResult<DbRows> {
        let conn = self.conn(ctx).await?;
        match query_conn(conn.as_ref(), ctx, query, args).await {
            Ok((rows, stmt)) => Ok(DbRows::new(rows, stmt, Some((self.clone(), conn)))),
            Err(err) => {
                self.release(conn, err.is_bad_conn()).await;
                Err(err)
            }
        }
    }

    /// Prepare a statement on one connection.
    pub async fn prepare(&self, ctx: &Context, query: &str) -> DbResult<DbStmt> {
        let conn = self.conn(ctx).await?;
        match prepare_conn(conn.as_ref(), ctx, query).await {
            Ok(stmt) => Ok(DbStmt::new(self.clone(), conn, stmt)),
            Err(err) => {
                self.release(conn, err.is_bad_conn()).await;
                Err(err)
            }
        }
    }

    /// Start a transaction with default options.
    pub async fn begin(&self, ctx: &Context) -> DbResult<DbTx> {
        self.begin_tx(ctx, TxOptions::default()).await
    }

    /// Start a transaction.
    ///
    /// Connections without `ConnBeginTx` only support the default options.
    pub async fn begin_tx(&self, ctx: &Context, opts: TxOptions) -> DbResult<DbTx> {
        let conn = self.conn(ctx).await?;
        let result = match conn.as_beginner() {
            Some(beginner) => run(ctx, beginner.begin_tx(ctx, opts)).await,
            None if opts.is_default() => run(ctx, conn.begin()).await,
            None => Err(DbError::Unsupported(Capability::BeginTx)),
        };
        match result {
            Ok(tx) => Ok(DbTx::new(self.clone(), conn, tx)),
            Err(err) => {
                self.release(conn, err.is_bad_conn()).await;
                Err(err)
            }
        }
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn Conn>>> {
        self.inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn pop_idle(&self) -> Option<Box<dyn Conn>> {
        self.lock_idle().pop()
    }

    /// Keep `conn` for reuse, or hand it back if the idle list is full.
    fn push_idle(&self, conn: Box<dyn Conn>) -> Option<Box<dyn Conn>> {
        let mut idle = self.lock_idle();
        if self.is_closed() || idle.len() >= self.inner.config.max_idle_conns {
            return Some(conn);
        }
        idle.push(conn);
        None
    }

    /// Take an idle connection or open a new one.
    pub(crate) async fn conn(&self, ctx: &Context) -> DbResult<Box<dyn Conn>> {
        ctx.err()?;
        while let Some(conn) = self.pop_idle() {
            if self.is_closed() {
                let _ = conn.close().await;
                break;
            }
            let reset = match conn.as_session_resetter() {
                Some(resetter) => run(ctx, resetter.reset_session(ctx)).await,
                None => Ok(()),
            };
            match reset {
                Ok(()) => return Ok(conn),
                Err(err) if err.is_bad_conn() => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(
                        target: "queries.db",
                        "discarding connection rejected by session reset"
                    );
                    let _ = conn.close().await;
                }
                Err(err) => {
                    let _ = conn.close().await;
                    return Err(err);
                }
            }
        }
        if self.is_closed() {
            return Err(DbError::DbClosed);
        }
        run(ctx, self.inner.connector.connect(ctx)).await
    }

    /// Return a connection after use.
    pub(crate) async fn release(&self, conn: Box<dyn Conn>, bad: bool) {
        let invalid = conn
            .as_validator()
            .is_some_and(|validator| !validator.is_valid());
        let conn = if bad || invalid {
            #[cfg(feature = "tracing")]
            tracing::trace!(target: "queries.db", bad, invalid, "discarding connection");
            conn
        } else {
            match self.push_idle(conn) {
                Some(conn) => conn,
                None => return,
            }
        };
        if let Err(_err) = conn.close().await {
            #[cfg(feature = "tracing")]
            tracing::debug!(target: "queries.db", error = %_err, "closing connection failed");
        }
    }
}

fn is_bad_conn<T>(result: &DbResult<T>) -> bool {
    matches!(result, Err(err) if err.is_bad_conn())
}

/// Drive a driver future under the context's deadline.
///
/// Cancellation is checked before dispatch; a deadline that passes while the
/// future runs yields [`DbError::DeadlineExceeded`].
pub(crate) async fn run<T, F>(ctx: &Context, future: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>> + Send,
{
    ctx.err()?;
    match ctx.deadline() {
        Some(deadline) => {
            tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), future)
                .await
                .unwrap_or(Err(DbError::DeadlineExceeded))
        }
        None => future.await,
    }
}

/// Convert arguments to [`NamedValue`]s, letting the connection check each one.
pub(crate) fn named_values(conn: &dyn Conn, args: &[Value]) -> DbResult<Vec<NamedValue>> {
    let checker = conn.as_named_value_checker();
    args.iter()
        .enumerate()
        .map(|(i, value)| {
            let mut named = NamedValue::new(i + 1, value.clone());
            if let Some(checker) = checker {
                match checker.check_named_value(&mut named) {
                    Ok(()) => {}
                    Err(err) if err.is_skip() => named = NamedValue::new(i + 1, value.clone()),
                    Err(err) => return Err(err),
                }
            }
            Ok(named)
        })
        .collect()
}

pub(crate) async fn prepare_conn(
    conn: &dyn Conn,
    ctx: &Context,
    query: &str,
) -> DbResult<Box<dyn Stmt>> {
    match conn.as_preparer() {
        Some(preparer) => run(ctx, preparer.prepare_context(ctx, query)).await,
        None => run(ctx, conn.prepare(query)).await,
    }
}

pub(crate) async fn exec_conn(
    conn: &dyn Conn,
    ctx: &Context,
    query: &str,
    args: &[Value],
) -> DbResult<Box<dyn ExecResult>> {
    let args = named_values(conn, args)?;
    if let Some(execer) = conn.as_execer() {
        match run(ctx, execer.exec_context(ctx, query, &args)).await {
            Err(err) if err.is_skip() => {}
            result => return result,
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(target: "queries.db", query, "exec falling back to prepared statement");

    let stmt = prepare_conn(conn, ctx, query).await?;
    let result = run(ctx, stmt.exec(ctx, &args)).await;
    let closed = stmt.close().await;
    let result = result?;
    closed?;
    Ok(result)
}

/// Query on `conn`; the statement is returned when the prepared path was
/// taken and must stay open as long as the rows.
pub(crate) async fn query_conn(
    conn: &dyn Conn,
    ctx: &Context,
    query: &str,
    args: &[Value],
) -> DbResult<(Box<dyn Rows>, Option<Box<dyn Stmt>>)> {
    let args = named_values(conn, args)?;
    if let Some(queryer) = conn.as_queryer() {
        match run(ctx, queryer.query_context(ctx, query, &args)).await {
            Err(err) if err.is_skip() => {}
            result => return result.map(|rows| (rows, None)),
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(target: "queries.db", query, "query falling back to prepared statement");

    let stmt = prepare_conn(conn, ctx, query).await?;
    match run(ctx, stmt.query(ctx, &args)).await {
        Ok(rows) => Ok((rows, Some(stmt))),
        Err(err) => {
            let _ = stmt.close().await;
            Err(err)
        }
    }
}
