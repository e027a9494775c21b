use super::hooks::{BeginTxHook, ExecHook, PrepareHook, QueryHook};
use crate::context::Context;
use crate::driver::{
    ConnBeginTx, ConnPrepareContext, ExecResult, ExecerContext, NamedValue, QueryerContext, Rows,
    Stmt, Tx, TxOptions,
};
use crate::error::DbResult;
use async_trait::async_trait;
use std::time::Instant;
use tracing::Level;

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// A `tracing`-based callback set that emits one event per intercepted
/// operation, after the driver returns.
///
/// Events use target `queries.sql` and carry the operation, SQL, argument
/// count, elapsed time and outcome. A `Skip` from the driver is reported as
/// `outcome = "skip"`, not as an error.
///
/// Enable via the crate feature: `queries = { features = ["tracing"] }`.
#[derive(Debug, Clone)]
pub struct TracingHook {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingHook {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl TracingHook {
    /// Create a new hook with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    fn emit<T>(
        &self,
        op: &'static str,
        sql: &str,
        arg_count: usize,
        started: Instant,
        result: &DbResult<T>,
    ) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    _ => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(sql);
        let elapsed = started.elapsed();
        match result {
            Ok(_) => emit_at_level!(
                self.level,
                target: "queries.sql",
                op,
                sql = %sql,
                arg_count,
                ?elapsed,
                outcome = "ok",
            ),
            Err(err) if err.is_skip() => emit_at_level!(
                self.level,
                target: "queries.sql",
                op,
                sql = %sql,
                arg_count,
                ?elapsed,
                outcome = "skip",
            ),
            Err(err) => emit_at_level!(
                self.level,
                target: "queries.sql",
                op,
                sql = %sql,
                arg_count,
                ?elapsed,
                outcome = "error",
                error = %err,
            ),
        }
    }
}

#[async_trait]
impl ExecHook for TracingHook {
    async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
        execer: &dyn ExecerContext,
    ) -> DbResult<Box<dyn ExecResult>> {
        let started = Instant::now();
        let result = execer.exec_context(ctx, query, args).await;
        self.emit("exec", query, args.len(), started, &result);
        result
    }
}

#[async_trait]
impl QueryHook for TracingHook {
    async fn query(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
        queryer: &dyn QueryerContext,
    ) -> DbResult<Box<dyn Rows>> {
        let started = Instant::now();
        let result = queryer.query_context(ctx, query, args).await;
        self.emit("query", query, args.len(), started, &result);
        result
    }
}

#[async_trait]
impl PrepareHook for TracingHook {
    async fn prepare(
        &self,
        ctx: &Context,
        query: &str,
        preparer: &dyn ConnPrepareContext,
    ) -> DbResult<Box<dyn Stmt>> {
        let started = Instant::now();
        let result = preparer.prepare_context(ctx, query).await;
        self.emit("prepare", query, 0, started, &result);
        result
    }
}

#[async_trait]
impl BeginTxHook for TracingHook {
    async fn begin_tx(
        &self,
        ctx: &Context,
        opts: TxOptions,
        beginner: &dyn ConnBeginTx,
    ) -> DbResult<Box<dyn Tx>> {
        let started = Instant::now();
        let result = beginner.begin_tx(ctx, opts).await;
        let sql = if opts.read_only {
            "BEGIN READ ONLY"
        } else {
            "BEGIN"
        };
        self.emit("begin_tx", sql, 0, started, &result);
        result
    }
}
