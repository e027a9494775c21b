use super::hooks::{BeginTxHook, ExecHook, PrepareHook, QueryHook};
use crate::context::Context;
use crate::driver::{
    ConnBeginTx, ConnPrepareContext, ExecResult, ExecerContext, NamedValue, QueryerContext, Rows,
    Stmt, Tx, TxOptions,
};
use crate::error::DbResult;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A callback set that counts intercepted operations and their durations.
///
/// Use it with [`Interceptor::with_hooks`](super::Interceptor::with_hooks)
/// and keep a clone of the `Arc` to read [`StatsHook::stats`].
/// A [`DbError::Skip`](crate::DbError::Skip) from the driver is not counted as a failure.
#[derive(Debug, Default)]
pub struct StatsHook {
    exec: OpCounters,
    query: OpCounters,
    prepare: OpCounters,
    begin_tx: OpCounters,
}

#[derive(Debug, Default)]
struct OpCounters {
    calls: AtomicU64,
    failed: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl OpCounters {
    fn record<T>(&self, started: Instant, result: &DbResult<T>) {
        let nanos = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.calls.fetch_add(1, Ordering::Relaxed);
        if matches!(result, Err(err) if !err.is_skip()) {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    fn snapshot(&self) -> OpStats {
        OpStats {
            calls: self.calls.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed)),
            max_duration: Duration::from_nanos(self.max_nanos.load(Ordering::Relaxed)),
        }
    }

    fn reset(&self) {
        self.calls.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.total_nanos.store(0, Ordering::Relaxed);
        self.max_nanos.store(0, Ordering::Relaxed);
    }
}

/// Counters for one intercepted operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpStats {
    /// Number of intercepted calls.
    pub calls: u64,
    /// Calls that returned an error other than `Skip`.
    pub failed: u64,
    /// Total time spent in the driver.
    pub total_duration: Duration,
    /// Slowest single call.
    pub max_duration: Duration,
}

/// Snapshot of a [`StatsHook`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookStats {
    pub exec: OpStats,
    pub query: OpStats,
    pub prepare: OpStats,
    pub begin_tx: OpStats,
}

impl HookStats {
    /// Total calls across all operations.
    pub fn total_calls(&self) -> u64 {
        self.exec.calls + self.query.calls + self.prepare.calls + self.begin_tx.calls
    }
}

impl StatsHook {
    /// Create a new stats hook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current statistics.
    pub fn stats(&self) -> HookStats {
        HookStats {
            exec: self.exec.snapshot(),
            query: self.query.snapshot(),
            prepare: self.prepare.snapshot(),
            begin_tx: self.begin_tx.snapshot(),
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        self.exec.reset();
        self.query.reset();
        self.prepare.reset();
        self.begin_tx.reset();
    }
}

#[async_trait]
impl ExecHook for StatsHook {
    async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
        execer: &dyn ExecerContext,
    ) -> DbResult<Box<dyn ExecResult>> {
        let started = Instant::now();
        let result = execer.exec_context(ctx, query, args).await;
        self.exec.record(started, &result);
        result
    }
}

#[async_trait]
impl QueryHook for StatsHook {
    async fn query(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
        queryer: &dyn QueryerContext,
    ) -> DbResult<Box<dyn Rows>> {
        let started = Instant::now();
        let result = queryer.query_context(ctx, query, args).await;
        self.query.record(started, &result);
        result
    }
}

#[async_trait]
impl PrepareHook for StatsHook {
    async fn prepare(
        &self,
        ctx: &Context,
        query: &str,
        preparer: &dyn ConnPrepareContext,
    ) -> DbResult<Box<dyn Stmt>> {
        let started = Instant::now();
        let result = preparer.prepare_context(ctx, query).await;
        self.prepare.record(started, &result);
        result
    }
}

#[async_trait]
impl BeginTxHook for StatsHook {
    async fn begin_tx(
        &self,
        ctx: &Context,
        opts: TxOptions,
        beginner: &dyn ConnBeginTx,
    ) -> DbResult<Box<dyn Tx>> {
        let started = Instant::now();
        let result = beginner.begin_tx(ctx, opts).await;
        self.begin_tx.record(started, &result);
        result
    }
}
