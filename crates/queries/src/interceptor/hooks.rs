use crate::context::Context;
use crate::driver::{
    ConnBeginTx, ConnPrepareContext, ExecResult, ExecerContext, NamedValue, QueryerContext, Rows,
    Stmt, Tx, TxOptions,
};
use crate::error::DbResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Callback for exec operations (`Db::exec`, `DbTx::exec`).
///
/// The implementation must call `execer.exec_context(ctx, query, args)` and
/// return its result, or deliberately substitute its own. Whatever it returns
/// reaches the caller unchanged.
///
/// Never called when the driver connection lacks `ExecerContext`; the runtime
/// then falls back to a prepared statement, so consider a [`PrepareHook`] as well.
#[async_trait]
pub trait ExecHook: Send + Sync {
    async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
        execer: &dyn ExecerContext,
    ) -> DbResult<Box<dyn ExecResult>>;
}

/// Callback for query operations (`Db::query`, `DbTx::query`).
///
/// The implementation must call `queryer.query_context(ctx, query, args)`
/// and return its result.
///
/// Never called when the driver connection lacks `QueryerContext`.
#[async_trait]
pub trait QueryHook: Send + Sync {
    async fn query(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
        queryer: &dyn QueryerContext,
    ) -> DbResult<Box<dyn Rows>>;
}

/// Callback for statement preparation, explicit or as an exec/query fallback.
///
/// The implementation must call `preparer.prepare_context(ctx, query)` and
/// return its result.
#[async_trait]
pub trait PrepareHook: Send + Sync {
    async fn prepare(
        &self,
        ctx: &Context,
        query: &str,
        preparer: &dyn ConnPrepareContext,
    ) -> DbResult<Box<dyn Stmt>>;
}

/// Callback for `Db::begin_tx`.
///
/// The implementation must call `beginner.begin_tx(ctx, opts)` and return
/// its result.
#[async_trait]
pub trait BeginTxHook: Send + Sync {
    async fn begin_tx(
        &self,
        ctx: &Context,
        opts: TxOptions,
        beginner: &dyn ConnBeginTx,
    ) -> DbResult<Box<dyn Tx>>;
}

/// The callback set of an [`Interceptor`](super::Interceptor).
///
/// Fixed at construction and shared read-only by every connection.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) exec: Option<Arc<dyn ExecHook>>,
    pub(crate) query: Option<Arc<dyn QueryHook>>,
    pub(crate) prepare: Option<Arc<dyn PrepareHook>>,
    pub(crate) begin_tx: Option<Arc<dyn BeginTxHook>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("exec", &self.exec.is_some())
            .field("query", &self.query.is_some())
            .field("prepare", &self.prepare.is_some())
            .field("begin_tx", &self.begin_tx.is_some())
            .finish()
    }
}
