use super::hooks::Hooks;
use crate::context::Context;
use crate::driver::{
    Capabilities, Capability, Conn, ConnBeginTx, ConnPrepareContext, ExecResult, ExecerContext,
    NamedValue, NamedValueChecker, Pinger, QueryerContext, Rows, SessionResetter, Stmt, Tx,
    TxOptions, Validator,
};
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A driver connection wrapped by an [`Interceptor`](super::Interceptor).
///
/// Ping, exec, query, prepare and begin-tx are always exposed and report a
/// missing capability from inside the call: exec/query with
/// [`DbError::Skip`], the others with [`DbError::Unsupported`].
/// `SessionResetter`, `Validator` and `NamedValueChecker` are exposed only
/// when the wrapped connection implements them, so the runtime sees exactly
/// the same pass-through facets as it would on the bare connection.
pub struct InterceptedConn {
    conn: Box<dyn Conn>,
    hooks: Arc<Hooks>,
    capabilities: Capabilities,
}

impl InterceptedConn {
    pub(crate) fn new(conn: Box<dyn Conn>, hooks: Arc<Hooks>) -> Self {
        let capabilities = Capabilities::probe(conn.as_ref());
        Self {
            conn,
            hooks,
            capabilities,
        }
    }

    /// Capabilities of the wrapped connection, probed when it was opened.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The wrapped connection.
    pub fn inner(&self) -> &dyn Conn {
        self.conn.as_ref()
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

impl fmt::Debug for InterceptedConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptedConn")
            .field("capabilities", &self.capabilities)
            .field("hooks", &self.hooks)
            .finish()
    }
}

#[async_trait]
impl Conn for InterceptedConn {
    async fn prepare(&self, query: &str) -> DbResult<Box<dyn Stmt>> {
        self.conn.prepare(query).await
    }

    async fn close(&self) -> DbResult<()> {
        self.conn.close().await
    }

    async fn begin(&self) -> DbResult<Box<dyn Tx>> {
        self.conn.begin().await
    }

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        Some(self)
    }

    fn as_execer(&self) -> Option<&dyn ExecerContext> {
        Some(self)
    }

    fn as_queryer(&self) -> Option<&dyn QueryerContext> {
        Some(self)
    }

    fn as_preparer(&self) -> Option<&dyn ConnPrepareContext> {
        Some(self)
    }

    fn as_beginner(&self) -> Option<&dyn ConnBeginTx> {
        Some(self)
    }

    fn as_session_resetter(&self) -> Option<&dyn SessionResetter> {
        self.supports(Capability::SessionReset)
            .then_some(self as &dyn SessionResetter)
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        self.supports(Capability::Validate)
            .then_some(self as &dyn Validator)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        self.supports(Capability::NamedValueCheck)
            .then_some(self as &dyn NamedValueChecker)
    }
}

#[async_trait]
impl Pinger for InterceptedConn {
    async fn ping(&self, ctx: &Context) -> DbResult<()> {
        let Some(pinger) = self
            .conn
            .as_pinger()
            .filter(|_| self.supports(Capability::Ping))
        else {
            return Err(DbError::Unsupported(Capability::Ping));
        };
        pinger.ping(ctx).await
    }
}

#[async_trait]
impl ExecerContext for InterceptedConn {
    async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<Box<dyn ExecResult>> {
        let Some(execer) = self
            .conn
            .as_execer()
            .filter(|_| self.supports(Capability::Exec))
        else {
            return Err(DbError::Skip);
        };
        match &self.hooks.exec {
            Some(hook) => hook.exec(ctx, query, args, execer).await,
            None => execer.exec_context(ctx, query, args).await,
        }
    }
}

#[async_trait]
impl QueryerContext for InterceptedConn {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<Box<dyn Rows>> {
        let Some(queryer) = self
            .conn
            .as_queryer()
            .filter(|_| self.supports(Capability::Query))
        else {
            return Err(DbError::Skip);
        };
        match &self.hooks.query {
            Some(hook) => hook.query(ctx, query, args, queryer).await,
            None => queryer.query_context(ctx, query, args).await,
        }
    }
}

#[async_trait]
impl ConnPrepareContext for InterceptedConn {
    async fn prepare_context(&self, ctx: &Context, query: &str) -> DbResult<Box<dyn Stmt>> {
        let Some(preparer) = self
            .conn
            .as_preparer()
            .filter(|_| self.supports(Capability::Prepare))
        else {
            return Err(DbError::Unsupported(Capability::Prepare));
        };
        match &self.hooks.prepare {
            Some(hook) => hook.prepare(ctx, query, preparer).await,
            None => preparer.prepare_context(ctx, query).await,
        }
    }
}

#[async_trait]
impl ConnBeginTx for InterceptedConn {
    async fn begin_tx(&self, ctx: &Context, opts: TxOptions) -> DbResult<Box<dyn Tx>> {
        let Some(beginner) = self
            .conn
            .as_beginner()
            .filter(|_| self.supports(Capability::BeginTx))
        else {
            return Err(DbError::Unsupported(Capability::BeginTx));
        };
        match &self.hooks.begin_tx {
            Some(hook) => hook.begin_tx(ctx, opts, beginner).await,
            None => beginner.begin_tx(ctx, opts).await,
        }
    }
}

#[async_trait]
impl SessionResetter for InterceptedConn {
    async fn reset_session(&self, ctx: &Context) -> DbResult<()> {
        match self.conn.as_session_resetter() {
            Some(resetter) => resetter.reset_session(ctx).await,
            None => Ok(()),
        }
    }
}

impl Validator for InterceptedConn {
    fn is_valid(&self) -> bool {
        self.conn
            .as_validator()
            .is_none_or(|validator| validator.is_valid())
    }
}

impl NamedValueChecker for InterceptedConn {
    fn check_named_value(&self, value: &mut NamedValue) -> DbResult<()> {
        match self.conn.as_named_value_checker() {
            Some(checker) => checker.check_named_value(value),
            None => Err(DbError::Skip),
        }
    }
}
