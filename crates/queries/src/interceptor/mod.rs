//! Driver interception.
//!
//! [`Interceptor`] wraps a [`Driver`] and lets calling code observe or
//! replace exec, query, prepare and begin-tx calls without wrapping the
//! [`Db`](crate::Db) handle itself. The main use case is instrumenting code
//! with logs, metrics and traces.
//!
//! An interceptor must be registered under a name before it can be opened:
//!
//! ```rust,ignore
//! use queries::{Db, Interceptor, registry};
//!
//! let interceptor = Interceptor::new(my_driver)
//!     .with_exec_hook(MyExecHook)
//!     .with_query_hook(MyQueryHook);
//! registry::register("interceptor", interceptor)?;
//! let db = Db::open("interceptor", "dsn")?;
//! ```
//!
//! Only the driver is required; every callback is optional.
//!
//! Some drivers implement `ExecerContext`/`QueryerContext` only partially
//! and return [`DbError::Skip`](crate::DbError::Skip), which the runtime
//! interprets as a signal to fall back to a prepared statement. A MySQL
//! style driver, for example, only executes directly when the query has no
//! arguments and otherwise prepares, executes and closes a statement. In such
//! cases register a [`PrepareHook`] together with the exec/query hooks, even
//! if you never prepare statements yourself.

mod conn;
mod connector;
mod hooks;
mod stats;

#[cfg(feature = "tracing")]
mod tracing_hook;


pub use conn::InterceptedConn;
pub use connector::InterceptedConnector;
pub use hooks::{BeginTxHook, ExecHook, PrepareHook, QueryHook};
pub use stats::{HookStats, OpStats, StatsHook};

#[cfg(feature = "tracing")]
pub use tracing_hook::TracingHook;

use crate::context::Context;
use crate::driver::{Conn, Connector, Driver, DriverContext, DsnConnector};
use crate::error::DbResult;
use async_trait::async_trait;
use hooks::Hooks;
use std::fmt;
use std::sync::Arc;

/// A [`Driver`] wrapper that routes connection operations through callbacks.
#[derive(Clone)]
pub struct Interceptor {
    driver: Arc<dyn Driver>,
    hooks: Arc<Hooks>,
}

impl Interceptor {
    /// Wrap `driver` with no callbacks.
    ///
    /// The driver's connections should implement `Pinger`,
    /// `ConnPrepareContext` and `ConnBeginTx`; calling those operations on a
    /// connection that lacks them fails with
    /// [`DbError::Unsupported`](crate::DbError::Unsupported).
    pub fn new<D: Driver>(driver: D) -> Self {
        Self::from_arc(Arc::new(driver))
    }

    /// Wrap a shared driver with no callbacks.
    pub fn from_arc(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            hooks: Arc::new(Hooks::default()),
        }
    }

    fn hooks_mut(&mut self) -> &mut Hooks {
        Arc::make_mut(&mut self.hooks)
    }

    /// Set the exec callback.
    pub fn with_exec_hook<H: ExecHook + 'static>(self, hook: H) -> Self {
        self.with_exec_hook_arc(Arc::new(hook))
    }

    /// Set the exec callback from an `Arc`.
    pub fn with_exec_hook_arc(mut self, hook: Arc<dyn ExecHook>) -> Self {
        self.hooks_mut().exec = Some(hook);
        self
    }

    /// Set the query callback.
    pub fn with_query_hook<H: QueryHook + 'static>(self, hook: H) -> Self {
        self.with_query_hook_arc(Arc::new(hook))
    }

    /// Set the query callback from an `Arc`.
    pub fn with_query_hook_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hooks_mut().query = Some(hook);
        self
    }

    /// Set the prepare callback.
    pub fn with_prepare_hook<H: PrepareHook + 'static>(self, hook: H) -> Self {
        self.with_prepare_hook_arc(Arc::new(hook))
    }

    /// Set the prepare callback from an `Arc`.
    pub fn with_prepare_hook_arc(mut self, hook: Arc<dyn PrepareHook>) -> Self {
        self.hooks_mut().prepare = Some(hook);
        self
    }

    /// Set the begin-tx callback.
    pub fn with_begin_tx_hook<H: BeginTxHook + 'static>(self, hook: H) -> Self {
        self.with_begin_tx_hook_arc(Arc::new(hook))
    }

    /// Set the begin-tx callback from an `Arc`.
    pub fn with_begin_tx_hook_arc(mut self, hook: Arc<dyn BeginTxHook>) -> Self {
        self.hooks_mut().begin_tx = Some(hook);
        self
    }

    /// Use one value for all four callbacks.
    pub fn with_hooks<H>(self, hooks: Arc<H>) -> Self
    where
        H: ExecHook + QueryHook + PrepareHook + BeginTxHook + 'static,
    {
        self.with_exec_hook_arc(hooks.clone())
            .with_query_hook_arc(hooks.clone())
            .with_prepare_hook_arc(hooks.clone())
            .with_begin_tx_hook_arc(hooks)
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Like [`DriverContext::open_connector`], returning the concrete connector.
    pub fn intercepted_connector(&self, name: &str) -> DbResult<InterceptedConnector> {
        let connector: Arc<dyn Connector> = match self.driver.as_driver_context() {
            Some(driver) => driver.open_connector(name)?,
            None => Arc::new(DsnConnector::new(name, self.driver.clone())),
        };
        Ok(InterceptedConnector::new(connector, self.hooks.clone()))
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for Interceptor {
    /// Runtimes always go through [`DriverContext`]; this opens a single
    /// connection the same way, with a background context.
    async fn open(&self, name: &str) -> DbResult<Box<dyn Conn>> {
        self.intercepted_connector(name)?
            .connect(&Context::background())
            .await
    }

    fn as_driver_context(&self) -> Option<&dyn DriverContext> {
        Some(self)
    }
}

impl DriverContext for Interceptor {
    fn open_connector(&self, name: &str) -> DbResult<Arc<dyn Connector>> {
        Ok(Arc::new(self.intercepted_connector(name)?))
    }
}
