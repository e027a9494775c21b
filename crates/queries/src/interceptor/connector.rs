use super::conn::InterceptedConn;
use super::hooks::Hooks;
use crate::context::Context;
use crate::driver::{Conn, Connector, Driver};
use crate::error::DbResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Wraps every connection produced by the underlying connector in an
/// [`InterceptedConn`].
pub struct InterceptedConnector {
    connector: Arc<dyn Connector>,
    hooks: Arc<Hooks>,
}

impl InterceptedConnector {
    pub(crate) fn new(connector: Arc<dyn Connector>, hooks: Arc<Hooks>) -> Self {
        Self { connector, hooks }
    }

    /// Connect and return the concrete wrapper (useful to inspect its capabilities).
    pub async fn connect_intercepted(&self, ctx: &Context) -> DbResult<InterceptedConn> {
        let conn = self.connector.connect(ctx).await?;
        let conn = InterceptedConn::new(conn, self.hooks.clone());

        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: "queries.interceptor",
            capabilities = ?conn.capabilities(),
            "wrapped driver connection"
        );

        Ok(conn)
    }
}

#[async_trait]
impl Connector for InterceptedConnector {
    async fn connect(&self, ctx: &Context) -> DbResult<Box<dyn Conn>> {
        Ok(Box::new(self.connect_intercepted(ctx).await?))
    }

    fn driver(&self) -> Arc<dyn Driver> {
        self.connector.driver()
    }
}
