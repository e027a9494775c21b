//! Test doubles for code built on `queries`.
//!
//! [`TestDriver`] answers exec and query calls from closures, so a test can
//! assert on the SQL and arguments it receives and return canned results:
//!
//! ```ignore
//! use queries_test::{TestDriver, TestRows, new_db};
//!
//! let driver = TestDriver::new().with_query(|query, _args| {
//!     assert_eq!(query, "SELECT id FROM users");
//!     Ok(Box::new(TestRows::new(["id"]).add([1]).add([2])))
//! });
//! let db = new_db("users_test", driver)?;
//! let ids: Vec<i64> = queries::query_all(&db, &ctx, "SELECT id FROM users", &[]).await?;
//! ```

use async_trait::async_trait;
use queries::driver::{
    Conn, ConnBeginTx, ExecResult, ExecerContext, NamedValue, QueryerContext, Rows, Stmt, Tx,
};
use queries::{Context, Db, DbError, DbResult, Driver, TxOptions, Value, registry};
use std::fmt;
use std::sync::Arc;

/// Closure answering `ExecerContext::exec_context`.
pub type ExecFn = dyn Fn(&str, &[Value]) -> DbResult<Box<dyn ExecResult>> + Send + Sync;

/// Closure answering `QueryerContext::query_context`.
pub type QueryFn = dyn Fn(&str, &[Value]) -> DbResult<Box<dyn Rows>> + Send + Sync;

/// A driver whose connections call user supplied closures.
///
/// Connections support direct exec, direct query and transactions (which
/// do nothing). Prepared statements are not supported. Calling an
/// operation whose closure is unset fails with an error naming it.
#[derive(Clone, Default)]
pub struct TestDriver {
    exec: Option<Arc<ExecFn>>,
    query: Option<Arc<QueryFn>>,
}

impl TestDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exec<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &[Value]) -> DbResult<Box<dyn ExecResult>> + Send + Sync + 'static,
    {
        self.exec = Some(Arc::new(f));
        self
    }

    pub fn with_query<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &[Value]) -> DbResult<Box<dyn Rows>> + Send + Sync + 'static,
    {
        self.query = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for TestDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDriver")
            .field("exec", &self.exec.is_some())
            .field("query", &self.query.is_some())
            .finish()
    }
}

#[async_trait]
impl Driver for TestDriver {
    async fn open(&self, _name: &str) -> DbResult<Box<dyn Conn>> {
        Ok(Box::new(TestConn {
            driver: self.clone(),
        }))
    }
}

/// Register `driver` under `name` and open a [`Db`] on it.
///
/// Driver names are process-wide, so give every test its own name.
pub fn new_db<D: Driver>(name: &str, driver: D) -> DbResult<Db> {
    registry::register(name, driver)?;
    Db::open(name, "")
}

struct TestConn {
    driver: TestDriver,
}

fn values(args: &[NamedValue]) -> Vec<Value> {
    args.iter().map(|arg| arg.value.clone()).collect()
}

#[async_trait]
impl Conn for TestConn {
    async fn prepare(&self, _query: &str) -> DbResult<Box<dyn Stmt>> {
        Err(DbError::Other(
            "queries-test: prepared statements are not supported".into(),
        ))
    }

    async fn close(&self) -> DbResult<()> {
        Ok(())
    }

    async fn begin(&self) -> DbResult<Box<dyn Tx>> {
        Ok(Box::new(TestTx))
    }

    fn as_execer(&self) -> Option<&dyn ExecerContext> {
        Some(self)
    }

    fn as_queryer(&self) -> Option<&dyn QueryerContext> {
        Some(self)
    }

    fn as_beginner(&self) -> Option<&dyn ConnBeginTx> {
        Some(self)
    }
}

#[async_trait]
impl ExecerContext for TestConn {
    async fn exec_context(
        &self,
        _ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<Box<dyn ExecResult>> {
        let exec = self.driver.exec.as_ref().ok_or_else(|| {
            DbError::Other("queries-test: TestDriver.exec is not set".into())
        })?;
        exec(query, &values(args))
    }
}

#[async_trait]
impl QueryerContext for TestConn {
    async fn query_context(
        &self,
        _ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<Box<dyn Rows>> {
        let query_fn = self.driver.query.as_ref().ok_or_else(|| {
            DbError::Other("queries-test: TestDriver.query is not set".into())
        })?;
        query_fn(query, &values(args))
    }
}

#[async_trait]
impl ConnBeginTx for TestConn {
    async fn begin_tx(&self, _ctx: &Context, _opts: TxOptions) -> DbResult<Box<dyn Tx>> {
        Ok(Box::new(TestTx))
    }
}

struct TestTx;

#[async_trait]
impl Tx for TestTx {
    async fn commit(&self) -> DbResult<()> {
        Ok(())
    }

    async fn rollback(&self) -> DbResult<()> {
        Ok(())
    }
}

/// A canned exec result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestResult {
    last_insert_id: i64,
    rows_affected: i64,
}

impl TestResult {
    pub fn new(last_insert_id: i64, rows_affected: i64) -> Self {
        Self {
            last_insert_id,
            rows_affected,
        }
    }
}

impl ExecResult for TestResult {
    fn last_insert_id(&self) -> DbResult<i64> {
        Ok(self.last_insert_id)
    }

    fn rows_affected(&self) -> DbResult<i64> {
        Ok(self.rows_affected)
    }
}

/// An in-memory result set.
#[derive(Debug, Clone, Default)]
pub struct TestRows {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    next: usize,
}

impl TestRows {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            next: 0,
        }
    }

    /// Append a row. Its length must match the number of columns.
    pub fn add<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl Rows for TestRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next(&mut self, dest: &mut [Value]) -> DbResult<bool> {
        let Some(row) = self.rows.get(self.next) else {
            return Ok(false);
        };
        if row.len() != dest.len() {
            return Err(DbError::Other(format!(
                "queries-test: row {} has {} values, want {}",
                self.next,
                row.len(),
                dest.len()
            )));
        }
        dest.clone_from_slice(row);
        self.next += 1;
        Ok(true)
    }

    async fn close(&mut self) -> DbResult<()> {
        self.next = self.rows.len();
        Ok(())
    }
}
