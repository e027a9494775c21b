use super::{Db, DbRows, named_values, run};
use crate::context::Context;
use crate::driver::{Conn, ExecResult, Stmt, Value};
use crate::error::{DbError, DbResult};

/// A prepared statement bound to one connection.
///
/// The connection is released by [`DbStmt::close`].
pub struct DbStmt {
    db: Db,
    conn: Option<Box<dyn Conn>>,
    stmt: Box<dyn Stmt>,
}

impl DbStmt {
    pub(crate) fn new(db: Db, conn: Box<dyn Conn>, stmt: Box<dyn Stmt>) -> Self {
        Self {
            db,
            conn: Some(conn),
            stmt,
        }
    }

    /// Number of placeholders, if the driver reports it.
    pub fn num_input(&self) -> Option<usize> {
        self.stmt.num_input()
    }

    fn conn(&self) -> DbResult<&dyn Conn> {
        self.conn
            .as_deref()
            .ok_or_else(|| DbError::Other("queries: statement is closed".into()))
    }

    fn check_args(&self, args: &[Value]) -> DbResult<()> {
        match self.stmt.num_input() {
            Some(want) if want != args.len() => Err(DbError::bad_query(format!(
                "expected {want} arguments, got {}",
                args.len()
            ))),
            _ => Ok(()),
        }
    }

    pub async fn exec(&self, ctx: &Context, args: &[Value]) -> DbResult<Box<dyn ExecResult>> {
        self.check_args(args)?;
        let args = named_values(self.conn()?, args)?;
        run(ctx, self.stmt.exec(ctx, &args)).await
    }

    /// Run the statement as a query. The rows do not own the connection.
    pub async fn query(&self, ctx: &Context, args: &[Value]) -> DbResult<DbRows> {
        self.check_args(args)?;
        let args = named_values(self.conn()?, args)?;
        let rows = run(ctx, self.stmt.query(ctx, &args)).await?;
        Ok(DbRows::new(rows, None, None))
    }

    /// Close the statement and release its connection.
    pub async fn close(mut self) -> DbResult<()> {
        let result = self.stmt.close().await;
        if let Some(conn) = self.conn.take() {
            let bad = matches!(&result, Err(err) if err.is_bad_conn());
            self.db.release(conn, bad).await;
        }
        result
    }
}
