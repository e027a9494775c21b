use super::{Db, DbRows, exec_conn, query_conn};
use crate::context::Context;
use crate::driver::{Conn, ExecResult, Tx, Value};
use crate::error::{DbError, DbResult};

/// An in-progress transaction on one connection.
///
/// [`commit`](DbTx::commit) or [`rollback`](DbTx::rollback) ends it and
/// releases the connection; after that every call fails with
/// [`DbError::TxDone`].
///
/// Dropping a `DbTx` that was neither committed nor rolled back does not
/// roll it back: the connection is discarded without being closed, so the
/// driver sees the transaction end only when its connection goes away.
pub struct DbTx {
    db: Db,
    conn: Option<Box<dyn Conn>>,
    tx: Option<Box<dyn Tx>>,
}

impl DbTx {
    pub(crate) fn new(db: Db, conn: Box<dyn Conn>, tx: Box<dyn Tx>) -> Self {
        Self {
            db,
            conn: Some(conn),
            tx: Some(tx),
        }
    }

    fn conn(&self) -> DbResult<&dyn Conn> {
        match (&self.conn, &self.tx) {
            (Some(conn), Some(_)) => Ok(conn.as_ref()),
            _ => Err(DbError::TxDone),
        }
    }

    pub fn is_done(&self) -> bool {
        self.tx.is_none()
    }

    pub async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> DbResult<Box<dyn ExecResult>> {
        exec_conn(self.conn()?, ctx, query, args).await
    }

    /// Query inside the transaction. Close the rows before committing.
    pub async fn query(&self, ctx: &Context, query: &str, args: &[Value]) -> DbResult<DbRows> {
        let (rows, stmt) = query_conn(self.conn()?, ctx, query, args).await?;
        Ok(DbRows::new(rows, stmt, None))
    }

    pub async fn commit(&mut self) -> DbResult<()> {
        let tx = self.tx.take().ok_or(DbError::TxDone)?;
        let result = tx.commit().await;
        self.finish(&result).await;
        result
    }

    pub async fn rollback(&mut self) -> DbResult<()> {
        let tx = self.tx.take().ok_or(DbError::TxDone)?;
        let result = tx.rollback().await;
        self.finish(&result).await;
        result
    }

    async fn finish(&mut self, result: &DbResult<()>) {
        if let Some(conn) = self.conn.take() {
            let bad = matches!(result, Err(err) if err.is_bad_conn());
            self.db.release(conn, bad).await;
        }
    }
}
