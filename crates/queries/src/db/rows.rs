use super::Db;
use crate::driver::{Conn, Rows, Stmt, Value};
use crate::error::DbResult;
use crate::row::Row;
use std::fmt;
use std::sync::Arc;

/// An open result set.
///
/// Rows obtained from [`Db::query`] hold a connection until they are
/// exhausted or [`closed`](DbRows::close). Dropping them without closing
/// discards that connection instead of returning it for reuse.
pub struct DbRows {
    rows: Box<dyn Rows>,
    stmt: Option<Box<dyn Stmt>>,
    columns: Arc<[String]>,
    release: Option<(Db, Box<dyn Conn>)>,
    done: bool,
}

impl DbRows {
    pub(crate) fn new(
        rows: Box<dyn Rows>,
        stmt: Option<Box<dyn Stmt>>,
        release: Option<(Db, Box<dyn Conn>)>,
    ) -> Self {
        let columns: Arc<[String]> = rows.columns().into();
        Self {
            rows,
            stmt,
            columns,
            release,
            done: false,
        }
    }

    /// Column names of the result set.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Fetch the next row; `None` once the rows are exhausted (they are then
    /// closed automatically).
    pub async fn next(&mut self) -> DbResult<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        let mut values = vec![Value::Null; self.columns.len()];
        match self.rows.next(&mut values).await {
            Ok(true) => Ok(Some(Row::new(self.columns.clone(), values))),
            Ok(false) => {
                self.finish(false).await?;
                Ok(None)
            }
            Err(err) => {
                let _ = self.finish(err.is_bad_conn()).await;
                Err(err)
            }
        }
    }

    /// Close the rows and release the connection. Closing twice is a no-op.
    pub async fn close(&mut self) -> DbResult<()> {
        self.finish(false).await
    }

    async fn finish(&mut self, bad: bool) -> DbResult<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        let closed = self.rows.close().await;
        let stmt_closed = match self.stmt.take() {
            Some(stmt) => stmt.close().await,
            None => Ok(()),
        };
        if let Some((db, conn)) = self.release.take() {
            let bad = bad || matches!(&closed, Err(err) if err.is_bad_conn());
            db.release(conn, bad).await;
        }
        closed.and(stmt_closed)
    }
}

impl fmt::Debug for DbRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbRows")
            .field("columns", &self.columns)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
