//! Typed query helpers on top of [`Db`] and [`DbTx`].
//!
//! ```ignore
//! let users: Vec<User> = queries::query_all(&db, &ctx, "SELECT id, name FROM users", &[]).await?;
//! let count: i64 = queries::query_row(&db, &ctx, "SELECT count(*) FROM users", &[]).await?;
//! ```

use crate::context::Context;
use crate::db::{Db, DbRows, DbTx};
use crate::driver::Value;
use crate::error::{DbError, DbResult};
use crate::row::FromRow;
use std::future::Future;
use std::marker::PhantomData;

/// Something that runs queries: a [`Db`] or a [`DbTx`].
///
/// This lets helpers accept either a database handle or a transaction.
pub trait Queryer: Send + Sync {
    /// Execute a query and return the open rows.
    fn query_rows(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> impl Future<Output = DbResult<DbRows>> + Send;
}

impl Queryer for Db {
    fn query_rows(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> impl Future<Output = DbResult<DbRows>> + Send {
        self.query(ctx, query, args)
    }
}

impl Queryer for DbTx {
    fn query_rows(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> impl Future<Output = DbResult<DbRows>> + Send {
        self.query(ctx, query, args)
    }
}

/// Rows decoded into `T` one at a time.
///
/// The underlying rows are closed once exhausted, on the first error, or by
/// [`TypedRows::close`].
pub struct TypedRows<T> {
    rows: DbRows,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromRow> TypedRows<T> {
    pub fn new(rows: DbRows) -> Self {
        Self {
            rows,
            _marker: PhantomData,
        }
    }

    pub fn columns(&self) -> &[String] {
        self.rows.columns()
    }

    /// The next decoded row, or `None` when the rows are exhausted.
    pub async fn next(&mut self) -> DbResult<Option<T>> {
        let Some(row) = self.rows.next().await? else {
            return Ok(None);
        };
        match T::from_row(&row) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                let _ = self.rows.close().await;
                Err(err)
            }
        }
    }

    /// Decode every remaining row, stopping at the first error.
    pub async fn collect(mut self) -> DbResult<Vec<T>> {
        let mut out = Vec::new();
        while let Some(value) = self.next().await? {
            out.push(value);
        }
        Ok(out)
    }

    pub async fn close(mut self) -> DbResult<()> {
        self.rows.close().await
    }
}

/// Execute a query and decode its rows lazily.
pub async fn query_as<T, Q>(
    q: &Q,
    ctx: &Context,
    query: &str,
    args: &[Value],
) -> DbResult<TypedRows<T>>
where
    T: FromRow,
    Q: Queryer + ?Sized,
{
    Ok(TypedRows::new(q.query_rows(ctx, query, args).await?))
}

/// Execute a query and decode every row.
pub async fn query_all<T, Q>(q: &Q, ctx: &Context, query: &str, args: &[Value]) -> DbResult<Vec<T>>
where
    T: FromRow,
    Q: Queryer + ?Sized,
{
    query_as::<T, Q>(q, ctx, query, args)
        .await?
        .collect()
        .await
}

/// Execute a query expected to return at most one row.
///
/// Returns [`DbError::NoRows`] if the query selects no rows; otherwise decodes
/// the first row and discards the rest.
pub async fn query_row<T, Q>(q: &Q, ctx: &Context, query: &str, args: &[Value]) -> DbResult<T>
where
    T: FromRow,
    Q: Queryer + ?Sized,
{
    let mut rows = q.query_rows(ctx, query, args).await?;
    scan_row(&mut rows).await
}

/// Decode every remaining row of `rows`.
pub async fn scan_all<T: FromRow>(rows: &mut DbRows) -> DbResult<Vec<T>> {
    let mut out = Vec::new();
    loop {
        let Some(row) = rows.next().await? else {
            return Ok(out);
        };
        match T::from_row(&row) {
            Ok(value) => out.push(value),
            Err(err) => {
                let _ = rows.close().await;
                return Err(err);
            }
        }
    }
}

/// Decode the next row of `rows` and close them.
pub async fn scan_row<T: FromRow>(rows: &mut DbRows) -> DbResult<T> {
    let first = rows.next().await?;
    let closed = rows.close().await;
    let row = first.ok_or(DbError::NoRows)?;
    let value = T::from_row(&row)?;
    closed?;
    Ok(value)
}
