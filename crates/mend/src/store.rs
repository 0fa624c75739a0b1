//! The store connection seam.
//!
//! [`Conn`] is the narrow, dyn-compatible surface the engine needs from a
//! relational store: execute a statement, run a catalog query. It is
//! implemented for `tokio_postgres::Client` and `deadpool_postgres::Object`;
//! tests implement it with in-memory fakes.
//!
//! Every round trip is wrapped in a `tracing` span so the host's subscriber
//! sees each statement without the engine writing anywhere directly.

use crate::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use tracing::Instrument;

/// A database connection that can execute statements and run queries.
pub trait Conn: Send + Sync {
    /// Execute a statement, returning the number of rows affected.
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>>;

    /// Execute a query, returning all rows.
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Row>>> + Send + 'a>>;
}

async fn execute_traced(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<u64> {
    let span = tracing::debug_span!(
        "db.execute",
        sql = %sql,
        params = params.len(),
        affected = tracing::field::Empty,
    );
    let affected = client
        .execute(sql, params)
        .instrument(span.clone())
        .await
        .map_err(Error::from)?;
    span.record("affected", affected);
    Ok(affected)
}

async fn query_traced(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Vec<Row>> {
    let span = tracing::debug_span!(
        "db.query",
        sql = %sql,
        params = params.len(),
        rows = tracing::field::Empty,
    );
    let rows = client
        .query(sql, params)
        .instrument(span.clone())
        .await
        .map_err(Error::from)?;
    span.record("rows", rows.len());
    Ok(rows)
}

impl Conn for tokio_postgres::Client {
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        Box::pin(execute_traced(self, sql, params))
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Row>>> + Send + 'a>> {
        Box::pin(query_traced(self, sql, params))
    }
}

impl Conn for deadpool_postgres::Object {
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        // Deref to the underlying Client to avoid recursing into this impl
        use std::ops::Deref;
        Box::pin(execute_traced(self.deref(), sql, params))
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Row>>> + Send + 'a>> {
        use std::ops::Deref;
        Box::pin(query_traced(self.deref(), sql, params))
    }
}
