//! Live-catalog inspection.
//!
//! A [`LiveSchemaSnapshot`] is what one reconciliation pass knows about the
//! store: which of the managed tables exist, and which columns they have.
//! It is read fresh per pass and discarded afterwards.
//!
//! Failure handling follows a strict asymmetry: if the store *answered* but
//! a single check failed, the table is conservatively treated as absent
//! (the resulting redundant DDL is rejected harmlessly by the store). If
//! the store is *unreachable*, the whole pass aborts with
//! [`Error::CatalogUnavailable`] — an empty catalog answer and a dead
//! connection must never be confused.

use crate::store::Conn;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// What the live schema looked like at the start of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSchemaSnapshot {
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl LiveSchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a table and its columns.
    pub fn insert_table<I, S>(&mut self, name: impl Into<String>, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.insert(
            name.into(),
            columns.into_iter().map(Into::into).collect(),
        );
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Columns of a table, or `None` if the table is absent.
    pub fn columns(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.tables.get(table)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns(table).is_some_and(|cols| cols.contains(column))
    }
}

/// Read access to the store's catalog.
pub trait Catalog: Sync {
    /// True iff a table of that name exists in the active schema.
    fn table_exists(&self, table: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Column names of a table; empty set if the table does not exist.
    fn list_columns(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<BTreeSet<String>>> + Send;

    /// Batch the per-table reads into one pass-scoped snapshot.
    fn snapshot(
        &self,
        tables: &[&str],
    ) -> impl Future<Output = Result<LiveSchemaSnapshot>> + Send {
        snapshot_each(self, tables)
    }
}

/// Per-table snapshot fallback: one existence check and one column listing
/// per managed table, with the conservative single-check failure policy.
async fn snapshot_each<C: Catalog + Sync + ?Sized>(
    catalog: &C,
    tables: &[&str],
) -> Result<LiveSchemaSnapshot> {
    let mut snapshot = LiveSchemaSnapshot::new();
    for name in tables {
        let result = match catalog.table_exists(name).await {
            Ok(false) => continue,
            Ok(true) => catalog.list_columns(name).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(columns) => snapshot.insert_table(*name, columns),
            Err(e) if !e.is_connection_loss() => {
                // The store answered with a rejection; treat the table as
                // absent and let it refuse any redundant DDL itself.
                tracing::warn!(
                    table = %name,
                    error = %e,
                    "catalog check failed, treating table as absent"
                );
            }
            Err(e) => return Err(Error::CatalogUnavailable(e.to_string())),
        }
    }
    Ok(snapshot)
}

/// The Postgres catalog, read through `information_schema`.
pub struct PgCatalog<'a, C: Conn> {
    conn: &'a C,
}

impl<'a, C: Conn> PgCatalog<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

impl<C: Conn> Catalog for PgCatalog<'_, C> {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let rows = self
            .conn
            .query(
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1",
                &[&table],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn list_columns(&self, table: &str) -> Result<BTreeSet<String>> {
        let rows = self
            .conn
            .query(
                "SELECT column_name::text FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1",
                &[&table],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    /// One round trip for all managed tables instead of two per table.
    /// Falls back to the per-table path if the store rejects the batch
    /// query (it still aborts outright on connection loss).
    async fn snapshot(&self, tables: &[&str]) -> Result<LiveSchemaSnapshot> {
        let names: Vec<String> = tables.iter().map(|t| t.to_string()).collect();

        let batch = async {
            let mut snapshot = LiveSchemaSnapshot::new();
            let rows = self
                .conn
                .query(
                    "SELECT table_name::text FROM information_schema.tables \
                     WHERE table_schema = current_schema() \
                       AND table_name = ANY($1::text[])",
                    &[&names],
                )
                .await?;
            for row in &rows {
                let table: String = row.get(0);
                snapshot.insert_table(table, Vec::<String>::new());
            }

            let rows = self
                .conn
                .query(
                    "SELECT table_name::text, column_name::text \
                     FROM information_schema.columns \
                     WHERE table_schema = current_schema() \
                       AND table_name = ANY($1::text[])",
                    &[&names],
                )
                .await?;
            let mut columns: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for row in &rows {
                columns
                    .entry(row.get(0))
                    .or_default()
                    .push(row.get(1));
            }
            for (table, cols) in columns {
                snapshot.insert_table(table, cols);
            }
            Ok::<_, Error>(snapshot)
        };

        match batch.await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) if e.is_connection_loss() => {
                Err(Error::CatalogUnavailable(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "batched catalog read failed, falling back to per-table checks"
                );
                snapshot_each(self, tables).await
            }
        }
    }
}
