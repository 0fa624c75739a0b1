//! Runtime schema reconciliation for Postgres.
//!
//! You declare the schema your application needs as data — tables, columns,
//! foreign keys, indexes, plus transition rules for legacy layouts — and
//! `mend` converges the live database toward it at runtime. No migration
//! files, no version ledger: each pass reads the catalog, diffs it against
//! the declaration, and applies the missing pieces.
//!
//! The engine is strictly additive. It creates tables and columns that are
//! missing and backfills renamed or freshly added columns, but the only
//! thing it ever drops is a column the model *explicitly* marks as
//! superseded. Columns and tables it does not know about are left alone.
//!
//! A pass never fails the caller: [`Reconciler::reconcile`] always returns
//! an [`ExecutionReport`], and an unreachable store shows up as an aborted
//! report rather than an error. Individual statement failures are isolated
//! per action and retried naturally on the next pass.
//!
//! ```no_run
//! use mend::{ColumnSpec, DesiredSchema, Reconciler, SqlType, TableSpec};
//!
//! # async fn demo() -> mend::Result<()> {
//! let model = DesiredSchema::new(vec![
//!     TableSpec::new("users")
//!         .column(ColumnSpec::new("id", SqlType::BigInt))
//!         .column(ColumnSpec::new("email", SqlType::Text))
//!         .primary_key(&["id"])
//!         .unique_index(&["email"]),
//! ])?;
//!
//! let reconciler = Reconciler::from_env(model)?;
//! let report = reconciler.reconcile().await;
//! if !report.is_clean() {
//!     eprintln!("{report}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod ddl;
pub mod error;
pub mod executor;
pub mod plan;
pub mod planner;
pub mod reconciler;
pub mod schema;
pub mod store;

pub use catalog::{Catalog, LiveSchemaSnapshot, PgCatalog};
pub use config::StoreConfig;
pub use error::{Error, ValidationError};
pub use executor::{ActionReport, ExecutionReport, Executor, Outcome};
pub use plan::{ReconciliationAction, ReconciliationPlan};
pub use planner::plan;
pub use reconciler::Reconciler;
pub use schema::{
    ColumnSpec, DesiredSchema, ForeignKeySpec, IndexSpec, OnDelete, SqlType, TableSpec,
    TransitionRule,
};
pub use store::Conn;

pub type Result<T, E = Error> = std::result::Result<T, E>;
