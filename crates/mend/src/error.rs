use thiserror::Error;

/// Errors produced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// The store could not be reached at all. The current pass is aborted
    /// without attempting any action; it is never treated as "empty schema".
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The store rejected a statement (duplicate column from a concurrent
    /// pass, permission denied, statement timeout, ...).
    #[error("store rejected statement: {0}")]
    Rejected(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// True if this error means the store itself is unreachable, as opposed
    /// to the store having answered with a rejection.
    ///
    /// A `tokio_postgres` error that carries no server-side `DbError` is an
    /// I/O or protocol failure; one that does carry it means the server was
    /// alive enough to refuse us.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            Error::Postgres(e) => e.as_db_error().is_none(),
            Error::Pool(_) | Error::CatalogUnavailable(_) => true,
            Error::Rejected(_) | Error::Config(_) | Error::Validation(_) => false,
        }
    }
}

/// A desired-schema model that cannot be reconciled against anything.
///
/// These are raised once, at model construction, before any pass runs. The
/// engine refuses to operate on an invalid model rather than execute an
/// undefined plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cyclic foreign-key dependency: {cycle}")]
    CyclicDependency { cycle: String },

    #[error("duplicate table {table}")]
    DuplicateTable { table: String },

    #[error("table {table}: duplicate column {column}")]
    DuplicateColumn { table: String, column: String },

    #[error("table {table}: {context} references undeclared column {column}")]
    UnknownColumn {
        table: String,
        column: String,
        context: &'static str,
    },

    #[error(
        "table {table}: column {column} is both declared and marked superseded"
    )]
    SupersededDeclared { table: String, column: String },

    #[error(
        "table {table}: rename source {column} is still a declared column"
    )]
    RenameSourceDeclared { table: String, column: String },
}
