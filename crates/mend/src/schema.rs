//! The desired-schema model.
//!
//! A [`DesiredSchema`] is a declarative, immutable description of every
//! table the engine manages: columns, primary key, foreign keys, indexes,
//! plus the legacy-transition rules (renames, backfills) and the explicit
//! list of superseded columns the engine is allowed to drop.
//!
//! The model is data, not code: the planner interprets it against a live
//! catalog snapshot. It is built once at process start; construction
//! validates everything eagerly (foreign keys over managed tables must form
//! a DAG, every referenced column must be declared) so a malformed model is
//! a startup failure, never a per-pass one.
//!
//! ## Naming convention
//!
//! Table and column names use lower snake_case, matching what
//! `information_schema` reports for unquoted identifiers.

use crate::error::ValidationError;
use indexmap::IndexMap;

/// Postgres column types the model can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// SMALLINT (2 bytes)
    SmallInt,
    /// INTEGER (4 bytes)
    Integer,
    /// BIGINT (8 bytes)
    BigInt,
    /// REAL (4 bytes floating point)
    Real,
    /// DOUBLE PRECISION (8 bytes floating point)
    DoublePrecision,
    /// NUMERIC (arbitrary precision)
    Numeric,
    /// BOOLEAN
    Boolean,
    /// TEXT
    Text,
    /// BYTEA (binary)
    Bytea,
    /// TIMESTAMPTZ
    Timestamptz,
    /// DATE
    Date,
    /// UUID
    Uuid,
    /// JSONB
    Jsonb,
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlType::SmallInt => write!(f, "SMALLINT"),
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::BigInt => write!(f, "BIGINT"),
            SqlType::Real => write!(f, "REAL"),
            SqlType::DoublePrecision => write!(f, "DOUBLE PRECISION"),
            SqlType::Numeric => write!(f, "NUMERIC"),
            SqlType::Boolean => write!(f, "BOOLEAN"),
            SqlType::Text => write!(f, "TEXT"),
            SqlType::Bytea => write!(f, "BYTEA"),
            SqlType::Timestamptz => write!(f, "TIMESTAMPTZ"),
            SqlType::Date => write!(f, "DATE"),
            SqlType::Uuid => write!(f, "UUID"),
            SqlType::Jsonb => write!(f, "JSONB"),
        }
    }
}

/// A declared column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Column name, unique within its table.
    pub name: String,
    /// Postgres type.
    pub sql_type: SqlType,
    /// Whether the column allows NULL.
    pub nullable: bool,
    /// Default value expression, if any.
    ///
    /// A NOT NULL column added to a table that already holds rows needs one,
    /// otherwise the store rejects the `ALTER TABLE` and the action is
    /// reported as failed.
    pub default: Option<String>,
    /// Generated-column expression (`GENERATED ALWAYS AS (...) STORED`).
    pub computed: Option<String>,
}

impl ColumnSpec {
    /// A NOT NULL column with no default.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: false,
            default: None,
            computed: None,
        }
    }

    /// Allow NULL.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set a default value expression.
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Make this a stored generated column.
    pub fn computed_expr(mut self, expr: impl Into<String>) -> Self {
        self.computed = Some(expr.into());
        self
    }
}

/// Referential action for `ON DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDelete {
    /// Store default (NO ACTION); renders as nothing.
    #[default]
    NoAction,
    Cascade,
    SetNull,
    Restrict,
}

impl OnDelete {
    /// SQL clause for this action, or empty string for the default.
    pub fn to_sql(&self) -> &'static str {
        match self {
            OnDelete::NoAction => "",
            OnDelete::Cascade => " ON DELETE CASCADE",
            OnDelete::SetNull => " ON DELETE SET NULL",
            OnDelete::Restrict => " ON DELETE RESTRICT",
        }
    }
}

/// A single-column foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySpec {
    /// Referencing column in this table.
    pub column: String,
    /// Referenced table. May name a table outside the model (owned by the
    /// versioned migration system); such keys are only emitted when the
    /// target actually exists.
    pub references_table: String,
    /// Referenced column.
    pub references_column: String,
    /// Referential delete action.
    pub on_delete: OnDelete,
}

impl ForeignKeySpec {
    pub fn new(
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            references_table: references_table.into(),
            references_column: references_column.into(),
            on_delete: OnDelete::NoAction,
        }
    }

    pub fn on_delete(mut self, action: OnDelete) -> Self {
        self.on_delete = action;
        self
    }
}

/// A declared index. The name is derived from the table and columns via
/// [`mend_sql::index_name`] so re-created plans name indexes identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    pub unique: bool,
}

impl IndexSpec {
    /// Derived index name for this index on `table`.
    pub fn name(&self, table: &str) -> String {
        mend_sql::index_name(table, &self.columns)
    }
}

/// A legacy-transition rule.
///
/// Transition rules are the only place renames and backfills are
/// sanctioned. They exist because the live schema may predate the current
/// model; each rule is a predicate against the live column set and fires at
/// most until the schema has caught up, after which it goes quiet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRule {
    /// If `from` exists live and `to` does not: add `to` and copy the data
    /// over. The old column is left in place; removing it requires listing
    /// it in [`TableSpec::superseded`].
    RenameColumn { from: String, to: String },
    /// If `column` is being created by this same pass: backfill rows where
    /// it is NULL from `expression`. Never fires for a column that already
    /// existed, so re-runs cannot overwrite data.
    PopulateColumn { column: String, expression: String },
}

/// A managed table: columns, keys, indexes, and its legacy transitions.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Declared columns, in order.
    pub columns: Vec<ColumnSpec>,
    /// Primary key column names. Empty means no primary key constraint.
    pub primary_key: Vec<String>,
    /// Foreign keys.
    pub foreign_keys: Vec<ForeignKeySpec>,
    /// Indexes, created together with the table.
    pub indexes: Vec<IndexSpec>,
    /// Legacy-transition rules, applied in declared order.
    pub transitions: Vec<TransitionRule>,
    /// Legacy columns this model has explicitly replaced. These are the
    /// only columns the engine will ever drop; unknown extra columns are
    /// always left alone.
    pub superseded: Vec<String>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            transitions: Vec::new(),
            superseded: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKeySpec) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn index(mut self, columns: &[&str]) -> Self {
        self.indexes.push(IndexSpec {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        });
        self
    }

    pub fn unique_index(mut self, columns: &[&str]) -> Self {
        self.indexes.push(IndexSpec {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: true,
        });
        self
    }

    /// Declare that legacy column `from` was renamed to `to`.
    pub fn rename_column(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.transitions.push(TransitionRule::RenameColumn {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Declare a backfill for `column` when it gets created.
    pub fn populate_column(
        mut self,
        column: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        self.transitions.push(TransitionRule::PopulateColumn {
            column: column.into(),
            expression: expression.into(),
        });
        self
    }

    /// Mark a legacy column as superseded, allowing the engine to drop it.
    pub fn supersede(mut self, column: impl Into<String>) -> Self {
        self.superseded.push(column.into());
        self
    }

    /// Look up a declared column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }
}

/// The complete desired schema: an immutable, declaration-ordered map from
/// table name to [`TableSpec`], validated at construction.
#[derive(Debug, Clone)]
pub struct DesiredSchema {
    tables: IndexMap<String, TableSpec>,
}

impl DesiredSchema {
    /// Build and validate a model.
    ///
    /// Fails if foreign keys among the declared tables form a cycle
    /// (self-references included), or if any primary key, foreign key,
    /// index, transition, or superseded entry names a column the table does
    /// not declare.
    pub fn new(specs: Vec<TableSpec>) -> Result<Self, ValidationError> {
        let mut tables = IndexMap::with_capacity(specs.len());
        for spec in specs {
            validate_table(&spec)?;
            let name = spec.name.clone();
            if tables.insert(name.clone(), spec).is_some() {
                return Err(ValidationError::DuplicateTable { table: name });
            }
        }
        let model = Self { tables };
        model.check_acyclic()?;
        Ok(model)
    }

    pub fn get(&self, name: &str) -> Option<&TableSpec> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables in declaration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableSpec> {
        self.tables.values()
    }

    /// All table names, in declaration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Tables in dependency order: every referenced table precedes every
    /// table that references it. Ties (tables with no dependency relation)
    /// keep declaration order, so the result is fully deterministic.
    ///
    /// Only edges between declared tables count; foreign keys into tables
    /// the model does not manage impose no ordering.
    pub fn dependency_order(&self) -> Vec<&TableSpec> {
        let mut placed: Vec<&TableSpec> = Vec::with_capacity(self.tables.len());
        let mut done: Vec<&str> = Vec::with_capacity(self.tables.len());

        while placed.len() < self.tables.len() {
            // Declaration-order scan for the first table whose in-model
            // dependencies are all placed. Construction guarantees a DAG,
            // so one always exists.
            for spec in self.tables.values() {
                if done.contains(&spec.name.as_str()) {
                    continue;
                }
                let ready = spec.foreign_keys.iter().all(|fk| {
                    !self.tables.contains_key(&fk.references_table)
                        || done.contains(&fk.references_table.as_str())
                });
                if ready {
                    placed.push(spec);
                    done.push(&spec.name);
                    break;
                }
            }
        }

        placed
    }

    /// Depth-first cycle check over foreign-key edges between declared
    /// tables. Reports the cycle by name, e.g. `a -> b -> a`.
    fn check_acyclic(&self) -> Result<(), ValidationError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks: IndexMap<&str, Mark> = self
            .tables
            .keys()
            .map(|k| (k.as_str(), Mark::Unvisited))
            .collect();

        fn visit<'a>(
            model: &'a DesiredSchema,
            table: &'a str,
            marks: &mut IndexMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Result<(), ValidationError> {
            match marks[table] {
                Mark::Done => return Ok(()),
                Mark::InProgress => {
                    let start = stack.iter().position(|t| *t == table).unwrap_or(0);
                    let mut cycle: Vec<&str> = stack[start..].to_vec();
                    cycle.push(table);
                    return Err(ValidationError::CyclicDependency {
                        cycle: cycle.join(" -> "),
                    });
                }
                Mark::Unvisited => {}
            }
            marks[table] = Mark::InProgress;
            stack.push(table);
            let spec = &model.tables[table];
            for fk in &spec.foreign_keys {
                if let Some((referenced, _)) =
                    model.tables.get_key_value(&fk.references_table)
                {
                    visit(model, referenced, marks, stack)?;
                }
            }
            stack.pop();
            marks[table] = Mark::Done;
            Ok(())
        }

        let names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        for name in names {
            let mut stack = Vec::new();
            visit(self, name, &mut marks, &mut stack)?;
        }
        Ok(())
    }
}

fn validate_table(spec: &TableSpec) -> Result<(), ValidationError> {
    let table = || spec.name.clone();

    for (i, col) in spec.columns.iter().enumerate() {
        if spec.columns[..i].iter().any(|c| c.name == col.name) {
            return Err(ValidationError::DuplicateColumn {
                table: table(),
                column: col.name.clone(),
            });
        }
    }

    for pk in &spec.primary_key {
        if !spec.has_column(pk) {
            return Err(ValidationError::UnknownColumn {
                table: table(),
                column: pk.clone(),
                context: "primary key",
            });
        }
    }

    for fk in &spec.foreign_keys {
        if !spec.has_column(&fk.column) {
            return Err(ValidationError::UnknownColumn {
                table: table(),
                column: fk.column.clone(),
                context: "foreign key",
            });
        }
    }

    for idx in &spec.indexes {
        for col in &idx.columns {
            if !spec.has_column(col) {
                return Err(ValidationError::UnknownColumn {
                    table: table(),
                    column: col.clone(),
                    context: "index",
                });
            }
        }
    }

    for rule in &spec.transitions {
        match rule {
            TransitionRule::RenameColumn { from, to } => {
                if !spec.has_column(to) {
                    return Err(ValidationError::UnknownColumn {
                        table: table(),
                        column: to.clone(),
                        context: "rename target",
                    });
                }
                if spec.has_column(from) {
                    return Err(ValidationError::RenameSourceDeclared {
                        table: table(),
                        column: from.clone(),
                    });
                }
            }
            TransitionRule::PopulateColumn { column, .. } => {
                if !spec.has_column(column) {
                    return Err(ValidationError::UnknownColumn {
                        table: table(),
                        column: column.clone(),
                        context: "backfill",
                    });
                }
            }
        }
    }

    for old in &spec.superseded {
        if spec.has_column(old) {
            return Err(ValidationError::SupersededDeclared {
                table: table(),
                column: old.clone(),
            });
        }
    }

    Ok(())
}
