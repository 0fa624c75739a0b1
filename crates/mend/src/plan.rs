//! Reconciliation actions and plans.
//!
//! A [`ReconciliationPlan`] is an ordered sequence of self-describing
//! actions. The order is load-bearing: table creations come before anything
//! that touches their columns, and referenced tables before referencing
//! ones. The executor applies the sequence as-is, never reordering.

use crate::ddl;
use crate::schema::{ColumnSpec, IndexSpec, TableSpec};

/// A single corrective change.
///
/// Every variant carries enough data to render its SQL, log itself, and be
/// retried on a later pass if it fails.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationAction {
    /// Create a missing table. The spec's foreign keys have already been
    /// filtered down to targets that exist (live, or earlier in this plan).
    CreateTable(TableSpec),
    /// Add a declared column missing from the live table.
    AddColumn { table: String, column: ColumnSpec },
    /// Drop a column the model explicitly superseded.
    DropColumn { table: String, column: String },
    /// Legacy rename: add `to`, copy data from `from`. The old column stays
    /// until a superseded drop removes it.
    RenameColumn {
        table: String,
        from: String,
        to: ColumnSpec,
    },
    /// Backfill a column created earlier in this same plan.
    PopulateColumn {
        table: String,
        column: String,
        expression: String,
    },
    /// Create an index on a freshly created table.
    CreateIndex { table: String, index: IndexSpec },
}

impl ReconciliationAction {
    /// Stable action kind, for structured log records.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconciliationAction::CreateTable(_) => "create_table",
            ReconciliationAction::AddColumn { .. } => "add_column",
            ReconciliationAction::DropColumn { .. } => "drop_column",
            ReconciliationAction::RenameColumn { .. } => "rename_column",
            ReconciliationAction::PopulateColumn { .. } => "populate_column",
            ReconciliationAction::CreateIndex { .. } => "create_index",
        }
    }

    /// The table this action touches.
    pub fn table(&self) -> &str {
        match self {
            ReconciliationAction::CreateTable(spec) => &spec.name,
            ReconciliationAction::AddColumn { table, .. }
            | ReconciliationAction::DropColumn { table, .. }
            | ReconciliationAction::RenameColumn { table, .. }
            | ReconciliationAction::PopulateColumn { table, .. }
            | ReconciliationAction::CreateIndex { table, .. } => table,
        }
    }

    /// The column this action touches, if it is column-scoped.
    pub fn column(&self) -> Option<&str> {
        match self {
            ReconciliationAction::CreateTable(_)
            | ReconciliationAction::CreateIndex { .. } => None,
            ReconciliationAction::AddColumn { column, .. } => Some(&column.name),
            ReconciliationAction::DropColumn { column, .. } => Some(column),
            ReconciliationAction::RenameColumn { to, .. } => Some(&to.name),
            ReconciliationAction::PopulateColumn { column, .. } => Some(column),
        }
    }

    /// Render the SQL statements for this action, in execution order.
    ///
    /// Most actions are a single statement; a rename is two (add, then
    /// copy).
    pub fn statements(&self) -> Vec<String> {
        match self {
            ReconciliationAction::CreateTable(spec) => {
                vec![ddl::create_table_sql(spec)]
            }
            ReconciliationAction::AddColumn { table, column } => {
                vec![ddl::add_column_sql(table, column)]
            }
            ReconciliationAction::DropColumn { table, column } => {
                vec![ddl::drop_column_sql(table, column)]
            }
            ReconciliationAction::RenameColumn { table, from, to } => {
                ddl::rename_column_sql(table, from, to).into()
            }
            ReconciliationAction::PopulateColumn {
                table,
                column,
                expression,
            } => vec![ddl::populate_column_sql(table, column, expression)],
            ReconciliationAction::CreateIndex { table, index } => {
                vec![ddl::create_index_sql(table, index)]
            }
        }
    }
}

impl std::fmt::Display for ReconciliationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconciliationAction::CreateTable(spec) => {
                write!(f, "+ table {}", spec.name)
            }
            ReconciliationAction::AddColumn { table, column } => {
                let nullable = if column.nullable { " (nullable)" } else { "" };
                write!(f, "+ {}.{}: {}{}", table, column.name, column.sql_type, nullable)
            }
            ReconciliationAction::DropColumn { table, column } => {
                write!(f, "- {}.{}", table, column)
            }
            ReconciliationAction::RenameColumn { table, from, to } => {
                write!(f, "~ rename {}.{} -> {}", table, from, to.name)
            }
            ReconciliationAction::PopulateColumn { table, column, .. } => {
                write!(f, "~ backfill {}.{}", table, column)
            }
            ReconciliationAction::CreateIndex { table, index } => {
                let unique = if index.unique { "UNIQUE " } else { "" };
                write!(
                    f,
                    "+ {}INDEX {} ({})",
                    unique,
                    index.name(table),
                    index.columns.join(", ")
                )
            }
        }
    }
}

/// An ordered sequence of corrective actions for one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    actions: Vec<ReconciliationAction>,
}

impl ReconciliationPlan {
    pub fn new(actions: Vec<ReconciliationAction>) -> Self {
        Self { actions }
    }

    /// True when the live schema already matches the model.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn actions(&self) -> &[ReconciliationAction] {
        &self.actions
    }

    /// Render every statement of the plan, for inspection.
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        for action in &self.actions {
            for stmt in action.statements() {
                sql.push_str(&stmt);
                sql.push('\n');
            }
        }
        sql
    }
}

impl std::fmt::Display for ReconciliationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            writeln!(f, "No corrective actions needed.")?;
        } else {
            writeln!(f, "{} corrective action(s):", self.len())?;
            for action in &self.actions {
                writeln!(f, "  {}", action)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SqlType, TableSpec};

    #[test]
    fn display_reads_like_a_diff() {
        let action = ReconciliationAction::AddColumn {
            table: "categories".to_string(),
            column: ColumnSpec::new("is_active", SqlType::Boolean).default_expr("true"),
        };
        assert_eq!(format!("{}", action), "+ categories.is_active: BOOLEAN");

        let action = ReconciliationAction::RenameColumn {
            table: "users".to_string(),
            from: "password".to_string(),
            to: ColumnSpec::new("password_hash", SqlType::Text),
        };
        assert_eq!(
            format!("{}", action),
            "~ rename users.password -> password_hash"
        );

        let action = ReconciliationAction::DropColumn {
            table: "categories".to_string(),
            column: "category_name".to_string(),
        };
        assert_eq!(format!("{}", action), "- categories.category_name");
    }

    #[test]
    fn rename_renders_two_statements() {
        let action = ReconciliationAction::RenameColumn {
            table: "users".to_string(),
            from: "password".to_string(),
            to: ColumnSpec::new("password_hash", SqlType::Text),
        };
        let stmts = action.statements();
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("ALTER TABLE"));
        assert!(stmts[1].starts_with("UPDATE"));
    }

    #[test]
    fn plan_to_sql_concatenates_in_order() {
        let plan = ReconciliationPlan::new(vec![
            ReconciliationAction::CreateTable(
                TableSpec::new("tags")
                    .column(ColumnSpec::new("id", SqlType::BigInt))
                    .primary_key(&["id"]),
            ),
            ReconciliationAction::AddColumn {
                table: "users".to_string(),
                column: ColumnSpec::new("salt", SqlType::Text).nullable(),
            },
        ]);
        let sql = plan.to_sql();
        let create = sql.find("CREATE TABLE").unwrap();
        let alter = sql.find("ALTER TABLE").unwrap();
        assert!(create < alter);
    }

    #[test]
    fn empty_plan_display() {
        let plan = ReconciliationPlan::default();
        assert_eq!(format!("{}", plan), "No corrective actions needed.\n");
    }
}
