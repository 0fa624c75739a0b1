//! Plan execution.
//!
//! Actions run sequentially, in plan order, each in its own failure scope.
//! A store rejection is recorded and execution moves on: every action is
//! independently idempotent to check, so whatever failed here is re-planned
//! on the next pass if its trigger condition still holds. Best-effort and
//! eventually consistent, not transactional.

use crate::plan::{ReconciliationAction, ReconciliationPlan};
use crate::store::Conn;
use crate::Result;

/// What happened to one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All of the action's statements went through.
    Applied,
    /// Dry run: nothing was sent to the store.
    Skipped,
    /// The store rejected a statement; the rest of the plan still ran.
    Failed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Applied => write!(f, "applied"),
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::Failed => write!(f, "failed"),
        }
    }
}

/// Per-action record in an [`ExecutionReport`].
#[derive(Debug, Clone)]
pub struct ActionReport {
    pub action: ReconciliationAction,
    pub outcome: Outcome,
    /// Error text for failures, rendered SQL for dry runs.
    pub detail: Option<String>,
}

/// The outcome of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// One record per planned action, in plan order.
    pub actions: Vec<ActionReport>,
    /// Set when the pass aborted before any action could run (store
    /// unreachable, catalog read failed).
    pub pass_error: Option<String>,
}

impl ExecutionReport {
    /// A report for a pass that aborted before executing anything.
    pub fn aborted(detail: impl Into<String>) -> Self {
        Self {
            actions: Vec::new(),
            pass_error: Some(detail.into()),
        }
    }

    pub fn applied_count(&self) -> usize {
        self.count(Outcome::Applied)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(Outcome::Skipped)
    }

    pub fn failed_count(&self) -> usize {
        self.count(Outcome::Failed)
    }

    /// True when the pass ran to completion with no failed actions.
    pub fn is_clean(&self) -> bool {
        self.pass_error.is_none() && self.failed_count() == 0
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.actions
            .iter()
            .filter(|r| r.outcome == outcome)
            .count()
    }
}

impl std::fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(err) = &self.pass_error {
            return writeln!(f, "Pass aborted: {}", err);
        }
        if self.actions.is_empty() {
            return writeln!(f, "Schema up to date; nothing to do.");
        }
        writeln!(
            f,
            "{} applied, {} skipped, {} failed:",
            self.applied_count(),
            self.skipped_count(),
            self.failed_count()
        )?;
        for record in &self.actions {
            write!(f, "  [{}] {}", record.outcome, record.action)?;
            if let (Outcome::Failed, Some(detail)) = (record.outcome, &record.detail) {
                write!(f, " ({})", detail)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Applies a plan against a store connection.
pub struct Executor<'a, C: Conn> {
    conn: &'a C,
    dry_run: bool,
}

impl<'a, C: Conn> Executor<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self {
            conn,
            dry_run: false,
        }
    }

    /// An executor that records what it *would* do without touching the
    /// store; every action is reported as [`Outcome::Skipped`] with its SQL
    /// as the detail.
    pub fn dry_run(conn: &'a C) -> Self {
        Self {
            conn,
            dry_run: true,
        }
    }

    /// Apply every action of the plan, in order, isolating failures.
    pub async fn apply(&self, plan: &ReconciliationPlan) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for action in plan.actions() {
            if self.dry_run {
                let sql = action.statements().join("\n");
                tracing::info!(
                    kind = action.kind(),
                    table = action.table(),
                    column = action.column(),
                    outcome = %Outcome::Skipped,
                    "dry run"
                );
                report.actions.push(ActionReport {
                    action: action.clone(),
                    outcome: Outcome::Skipped,
                    detail: Some(sql),
                });
                continue;
            }

            match self.apply_one(action).await {
                Ok(()) => {
                    tracing::info!(
                        kind = action.kind(),
                        table = action.table(),
                        column = action.column(),
                        outcome = %Outcome::Applied,
                        "reconciliation action applied"
                    );
                    report.actions.push(ActionReport {
                        action: action.clone(),
                        outcome: Outcome::Applied,
                        detail: None,
                    });
                }
                Err(e) => {
                    // Harmless when a concurrent pass won the race to the
                    // same DDL; real failures re-plan on the next pass.
                    tracing::warn!(
                        kind = action.kind(),
                        table = action.table(),
                        column = action.column(),
                        outcome = %Outcome::Failed,
                        error = %e,
                        "reconciliation action failed, continuing"
                    );
                    report.actions.push(ActionReport {
                        action: action.clone(),
                        outcome: Outcome::Failed,
                        detail: Some(e.to_string()),
                    });
                }
            }
        }

        report
    }

    async fn apply_one(&self, action: &ReconciliationAction) -> Result<()> {
        for sql in action.statements() {
            self.conn.execute(&sql, &[]).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, SqlType};
    use crate::Error;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use tokio_postgres::types::ToSql;
    use tokio_postgres::Row;

    /// A connection fake that logs every statement and rejects any whose
    /// SQL contains a configured marker.
    #[derive(Default)]
    struct ScriptedConn {
        executed: Mutex<Vec<String>>,
        reject_containing: Vec<&'static str>,
    }

    impl ScriptedConn {
        fn rejecting(markers: &[&'static str]) -> Self {
            Self {
                executed: Mutex::new(Vec::new()),
                reject_containing: markers.to_vec(),
            }
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    impl Conn for ScriptedConn {
        fn execute<'a>(
            &'a self,
            sql: &'a str,
            _params: &'a [&'a (dyn ToSql + Sync)],
        ) -> Pin<Box<dyn Future<Output = crate::Result<u64>> + Send + 'a>> {
            Box::pin(async move {
                self.executed.lock().unwrap().push(sql.to_string());
                if self.reject_containing.iter().any(|m| sql.contains(m)) {
                    return Err(Error::Rejected(format!("rejected: {sql}")));
                }
                Ok(1)
            })
        }

        fn query<'a>(
            &'a self,
            _sql: &'a str,
            _params: &'a [&'a (dyn ToSql + Sync)],
        ) -> Pin<Box<dyn Future<Output = crate::Result<Vec<Row>>> + Send + 'a>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn add_column_plan(columns: &[&str]) -> ReconciliationPlan {
        ReconciliationPlan::new(
            columns
                .iter()
                .map(|name| ReconciliationAction::AddColumn {
                    table: "orders".to_string(),
                    column: ColumnSpec::new(*name, SqlType::Text).nullable(),
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn failure_does_not_stop_the_plan() {
        let columns: Vec<String> = (0..10).map(|i| format!("col_{i}")).collect();
        let names: Vec<&str> = columns.iter().map(String::as_str).collect();
        let plan = add_column_plan(&names);

        // Third action rejected, the rest must still run.
        let conn = ScriptedConn::rejecting(&["col_2"]);
        let report = Executor::new(&conn).apply(&plan).await;

        assert_eq!(report.actions.len(), 10);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.applied_count(), 9);
        assert_eq!(report.actions[2].outcome, Outcome::Failed);
        assert!(report.actions[2].detail.as_deref().unwrap().contains("col_2"));
        for (i, record) in report.actions.iter().enumerate() {
            if i != 2 {
                assert_eq!(record.outcome, Outcome::Applied, "action {i}");
            }
        }
        // All ten statements were attempted.
        assert_eq!(conn.executed().len(), 10);
    }

    #[tokio::test]
    async fn actions_run_in_plan_order() {
        let plan = add_column_plan(&["first", "second", "third"]);
        let conn = ScriptedConn::default();
        Executor::new(&conn).apply(&plan).await;

        let executed = conn.executed();
        assert!(executed[0].contains("first"));
        assert!(executed[1].contains("second"));
        assert!(executed[2].contains("third"));
    }

    #[tokio::test]
    async fn rename_failure_skips_its_copy_statement() {
        let plan = ReconciliationPlan::new(vec![
            ReconciliationAction::RenameColumn {
                table: "users".to_string(),
                from: "password".to_string(),
                to: ColumnSpec::new("password_hash", SqlType::Text),
            },
            ReconciliationAction::AddColumn {
                table: "users".to_string(),
                column: ColumnSpec::new("salt", SqlType::Text).nullable(),
            },
        ]);

        // The ADD COLUMN of the rename is rejected; its UPDATE must not
        // run, but the following action must.
        let conn = ScriptedConn::rejecting(&["ADD COLUMN \"password_hash\""]);
        let report = Executor::new(&conn).apply(&plan).await;

        assert_eq!(report.actions[0].outcome, Outcome::Failed);
        assert_eq!(report.actions[1].outcome, Outcome::Applied);
        let executed = conn.executed();
        assert!(!executed.iter().any(|sql| sql.starts_with("UPDATE")));
        assert!(executed.iter().any(|sql| sql.contains("salt")));
    }

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let plan = add_column_plan(&["a", "b"]);
        let conn = ScriptedConn::default();
        let report = Executor::dry_run(&conn).apply(&plan).await;

        assert!(conn.executed().is_empty());
        assert_eq!(report.skipped_count(), 2);
        assert!(report.actions[0]
            .detail
            .as_deref()
            .unwrap()
            .starts_with("ALTER TABLE"));
    }

    #[test]
    fn report_display_shows_failures() {
        let mut report = ExecutionReport::default();
        report.actions.push(ActionReport {
            action: ReconciliationAction::DropColumn {
                table: "categories".to_string(),
                column: "category_name".to_string(),
            },
            outcome: Outcome::Failed,
            detail: Some("column does not exist".to_string()),
        });
        let rendered = format!("{report}");
        assert!(rendered.contains("[failed] - categories.category_name"));
        assert!(rendered.contains("column does not exist"));
    }

    #[test]
    fn aborted_report_is_not_clean() {
        let report = ExecutionReport::aborted("connection refused");
        assert!(!report.is_clean());
        assert!(format!("{report}").contains("Pass aborted"));
    }
}
