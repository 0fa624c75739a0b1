//! The reconciliation planner.
//!
//! Diffs the desired model against a live snapshot and emits an ordered
//! plan of corrective actions. The planner is pure: same inputs, same plan,
//! and a live schema that already matches the model yields an empty plan.
//! That purity is the engine's central testable contract — the plan can be
//! inspected without any store at hand.
//!
//! ## Ordering
//!
//! Tables are visited in dependency order (referenced tables first,
//! declaration order as tie-break). Within a table: rename transitions,
//! then column additions, then backfills, then superseded drops. Renames go
//! first so a legacy column is never shadowed by a fresh empty one; drops
//! go last so nothing is removed before its replacement holds the data.
//!
//! ## What is never emitted
//!
//! - `DropColumn` for a column the model does not explicitly supersede —
//!   unknown extra columns are left alone.
//! - A foreign key against a table that does not exist yet. Keys whose
//!   target is neither live nor created earlier in the plan are deferred to
//!   a later pass.
//! - A backfill for a column that already existed — backfills only follow
//!   columns created in the same pass, so re-runs cannot touch data.

use crate::catalog::LiveSchemaSnapshot;
use crate::plan::{ReconciliationAction, ReconciliationPlan};
use crate::schema::{DesiredSchema, TableSpec, TransitionRule};
use std::collections::BTreeSet;

/// Compute the corrective plan for one pass.
pub fn plan(model: &DesiredSchema, live: &LiveSchemaSnapshot) -> ReconciliationPlan {
    let mut actions = Vec::new();
    let mut created_this_plan: BTreeSet<&str> = BTreeSet::new();

    for spec in model.dependency_order() {
        if !live.table_exists(&spec.name) {
            plan_create_table(spec, live, &created_this_plan, &mut actions);
            created_this_plan.insert(&spec.name);
        } else {
            plan_existing_table(spec, live, &mut actions);
        }
    }

    ReconciliationPlan::new(actions)
}

/// A missing table: create it (with only the resolvable foreign keys) and
/// its indexes. No column or backfill actions — a fresh table already has
/// every declared column and no rows to backfill.
fn plan_create_table(
    spec: &TableSpec,
    live: &LiveSchemaSnapshot,
    created_this_plan: &BTreeSet<&str>,
    actions: &mut Vec<ReconciliationAction>,
) {
    let mut table = spec.clone();
    table.foreign_keys.retain(|fk| {
        live.table_exists(&fk.references_table)
            || created_this_plan.contains(fk.references_table.as_str())
    });
    // Transition rules concern pre-existing tables only
    table.transitions.clear();
    table.superseded.clear();

    let indexes = std::mem::take(&mut table.indexes);
    actions.push(ReconciliationAction::CreateTable(table));
    for index in indexes {
        actions.push(ReconciliationAction::CreateIndex {
            table: spec.name.clone(),
            index,
        });
    }
}

/// An existing table: renames, then missing columns, then backfills for
/// columns created this pass, then superseded drops.
fn plan_existing_table(
    spec: &TableSpec,
    live: &LiveSchemaSnapshot,
    actions: &mut Vec<ReconciliationAction>,
) {
    let mut columns: BTreeSet<String> = live
        .columns(&spec.name)
        .cloned()
        .unwrap_or_default();
    let mut created: BTreeSet<&str> = BTreeSet::new();

    for rule in &spec.transitions {
        if let TransitionRule::RenameColumn { from, to } = rule
            && columns.contains(from)
            && !columns.contains(to)
        {
            // Validation guarantees the rename target is declared
            let Some(to_col) = spec.get_column(to) else {
                continue;
            };
            actions.push(ReconciliationAction::RenameColumn {
                table: spec.name.clone(),
                from: from.clone(),
                to: to_col.clone(),
            });
            columns.insert(to.clone());
            created.insert(to);
        }
    }

    for col in &spec.columns {
        if !columns.contains(&col.name) {
            actions.push(ReconciliationAction::AddColumn {
                table: spec.name.clone(),
                column: col.clone(),
            });
            columns.insert(col.name.clone());
            created.insert(&col.name);
        }
    }

    for rule in &spec.transitions {
        if let TransitionRule::PopulateColumn { column, expression } = rule
            && created.contains(column.as_str())
        {
            actions.push(ReconciliationAction::PopulateColumn {
                table: spec.name.clone(),
                column: column.clone(),
                expression: expression.clone(),
            });
        }
    }

    for old in &spec.superseded {
        if columns.contains(old) {
            actions.push(ReconciliationAction::DropColumn {
                table: spec.name.clone(),
                column: old.clone(),
            });
        }
    }
}
