//! DDL statement builders, one per action kind.
//!
//! All identifiers go through [`mend_sql::quote_ident`]; nothing here
//! splices a raw name into a statement.

use crate::schema::{ColumnSpec, IndexSpec, TableSpec};
use mend_sql::{fk_constraint_name, quote_ident};

/// Generate a CREATE TABLE statement for a table spec.
///
/// Includes the primary key and whatever foreign keys the spec carries; the
/// planner is responsible for stripping foreign keys whose target does not
/// exist yet.
pub fn create_table_sql(table: &TableSpec) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", quote_ident(&table.name));

    // If there's more than one PK column, we need a table constraint
    let use_table_pk_constraint = table.primary_key.len() > 1;

    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|col| {
            let is_pk = table.primary_key.iter().any(|pk| pk == &col.name);
            let mut def = format!("    {} {}", quote_ident(&col.name), col.sql_type);

            if let Some(expr) = &col.computed {
                def.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", expr));
            }

            // Only add inline PRIMARY KEY for single-column PKs
            if is_pk && !use_table_pk_constraint {
                def.push_str(" PRIMARY KEY");
            }

            // PK columns are implicitly NOT NULL, but composite PKs don't
            // use the inline form, so spell it out there
            if !col.nullable && (!is_pk || use_table_pk_constraint) {
                def.push_str(" NOT NULL");
            }

            if col.computed.is_none()
                && let Some(default) = &col.default
            {
                def.push_str(&format!(" DEFAULT {}", default));
            }

            def
        })
        .collect();

    if use_table_pk_constraint {
        let quoted: Vec<_> = table.primary_key.iter().map(|c| quote_ident(c)).collect();
        parts.push(format!("    PRIMARY KEY ({})", quoted.join(", ")));
    }

    for fk in &table.foreign_keys {
        parts.push(format!(
            "    CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}){}",
            quote_ident(&fk_constraint_name(&table.name, &fk.column)),
            quote_ident(&fk.column),
            quote_ident(&fk.references_table),
            quote_ident(&fk.references_column),
            fk.on_delete.to_sql(),
        ));
    }

    sql.push_str(&parts.join(",\n"));
    sql.push_str("\n);");

    sql
}

/// Generate an ALTER TABLE ... ADD COLUMN statement.
pub fn add_column_sql(table: &str, col: &ColumnSpec) -> String {
    let mut def = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table),
        quote_ident(&col.name),
        col.sql_type
    );
    if let Some(expr) = &col.computed {
        def.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", expr));
    }
    if !col.nullable {
        def.push_str(" NOT NULL");
    }
    if col.computed.is_none()
        && let Some(default) = &col.default
    {
        def.push_str(&format!(" DEFAULT {}", default));
    }
    def.push(';');
    def
}

/// Generate an ALTER TABLE ... DROP COLUMN statement.
pub fn drop_column_sql(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {};",
        quote_ident(table),
        quote_ident(column)
    )
}

/// Generate the two statements of a legacy rename: add the new column, copy
/// the data over. The new column is added nullable regardless of spec, since
/// existing rows have no value until the copy runs; the old column is only
/// removed by an explicit superseded drop.
pub fn rename_column_sql(table: &str, from: &str, to: &ColumnSpec) -> [String; 2] {
    let mut add = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table),
        quote_ident(&to.name),
        to.sql_type
    );
    if let Some(default) = &to.default {
        add.push_str(&format!(" DEFAULT {}", default));
    }
    add.push(';');

    let copy = format!(
        "UPDATE {} SET {} = {} WHERE {} IS NULL;",
        quote_ident(table),
        quote_ident(&to.name),
        quote_ident(from),
        quote_ident(&to.name)
    );

    [add, copy]
}

/// Generate a backfill UPDATE for a freshly created column.
pub fn populate_column_sql(table: &str, column: &str, expression: &str) -> String {
    format!(
        "UPDATE {} SET {} = {} WHERE {} IS NULL;",
        quote_ident(table),
        quote_ident(column),
        expression,
        quote_ident(column)
    )
}

/// Generate a CREATE INDEX statement.
pub fn create_index_sql(table: &str, idx: &IndexSpec) -> String {
    let unique = if idx.unique { "UNIQUE " } else { "" };
    let quoted: Vec<_> = idx.columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "CREATE {}INDEX {} ON {} ({});",
        unique,
        quote_ident(&idx.name(table)),
        quote_ident(table),
        quoted.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ForeignKeySpec, OnDelete, SqlType};

    #[test]
    fn snapshot_simple_table() {
        let table = TableSpec::new("users")
            .column(ColumnSpec::new("id", SqlType::BigInt))
            .column(ColumnSpec::new("email", SqlType::Text))
            .column(ColumnSpec::new("bio", SqlType::Text).nullable())
            .column(
                ColumnSpec::new("created_at", SqlType::Timestamptz).default_expr("now()"),
            )
            .primary_key(&["id"]);

        insta::assert_snapshot!(create_table_sql(&table), @r#"
        CREATE TABLE "users" (
            "id" BIGINT PRIMARY KEY,
            "email" TEXT NOT NULL,
            "bio" TEXT,
            "created_at" TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#);
    }

    #[test]
    fn snapshot_composite_primary_key_with_fks() {
        let table = TableSpec::new("order_items")
            .column(ColumnSpec::new("order_id", SqlType::BigInt))
            .column(ColumnSpec::new("menu_item_id", SqlType::BigInt))
            .column(ColumnSpec::new("quantity", SqlType::Integer).default_expr("1"))
            .primary_key(&["order_id", "menu_item_id"])
            .foreign_key(
                ForeignKeySpec::new("order_id", "orders", "id").on_delete(OnDelete::Cascade),
            )
            .foreign_key(ForeignKeySpec::new("menu_item_id", "menu_items", "id"));

        insta::assert_snapshot!(create_table_sql(&table), @r#"
        CREATE TABLE "order_items" (
            "order_id" BIGINT NOT NULL,
            "menu_item_id" BIGINT NOT NULL,
            "quantity" INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY ("order_id", "menu_item_id"),
            CONSTRAINT "fk_order_items_order_id" FOREIGN KEY ("order_id") REFERENCES "orders" ("id") ON DELETE CASCADE,
            CONSTRAINT "fk_order_items_menu_item_id" FOREIGN KEY ("menu_item_id") REFERENCES "menu_items" ("id")
        );
        "#);
    }

    #[test]
    fn add_column_not_null_with_default() {
        let col = ColumnSpec::new("is_active", SqlType::Boolean).default_expr("true");
        assert_eq!(
            add_column_sql("categories", &col),
            "ALTER TABLE \"categories\" ADD COLUMN \"is_active\" BOOLEAN NOT NULL DEFAULT true;"
        );
    }

    #[test]
    fn add_computed_column_has_no_default() {
        let col = ColumnSpec::new("total", SqlType::Numeric)
            .computed_expr("quantity * unit_price")
            .default_expr("0");
        let sql = add_column_sql("order_items", &col);
        assert!(sql.contains("GENERATED ALWAYS AS (quantity * unit_price) STORED"));
        assert!(!sql.contains("DEFAULT"));
    }

    #[test]
    fn rename_adds_nullable_then_copies() {
        let to = ColumnSpec::new("password_hash", SqlType::Text);
        let [add, copy] = rename_column_sql("users", "password", &to);
        assert_eq!(
            add,
            "ALTER TABLE \"users\" ADD COLUMN \"password_hash\" TEXT;"
        );
        assert_eq!(
            copy,
            "UPDATE \"users\" SET \"password_hash\" = \"password\" WHERE \"password_hash\" IS NULL;"
        );
    }

    #[test]
    fn drop_column_quotes_identifiers() {
        assert_eq!(
            drop_column_sql("categories", "category_name"),
            "ALTER TABLE \"categories\" DROP COLUMN \"category_name\";"
        );
    }

    #[test]
    fn create_index_unique_and_plain() {
        let idx = IndexSpec {
            columns: vec!["email".to_string()],
            unique: true,
        };
        assert_eq!(
            create_index_sql("users", &idx),
            "CREATE UNIQUE INDEX \"idx_users_email\" ON \"users\" (\"email\");"
        );

        let idx = IndexSpec {
            columns: vec!["customer_id".to_string(), "placed_at".to_string()],
            unique: false,
        };
        assert_eq!(
            create_index_sql("orders", &idx),
            "CREATE INDEX \"idx_orders_customer_id_placed_at\" ON \"orders\" (\"customer_id\", \"placed_at\");"
        );
    }
}
