//! Column-type sniffing and migration planning for JSON-shaped records.
//!
//! Planning is pure: it looks at the reflected table (if any) and the incoming
//! records and decides which `CREATE TABLE` or `ALTER TABLE ... ADD COLUMN`
//! statements are needed. Nothing is ever dropped or retyped.

use crate::domain::model::{ColumnDef, ColumnType, MigrationPlan, Record, TableSchema};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_identifier;
use serde_json::Value;

/// Surrogate key added to tables created from raw JSON.
pub const SURROGATE_KEY: &str = "id_pk";

pub fn infer_column_type(value: &Value) -> ColumnType {
    match value {
        // booleans are stored as 0/1
        Value::Bool(_) => ColumnType::Integer,
        Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
        Value::Number(_) => ColumnType::Real,
        _ => ColumnType::Text,
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Keys across all records, first-seen order, case-insensitively deduplicated.
pub fn collect_keys(records: &[Record]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for record in records {
        for key in record.data.keys() {
            if !keys.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

fn sample_type(records: &[Record], key: &str) -> ColumnType {
    records
        .iter()
        .filter_map(|r| r.data.get(key))
        .find(|v| !v.is_null())
        .map(infer_column_type)
        .unwrap_or(ColumnType::Text)
}

pub fn plan_migration(
    table: &str,
    existing: Option<&TableSchema>,
    records: &[Record],
) -> Result<MigrationPlan> {
    validate_identifier(table)?;

    if records.is_empty() {
        return Err(EtlError::validation(format!(
            "no records to load into '{}'",
            table
        )));
    }

    let mut columns = Vec::new();
    for key in collect_keys(records) {
        validate_identifier(&key)?;

        let already_present = match existing {
            Some(schema) => schema.has_column(&key),
            None => key.eq_ignore_ascii_case(SURROGATE_KEY),
        };
        if already_present {
            tracing::debug!("Column '{}' already exists in '{}', skipping", key, table);
            continue;
        }

        let column_type = sample_type(records, &key);
        tracing::debug!("Inferred column '{}' as {} for '{}'", key, column_type, table);
        columns.push(ColumnDef::new(key, column_type.as_sql()));
    }

    let table = table.to_string();
    Ok(match existing {
        Some(_) => MigrationPlan::AddColumns { table, columns },
        None => MigrationPlan::CreateTable { table, columns },
    })
}

/// DDL for a plan, in execution order.
pub fn plan_statements(plan: &MigrationPlan) -> Vec<String> {
    match plan {
        MigrationPlan::CreateTable { table, columns } => {
            let mut defs = vec![format!(
                "{} INTEGER PRIMARY KEY AUTOINCREMENT",
                quote_ident(SURROGATE_KEY)
            )];
            defs.extend(
                columns
                    .iter()
                    .map(|c| format!("{} {}", quote_ident(&c.name), c.sql_type)),
            );
            vec![format!(
                "CREATE TABLE {} ({})",
                quote_ident(table),
                defs.join(", ")
            )]
        }
        MigrationPlan::AddColumns { table, columns } => columns
            .iter()
            .map(|c| {
                format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    quote_ident(table),
                    quote_ident(&c.name),
                    c.sql_type
                )
            })
            .collect(),
    }
}
