use serde::{Deserialize, Serialize};
use std::fmt;

/// One JSON object from an input file, keys kept in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    pub fn new(data: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A column as reported by the database or as planned by a migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sundae {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SundaeWithMetrics {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub volume: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueRow {
    pub sundae_id: String,
    pub sundae_name: String,
    pub volume: i64,
    pub revenue: f64,
    pub first_sale: Option<String>,
    pub last_sale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueReport {
    pub rows: Vec<RevenueRow>,
    pub total_volume: i64,
    pub total_revenue: f64,
    pub top_sundae: Option<String>,
}

/// Result of the transform stage: records ready to insert plus the DDL they need.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub table: String,
    pub records: Vec<Record>,
    pub plan: MigrationPlan,
}

/// DDL needed before a batch of records can be inserted into `table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationPlan {
    CreateTable { table: String, columns: Vec<ColumnDef> },
    AddColumns { table: String, columns: Vec<ColumnDef> },
}

impl MigrationPlan {
    pub fn table(&self) -> &str {
        match self {
            MigrationPlan::CreateTable { table, .. } | MigrationPlan::AddColumns { table, .. } => {
                table
            }
        }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        match self {
            MigrationPlan::CreateTable { columns, .. } | MigrationPlan::AddColumns { columns, .. } => {
                columns
            }
        }
    }

    pub fn creates_table(&self) -> bool {
        matches!(self, MigrationPlan::CreateTable { .. })
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, MigrationPlan::AddColumns { columns, .. } if columns.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub table: String,
    pub records: usize,
    pub table_created: bool,
    pub columns_added: Vec<ColumnDef>,
    pub statements: Vec<String>,
    pub applied: bool,
}

/// Round to cents the way revenue is presented everywhere.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
