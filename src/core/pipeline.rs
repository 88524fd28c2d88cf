use crate::core::database::Database;
use crate::core::schema::{plan_migration, plan_statements};
use crate::core::{Pipeline, Record, Storage, TransformResult};
use crate::domain::model::LoadOutcome;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_identifier;
use serde_json::Value;
use std::path::Path;

/// SQLite column names are case-insensitive, so `Color` and `color` would
/// land in the same column.
fn check_key_collisions(index: usize, data: &serde_json::Map<String, Value>) -> Result<()> {
    let keys: Vec<&String> = data.keys().collect();
    for (i, key) in keys.iter().enumerate() {
        if let Some(other) = keys[..i].iter().find(|k| k.eq_ignore_ascii_case(key)) {
            return Err(EtlError::MalformedPayload {
                message: format!(
                    "record {} has keys '{}' and '{}' that differ only in case",
                    index, other, key
                ),
            });
        }
    }
    Ok(())
}

/// Input must be a non-empty JSON array of objects.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| EtlError::MalformedPayload {
        message: format!("invalid JSON: {}", e),
    })?;

    let Value::Array(items) = value else {
        return Err(EtlError::MalformedPayload {
            message: "expected a JSON array of records".to_string(),
        });
    };
    if items.is_empty() {
        return Err(EtlError::MalformedPayload {
            message: "no records found".to_string(),
        });
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(data) => {
                check_key_collisions(index, &data)?;
                Ok(Record::new(data))
            }
            other => Err(EtlError::MalformedPayload {
                message: format!("record {} is not an object: {}", index, other),
            }),
        })
        .collect()
}

/// `data/Sales.json` → `sales`
pub fn table_name_from_path(path: &str) -> Result<String> {
    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| EtlError::validation(format!("cannot derive a table name from '{}'", path)))?;
    let table = stem.to_lowercase();
    validate_identifier(&table)?;
    Ok(table)
}

/// Loads one JSON file into one table, evolving the table's schema first.
pub struct JsonLoadPipeline<S: Storage> {
    storage: S,
    db: Database,
    file: String,
    table: String,
    dry_run: bool,
}

impl<S: Storage> JsonLoadPipeline<S> {
    pub fn new(storage: S, db: Database, file: impl Into<String>, table: Option<String>) -> Result<Self> {
        let file = file.into();
        let table = match table {
            Some(table) => {
                validate_identifier(&table)?;
                table
            }
            None => table_name_from_path(&file)?,
        };

        Ok(Self {
            storage,
            db,
            file,
            table,
            dry_run: false,
        })
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for JsonLoadPipeline<S> {
    async fn extract(&self) -> Result<Vec<Record>> {
        tracing::debug!("Reading records from {}", self.file);
        let bytes = self.storage.read_file(&self.file).await?;
        parse_records(&bytes)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let existing = self.db.table_schema(&self.table).await?;
        match &existing {
            Some(schema) => tracing::debug!(
                "Existing columns in '{}': {:?}",
                self.table,
                schema.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
            ),
            None => tracing::info!("🔹 Table '{}' does not exist yet, it will be created", self.table),
        }

        let plan = plan_migration(&self.table, existing.as_ref(), &data)?;
        Ok(TransformResult {
            table: self.table.clone(),
            records: data,
            plan,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<LoadOutcome> {
        let statements = if self.dry_run {
            tracing::info!("🔍 Dry run: '{}' left untouched", result.table);
            plan_statements(&result.plan)
        } else {
            self.db.apply_load(&result.plan, &result.records).await?
        };

        Ok(LoadOutcome {
            table: result.table,
            records: result.records.len(),
            table_created: result.plan.creates_table(),
            columns_added: result.plan.columns().to_vec(),
            statements,
            applied: !self.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_accepts_array_of_objects() {
        let records = parse_records(br#"[{"id": "classic"}, {"id": "nuts", "extra": 1}]"#).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].data["extra"], serde_json::json!(1));
    }

    #[test]
    fn test_parse_records_rejects_other_shapes() {
        for input in [
            &b"{\"id\": 1}"[..],
            b"[]",
            b"[1, 2]",
            b"not json",
        ] {
            assert!(
                matches!(parse_records(input), Err(EtlError::MalformedPayload { .. })),
                "input {:?} should be rejected",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn test_parse_records_rejects_case_colliding_keys() {
        let result = parse_records(br#"[{"id": 1}, {"Color": "red", "color": "blue"}]"#);
        match result {
            Err(EtlError::MalformedPayload { message }) => {
                assert!(message.contains("record 1"));
                assert!(message.contains("'Color' and 'color'"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        // 不同紀錄之間大小寫不同仍視為同一欄
        let records = parse_records(br#"[{"Color": "red"}, {"color": "blue"}]"#).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_table_name_from_path() {
        assert_eq!(table_name_from_path("data/Sales.json").unwrap(), "sales");
        assert_eq!(table_name_from_path("/tmp/employees.json").unwrap(), "employees");
        assert!(table_name_from_path("data/2024-sales.json").is_err());
    }
}
