//! SQLite access: connection setup, the two base tables, reflection and
//! schema-agnostic row I/O for tables created from uploaded JSON.

use crate::config::DatabaseConfig;
use crate::core::schema::{plan_statements, quote_ident};
use crate::domain::model::{ColumnDef, MigrationPlan, Record, TableSchema};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_identifier;
use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use std::str::FromStr;

const BASE_SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS sundaes (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT
    )",
    "CREATE TABLE IF NOT EXISTS sales (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sundae_id TEXT NOT NULL REFERENCES sundaes(id) ON DELETE CASCADE,
        timestamp REAL NOT NULL,
        price REAL NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_sales_sundae_id ON sales(sundae_id)",
];

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Every connection to `:memory:` opens its own empty database.
fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// One connection that is never recycled, so the in-memory data lives as
/// long as the pool.
fn single_connection_pool() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        tracing::info!("🔹 Connecting to {}", config.url);
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if is_in_memory(&config.url) {
            tracing::warn!("🔸 In-memory database: data is lost when the process exits");
            single_connection_pool()
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };
        let pool = pool_options.connect_with(options).await?;

        let db = Self { pool };
        db.ensure_base_schema().await?;
        Ok(db)
    }

    /// Private in-memory database on a single pinned connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = single_connection_pool().connect_with(options).await?;

        let db = Self { pool };
        db.ensure_base_schema().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ensure_base_schema(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for statement in BASE_SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        tracing::debug!("Base tables ready");
        Ok(())
    }

    /// Drops `sales` and `sundaes` (with any runtime columns) and recreates them.
    pub async fn reset(&self) -> Result<()> {
        tracing::warn!("🔸 Dropping sales and sundaes tables");
        let mut tx = self.pool.begin().await?;
        sqlx::query("DROP TABLE IF EXISTS sales")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DROP TABLE IF EXISTS sundaes")
            .execute(&mut *tx)
            .await?;
        for statement in BASE_SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        if one != 1 {
            return Err(EtlError::ProcessingError {
                message: format!("unexpected connection test result: {}", one),
            });
        }
        Ok(())
    }

    pub async fn table_schema(&self, table: &str) -> Result<Option<TableSchema>> {
        validate_identifier(table)?;

        let columns: Vec<(String, String)> =
            sqlx::query_as("SELECT name, type FROM pragma_table_info(?1)")
                .bind(table)
                .fetch_all(&self.pool)
                .await?;

        if columns.is_empty() {
            return Ok(None);
        }

        Ok(Some(TableSchema {
            name: table.to_string(),
            columns: columns
                .into_iter()
                .map(|(name, sql_type)| ColumnDef::new(name, sql_type))
                .collect(),
        }))
    }

    pub async fn list_tables(&self) -> Result<Vec<TableSchema>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            // 只列出可安全引用的名稱
            if validate_identifier(&name).is_err() {
                tracing::debug!("Skipping table with unsupported name '{}'", name);
                continue;
            }
            if let Some(schema) = self.table_schema(&name).await? {
                tables.push(schema);
            }
        }
        Ok(tables)
    }

    pub async fn fetch_rows(&self, table: &str, limit: i64) -> Result<Vec<Map<String, Value>>> {
        if self.table_schema(table).await?.is_none() {
            return Err(EtlError::not_found(format!("Table '{}'", table)));
        }

        let sql = format!("SELECT * FROM {} LIMIT ?1", quote_ident(table));
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_json).collect()
    }

    /// Runs the plan's DDL and inserts every record in one transaction.
    /// Any failure rolls back both the schema change and the inserts.
    pub async fn apply_load(&self, plan: &MigrationPlan, records: &[Record]) -> Result<Vec<String>> {
        let table = plan.table();
        validate_identifier(table)?;
        let statements = plan_statements(plan);

        let mut tx = self.pool.begin().await?;
        for statement in &statements {
            tracing::info!("🔸 {}", statement);
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        tracing::info!("🔸 Inserting {} records into '{}'", records.len(), table);
        for record in records {
            insert_record(&mut tx, table, record).await?;
        }

        tx.commit().await?;
        tracing::info!("✅ Loaded {} records into '{}'", records.len(), table);
        Ok(statements)
    }
}

async fn insert_record(conn: &mut SqliteConnection, table: &str, record: &Record) -> Result<()> {
    let sql = if record.data.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
    } else {
        let columns: Vec<String> = record.data.keys().map(|k| quote_ident(k)).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.join(", "),
            placeholders
        )
    };

    let mut query = sqlx::query(&sql);
    for value in record.data.values() {
        query = bind_json(query, value)?;
    }
    query.execute(&mut *conn).await?;
    Ok(())
}

fn bind_json<'q>(query: SqliteQuery<'q>, value: &Value) -> Result<SqliteQuery<'q>> {
    Ok(match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        // 巢狀結構存成 JSON 字串
        nested => query.bind(serde_json::to_string(nested)?),
    })
}

fn row_to_json(row: &SqliteRow) -> Result<Map<String, Value>> {
    let mut object = Map::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;

        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(index)?),
                "REAL" => serde_json::Number::from_f64(row.try_get::<f64, _>(index)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => Value::String(
                    String::from_utf8_lossy(&row.try_get::<Vec<u8>, _>(index)?).into_owned(),
                ),
                _ => Value::String(row.try_get::<String, _>(index)?),
            }
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::plan_migration;
    use serde_json::json;

    fn records(value: Value) -> Vec<Record> {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_base_schema_is_created() {
        let db = Database::in_memory().await.unwrap();
        let tables = db.list_tables().await.unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["sales", "sundaes"]);

        let sales = db.table_schema("sales").await.unwrap().unwrap();
        assert!(sales.has_column("price"));
        assert!(sales.has_column("sundae_id"));
        db.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_load_creates_table_and_reads_back_rows() {
        let db = Database::in_memory().await.unwrap();
        let data = records(json!([
            {"name": "Ada", "age": 36, "rating": 4.5, "active": true, "tags": ["a", "b"]},
            {"name": "Grace", "age": null}
        ]));

        let plan = plan_migration("employees", None, &data).unwrap();
        let statements = db.apply_load(&plan, &data).await.unwrap();
        assert_eq!(statements.len(), 1);

        let rows = db.fetch_rows("employees", 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id_pk"], json!(1));
        assert_eq!(rows[0]["name"], json!("Ada"));
        assert_eq!(rows[0]["age"], json!(36));
        assert_eq!(rows[0]["rating"], json!(4.5));
        assert_eq!(rows[0]["active"], json!(1));
        assert_eq!(rows[0]["tags"], json!("[\"a\",\"b\"]"));
        assert_eq!(rows[1]["age"], Value::Null);
        assert_eq!(rows[1]["rating"], Value::Null);
    }

    #[tokio::test]
    async fn test_apply_load_adds_columns_to_existing_table() {
        let db = Database::in_memory().await.unwrap();
        let sundaes = records(json!([{"id": "classic", "name": "Classic", "description": "Vanilla"}]));
        let plan = plan_migration("sundaes", db.table_schema("sundaes").await.unwrap().as_ref(), &sundaes).unwrap();
        db.apply_load(&plan, &sundaes).await.unwrap();

        let sales = records(json!([
            {"sundae_id": "classic", "timestamp": 1700000000.0, "price": 4.5, "quantity": 2}
        ]));
        let existing = db.table_schema("sales").await.unwrap();
        let plan = plan_migration("sales", existing.as_ref(), &sales).unwrap();
        db.apply_load(&plan, &sales).await.unwrap();

        let schema = db.table_schema("sales").await.unwrap().unwrap();
        assert!(schema.has_column("quantity"));
        let rows = db.fetch_rows("sales", 10).await.unwrap();
        assert_eq!(rows[0]["quantity"], json!(2));
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_schema_change() {
        let db = Database::in_memory().await.unwrap();
        // 外鍵不存在 → 整批回滾
        let sales = records(json!([
            {"sundae_id": "ghost", "timestamp": 1700000000.0, "price": 1.0, "store": "north"}
        ]));
        let existing = db.table_schema("sales").await.unwrap();
        let plan = plan_migration("sales", existing.as_ref(), &sales).unwrap();

        let result = db.apply_load(&plan, &sales).await;
        assert!(matches!(result, Err(EtlError::DatabaseError(_))));

        let schema = db.table_schema("sales").await.unwrap().unwrap();
        assert!(!schema.has_column("store"));
        assert!(db.fetch_rows("sales", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_rows_unknown_table() {
        let db = Database::in_memory().await.unwrap();
        let result = db.fetch_rows("nothing_here", 5).await;
        assert!(matches!(result, Err(EtlError::NotFound { .. })));

        let result = db.fetch_rows("bad name", 5).await;
        assert!(matches!(result, Err(EtlError::InvalidIdentifier { .. })));
    }

    #[tokio::test]
    async fn test_empty_records_insert_default_values() {
        let db = Database::in_memory().await.unwrap();
        let ticks = records(json!([{}, {}]));

        let plan = plan_migration("ticks", None, &ticks).unwrap();
        let statements = db.apply_load(&plan, &ticks).await.unwrap();
        assert_eq!(
            statements,
            vec!["CREATE TABLE \"ticks\" (\"id_pk\" INTEGER PRIMARY KEY AUTOINCREMENT)".to_string()]
        );

        let rows = db.fetch_rows("ticks", 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["id_pk"], json!(2));
    }

    #[tokio::test]
    async fn test_empty_records_violate_sales_not_null() {
        let db = Database::in_memory().await.unwrap();
        let empty = records(json!([{}, {}]));
        let existing = db.table_schema("sales").await.unwrap();
        let plan = plan_migration("sales", existing.as_ref(), &empty).unwrap();
        assert!(plan.is_noop());

        let result = db.apply_load(&plan, &empty).await;
        match result {
            Err(EtlError::DatabaseError(e)) => assert!(e.to_string().contains("NOT NULL")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(db.fetch_rows("sales", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blob_is_read_back_as_lossy_text() {
        let db = Database::in_memory().await.unwrap();
        sqlx::query("CREATE TABLE attachments (label TEXT, content BLOB)")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO attachments VALUES ('logo', x'ff41')")
            .execute(db.pool())
            .await
            .unwrap();

        let rows = db.fetch_rows("attachments", 10).await.unwrap();
        assert_eq!(rows[0]["label"], json!("logo"));
        assert_eq!(rows[0]["content"], json!("\u{FFFD}A"));
    }

    #[tokio::test]
    async fn test_in_memory_url_keeps_one_connection() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        };
        let db = Database::connect(&config).await.unwrap();
        assert_eq!(db.pool().options().get_max_connections(), 1);

        let sundaes = records(json!([{"id": "classic", "name": "Classic"}]));
        let existing = db.table_schema("sundaes").await.unwrap();
        let plan = plan_migration("sundaes", existing.as_ref(), &sundaes).unwrap();
        db.apply_load(&plan, &sundaes).await.unwrap();

        // 多次取連線仍看到同一份資料
        let (a, b) = tokio::join!(db.list_sundaes(), db.list_sundaes());
        assert_eq!(a.unwrap().len(), 1);
        assert_eq!(b.unwrap().len(), 1);
        assert!(is_in_memory("sqlite://file:shared?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://sundaes.db"));
    }

    #[tokio::test]
    async fn test_reset_drops_runtime_columns() {
        let db = Database::in_memory().await.unwrap();
        let sundaes = records(json!([{"id": "nuts", "name": "Nuts", "calories": 640}]));
        let existing = db.table_schema("sundaes").await.unwrap();
        let plan = plan_migration("sundaes", existing.as_ref(), &sundaes).unwrap();
        db.apply_load(&plan, &sundaes).await.unwrap();

        db.reset().await.unwrap();

        let schema = db.table_schema("sundaes").await.unwrap().unwrap();
        assert!(!schema.has_column("calories"));
        assert!(db.fetch_rows("sundaes", 10).await.unwrap().is_empty());
    }
}
