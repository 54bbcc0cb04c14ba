//! Generic row store used by the backup and scheduling pipelines.
//!
//! Rows travel as JSON objects keyed by column name so the exporter and
//! restorer can move whole tables without knowing their column types.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::params_from_iter;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Number, Value};

use super::reminders::ReminderRow;
use super::{Database, DbError, DbResult};
use crate::models::{Medicine, Reminder};

/// A single table row keyed by column name.
pub type Row = Map<String, Value>;

/// Relational row store addressed by SQL statements.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run a statement that returns rows.
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>>;

    /// Run a statement that modifies rows, returning the affected count.
    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize>;
}

/// [`Store`] backed by a SQLite [`Database`].
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Lock the underlying database for typed access.
    pub fn lock(&self) -> DbResult<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|e| DbError::Lock(e.to_string()))
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.lock()?.query_rows(sql, params)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        self.lock()?.execute_sql(sql, params)
    }
}

impl Database {
    /// Run a query and return rows as column-keyed JSON objects.
    pub fn query_rows(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt.query(params_from_iter(params.iter().map(to_sql_value)))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), from_sql_value(row.get_ref(idx)?));
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Run a modifying statement with JSON parameters.
    pub fn execute_sql(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        Ok(self
            .conn
            .execute(sql, params_from_iter(params.iter().map(to_sql_value)))?)
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        // Nested structures are stored as JSON text columns
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::from(b.to_vec()),
    }
}

// =========================================================================
// Typed access to generic rows
// =========================================================================

fn field<'r>(row: &'r Row, key: &str) -> DbResult<&'r Value> {
    row.get(key)
        .ok_or_else(|| DbError::Constraint(format!("Missing column: {}", key)))
}

fn opt_i64(row: &Row, key: &str) -> DbResult<Option<i64>> {
    match row.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| DbError::Constraint(format!("Column {} is not an integer", key))),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| DbError::Constraint(format!("Column {} is not an integer", key))),
        Some(_) => Err(DbError::Constraint(format!("Column {} is not an integer", key))),
    }
}

fn req_i64(row: &Row, key: &str) -> DbResult<i64> {
    opt_i64(row, key)?.ok_or_else(|| DbError::Constraint(format!("Column {} is null", key)))
}

fn opt_string(row: &Row, key: &str) -> Option<String> {
    match row.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn req_string(row: &Row, key: &str) -> DbResult<String> {
    field(row, key)?;
    opt_string(row, key).ok_or_else(|| DbError::Constraint(format!("Column {} is null", key)))
}

fn req_bool(row: &Row, key: &str) -> DbResult<bool> {
    match field(row, key)? {
        Value::Bool(b) => Ok(*b),
        _ => Ok(req_i64(row, key)? != 0),
    }
}

/// Build a [`Reminder`] from a `reminders` row.
pub fn reminder_from_row(row: &Row) -> DbResult<Reminder> {
    let times = match field(row, "times")? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    ReminderRow {
        id: req_i64(row, "id")?,
        family_member_id: opt_i64(row, "family_member_id")?,
        title: req_string(row, "title")?,
        frequency: req_string(row, "frequency")?,
        times_per_day: u32::try_from(req_i64(row, "times_per_day")?)
            .map_err(|_| DbError::Constraint("times_per_day out of range".into()))?,
        times,
        active: req_bool(row, "active")?,
        created_at: req_string(row, "created_at")?,
        dosage: opt_string(row, "dosage"),
        description: opt_string(row, "description"),
    }
    .try_into()
}

/// Build a [`Medicine`] from a `medicines` row.
pub fn medicine_from_row(row: &Row) -> DbResult<Medicine> {
    let quantity = match row.get("quantity") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        _ => 0.0,
    };
    Ok(Medicine {
        id: req_i64(row, "id")?,
        name: req_string(row, "name")?,
        kit_id: req_i64(row, "kit_id")?,
        expiration_date: opt_i64(row, "expiration_date")?,
        quantity,
        unit: opt_string(row, "unit").unwrap_or_else(|| "pcs".to_string()),
        photo_path: opt_string(row, "photo_path"),
        created_at: opt_string(row, "created_at").unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, IntakeTime, Kit};
    use serde_json::json;

    fn store_with_kit() -> SqliteStore {
        let db = Database::open_in_memory().unwrap();
        db.insert_kit(&Kit::new("Home".into())).unwrap();
        SqliteStore::new(db)
    }

    #[tokio::test]
    async fn test_query_returns_column_keyed_rows() {
        let store = store_with_kit();
        let rows = store
            .query("SELECT id, name, description FROM kits", &[])
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("Home"));
        assert_eq!(rows[0]["description"], Value::Null);
        assert!(rows[0]["id"].is_i64());
    }

    #[tokio::test]
    async fn test_execute_with_json_params() {
        let store = store_with_kit();
        let affected = store
            .execute(
                "INSERT INTO medicines (id, name, kit_id, expiration_date, quantity) VALUES (?1, ?2, ?3, ?4, ?5)",
                &[json!(10), json!("Aspirin"), json!(1), json!(1_800_000_000_000_i64), json!(12.5)],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = store
            .query("SELECT * FROM medicines WHERE id = ?1", &[json!(10)])
            .await
            .unwrap();
        let medicine = medicine_from_row(&rows[0]).unwrap();
        assert_eq!(medicine.name, "Aspirin");
        assert_eq!(medicine.quantity, 12.5);
        assert_eq!(medicine.expiration_date, Some(1_800_000_000_000));
    }

    #[tokio::test]
    async fn test_reminder_from_row() {
        let store = store_with_kit();
        let mut reminder = Reminder::new(
            "Night".into(),
            Frequency::Weekly,
            vec![IntakeTime::new(22, 0)],
        );
        reminder.family_member_id = None;
        let id = store.lock().unwrap().insert_reminder(&reminder).unwrap();

        let rows = store.query("SELECT * FROM reminders", &[]).await.unwrap();
        let parsed = reminder_from_row(&rows[0]).unwrap();
        assert_eq!(parsed.id, id);
        assert_eq!(parsed.frequency, Frequency::Weekly);
        assert_eq!(parsed.times, vec![IntakeTime::new(22, 0)]);
        assert!(parsed.active);
    }

    #[test]
    fn test_row_conversion_rejects_missing_columns() {
        let mut row = Row::new();
        row.insert("id".into(), json!(1));
        assert!(medicine_from_row(&row).is_err());
    }

    #[test]
    fn test_bool_and_nested_params() {
        assert_eq!(to_sql_value(&json!(true)), SqlValue::Integer(1));
        assert_eq!(
            to_sql_value(&json!([{"hour": 8, "minute": 0}])),
            SqlValue::Text(r#"[{"hour":8,"minute":0}]"#.into())
        );
    }
}
