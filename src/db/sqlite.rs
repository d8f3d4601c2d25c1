use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{schema, DocumentStore, Filter, StoreResult};
use crate::error::StoreError;

/// SQLite-backed document store. One connection, serialized behind a mutex.
pub(crate) struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let mut conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to set database pragmas")?;
        migrate(&mut conn).context("Database migration failed")?;
        tracing::debug!(path = %path.display(), "document store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Bring the schema up to `CURRENT_VERSION`, one migration at a time, in a
/// single transaction.
fn migrate(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(schema::BASE_SCHEMA)?;

    let stored: Option<i32> = tx
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .context("Failed to read schema version")?;
    let mut version = match stored {
        Some(version) => version,
        None => {
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::BASE_VERSION],
            )?;
            schema::BASE_VERSION
        }
    };
    if version > schema::CURRENT_VERSION {
        anyhow::bail!(
            "Database schema version {version} is newer than this build supports ({})",
            schema::CURRENT_VERSION
        );
    }

    for &(applies_to, sql) in schema::MIGRATIONS {
        if applies_to == version {
            tx.execute_batch(sql)
                .with_context(|| format!("Migration from version {applies_to} failed"))?;
            version = applies_to + 1;
            tracing::debug!(version, "schema migrated");
        }
    }

    tx.execute("UPDATE schema_version SET version = ?1", params![version])?;
    tx.commit()?;
    Ok(())
}

fn not_an_object(table: &str) -> StoreError {
    StoreError::Codec(serde::de::Error::custom(format!(
        "documents in {table} must be JSON objects"
    )))
}

/// Scalar filter values SQLite can compare against `json_extract` directly.
fn sql_scalar(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real)),
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        _ => None,
    }
}

/// Field names that can be spliced into a JSON path literal.
fn is_plain_field(field: &str) -> bool {
    !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// All documents of `table` satisfying `filter`, in insertion order.
///
/// Scalar constraints on plain fields narrow the scan in SQL, where the
/// expression indexes apply. Every candidate is still checked against the
/// full filter, so structured values and JSON typing stay exact.
fn matching(conn: &Connection, table: &str, filter: &Filter) -> StoreResult<Vec<(i64, Value)>> {
    let mut sql = String::from("SELECT doc_id, body FROM documents WHERE collection = ?1");
    let mut args = vec![SqlValue::Text(table.to_string())];
    for (field, expected) in filter.fields() {
        if !is_plain_field(field) {
            continue;
        }
        if let Some(arg) = sql_scalar(expected) {
            args.push(arg);
            sql.push_str(&format!(
                " AND json_extract(body, '$.{field}') = ?{}",
                args.len()
            ));
        }
    }
    sql.push_str(" ORDER BY doc_id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (doc_id, body) = row?;
        let doc: Value = serde_json::from_str(&body)?;
        if filter.matches(&doc) {
            out.push((doc_id, doc));
        }
    }
    Ok(out)
}

impl DocumentStore for SqliteStore {
    fn insert(&self, table: &str, doc: &Value) -> StoreResult<()> {
        if !doc.is_object() {
            return Err(not_an_object(table));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
            params![table, serde_json::to_string(doc)?],
        )?;
        Ok(())
    }

    fn find_one(&self, table: &str, filter: &Filter) -> StoreResult<Option<Value>> {
        let conn = self.lock()?;
        Ok(matching(&conn, table, filter)?
            .into_iter()
            .next()
            .map(|(_, doc)| doc))
    }

    fn find_all(&self, table: &str, filter: &Filter) -> StoreResult<Vec<Value>> {
        let conn = self.lock()?;
        Ok(matching(&conn, table, filter)?
            .into_iter()
            .map(|(_, doc)| doc)
            .collect())
    }

    fn count(&self, table: &str, filter: &Filter) -> StoreResult<u64> {
        let conn = self.lock()?;
        Ok(matching(&conn, table, filter)?.len() as u64)
    }

    fn update(&self, table: &str, filter: &Filter, doc: &Value) -> StoreResult<u64> {
        let patch = doc.as_object().ok_or_else(|| not_an_object(table))?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let targets = matching(&tx, table, filter)?;
        let matched = targets.len() as u64;
        for (doc_id, mut current) in targets {
            if let Some(fields) = current.as_object_mut() {
                for (key, value) in patch {
                    fields.insert(key.clone(), value.clone());
                }
            }
            tx.execute(
                "UPDATE documents SET body = ?1 WHERE doc_id = ?2",
                params![serde_json::to_string(&current)?, doc_id],
            )?;
        }
        tx.commit()?;
        Ok(matched)
    }

    fn increment(&self, table: &str, filter: &Filter, field: &str) -> StoreResult<u64> {
        if !is_plain_field(field) {
            return Err(StoreError::Codec(serde::de::Error::custom(format!(
                "cannot increment field {field:?}"
            ))));
        }
        let path = format!("$.{field}");
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let targets = matching(&tx, table, filter)?;
        for (doc_id, _) in &targets {
            tx.execute(
                "UPDATE documents
                 SET body = json_set(body, ?1, COALESCE(json_extract(body, ?1), 0) + 1)
                 WHERE doc_id = ?2",
                params![path, doc_id],
            )?;
        }
        tx.commit()?;
        Ok(targets.len() as u64)
    }

    fn delete(&self, table: &str, filter: &Filter) -> StoreResult<u64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let targets = matching(&tx, table, filter)?;
        for (doc_id, _) in &targets {
            tx.execute("DELETE FROM documents WHERE doc_id = ?1", params![doc_id])?;
        }
        tx.commit()?;
        Ok(targets.len() as u64)
    }

    fn next_sequence(&self, table: &str) -> StoreResult<u64> {
        let conn = self.lock()?;
        let value: i64 = conn.query_row(
            "INSERT INTO sequences (name, value) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1
             RETURNING value",
            params![table],
            |row| row.get(0),
        )?;
        Ok(value as u64)
    }
}
