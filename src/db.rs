//! Thin execution facade over an embedded SQLite connection.
//!
//! Ties the pieces together: load a template file, compile it against
//! a parameter map, execute the statement, and map result rows into
//! entities through serde:
//!
//! ```ignore
//! use twosql::db::SqliteSession;
//!
//! let session = SqliteSession::new(conn, "sql");
//! let users: Vec<User> = session.query("users/find.sql", &params)?;
//! ```

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::dialect::Dialect;
use crate::error::TemplateError;
use crate::loader::SqlLoader;
use crate::parser::{CompileOptions, SqlTemplate};
use crate::value::{Params, Value};

/// Failures from the load → compile → execute → map pipeline.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A result row did not deserialize into the requested entity.
    #[error("row mapping failed: {0}")]
    Mapping(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as SqlValue;
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            // Lists are expanded into placeholders before binding;
            // anything left over binds as NULL.
            Value::List(_) | Value::Map(_) => ToSqlOutput::Owned(SqlValue::Null),
        })
    }
}

/// High-level session: template directory + SQLite connection.
pub struct SqliteSession {
    conn: Connection,
    loader: SqlLoader,
}

impl SqliteSession {
    pub fn new(conn: Connection, sql_dir: impl Into<std::path::PathBuf>) -> SqliteSession {
        SqliteSession {
            conn,
            loader: SqlLoader::new(sql_dir),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run a SELECT template and map every row into `T`.
    pub fn query<T: DeserializeOwned>(&self, sql_path: &str, params: &Params) -> DbResult<Vec<T>> {
        let rows = self.query_rows(sql_path, params)?;
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(serde_json::Value::Object(row))
                    .map_err(|e| DbError::Mapping(e.to_string()))
            })
            .collect()
    }

    /// Run a SELECT template and map the first row, if any.
    pub fn query_one<T: DeserializeOwned>(
        &self,
        sql_path: &str,
        params: &Params,
    ) -> DbResult<Option<T>> {
        let mut rows = self.query_rows(sql_path, params)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let row = rows.remove(0);
        serde_json::from_value(serde_json::Value::Object(row))
            .map(Some)
            .map_err(|e| DbError::Mapping(e.to_string()))
    }

    /// Run an INSERT/UPDATE/DELETE template; returns affected rows.
    pub fn execute(&self, sql_path: &str, params: &Params) -> DbResult<usize> {
        let compiled = self.compile(sql_path, params)?;
        let mut stmt = self.conn.prepare(&compiled.0)?;
        Ok(stmt.execute(rusqlite::params_from_iter(compiled.1.iter()))?)
    }

    /// Run an INSERT template; returns the generated row id.
    pub fn insert(&self, sql_path: &str, params: &Params) -> DbResult<i64> {
        self.execute(sql_path, params)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn compile(&self, sql_path: &str, params: &Params) -> DbResult<(String, Vec<Value>)> {
        let text = self.loader.load(sql_path, Some(Dialect::Sqlite))?;
        let options = CompileOptions::default()
            .with_dialect(Dialect::Sqlite)
            .with_base_dir(self.loader.base_dir());
        let result = SqlTemplate::with_options(text, options)?.compile(params)?;
        Ok((result.sql, result.params))
    }

    fn query_rows(
        &self,
        sql_path: &str,
        params: &Params,
    ) -> DbResult<Vec<serde_json::Map<String, serde_json::Value>>> {
        let (sql, binds) = self.compile(sql_path, params)?;
        let mut stmt = self.conn.prepare(&sql)?;
        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut rows = stmt.query(rusqlite::params_from_iter(binds.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut object = serde_json::Map::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                object.insert(name.clone(), column_to_json(row.get_ref(i)?));
            }
            result.push(object);
        }
        Ok(result)
    }
}

fn column_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Blob(bytes) => serde_json::Value::Array(
            bytes
                .iter()
                .map(|&b| serde_json::Value::Number(b.into()))
                .collect(),
        ),
    }
}
