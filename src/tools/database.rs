//! DuckDB-backed database tools.
//!
//! Three tools over a single `output (message VARCHAR)` table: initialize,
//! append a row, read all rows back. Every call opens the database file
//! named by its `database_path` argument, so the same registry can serve
//! any number of databases. Inserts are parameterized; tool arguments are
//! never spliced into SQL text.

use std::path::Path;

use async_trait::async_trait;
use duckdb::Connection;
use serde_json::{json, Value};

use crate::error::{GaggleError, Result};
use crate::tool::{Tool, ToolRegistry};

/// A registry holding the three database tools.
pub fn database_toolkit() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(InitializeDatabase);
    registry.register(AddRowToDatabase);
    registry.register(ShowDatabaseOutput);
    registry
}

/// Remove a leftover database file. An explicit setup step the caller
/// invokes deliberately, never a side effect of loading the crate.
pub fn reset_database(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

fn open(path: &str) -> Result<Connection> {
    Connection::open(path)
        .map_err(|e| GaggleError::Storage(format!("failed to open database `{path}`: {e}")))
}

fn require_str<'a>(input: &'a Value, field: &str, tool: &str) -> Result<&'a str> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| GaggleError::Storage(format!("missing `{field}` for {tool}")))
}

fn path_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "database_path": {
                "type": "string",
                "description": "Path to the database file"
            }
        },
        "required": ["database_path"]
    })
}

/// Creates the `output` table if it does not exist yet. Safe to call on an
/// already-initialized database.
pub struct InitializeDatabase;

#[async_trait]
impl Tool for InitializeDatabase {
    fn name(&self) -> &str {
        "initialize_database"
    }

    fn description(&self) -> &str {
        "Initialize a database at the given path, creating an `output` table \
         with one `message` column. Safe to call on an existing database."
    }

    fn parameters(&self) -> Option<Value> {
        Some(path_schema())
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let path = require_str(&input, "database_path", self.name())?;
        let conn = open(path)?;
        conn.execute("CREATE TABLE IF NOT EXISTS output (message VARCHAR);", [])
            .map_err(|e| GaggleError::Storage(format!("failed to create table: {e}")))?;
        tracing::debug!(path, "database initialized");
        Ok(json!(path))
    }
}

/// Appends one row to the `output` table, preserving insertion order.
pub struct AddRowToDatabase;

#[async_trait]
impl Tool for AddRowToDatabase {
    fn name(&self) -> &str {
        "add_row_to_database"
    }

    fn description(&self) -> &str {
        "Add a row with the given `message` to the `output` table of the \
         database at `database_path`."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "database_path": {
                    "type": "string",
                    "description": "Path to the database file"
                },
                "message": {
                    "type": "string",
                    "description": "Text to append"
                }
            },
            "required": ["database_path", "message"]
        }))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let path = require_str(&input, "database_path", self.name())?;
        let message = require_str(&input, "message", self.name())?;
        let conn = open(path)?;
        conn.execute(
            "INSERT INTO output (message) VALUES (?);",
            duckdb::params![message],
        )
        .map_err(|e| GaggleError::Storage(format!("failed to insert row: {e}")))?;
        Ok(json!(path))
    }
}

/// Reads back every row of the `output` table, newline-joined, in the
/// order the rows were inserted.
pub struct ShowDatabaseOutput;

#[async_trait]
impl Tool for ShowDatabaseOutput {
    fn name(&self) -> &str {
        "show_database_output"
    }

    fn description(&self) -> &str {
        "Return all rows of the `output` table as a newline-separated string."
    }

    fn parameters(&self) -> Option<Value> {
        Some(path_schema())
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let path = require_str(&input, "database_path", self.name())?;
        let conn = open(path)?;
        let mut stmt = conn
            .prepare("SELECT message FROM output;")
            .map_err(|e| GaggleError::Storage(format!("failed to prepare query: {e}")))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| GaggleError::Storage(format!("query failed: {e}")))?;

        let mut messages: Vec<String> = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| GaggleError::Storage(format!("row error: {e}")))?
        {
            let message: String = row
                .get(0)
                .map_err(|e| GaggleError::Storage(format!("column error: {e}")))?;
            messages.push(message);
        }

        Ok(json!(messages.join("\n")))
    }
}
