//! Query execution
//!
//! Provides a trait for running a [`Query`], with:
//! - Postgres implementation over a sqlx pool
//! - Mock implementation for testing
//!
//! Rows come back as [`Record`]s: JSON objects keyed by physical column name.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::error::{RefdataError, Result};
use crate::query::Query;

/// One result row, keyed by column name
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Trait for query execution (testable)
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, query: &Query) -> Result<Vec<Record>>;
}

/// Executor backed by a Postgres pool.
///
/// The rendered query is wrapped in `row_to_json` so the database hands back
/// plain records regardless of column types.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Executor for PgExecutor {
    async fn execute(&self, query: &Query) -> Result<Vec<Record>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT row_to_json(q) AS record FROM (");
        query.push_select(&mut builder);
        builder.push(") q");

        let values = builder
            .build_query_scalar::<serde_json::Value>()
            .fetch_all(&self.pool)
            .await?;
        debug!(table = query.table(), sql = %query, rows = values.len(), "executed query");

        values
            .into_iter()
            .map(|value| into_record(query.table(), value))
            .collect()
    }
}

fn into_record(table: &'static str, value: serde_json::Value) -> Result<Record> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Err(RefdataError::invalid_record(table, "got null row")),
        serde_json::Value::Array(_) => {
            Err(RefdataError::invalid_record(table, "expected object, got array"))
        }
        other => Err(RefdataError::invalid_record(
            table,
            format!("expected object, got scalar {}", other),
        )),
    }
}

/// Deserialize records into typed rows.
pub fn decode_records<T: DeserializeOwned>(table: &'static str, records: Vec<Record>) -> Result<Vec<T>> {
    records
        .into_iter()
        .map(|record| {
            serde_json::from_value(serde_json::Value::Object(record))
                .map_err(|e| RefdataError::decode(table, e))
        })
        .collect()
}

/// Mock executor for testing.
///
/// Answers each query with the canned rows registered for its base table.
/// Joins and filters are not evaluated; register the rows the real query
/// would return.
#[derive(Default)]
pub struct MockExecutor {
    tables: HashMap<&'static str, Vec<serde_json::Value>>,
    failing: Vec<&'static str>,
    executed: Mutex<Vec<Query>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows to return for queries whose base table is `table`
    pub fn with_rows(
        mut self,
        table: &'static str,
        rows: impl IntoIterator<Item = serde_json::Value>,
    ) -> Self {
        self.tables.entry(table).or_default().extend(rows);
        self
    }

    /// Fail queries on `table` the way a dropped connection would
    pub fn failing_on(mut self, table: &'static str) -> Self {
        self.failing.push(table);
        self
    }

    /// Queries executed so far, in call order
    pub fn executed(&self) -> Vec<Query> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, query: &Query) -> Result<Vec<Record>> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());

        let table = query.table();
        if self.failing.contains(&table) {
            return Err(sqlx::Error::PoolClosed.into());
        }

        self.tables
            .get(table)
            .map(|rows| rows.iter().cloned().map(|row| into_record(table, row)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
