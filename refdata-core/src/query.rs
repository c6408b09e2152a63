//! Declarative query descriptions
//!
//! A [`Query`] is a plain value: base table, selected columns, inner joins and
//! equality filters. Nothing here touches the database; rendering pushes it
//! onto a `sqlx::QueryBuilder` and an
//! [`Executor`](crate::executor::Executor) runs it.

use std::fmt;

use sqlx::{Postgres, QueryBuilder};

/// A column, optionally qualified by its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    pub table: Option<&'static str>,
    pub name: &'static str,
}

impl Column {
    /// Table-qualified column (`table.name`).
    pub const fn new(table: &'static str, name: &'static str) -> Self {
        Self {
            table: Some(table),
            name,
        }
    }

    /// Unqualified column (`name`).
    pub const fn bare(name: &'static str) -> Self {
        Self { table: None, name }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => f.write_str(self.name),
        }
    }
}

/// `INNER JOIN table ON left = right`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: &'static str,
    pub left: Column,
    pub right: Column,
}

/// Bound parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Int(i64),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

/// `column = value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: Column,
    pub value: Value,
}

/// Immutable description of a SELECT.
///
/// Constructors consume and return the value, so a finished query is never
/// mutated after it is handed to an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: &'static str,
    columns: Vec<Column>,
    joins: Vec<Join>,
    filters: Vec<Filter>,
}

impl Query {
    /// Start a query on `table`, selecting every column until [`select`](Self::select) narrows it.
    pub fn from_table(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn select(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn inner_join(mut self, table: &'static str, left: Column, right: Column) -> Self {
        self.joins.push(Join { table, left, right });
        self
    }

    pub fn where_eq(mut self, column: Column, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column,
            value: value.into(),
        });
        self
    }

    /// Base table name
    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Push this SELECT onto `builder`.
    ///
    /// Filters are ANDed; each value goes through `push_bind`.
    pub fn push_select<'args>(&self, builder: &mut QueryBuilder<'args, Postgres>) {
        builder.push("SELECT ");

        if self.columns.is_empty() {
            builder.push("*");
        } else {
            let mut columns = builder.separated(", ");
            for column in &self.columns {
                columns.push(column);
            }
        }

        builder.push(" FROM ").push(self.table);

        for join in &self.joins {
            builder
                .push(" INNER JOIN ")
                .push(join.table)
                .push(" ON ")
                .push(join.left)
                .push(" = ")
                .push(join.right);
        }

        for (i, filter) in self.filters.iter().enumerate() {
            builder
                .push(if i == 0 { " WHERE " } else { " AND " })
                .push(filter.column)
                .push(" = ");
            match &filter.value {
                Value::Text(text) => builder.push_bind(text.clone()),
                Value::Int(int) => builder.push_bind(*int),
            };
        }
    }

    /// Standalone builder for this SELECT.
    pub fn to_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("");
        self.push_select(&mut builder);
        builder
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_builder().sql())
    }
}
