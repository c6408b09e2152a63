//! refdata-core: people and product-type reference data
//!
//! Builds declarative queries over the normalized tables, runs them through an
//! [`Executor`], and shapes the rows into API objects.

pub mod config;
pub mod error;
pub mod executor;
pub mod people;
pub mod products;
pub mod query;
pub mod tables;

pub use config::{DatabaseConfig, RefdataConfig, DEFAULT_MAX_CONNECTIONS};
pub use error::{RefdataError, Result};
pub use executor::{decode_records, Executor, MockExecutor, PgExecutor, Record};
pub use people::{get_people, PeopleRepo, Person, PersonAttribute};
pub use products::{get_product_types, ProductType, ProductTypeRepo};
pub use query::{Column, Filter, Join, Query, Value};
