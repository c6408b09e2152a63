//! Product types and their attribute definitions

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::executor::{decode_records, Executor};
use crate::query::Query;
use crate::tables;

/// Row from `product_types`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductTypeRow {
    pub producttypeid: i32,
    #[serde(default)]
    pub productname: Option<String>,
    #[serde(default)]
    pub productunits: Option<String>,
}

/// Row from `product_attribute_types`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductAttributeRow {
    pub producttypeid: i32,
    pub attrid: i32,
    pub attrname: String,
}

/// Product type as returned to API consumers.
///
/// `attributes` holds attribute names only and is always present, empty when
/// the type has none. Name and unit pass database NULLs through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductType {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub attributes: Vec<String>,
}

pub fn product_types_query() -> Query {
    Query::from_table(tables::PRODUCT_TYPES)
}

pub fn product_attributes_query() -> Query {
    Query::from_table(tables::PRODUCT_ATTRIBUTE_TYPES)
}

/// Attach attribute names to their product types.
///
/// Types keep query order; names within a type keep attribute-row order.
pub fn shape_product_types(
    types: Vec<ProductTypeRow>,
    attributes: Vec<ProductAttributeRow>,
) -> Vec<ProductType> {
    let mut by_type: HashMap<i32, Vec<String>> = HashMap::new();
    for attribute in attributes {
        by_type
            .entry(attribute.producttypeid)
            .or_default()
            .push(attribute.attrname);
    }

    types
        .into_iter()
        .map(|row| ProductType {
            attributes: by_type.get(&row.producttypeid).cloned().unwrap_or_default(),
            name: row.productname,
            unit: row.productunits,
        })
        .collect()
}

/// Product type repository
pub struct ProductTypeRepo<'a, E: Executor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: Executor + ?Sized> ProductTypeRepo<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// Every product type with its attribute names.
    pub async fn get_product_types(&self) -> Result<Vec<ProductType>> {
        let types_query = product_types_query();
        let attributes_query = product_attributes_query();

        let (types, attributes) = futures::try_join!(
            self.executor.execute(&types_query),
            self.executor.execute(&attributes_query),
        )?;

        let types: Vec<ProductTypeRow> = decode_records(tables::PRODUCT_TYPES, types)?;
        let attributes: Vec<ProductAttributeRow> =
            decode_records(tables::PRODUCT_ATTRIBUTE_TYPES, attributes)?;

        debug!(
            types = types.len(),
            attributes = attributes.len(),
            "shaping product types"
        );

        Ok(shape_product_types(types, attributes))
    }
}

/// Convenience wrapper around [`ProductTypeRepo::get_product_types`].
pub async fn get_product_types<E: Executor + ?Sized>(executor: &E) -> Result<Vec<ProductType>> {
    ProductTypeRepo::new(executor).get_product_types().await
}
