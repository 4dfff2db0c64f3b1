use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::DomainError;

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub stock: i32,
    pub vehicle_type: Option<String>,
    pub item_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Editable product attributes shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFields {
    pub name: String,
    pub price: BigDecimal,
    pub description: String,
    pub stock: i32,
    pub vehicle_type: Option<String>,
    pub item_type: Option<String>,
}

impl ProductFields {
    /// Trims text fields and rejects blank names, non-positive prices and
    /// negative stock.
    pub fn validate(self) -> Result<Self, DomainError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::InvalidInput(
                "Product name must not be empty".to_string(),
            ));
        }
        if self.price <= BigDecimal::zero() {
            return Err(DomainError::InvalidInput(
                "Price must be greater than 0".to_string(),
            ));
        }
        if self.stock < 0 {
            return Err(DomainError::InvalidInput(
                "Stock must not be negative".to_string(),
            ));
        }
        Ok(Self {
            name,
            description: self.description.trim().to_string(),
            vehicle_type: non_blank(self.vehicle_type),
            item_type: non_blank(self.item_type),
            ..self
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub fields: ProductFields,
    pub image_url: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Storefront filter over the in-stock product list.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub search: Option<String>,
    pub vehicle_types: Vec<String>,
    pub item_types: Vec<String>,
}

impl CatalogFilter {
    pub fn matches(&self, product: &Product) -> bool {
        matches_search(product, self.search.as_deref())
            && matches_any(product.vehicle_type.as_deref(), &self.vehicle_types)
            && matches_any(product.item_type.as_deref(), &self.item_types)
    }
}

/// Case-insensitive substring match over name and description. A blank
/// term matches everything.
pub fn matches_search(product: &Product, term: Option<&str>) -> bool {
    let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
        return true;
    };
    let term = term.to_lowercase();
    product.name.to_lowercase().contains(&term)
        || product
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&term))
}

fn matches_any(value: Option<&str>, wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }
    value.is_some_and(|v| wanted.iter().any(|w| w == v))
}

/// Distinct category values present in a product list, sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFacets {
    pub vehicle_types: Vec<String>,
    pub item_types: Vec<String>,
}

impl CatalogFacets {
    pub fn from_products(products: &[Product]) -> Self {
        let mut vehicle_types: Vec<String> = products
            .iter()
            .filter_map(|p| p.vehicle_type.clone())
            .filter(|v| !v.is_empty())
            .collect();
        vehicle_types.sort();
        vehicle_types.dedup();

        let mut item_types: Vec<String> = products
            .iter()
            .filter_map(|p| p.item_type.clone())
            .filter(|v| !v.is_empty())
            .collect();
        item_types.sort();
        item_types.dedup();

        Self {
            vehicle_types,
            item_types,
        }
    }
}
