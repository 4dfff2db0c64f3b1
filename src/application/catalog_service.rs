use std::sync::Arc;
use std::thread;
use std::time::Duration;

use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::ports::ProductRepository;
use crate::domain::product::{CatalogFacets, CatalogFilter, Product};

const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
}

impl Pagination {
    fn apply(self, products: Vec<Product>) -> Vec<Product> {
        let skip = self.page.saturating_sub(1).saturating_mul(self.per_page);
        products.into_iter().skip(skip).take(self.per_page).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub products: Vec<Product>,
    /// Matches before pagination.
    pub total: usize,
    pub facets: CatalogFacets,
}

/// Storefront view of the product table: in-stock items only.
pub struct CatalogService {
    products: Arc<dyn ProductRepository>,
    retry_delay: Duration,
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductRepository>, retry_delay: Duration) -> Self {
        Self {
            products,
            retry_delay,
        }
    }

    fn in_stock(&self) -> Result<Vec<Product>, DomainError> {
        let mut attempt = 1;
        loop {
            match self.products.list() {
                Ok(products) => return Ok(products.into_iter().filter(Product::in_stock).collect()),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    log::warn!("Product fetch attempt {attempt} failed, retrying: {e}");
                    thread::sleep(self.retry_delay * attempt);
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("Error fetching products after {MAX_ATTEMPTS} attempts: {e}");
                    return Err(e);
                }
            }
        }
    }

    pub fn list_available(
        &self,
        filter: &CatalogFilter,
        pagination: Option<Pagination>,
    ) -> Result<CatalogPage, DomainError> {
        let all = self.in_stock()?;
        let facets = CatalogFacets::from_products(&all);
        let matching: Vec<Product> = all.into_iter().filter(|p| filter.matches(p)).collect();
        let total = matching.len();
        let products = match pagination {
            Some(p) => p.apply(matching),
            None => matching,
        };
        Ok(CatalogPage {
            products,
            total,
            facets,
        })
    }

    pub fn get_product(&self, id: Uuid) -> Result<Product, DomainError> {
        self.products
            .find_by_id(id)?
            .ok_or(DomainError::NotFound("Product"))
    }
}
