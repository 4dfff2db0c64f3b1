use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::ProductResponse;
use crate::application::catalog_service::Pagination;
use crate::domain::product::CatalogFilter;
use crate::errors::AppError;
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CatalogParams {
    /// Case-insensitive match on name and description.
    pub search: Option<String>,
    /// Comma-separated vehicle types, e.g. "Matic,Sport".
    pub vehicle_type: Option<String>,
    /// Comma-separated item types.
    pub item_type: Option<String>,
    /// Page number (1-based). Only applied together with `limit`.
    pub page: Option<usize>,
    /// Items per page, maximum 100.
    pub limit: Option<usize>,
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

impl CatalogParams {
    fn into_parts(self) -> (CatalogFilter, Option<Pagination>) {
        let pagination = self.limit.map(|limit| Pagination {
            page: self.page.unwrap_or(1).max(1),
            per_page: limit.clamp(1, 100),
        });
        let filter = CatalogFilter {
            search: self.search,
            vehicle_types: split_list(self.vehicle_type),
            item_types: split_list(self.item_type),
        };
        (filter, pagination)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FacetsResponse {
    pub vehicle_types: Vec<String>,
    pub item_types: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogResponse {
    pub items: Vec<ProductResponse>,
    pub total: usize,
    pub facets: FacetsResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "catalog"
)]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "online".to_string(),
        message: "JAWS shop API is running".to_string(),
    })
}

/// GET /products
///
/// In-stock products, newest first, with the category facets of the whole
/// in-stock list.
#[utoipa::path(
    get,
    path = "/products",
    params(CatalogParams),
    responses(
        (status = 200, description = "Catalog page", body = CatalogResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn list_products(
    state: web::Data<AppState>,
    query: web::Query<CatalogParams>,
) -> Result<HttpResponse, AppError> {
    let (filter, pagination) = query.into_inner().into_parts();

    let page = web::block(move || state.catalog.list_available(&filter, pagination)).await??;

    Ok(HttpResponse::Ok().json(CatalogResponse {
        items: page.products.into_iter().map(ProductResponse::from).collect(),
        total: page.total,
        facets: FacetsResponse {
            vehicle_types: page.facets.vehicle_types,
            item_types: page.facets.item_types,
        },
    }))
}

/// GET /products/{id}
#[utoipa::path(
    get,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Product found", body = ProductResponse),
        (status = 404, description = "Product not found"),
    ),
    tag = "catalog"
)]
pub async fn get_product(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let product = web::block(move || state.catalog.get_product(id)).await??;
    Ok(HttpResponse::Ok().json(ProductResponse::from(product)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_split_category_lists_and_clamp_limit() {
        let params = CatalogParams {
            search: Some("brake".to_string()),
            vehicle_type: Some("Matic, Sport,,".to_string()),
            item_type: None,
            page: Some(0),
            limit: Some(500),
        };

        let (filter, pagination) = params.into_parts();

        assert_eq!(filter.vehicle_types, vec!["Matic", "Sport"]);
        assert!(filter.item_types.is_empty());
        assert_eq!(
            pagination,
            Some(Pagination {
                page: 1,
                per_page: 100
            })
        );
    }

    #[test]
    fn no_limit_means_no_pagination() {
        let (_, pagination) = CatalogParams::default().into_parts();
        assert_eq!(pagination, None);
    }
}
