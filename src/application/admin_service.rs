use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::ports::{OrderRepository, ProductRepository, Repositories};
use crate::domain::product::{matches_search, NewProduct, Product, ProductFields};
use crate::domain::user::AuthUser;
use crate::infrastructure::image_store::{filename_from_url, ImageStore};

pub const DUPLICATE_NAME: &str = "Product name already exists. Please choose a different name.";
pub const ADMIN_REQUIRED: &str = "Access denied. Admin privileges required.";

pub fn require_admin(user: &AuthUser) -> Result<(), DomainError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(DomainError::Forbidden(ADMIN_REQUIRED.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub image_url: String,
    pub filename: String,
}

/// Back-office operations over products, images and orders. Callers check
/// the admin role first.
pub struct AdminService {
    products: Arc<dyn ProductRepository>,
    orders: Arc<dyn OrderRepository>,
    images: ImageStore,
}

impl AdminService {
    pub fn new(repos: &Repositories, images: ImageStore) -> Self {
        Self {
            products: repos.products.clone(),
            orders: repos.orders.clone(),
            images,
        }
    }

    /// Every product, sold out ones included, newest first.
    pub fn list_products(&self, search: Option<&str>) -> Result<Vec<Product>, DomainError> {
        Ok(self
            .products
            .list()?
            .into_iter()
            .filter(|p| matches_search(p, search))
            .collect())
    }

    pub fn name_exists(&self, name: &str, excluding: Option<Uuid>) -> Result<bool, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        Ok(self
            .products
            .find_by_name(name)?
            .is_some_and(|p| Some(p.id) != excluding))
    }

    pub fn create_product(
        &self,
        admin_id: Uuid,
        fields: ProductFields,
        image_url: Option<String>,
    ) -> Result<Product, DomainError> {
        let fields = fields.validate()?;
        if self.name_exists(&fields.name, None)? {
            return Err(DomainError::Conflict(DUPLICATE_NAME.to_string()));
        }
        let product = self
            .products
            .create(NewProduct {
                fields,
                image_url: image_url.filter(|url| !url.trim().is_empty()),
                created_by: Some(admin_id),
            })
            .map_err(duplicate_name)?;
        log::info!("Product {} created by {admin_id}", product.id);
        Ok(product)
    }

    pub fn update_product(&self, id: Uuid, fields: ProductFields) -> Result<Product, DomainError> {
        let fields = fields.validate()?;
        if self.name_exists(&fields.name, Some(id))? {
            return Err(DomainError::Conflict(DUPLICATE_NAME.to_string()));
        }
        let product = self
            .products
            .update(id, &fields)
            .map_err(duplicate_name)?
            .ok_or(DomainError::NotFound("Product"))?;
        log::info!("Product {id} updated");
        Ok(product)
    }

    /// Deletes the product, then its library image. A failed image cleanup
    /// is logged only.
    pub fn delete_product(&self, id: Uuid) -> Result<Product, DomainError> {
        let product = self
            .products
            .delete(id)?
            .ok_or(DomainError::NotFound("Product"))?;

        if let Some(file) = product.image_url.as_deref().and_then(filename_from_url) {
            match self.images.delete(file) {
                Ok(true) => log::info!("Image file {file} deleted"),
                Ok(false) => log::info!("Image file {file} not found, skipping"),
                Err(e) => log::warn!("Error deleting image file {file}: {e}"),
            }
        }
        Ok(product)
    }

    pub fn upload_image(
        &self,
        content_type: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<UploadedImage, DomainError> {
        let image_url = self.images.save(content_type, original_name, bytes)?;
        let filename = filename_from_url(&image_url)
            .map(str::to_string)
            .ok_or_else(|| DomainError::Internal(format!("unexpected image url {image_url}")))?;
        Ok(UploadedImage {
            image_url,
            filename,
        })
    }

    pub fn delete_image(&self, filename: &str) -> Result<bool, DomainError> {
        self.images.delete(filename)
    }

    pub fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, DomainError> {
        self.orders.list_all(status)
    }

    /// Writes any status. Moves outside the usual lifecycle go through with a
    /// warning.
    pub fn set_order_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, DomainError> {
        let mut order = self
            .orders
            .find_by_id(id)?
            .ok_or(DomainError::NotFound("Order"))?
            .order;

        if order.status != status && !order.status.can_transition_to(status) {
            log::warn!(
                "Order {} moved from {} to {} outside the usual lifecycle",
                order.order_number,
                order.status,
                status
            );
        }

        if !self.orders.update_status(id, status)? {
            return Err(DomainError::NotFound("Order"));
        }
        order.status = status;
        Ok(order)
    }
}

fn duplicate_name(e: DomainError) -> DomainError {
    match e {
        DomainError::Conflict(_) => DomainError::Conflict(DUPLICATE_NAME.to_string()),
        other => other,
    }
}
