use std::sync::Arc;

use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::cart::{cart_total, reconcile, CartAdjustment, CartItem, CartLine};
use crate::domain::errors::DomainError;
use crate::domain::ports::{CartRepository, ProductRepository, Repositories};

#[derive(Debug, Clone, PartialEq)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: BigDecimal,
    /// Set when lines had to be removed or cut down to stock.
    pub notice: Option<String>,
}

pub struct CartService {
    carts: Arc<dyn CartRepository>,
    products: Arc<dyn ProductRepository>,
}

impl CartService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            carts: repos.carts.clone(),
            products: repos.products.clone(),
        }
    }

    /// Loads the cart and brings it back within live stock, writing the
    /// adjustments through.
    pub fn fetch_reconciled(&self, user_id: Uuid) -> Result<CartView, DomainError> {
        let reconciliation = reconcile(self.carts.lines_for_user(user_id)?);

        for adjustment in &reconciliation.adjustments {
            let result = match *adjustment {
                CartAdjustment::Remove { item_id } => self.carts.remove(item_id),
                CartAdjustment::Clamp { item_id, quantity } => {
                    self.carts.set_quantity(item_id, quantity)
                }
            };
            if let Err(e) = result {
                log::error!("Error auto-adjusting cart item: {adjustment:?}: {e}");
            }
        }

        let notice = reconciliation.notice();
        if let Some(notice) = &notice {
            log::info!("Cart of {user_id} reconciled: {notice}");
        }
        Ok(CartView {
            total: cart_total(&reconciliation.lines),
            lines: reconciliation.lines,
            notice,
        })
    }

    /// Adds units of a product, merging with an existing line.
    pub fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, DomainError> {
        if quantity < 1 {
            return Err(DomainError::InvalidInput(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let product = self
            .products
            .find_by_id(product_id)?
            .ok_or(DomainError::NotFound("Product"))?;
        if !product.in_stock() {
            return Err(DomainError::StockLimit(format!(
                "{} is out of stock.",
                product.name
            )));
        }

        match self.carts.find_for_product(user_id, product_id)? {
            Some(mut item) => {
                let merged = item
                    .quantity
                    .checked_add(quantity)
                    .filter(|merged| *merged <= product.stock);
                let Some(merged) = merged else {
                    return Err(DomainError::StockLimit(format!(
                        "Cannot add more items. Only {} more available.",
                        (product.stock - item.quantity).max(0)
                    )));
                };
                self.carts.set_quantity(item.id, merged)?;
                item.quantity = merged;
                Ok(item)
            }
            None => {
                if quantity > product.stock {
                    return Err(DomainError::StockLimit(format!(
                        "Cannot add more items. Only {} more available.",
                        product.stock
                    )));
                }
                self.carts.insert(user_id, product_id, quantity)
            }
        }
    }

    /// Sets a line's quantity. Going up is checked against stock, going down
    /// never is.
    pub fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, DomainError> {
        if quantity < 1 {
            return Err(DomainError::InvalidInput(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let mut item = self.owned_item(user_id, item_id)?;

        if quantity > item.quantity {
            let stock = self
                .products
                .find_by_id(item.product_id)?
                .map(|p| p.stock)
                .unwrap_or(0);
            if quantity > stock {
                return Err(DomainError::StockLimit(format!(
                    "Cannot add more. Only {stock} items available in stock."
                )));
            }
        }

        self.carts.set_quantity(item.id, quantity)?;
        item.quantity = quantity;
        Ok(item)
    }

    pub fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), DomainError> {
        let item = self.owned_item(user_id, item_id)?;
        self.carts.remove(item.id)
    }

    fn owned_item(&self, user_id: Uuid, item_id: Uuid) -> Result<CartItem, DomainError> {
        self.carts
            .find_by_id(item_id)?
            .filter(|item| item.user_id == user_id)
            .ok_or(DomainError::NotFound("Cart item"))
    }
}
