use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::cart::{CartItem, CartLine};
use crate::domain::errors::DomainError;
use crate::domain::ports::CartRepository;
use crate::schema::{cart_items, products};

use super::models::{CartItemRow, NewCartItemRow, ProductRow};

pub struct DieselCartRepository {
    pool: DbPool,
}

impl DieselCartRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl CartRepository for DieselCartRepository {
    fn lines_for_user(&self, user_id: Uuid) -> Result<Vec<CartLine>, DomainError> {
        let mut conn = self.pool.get()?;
        let rows = cart_items::table
            .inner_join(products::table)
            .filter(cart_items::user_id.eq(user_id))
            .order(cart_items::created_at.desc())
            .select((CartItemRow::as_select(), ProductRow::as_select()))
            .load::<(CartItemRow, ProductRow)>(&mut conn)?;
        Ok(rows
            .into_iter()
            .map(|(item, product)| CartLine {
                item: item.into(),
                product: product.into(),
            })
            .collect())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<CartItem>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = cart_items::table
            .find(id)
            .select(CartItemRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(CartItem::from))
    }

    fn find_for_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<CartItem>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = cart_items::table
            .filter(cart_items::user_id.eq(user_id))
            .filter(cart_items::product_id.eq(product_id))
            .select(CartItemRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(CartItem::from))
    }

    fn insert(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, DomainError> {
        let mut conn = self.pool.get()?;
        let row = diesel::insert_into(cart_items::table)
            .values(&NewCartItemRow {
                id: Uuid::new_v4(),
                user_id,
                product_id,
                quantity,
            })
            .returning(CartItemRow::as_returning())
            .get_result(&mut conn)?;
        Ok(row.into())
    }

    fn set_quantity(&self, id: Uuid, quantity: i32) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;
        diesel::update(cart_items::table.find(id))
            .set(cart_items::quantity.eq(quantity))
            .execute(&mut conn)?;
        Ok(())
    }

    fn remove(&self, id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;
        diesel::delete(cart_items::table.find(id)).execute(&mut conn)?;
        Ok(())
    }

    fn clear(&self, user_id: Uuid) -> Result<usize, DomainError> {
        let mut conn = self.pool.get()?;
        let removed = diesel::delete(cart_items::table.filter(cart_items::user_id.eq(user_id)))
            .execute(&mut conn)?;
        Ok(removed)
    }
}
