use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::WishlistRepository;
use crate::domain::wishlist::{WishlistEntry, WishlistItem};
use crate::schema::{products, wishlist};

use super::models::{NewWishlistRow, ProductRow, WishlistRow};

pub struct DieselWishlistRepository {
    pool: DbPool,
}

impl DieselWishlistRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl WishlistRepository for DieselWishlistRepository {
    fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<WishlistEntry>, DomainError> {
        let mut conn = self.pool.get()?;
        let rows = wishlist::table
            .inner_join(products::table)
            .filter(wishlist::user_id.eq(user_id))
            .order(wishlist::created_at.desc())
            .select((WishlistRow::as_select(), ProductRow::as_select()))
            .load::<(WishlistRow, ProductRow)>(&mut conn)?;
        Ok(rows
            .into_iter()
            .map(|(item, product)| WishlistEntry {
                item: item.into(),
                product: product.into(),
            })
            .collect())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<WishlistItem>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = wishlist::table
            .find(id)
            .select(WishlistRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(WishlistItem::from))
    }

    fn add(&self, user_id: Uuid, product_id: Uuid) -> Result<WishlistItem, DomainError> {
        let mut conn = self.pool.get()?;
        conn.transaction(|conn| {
            diesel::insert_into(wishlist::table)
                .values(&NewWishlistRow {
                    id: Uuid::new_v4(),
                    user_id,
                    product_id,
                })
                .on_conflict((wishlist::user_id, wishlist::product_id))
                .do_nothing()
                .execute(conn)?;

            let row = wishlist::table
                .filter(wishlist::user_id.eq(user_id))
                .filter(wishlist::product_id.eq(product_id))
                .select(WishlistRow::as_select())
                .first(conn)?;
            Ok(row.into())
        })
    }

    fn remove(&self, id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;
        diesel::delete(wishlist::table.find(id)).execute(&mut conn)?;
        Ok(())
    }
}
