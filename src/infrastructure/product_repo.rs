use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::ProductRepository;
use crate::domain::product::{NewProduct, Product, ProductFields};
use crate::schema::products;

use super::models::{NewProductRow, ProductChangeset, ProductRow};

pub struct DieselProductRepository {
    pool: DbPool,
}

impl DieselProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ProductRepository for DieselProductRepository {
    fn list(&self) -> Result<Vec<Product>, DomainError> {
        let mut conn = self.pool.get()?;
        let rows = products::table
            .select(ProductRow::as_select())
            .order(products::created_at.desc())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = products::table
            .find(id)
            .select(ProductRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Product::from))
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Product>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = products::table
            .filter(products::name.eq(name))
            .select(ProductRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Product::from))
    }

    fn create(&self, product: NewProduct) -> Result<Product, DomainError> {
        let mut conn = self.pool.get()?;
        let row = diesel::insert_into(products::table)
            .values(&NewProductRow {
                id: Uuid::new_v4(),
                name: product.fields.name,
                price: product.fields.price,
                description: Some(product.fields.description),
                image_url: product.image_url,
                stock: product.fields.stock,
                vehicle_type: product.fields.vehicle_type,
                item_type: product.fields.item_type,
                created_by: product.created_by,
            })
            .returning(ProductRow::as_returning())
            .get_result(&mut conn)?;
        Ok(row.into())
    }

    fn update(&self, id: Uuid, fields: &ProductFields) -> Result<Option<Product>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = diesel::update(products::table.find(id))
            .set(&ProductChangeset {
                name: fields.name.clone(),
                price: fields.price.clone(),
                description: Some(fields.description.clone()),
                stock: fields.stock,
                vehicle_type: fields.vehicle_type.clone(),
                item_type: fields.item_type.clone(),
                updated_at: Utc::now(),
            })
            .returning(ProductRow::as_returning())
            .get_result(&mut conn)
            .optional()?;
        Ok(row.map(Product::from))
    }

    fn delete(&self, id: Uuid) -> Result<Option<Product>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = diesel::delete(products::table.find(id))
            .returning(ProductRow::as_returning())
            .get_result(&mut conn)
            .optional()?;
        Ok(row.map(Product::from))
    }

    fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;
        let updated = diesel::update(
            products::table
                .filter(products::id.eq(id))
                .filter(products::stock.ge(quantity)),
        )
        .set((
            products::stock.eq(products::stock - quantity),
            products::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;
        Ok(updated == 1)
    }
}
