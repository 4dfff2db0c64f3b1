use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    ExpiryClass, NewOrder, NewOrderItem, Order, OrderItem, OrderItemView, OrderStatus, OrderView,
    RestoreOutcome, RESTORE_REQUIRES_CANCELLED,
};
use crate::domain::ports::OrderRepository;
use crate::schema::{order_items, orders, products};

use super::models::{NewOrderItemRow, NewOrderRow, OrderItemRow, OrderRow};

#[derive(QueryableByName)]
struct ProcedureCount {
    #[diesel(sql_type = sql_types::Integer)]
    cancelled: i32,
}

#[derive(QueryableByName)]
struct ProcedureResult {
    #[diesel(sql_type = sql_types::Jsonb)]
    result: serde_json::Value,
}

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn load_item_views(
    conn: &mut PgConnection,
    order_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<OrderItemView>>, DomainError> {
    let rows = order_items::table
        .inner_join(products::table)
        .filter(order_items::order_id.eq_any(order_ids))
        .select((
            OrderItemRow::as_select(),
            products::name,
            products::image_url,
        ))
        .load::<(OrderItemRow, String, Option<String>)>(conn)?;

    let mut grouped: HashMap<Uuid, Vec<OrderItemView>> = HashMap::new();
    for (item, product_name, image_url) in rows {
        grouped.entry(item.order_id).or_default().push(OrderItemView {
            item: item.into(),
            product_name,
            image_url,
        });
    }
    Ok(grouped)
}

fn into_views(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<OrderView>, DomainError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut items = load_item_views(conn, &ids)?;
    rows.into_iter()
        .map(|row| {
            let items = items.remove(&row.id).unwrap_or_default();
            Ok(OrderView {
                order: row.try_into()?,
                items,
            })
        })
        .collect()
}

impl OrderRepository for DieselOrderRepository {
    fn create(&self, order: NewOrder) -> Result<Order, DomainError> {
        let mut conn = self.pool.get()?;
        let row = diesel::insert_into(orders::table)
            .values(&NewOrderRow {
                id: order.id,
                user_id: order.user_id,
                order_number: order.order_number,
                status: OrderStatus::Pending.as_str().to_string(),
                total_amount: order.total_amount,
                created_at: order.created_at,
                updated_at: order.created_at,
                expires_at: order.expires_at,
            })
            .returning(OrderRow::as_returning())
            .get_result(&mut conn)?;
        row.try_into()
    }

    fn insert_items(
        &self,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, DomainError> {
        let mut conn = self.pool.get()?;
        let rows: Vec<NewOrderItemRow> = items
            .iter()
            .map(|i| NewOrderItemRow {
                id: Uuid::new_v4(),
                order_id,
                product_id: i.product_id,
                quantity: i.quantity,
                price_at_time: i.price_at_time.clone(),
            })
            .collect();
        let inserted = diesel::insert_into(order_items::table)
            .values(&rows)
            .returning(OrderItemRow::as_returning())
            .get_results(&mut conn)?;
        Ok(inserted.into_iter().map(OrderItem::from).collect())
    }

    fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;
        diesel::delete(orders::table.find(id)).execute(&mut conn)?;
        Ok(())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let order = orders::table
            .find(id)
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        Ok(into_views(&mut conn, vec![order])?.pop())
    }

    fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let mut query = orders::table
            .filter(orders::user_id.eq(user_id))
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(orders::status.eq(status.as_str()));
        }
        let rows = query
            .select(OrderRow::as_select())
            .order(orders::created_at.desc())
            .load(&mut conn)?;

        into_views(&mut conn, rows)
    }

    fn list_all(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let mut query = orders::table.into_boxed();
        if let Some(status) = status {
            query = query.filter(orders::status.eq(status.as_str()));
        }
        let rows = query
            .select(OrderRow::as_select())
            .order(orders::created_at.desc())
            .load(&mut conn)?;

        rows.into_iter().map(Order::try_from).collect()
    }

    fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;
        let updated = diesel::update(orders::table.find(id))
            .set((
                orders::status.eq(status.as_str()),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        Ok(updated > 0)
    }

    fn cancel_if_status(&self, id: Uuid, expected: OrderStatus) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;
        let updated = diesel::update(
            orders::table
                .find(id)
                .filter(orders::status.eq(expected.as_str())),
        )
        .set((
            orders::status.eq(OrderStatus::Cancelled.as_str()),
            orders::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;
        Ok(updated > 0)
    }

    fn find_expired(
        &self,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, DomainError> {
        let mut conn = self.pool.get()?;
        let rows = orders::table
            .filter(orders::status.eq(status.as_str()))
            .filter(orders::expires_at.lt(now))
            .select(OrderRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(Order::try_from).collect()
    }

    fn run_expiry_procedure(&self, class: ExpiryClass) -> Result<u64, DomainError> {
        let mut conn = self.pool.get()?;
        // Procedure names are compile-time constants, never user input.
        let row: ProcedureCount =
            diesel::sql_query(format!("SELECT {}() AS cancelled", class.procedure()))
                .get_result(&mut conn)?;
        Ok(u64::try_from(row.cancelled).unwrap_or(0))
    }

    fn restore_stock(&self, order_id: Uuid) -> Result<RestoreOutcome, DomainError> {
        let mut conn = self.pool.get()?;
        let row: ProcedureResult =
            diesel::sql_query("SELECT restore_stock_on_cancel($1) AS result")
                .bind::<sql_types::Uuid, _>(order_id)
                .get_result(&mut conn)?;

        let result = row.result;
        if result["success"].as_bool() != Some(true) {
            return match result["error"].as_str() {
                Some("order not found") => Err(DomainError::NotFound("Order")),
                Some("order not cancelled") => {
                    Err(DomainError::Conflict(RESTORE_REQUIRES_CANCELLED.to_string()))
                }
                Some(other) => Err(DomainError::Internal(other.to_string())),
                None => Err(DomainError::Internal(format!(
                    "unexpected restore_stock_on_cancel result: {result}"
                ))),
            };
        }
        Ok(RestoreOutcome {
            already_restored: result["already_restored"].as_bool().unwrap_or(false),
            restored_items: result["restored_items"].as_i64().unwrap_or(0),
        })
    }
}
