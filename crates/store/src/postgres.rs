use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, OutboxMessageId, SellerOrderId, Version};
use domain::{
    Address, BuyerId, Money, Order, OrderItem, OrderNumber, OrderStatus, SellerId, SellerOrder,
};
use sqlx::{
    PgConnection, PgPool, Postgres, Row,
    postgres::{PgArguments, PgRow},
    query::Query,
    types::Json,
};
use uuid::Uuid;

use crate::{
    OrderFilter, OrderRepository, OutboxMessage, OutboxRepository, PageRequest, Result,
    SellerOrderRepository, StoreError,
};

const ORDER: &str = "Order";
const SELLER_ORDER: &str = "SellerOrder";
const OUTBOX_MESSAGE: &str = "OutboxMessage";

const ORDER_COLUMNS: &str = "id, order_number, buyer_id, status, subtotal_cents, shipping_cents, \
     tax_cents, discount_cents, total_cents, currency, shipping_address, created_at, updated_at, \
     version";

const SELLER_ORDER_COLUMNS: &str =
    "id, order_id, seller_id, status, subtotal_cents, created_at, updated_at, version";

/// PostgreSQL-backed order store.
///
/// Like [`InMemoryStore`](crate::InMemoryStore), the store hands out one
/// repository handle per port; all handles share the connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` with a small pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    pub fn orders(&self) -> PostgresOrderRepository {
        PostgresOrderRepository {
            pool: self.pool.clone(),
        }
    }

    pub fn seller_orders(&self) -> PostgresSellerOrderRepository {
        PostgresSellerOrderRepository {
            pool: self.pool.clone(),
        }
    }

    pub fn outbox(&self) -> PostgresOutboxRepository {
        PostgresOutboxRepository {
            pool: self.pool.clone(),
        }
    }
}

fn parse_status(row: &PgRow) -> Result<OrderStatus> {
    let raw: String = row.try_get("status")?;
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown status '{raw}'")))
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let Json(shipping_address): Json<Address> = row.try_get("shipping_address")?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_number: OrderNumber::new(row.try_get::<String, _>("order_number")?),
        buyer_id: BuyerId::new(row.try_get::<String, _>("buyer_id")?),
        status: parse_status(row)?,
        subtotal_cents: Money::from_cents(row.try_get("subtotal_cents")?),
        shipping_cents: Money::from_cents(row.try_get("shipping_cents")?),
        tax_cents: Money::from_cents(row.try_get("tax_cents")?),
        discount_cents: Money::from_cents(row.try_get("discount_cents")?),
        total_cents: Money::from_cents(row.try_get("total_cents")?),
        currency: row.try_get("currency")?,
        shipping_address,
        items: Vec::new(),
        seller_orders: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version: Version::new(row.try_get("version")?),
    })
}

/// Converts a value for an INTEGER column, refusing anything that would wrap.
fn to_i32<T>(column: &'static str, value: T) -> Result<i32>
where
    T: TryInto<i32> + Copy + std::fmt::Display,
{
    value.try_into().map_err(|_| StoreError::OutOfRange {
        column,
        value: value.to_string(),
    })
}

fn to_bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    let quantity: i32 = row.try_get("quantity")?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| StoreError::Corrupt(format!("negative quantity {quantity}")))?;

    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: row.try_get::<String, _>("product_id")?.into(),
        variant_id: row
            .try_get::<Option<String>, _>("variant_id")?
            .map(Into::into),
        product_name: row.try_get("product_name")?,
        variant_name: row.try_get("variant_name")?,
        sku: row.try_get("sku")?,
        quantity,
        unit_price_cents: Money::from_cents(row.try_get("unit_price_cents")?),
        total_cents: Money::from_cents(row.try_get("total_cents")?),
        seller_id: SellerId::new(row.try_get::<String, _>("seller_id")?),
        image_url: row.try_get("image_url")?,
    })
}

fn row_to_seller_order(row: &PgRow) -> Result<SellerOrder> {
    Ok(SellerOrder {
        id: SellerOrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        seller_id: SellerId::new(row.try_get::<String, _>("seller_id")?),
        status: parse_status(row)?,
        subtotal_cents: Money::from_cents(row.try_get("subtotal_cents")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version: Version::new(row.try_get("version")?),
    })
}

fn row_to_outbox_message(row: &PgRow) -> Result<OutboxMessage> {
    let attempts: i32 = row.try_get("attempts")?;

    Ok(OutboxMessage {
        id: OutboxMessageId::from_uuid(row.try_get::<Uuid, _>("id")?),
        subject: row.try_get("subject")?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
        attempts: u32::try_from(attempts)
            .map_err(|_| StoreError::Corrupt(format!("negative attempt count {attempts}")))?,
        last_error: row.try_get("last_error")?,
        delivered_at: row.try_get("delivered_at")?,
    })
}

async fn insert_order(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (id, order_number, buyer_id, status, subtotal_cents, shipping_cents,
                            tax_cents, discount_cents, total_cents, currency, shipping_address,
                            created_at, updated_at, version)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(order.id.as_uuid())
    .bind(order.order_number.as_str())
    .bind(order.buyer_id.as_str())
    .bind(order.status.as_str())
    .bind(order.subtotal_cents.cents())
    .bind(order.shipping_cents.cents())
    .bind(order.tax_cents.cents())
    .bind(order.discount_cents.cents())
    .bind(order.total_cents.cents())
    .bind(&order.currency)
    .bind(Json(&order.shipping_address))
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.version.as_i64())
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            match db_err.constraint() {
                Some("orders_order_number_key") => {
                    return StoreError::DuplicateOrderNumber(order.order_number.to_string());
                }
                Some("orders_pkey") => {
                    return StoreError::Duplicate {
                        entity: ORDER,
                        id: order.id.to_string(),
                    };
                }
                _ => {}
            }
        }
        StoreError::Database(e)
    })?;

    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, position, product_id, variant_id, product_name,
                                     variant_name, sku, quantity, unit_price_cents, total_cents,
                                     seller_id, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(order.id.as_uuid())
        .bind(to_i32("order_items.position", position)?)
        .bind(item.product_id.as_str())
        .bind(item.variant_id.as_ref().map(|v| v.as_str()))
        .bind(&item.product_name)
        .bind(&item.variant_name)
        .bind(&item.sku)
        .bind(to_i32("order_items.quantity", item.quantity)?)
        .bind(item.unit_price_cents.cents())
        .bind(item.total_cents.cents())
        .bind(item.seller_id.as_str())
        .bind(&item.image_url)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Inserts a seller order behind the ones its order already has.
async fn insert_seller_order(conn: &mut PgConnection, seller_order: &SellerOrder) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO seller_orders (id, order_id, position, seller_id, status, subtotal_cents,
                                   created_at, updated_at, version)
        VALUES ($1, $2, (SELECT COUNT(*) FROM seller_orders WHERE order_id = $2),
                $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(seller_order.id.as_uuid())
    .bind(seller_order.order_id.as_uuid())
    .bind(seller_order.seller_id.as_str())
    .bind(seller_order.status.as_str())
    .bind(seller_order.subtotal_cents.cents())
    .bind(seller_order.created_at)
    .bind(seller_order.updated_at)
    .bind(seller_order.version.as_i64())
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.constraint() == Some("seller_orders_pkey")
        {
            return StoreError::Duplicate {
                entity: SELLER_ORDER,
                id: seller_order.id.to_string(),
            };
        }
        StoreError::Database(e)
    })?;

    Ok(())
}

/// Resolves a version-checked UPDATE that matched no row.
async fn version_miss(
    pool: &PgPool,
    table: &str,
    entity: &'static str,
    id: Uuid,
    expected: Version,
) -> StoreError {
    let current: std::result::Result<Option<i64>, sqlx::Error> =
        sqlx::query_scalar(&format!("SELECT version FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await;

    match current {
        Ok(Some(actual)) => StoreError::ConcurrencyConflict {
            entity,
            id: id.to_string(),
            expected,
            actual: Version::new(actual),
        },
        Ok(None) => StoreError::not_found(entity, id),
        Err(e) => StoreError::Database(e),
    }
}

fn bind_order_filter<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    filter: &'q OrderFilter,
) -> Query<'q, Postgres, PgArguments> {
    if let Some(ref buyer_id) = filter.buyer_id {
        query = query.bind(buyer_id.as_str());
    }
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    query
}

/// [`OrderRepository`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Attaches line items and seller orders to freshly loaded order rows.
    async fn hydrate(&self, mut orders: Vec<Order>) -> Result<Vec<Order>> {
        if orders.is_empty() {
            return Ok(orders);
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, variant_id, product_name, variant_name, sku,
                   quantity, unit_price_cents, total_cents, seller_id, image_url
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let seller_order_rows = sqlx::query(&format!(
            "SELECT {SELLER_ORDER_COLUMNS} FROM seller_orders WHERE order_id = ANY($1) \
             ORDER BY order_id, position ASC"
        ))
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let item = row_to_item(row)?;
            items.entry(item.order_id).or_default().push(item);
        }

        let mut seller_orders: HashMap<OrderId, Vec<SellerOrder>> = HashMap::new();
        for row in &seller_order_rows {
            let seller_order = row_to_seller_order(row)?;
            seller_orders
                .entry(seller_order.order_id)
                .or_default()
                .push(seller_order);
        }

        for order in &mut orders {
            order.items = items.remove(&order.id).unwrap_or_default();
            order.seller_orders = seller_orders.remove(&order.id).unwrap_or_default();
        }
        Ok(orders)
    }

    async fn hydrate_one(&self, row: Option<PgRow>, entity_id: String) -> Result<Order> {
        let row = row.ok_or_else(|| StoreError::not_found(ORDER, entity_id))?;
        let order = row_to_order(&row)?;
        self.hydrate(vec![order])
            .await?
            .pop()
            .ok_or_else(|| StoreError::Corrupt("hydration dropped an order".to_string()))
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn create(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_order(&mut *tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_with_seller_orders(&self, order: &Order) -> Result<()> {
        order.check_invariants()?;
        let mut tx = self.pool.begin().await?;
        insert_order(&mut *tx, order).await?;

        for seller_order in &order.seller_orders {
            insert_seller_order(&mut *tx, seller_order)
                .await
                .map_err(|e| {
                    tracing::debug!(
                        order_id = %order.id,
                        seller_order_id = %seller_order.id,
                        error = %e,
                        "seller order insert failed; rolling back order"
                    );
                    StoreError::SellerOrderCreate {
                        seller_order_id: seller_order.id,
                        source: Box::new(e),
                    }
                })?;
        }

        // Dropping `tx` on any early return above rolls everything back.
        tx.commit().await?;
        Ok(())
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Order> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        self.hydrate_one(row, id.to_string()).await
    }

    async fn get_by_order_number(&self, number: &OrderNumber) -> Result<Order> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(number.as_str())
        .fetch_optional(&self.pool)
        .await?;

        self.hydrate_one(row, number.to_string()).await
    }

    async fn list(&self, filter: &OrderFilter) -> Result<(Vec<Order>, u64)> {
        let mut where_clause = String::from(" WHERE 1=1");
        let mut param_count = 0;

        if filter.buyer_id.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND buyer_id = ${param_count}"));
        }
        if filter.status.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND status = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders{where_clause}");
        let count_row = bind_order_filter(sqlx::query(&count_sql), filter)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = count_row.try_get(0)?;

        let list_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let rows = bind_order_filter(sqlx::query(&list_sql), filter)
            .bind(to_bigint(filter.page.limit()))
            .bind(to_bigint(filter.page.offset()))
            .fetch_all(&self.pool)
            .await?;

        let orders = rows
            .iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;
        let orders = self.hydrate(orders).await?;

        Ok((orders, u64::try_from(total).unwrap_or(0)))
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        expected: Version,
    ) -> Result<Version> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET status = $1, version = version + 1, updated_at = $2
            WHERE id = $3 AND version = $4
            RETURNING version
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id.as_uuid())
        .bind(expected.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match version {
            Some(v) => Ok(Version::new(v)),
            None => Err(version_miss(&self.pool, "orders", ORDER, id.as_uuid(), expected).await),
        }
    }

    async fn update(&self, order: &Order) -> Result<Version> {
        order.check_invariants()?;
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET status = $1, subtotal_cents = $2, shipping_cents = $3, tax_cents = $4,
                discount_cents = $5, total_cents = $6, version = version + 1, updated_at = $7
            WHERE id = $8 AND version = $9
            RETURNING version
            "#,
        )
        .bind(order.status.as_str())
        .bind(order.subtotal_cents.cents())
        .bind(order.shipping_cents.cents())
        .bind(order.tax_cents.cents())
        .bind(order.discount_cents.cents())
        .bind(order.total_cents.cents())
        .bind(Utc::now())
        .bind(order.id.as_uuid())
        .bind(order.version.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match version {
            Some(v) => Ok(Version::new(v)),
            None => {
                Err(version_miss(&self.pool, "orders", ORDER, order.id.as_uuid(), order.version)
                    .await)
            }
        }
    }
}

/// [`SellerOrderRepository`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PostgresSellerOrderRepository {
    pool: PgPool,
}

#[async_trait]
impl SellerOrderRepository for PostgresSellerOrderRepository {
    async fn create(&self, seller_order: &SellerOrder) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_seller_order(&mut *conn, seller_order).await
    }

    async fn get_by_id(&self, id: SellerOrderId) -> Result<SellerOrder> {
        let row = sqlx::query(&format!(
            "SELECT {SELLER_ORDER_COLUMNS} FROM seller_orders WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_seller_order(&row),
            None => Err(StoreError::not_found(SELLER_ORDER, id)),
        }
    }

    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<SellerOrder>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELLER_ORDER_COLUMNS} FROM seller_orders WHERE order_id = $1 \
             ORDER BY position ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_seller_order).collect()
    }

    async fn list_by_seller(
        &self,
        seller_id: &SellerId,
        page: PageRequest,
    ) -> Result<(Vec<SellerOrder>, u64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM seller_orders WHERE seller_id = $1")
                .bind(seller_id.as_str())
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {SELLER_ORDER_COLUMNS} FROM seller_orders WHERE seller_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(seller_id.as_str())
        .bind(to_bigint(page.limit()))
        .bind(to_bigint(page.offset()))
        .fetch_all(&self.pool)
        .await?;

        let seller_orders = rows
            .iter()
            .map(row_to_seller_order)
            .collect::<Result<Vec<_>>>()?;
        Ok((seller_orders, u64::try_from(total).unwrap_or(0)))
    }

    async fn update_status(
        &self,
        id: SellerOrderId,
        status: OrderStatus,
        expected: Version,
    ) -> Result<Version> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE seller_orders
            SET status = $1, version = version + 1, updated_at = $2
            WHERE id = $3 AND version = $4
            RETURNING version
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id.as_uuid())
        .bind(expected.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match version {
            Some(v) => Ok(Version::new(v)),
            None => Err(version_miss(
                &self.pool,
                "seller_orders",
                SELLER_ORDER,
                id.as_uuid(),
                expected,
            )
            .await),
        }
    }
}

/// [`OutboxRepository`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PostgresOutboxRepository {
    pool: PgPool,
}

#[async_trait]
impl OutboxRepository for PostgresOutboxRepository {
    async fn enqueue(&self, message: &OutboxMessage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_messages (id, subject, payload, created_at, attempts, last_error, delivered_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(&message.subject)
        .bind(&message.payload)
        .bind(message.created_at)
        .bind(to_i32("outbox_messages.attempts", message.attempts)?)
        .bind(&message.last_error)
        .bind(message.delivered_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, subject, payload, created_at, attempts, last_error, delivered_at
            FROM outbox_messages
            WHERE delivered_at IS NULL
            ORDER BY attempts ASC, created_at ASC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_outbox_message).collect()
    }

    async fn mark_delivered(&self, id: OutboxMessageId, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE outbox_messages SET delivered_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(OUTBOX_MESSAGE, id));
        }
        Ok(())
    }

    async fn record_failure(&self, id: OutboxMessageId, error: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE outbox_messages SET attempts = attempts + 1, last_error = $1 WHERE id = $2",
        )
        .bind(error)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(OUTBOX_MESSAGE, id));
        }
        Ok(())
    }
}
