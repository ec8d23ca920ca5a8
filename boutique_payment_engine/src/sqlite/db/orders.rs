use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderItem, OrderNumber, OrderStatusType, PaymentMethod},
    helpers::generate_order_number,
    order_objects::OrderQueryFilter,
    traits::PaymentGatewayError,
};

const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Inserts a new order and its line items, generating an order number that is unique under concurrent creation.
/// A uniqueness collision on the generated number is retried with a fresh number.
///
/// This is not atomic on its own. Embed the call inside a transaction and pass `&mut *tx` as the connection
/// argument to get all-or-nothing behaviour together with the rest of the flow.
pub async fn insert_order(
    order: NewOrder,
    method: PaymentMethod,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    insert_order_with_confirmation(order, method, None, None, conn).await
}

/// As [`insert_order`], but optionally records the gateway intent/payment ids and marks the order as already
/// confirmed. Used by the gateway confirmation flow, where the ledger entry is born `payment_verified`.
pub async fn insert_order_with_confirmation(
    order: NewOrder,
    method: PaymentMethod,
    gateway_intent_id: Option<&str>,
    payment_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let confirmed = payment_id.is_some();
    let status = if confirmed { OrderStatusType::PaymentVerified } else { OrderStatusType::PaymentPending };
    let mut last_err = None;
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let order_number = generate_order_number();
        match try_insert_order_row(&order, &order_number, method, status, confirmed, gateway_intent_id, payment_id, conn)
            .await
        {
            Ok(mut inserted) => {
                insert_order_items(inserted.id, &order.items, conn).await?;
                inserted.items = order.items.clone();
                debug!("🗃️ Order {} inserted with id {}", inserted.order_number, inserted.id);
                return Ok(inserted);
            },
            Err(e) if is_order_number_collision(&e) => {
                trace!("🗃️ Order number {order_number} collided, regenerating");
                last_err = Some(e);
            },
            Err(e) => return Err(e.into()),
        }
    }
    debug!("🗃️ Gave up generating a unique order number: {last_err:?}");
    Err(PaymentGatewayError::OrderNumberExhausted)
}

#[allow(clippy::too_many_arguments)]
async fn try_insert_order_row(
    order: &NewOrder,
    order_number: &OrderNumber,
    method: PaymentMethod,
    status: OrderStatusType,
    confirmed: bool,
    gateway_intent_id: Option<&str>,
    payment_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let location = order.location.as_ref();
    sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number, user_id, subtotal, shipping, tax, total,
                status, payment_method, payment_id, gateway_intent_id, payment_verified, coupon_code,
                street, city, state, zip_code, country,
                latitude, longitude, location_accuracy, location_captured_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            RETURNING *;
        "#,
    )
    .bind(order_number)
    .bind(order.user_id)
    .bind(order.subtotal)
    .bind(order.shipping)
    .bind(order.tax)
    .bind(order.total)
    .bind(status)
    .bind(method)
    .bind(payment_id)
    .bind(gateway_intent_id)
    .bind(confirmed)
    .bind(order.coupon_code.as_deref())
    .bind(&order.shipping_address.street)
    .bind(&order.shipping_address.city)
    .bind(&order.shipping_address.state)
    .bind(&order.shipping_address.zip_code)
    .bind(&order.shipping_address.country)
    .bind(location.map(|l| l.latitude))
    .bind(location.map(|l| l.longitude))
    .bind(location.and_then(|l| l.accuracy))
    .bind(location.and_then(|l| l.captured_at))
    .fetch_one(conn)
    .await
}

async fn insert_order_items(
    order_id: i64,
    items: &[OrderItem],
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    for item in items {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, product_id, name, brand, price, quantity, image, is_premium)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
            "#,
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(&item.name)
        .bind(&item.brand)
        .bind(item.price)
        .bind(item.quantity)
        .bind(&item.image)
        .bind(item.is_premium)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn is_order_number_collision(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|d| d.is_unique_violation() && d.message().contains("orders.order_number"))
        .unwrap_or(false)
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    attach_items(order, conn).await
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE order_number = $1").bind(number).fetch_optional(&mut *conn).await?;
    attach_items(order, conn).await
}

pub async fn fetch_order_by_intent_id(
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE gateway_intent_id = $1")
        .bind(intent_id)
        .fetch_optional(&mut *conn)
        .await?;
    attach_items(order, conn).await
}

async fn attach_items(order: Option<Order>, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    match order {
        Some(mut order) => {
            order.items = fetch_items_for_order(order.id, conn).await?;
            Ok(Some(order))
        },
        None => Ok(None),
    }
}

pub async fn fetch_items_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as(
        "SELECT product_id, name, brand, price, quantity, image, is_premium FROM order_items WHERE order_id = $1 \
         ORDER BY id ASC",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
}

/// Fetches orders according to the criteria specified in the `OrderQueryFilter`, newest first, with line items
/// attached.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(order_number) = query.order_number {
        where_clause.push("order_number = ");
        where_clause.push_bind_unseparated(order_number.0);
    }
    if let Some(coupon_code) = query.coupon_code {
        where_clause.push("coupon_code = ");
        where_clause.push_bind_unseparated(coupon_code);
    }
    if let Some(verified) = query.payment_verified {
        where_clause.push("payment_verified = ");
        where_clause.push_bind_unseparated(verified);
    }
    if !query.statuses.is_empty() {
        let statuses = query.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let mut orders: Vec<Order> = builder.build_query_as().fetch_all(&mut *conn).await?;
    for order in &mut orders {
        order.items = fetch_items_for_order(order.id, conn).await?;
    }
    Ok(orders)
}

/// Applies a status change that has already been validated against the transition table. The update is
/// version-guarded: if another writer bumped the version since the caller's read, zero rows match and
/// a [`PaymentGatewayError::Conflict`] is returned.
pub async fn apply_order_status(
    order_id: i64,
    new_status: OrderStatusType,
    read_version: i64,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let updated = sqlx::query(
        "UPDATE orders SET status = $1, version = version + 1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND \
         version = $3",
    )
    .bind(new_status)
    .bind(order_id)
    .bind(read_version)
    .execute(&mut *conn)
    .await?;
    if updated.rows_affected() == 0 {
        let current = fetch_order_by_id(order_id, conn)
            .await?
            .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
        return Err(PaymentGatewayError::Conflict { expected: read_version, actual: current.version });
    }
    fetch_order_by_id(order_id, conn).await?.ok_or(PaymentGatewayError::OrderIdNotFound(order_id))
}

/// Attaches a payment-proof URL and moves the order into the review queue. The status precondition lives in the
/// SQL so that the update composes safely with concurrent writers.
pub async fn attach_payment_proof(
    order_id: i64,
    proof_url: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET payment_proof = $1, status = 'pending', version = version + 1, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $2 AND status IN ('payment_pending', 'pending')",
    )
    .bind(proof_url)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// The verify half of an admin decision: a single conditional update, so exactly one of two racing admins wins.
/// Returns the number of rows changed (0 means the order was not awaiting confirmation).
pub async fn mark_payment_verified(
    order_id: i64,
    admin: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET payment_verified = 1, verified_by = $1, verified_at = CURRENT_TIMESTAMP, status = \
         'payment_verified', version = version + 1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status IN \
         ('payment_pending', 'pending')",
    )
    .bind(admin)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// The reject half of an admin decision. The proof URL is deliberately left in place for the audit trail; only the
/// verified flag and status are reset.
pub async fn mark_payment_rejected(
    order_id: i64,
    admin: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET payment_verified = 0, verified_by = $1, verified_at = CURRENT_TIMESTAMP, status = \
         'payment_pending', version = version + 1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = \
         'pending'",
    )
    .bind(admin)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Confirms an existing (previously unconfirmed) order from a gateway payment: attaches the payment id and flips
/// the order to `payment_verified`. The verifier fields stay empty — they are reserved for explicit admin
/// decisions.
pub async fn mark_gateway_confirmed(
    order_id: i64,
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET payment_id = $1, payment_verified = 1, status = 'payment_verified', version = version + \
         1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status IN ('payment_pending', 'pending')",
    )
    .bind(payment_id)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
