use log::trace;
use sqlx::SqliteConnection;

use crate::{db_types::Product, traits::PaymentGatewayError};

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// The atomic stock decrement. One conditional UPDATE: either the product still has `quantity` units and the
/// decrement lands (returning the new level), or zero rows match and the caller gets `OutOfStock` /
/// `ProductNotFound` without any mutation. There is no read-then-write window for a concurrent purchase to slip
/// through.
pub async fn reserve_and_decrement(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, PaymentGatewayError> {
    if quantity <= 0 {
        return Err(PaymentGatewayError::validation("quantity", "must be a positive integer"));
    }
    let row: Option<(i64,)> = sqlx::query_as(
        "UPDATE products SET stock_quantity = stock_quantity - $1, in_stock = (stock_quantity - $1) > 0, updated_at \
         = CURRENT_TIMESTAMP WHERE id = $2 AND stock_quantity >= $1 RETURNING stock_quantity",
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some((remaining,)) => {
            trace!("🗃️ Product {product_id}: reserved {quantity}, {remaining} remaining");
            Ok(remaining)
        },
        None => {
            let product = fetch_product(product_id, conn)
                .await?
                .ok_or(PaymentGatewayError::ProductNotFound(product_id))?;
            Err(PaymentGatewayError::OutOfStock { product_id, requested: quantity, available: product.stock_quantity })
        },
    }
}
