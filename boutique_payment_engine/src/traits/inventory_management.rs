use crate::{db_types::Product, traits::PaymentGatewayError};

/// The stock reconciler's write access to the catalog. The only mutation this engine ever performs on a product is
/// the atomic decrement below; price and metadata belong to catalog management, which lives outside this core.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement: Clone {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, PaymentGatewayError>;

    /// Atomically reserves `quantity` units of a product and returns the remaining stock level.
    ///
    /// This must be a single conditional update — never a read followed by a write — so that two buyers racing for
    /// the last units resolve deterministically: exactly one wins, the other receives
    /// [`PaymentGatewayError::OutOfStock`], and the stock level never goes negative.
    async fn reserve_and_decrement(&self, product_id: i64, quantity: i64) -> Result<i64, PaymentGatewayError>;
}
