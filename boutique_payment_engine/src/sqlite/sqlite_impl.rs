//! `SqliteDatabase` is the concrete SQLite backend for the payment engine.
//!
//! It implements all the storage traits defined in the [`crate::traits`] module. Multi-row flows (order + line
//! items, decision + stock decrements, confirmation + membership grant) each run inside a single transaction, so a
//! failure anywhere leaves no partial mutation behind.

use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{agents, new_pool, orders, payments, products, users};
use crate::{
    db_types::{
        AdminDecision,
        Agent,
        Coupon,
        NewAgent,
        NewOrder,
        NewPaymentIntent,
        Order,
        OrderItem,
        OrderNumber,
        OrderStatusType,
        OrderType,
        PaymentIntent,
        PaymentMethod,
        Product,
        User,
    },
    order_objects::OrderQueryFilter,
    traits::{
        AgentAccess,
        GatewayConfirmation,
        InventoryManagement,
        MembershipManagement,
        OrderManagement,
        PaymentGatewayDatabase,
        PaymentGatewayError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connect to the database at the given URL, creating the file if necessary.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run embedded migrations. Idempotent; called on server startup.
    pub async fn migrate(&self) -> Result<(), PaymentGatewayError> {
        super::db::run_migrations(&self.pool).await?;
        Ok(())
    }

    /// Decrements stock for every line item of the order on the given connection (usually a transaction). Any
    /// failure propagates and rolls back everything the transaction has done so far — per-order all-or-nothing.
    async fn decrement_stock_for_items(
        conn: &mut SqliteConnection,
        order_number: &OrderNumber,
        items: &[OrderItem],
    ) -> Result<(), PaymentGatewayError> {
        for item in items {
            let remaining = products::reserve_and_decrement(item.product_id, item.quantity, &mut *conn).await?;
            trace!(
                "🗃️ Order {order_number}: {} × product {} reserved, {remaining} left",
                item.quantity,
                item.product_id
            );
        }
        Ok(())
    }

    /// The shared confirmation body for a product intent: confirm the existing order for this intent, or
    /// materialise one from the stored draft, then decrement stock once per line item.
    async fn confirm_product_intent(
        conn: &mut SqliteConnection,
        intent: &PaymentIntent,
        payment_id: &str,
        fallback_order: Option<NewOrder>,
    ) -> Result<Order, PaymentGatewayError> {
        let existing = orders::fetch_order_by_intent_id(&intent.intent_id, &mut *conn).await?;
        let order = match existing {
            Some(order) => {
                orders::mark_gateway_confirmed(order.id, payment_id, &mut *conn).await?;
                orders::fetch_order_by_id(order.id, &mut *conn)
                    .await?
                    .ok_or(PaymentGatewayError::OrderIdNotFound(order.id))?
            },
            None => {
                let draft: NewOrder = match intent.details.as_deref() {
                    Some(json) => serde_json::from_str(json)?,
                    None => fallback_order.ok_or(PaymentGatewayError::MissingOrderDetails)?,
                };
                orders::insert_order_with_confirmation(
                    draft,
                    PaymentMethod::Gateway,
                    Some(&intent.intent_id),
                    Some(payment_id),
                    &mut *conn,
                )
                .await?
            },
        };
        Self::decrement_stock_for_items(&mut *conn, &order.order_number, &order.items).await?;
        Ok(order)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_id(order_id, &mut conn).await?)
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_number(number, &mut conn).await?)
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let query = OrderQueryFilter::default().with_user_id(user_id);
        Ok(orders::search_orders(query, &mut conn).await?)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::search_orders(query, &mut conn).await?)
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let method = order.payment_method.unwrap_or(PaymentMethod::UpiQr);
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, method, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} created for user {} ({})", order.order_number, order.user_id, order.total);
        Ok(order)
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
        expected_version: Option<i64>,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
        if let Some(expected) = expected_version {
            if expected != order.version {
                return Err(PaymentGatewayError::Conflict { expected, actual: order.version });
            }
        }
        if !order.status.can_transition_to(new_status) {
            return Err(PaymentGatewayError::InvalidStatusTransition { from: order.status, to: new_status });
        }
        let updated = orders::apply_order_status(order_id, new_status, order.version, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order {} moved {} → {new_status}", updated.order_number, order.status);
        Ok(updated)
    }

    async fn attach_payment_proof(&self, order_id: i64, proof_url: &str) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let changed = orders::attach_payment_proof(order_id, proof_url, &mut tx).await?;
        if changed == 0 {
            let order = orders::fetch_order_by_id(order_id, &mut tx)
                .await?
                .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
            return Err(PaymentGatewayError::InvalidStatusTransition {
                from: order.status,
                to: OrderStatusType::Pending,
            });
        }
        let order = orders::fetch_order_by_id(order_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
        tx.commit().await?;
        debug!("🗃️ Order {} has a payment proof attached and awaits review", order.order_number);
        Ok(order)
    }

    async fn record_admin_decision(
        &self,
        order_id: i64,
        admin: &str,
        decision: AdminDecision,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let changed = match decision {
            AdminDecision::Verify => orders::mark_payment_verified(order_id, admin, &mut tx).await?,
            AdminDecision::Reject => orders::mark_payment_rejected(order_id, admin, &mut tx).await?,
        };
        if changed == 0 {
            let order = orders::fetch_order_by_id(order_id, &mut tx)
                .await?
                .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
            let to = match decision {
                AdminDecision::Verify => OrderStatusType::PaymentVerified,
                AdminDecision::Reject => OrderStatusType::PaymentPending,
            };
            return Err(PaymentGatewayError::InvalidStatusTransition { from: order.status, to });
        }
        let order = orders::fetch_order_by_id(order_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
        if decision == AdminDecision::Verify {
            // Manually-confirmed orders reserve stock here, atomically with the status flip. An out-of-stock item
            // rolls the whole decision back.
            Self::decrement_stock_for_items(&mut tx, &order.order_number, &order.items).await?;
        }
        tx.commit().await?;
        info!("🗃️ Order {}: admin {admin} recorded {decision:?}", order.order_number);
        Ok(order)
    }

    async fn insert_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let intent = payments::insert_intent(&intent, &mut conn).await?;
        debug!("🗃️ Payment intent {} recorded ({} {})", intent.intent_id, intent.amount, intent.order_type);
        Ok(intent)
    }

    async fn fetch_payment_intent(&self, intent_id: &str) -> Result<Option<PaymentIntent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_intent(intent_id, &mut conn).await?)
    }

    async fn confirm_gateway_payment(
        &self,
        intent_id: &str,
        payment_id: &str,
        fallback_order: Option<NewOrder>,
    ) -> Result<GatewayConfirmation, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        // First write: claim the idempotency key. Losing the claim means another delivery beat us to it.
        let claimed = payments::claim_event(intent_id, payment_id, payments::EVENT_KIND_CONFIRMATION, &mut tx).await?;
        if !claimed {
            debug!("🗃️ Confirmation for intent {intent_id} was already applied; absorbing duplicate delivery");
            return Ok(GatewayConfirmation::AlreadyProcessed);
        }
        let intent = payments::fetch_intent(intent_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentGatewayError::IntentNotFound(intent_id.to_string()))?;
        if intent.is_expired(Utc::now()) {
            warn!("🗃️ Refusing to confirm expired intent {intent_id}");
            return Err(PaymentGatewayError::IntentExpired(intent_id.to_string()));
        }
        let confirmation = match intent.order_type {
            OrderType::Product => {
                let order = Self::confirm_product_intent(&mut tx, &intent, payment_id, fallback_order).await?;
                info!("🗃️ Order {} confirmed by gateway payment {payment_id}", order.order_number);
                GatewayConfirmation::Applied { order: Some(order), membership: None }
            },
            OrderType::Membership => {
                let params = intent.membership_params()?;
                let user = users::grant_premium(intent.user_id, params.duration_months, Utc::now(), &mut tx).await?;
                info!("🗃️ Membership payment {payment_id} processed for user {}", user.id);
                GatewayConfirmation::Applied { order: None, membership: Some(user) }
            },
        };
        payments::set_intent_status(intent_id, crate::db_types::IntentStatus::Confirmed, &mut tx).await?;
        tx.commit().await?;
        Ok(confirmation)
    }

    async fn mark_intent_failed(&self, intent_id: &str) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let changed = payments::set_intent_status(intent_id, crate::db_types::IntentStatus::Failed, &mut conn).await?;
        if changed == 0 {
            return Err(PaymentGatewayError::IntentNotFound(intent_id.to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product(product_id, &mut conn).await?)
    }

    async fn reserve_and_decrement(&self, product_id: i64, quantity: i64) -> Result<i64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        products::reserve_and_decrement(product_id, quantity, &mut conn).await
    }
}

impl MembershipManagement for SqliteDatabase {
    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::fetch_user(user_id, &mut conn).await?)
    }

    async fn grant_premium(&self, user_id: i64, duration_months: u32) -> Result<User, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        users::grant_premium(user_id, duration_months, Utc::now(), &mut conn).await
    }

    async fn is_premium_member(&self, user_id: i64) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let user =
            users::fetch_user(user_id, &mut conn).await?.ok_or(PaymentGatewayError::UserNotFound(user_id))?;
        Ok(user.has_active_membership(Utc::now()))
    }

    async fn fetch_premium_users(&self) -> Result<Vec<User>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let now = Utc::now();
        let flagged = users::fetch_premium_flagged_users(&mut conn).await?;
        Ok(flagged.into_iter().filter(|u| u.has_active_membership(now)).collect())
    }
}

impl AgentAccess for SqliteDatabase {
    async fn fetch_agent(&self, agent_id: i64) -> Result<Option<Agent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(agents::fetch_agent(agent_id, &mut conn).await?)
    }

    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(agents::fetch_active_coupon(code, &mut conn).await?)
    }

    async fn validate_coupon(&self, code: &str) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(agents::fetch_active_coupon(code, &mut conn).await?.is_some())
    }

    async fn orders_for_agent(&self, agent_id: i64) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let agent = agents::fetch_agent(agent_id, &mut conn).await?;
        let agent = agents::validate_agent_active(agent, agent_id)?;
        // The partition is a server-side WHERE clause on the agent's own coupon; no unscoped set is ever
        // materialised on behalf of an agent principal.
        let query = OrderQueryFilter::default().with_coupon_code(agent.coupon_code);
        Ok(orders::search_orders(query, &mut conn).await?)
    }

    async fn create_agent(&self, agent: NewAgent) -> Result<Agent, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let created = agents::insert_agent_with_coupon(&agent, &mut tx).await.map_err(|e| {
            if e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false) {
                PaymentGatewayError::validation("couponCode", "username or coupon code is already assigned")
            } else {
                e.into()
            }
        })?;
        tx.commit().await?;
        Ok(created)
    }

    async fn deactivate_agent(&self, agent_id: i64) -> Result<Agent, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let agent = agents::deactivate_agent(agent_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::AgentNotFound(agent_id))?;
        tx.commit().await?;
        info!("🗃️ Agent {} and coupon {} deactivated", agent.username, agent.coupon_code);
        Ok(agent)
    }
}
