use boutique_payment_engine::{
    db_types::{
        AdminDecision,
        Agent,
        Coupon,
        NewAgent,
        NewOrder,
        NewPaymentIntent,
        Order,
        OrderNumber,
        OrderStatusType,
        PaymentIntent,
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
use mockall::mock;

mock! {
    pub Backend {}

    impl Clone for Backend {
        fn clone(&self) -> Self;
    }

    impl OrderManagement for Backend {
        async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError>;
    }

    impl PaymentGatewayDatabase for Backend {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;
        async fn update_order_status(
            &self,
            order_id: i64,
            new_status: OrderStatusType,
            expected_version: Option<i64>,
        ) -> Result<Order, PaymentGatewayError>;
        async fn attach_payment_proof(&self, order_id: i64, proof_url: &str) -> Result<Order, PaymentGatewayError>;
        async fn record_admin_decision(
            &self,
            order_id: i64,
            admin: &str,
            decision: AdminDecision,
        ) -> Result<Order, PaymentGatewayError>;
        async fn insert_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, PaymentGatewayError>;
        async fn fetch_payment_intent(&self, intent_id: &str) -> Result<Option<PaymentIntent>, PaymentGatewayError>;
        async fn confirm_gateway_payment(
            &self,
            intent_id: &str,
            payment_id: &str,
            fallback_order: Option<NewOrder>,
        ) -> Result<GatewayConfirmation, PaymentGatewayError>;
        async fn mark_intent_failed(&self, intent_id: &str) -> Result<(), PaymentGatewayError>;
        async fn close(&mut self) -> Result<(), PaymentGatewayError>;
    }

    impl InventoryManagement for Backend {
        async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, PaymentGatewayError>;
        async fn reserve_and_decrement(&self, product_id: i64, quantity: i64) -> Result<i64, PaymentGatewayError>;
    }

    impl MembershipManagement for Backend {
        async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, PaymentGatewayError>;
        async fn grant_premium(&self, user_id: i64, duration_months: u32) -> Result<User, PaymentGatewayError>;
        async fn is_premium_member(&self, user_id: i64) -> Result<bool, PaymentGatewayError>;
        async fn fetch_premium_users(&self) -> Result<Vec<User>, PaymentGatewayError>;
    }

    impl AgentAccess for Backend {
        async fn fetch_agent(&self, agent_id: i64) -> Result<Option<Agent>, PaymentGatewayError>;
        async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, PaymentGatewayError>;
        async fn validate_coupon(&self, code: &str) -> Result<bool, PaymentGatewayError>;
        async fn orders_for_agent(&self, agent_id: i64) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn create_agent(&self, agent: NewAgent) -> Result<Agent, PaymentGatewayError>;
        async fn deactivate_agent(&self, agent_id: i64) -> Result<Agent, PaymentGatewayError>;
    }
}
