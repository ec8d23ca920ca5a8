use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use boutique_payment_engine::{AgentApi, MembershipApi, OrderFlowApi, SqliteDatabase};
use log::info;
use upi_gateway::GatewayApi;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    gateway_routes::{CreatePaymentIntentRoute, GatewayWebhookRoute, VerifyGatewayPaymentRoute},
    middleware::{HmacMiddlewareFactory, JwtMiddlewareFactory},
    routes::{
        health,
        AdminDecidePaymentRoute,
        AgentOrdersRoute,
        CreateOrderRoute,
        MembershipStatusRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        OrdersRoute,
        PremiumUsersRoute,
        SubmitPaymentProofRoute,
        UpdateOrderStatusRoute,
        ValidateCouponRoute,
    },
};

/// The subset of the server configuration that handlers need at request time. Deliberately small, and free of
/// secrets, so it can be dropped into the app data without passing sensitive values around the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub uploads_dir: String,
    pub intent_timeout: chrono::Duration,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { uploads_dir: config.uploads_dir.clone(), intent_timeout: config.intent_timeout }
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let bind_host = config.host.clone();
    let bind_port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone());
        let membership_api = MembershipApi::new(db.clone());
        let agent_api = AgentApi::new(db.clone());
        let gateway_api = GatewayApi::new(config.gateway.clone()).unwrap_or_else(|e| {
            // Configuration is broken beyond use; better to fail the worker loudly than run without a gateway.
            panic!("Could not initialize the gateway client: {e}")
        });
        let options = ServerOptions::from_config(&config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("bps::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(membership_api))
            .app_data(web::Data::new(agent_api))
            .app_data(web::Data::new(gateway_api))
            .app_data(web::Data::new(options));
        // Everything under /api requires a valid access token; per-route ACLs come from the route! definitions.
        let api_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(config.auth.clone()))
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(AdminDecidePaymentRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(OrdersRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(SubmitPaymentProofRoute::<SqliteDatabase>::new())
            .service(AgentOrdersRoute::<SqliteDatabase>::new())
            .service(MembershipStatusRoute::<SqliteDatabase>::new())
            .service(PremiumUsersRoute::<SqliteDatabase>::new())
            .service(CreatePaymentIntentRoute::<SqliteDatabase>::new())
            .service(VerifyGatewayPaymentRoute::<SqliteDatabase>::new());
        // The webhook is authenticated by its HMAC signature over the raw body, not by a bearer token.
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                "x-gateway-signature",
                config.gateway.webhook_secret.clone(),
                config.gateway_hmac_checks,
            ))
            .service(GatewayWebhookRoute::<SqliteDatabase>::new());
        // Coupon validation is deliberately public: checkout needs it before login completes.
        let coupon_scope = web::scope("/checkout").service(ValidateCouponRoute::<SqliteDatabase>::new());
        app.service(health).service(api_scope).service(webhook_scope).service(coupon_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((bind_host.as_str(), bind_port))?
    .run();
    info!("🚀️ Server instance created");
    Ok(srv)
}
