//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate function. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause
//! the current worker to stop processing new requests. For this reason, any long, non-cpu-bound operation (e.g.
//! I/O, database operations, etc.) should be expressed as futures or asynchronous functions, which get executed
//! concurrently by the worker threads.

use actix_multipart::Multipart;
use actix_web::{get, web, HttpResponse, Responder};
use boutique_payment_engine::{
    db_types::{OrderStatusType, PaymentMethod, Role},
    order_objects::{OrderQueryFilter, OrderResult},
    AgentAccess,
    AgentApi,
    MembershipApi,
    MembershipManagement,
    OrderFlowApi,
    PaymentGatewayDatabase,
};
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use log::*;

use crate::{
    auth::JwtClaims,
    data_objects::{
        AdminDecisionRequest,
        CreateOrderRequest,
        MembershipStatusResponse,
        OrderListQuery,
        UpdateStatusRequest,
        ValidateCouponRequest,
        ValidateCouponResponse,
    },
    errors::ServerError,
    server::ServerOptions,
};

const MAX_PROOF_BYTES: usize = 5 * 1024 * 1024;

// Web-actix cannot handle generics in handlers, so route registration is implemented manually using the `route!`
// macro: each invocation emits a unit struct implementing `HttpServiceFactory` for the named handler, optionally
// wrapped in the ACL middleware for the listed roles.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+ where requires [$($roles:expr),+])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  -----------------------------------------------------
route!(create_order => Post "/orders" impl PaymentGatewayDatabase, AgentAccess where requires [Role::User]);
/// Creates a new ledger entry for the authenticated buyer. The buyer identity comes from the verified claims, not
/// from the body. The order starts in `payment_pending`; stock is untouched until a payment is confirmed.
pub async fn create_order<A>(
    claims: JwtClaims,
    body: web::Json<CreateOrderRequest>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: PaymentGatewayDatabase + AgentAccess,
{
    debug!("💻️ POST create order for user {}", claims.sub);
    let order = body.into_inner().into_new_order(claims.sub, PaymentMethod::UpiQr);
    let order = api.create_order(order).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(my_orders => Get "/orders/mine" impl PaymentGatewayDatabase, AgentAccess where requires [Role::User]);
pub async fn my_orders<A>(claims: JwtClaims, api: web::Data<OrderFlowApi<A>>) -> Result<HttpResponse, ServerError>
where A: PaymentGatewayDatabase + AgentAccess {
    debug!("💻️ GET orders for user {}", claims.sub);
    let orders = api.fetch_orders_for_user(claims.sub).await?;
    Ok(HttpResponse::Ok().json(OrderResult::from(orders)))
}

route!(orders => Get "/orders" impl PaymentGatewayDatabase, AgentAccess where requires [Role::Admin]);
/// The unscoped admin listing. `?verified=false` and `?verified=true` are the two review queues (awaiting
/// approval / ready to deliver); `?status=` filters on the lifecycle state.
pub async fn orders<A>(
    query: web::Query<OrderListQuery>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: PaymentGatewayDatabase + AgentAccess,
{
    let query = query.into_inner();
    let mut filter = OrderQueryFilter::default();
    if let Some(verified) = query.verified {
        filter = filter.with_payment_verified(verified);
    }
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    debug!("💻️ GET all orders ({filter:?})");
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(OrderResult::from(orders)))
}

route!(order_by_id => Get "/orders/{id}" impl PaymentGatewayDatabase, AgentAccess where requires [Role::User]);
/// Buyers may fetch their own orders; admins may fetch any.
pub async fn order_by_id<A>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: PaymentGatewayDatabase + AgentAccess,
{
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id} for user {}", claims.sub);
    let order = api
        .fetch_order_by_id(order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order with id {order_id}")))?;
    if order.user_id != claims.sub && !claims.is_admin() {
        return Err(ServerError::InsufficientPermissions("You may only view your own orders.".into()));
    }
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Put "/orders/{id}/status" impl PaymentGatewayDatabase, AgentAccess where requires [Role::Admin]);
/// Moves an order along its lifecycle. Illegal transitions (per the state machine) come back as 400; a stale
/// `expectedVersion` as 409.
pub async fn update_order_status<A>(
    path: web::Path<i64>,
    body: web::Json<UpdateStatusRequest>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: PaymentGatewayDatabase + AgentAccess,
{
    let order_id = path.into_inner();
    let req = body.into_inner();
    debug!("💻️ PUT order {order_id} status → {}", req.status);
    let order = api.update_order_status(order_id, req.status, req.expected_version).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(submit_payment_proof => Post "/orders/{id}/payment-proof" impl PaymentGatewayDatabase, AgentAccess where requires [Role::User]);
/// Accepts a multipart upload of the buyer's payment screenshot, stores the file under the uploads directory, and
/// attaches the resulting URL to the order (moving it into the review queue).
pub async fn submit_payment_proof<A>(
    claims: JwtClaims,
    path: web::Path<i64>,
    payload: Multipart,
    api: web::Data<OrderFlowApi<A>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    A: PaymentGatewayDatabase + AgentAccess,
{
    let order_id = path.into_inner();
    debug!("💻️ POST payment proof for order {order_id}");
    let order = api
        .fetch_order_by_id(order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order with id {order_id}")))?;
    if order.user_id != claims.sub && !claims.is_admin() {
        return Err(ServerError::InsufficientPermissions("You may only submit proofs for your own orders.".into()));
    }
    let upload = read_proof_upload(payload).await?;
    let proof_url = store_proof_file(&options.uploads_dir, order_id, &upload).await?;
    let order = api.submit_payment_proof(order_id, &proof_url).await?;
    Ok(HttpResponse::Ok().json(order))
}

struct ProofUpload {
    extension: String,
    data: web::BytesMut,
}

/// Pulls the proof file out of the multipart stream. The field may be called `proofFile` or `screenshot`.
async fn read_proof_upload(mut payload: Multipart) -> Result<ProofUpload, ServerError> {
    while let Some(mut field) =
        payload.try_next().await.map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?
    {
        if !matches!(field.name(), "proofFile" | "screenshot") {
            continue;
        }
        let extension = field
            .content_disposition()
            .get_filename()
            .and_then(|f| f.rsplit('.').next())
            .map(|e| e.chars().filter(char::is_ascii_alphanumeric).collect::<String>().to_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "png".to_string());
        let mut data = web::BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
            if data.len() + chunk.len() > MAX_PROOF_BYTES {
                return Err(ServerError::ValidationError {
                    field: "proofFile".into(),
                    message: format!("proof file exceeds the {MAX_PROOF_BYTES} byte limit"),
                });
            }
            data.extend_from_slice(&chunk);
        }
        if data.is_empty() {
            break;
        }
        return Ok(ProofUpload { extension, data });
    }
    Err(ServerError::ValidationError { field: "proofFile".into(), message: "a proof file is required".into() })
}

/// Writes the file to local disk and returns the URL stored on the order. Object-storage deployments swap this
/// function out; the engine only ever sees the URL.
async fn store_proof_file(uploads_dir: &str, order_id: i64, upload: &ProofUpload) -> Result<String, ServerError> {
    let filename = format!("proof_{order_id}_{}.{}", Utc::now().timestamp_millis(), upload.extension);
    tokio::fs::create_dir_all(uploads_dir).await?;
    let filepath = format!("{}/{filename}", uploads_dir.trim_end_matches('/'));
    tokio::fs::write(&filepath, &upload.data).await?;
    trace!("💻️ Stored payment proof at {filepath}");
    Ok(format!("/uploads/{filename}"))
}

route!(admin_decide_payment => Post "/orders/verify-payment" impl PaymentGatewayDatabase, AgentAccess where requires [Role::Admin]);
/// Applies an admin verify/reject decision on a manually-paid order. The deciding admin is recorded from the
/// verified claims — never from the request body.
pub async fn admin_decide_payment<A>(
    claims: JwtClaims,
    body: web::Json<AdminDecisionRequest>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: PaymentGatewayDatabase + AgentAccess,
{
    let req = body.into_inner();
    info!("💻️ Admin {} decided {:?} on order {}", claims.audit_id(), req.action, req.order_id);
    let order = api.record_admin_decision(req.order_id, &claims.audit_id(), req.action).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Coupons  ----------------------------------------------------
route!(validate_coupon => Post "/coupons/validate" impl AgentAccess);
/// Checkout-time coupon validation. Public: the response leaks nothing beyond validity.
pub async fn validate_coupon<A>(
    body: web::Json<ValidateCouponRequest>,
    api: web::Data<AgentApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: AgentAccess,
{
    let code = body.into_inner().coupon_code;
    let valid = api.validate_coupon(&code).await?;
    debug!("💻️ Coupon validation for {code}: {valid}");
    Ok(HttpResponse::Ok().json(ValidateCouponResponse { valid }))
}

//----------------------------------------------   Agents  -----------------------------------------------------
route!(agent_orders => Get "/agent/orders" impl AgentAccess where requires [Role::Agent]);
/// The coupon-scoped order view. The agent identity comes from the verified claims; the coupon filter runs
/// server-side, so no unscoped order data ever crosses the wire to an agent principal.
pub async fn agent_orders<A>(claims: JwtClaims, api: web::Data<AgentApi<A>>) -> Result<HttpResponse, ServerError>
where A: AgentAccess {
    let agent_id = claims
        .agent_id
        .ok_or_else(|| ServerError::InsufficientPermissions("No agent identity in access token.".into()))?;
    debug!("💻️ GET orders for agent {agent_id}");
    let orders = api.orders_visible_to(agent_id).await?;
    Ok(HttpResponse::Ok().json(OrderResult::from(orders)))
}

//----------------------------------------------   Membership  -------------------------------------------------
route!(membership_status => Get "/membership/status" impl MembershipManagement where requires [Role::User]);
pub async fn membership_status<A>(
    claims: JwtClaims,
    api: web::Data<MembershipApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: MembershipManagement,
{
    let user = api
        .fetch_user(claims.sub)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("User with id {}", claims.sub)))?;
    let is_premium = user.has_active_membership(Utc::now());
    Ok(HttpResponse::Ok().json(MembershipStatusResponse { is_premium, membership_expiry: user.membership_expiry }))
}

route!(premium_users => Get "/users/premium" impl MembershipManagement where requires [Role::Admin]);
pub async fn premium_users<A>(api: web::Data<MembershipApi<A>>) -> Result<HttpResponse, ServerError>
where A: MembershipManagement {
    let users = api.fetch_premium_users().await?;
    debug!("💻️ GET premium users: {} active member(s)", users.len());
    Ok(HttpResponse::Ok().json(users))
}

