//----------------------------------------------   Gateway  ----------------------------------------------------
//! The payment-gateway surface: remote intent creation, the synchronous signature-checked confirmation call, and
//! the asynchronous webhook. The webhook route is registered behind the HMAC middleware, so by the time the
//! handler runs the body is authenticated; responses are always in the 2xx range for parsed events, otherwise the
//! gateway retries forever.

use actix_web::{web, HttpResponse};
use boutique_payment_engine::{
    db_types::{NewOrder, OrderType, PaymentMethod},
    AgentAccess,
    GatewayConfirmation,
    OrderFlowApi,
    PaymentGatewayDatabase,
    PaymentGatewayError,
};
use bps_common::{Paise, INR_CURRENCY_CODE};
use chrono::Utc;
use log::*;
use upi_gateway::{data_objects::WebhookEvent, helpers::verify_payment_signature, GatewayApi};

use crate::{
    auth::JwtClaims,
    data_objects::{CreateIntentRequest, IntentResponse, JsonResponse, VerifyPaymentRequest, VerifyPaymentResponse},
    errors::ServerError,
    route,
    server::ServerOptions,
};

use boutique_payment_engine::db_types::Role;

route!(create_payment_intent => Post "/gateway/intent" impl PaymentGatewayDatabase, AgentAccess where requires [Role::User]);
/// Creates a remote payment intent at the gateway and records it locally, together with the order draft (or
/// membership parameters) and the expiry after which verification is refused.
///
/// The draft is validated *now*, before any money moves: a bad address or a broken total should fail at intent
/// time, not after the buyer has paid.
pub async fn create_payment_intent<A>(
    claims: JwtClaims,
    body: web::Json<CreateIntentRequest>,
    api: web::Data<OrderFlowApi<A>>,
    gateway: web::Data<GatewayApi>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    A: PaymentGatewayDatabase + AgentAccess,
{
    let req = body.into_inner();
    let amount = Paise::from(req.amount_minor_units);
    let currency = req.currency.unwrap_or_else(|| INR_CURRENCY_CODE.to_string());
    let order_type = req.notes.order_type;
    debug!("💳️ POST create {order_type} intent for user {} ({amount})", claims.sub);

    let details = match order_type {
        OrderType::Product => {
            let draft = req
                .notes
                .order
                .clone()
                .ok_or_else(|| ServerError::ValidationError {
                    field: "notes.order".into(),
                    message: "product intents must carry the order draft".into(),
                })?
                .into_new_order(claims.sub, PaymentMethod::Gateway);
            api.validate_new_order(&draft).await?;
            if draft.total != amount {
                return Err(ServerError::ValidationError {
                    field: "amountMinorUnits".into(),
                    message: format!("intent amount {amount} does not match the order total {}", draft.total),
                });
            }
            serialize_details(&draft)?
        },
        OrderType::Membership => {
            let months = req.notes.duration_months.ok_or_else(|| ServerError::ValidationError {
                field: "notes.durationMonths".into(),
                message: "membership intents must carry the duration".into(),
            })?;
            serialize_details(&boutique_payment_engine::db_types::MembershipParams { duration_months: months })?
        },
    };

    let receipt = req.receipt.unwrap_or_else(|| format!("receipt_{}", Utc::now().timestamp_millis()));
    let notes = serde_json::to_value(&req.notes).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let remote = gateway
        .create_payment_intent(amount, &currency, &receipt, notes)
        .await
        .map_err(|e| {
            warn!("💳️ Could not create remote intent: {e}");
            ServerError::GatewayError(e.to_string())
        })?;
    let expires_at = Utc::now() + options.intent_timeout;
    let intent = api
        .record_payment_intent(&remote.id, amount, &currency, order_type, claims.sub, Some(details), expires_at)
        .await?;
    info!("💳️ Intent {} created for user {} (expires {})", intent.intent_id, claims.sub, intent.expires_at);
    Ok(HttpResponse::Ok().json(IntentResponse {
        intent_id: intent.intent_id,
        amount: intent.amount,
        currency: intent.currency,
        status: remote.status,
        expires_at: intent.expires_at,
    }))
}

fn serialize_details<T: serde::Serialize>(value: &T) -> Result<String, ServerError> {
    serde_json::to_string(value).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))
}

route!(verify_gateway_payment => Post "/gateway/verify" impl PaymentGatewayDatabase, AgentAccess where requires [Role::User]);
/// The synchronous confirmation path: the client hands back `(intentId, paymentId, signature)` after checkout. The
/// HMAC over `"{intentId}|{paymentId}"` is checked first; a mismatch is a hard 400 with **zero** side effects.
/// A valid signature feeds the same idempotent confirmation flow as the webhook, so whichever path lands first
/// wins and the other becomes a no-op.
pub async fn verify_gateway_payment<A>(
    claims: JwtClaims,
    body: web::Json<VerifyPaymentRequest>,
    api: web::Data<OrderFlowApi<A>>,
    gateway: web::Data<GatewayApi>,
) -> Result<HttpResponse, ServerError>
where
    A: PaymentGatewayDatabase + AgentAccess,
{
    let req = body.into_inner();
    trace!("💳️ POST verify payment {} for intent {}", req.payment_id, req.intent_id);
    let secret = gateway.config().api_secret.reveal();
    if !verify_payment_signature(secret, &req.intent_id, &req.payment_id, &req.signature) {
        warn!("💳️ Invalid signature on confirmation for intent {} — rejecting without side effects", req.intent_id);
        return Err(ServerError::InvalidSignature);
    }
    let fallback: Option<NewOrder> =
        req.order_details.map(|draft| draft.into_new_order(claims.sub, PaymentMethod::Gateway));
    let confirmation = api.confirm_gateway_payment(&req.intent_id, &req.payment_id, fallback).await?;
    let already_processed = !confirmation.was_applied();
    Ok(HttpResponse::Ok().json(VerifyPaymentResponse {
        success: true,
        payment_id: req.payment_id,
        intent_id: req.intent_id,
        already_processed,
    }))
}

route!(gateway_webhook => Post "/gateway" impl PaymentGatewayDatabase, AgentAccess);
/// The asynchronous path. Delivery is at-least-once: the confirmation flow dedupes by intent id, so a replayed
/// event is acknowledged as a success without double-applying stock decrements or membership grants. Business
/// failures are logged and still acknowledged 2xx — returning an error would only make the gateway redeliver an
/// event that will never succeed.
pub async fn gateway_webhook<A>(
    body: web::Json<WebhookEvent>,
    api: web::Data<OrderFlowApi<A>>,
) -> HttpResponse
where
    A: PaymentGatewayDatabase + AgentAccess,
{
    let event = body.into_inner();
    trace!("💳️ Received gateway webhook: {}", event.event);
    let result = match event.event.as_str() {
        "payment.captured" | "order.paid" => match event.confirmation_ids() {
            Some((intent_id, payment_id)) => apply_confirmation(&api, &intent_id, &payment_id).await,
            None => {
                warn!("💳️ {} event carried no usable entity ids", event.event);
                JsonResponse::failure("Event carried no usable entity ids.")
            },
        },
        "payment.failed" => match event.confirmation_ids() {
            Some((intent_id, payment_id)) => match api.record_payment_failure(&intent_id, &payment_id).await {
                Ok(()) => JsonResponse::success("Payment failure recorded."),
                Err(e) => {
                    warn!("💳️ Could not record payment failure for intent {intent_id}: {e}");
                    JsonResponse::failure("Could not record payment failure.")
                },
            },
            None => JsonResponse::failure("Event carried no usable entity ids."),
        },
        other => {
            debug!("💳️ Ignoring unhandled webhook event: {other}");
            JsonResponse::success("Event ignored.")
        },
    };
    HttpResponse::Ok().json(result)
}

async fn apply_confirmation<A>(api: &OrderFlowApi<A>, intent_id: &str, payment_id: &str) -> JsonResponse
where A: PaymentGatewayDatabase + AgentAccess {
    match api.confirm_gateway_payment(intent_id, payment_id, None).await {
        Ok(GatewayConfirmation::Applied { .. }) => {
            info!("💳️ Webhook confirmation applied for intent {intent_id}");
            JsonResponse::success("Confirmation applied.")
        },
        Ok(GatewayConfirmation::AlreadyProcessed) => {
            debug!("💳️ Webhook confirmation for intent {intent_id} was a duplicate");
            JsonResponse::success("Confirmation already applied.")
        },
        Err(PaymentGatewayError::OutOfStock { product_id, .. }) => {
            // The money is captured but the shelf is empty. Surface loudly; an operator has to refund or restock.
            error!("💳️ Intent {intent_id} confirmed but product {product_id} is out of stock!");
            JsonResponse::failure("Out of stock.")
        },
        Err(e) => {
            warn!("💳️ Could not apply confirmation for intent {intent_id}: {e}");
            JsonResponse::failure("Could not apply confirmation.")
        },
    }
}
