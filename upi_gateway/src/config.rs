use bps_common::Secret;
use log::*;

/// Connection and signing configuration for the hosted gateway.
///
/// Two *distinct* secrets are involved: `api_secret` signs synchronous payment confirmations
/// (`intent_id|payment_id`), while `webhook_secret` signs raw webhook bodies. Mixing them up makes every
/// verification fail, which is the safe direction to fail in.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST API, e.g. `https://api.gateway.example`.
    pub base_url: String,
    pub key_id: String,
    pub api_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("BPS_GATEWAY_URL").unwrap_or_else(|_| {
            warn!("BPS_GATEWAY_URL not set, using the gateway sandbox as default");
            "https://api.sandbox.gateway.example".to_string()
        });
        let key_id = std::env::var("BPS_GATEWAY_KEY_ID").unwrap_or_else(|_| {
            warn!("BPS_GATEWAY_KEY_ID not set, using a (probably useless) default");
            "key_test_0000000000".to_string()
        });
        let api_secret = Secret::new(std::env::var("BPS_GATEWAY_API_SECRET").unwrap_or_else(|_| {
            warn!("BPS_GATEWAY_API_SECRET not set, payment confirmations cannot be verified");
            String::default()
        }));
        let webhook_secret = Secret::new(std::env::var("BPS_GATEWAY_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("BPS_GATEWAY_WEBHOOK_SECRET not set, webhook signatures cannot be verified");
            String::default()
        }));
        Self { base_url, key_id, api_secret, webhook_secret }
    }
}
