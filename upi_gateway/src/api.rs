use std::sync::Arc;

use bps_common::Paise;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    config::GatewayConfig,
    data_objects::{RemoteIntent, RemoteIntentRequest},
    GatewayApiError,
};

/// The outbound REST client for the hosted gateway. Cheap to clone; the underlying HTTP client is shared.
#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Creates a remote payment intent for the given amount. `notes` travels to the gateway verbatim and comes
    /// back on webhook events, so callers stash correlation data there.
    pub async fn create_payment_intent(
        &self,
        amount: Paise,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<RemoteIntent, GatewayApiError> {
        if amount.value() <= 0 {
            return Err(GatewayApiError::InvalidCurrencyAmount(format!(
                "intent amount must be positive, got {amount}"
            )));
        }
        let body = RemoteIntentRequest::new(amount, currency, receipt, notes);
        let intent: RemoteIntent = self.rest_query(Method::POST, "/v1/orders", Some(&body)).await?;
        debug!("💳️ Remote intent {} created for {amount}", intent.id);
        Ok(intent)
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, GatewayApiError> {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        trace!("Sending gateway REST query: {url}");
        let mut req = self
            .client
            .request(method, url)
            .basic_auth(&self.config.key_id, Some(self.config.api_secret.reveal()));
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("Gateway REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }
}
