use std::{env, io::Write};

use bps_common::{helpers::parse_boolean_flag, Secret};
use chrono::Duration;
use log::*;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;
use tempfile::NamedTempFile;
use upi_gateway::GatewayConfig;

use crate::errors::ServerError;

const DEFAULT_BPS_HOST: &str = "127.0.0.1";
const DEFAULT_BPS_PORT: u16 = 8360;
const DEFAULT_UPLOADS_DIR: &str = "data/uploads";
const DEFAULT_INTENT_TIMEOUT: Duration = Duration::hours(2);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Where uploaded payment-proof files land. Only the resulting URL matters to the engine; swap the directory
    /// for object storage without touching anything else.
    pub uploads_dir: String,
    /// Gateway connection + signing configuration.
    pub gateway: GatewayConfig,
    /// If false, webhook HMAC checks are skipped. Never disable outside local development.
    pub gateway_hmac_checks: bool,
    /// How long a remote payment intent stays verifiable. Confirmations arriving after this window are refused.
    pub intent_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BPS_HOST.to_string(),
            port: DEFAULT_BPS_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            uploads_dir: DEFAULT_UPLOADS_DIR.to_string(),
            gateway: GatewayConfig::default(),
            gateway_hmac_checks: true,
            intent_timeout: DEFAULT_INTENT_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("BPS_HOST").ok().unwrap_or_else(|| DEFAULT_BPS_HOST.into());
        let port = env::var("BPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for BPS_PORT. {e} Using the default, {DEFAULT_BPS_PORT}, instead."
                    );
                    DEFAULT_BPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_BPS_PORT);
        let database_url = env::var("BPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ BPS_DATABASE_URL is not set. Please set it to the URL for the storefront database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to \
                 the default configuration."
            );
            AuthConfig::default()
        });
        let uploads_dir = env::var("BPS_UPLOADS_DIR").ok().unwrap_or_else(|| {
            info!("🪛️ BPS_UPLOADS_DIR is not set. Using the default, {DEFAULT_UPLOADS_DIR}.");
            DEFAULT_UPLOADS_DIR.into()
        });
        let gateway = GatewayConfig::new_from_env_or_default();
        let gateway_hmac_checks = parse_boolean_flag(env::var("BPS_GATEWAY_HMAC_CHECKS").ok(), true);
        if !gateway_hmac_checks {
            warn!("🚨️ Gateway webhook HMAC checks are DISABLED. Anyone can forge payment notifications.");
        }
        let intent_timeout = configure_intent_timeout();
        Self { host, port, database_url, auth, uploads_dir, gateway, gateway_hmac_checks, intent_timeout }
    }
}

fn configure_intent_timeout() -> Duration {
    env::var("BPS_INTENT_TIMEOUT_HOURS")
        .map_err(|_| {
            info!(
                "🪛️ BPS_INTENT_TIMEOUT_HOURS is not set. Using the default value of {} hrs.",
                DEFAULT_INTENT_TIMEOUT.num_hours()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::hours)
                .map_err(|e| warn!("🪛️ Invalid configuration value for BPS_INTENT_TIMEOUT_HOURS. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_INTENT_TIMEOUT)
}

//-------------------------------------------------  AuthConfig  ------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret shared with the auth service that issues access tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::random()
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("BPS_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [BPS_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "BPS_JWT_SECRET must be at least 32 characters long.".to_string(),
            ));
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }

    /// A randomly generated secret for this session only. Tokens issued against it die with the process, so every
    /// log line here shouts about it.
    pub fn random() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this, since every issued token becomes invalid when the server restarts. 🚨️🚨️🚨️"
        );
        let secret: String = rand::thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect();
        let tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        match tmpfile {
            Some((mut f, p)) => {
                let key_data = json!({ "jwt_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production \
                         instance, you are doing it wrong! Set the BPS_JWT_SECRET environment variable instead. \
                         🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret.");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}
