use std::env;

use campus_eats_engine::order_objects::FeePolicy;
use ce_common::{Paise, Secret};
use chrono::Duration;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::errors::ServerError;

const DEFAULT_CE_HOST: &str = "127.0.0.1";
const DEFAULT_CE_PORT: u16 = 8360;
const DEFAULT_AUTO_CANCEL_AFTER: Duration = Duration::minutes(20);
const DEFAULT_PURGE_UNPAID_AFTER: Duration = Duration::hours(24);
const DEFAULT_VENDOR_GRACE: Duration = Duration::minutes(3);
const DEFAULT_SWEEP_BATCH: i64 = 100;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    /// Unpaid orders still `placed` after this long are auto-cancelled by the reconciliation worker.
    pub auto_cancel_after: Duration,
    /// Never-paid orders older than this are hard-deleted by the purge job.
    pub purge_unpaid_after: Duration,
    /// How long unpaid orders stay visible on a vendor's board before they are treated as abandoned.
    pub vendor_grace: Duration,
    /// Upper bound on orders cancelled per sweep iteration.
    pub sweep_batch: i64,
    pub fee_policy: FeePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CE_HOST.to_string(),
            port: DEFAULT_CE_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            gateway: GatewayConfig::default(),
            auto_cancel_after: DEFAULT_AUTO_CANCEL_AFTER,
            purge_unpaid_after: DEFAULT_PURGE_UNPAID_AFTER,
            vendor_grace: DEFAULT_VENDOR_GRACE,
            sweep_batch: DEFAULT_SWEEP_BATCH,
            fee_policy: FeePolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CE_HOST").ok().unwrap_or_else(|| DEFAULT_CE_HOST.into());
        let port = env::var("CE_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for CE_PORT. {e} Using the default, {DEFAULT_CE_PORT}, instead.");
                    DEFAULT_CE_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CE_PORT);
        let database_url = env::var("CE_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CE_DATABASE_URL is not set. Please set it to the URL for the Campus Eats database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to \
                 the default configuration."
            );
            AuthConfig::default()
        });
        let gateway = GatewayConfig::from_env_or_defaults();
        let auto_cancel_after = duration_from_env("CE_AUTO_CANCEL_MINUTES", Duration::minutes, DEFAULT_AUTO_CANCEL_AFTER);
        let purge_unpaid_after = duration_from_env("CE_PURGE_HOURS", Duration::hours, DEFAULT_PURGE_UNPAID_AFTER);
        let vendor_grace = duration_from_env("CE_VENDOR_GRACE_MINUTES", Duration::minutes, DEFAULT_VENDOR_GRACE);
        let sweep_batch = env::var("CE_SWEEP_BATCH").ok().and_then(|s| s.parse::<i64>().ok()).unwrap_or(DEFAULT_SWEEP_BATCH);
        let fee_policy = fee_policy_from_env();
        Self {
            host,
            port,
            database_url,
            auth,
            gateway,
            auto_cancel_after,
            purge_unpaid_after,
            vendor_grace,
            sweep_batch,
            fee_policy,
        }
    }
}

fn duration_from_env(var: &str, unit: fn(i64) -> Duration, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| info!("🪛️ {var} is not set. Using the default."))
        .and_then(|s| s.parse::<i64>().map(unit).map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}")))
        .ok()
        .unwrap_or(default)
}

fn fee_policy_from_env() -> FeePolicy {
    let default = FeePolicy::default();
    let paise = |var: &str, fallback: Paise| {
        env::var(var).ok().and_then(|s| s.parse::<i64>().ok()).map(Paise::from).unwrap_or(fallback)
    };
    FeePolicy {
        threshold: paise("CE_FEE_THRESHOLD_PAISE", default.threshold),
        below_fee: paise("CE_FEE_BELOW_PAISE", default.below_fee),
        at_or_above_fee: paise("CE_FEE_AT_OR_ABOVE_PAISE", default.at_or_above_fee),
    }
}

//-------------------------------------------------  AuthConfig  ------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret used to verify (and, in tests and tooling, sign) access tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this, since every issued token dies with this process. Set CE_JWT_SECRET instead. 🚨️🚨️🚨️"
        );
        let secret: String = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("CE_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [CE_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "CE_JWT_SECRET must be at least 32 characters long.".to_string(),
            ));
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }
}

//-------------------------------------------------  GatewayConfig  ---------------------------------------------------
/// Credentials and endpoints for the remote payment provider (Razorpay-compatible).
#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: Secret<String>,
    /// Separate secret for webhook body signatures.
    pub webhook_secret: Secret<String>,
    pub base_url: String,
}

impl GatewayConfig {
    pub fn from_env_or_defaults() -> Self {
        let key_id = env::var("CE_GATEWAY_KEY_ID").ok().unwrap_or_else(|| {
            error!("🪛️ CE_GATEWAY_KEY_ID is not set. Please set it to your payment provider key id.");
            String::default()
        });
        let key_secret = Secret::new(env::var("CE_GATEWAY_KEY_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ CE_GATEWAY_KEY_SECRET is not set. Please set it to your payment provider key secret.");
            String::default()
        }));
        let webhook_secret = Secret::new(env::var("CE_GATEWAY_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ CE_GATEWAY_WEBHOOK_SECRET is not set. Please set it to your webhook signing secret.");
            String::default()
        }));
        let base_url = env::var("CE_GATEWAY_BASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ CE_GATEWAY_BASE_URL is not set. Using the default.");
            "https://api.razorpay.com".to_string()
        });
        Self { key_id, key_secret, webhook_secret, base_url }
    }
}
