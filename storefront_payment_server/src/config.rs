use std::{env, time::Duration};

use gateway_tools::GatewayConfig;
use log::*;
use sps_common::helpers::parse_boolean_flag;
use storefront_payment_engine::helpers::BackoffPolicy;

const DEFAULT_SPS_HOST: &str = "127.0.0.1";
const DEFAULT_SPS_PORT: u16 = 8360;
const DEFAULT_REFUND_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_REFUND_BASE_DELAY_MS: u64 = 250;
const DEFAULT_REFUND_MAX_DELAY_MS: u64 = 5_000;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_POLL_PENDING_AGE_SECS: i64 = 120;

/// The header the provider uses to sign webhook deliveries.
pub const GATEWAY_HMAC_HEADER: &str = "x-gateway-hmac-sha256";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// If false, webhook HMAC signatures are not checked. **DANGER** — test environments only.
    pub hmac_checks: bool,
    /// Payment provider client configuration (host, credentials, call deadline).
    pub gateway: GatewayConfig,
    /// Retry schedule for refund dispatch and provider verification calls.
    pub backoff: BackoffPolicy,
    /// How often the reconciliation sweep runs.
    pub poll_interval: Duration,
    /// How old a pending payment/refund must be before the sweep chases it. Fresh ones are left for the webhook.
    pub poll_pending_age: chrono::Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPS_HOST.to_string(),
            port: DEFAULT_SPS_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            hmac_checks: true,
            gateway: GatewayConfig::default(),
            backoff: BackoffPolicy::new(
                DEFAULT_REFUND_MAX_ATTEMPTS,
                Duration::from_millis(DEFAULT_REFUND_BASE_DELAY_MS),
                Duration::from_millis(DEFAULT_REFUND_MAX_DELAY_MS),
            ),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_pending_age: chrono::Duration::seconds(DEFAULT_POLL_PENDING_AGE_SECS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPS_HOST").ok().unwrap_or_else(|| DEFAULT_SPS_HOST.into());
        let port = env::var("SPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPS_PORT. {e} Using the default, {DEFAULT_SPS_PORT}, instead."
                    );
                    DEFAULT_SPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPS_PORT);
        let database_url = env::var("SPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SPS_DATABASE_URL is not set. Please set it to the URL for the SPS database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("SPS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("SPS_USE_FORWARDED").ok(), false);
        let hmac_checks = parse_boolean_flag(env::var("SPS_GATEWAY_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!(
                "🚨️ Webhook HMAC checks are DISABLED. Anyone can submit payment confirmations. Do not run \
                 production like this."
            );
        }
        let gateway = GatewayConfig::new_from_env_or_default();
        let backoff = configure_backoff();
        let poll_interval = env::var("SPS_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS));
        let poll_pending_age = env::var("SPS_POLL_PENDING_AGE_SECS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(chrono::Duration::seconds)
            .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_POLL_PENDING_AGE_SECS));
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            hmac_checks,
            gateway,
            backoff,
            poll_interval,
            poll_pending_age,
        }
    }
}

//-------------------------------------------------  ServerOptions  ---------------------------------------------------
/// A subset of the server configuration that handlers need at request time. Generally we try to keep this as small
/// as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

fn configure_backoff() -> BackoffPolicy {
    let max_attempts = env::var("SPS_REFUND_MAX_ATTEMPTS")
        .ok()
        .and_then(|s| {
            s.parse::<u32>().map_err(|e| warn!("🪛️ Invalid value for SPS_REFUND_MAX_ATTEMPTS. {e}")).ok()
        })
        .unwrap_or(DEFAULT_REFUND_MAX_ATTEMPTS);
    let base_delay = env::var("SPS_REFUND_BASE_DELAY_MS")
        .ok()
        .and_then(|s| {
            s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid value for SPS_REFUND_BASE_DELAY_MS. {e}")).ok()
        })
        .unwrap_or(DEFAULT_REFUND_BASE_DELAY_MS);
    let max_delay = env::var("SPS_REFUND_MAX_DELAY_MS")
        .ok()
        .and_then(|s| {
            s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid value for SPS_REFUND_MAX_DELAY_MS. {e}")).ok()
        })
        .unwrap_or(DEFAULT_REFUND_MAX_DELAY_MS);
    BackoffPolicy::new(max_attempts, Duration::from_millis(base_delay), Duration::from_millis(max_delay))
}
