use log::*;
use sps_common::Secret;

const DEFAULT_API_VERSION: &str = "v1";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base host of the payment provider, e.g. "api.payments.example.com"
    pub host: String,
    pub api_version: String,
    pub api_key: Secret<String>,
    /// Shared secret used to verify webhook signatures. The server consumes this; the client only carries it.
    pub webhook_secret: Secret<String>,
    /// Hard deadline for any single call to the provider, in seconds.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: String::default(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key: Secret::default(),
            webhook_secret: Secret::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let host = std::env::var("SPS_GATEWAY_HOST").unwrap_or_else(|_| {
            warn!("SPS_GATEWAY_HOST not set, using (probably useless) default");
            "api.payments.example.com".to_string()
        });
        let api_version = std::env::var("SPS_GATEWAY_API_VERSION").unwrap_or_else(|_| {
            warn!("SPS_GATEWAY_API_VERSION not set, using {DEFAULT_API_VERSION} as default");
            DEFAULT_API_VERSION.to_string()
        });
        let api_key = Secret::new(std::env::var("SPS_GATEWAY_API_KEY").unwrap_or_else(|_| {
            warn!("SPS_GATEWAY_API_KEY not set, using (probably useless) default");
            "gw_key_00000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("SPS_GATEWAY_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("SPS_GATEWAY_WEBHOOK_SECRET not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        let timeout_secs = std::env::var("SPS_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self { host, api_version, api_key, webhook_secret, timeout_secs }
    }
}
