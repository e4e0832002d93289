//! Process configuration, loaded once at start-up from the environment.

use queue_commons::auth::hmac_sha256_hex;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Env {
    Development,
    Test,
    Production,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Env,
    pub callback_uri_root: String,
    pub charge_api_token: String,
    pub charge_root: String,
    pub min_bid: u64,
    pub min_per_byte_bid: f64,
    pub force_payment: bool,
    pub broker_uri: String,
    pub database_url: String,
    pub msg_store_path: String,
    pub server_port: u16,
    pub transmit_rate: u32,
    pub lightning_webhook_key: String,
    pub user_auth_key: String,
}

/// Minimum accepted payload size for an uploaded message, in bytes.
pub const MIN_MESSAGE_SIZE: u32 = 1;
/// Lightning invoice expiry, in seconds (one hour).
pub const LN_INVOICE_EXPIRY_SECS: i64 = 60 * 60;
/// Pending orders older than this are expired by the housekeeper.
pub const EXPIRE_PENDING_ORDERS_AFTER_DAYS: i64 = 1;
/// Stored payloads are deleted this many days after transmission ends.
pub const MESSAGE_FILE_RETENTION_DAYS: i64 = 31;
/// Default page size for the `/orders/<state>` listing.
pub const DEFAULT_PAGE_LIMIT: i64 = 20;
/// Maximum page size for the `/orders/<state>` listing.
pub const MAX_PAGE_LIMIT: i64 = 100;

fn env_var(key: &str) -> Result<String, anyhow::Error> {
    env::var(key).map_err(|_| anyhow::anyhow!("missing required environment variable {key}"))
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Settings> {
        let env = match env_var_or("ENV", "development").as_str() {
            "production" => Env::Production,
            "test" => Env::Test,
            _ => Env::Development,
        };
        let charge_api_token = env_var("CHARGE_API_TOKEN")?;
        let lightning_webhook_key = hmac_sha256_hex("charged-token", &charge_api_token);
        let user_auth_key = hmac_sha256_hex("user-token", &charge_api_token);

        Ok(Settings {
            env,
            callback_uri_root: env_var("CALLBACK_URI_ROOT")?,
            charge_api_token,
            charge_root: env_var("CHARGE_ROOT")?,
            min_bid: env_var_or("MIN_BID", "1000").parse()?,
            min_per_byte_bid: env_var_or("MIN_PER_BYTE_BID", "1").parse()?,
            force_payment: env_var_or("FORCE_PAYMENT", "false").parse()?,
            broker_uri: env_var_or("BROKER_URI", "memory://"),
            database_url: env_var("DATABASE_URL")?,
            msg_store_path: env_var_or("MSG_STORE_PATH", "./message_store"),
            server_port: env_var_or("SERVER_PORT", "8080").parse()?,
            transmit_rate: env_var_or("TRANSMIT_RATE", "1000").parse()?,
            lightning_webhook_key,
            user_auth_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_key_is_derived_deterministically_from_charge_token() {
        let key = hmac_sha256_hex("charged-token", "abc123");
        assert_eq!(key, hmac_sha256_hex("charged-token", "abc123"));
        assert_ne!(key, hmac_sha256_hex("charged-token", "different"));
    }

    #[test]
    fn user_auth_key_differs_from_webhook_key() {
        let webhook_key = hmac_sha256_hex("charged-token", "abc123");
        let user_key = hmac_sha256_hex("user-token", "abc123");
        assert_ne!(webhook_key, user_key);
    }
}
