use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::with_security_headers;

const DEFAULT_GATEWAY_BASE_URL: &str = "https://app.sandbox.midtrans.com";
const DEFAULT_MAIL_SENDER: &str = "dewetour <noreply@dewetour.local>";

/// Asia/Jakarta has no DST, so a fixed offset is exact.
const DEFAULT_BOOKING_UTC_OFFSET_HOURS: i32 = 7;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub server_key: String,
    pub timeout: Duration,
    pub verify_signature: bool,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
    pub sender: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub gateway: GatewayConfig,
    pub notifier: NotifierConfig,
    pub store: StoreConfig,
    pub order_id_max_attempts: u32,
    pub booking_offset: FixedOffset,
}

impl Config {
    pub fn from_env() -> Self {
        let host: IpAddr = env_or("HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port: u16 = env_or("PORT", 3001);

        let offset_hours: i32 =
            env_or("BOOKING_UTC_OFFSET_HOURS", DEFAULT_BOOKING_UTC_OFFSET_HOURS);
        let booking_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "Config: BOOKING_UTC_OFFSET_HOURS={} out of range, using +{}",
                    offset_hours,
                    DEFAULT_BOOKING_UTC_OFFSET_HOURS
                );
                default_booking_offset()
            });

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/tourpay".to_string()),
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 5),
            bind_addr: SocketAddr::new(host, port),
            gateway: GatewayConfig {
                base_url: env::var("GATEWAY_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_GATEWAY_BASE_URL.to_string()),
                server_key: env::var("GATEWAY_SERVER_KEY").unwrap_or_default(),
                timeout: Duration::from_secs(env_or("GATEWAY_TIMEOUT_SECS", 10)),
                verify_signature: env_or("GATEWAY_VERIFY_SIGNATURE", false),
            },
            notifier: NotifierConfig {
                relay_url: env_opt("MAIL_RELAY_URL"),
                relay_token: env_opt("MAIL_RELAY_TOKEN"),
                sender: env::var("MAIL_SENDER")
                    .unwrap_or_else(|_| DEFAULT_MAIL_SENDER.to_string()),
                timeout: Duration::from_secs(env_or("NOTIFIER_TIMEOUT_SECS", 10)),
                max_attempts: env_or("NOTIFIER_MAX_ATTEMPTS", 3),
                initial_backoff: Duration::from_millis(env_or("NOTIFIER_BACKOFF_MS", 500)),
            },
            store: StoreConfig {
                timeout: Duration::from_secs(env_or("STORE_TIMEOUT_SECS", 5)),
                max_attempts: env_or("STORE_MAX_ATTEMPTS", 3),
                initial_backoff: Duration::from_millis(env_or("STORE_BACKOFF_MS", 100)),
            },
            order_id_max_attempts: env_or("ORDER_ID_MAX_ATTEMPTS", 5),
            booking_offset,
        }
    }
}

pub fn default_booking_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_BOOKING_UTC_OFFSET_HOURS * 3600)
        .unwrap_or_else(|| Utc.fix())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Config: invalid value '{}' for {}, using default", raw, key);
            default
        }),
        Err(_) => default,
    }
}
