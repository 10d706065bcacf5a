use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub booking: BookingPolicyConfig,
    #[serde(default)]
    pub payments: PaymentConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Knobs for the booking validator. All durations are minutes, hours are
/// whole clock hours in the engine's reference timezone (UTC).
#[derive(Debug, Deserialize, Clone)]
pub struct BookingPolicyConfig {
    pub horizon_days: i64,
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub open_hour: u32,
    pub close_hour: u32,
    pub max_active_per_day: i64,
    pub max_pending: i64,
    pub daily_capacity_minutes: i64,
}

impl Default for BookingPolicyConfig {
    fn default() -> Self {
        Self {
            horizon_days: 180,
            min_duration_minutes: 60,
            max_duration_minutes: 720,
            open_hour: 6,
            close_hour: 23,
            max_active_per_day: 3,
            max_pending: 5,
            daily_capacity_minutes: 480,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    #[serde(default)]
    pub enabled: bool,
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_min_top_up")]
    pub min_top_up: i64,
    /// Order codes the gateway uses for its own connectivity probes. These
    /// must be acknowledged without touching the ledger.
    #[serde(default = "default_synthetic_order_codes")]
    pub synthetic_order_codes: Vec<String>,
    /// Notifications below this amount are treated as gateway test pings.
    #[serde(default = "default_synthetic_amount_floor")]
    pub synthetic_amount_floor: i64,
    /// Numeric order codes below this value are gateway-reserved test ids.
    #[serde(default = "default_synthetic_numeric_floor")]
    pub synthetic_numeric_floor: u64,
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_min_top_up() -> i64 {
    5_000
}

fn default_synthetic_order_codes() -> Vec<String> {
    vec!["123".to_string()]
}

fn default_synthetic_amount_floor() -> i64 {
    2_000
}

fn default_synthetic_numeric_floor() -> u64 {
    1_000
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret_key: None,
            webhook_secret: None,
            currency: default_currency(),
            min_top_up: default_min_top_up(),
            synthetic_order_codes: default_synthetic_order_codes(),
            synthetic_amount_floor: default_synthetic_amount_floor(),
            synthetic_numeric_floor: default_synthetic_numeric_floor(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationConfig {
    pub webhook: Option<WebhookSinkConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookSinkConfig {
    pub enabled: bool,
    pub url: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://bookvault.db")?
            .set_default("database.max_connections", 10)?
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (with BOOKVAULT__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("BOOKVAULT").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://bookvault.db".to_string(),
                max_connections: 10,
            },
            booking: BookingPolicyConfig::default(),
            payments: PaymentConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}
