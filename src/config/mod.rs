use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub vendors: VendorConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Knobs for the vendor HTTP adapters. Base URLs are overridable so tests
/// can point adapters at a local mock server.
#[derive(Debug, Clone)]
pub struct VendorConfig {
    pub meta_base_url: String,
    pub tiktok_base_url: String,
    pub request_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub insight_concurrency: usize,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            meta_base_url: "https://graph.facebook.com/v18.0".to_string(),
            tiktok_base_url: "https://business-api.tiktok.com/open_api/v1.3".to_string(),
            request_timeout_secs: 30,
            retry_attempts: 2,
            retry_base_delay_ms: 500,
            insight_concurrency: 4,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenv().ok();

        let defaults = VendorConfig::default();

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")?,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            server: ServerConfig {
                port: env_or("SERVER_PORT", 8080)?,
            },
            vendors: VendorConfig {
                meta_base_url: env::var("META_API_BASE_URL").unwrap_or(defaults.meta_base_url),
                tiktok_base_url: env::var("TIKTOK_API_BASE_URL")
                    .unwrap_or(defaults.tiktok_base_url),
                request_timeout_secs: env_or(
                    "VENDOR_REQUEST_TIMEOUT_SECS",
                    defaults.request_timeout_secs,
                )?,
                retry_attempts: env_or("VENDOR_RETRY_ATTEMPTS", defaults.retry_attempts)?,
                retry_base_delay_ms: env_or(
                    "VENDOR_RETRY_BASE_DELAY_MS",
                    defaults.retry_base_delay_ms,
                )?,
                insight_concurrency: env_or(
                    "VENDOR_INSIGHT_CONCURRENCY",
                    defaults.insight_concurrency,
                )?,
            },
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(raw.parse()?),
        Err(_) => Ok(default),
    }
}
