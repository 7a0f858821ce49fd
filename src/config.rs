use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub bitrix: BitrixConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Deserialize, Clone)]
pub struct BitrixConfig {
    /// Inbound webhook base, e.g. `https://example.bitrix24.com/rest/1/abc123`.
    pub webhook_url: String,
    /// Smart-process entity holding listings.
    #[serde(default = "default_listing_entity_type_id")]
    pub listing_entity_type_id: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_listing_entity_type_id() -> u32 {
    1036
}

fn default_timeout() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_capacity: default_max_capacity(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_sweep_interval() -> u64 {
    60
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.bitrix.webhook_url.trim().is_empty() {
            return Err("bitrix.webhook_url must be set. \
                 Set it in config.toml or via PERFBOARD__BITRIX__WEBHOOK_URL env var."
                .to_string());
        }
        let parsed = url::Url::parse(&self.bitrix.webhook_url)
            .map_err(|e| format!("bitrix.webhook_url is not a valid URL: {e}"))?;
        match parsed.scheme() {
            "https" => {}
            "http" => {
                tracing::warn!(url = %parsed, "bitrix webhook uses HTTP; HTTPS is recommended");
            }
            scheme => return Err(format!("bitrix.webhook_url has unsupported scheme: {scheme}")),
        }
        if self.cache.ttl_secs == 0 {
            return Err("cache.ttl_secs must be greater than zero".to_string());
        }
        if self.cache.max_capacity == 0 {
            return Err("cache.max_capacity must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        let path = config_path.unwrap_or("config.toml");
        builder = builder.add_source(File::with_name(path).required(false));

        // PERFBOARD__SERVER__PORT=3001, PERFBOARD__BITRIX__WEBHOOK_URL=..., etc.
        builder = builder.add_source(
            Environment::with_prefix("PERFBOARD")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
