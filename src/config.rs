use config::{Config, ConfigError, Environment, File};
use reqwest::Url;
use serde::{self, de, Deserialize, Deserializer};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::args::Args;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    pub ttl_ms: u64,
    pub sweep_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    #[serde(deserialize_with = "deserialize_and_validate_url")]
    pub upstream: Url,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        // a zero period would make the interval timer panic
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl AppConfig {
    /// Layers, lowest first: command line flags, config file, environment.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", args.bind.clone())?
            .set_default("server.port", i64::from(args.port))?
            .set_default("cache.ttl_ms", i64::from(args.ttl_ms))?
            .set_default("cache.sweep_interval_ms", i64::from(args.sweep_interval_ms))?;

        if let Some(config_file) = &args.config {
            builder = builder.add_source(File::with_name(config_file));
        }

        let mut cfg: AppConfig = builder
            .add_source(Environment::with_prefix(&env_prefix()).separator("__"))
            .build()?
            .try_deserialize()?;

        cfg.chains.extend(
            args.endpoints
                .iter()
                .map(|(chain_id, upstream)| ChainConfig {
                    chain_id: *chain_id,
                    upstream: upstream.clone(),
                }),
        );

        Ok(cfg)
    }
}

// Upper-cased binary name
fn env_prefix() -> String {
    env::args()
        .next()
        .and_then(|path| {
            Path::new(&path)
                .file_name()
                .map(|os_str| os_str.to_str().unwrap_or_default().to_string())
        })
        .unwrap_or_else(|| "DEFAULT".to_string())
        .replace('-', "_")
        .to_ascii_uppercase()
}

fn deserialize_and_validate_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: Deserializer<'de>,
{
    let url_str = String::deserialize(deserializer)?;

    Url::from_str(&url_str).map_err(|_| de::Error::custom(format!("Invalid URL: {}", url_str)))
}
