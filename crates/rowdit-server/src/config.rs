use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

use rowdit_api::ApiConfig;

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    /// In-memory sessions when unset.
    pub redis_url: Option<String>,
    pub api: ApiConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = env_or("ROWDIT_HOST", "0.0.0.0");
        let port: u16 = env_or("ROWDIT_PORT", "7777")
            .parse()
            .context("ROWDIT_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

        let production = std::env::var("ROWDIT_PRODUCTION")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let defaults = ApiConfig::default();
        let api = ApiConfig {
            cookie_name: env_or("ROWDIT_COOKIE_NAME", &defaults.cookie_name),
            // Cookie only works over https
            secure_cookies: production,
            frontend_url: env_or("ROWDIT_FRONTEND_URL", &defaults.frontend_url),
            ..defaults
        };

        Ok(Self {
            addr,
            db_path: env_or("ROWDIT_DB_PATH", "rowdit.db").into(),
            redis_url: std::env::var("ROWDIT_REDIS_URL").ok().filter(|v| !v.is_empty()),
            api,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
