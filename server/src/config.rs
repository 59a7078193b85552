// environment configuration

use anyhow::{Context, Result};
use std::{env, net::SocketAddr, path::PathBuf};
use url::Url;

/// Everything the process reads from the environment, resolved once at
/// startup. A missing mandatory variable is an unrecoverable configuration
/// error (exit code 1).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// operator bearer token
    pub api_token: String,
    /// secret for plugin -> core webhooks
    pub server_token: String,
    /// optional; absence disables /api/steam/resolve
    pub steam_api_key: Option<String>,
    /// public base URL the plugin uses to reach the core
    pub base_url: String,
    pub data_dir: PathBuf,
    pub demo_dir: PathBuf,
    pub listen_addr: SocketAddr,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set. Hint: did you run dotenv()?"))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = required("BASE_URL")?;
        // validate early: the plugin will dial this
        Url::parse(&base_url).with_context(|| format!("BASE_URL {base_url:?} is not a URL"))?;
        let listen_addr = optional("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .context("LISTEN_ADDR must be host:port")?;

        Ok(AppConfig {
            api_token: required("API_TOKEN")?,
            server_token: required("SERVER_TOKEN")?,
            steam_api_key: optional("STEAM_API_KEY"),
            base_url: base_url.trim_end_matches('/').to_string(),
            data_dir: optional("DATA_DIR").unwrap_or_else(|| "./data".into()).into(),
            demo_dir: optional("DEMO_DIR").unwrap_or_else(|| "./demos".into()).into(),
            listen_addr,
        })
    }
}
