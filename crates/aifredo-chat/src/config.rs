//! Client configuration.
//!
//! Settings layer in the usual order: built-in defaults, then an
//! optional TOML file under the user config directory, then
//! `AIFREDO_`-prefixed environment variables. CLI flags override on
//! top of the loaded result.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::quota::FREE_DAILY_LIMIT;

const APP_NAME: &str = "aifredo";

/// Default conversation thread addressed by every chat turn.
pub const DEFAULT_SESSION_KEY: &str = "agent:main:main";

/// Everything the session client needs to reach and identify itself
/// to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway WebSocket endpoint.
    pub gateway_url: String,
    /// Opaque auth credential for the connect handshake.
    pub gateway_token: String,
    /// Base URL of the Aifredo API, for the public bot lookup.
    pub api_base: String,
    /// Stable client identifier sent in the handshake.
    pub client_id: String,
    /// Semantic version string sent in the handshake.
    pub client_version: String,
    /// Platform tag sent in the handshake.
    pub platform: String,
    /// Mode tag: `webchat` for the embedded widget, `dashboard` for
    /// the full dashboard chat.
    pub client_mode: String,
    /// Viewer locale; falls back to `en-US` when unavailable.
    pub locale: String,
    /// Session key addressing the single default conversation thread.
    pub session_key: String,
    /// Client-side daily message allowance.
    pub daily_message_limit: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
            gateway_token: String::new(),
            api_base: String::new(),
            client_id: "webchat".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: "cli".to_string(),
            client_mode: "webchat".to_string(),
            locale: detect_locale(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
            daily_message_limit: FREE_DAILY_LIMIT,
        }
    }
}

impl GatewayConfig {
    /// Load configuration, layering the optional file and environment
    /// over the defaults.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let path = match config_file {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };

        let defaults = GatewayConfig::default();
        let built = Config::builder()
            .set_default("gateway_url", defaults.gateway_url.clone())?
            .set_default("gateway_token", defaults.gateway_token.clone())?
            .set_default("api_base", defaults.api_base.clone())?
            .set_default("client_id", defaults.client_id.clone())?
            .set_default("client_version", defaults.client_version.clone())?
            .set_default("platform", defaults.platform.clone())?
            .set_default("client_mode", defaults.client_mode.clone())?
            .set_default("locale", defaults.locale.clone())?
            .set_default("session_key", defaults.session_key.clone())?
            .set_default("daily_message_limit", defaults.daily_message_limit as i64)?
            .add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("AIFREDO"))
            .build()
            .context("building configuration")?;

        let config: GatewayConfig = built
            .try_deserialize()
            .context("deserializing configuration")?;
        Ok(config)
    }

    /// Write a default config file, creating parent directories.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {parent:?}"))?;
        }
        let body = toml::to_string_pretty(&GatewayConfig::default())
            .context("serializing default config to TOML")?;
        fs::write(path, format!("# Configuration for {APP_NAME}\n\n{body}"))
            .with_context(|| format!("writing config file to {}", path.display()))
    }
}

/// The default config file location under the user config directory.
pub fn default_config_path() -> Result<PathBuf> {
    let mut dir = dirs::config_dir().context("no usable config directory on this system")?;
    dir.push(APP_NAME);
    dir.push("config.toml");
    Ok(dir)
}

fn detect_locale() -> String {
    // LANG takes the form "en_US.UTF-8"; the gateway wants "en-US".
    std::env::var("LANG")
        .ok()
        .and_then(|lang| {
            let tag = lang.split('.').next()?.replace('_', "-");
            if tag.is_empty() || tag == "C" || tag == "POSIX" {
                None
            } else {
                Some(tag)
            }
        })
        .unwrap_or_else(|| "en-US".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_product_settings() {
        let config = GatewayConfig::default();
        assert_eq!(config.client_id, "webchat");
        assert_eq!(config.client_mode, "webchat");
        assert_eq!(config.session_key, "agent:main:main");
        assert_eq!(config.daily_message_limit, 20);
        assert!(!config.locale.is_empty());
    }

    #[test]
    fn test_file_layering_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "gateway_url = \"ws://gateway.example:18789\"\nclient_mode = \"dashboard\"\n",
        )
        .unwrap();

        let config = GatewayConfig::load(Some(&path)).unwrap();
        assert_eq!(config.gateway_url, "ws://gateway.example:18789");
        assert_eq!(config.client_mode, "dashboard");
        // Untouched keys keep their defaults.
        assert_eq!(config.session_key, DEFAULT_SESSION_KEY);
    }

    #[test]
    fn test_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let config = GatewayConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.client_id, "webchat");
    }

    #[test]
    fn test_write_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        GatewayConfig::write_default(&path).unwrap();
        let config = GatewayConfig::load(Some(&path)).unwrap();
        assert_eq!(config.daily_message_limit, FREE_DAILY_LIMIT);
    }
}
