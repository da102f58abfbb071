//! Config file handling
//!
//! The core only accepts a resolved [`ClientConfig`]; this module finds the
//! JSON file, reads and writes it, and layers command-line overrides on top.

use anyhow::{bail, Context, Result};
use gatechat_core::auth::{AuthToken, Credentials};
use gatechat_core::config::{ClientConfig, GatewayConfig};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "gatechat";
const CONFIG_FILE: &str = "config.json";

/// Values passed on the command line that win over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub insecure: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.gateway.endpoint = endpoint.clone();
        }
        if self.insecure {
            config.gateway.insecure = true;
        }
    }
}

/// Reads and writes the client config file
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Use `explicit` when given, otherwise `<config dir>/gatechat/config.json`
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None => dirs::config_dir()
                .context("No config directory on this platform, pass --config")?
                .join(APP_DIR)
                .join(CONFIG_FILE),
        };
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ClientConfig> {
        let text = fs::read_to_string(&self.path).with_context(|| {
            format!(
                "Failed to read {} (run `gatechat init` to create it)",
                self.path.display()
            )
        })?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config file {}", self.path.display()))
    }

    /// Load, apply `overrides`, then validate
    pub fn load_with(&self, overrides: &Overrides) -> Result<ClientConfig> {
        let mut config = self.load()?;
        overrides.apply(&mut config);
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", self.path.display()))?;
        Ok(config)
    }

    pub fn save(&self, config: &ClientConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, text).with_context(|| format!("Failed to write {}", self.path.display()))?;
        tracing::info!("Config written to {}", self.path.display());
        Ok(())
    }

    /// Write a starter config; refuses to overwrite unless `force`
    pub fn init(&self, force: bool) -> Result<ClientConfig> {
        if self.path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", self.path.display());
        }
        let config = default_config()?;
        self.save(&config)?;
        Ok(config)
    }
}

/// Placeholder account; the user fills in the token issued by the gateway
fn default_config() -> Result<ClientConfig> {
    let user_id = std::env::var("USER").unwrap_or_else(|_| "me".to_string());
    let token = AuthToken::from_hex(&"00".repeat(32))?;
    Ok(ClientConfig::new(GatewayConfig::default(), Credentials::new(user_id, token)))
}
