//! Resolved client configuration
//!
//! The front-end's config manager reads and writes this structure; the core
//! only ever receives an already loaded value.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auth::Credentials;
use crate::channel::ChannelConfig;
use crate::error::{CoreError, Result};
use crate::retry::{RetryConfig, RetryPreset};
use crate::store::SettingsState;

/// Gateway endpoint and TLS pinning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// `host:port` of the gateway's QUIC listener
    pub endpoint: String,
    /// TLS server name
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Pinned SHA-256 certificate fingerprint ("AA:BB:..." or plain hex)
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Skip certificate verification entirely (development only)
    #[serde(default)]
    pub insecure: bool,
}

fn default_server_name() -> String {
    "gatechat-gateway".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:7443".to_string(),
            server_name: default_server_name(),
            fingerprint: None,
            insecure: false,
        }
    }
}

/// Real-time channel timings, in milliseconds for config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub heartbeat_interval_ms: u64,
    pub idle_timeout_ms: u64,
    pub reconnect_initial_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub reconnect_multiplier: f64,
    pub reconnect_jitter: bool,
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 15_000,
            idle_timeout_ms: 120_000,
            reconnect_initial_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            reconnect_multiplier: 2.0,
            reconnect_jitter: true,
            max_reconnect_attempts: None,
        }
    }
}

impl ChannelSettings {
    /// Convert to the channel manager's runtime configuration
    pub fn to_channel_config(&self, credentials: Credentials) -> ChannelConfig {
        ChannelConfig {
            credentials,
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            reconnect_initial_delay: Duration::from_millis(self.reconnect_initial_delay_ms),
            reconnect_max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
            reconnect_multiplier: self.reconnect_multiplier,
            reconnect_jitter: self.reconnect_jitter,
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }
}

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub gateway: GatewayConfig,
    pub credentials: Credentials,
    #[serde(default)]
    pub channel: ChannelSettings,
    #[serde(default)]
    pub retry: RetryPreset,
    #[serde(default)]
    pub settings: SettingsState,
}

impl ClientConfig {
    pub fn new(gateway: GatewayConfig, credentials: Credentials) -> Self {
        Self {
            gateway,
            credentials,
            channel: ChannelSettings::default(),
            retry: RetryPreset::default(),
            settings: SettingsState::default(),
        }
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.gateway.endpoint.trim().is_empty() {
            return Err(CoreError::InvalidConfig("gateway.endpoint cannot be empty".into()));
        }
        if self.credentials.user_id.trim().is_empty() {
            return Err(CoreError::InvalidConfig("credentials.user_id cannot be empty".into()));
        }
        if self.channel.heartbeat_interval_ms == 0 {
            return Err(CoreError::InvalidConfig("channel.heartbeat_interval_ms must be > 0".into()));
        }
        if self.channel.idle_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig("channel.idle_timeout_ms must be > 0".into()));
        }
        if self.channel.reconnect_initial_delay_ms > self.channel.reconnect_max_delay_ms {
            return Err(CoreError::InvalidConfig(
                "channel.reconnect_initial_delay_ms exceeds reconnect_max_delay_ms".into(),
            ));
        }
        if !(self.channel.reconnect_multiplier >= 1.0) {
            return Err(CoreError::InvalidConfig("channel.reconnect_multiplier must be >= 1.0".into()));
        }
        if self.settings.page_size == 0 {
            return Err(CoreError::InvalidConfig("settings.page_size must be > 0".into()));
        }
        Ok(())
    }

    /// Channel manager configuration for this account
    pub fn channel_config(&self) -> ChannelConfig {
        self.channel.to_channel_config(self.credentials.clone())
    }

    /// Retry policy for remote calls
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthToken;

    fn config() -> ClientConfig {
        ClientConfig::new(
            GatewayConfig::default(),
            Credentials::new("alice", AuthToken::from_hex(&"01".repeat(32)).unwrap()),
        )
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let mut cfg = config();
        cfg.gateway.endpoint = "  ".into();
        assert!(matches!(cfg.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let mut cfg = config();
        cfg.channel.heartbeat_interval_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_multiplier_below_one_rejected() {
        let mut cfg = config();
        cfg.channel.reconnect_multiplier = 0.5;
        assert!(cfg.validate().is_err());
        cfg.channel.reconnect_multiplier = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let json = format!(
            r#"{{"gateway":{{"endpoint":"10.0.0.2:7443"}},"credentials":{{"user_id":"bob","token":"{}"}}}}"#,
            "ff".repeat(32)
        );
        let cfg: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.gateway.server_name, "gatechat-gateway");
        assert_eq!(cfg.channel, ChannelSettings::default());
        assert_eq!(cfg.retry, RetryPreset::Standard);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_channel_config_conversion() {
        let cfg = config();
        let channel = cfg.channel_config();
        assert_eq!(channel.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(channel.reconnect_max_delay, Duration::from_secs(30));
        assert_eq!(channel.max_reconnect_attempts, None);
        assert_eq!(channel.credentials.user_id, "alice");
    }
}
