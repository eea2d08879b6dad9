//! Client configuration.
//!
//! Values come from an optional TOML file overlaid with `PRISM_`-prefixed
//! environment variables (`PRISM_ENDPOINT`, `PRISM_AUTH_TOKEN`, ...).
//! Connection gating and token refresh live with the caller's auth layer;
//! this config only carries what the transport itself needs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default keepalive ping interval.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 30;

/// Default cap on envelopes drained per delivery flush.
pub const DEFAULT_DELIVERY_BATCH_MAX: usize = 256;

/// Configuration for one client connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `wss://api.example.com/ws`.
    pub endpoint: String,

    /// Bearer token attached to the connection request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Keepalive ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Maximum envelopes drained per delivery flush.
    #[serde(default = "default_delivery_batch_max")]
    pub delivery_batch_max: usize,
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_SECS
}

fn default_delivery_batch_max() -> usize {
    DEFAULT_DELIVERY_BATCH_MAX
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:3000/ws".to_string(),
            auth_token: None,
            ping_interval_secs: DEFAULT_PING_INTERVAL_SECS,
            delivery_batch_max: DEFAULT_DELIVERY_BATCH_MAX,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the default file location and environment.
    ///
    /// Missing file is fine; `PRISM_*` environment variables always win.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_config_path())
    }

    /// Load configuration from an explicit file path (optional) plus the
    /// environment.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("PRISM"))
            .build()
            .context("building client configuration")?;

        settings
            .try_deserialize()
            .context("deserializing client configuration")
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("prism").join("client.toml"))
    }
}
