//! Host configuration.

use std::time::Duration;

use crate::loader::DEFAULT_PLUGIN_ROUTE;

pub const DEFAULT_HOST_ORIGIN: &str = "http://localhost:8080";

/// Configuration for a study session host.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// How long a plugin may stay mounted without reporting (default: 60 s).
    pub completion_timeout_secs: u64,
    /// The host's own origin (default: `http://localhost:8080`).
    pub host_origin: String,
    /// Path prefix of plugin pages (default: `/api/plugin`).
    pub plugin_route: String,
    /// Base URL of the card API (default: the host origin).
    pub api_url: String,
    /// HTTP timeout for card API requests in seconds (default: 10).
    pub gateway_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            completion_timeout_secs: 60,
            host_origin: DEFAULT_HOST_ORIGIN.to_string(),
            plugin_route: DEFAULT_PLUGIN_ROUTE.to_string(),
            api_url: DEFAULT_HOST_ORIGIN.to_string(),
            gateway_timeout_secs: 10,
        }
    }
}

impl HostConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Self {
        let host_origin = std::env::var("FLASHPLAY_HOST_ORIGIN")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST_ORIGIN.to_string());

        Self {
            completion_timeout_secs: std::env::var("FLASHPLAY_COMPLETION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(60),
            plugin_route: std::env::var("FLASHPLAY_PLUGIN_ROUTE")
                .unwrap_or_else(|_| DEFAULT_PLUGIN_ROUTE.to_string()),
            api_url: std::env::var("FLASHPLAY_API_URL").unwrap_or_else(|_| host_origin.clone()),
            gateway_timeout_secs: std::env::var("FLASHPLAY_GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            host_origin,
        }
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}
