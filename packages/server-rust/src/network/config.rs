//! Network configuration for the HTTP adapter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 4280;

/// Listener and HTTP-layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins. `"*"` allows any.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete, in seconds.
    pub request_timeout_secs: u64,
    /// Route prefix for the admin endpoints.
    pub admin_prefix: String,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            cors_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            admin_prefix: "/__mock".to_string(),
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

impl NetworkConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `host:port` string suitable for binding.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Admin prefix normalized to start with `/` and not end with one.
    #[must_use]
    pub fn admin_prefix(&self) -> String {
        let trimmed = self.admin_prefix.trim_matches('/');
        if trimmed.is_empty() {
            "/__mock".to_string()
        } else {
            format!("/{trimmed}")
        }
    }
}
