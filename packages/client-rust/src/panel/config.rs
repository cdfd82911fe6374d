//! Operational panel configuration.

use std::time::Duration;

/// HTTP settings for the diagnostics panel.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Bind address. Loopback by default: the panel is operator tooling.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Origins allowed to call the panel from a browser. Empty disables
    /// CORS; `"*"` allows any origin.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete. Probes and sweeps
    /// bound their own remote calls, so this only caps the whole request.
    pub request_timeout: Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: Vec::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}
