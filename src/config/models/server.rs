//! Server identity configuration

use super::*;
use serde::{Deserialize, Serialize};

/// Identity of this relay, stamped onto every outbound payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Public URL of the server
    #[serde(default = "default_server_url")]
    pub url: String,
    /// API key forwarded as `apikey` in main payloads
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            api_key: None,
        }
    }
}
