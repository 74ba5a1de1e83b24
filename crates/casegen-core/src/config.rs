use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the generation and history service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Seconds allowed to establish a connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Seconds allowed for a whole request, including the streamed body.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Session cookie forwarded verbatim to the service.
    #[serde(default)]
    pub session_cookie: Option<String>,
    /// Maximum number of history records requested per listing.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    300
}

fn default_history_limit() -> u32 {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            session_cookie: None,
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRoot {
    #[serde(default)]
    pub client: ClientConfig,
}
