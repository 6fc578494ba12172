mod headers;

pub use headers::{BackendHeaders, parse_header_lines};

use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for the gateway
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Backend (Yuanbao) configuration
    #[serde(default)]
    pub backend: BackendConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:9999")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:9999".to_string()
}

/// Backend connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Flat `key: value` file holding the credential headers
    #[serde(default = "default_headers_file")]
    pub headers_file: PathBuf,
    /// `agentId` sent with every chat request
    #[serde(default = "default_agent_id")]
    pub agent_id: String,
    /// `docOpenid` sent with every chat request
    #[serde(default = "default_doc_openid")]
    pub doc_openid: String,
    /// Backend engine name sent as `model`
    #[serde(default = "default_engine_model")]
    pub engine_model: String,
    /// Timeout for session creation and for chat-send response headers
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Timeout for each read from the chat stream
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Session recreations allowed per request after an invalid session
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Skip TLS certificate verification
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            headers_file: default_headers_file(),
            agent_id: default_agent_id(),
            doc_openid: default_doc_openid(),
            engine_model: default_engine_model(),
            request_timeout_secs: default_request_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            max_retries: default_max_retries(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

fn default_base_url() -> String {
    "https://yuanbao.tencent.com".to_string()
}

fn default_headers_file() -> PathBuf {
    PathBuf::from("yuanbao_model_sessions.txt")
}

fn default_agent_id() -> String {
    "naQivTmsDa".to_string()
}

fn default_doc_openid() -> String {
    "144115210554304601".to_string()
}

fn default_engine_model() -> String {
    "gpt_175B_0404".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_read_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    1
}

fn default_accept_invalid_certs() -> bool {
    true
}
