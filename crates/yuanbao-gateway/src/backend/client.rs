//! Backend HTTP client
//!
//! Two calls matter: creating a conversation and posting a chat message to
//! it. Everything else (framing, decoding) happens on the returned lines.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::wire::{LineStream, byte_lines};
use crate::config::{BackendConfig, BackendHeaders};
use crate::error::{GatewayError, Result};

/// Content type the chat endpoint expects for its JSON body
const CHAT_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

/// Page size sent with session creation
const SESSION_PAGE_LIMIT: u32 = 30;

/// Operations the gateway needs from the backend
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Create a new conversation and return its id
    async fn create_session(&self, chat_model_id: &str) -> Result<String>;

    /// Post `prompt` to an existing conversation and return the raw response lines
    async fn send_chat(
        &self,
        chat_model_id: &str,
        conversation_id: &str,
        prompt: &str,
    ) -> Result<LineStream>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    conversation_id: String,
    limit: u32,
    offset: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    agent_id: &'a str,
    display_prompt: &'a str,
    support_functions: [&'static str; 1],
    version: &'static str,
    doc_openid: &'a str,
    multimedia: [(); 0],
    plugin: &'static str,
    support_hint: u8,
    display_prompt_type: u8,
    options: ChatOptions,
    model: &'a str,
    chat_model_id: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatOptions {
    image_intention: ImageIntention,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageIntention {
    need_intention_model: bool,
    backend_update_flag: u8,
    intention_status: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            image_intention: ImageIntention {
                need_intention_model: true,
                backend_update_flag: 2,
                intention_status: true,
            },
        }
    }
}

/// `reqwest`-backed client for the Yuanbao web API
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    client: Client,
    base_url: Url,
    agent_id: String,
    doc_openid: String,
    engine_model: String,
    headers: Option<BackendHeaders>,
    request_timeout: Duration,
    read_timeout: Duration,
}

impl HttpBackendClient {
    /// Build a client from configuration
    ///
    /// `headers` is the credential set; without it every call fails with a
    /// configuration error, but the client itself can still be built.
    pub fn new(config: &BackendConfig, headers: Option<BackendHeaders>) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| {
            GatewayError::Config(format!("Invalid backend base URL '{}': {e}", config.base_url))
        })?;

        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "Backend client initialized for {} (credentials: {})",
            config.base_url,
            if headers.is_some() { "loaded" } else { "missing" }
        );

        Ok(Self {
            client,
            base_url,
            agent_id: config.agent_id.clone(),
            doc_openid: config.doc_openid.clone(),
            engine_model: config.engine_model.clone(),
            headers,
            request_timeout,
            read_timeout: Duration::from_secs(config.read_timeout_secs),
        })
    }

    fn headers(&self) -> Result<&BackendHeaders> {
        self.headers
            .as_ref()
            .ok_or_else(|| GatewayError::Config("no backend credential headers configured".to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::Config(format!("Invalid backend endpoint '{path}': {e}")))
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn create_session(&self, chat_model_id: &str) -> Result<String> {
        let headers = self.headers()?;
        let url = self.endpoint("api/user/agent/conversation/v1/detail")?;
        let body = CreateSessionRequest {
            conversation_id: uuid::Uuid::new_v4().to_string(),
            limit: SESSION_PAGE_LIMIT,
            offset: 0,
        };
        debug!("Creating backend session for {chat_model_id} at {url}");

        let response = self
            .client
            .post(url)
            .headers(headers.header_map().clone())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::Backend(format!(
                "Backend returned {status}: {text}"
            )));
        }

        info!(
            "Created backend session {} for {}",
            body.conversation_id, chat_model_id
        );
        Ok(body.conversation_id)
    }

    async fn send_chat(
        &self,
        chat_model_id: &str,
        conversation_id: &str,
        prompt: &str,
    ) -> Result<LineStream> {
        let headers = self.headers()?;
        let url = self.endpoint(&format!("api/chat/{conversation_id}"))?;
        let payload = ChatRequest {
            agent_id: &self.agent_id,
            display_prompt: prompt,
            support_functions: [""],
            version: "v2",
            doc_openid: &self.doc_openid,
            multimedia: [],
            plugin: "Adaptive",
            support_hint: 1,
            display_prompt_type: 1,
            options: ChatOptions::default(),
            model: &self.engine_model,
            chat_model_id,
            prompt,
        };
        let body = serde_json::to_string(&payload)
            .map_err(|e| GatewayError::Parse(format!("Failed to encode chat payload: {e}")))?;

        debug!(
            "Sending chat to {url} (model: {chat_model_id}, prompt: {} chars)",
            prompt.chars().count()
        );

        let mut header_map = headers.header_map().clone();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static(CHAT_CONTENT_TYPE));

        let request = self.client.post(url).headers(header_map).body(body).send();

        let response = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| {
                GatewayError::Backend(format!(
                    "Request timed out after {}s",
                    self.request_timeout.as_secs()
                ))
            })?
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::Backend(format!(
                "Backend returned {status}: {text}"
            )));
        }

        Ok(byte_lines(response.bytes_stream(), self.read_timeout))
    }
}

/// Map a transport failure to a backend error
///
/// The URL is stripped from the message: it contains the conversation id,
/// and the text is later matched against session-invalid keywords.
fn transport_error(e: reqwest::Error) -> GatewayError {
    let e = e.without_url();
    if e.is_timeout() {
        GatewayError::Backend(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        GatewayError::Backend(format!("Failed to connect to backend: {e}"))
    } else {
        GatewayError::Backend(format!("Backend request failed: {e}"))
    }
}
