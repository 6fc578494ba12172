//! Send-with-recovery around the backend
//!
//! A conversation can die on the backend at any time. When a send fails with
//! an error that looks like a dead conversation, the session is replaced and
//! the send is repeated, up to `max_retries` times.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::{
    BackendClient, SessionInvalidClassifier, VendorEventStream, is_session_invalid, vendor_events,
};
use crate::error::{GatewayError, Result};
use crate::models;
use crate::session::SessionStore;

/// Recovery state for one client request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Retries performed so far
    pub attempt: u32,
    /// Next iteration must replace the session
    pub force_recreate: bool,
    /// Conversation id that was found dead
    pub stale_id: Option<String>,
}

/// Drives session lookup, chat sends and recovery for a single request
pub struct RetryOrchestrator {
    store: Arc<SessionStore>,
    backend: Arc<dyn BackendClient>,
    max_retries: u32,
    classifier: SessionInvalidClassifier,
}

impl RetryOrchestrator {
    pub fn new(store: Arc<SessionStore>, backend: Arc<dyn BackendClient>, max_retries: u32) -> Self {
        Self::with_classifier(store, backend, max_retries, is_session_invalid)
    }

    /// Use a custom session-invalid classifier
    pub fn with_classifier(
        store: Arc<SessionStore>,
        backend: Arc<dyn BackendClient>,
        max_retries: u32,
        classifier: SessionInvalidClassifier,
    ) -> Self {
        Self {
            store,
            backend,
            max_retries,
            classifier,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Send `prompt` to `model` and return the decoded event stream
    pub async fn send(&self, model: &str, prompt: &str) -> Result<VendorEventStream> {
        let spec = models::lookup(model)
            .ok_or_else(|| GatewayError::Config(format!("Unknown model '{model}'")))?;

        let mut state = RetryState::default();
        loop {
            let conversation_id = match (&state.stale_id, state.force_recreate) {
                (Some(stale), true) => self.store.renew(model, stale).await?,
                _ => self.store.get_or_create(model, false).await?,
            };

            debug!(
                "Sending to {} via session {} (retry {}/{})",
                model, conversation_id, state.attempt, self.max_retries
            );

            match self
                .backend
                .send_chat(spec.chat_model_id, &conversation_id, prompt)
                .await
            {
                Ok(lines) => return Ok(vendor_events(lines)),
                Err(GatewayError::Backend(message))
                    if state.attempt < self.max_retries && (self.classifier)(&message) =>
                {
                    warn!(
                        "Session {} for {} looks invalid ({}), recreating (retry {}/{})",
                        conversation_id,
                        model,
                        message,
                        state.attempt + 1,
                        self.max_retries
                    );
                    self.store.invalidate_if(model, &conversation_id).await;
                    state.force_recreate = true;
                    state.stale_id = Some(conversation_id);
                    state.attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        error_type = e.category(),
                        error_message = %e,
                        "Chat send to {} failed",
                        model
                    );
                    return Err(e);
                }
            }
        }
    }
}

impl std::fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("store", &self.store)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
