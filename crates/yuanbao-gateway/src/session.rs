//! Backend conversation registry
//!
//! Each logical model owns at most one backend conversation at a time.
//! Every model has its own async lock, held across session creation, so two
//! requests for the same model never create two conversations.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::backend::BackendClient;
use crate::error::{GatewayError, Result};
use crate::models;

/// A live backend conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    /// Logical model the conversation belongs to
    pub model: String,
    /// Backend conversation id
    pub conversation_id: String,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
}

type Slot = Arc<Mutex<Option<ConversationSession>>>;

/// Process-wide map from logical model to its current conversation
pub struct SessionStore {
    backend: Arc<dyn BackendClient>,
    slots: DashMap<String, Slot>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self {
            backend,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, model: &str) -> Slot {
        self.slots.entry(model.to_string()).or_default().clone()
    }

    /// Return the cached conversation id for `model`, creating one if needed
    ///
    /// `force_create` replaces any cached conversation unconditionally.
    pub async fn get_or_create(&self, model: &str, force_create: bool) -> Result<String> {
        let spec = models::lookup(model)
            .ok_or_else(|| GatewayError::Config(format!("Unknown model '{model}'")))?;

        let slot = self.slot(model);
        let mut guard = slot.lock().await;

        if !force_create {
            if let Some(session) = guard.as_ref() {
                debug!(
                    "Reusing session {} for {}",
                    session.conversation_id, model
                );
                return Ok(session.conversation_id.clone());
            }
        }

        let session = self.create(model, spec.chat_model_id).await?;
        let id = session.conversation_id.clone();
        *guard = Some(session);
        Ok(id)
    }

    /// Replace a conversation that was found to be dead
    ///
    /// Creates a new conversation only if the slot is empty or still holds
    /// `stale_id`. If another request already installed a replacement, that
    /// one is returned instead.
    pub async fn renew(&self, model: &str, stale_id: &str) -> Result<String> {
        let spec = models::lookup(model)
            .ok_or_else(|| GatewayError::Config(format!("Unknown model '{model}'")))?;

        let slot = self.slot(model);
        let mut guard = slot.lock().await;

        if let Some(session) = guard.as_ref() {
            if session.conversation_id != stale_id {
                debug!(
                    "Session for {} already renewed to {}",
                    model, session.conversation_id
                );
                return Ok(session.conversation_id.clone());
            }
        }

        let session = self.create(model, spec.chat_model_id).await?;
        let id = session.conversation_id.clone();
        *guard = Some(session);
        Ok(id)
    }

    /// Drop the cached conversation for `model`, if any
    pub async fn invalidate(&self, model: &str) {
        let Some(slot) = self.slots.get(model).map(|s| s.clone()) else {
            return;
        };
        if let Some(session) = slot.lock().await.take() {
            info!(
                "Invalidated session {} for {}",
                session.conversation_id, model
            );
        }
    }

    /// Drop the cached conversation only if it is still `conversation_id`
    ///
    /// Returns `true` when something was removed.
    pub async fn invalidate_if(&self, model: &str, conversation_id: &str) -> bool {
        let Some(slot) = self.slots.get(model).map(|s| s.clone()) else {
            return false;
        };
        let mut guard = slot.lock().await;
        match guard.as_ref() {
            Some(session) if session.conversation_id == conversation_id => {
                info!("Invalidated session {conversation_id} for {model}");
                *guard = None;
                true
            }
            _ => false,
        }
    }

    /// Forget every conversation
    pub fn clear_all(&self) {
        let count = self.slots.len();
        self.slots.clear();
        info!("Cleared {count} cached session slots");
    }

    /// The cached session for `model`, if any
    pub async fn current(&self, model: &str) -> Option<ConversationSession> {
        let slot = self.slots.get(model).map(|s| s.clone())?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Number of models that currently hold a conversation
    pub async fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.iter().map(|entry| entry.value().clone()).collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn create(&self, model: &str, chat_model_id: &str) -> Result<ConversationSession> {
        let conversation_id = self.backend.create_session(chat_model_id).await?;
        info!("New session {conversation_id} for {model}");
        Ok(ConversationSession {
            model: model.to_string(),
            conversation_id,
            created_at: Utc::now(),
        })
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("models", &self.slots.len())
            .finish()
    }
}
