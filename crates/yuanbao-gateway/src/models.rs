//! Logical model catalog
//!
//! The gateway exposes a fixed set of logical models. Each one is routed to
//! a backend `chatModelId`; the public ones share routing keys with the
//! private ones.

use serde::Serialize;

/// Placeholder timestamp reported for every model
const MODIFIED_AT: &str = "2024-04-25T00:00:00.000000Z";

/// Placeholder digest reported for every model
const DIGEST: &str = "sha256:0000000000000000000000000000000000000000000000000000000000000000";

/// Model served when a request does not name one
pub const DEFAULT_MODEL: &str = "deepseek_v3";

/// A logical model and its backend routing key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Name exposed to clients
    pub name: &'static str,
    /// Backend `chatModelId` routing key
    pub chat_model_id: &'static str,
}

/// The static model table
pub const MODELS: [ModelSpec; 4] = [
    ModelSpec {
        name: "deepseek_v3",
        chat_model_id: "deep_seek_v3",
    },
    ModelSpec {
        name: "deepseek_r1",
        chat_model_id: "deep_seek",
    },
    ModelSpec {
        name: "deepseek_public_v3",
        chat_model_id: "deep_seek_v3",
    },
    ModelSpec {
        name: "deepseek_public_r1",
        chat_model_id: "deep_seek",
    },
];

/// Look up a logical model by name
pub fn lookup(name: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.name == name)
}

/// Catalog entry as reported by the model listing endpoints
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelCard {
    pub name: &'static str,
    pub modified_at: &'static str,
    pub size: u64,
    pub digest: &'static str,
}

/// Catalog entries for every logical model, in table order
pub fn catalog() -> Vec<ModelCard> {
    MODELS
        .iter()
        .map(|m| ModelCard {
            name: m.name,
            modified_at: MODIFIED_AT,
            size: 0,
            digest: DIGEST,
        })
        .collect()
}
