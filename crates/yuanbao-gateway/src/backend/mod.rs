//! Backend (Yuanbao) access layer
//!
//! - [`client`]: session creation and chat-send calls
//! - [`wire`]: line framing and decoding of the backend's event stream
//! - [`classify`]: heuristic detection of dead conversations

pub mod classify;
mod client;
pub mod wire;

pub use classify::{SessionInvalidClassifier, is_session_invalid};
pub use client::{BackendClient, HttpBackendClient};
pub use wire::{LineStream, VendorEvent, VendorEventStream, byte_lines, decode_line, vendor_events};
