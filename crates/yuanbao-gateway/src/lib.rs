//! Yuanbao gateway - OpenAI- and Ollama-compatible front end for the
//! Yuanbao chat backend
//!
//! Requests in either dialect are reduced to a single prompt, sent to a
//! per-model backend conversation (recreated when it dies), and the
//! backend's event stream is transcoded back into the client's format.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod session;
pub mod stream;
pub mod testing;
pub mod tool_call;

pub use error::GatewayError;
