//! Backend credential headers
//!
//! The backend authenticates with browser cookies and friends. They are kept
//! in a flat `key: value` file and merged over a small default header set.
//! The resulting map is handed to the backend client as-is.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::path::Path;

use crate::error::{GatewayError, Result};

const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "user-agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36 Edg/133.0.0.0",
    ),
    ("accept", "application/json, text/plain, */*"),
    ("content-type", "application/json"),
    ("origin", "https://tencent.yuanbao"),
    ("referer", "https://tencent.yuanbao/"),
    ("x-requested-with", "XMLHttpRequest"),
];

/// Ready-made header set used for every backend call
#[derive(Debug, Clone)]
pub struct BackendHeaders {
    headers: HeaderMap,
}

impl BackendHeaders {
    /// Default headers merged with `key: value` pairs from `content`
    pub fn from_lines(content: &str) -> Result<Self> {
        let mut headers = default_header_map();
        for (key, value) in parse_header_lines(content) {
            let name = HeaderName::from_bytes(key.to_ascii_lowercase().as_bytes())
                .map_err(|e| GatewayError::Config(format!("Invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| GatewayError::Config(format!("Invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }
        Ok(Self { headers })
    }

    /// Load the header file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!(
                "Failed to read header file {}: {}",
                path.display(),
                e
            ))
        })?;
        let headers = Self::from_lines(&content)?;
        tracing::info!(
            "Loaded {} backend headers from {}",
            headers.len(),
            path.display()
        );
        Ok(headers)
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

fn default_header_map() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in DEFAULT_HEADERS {
        headers.insert(*name, HeaderValue::from_static(*value));
    }
    headers
}

/// Parse a flat header file into `(key, value)` pairs
///
/// Blank lines and `#` comments are skipped, as are lines without a colon.
/// Only the first colon separates key from value.
pub fn parse_header_lines(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
