//! Delivery targets for fired jobs.
//!
//! The scheduler never inspects a recipient; executors declare which kinds
//! they accept. Adding a kind means adding a variant here and an executor
//! that accepts it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// HTTP callback target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRecipient {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query_params: HashMap<String, String>,
    /// Body sent on delivery, if any
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

fn default_method() -> String {
    "POST".to_string()
}

impl HttpRecipient {
    /// Create a POST recipient for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: HashMap::new(),
            query_params: HashMap::new(),
            payload: None,
        }
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Where and how a fired job is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recipient {
    Http(HttpRecipient),
}

impl Recipient {
    /// Stable kind name used for executor selection and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Recipient::Http(_) => "http",
        }
    }

    /// Shorthand for an HTTP POST recipient.
    pub fn http(url: impl Into<String>) -> Self {
        Recipient::Http(HttpRecipient::new(url))
    }
}
