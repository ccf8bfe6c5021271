//! Unified gateway error model and mapping helpers.
//! This module provides the closed error taxonomy used across the RPC client,
//! session store, broker and HTTP handlers, along with the HTTP status mapping.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayError {
    /// Missing or malformed caller input; never retried.
    Validation { message: String },
    /// Backend rejected credentials, or the session cookie is missing/invalid/expired.
    Auth { message: String },
    /// Retry budget against the backend exhausted on transport timeouts.
    GatewayTimeout { attempts: u32, message: String },
    /// Backend answered with a JSON-RPC error field; a logical error, never retried.
    Backend { message: String },
    /// Session store or network layer unreachable for reasons other than timeout.
    Infrastructure { message: String },
}

impl GatewayError {
    pub fn validation<S: Into<String>>(msg: S) -> Self { GatewayError::Validation { message: msg.into() } }
    pub fn auth<S: Into<String>>(msg: S) -> Self { GatewayError::Auth { message: msg.into() } }
    pub fn backend<S: Into<String>>(msg: S) -> Self { GatewayError::Backend { message: msg.into() } }
    pub fn infra<S: Into<String>>(msg: S) -> Self { GatewayError::Infrastructure { message: msg.into() } }

    pub fn timeout(attempts: u32) -> Self {
        GatewayError::GatewayTimeout {
            attempts,
            message: format!(
                "request timeout after {} attempts; backend is taking too long to respond",
                attempts
            ),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Validation { message }
            | GatewayError::Auth { message }
            | GatewayError::GatewayTimeout { message, .. }
            | GatewayError::Backend { message }
            | GatewayError::Infrastructure { message } => message.as_str(),
        }
    }

    /// Stable machine-readable kind tag, mirrored in JSON responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation { .. } => "validation",
            GatewayError::Auth { .. } => "auth",
            GatewayError::GatewayTimeout { .. } => "gateway_timeout",
            GatewayError::Backend { .. } => "backend",
            GatewayError::Infrastructure { .. } => "infrastructure",
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::Validation { .. } => 400,
            GatewayError::Auth { .. } => 401,
            GatewayError::GatewayTimeout { .. } => 504,
            GatewayError::Backend { .. } => 500,
            GatewayError::Infrastructure { .. } => 503,
        }
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for GatewayError {}

pub type GatewayResult<T> = Result<T, GatewayError>;
