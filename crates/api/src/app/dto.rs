//! Request/response bodies of the admin surface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of an administrative call: a fixed success text or the error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn from_result<E: std::fmt::Display>(result: Result<(), E>, success: &str) -> Self {
        let message = match result {
            Ok(()) => success.to_string(),
            Err(e) => e.to_string(),
        };
        Self { message }
    }
}

/// `POST /jobs/update` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    pub name: String,
    #[serde(default)]
    pub trigger_expression: String,
    /// Number or numeric string; some admin clients send either.
    #[serde(default)]
    pub batch_limit: serde_json::Value,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid batch limit {value}: {reason}")]
pub struct BatchLimitError {
    pub value: String,
    pub reason: String,
}

impl UpdateJobRequest {
    /// `None` keeps the current limit (absent or zero).
    pub fn batch_limit(&self) -> Result<Option<u32>, BatchLimitError> {
        let raw = match &self.batch_limit {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        };

        let limit = raw.parse::<u32>().map_err(|e| BatchLimitError {
            value: raw.clone(),
            reason: e.to_string(),
        })?;
        Ok((limit > 0).then_some(limit))
    }
}
