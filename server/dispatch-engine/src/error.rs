//! Structured error types for the dispatch engine.

use thiserror::Error;

use crate::types::IncidentStatus;

#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("invalid transition: {from} -> {to}")]
  InvalidTransition {
    from: IncidentStatus,
    to: IncidentStatus,
  },

  #[error("store unavailable: {0}")]
  StoreUnavailable(String),

  #[error("concurrency conflict on responder {responder_id}")]
  ConcurrencyConflict { responder_id: String },

  #[error("timed out: {op}")]
  Timeout { op: &'static str },

  #[error("not found: {kind} {id}")]
  NotFound { kind: &'static str, id: String },

  #[error("notify: {0}")]
  Notify(String),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),
}

impl DispatchError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn unavailable(msg: impl Into<String>) -> Self {
    Self::StoreUnavailable(msg.into())
  }

  pub fn conflict(responder_id: &str) -> Self {
    Self::ConcurrencyConflict {
      responder_id: responder_id.to_string(),
    }
  }

  pub fn not_found(kind: &'static str, id: &str) -> Self {
    Self::NotFound {
      kind,
      id: id.to_string(),
    }
  }

  /// Transient failures the dispatcher may retry with a refreshed view.
  /// Contract violations and malformed data are never retried.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      Self::StoreUnavailable(_) | Self::ConcurrencyConflict { .. } | Self::Timeout { .. }
    )
  }
}
