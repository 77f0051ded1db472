//! Core types for the dispatch engine (JSON contracts + internal models).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::DecisionRecord;

// ---------------------------------------------------------------------------
// Inbound types (what the reporting surface sends)
// ---------------------------------------------------------------------------

/// A newly reported incident. Unknown fields are silently ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundIncident {
  pub id: String,
  #[serde(rename = "type")]
  pub incident_type: String,
  pub latitude: f64,
  pub longitude: f64,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub description: String,
  pub severity: String,
  #[serde(default)]
  pub created_at: Option<String>,
}

/// A responder record as held by the registration workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundResponder {
  pub id: String,
  pub specialization: String,
  pub latitude: f64,
  pub longitude: f64,
  pub status: String,
  #[serde(default)]
  pub current_load: u32,
  #[serde(default)]
  pub last_active_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Enumerations (normalized)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
  Medical,
  Police,
  Fire,
  Traffic,
  General,
}

impl Specialization {
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "medical" | "ambulance" | "health" => Some(Self::Medical),
      "police" | "law_enforcement" => Some(Self::Police),
      "fire" | "fire_department" => Some(Self::Fire),
      "traffic" => Some(Self::Traffic),
      "general" => Some(Self::General),
      _ => None,
    }
  }
}

/// Reported incident category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
  Medical,
  Fire,
  Police,
  Traffic,
  Other,
}

impl IncidentType {
  /// Closed lookup over the labels the reporting forms use; anything else is `Other`.
  pub fn from_str_loose(s: &str) -> Self {
    let label = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
    match label.as_str() {
      "medical" | "medical emergency" | "ambulance" | "injury" => Self::Medical,
      "fire" | "fire emergency" | "fire outbreak" => Self::Fire,
      "police" | "crime" | "theft" | "assault" | "security" => Self::Police,
      "traffic" | "traffic accident" | "accident" | "road accident" | "car accident" => {
        Self::Traffic
      }
      _ => Self::Other,
    }
  }

  pub fn specialization(self) -> Specialization {
    match self {
      Self::Medical => Specialization::Medical,
      Self::Fire => Specialization::Fire,
      Self::Police => Specialization::Police,
      Self::Traffic => Specialization::Traffic,
      Self::Other => Specialization::General,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Low,
  Medium,
  High,
}

impl Severity {
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "low" | "minor" => Some(Self::Low),
      "medium" | "moderate" => Some(Self::Medium),
      "high" | "critical" | "severe" => Some(Self::High),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
  Pending,
  Queued,
  Assigned,
  InProgress,
  Resolved,
  Cancelled,
}

impl IncidentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Queued => "queued",
      Self::Assigned => "assigned",
      Self::InProgress => "in_progress",
      Self::Resolved => "resolved",
      Self::Cancelled => "cancelled",
    }
  }

  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
      "pending" => Some(Self::Pending),
      "queued" => Some(Self::Queued),
      "assigned" => Some(Self::Assigned),
      "in_progress" => Some(Self::InProgress),
      "resolved" => Some(Self::Resolved),
      "cancelled" | "canceled" => Some(Self::Cancelled),
      _ => None,
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Resolved | Self::Cancelled)
  }

  /// Statuses in which the incident holds a responder.
  pub fn holds_responder(self) -> bool {
    matches!(self, Self::Assigned | Self::InProgress)
  }
}

impl fmt::Display for IncidentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderStatus {
  Available,
  Busy,
  OnBreak,
  OffDuty,
  Unavailable,
}

impl ResponderStatus {
  pub const ALL: [ResponderStatus; 5] = [
    Self::Available,
    Self::Busy,
    Self::OnBreak,
    Self::OffDuty,
    Self::Unavailable,
  ];

  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
      "available" | "active" => Some(Self::Available),
      "busy" => Some(Self::Busy),
      "on_break" | "break" => Some(Self::OnBreak),
      "off_duty" => Some(Self::OffDuty),
      "unavailable" | "inactive" => Some(Self::Unavailable),
      _ => None,
    }
  }
}

// ---------------------------------------------------------------------------
// Internal models
// ---------------------------------------------------------------------------

/// WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
  pub latitude: f64,
  pub longitude: f64,
}

impl Coordinate {
  pub fn new(latitude: f64, longitude: f64) -> Self {
    Self {
      latitude,
      longitude,
    }
  }
}

/// Canonical incident after normalization + validation.
///
/// `assigned_responder_id` is set iff the status holds a responder;
/// `queued_at` is set iff the status is `Queued`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
  pub id: String,
  pub incident_type: IncidentType,
  pub location: Coordinate,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub address: Option<String>,
  pub description: String,
  pub severity: Severity,
  pub status: IncidentStatus,
  pub assigned_responder_id: Option<String>,
  pub created_at: DateTime<Utc>,
  pub queued_at: Option<DateTime<Utc>>,
  pub assigned_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub queue_reason: Option<QueueReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Responder {
  pub id: String,
  pub specialization: Specialization,
  pub location: Coordinate,
  pub status: ResponderStatus,
  pub current_load: u32,
  pub last_active_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Status changes
// ---------------------------------------------------------------------------

/// Why an incident sits in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
  NoResponderAvailable,
  DispatchFailed,
}

/// Extra fields written alongside a status change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionFields {
  pub responder_id: Option<String>,
  pub queue_reason: Option<QueueReason>,
}

impl TransitionFields {
  pub fn assign(responder_id: &str) -> Self {
    Self {
      responder_id: Some(responder_id.to_string()),
      queue_reason: None,
    }
  }

  pub fn queue(reason: QueueReason) -> Self {
    Self {
      responder_id: None,
      queue_reason: Some(reason),
    }
  }
}

/// Result of a committed status change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
  pub incident: Incident,
  pub previous: IncidentStatus,
  /// Responder that stopped holding the incident, if any.
  pub released_responder_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Output types (what we emit)
// ---------------------------------------------------------------------------

/// Events produced to the notification port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
  IncidentAssigned {
    incident_id: String,
    responder_id: String,
  },
  IncidentQueued {
    incident_id: String,
    reason: QueueReason,
  },
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
  pub incident_id: String,
  pub assigned: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub responder_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<QueueReason>,
  pub decision: DecisionRecord,
}

impl DispatchResult {
  pub fn assigned(decision: DecisionRecord) -> Self {
    Self {
      incident_id: decision.incident_id.clone(),
      assigned: true,
      responder_id: decision.responder_id.clone(),
      reason: None,
      decision,
    }
  }

  pub fn queued(decision: DecisionRecord, reason: QueueReason) -> Self {
    Self {
      incident_id: decision.incident_id.clone(),
      assigned: false,
      responder_id: None,
      reason: Some(reason),
      decision,
    }
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for rejected input lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
