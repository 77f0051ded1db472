//! Incident lifecycle: legal status transitions and the fields they carry.
//!
//! ```text
//! pending ──► assigned ──► in_progress ──► resolved
//!    │  ▲        │              │
//!    ▼  │        ▼              ▼
//! queued ────► cancelled ◄──────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::DispatchError;
use crate::types::{Incident, IncidentStatus, StatusChange, TransitionFields};

/// Statuses reachable from `from` in one step.
pub fn allowed_targets(from: IncidentStatus) -> &'static [IncidentStatus] {
  use IncidentStatus::*;
  match from {
    Pending => &[Assigned, Queued, Cancelled],
    Queued => &[Assigned, Cancelled],
    Assigned => &[InProgress, Cancelled],
    InProgress => &[Resolved, Cancelled],
    Resolved | Cancelled => &[],
  }
}

pub fn can_transition(from: IncidentStatus, to: IncidentStatus) -> bool {
  allowed_targets(from).contains(&to)
}

pub fn check_transition(from: IncidentStatus, to: IncidentStatus) -> Result<(), DispatchError> {
  if can_transition(from, to) {
    Ok(())
  } else {
    Err(DispatchError::InvalidTransition { from, to })
  }
}

/// Apply a transition in place, keeping the responder/queue fields consistent
/// with the new status. On error the incident is left untouched.
pub fn apply(
  incident: &mut Incident,
  to: IncidentStatus,
  fields: TransitionFields,
  now: DateTime<Utc>,
) -> Result<StatusChange, DispatchError> {
  let from = incident.status;
  check_transition(from, to)?;

  let responder_id = fields.responder_id.filter(|id| !id.is_empty());
  if to == IncidentStatus::Assigned && responder_id.is_none() {
    return Err(DispatchError::validation(
      "responder_id",
      "required when assigning an incident",
    ));
  }

  let mut released_responder_id = None;
  match to {
    IncidentStatus::Assigned => {
      incident.assigned_responder_id = responder_id;
      incident.assigned_at = Some(now);
      incident.queued_at = None;
      incident.queue_reason = None;
    }
    IncidentStatus::Queued => {
      incident.queued_at = Some(now);
      incident.queue_reason = fields.queue_reason;
    }
    terminal if terminal.is_terminal() => {
      released_responder_id = incident.assigned_responder_id.take();
      incident.queued_at = None;
      incident.queue_reason = None;
    }
    _ => {}
  }
  incident.status = to;

  Ok(StatusChange {
    incident: incident.clone(),
    previous: from,
    released_responder_id,
  })
}
