//! Narrow interfaces to the stores and the notifier the engine runs against.
//!
//! The host process owns the concrete adapters and injects them into the
//! `Dispatcher`; the engine keeps no client singletons of its own.

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::types::{
  DispatchEvent, Incident, IncidentStatus, Responder, ResponderStatus, Specialization,
  StatusChange, TransitionFields,
};

/// Current responder records.
///
/// Implementations must give read-after-write consistency for `status` and
/// `current_load`: a successful `increment_load` is visible to the next
/// `find_eligible` from any caller.
///
/// Load is accounted per incident. Replaying an increment or decrement for
/// the same incident is a no-op, so a write whose outcome is unknown (a
/// timeout) can always be retried or compensated.
#[async_trait]
pub trait ResponderDirectory: Send + Sync {
  /// Responders of `specialization` whose status is not in `exclude_statuses`.
  async fn find_eligible(
    &self,
    specialization: Specialization,
    exclude_statuses: &[ResponderStatus],
  ) -> Result<Vec<Responder>, DispatchError>;

  async fn get(&self, responder_id: &str) -> Result<Responder, DispatchError>;

  /// Charge one unit of load for `incident_id` unless the responder is
  /// already at `capacity`, in which case `ConcurrencyConflict` is returned
  /// and nothing changes. Already charged for this incident: no change.
  async fn increment_load(
    &self,
    responder_id: &str,
    incident_id: &str,
    capacity: u32,
  ) -> Result<Responder, DispatchError>;

  /// Release the unit charged for `incident_id`. Not charged: no change.
  async fn decrement_load(
    &self,
    responder_id: &str,
    incident_id: &str,
  ) -> Result<Responder, DispatchError>;

  async fn set_status(
    &self,
    responder_id: &str,
    status: ResponderStatus,
  ) -> Result<(), DispatchError>;
}

/// Incident persistence. `set_status` enforces the lifecycle table and
/// returns `InvalidTransition` without writing anything on a bad move.
/// A returned `StoreUnavailable` means the write was not applied; after a
/// `Timeout` the caller re-reads to find out.
#[async_trait]
pub trait IncidentStore: Send + Sync {
  async fn get(&self, incident_id: &str) -> Result<Incident, DispatchError>;

  async fn set_status(
    &self,
    incident_id: &str,
    status: IncidentStatus,
    fields: TransitionFields,
  ) -> Result<StatusChange, DispatchError>;

  async fn list_by_status(&self, status: IncidentStatus) -> Result<Vec<Incident>, DispatchError>;
}

/// Outbound assignment/queue events. Delivery is someone else's problem.
#[async_trait]
pub trait NotificationPort: Send + Sync {
  async fn emit(&self, event: DispatchEvent) -> Result<(), DispatchError>;
}
