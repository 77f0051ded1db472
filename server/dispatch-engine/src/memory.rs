//! In-process adapters for the dispatch ports.
//!
//! Used by the binary and by tests. Each store keeps its records behind one
//! mutex, so every read sees the latest write and the capacity check in
//! `increment_load` is a compare-and-swap relative to concurrent callers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use crate::error::DispatchError;
use crate::ports::{IncidentStore, NotificationPort, ResponderDirectory};
use crate::state;
use crate::types::{
  DispatchEvent, Incident, IncidentStatus, Responder, ResponderStatus, Specialization,
  StatusChange, TransitionFields,
};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, DispatchError> {
  mutex
    .lock()
    .map_err(|_| DispatchError::unavailable(format!("{what} lock poisoned")))
}

// ---------------------------------------------------------------------------
// Responders
// ---------------------------------------------------------------------------

struct Entry {
  responder: Responder,
  /// Incidents this responder is currently charged for.
  holding: BTreeSet<String>,
}

#[derive(Default)]
pub struct InMemoryResponderDirectory {
  responders: Mutex<BTreeMap<String, Entry>>,
}

impl InMemoryResponderDirectory {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert or replace a responder record (registration/approval workflow).
  /// Incidents already charged to an existing record stay charged.
  pub fn upsert(&self, responder: Responder) -> Result<(), DispatchError> {
    let mut responders = lock(&self.responders, "responder")?;
    let holding = responders
      .remove(&responder.id)
      .map(|e| e.holding)
      .unwrap_or_default();
    responders.insert(responder.id.clone(), Entry { responder, holding });
    Ok(())
  }

  pub fn snapshot(&self) -> Result<Vec<Responder>, DispatchError> {
    Ok(
      lock(&self.responders, "responder")?
        .values()
        .map(|e| e.responder.clone())
        .collect(),
    )
  }
}

fn entry_mut<'a>(
  responders: &'a mut BTreeMap<String, Entry>,
  responder_id: &str,
) -> Result<&'a mut Entry, DispatchError> {
  responders
    .get_mut(responder_id)
    .ok_or_else(|| DispatchError::not_found("responder", responder_id))
}

#[async_trait]
impl ResponderDirectory for InMemoryResponderDirectory {
  async fn find_eligible(
    &self,
    specialization: Specialization,
    exclude_statuses: &[ResponderStatus],
  ) -> Result<Vec<Responder>, DispatchError> {
    let responders = lock(&self.responders, "responder")?;
    Ok(
      responders
        .values()
        .map(|e| &e.responder)
        .filter(|r| r.specialization == specialization && !exclude_statuses.contains(&r.status))
        .cloned()
        .collect(),
    )
  }

  async fn get(&self, responder_id: &str) -> Result<Responder, DispatchError> {
    lock(&self.responders, "responder")?
      .get(responder_id)
      .map(|e| e.responder.clone())
      .ok_or_else(|| DispatchError::not_found("responder", responder_id))
  }

  async fn increment_load(
    &self,
    responder_id: &str,
    incident_id: &str,
    capacity: u32,
  ) -> Result<Responder, DispatchError> {
    let mut responders = lock(&self.responders, "responder")?;
    let entry = entry_mut(&mut responders, responder_id)?;
    if entry.holding.contains(incident_id) {
      return Ok(entry.responder.clone());
    }
    if entry.responder.current_load >= capacity {
      return Err(DispatchError::conflict(responder_id));
    }
    entry.holding.insert(incident_id.to_string());
    entry.responder.current_load += 1;
    Ok(entry.responder.clone())
  }

  async fn decrement_load(
    &self,
    responder_id: &str,
    incident_id: &str,
  ) -> Result<Responder, DispatchError> {
    let mut responders = lock(&self.responders, "responder")?;
    let entry = entry_mut(&mut responders, responder_id)?;
    if entry.holding.remove(incident_id) {
      entry.responder.current_load = entry.responder.current_load.saturating_sub(1);
    }
    Ok(entry.responder.clone())
  }

  async fn set_status(
    &self,
    responder_id: &str,
    status: ResponderStatus,
  ) -> Result<(), DispatchError> {
    let mut responders = lock(&self.responders, "responder")?;
    entry_mut(&mut responders, responder_id)?.responder.status = status;
    Ok(())
  }
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryIncidentStore {
  incidents: Mutex<BTreeMap<String, Incident>>,
}

impl InMemoryIncidentStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a newly reported incident. Ids are never reused.
  pub fn insert(&self, incident: Incident) -> Result<(), DispatchError> {
    let mut incidents = lock(&self.incidents, "incident")?;
    if incidents.contains_key(&incident.id) {
      return Err(DispatchError::validation("id", "incident already exists"));
    }
    incidents.insert(incident.id.clone(), incident);
    Ok(())
  }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
  async fn get(&self, incident_id: &str) -> Result<Incident, DispatchError> {
    lock(&self.incidents, "incident")?
      .get(incident_id)
      .cloned()
      .ok_or_else(|| DispatchError::not_found("incident", incident_id))
  }

  async fn set_status(
    &self,
    incident_id: &str,
    status: IncidentStatus,
    fields: TransitionFields,
  ) -> Result<StatusChange, DispatchError> {
    let mut incidents = lock(&self.incidents, "incident")?;
    let incident = incidents
      .get_mut(incident_id)
      .ok_or_else(|| DispatchError::not_found("incident", incident_id))?;
    state::apply(incident, status, fields, Utc::now())
  }

  async fn list_by_status(&self, status: IncidentStatus) -> Result<Vec<Incident>, DispatchError> {
    Ok(
      lock(&self.incidents, "incident")?
        .values()
        .filter(|i| i.status == status)
        .cloned()
        .collect(),
    )
  }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Forwards events onto an unbounded channel; the consumer decides delivery.
#[derive(Clone)]
pub struct ChannelNotifier {
  tx: mpsc::UnboundedSender<DispatchEvent>,
}

impl ChannelNotifier {
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<DispatchEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }
}

#[async_trait]
impl NotificationPort for ChannelNotifier {
  async fn emit(&self, event: DispatchEvent) -> Result<(), DispatchError> {
    self
      .tx
      .send(event)
      .map_err(|_| DispatchError::Notify("event receiver dropped".into()))
  }
}
