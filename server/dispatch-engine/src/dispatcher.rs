//! Core engine: route incidents to responders, commit assignments, release on close.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::{Config, ReleasePolicy};
use crate::decision::DecisionRecord;
use crate::error::DispatchError;
use crate::geo;
use crate::normalize;
use crate::ports::{IncidentStore, NotificationPort, ResponderDirectory};
use crate::scoring::{self, RankedCandidate};
use crate::state;
use crate::types::*;

/// Statuses `route` never considers. Only `available` responders are dispatched to.
pub const EXCLUDED_STATUSES: [ResponderStatus; 4] = [
  ResponderStatus::Busy,
  ResponderStatus::OnBreak,
  ResponderStatus::OffDuty,
  ResponderStatus::Unavailable,
];

/// The dispatch engine. Holds no state between calls beyond its injected ports,
/// so clones can route concurrently.
#[derive(Clone)]
pub struct Dispatcher {
  config: Arc<Config>,
  directory: Arc<dyn ResponderDirectory>,
  incidents: Arc<dyn IncidentStore>,
  notifier: Arc<dyn NotificationPort>,
}

impl Dispatcher {
  pub fn new(
    config: Config,
    directory: Arc<dyn ResponderDirectory>,
    incidents: Arc<dyn IncidentStore>,
    notifier: Arc<dyn NotificationPort>,
  ) -> Result<Self, DispatchError> {
    config.validate()?;
    Ok(Self {
      config: Arc::new(config),
      directory,
      incidents,
      notifier,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Route a `pending` or `queued` incident to the best eligible responder.
  ///
  /// Returns `Ok` with `assigned = false` when nobody qualifies (the incident is
  /// queued) or when transient failures outlast the retry budget (queued with
  /// `dispatch_failed`). Returns `InvalidTransition` if the incident is in any
  /// other state, including when it was cancelled while routing was underway.
  pub async fn route(&self, incident: &Incident) -> Result<DispatchResult, DispatchError> {
    normalize::validate_incident(incident)?;
    ensure_routable(incident)?;

    let mut attempt = 0;
    let mut considered = 0;
    loop {
      attempt += 1;
      let err = match self.try_route(&incident.id, attempt, &mut considered).await {
        Ok(result) => return Ok(result),
        Err(e) => e,
      };

      if !err.is_retryable() {
        return Err(err);
      }
      if attempt > self.config.max_retries {
        error!(
          incident_id = %incident.id,
          attempts = attempt,
          error = %err,
          "routing gave up after retries"
        );
        return match self
          .queue_after_failure(&incident.id, considered, attempt)
          .await
        {
          Ok(result) => Ok(result),
          Err(queue_err) => {
            error!(incident_id = %incident.id, error = %queue_err, "could not queue incident");
            Err(err)
          }
        };
      }

      warn!(incident_id = %incident.id, attempt, error = %err, "routing attempt failed, retrying");
      // A lost race only needs a fresh candidate set, not a pause.
      if !matches!(err, DispatchError::ConcurrencyConflict { .. }) {
        tokio::time::sleep(self.backoff(attempt)).await;
      }
    }
  }

  /// Route every queued incident again, most severe and longest waiting first.
  /// Incidents that left the queue in the meantime are skipped.
  pub async fn redispatch_queued(&self) -> Result<Vec<DispatchResult>, DispatchError> {
    let mut queued = self
      .call("list_by_status", self.incidents.list_by_status(IncidentStatus::Queued))
      .await?;
    queued.sort_by(|a, b| {
      b.severity
        .cmp(&a.severity)
        .then_with(|| a.queued_at.cmp(&b.queued_at))
        .then_with(|| a.id.cmp(&b.id))
    });

    let mut results = Vec::with_capacity(queued.len());
    for incident in &queued {
      match self.route(incident).await {
        Ok(result) => results.push(result),
        Err(e) => warn!(incident_id = %incident.id, error = %e, "re-dispatch skipped"),
      }
    }
    info!(
      queued = queued.len(),
      assigned = results.iter().filter(|r| r.assigned).count(),
      "re-dispatch pass finished"
    );
    Ok(results)
  }

  /// Downstream status update (responder started work, resolved, reporter cancelled).
  ///
  /// Closing (`resolved`/`cancelled`) releases the held responder first and
  /// only then writes the status. If the release fails the incident stays
  /// open and the call can simply be repeated.
  pub async fn update_status(
    &self,
    incident_id: &str,
    to: IncidentStatus,
  ) -> Result<Incident, DispatchError> {
    if matches!(
      to,
      IncidentStatus::Pending | IncidentStatus::Queued | IncidentStatus::Assigned
    ) {
      return Err(DispatchError::validation(
        "status",
        "pending/queued/assigned are set by the dispatcher",
      ));
    }

    let current = self
      .call("incident_get", self.incidents.get(incident_id))
      .await?;
    state::check_transition(current.status, to)?;
    let holder = current.assigned_responder_id.filter(|_| to.is_terminal());

    let released = match &holder {
      Some(responder_id) => Some(self.release(responder_id, incident_id).await?),
      None => None,
    };

    let change = match self
      .call(
        "incident_set_status",
        self
          .incidents
          .set_status(incident_id, to, TransitionFields::default()),
      )
      .await
    {
      Ok(change) => change,
      Err(e) => {
        return self
          .settle_close(incident_id, to, holder.as_deref(), released, e)
          .await
      }
    };
    info!(incident_id, from = %change.previous, to = %to, "incident status updated");
    if change.released_responder_id != holder {
      warn!(
        incident_id,
        expected = ?holder,
        actual = ?change.released_responder_id,
        "responder changed while closing"
      );
    }

    if let Some(responder) = &released {
      self.free_if_due(responder).await;
    }
    Ok(change.incident)
  }

  /// Hard-filter and rank responders for an incident. Pure; no port calls.
  pub fn candidates(
    &self,
    incident: &Incident,
    responders: Vec<Responder>,
    now: DateTime<Utc>,
  ) -> Vec<RankedCandidate> {
    let specialization = incident.incident_type.specialization();
    let capacity = self.config.max_active_incidents_per_responder;

    let mut ranked: Vec<RankedCandidate> = responders
      .into_iter()
      .filter(|r| r.specialization == specialization)
      .filter(|r| !EXCLUDED_STATUSES.contains(&r.status))
      .filter(|r| r.current_load < capacity)
      .filter_map(|responder| {
        let distance_km = geo::distance_km(incident.location, responder.location);
        if distance_km > self.config.max_distance_km {
          return None;
        }
        let score = scoring::score(&responder, distance_km, now, &self.config);
        (score.total > 0.0).then_some(RankedCandidate {
          responder,
          distance_km,
          score,
        })
      })
      .collect();

    scoring::rank(&mut ranked);
    ranked
  }

  async fn try_route(
    &self,
    incident_id: &str,
    attempt: u32,
    considered: &mut usize,
  ) -> Result<DispatchResult, DispatchError> {
    // Always work from the stored copy; the caller's may be stale.
    let incident = self
      .call("incident_get", self.incidents.get(incident_id))
      .await?;
    ensure_routable(&incident)?;

    let specialization = incident.incident_type.specialization();
    let responders = self
      .call(
        "find_eligible",
        self
          .directory
          .find_eligible(specialization, &EXCLUDED_STATUSES),
      )
      .await?;
    let fetched = responders.len();
    let candidates = self.candidates(&incident, responders, Utc::now());
    *considered = candidates.len();
    debug!(
      incident_id,
      ?specialization,
      fetched,
      eligible = candidates.len(),
      attempt,
      "candidates ranked"
    );

    match candidates.first() {
      Some(best) => self.commit(&incident, best, candidates.len(), attempt).await,
      None => {
        self
          .queue(&incident, QueueReason::NoResponderAvailable, 0, attempt)
          .await
      }
    }
  }

  /// Apply the assignment: responder load first, then incident status.
  /// A failed status write rolls the load back so neither side is left half-updated.
  async fn commit(
    &self,
    incident: &Incident,
    best: &RankedCandidate,
    considered: usize,
    attempt: u32,
  ) -> Result<DispatchResult, DispatchError> {
    let responder_id = best.responder.id.as_str();
    let capacity = self.config.max_active_incidents_per_responder;

    // Abort before touching load if the incident moved on (e.g. cancelled mid-dispatch).
    let fresh = self
      .call("incident_get", self.incidents.get(&incident.id))
      .await?;
    if let Err(e) = ensure_routable(&fresh) {
      info!(incident_id = %incident.id, status = %fresh.status, "incident changed during dispatch, commit aborted");
      return Err(e);
    }

    let responder = match self
      .call(
        "increment_load",
        self
          .directory
          .increment_load(responder_id, &incident.id, capacity),
      )
      .await
    {
      Ok(responder) => responder,
      Err(e) => {
        // A timed-out charge may still have landed; releasing an uncharged
        // incident is a no-op.
        if matches!(e, DispatchError::Timeout { .. }) {
          self.rollback_load(responder_id, &incident.id).await;
        }
        return Err(e);
      }
    };

    if let Err(e) = self
      .call(
        "incident_set_status",
        self.incidents.set_status(
          &incident.id,
          IncidentStatus::Assigned,
          TransitionFields::assign(responder_id),
        ),
      )
      .await
    {
      match self.assignment_landed(&incident.id, responder_id, &e).await {
        Some(true) => {
          info!(incident_id = %incident.id, responder_id, "assignment write timed out but landed");
        }
        Some(false) => {
          warn!(incident_id = %incident.id, responder_id, error = %e, "assignment write failed, rolling back load");
          self.rollback_load(responder_id, &incident.id).await;
          return Err(e);
        }
        None => {
          error!(incident_id = %incident.id, responder_id, error = %e, "assignment outcome unknown, load stays charged");
          return Err(e);
        }
      }
    }

    if responder.current_load >= capacity {
      if let Err(e) = self
        .call(
          "responder_set_status",
          self.directory.set_status(responder_id, ResponderStatus::Busy),
        )
        .await
      {
        warn!(responder_id, error = %e, "could not mark responder busy");
      }
    }

    info!(
      incident_id = %incident.id,
      responder_id,
      score = best.score.total,
      distance_km = best.distance_km,
      load = responder.current_load,
      attempt,
      "incident assigned"
    );
    self
      .notify(DispatchEvent::IncidentAssigned {
        incident_id: incident.id.clone(),
        responder_id: responder_id.to_string(),
      })
      .await;

    Ok(DispatchResult::assigned(DecisionRecord::matched(
      &incident.id,
      responder_id,
      best.distance_km,
      best.score,
      considered,
      attempt,
    )))
  }

  /// Whether a failed assignment write took effect anyway. Only a timeout
  /// leaves that open; `None` if the incident can't be read back.
  async fn assignment_landed(
    &self,
    incident_id: &str,
    responder_id: &str,
    err: &DispatchError,
  ) -> Option<bool> {
    if !matches!(err, DispatchError::Timeout { .. }) {
      return Some(false);
    }
    let incidents = &self.incidents;
    match self
      .retry("incident_get", move || incidents.get(incident_id))
      .await
    {
      Ok(incident) => Some(
        incident.status.holds_responder()
          && incident.assigned_responder_id.as_deref() == Some(responder_id),
      ),
      Err(e) => {
        warn!(incident_id, error = %e, "could not read back assignment");
        None
      }
    }
  }

  async fn queue(
    &self,
    incident: &Incident,
    reason: QueueReason,
    considered: usize,
    attempt: u32,
  ) -> Result<DispatchResult, DispatchError> {
    let decision = DecisionRecord::no_match(&incident.id, considered, attempt);

    // Re-dispatch of an already queued incident: nothing to write or announce.
    if incident.status == IncidentStatus::Queued {
      debug!(incident_id = %incident.id, ?reason, "still no responder for queued incident");
      return Ok(DispatchResult::queued(decision, reason));
    }

    self
      .call(
        "incident_set_status",
        self.incidents.set_status(
          &incident.id,
          IncidentStatus::Queued,
          TransitionFields::queue(reason),
        ),
      )
      .await?;
    info!(incident_id = %incident.id, ?reason, "incident queued");
    self
      .notify(DispatchEvent::IncidentQueued {
        incident_id: incident.id.clone(),
        reason,
      })
      .await;

    Ok(DispatchResult::queued(decision, reason))
  }

  async fn queue_after_failure(
    &self,
    incident_id: &str,
    considered: usize,
    attempts: u32,
  ) -> Result<DispatchResult, DispatchError> {
    let incident = self
      .call("incident_get", self.incidents.get(incident_id))
      .await?;
    ensure_routable(&incident)?;
    self
      .queue(&incident, QueueReason::DispatchFailed, considered, attempts)
      .await
  }

  /// Drop the incident's load unit. If that fails the unit is charged again,
  /// since a timed-out release may have landed.
  async fn release(
    &self,
    responder_id: &str,
    incident_id: &str,
  ) -> Result<Responder, DispatchError> {
    let directory = &self.directory;
    match self
      .retry("decrement_load", move || {
        directory.decrement_load(responder_id, incident_id)
      })
      .await
    {
      Ok(responder) => {
        info!(incident_id, responder_id, load = responder.current_load, "responder released");
        Ok(responder)
      }
      Err(e) => {
        warn!(incident_id, responder_id, error = %e, "release failed, incident left open");
        self.restore_hold(responder_id, incident_id).await;
        Err(e)
      }
    }
  }

  /// The close write failed after the release. If it landed anyway, finish;
  /// if the incident is still open, charge the responder again.
  async fn settle_close(
    &self,
    incident_id: &str,
    to: IncidentStatus,
    holder: Option<&str>,
    released: Option<Responder>,
    err: DispatchError,
  ) -> Result<Incident, DispatchError> {
    let incidents = &self.incidents;
    let current = match self
      .retry("incident_get", move || incidents.get(incident_id))
      .await
    {
      Ok(incident) => incident,
      Err(read_err) => {
        error!(incident_id, error = %read_err, "close outcome unknown, responder left released");
        return Err(err);
      }
    };

    if current.status == to && matches!(err, DispatchError::Timeout { .. }) {
      info!(incident_id, to = %to, "close write timed out but landed");
      if let Some(responder) = &released {
        self.free_if_due(responder).await;
      }
      return Ok(current);
    }
    if !current.status.is_terminal() {
      if let Some(responder_id) = holder {
        self.restore_hold(responder_id, incident_id).await;
      }
    }
    Err(err)
  }

  /// Return a released responder to `available` when the release policy says so.
  async fn free_if_due(&self, responder: &Responder) {
    let capacity = self.config.max_active_incidents_per_responder;
    let due = responder.status == ResponderStatus::Busy
      && match self.config.release_policy {
        ReleasePolicy::WhenIdle => responder.current_load == 0,
        ReleasePolicy::WhenBelowCapacity => responder.current_load < capacity,
      };
    if !due {
      return;
    }

    let directory = &self.directory;
    let responder_id = responder.id.as_str();
    match self
      .retry("responder_set_status", move || {
        directory.set_status(responder_id, ResponderStatus::Available)
      })
      .await
    {
      Ok(()) => debug!(responder_id, load = responder.current_load, "responder available again"),
      Err(e) => warn!(responder_id, error = %e, "could not return responder to available"),
    }
  }

  async fn rollback_load(&self, responder_id: &str, incident_id: &str) {
    let directory = &self.directory;
    if let Err(e) = self
      .retry("decrement_load", move || {
        directory.decrement_load(responder_id, incident_id)
      })
      .await
    {
      error!(responder_id, incident_id, error = %e, "load rollback failed; responder load overstated by one");
    }
  }

  /// Put back a unit whose release may have landed. Idempotent per incident.
  async fn restore_hold(&self, responder_id: &str, incident_id: &str) {
    let capacity = self.config.max_active_incidents_per_responder;
    let directory = &self.directory;
    if let Err(e) = self
      .retry("increment_load", move || {
        directory.increment_load(responder_id, incident_id, capacity)
      })
      .await
    {
      error!(responder_id, incident_id, error = %e, "could not restore load; responder load understated by one");
    }
  }

  /// Delivery failures are logged and never fail the dispatch.
  async fn notify(&self, event: DispatchEvent) {
    if let Err(e) = self.call("notify", self.notifier.emit(event)).await {
      warn!(error = %e, "notification failed");
    }
  }

  /// Bound a port call by the configured timeout.
  async fn call<T>(
    &self,
    op: &'static str,
    fut: impl Future<Output = Result<T, DispatchError>>,
  ) -> Result<T, DispatchError> {
    match tokio::time::timeout(self.config.port_timeout, fut).await {
      Ok(result) => result,
      Err(_) => Err(DispatchError::Timeout { op }),
    }
  }

  /// `call` with bounded retry on transient failures. Only for calls that are
  /// safe to repeat.
  async fn retry<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T, DispatchError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DispatchError>>,
  {
    let mut attempt = 0;
    loop {
      attempt += 1;
      match self.call(op, f()).await {
        Err(e) if e.is_retryable() && attempt <= self.config.max_retries => {
          warn!(op, attempt, error = %e, "port call failed, retrying");
          tokio::time::sleep(self.backoff(attempt)).await;
        }
        other => return other,
      }
    }
  }

  fn backoff(&self, attempt: u32) -> Duration {
    self
      .config
      .retry_backoff
      .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
  }
}

fn ensure_routable(incident: &Incident) -> Result<(), DispatchError> {
  match incident.status {
    IncidentStatus::Pending | IncidentStatus::Queued => Ok(()),
    from => Err(DispatchError::InvalidTransition {
      from,
      to: IncidentStatus::Assigned,
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::memory::{ChannelNotifier, InMemoryIncidentStore, InMemoryResponderDirectory};
  use chrono::Duration as ChronoDuration;

  fn incident(id: &str, kind: IncidentType) -> Incident {
    Incident {
      id: id.into(),
      incident_type: kind,
      location: Coordinate::new(9.0222, 38.7468),
      address: None,
      description: "test".into(),
      severity: Severity::Medium,
      status: IncidentStatus::Pending,
      assigned_responder_id: None,
      created_at: Utc::now(),
      queued_at: None,
      assigned_at: None,
      queue_reason: None,
    }
  }

  fn responder(
    id: &str,
    specialization: Specialization,
    at: (f64, f64),
    status: ResponderStatus,
    load: u32,
  ) -> Responder {
    Responder {
      id: id.into(),
      specialization,
      location: Coordinate::new(at.0, at.1),
      status,
      current_load: load,
      last_active_at: Utc::now(),
    }
  }

  fn dispatcher() -> (
    Dispatcher,
    Arc<InMemoryResponderDirectory>,
    Arc<InMemoryIncidentStore>,
  ) {
    let directory = Arc::new(InMemoryResponderDirectory::new());
    let incidents = Arc::new(InMemoryIncidentStore::new());
    let (notifier, _rx) = ChannelNotifier::channel();
    let dispatcher = Dispatcher::new(
      Config::default(),
      directory.clone(),
      incidents.clone(),
      Arc::new(notifier),
    )
    .unwrap();
    (dispatcher, directory, incidents)
  }

  #[test]
  fn invalid_config_rejected() {
    let config = Config {
      max_distance_km: 0.0,
      ..Config::default()
    };
    let (notifier, _rx) = ChannelNotifier::channel();
    let result = Dispatcher::new(
      config,
      Arc::new(InMemoryResponderDirectory::new()),
      Arc::new(InMemoryIncidentStore::new()),
      Arc::new(notifier),
    );
    assert!(result.is_err());
  }

  #[test]
  fn candidates_apply_hard_filters() {
    let (d, _, _) = dispatcher();
    let inc = incident("i-1", IncidentType::Medical);
    let responders = vec![
      responder("ok", Specialization::Medical, (9.03, 38.74), ResponderStatus::Available, 0),
      responder("fire", Specialization::Fire, (9.03, 38.74), ResponderStatus::Available, 0),
      responder("full", Specialization::Medical, (9.03, 38.74), ResponderStatus::Available, 3),
      responder("far", Specialization::Medical, (9.2, 38.74), ResponderStatus::Available, 0),
      responder("off", Specialization::Medical, (9.03, 38.74), ResponderStatus::OffDuty, 0),
      responder("busy", Specialization::Medical, (9.03, 38.74), ResponderStatus::Busy, 1),
    ];
    let ranked = d.candidates(&inc, responders, Utc::now());
    let ids: Vec<&str> = ranked.iter().map(|c| c.responder.id.as_str()).collect();
    assert_eq!(ids, vec!["ok"]);
  }

  #[test]
  fn candidates_prefer_fresher_responder_at_same_spot() {
    let (d, _, _) = dispatcher();
    let inc = incident("i-1", IncidentType::Fire);
    let mut stale = responder("a-stale", Specialization::Fire, (9.03, 38.74), ResponderStatus::Available, 0);
    stale.last_active_at = Utc::now() - ChronoDuration::hours(2);
    let fresh = responder("b-fresh", Specialization::Fire, (9.03, 38.74), ResponderStatus::Available, 0);
    let ranked = d.candidates(&inc, vec![stale, fresh], Utc::now());
    assert_eq!(ranked[0].responder.id, "b-fresh");
  }

  #[tokio::test]
  async fn unknown_type_routes_to_general_responder() {
    let (d, directory, incidents) = dispatcher();
    directory
      .upsert(responder("gen-1", Specialization::General, (9.03, 38.74), ResponderStatus::Available, 0))
      .unwrap();
    let inc = incident("i-1", IncidentType::Other);
    incidents.insert(inc.clone()).unwrap();

    let result = d.route(&inc).await.unwrap();
    assert!(result.assigned);
    assert_eq!(result.responder_id.as_deref(), Some("gen-1"));
  }

  #[tokio::test]
  async fn capacity_reached_marks_responder_busy() {
    let (d, directory, incidents) = dispatcher();
    directory
      .upsert(responder("amb-1", Specialization::Medical, (9.03, 38.74), ResponderStatus::Available, 2))
      .unwrap();
    let inc = incident("i-1", IncidentType::Medical);
    incidents.insert(inc.clone()).unwrap();

    d.route(&inc).await.unwrap();
    let r = directory.get("amb-1").await.unwrap();
    assert_eq!(r.current_load, 3);
    assert_eq!(r.status, ResponderStatus::Busy);
  }

  #[tokio::test]
  async fn update_status_rejects_dispatcher_owned_states() {
    let (d, _, incidents) = dispatcher();
    incidents.insert(incident("i-1", IncidentType::Medical)).unwrap();
    let err = d.update_status("i-1", IncidentStatus::Assigned).await.unwrap_err();
    assert!(matches!(err, DispatchError::Validation { .. }));
  }

  #[tokio::test]
  async fn release_policy_below_capacity_frees_busy_responder() {
    let directory = Arc::new(InMemoryResponderDirectory::new());
    let incidents = Arc::new(InMemoryIncidentStore::new());
    let (notifier, _rx) = ChannelNotifier::channel();
    let d = Dispatcher::new(
      Config {
        max_active_incidents_per_responder: 2,
        release_policy: ReleasePolicy::WhenBelowCapacity,
        ..Config::default()
      },
      directory.clone(),
      incidents.clone(),
      Arc::new(notifier),
    )
    .unwrap();
    directory
      .upsert(responder("p-1", Specialization::Police, (9.03, 38.74), ResponderStatus::Available, 0))
      .unwrap();

    for id in ["i-1", "i-2"] {
      let inc = incident(id, IncidentType::Police);
      incidents.insert(inc.clone()).unwrap();
      assert!(d.route(&inc).await.unwrap().assigned);
    }
    assert_eq!(directory.get("p-1").await.unwrap().status, ResponderStatus::Busy);

    d.update_status("i-1", IncidentStatus::Cancelled).await.unwrap();
    let r = directory.get("p-1").await.unwrap();
    assert_eq!(r.current_load, 1);
    assert_eq!(r.status, ResponderStatus::Available);
  }

  #[tokio::test]
  async fn release_policy_when_idle_keeps_busy_until_empty() {
    let directory = Arc::new(InMemoryResponderDirectory::new());
    let incidents = Arc::new(InMemoryIncidentStore::new());
    let (notifier, _rx) = ChannelNotifier::channel();
    let d = Dispatcher::new(
      Config {
        max_active_incidents_per_responder: 2,
        ..Config::default()
      },
      directory.clone(),
      incidents.clone(),
      Arc::new(notifier),
    )
    .unwrap();
    directory
      .upsert(responder("p-1", Specialization::Police, (9.03, 38.74), ResponderStatus::Available, 0))
      .unwrap();

    for id in ["i-1", "i-2"] {
      let inc = incident(id, IncidentType::Police);
      incidents.insert(inc.clone()).unwrap();
      d.route(&inc).await.unwrap();
    }

    d.update_status("i-1", IncidentStatus::Cancelled).await.unwrap();
    assert_eq!(directory.get("p-1").await.unwrap().status, ResponderStatus::Busy);

    d.update_status("i-2", IncidentStatus::Cancelled).await.unwrap();
    let r = directory.get("p-1").await.unwrap();
    assert_eq!(r.current_load, 0);
    assert_eq!(r.status, ResponderStatus::Available);
  }

  #[test]
  fn backoff_doubles() {
    let (d, _, _) = dispatcher();
    assert_eq!(d.backoff(1), Duration::from_millis(50));
    assert_eq!(d.backoff(2), Duration::from_millis(100));
    assert_eq!(d.backoff(3), Duration::from_millis(200));
  }
}
