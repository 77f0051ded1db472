//! Normalize inbound incident/responder records into canonical models.

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::error::DispatchError;
use crate::types::*;

/// Parse and validate a newly reported incident. New incidents start `pending`.
pub fn normalize_incident(raw: &InboundIncident) -> Result<Incident, DispatchError> {
  let id = raw.id.trim();
  if id.is_empty() {
    return Err(DispatchError::validation("id", "must not be empty"));
  }
  if raw.incident_type.trim().is_empty() {
    return Err(DispatchError::validation("type", "must not be empty"));
  }
  let location = coordinate(raw.latitude, raw.longitude)?;
  let severity = Severity::from_str_loose(&raw.severity)
    .ok_or_else(|| DispatchError::validation("severity", "expected low|medium|high"))?;
  let created_at = match &raw.created_at {
    Some(ts) => parse_timestamp("created_at", ts)?,
    None => Utc::now(),
  };

  Ok(Incident {
    id: id.to_string(),
    incident_type: IncidentType::from_str_loose(&raw.incident_type),
    location,
    address: raw
      .address
      .as_deref()
      .map(str::trim)
      .filter(|a| !a.is_empty())
      .map(String::from),
    description: raw.description.trim().to_string(),
    severity,
    status: IncidentStatus::Pending,
    assigned_responder_id: None,
    created_at,
    queued_at: None,
    assigned_at: None,
    queue_reason: None,
  })
}

/// Parse and validate a responder record against the configured capacity.
pub fn normalize_responder(
  raw: &InboundResponder,
  config: &Config,
) -> Result<Responder, DispatchError> {
  let id = raw.id.trim();
  if id.is_empty() {
    return Err(DispatchError::validation("id", "must not be empty"));
  }
  let specialization = Specialization::from_str_loose(&raw.specialization).ok_or_else(|| {
    DispatchError::validation(
      "specialization",
      "expected medical|police|fire|traffic|general",
    )
  })?;
  let location = coordinate(raw.latitude, raw.longitude)?;
  let status = ResponderStatus::from_str_loose(&raw.status).ok_or_else(|| {
    DispatchError::validation(
      "status",
      "expected available|busy|on_break|off_duty|unavailable",
    )
  })?;
  if raw.current_load > config.max_active_incidents_per_responder {
    return Err(DispatchError::validation(
      "current_load",
      &format!(
        "exceeds capacity of {}",
        config.max_active_incidents_per_responder
      ),
    ));
  }
  let last_active_at = match &raw.last_active_at {
    Some(ts) => parse_timestamp("last_active_at", ts)?,
    None => Utc::now(),
  };

  Ok(Responder {
    id: id.to_string(),
    specialization,
    location,
    status,
    current_load: raw.current_load,
    last_active_at,
  })
}

/// Range-checked coordinate. Distance math assumes callers did this.
pub fn coordinate(latitude: f64, longitude: f64) -> Result<Coordinate, DispatchError> {
  if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
    return Err(DispatchError::validation(
      "latitude",
      "must be within [-90, 90]",
    ));
  }
  if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
    return Err(DispatchError::validation(
      "longitude",
      "must be within [-180, 180]",
    ));
  }
  Ok(Coordinate::new(latitude, longitude))
}

/// Check an incident already in the store before routing it.
pub fn validate_incident(incident: &Incident) -> Result<(), DispatchError> {
  if incident.id.trim().is_empty() {
    return Err(DispatchError::validation("id", "must not be empty"));
  }
  coordinate(incident.location.latitude, incident.location.longitude)?;
  Ok(())
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, DispatchError> {
  Ok(
    DateTime::parse_from_rfc3339(raw)
      .map_err(|e| DispatchError::validation(field, &format!("invalid RFC3339: {}", e)))?
      .with_timezone(&Utc),
  )
}
