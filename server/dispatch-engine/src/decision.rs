//! Assignment decision records for auditing routing outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scoring::ScoreBreakdown;

/// What the dispatcher decided for one routing attempt. Not persisted by the
/// engine; callers keep it for audit trails and "no responder" explanations.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
  pub decision_id: String,
  pub incident_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub responder_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub score: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub distance_km: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub breakdown: Option<ScoreBreakdown>,
  /// Candidates left after the hard filters.
  pub candidates_considered: usize,
  /// Routing attempts spent, including retries.
  pub attempts: u32,
  pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
  pub fn no_match(incident_id: &str, candidates_considered: usize, attempts: u32) -> Self {
    let decided_at = Utc::now();
    Self {
      decision_id: decision_id(incident_id, None, &decided_at),
      incident_id: incident_id.to_string(),
      responder_id: None,
      score: None,
      distance_km: None,
      breakdown: None,
      candidates_considered,
      attempts,
      decided_at,
    }
  }

  pub fn matched(
    incident_id: &str,
    responder_id: &str,
    distance_km: f64,
    breakdown: ScoreBreakdown,
    candidates_considered: usize,
    attempts: u32,
  ) -> Self {
    let decided_at = Utc::now();
    Self {
      decision_id: decision_id(incident_id, Some(responder_id), &decided_at),
      incident_id: incident_id.to_string(),
      responder_id: Some(responder_id.to_string()),
      score: Some((breakdown.total * 1000.0).round() / 1000.0),
      distance_km: Some((distance_km * 1000.0).round() / 1000.0),
      breakdown: Some(breakdown),
      candidates_considered,
      attempts,
      decided_at,
    }
  }
}

/// Stable decision ID: hash of incident + responder + decision time.
pub fn decision_id(incident_id: &str, responder_id: Option<&str>, at: &DateTime<Utc>) -> String {
  let mut hasher = blake3::Hasher::new();
  hasher.update(incident_id.as_bytes());
  hasher.update(b"|");
  hasher.update(responder_id.unwrap_or("-").as_bytes());
  hasher.update(b"|");
  hasher.update(at.to_rfc3339().as_bytes());
  let hex = hasher.finalize().to_hex();
  format!("dec-{}", &hex[..16])
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
  }

  #[test]
  fn same_input_same_id() {
    assert_eq!(
      decision_id("i-1", Some("r-1"), &at()),
      decision_id("i-1", Some("r-1"), &at())
    );
  }

  #[test]
  fn responder_changes_id() {
    assert_ne!(
      decision_id("i-1", Some("r-1"), &at()),
      decision_id("i-1", Some("r-2"), &at())
    );
    assert_ne!(
      decision_id("i-1", Some("r-1"), &at()),
      decision_id("i-1", None, &at())
    );
  }

  #[test]
  fn id_shape() {
    let id = decision_id("i-1", None, &at());
    assert!(id.starts_with("dec-"));
    assert_eq!(id.len(), 20);
    assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn matched_record_rounds_for_output() {
    let breakdown = ScoreBreakdown {
      distance: 0.79,
      load: 1.0,
      recency: 1.0,
      availability: 1.0,
      total: 0.894_512,
    };
    let record = DecisionRecord::matched("i-1", "r-1", 1.144_49, breakdown, 2, 1);
    assert_eq!(record.score, Some(0.895));
    assert_eq!(record.distance_km, Some(1.144));
    assert_eq!(record.responder_id.as_deref(), Some("r-1"));
  }
}
