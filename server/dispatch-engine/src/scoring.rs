//! Rank responders for an incident.
//!
//! Scoring: weighted combination of distance, load, and recency sub-scores,
//! gated by an availability multiplier derived from operational status.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::types::{Responder, ResponderStatus};

/// Per-component view of a score, kept for the decision record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
  pub distance: f64,
  pub load: f64,
  pub recency: f64,
  pub availability: f64,
  pub total: f64,
}

/// exp(-d / (max/2)): strictly decreasing, never zero.
pub fn distance_score(distance_km: f64, max_distance_km: f64) -> f64 {
  (-distance_km.max(0.0) / (max_distance_km / 2.0)).exp()
}

/// Linear falloff to zero at capacity.
pub fn load_score(current_load: u32, capacity: u32) -> f64 {
  if capacity == 0 {
    return 0.0;
  }
  (1.0 - current_load as f64 / capacity as f64).max(0.0)
}

/// Linear falloff to zero over the recency window. Future timestamps count as "just now".
pub fn recency_score(last_active_at: DateTime<Utc>, now: DateTime<Utc>, window_minutes: f64) -> f64 {
  let minutes = (now - last_active_at).num_seconds().max(0) as f64 / 60.0;
  (1.0 - minutes / window_minutes).max(0.0)
}

pub fn availability_multiplier(status: ResponderStatus) -> f64 {
  match status {
    ResponderStatus::Available => 1.0,
    ResponderStatus::Busy => 0.5,
    ResponderStatus::OnBreak => 0.3,
    ResponderStatus::OffDuty | ResponderStatus::Unavailable => 0.0,
  }
}

/// Score a responder at a known distance from the incident. Result is in [0, 1].
pub fn score(
  responder: &Responder,
  distance_km: f64,
  now: DateTime<Utc>,
  config: &Config,
) -> ScoreBreakdown {
  let w = &config.weights;
  let distance = distance_score(distance_km, config.max_distance_km);
  let load = load_score(
    responder.current_load,
    config.max_active_incidents_per_responder,
  );
  let recency = recency_score(
    responder.last_active_at,
    now,
    config.recency_window_minutes,
  );
  let availability = availability_multiplier(responder.status);

  let total = (availability * (w.distance * distance + w.load * load + w.recency * recency))
    .clamp(0.0, 1.0);

  ScoreBreakdown {
    distance,
    load,
    recency,
    availability,
    total,
  }
}

/// A responder that survived the hard filters, with its distance and score.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
  pub responder: Responder,
  pub distance_km: f64,
  pub score: ScoreBreakdown,
}

/// Sort candidates best first: score desc, then distance asc, then responder id asc.
pub fn rank(candidates: &mut [RankedCandidate]) {
  candidates.sort_by(|a, b| {
    b.score
      .total
      .partial_cmp(&a.score.total)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then_with(|| {
        a.distance_km
          .partial_cmp(&b.distance_km)
          .unwrap_or(std::cmp::Ordering::Equal)
      })
      .then_with(|| a.responder.id.cmp(&b.responder.id))
  });
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{Coordinate, Specialization};
  use chrono::{Duration, TimeZone};

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
  }

  fn responder(id: &str, status: ResponderStatus, load: u32, idle_minutes: i64) -> Responder {
    Responder {
      id: id.into(),
      specialization: Specialization::Medical,
      location: Coordinate::new(9.03, 38.74),
      status,
      current_load: load,
      last_active_at: now() - Duration::minutes(idle_minutes),
    }
  }

  fn candidate(id: &str, distance_km: f64, total: f64) -> RankedCandidate {
    RankedCandidate {
      responder: responder(id, ResponderStatus::Available, 0, 0),
      distance_km,
      score: ScoreBreakdown {
        distance: 0.0,
        load: 0.0,
        recency: 0.0,
        availability: 1.0,
        total,
      },
    }
  }

  #[test]
  fn fresh_idle_responder_on_the_spot_scores_one() {
    let config = Config::default();
    let r = responder("r-1", ResponderStatus::Available, 0, 0);
    let s = score(&r, 0.0, now(), &config);
    assert!((s.total - 1.0).abs() < 1e-12);
  }

  #[test]
  fn off_duty_and_unavailable_always_score_zero() {
    let config = Config::default();
    for status in [ResponderStatus::OffDuty, ResponderStatus::Unavailable] {
      for load in 0..=3 {
        for distance in [0.0, 0.5, 5.0, 9.9] {
          for idle in [0, 30, 120] {
            let r = responder("r", status, load, idle);
            assert_eq!(score(&r, distance, now(), &config).total, 0.0);
          }
        }
      }
    }
  }

  #[test]
  fn nearer_wins_at_equal_load_and_recency() {
    let config = Config::default();
    let statuses = [
      ResponderStatus::Available,
      ResponderStatus::Busy,
      ResponderStatus::OnBreak,
    ];
    for status in statuses {
      for load in 0..3 {
        for idle in [0, 15, 90] {
          let r = responder("r", status, load, idle);
          let mut prev = score(&r, 0.0, now(), &config).total;
          for step in 1..=20 {
            let cur = score(&r, step as f64 * 0.5, now(), &config).total;
            assert!(cur < prev, "{status:?} load={load} idle={idle} step={step}");
            prev = cur;
          }
        }
      }
    }
  }

  #[test]
  fn proximity_dominates_load() {
    // A responder 1km away with load 1 beats one 8km away with load 0.
    let config = Config::default();
    let near = score(&responder("a", ResponderStatus::Available, 1, 0), 1.0, now(), &config);
    let far = score(&responder("b", ResponderStatus::Available, 0, 0), 8.0, now(), &config);
    assert!(near.total > far.total);
  }

  #[test]
  fn load_score_hits_zero_at_capacity() {
    assert!((load_score(0, 3) - 1.0).abs() < 1e-12);
    assert!((load_score(2, 3) - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(load_score(3, 3), 0.0);
    assert_eq!(load_score(5, 3), 0.0);
  }

  #[test]
  fn recency_score_decays_over_an_hour() {
    let t = now();
    assert!((recency_score(t, t, 60.0) - 1.0).abs() < 1e-12);
    assert!((recency_score(t - Duration::minutes(30), t, 60.0) - 0.5).abs() < 1e-12);
    assert_eq!(recency_score(t - Duration::minutes(61), t, 60.0), 0.0);
    assert!((recency_score(t + Duration::minutes(5), t, 60.0) - 1.0).abs() < 1e-12);
  }

  #[test]
  fn distance_score_never_reaches_zero() {
    assert!(distance_score(1_000.0, 10.0) > 0.0);
    assert!((distance_score(5.0, 10.0) - (-1.0f64).exp()).abs() < 1e-12);
  }

  #[test]
  fn availability_multipliers() {
    let config = Config::default();
    let base = score(&responder("a", ResponderStatus::Available, 0, 0), 2.0, now(), &config);
    let busy = score(&responder("b", ResponderStatus::Busy, 0, 0), 2.0, now(), &config);
    let on_break = score(&responder("c", ResponderStatus::OnBreak, 0, 0), 2.0, now(), &config);
    assert!((busy.total - base.total * 0.5).abs() < 1e-12);
    assert!((on_break.total - base.total * 0.3).abs() < 1e-12);
  }

  #[test]
  fn ties_break_on_distance_then_id() {
    let mut candidates = vec![
      candidate("zulu", 2.0, 0.8),
      candidate("bravo", 1.0, 0.8),
      candidate("alpha", 1.0, 0.8),
      candidate("charlie", 5.0, 0.9),
    ];
    rank(&mut candidates);
    let order: Vec<&str> = candidates.iter().map(|c| c.responder.id.as_str()).collect();
    assert_eq!(order, vec!["charlie", "alpha", "bravo", "zulu"]);
  }
}
