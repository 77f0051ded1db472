//! Engine configuration with sane defaults.

use std::str::FromStr;
use std::time::Duration;

use crate::error::DispatchError;

/// Weights of the three scoring components. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
  pub distance: f64,
  pub load: f64,
  pub recency: f64,
}

impl Default for ScoreWeights {
  fn default() -> Self {
    Self {
      distance: 0.5,
      load: 0.3,
      recency: 0.2,
    }
  }
}

/// When a `busy` responder goes back to `available` after a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
  /// Only once the responder holds no open incidents.
  WhenIdle,
  /// As soon as the responder drops below capacity.
  WhenBelowCapacity,
}

/// Tunable dispatch thresholds.
#[derive(Debug, Clone)]
pub struct Config {
  pub weights: ScoreWeights,
  /// Candidates farther than this are disqualified before scoring.
  pub max_distance_km: f64,
  /// Capacity: open incidents a responder may hold at once.
  pub max_active_incidents_per_responder: u32,
  /// Inactivity after which the recency component contributes zero.
  pub recency_window_minutes: f64,
  /// Extra routing attempts after a transient failure.
  pub max_retries: u32,
  /// Base backoff between attempts; doubled each retry.
  pub retry_backoff: Duration,
  /// Upper bound on any single port call.
  pub port_timeout: Duration,
  pub release_policy: ReleasePolicy,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      weights: ScoreWeights::default(),
      max_distance_km: 10.0,
      max_active_incidents_per_responder: 3,
      recency_window_minutes: 60.0,
      max_retries: 3,
      retry_backoff: Duration::from_millis(50),
      port_timeout: Duration::from_secs(2),
      release_policy: ReleasePolicy::WhenIdle,
    }
  }
}

impl Config {
  pub fn validate(&self) -> Result<(), DispatchError> {
    let w = &self.weights;
    if [w.distance, w.load, w.recency]
      .iter()
      .any(|v| !v.is_finite() || *v < 0.0)
    {
      return Err(DispatchError::validation(
        "weights",
        "must be finite and non-negative",
      ));
    }
    if ((w.distance + w.load + w.recency) - 1.0).abs() > 1e-6 {
      return Err(DispatchError::validation("weights", "must sum to 1.0"));
    }
    if !self.max_distance_km.is_finite() || self.max_distance_km <= 0.0 {
      return Err(DispatchError::validation(
        "max_distance_km",
        "must be a positive number",
      ));
    }
    if self.max_active_incidents_per_responder == 0 {
      return Err(DispatchError::validation(
        "max_active_incidents_per_responder",
        "must be at least 1",
      ));
    }
    if !self.recency_window_minutes.is_finite() || self.recency_window_minutes <= 0.0 {
      return Err(DispatchError::validation(
        "recency_window_minutes",
        "must be a positive number",
      ));
    }
    Ok(())
  }

  /// Defaults overlaid with `DISPATCH_*` environment variables.
  pub fn from_env() -> Result<Self, DispatchError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DispatchError> {
    let mut config = Self::default();

    if let Some(v) = parse_var(&lookup, "DISPATCH_WEIGHT_DISTANCE")? {
      config.weights.distance = v;
    }
    if let Some(v) = parse_var(&lookup, "DISPATCH_WEIGHT_LOAD")? {
      config.weights.load = v;
    }
    if let Some(v) = parse_var(&lookup, "DISPATCH_WEIGHT_RECENCY")? {
      config.weights.recency = v;
    }
    if let Some(v) = parse_var(&lookup, "DISPATCH_MAX_DISTANCE_KM")? {
      config.max_distance_km = v;
    }
    if let Some(v) = parse_var(&lookup, "DISPATCH_MAX_ACTIVE_INCIDENTS")? {
      config.max_active_incidents_per_responder = v;
    }
    if let Some(v) = parse_var(&lookup, "DISPATCH_RECENCY_WINDOW_MINUTES")? {
      config.recency_window_minutes = v;
    }
    if let Some(v) = parse_var(&lookup, "DISPATCH_MAX_RETRIES")? {
      config.max_retries = v;
    }
    if let Some(ms) = parse_var::<u64>(&lookup, "DISPATCH_RETRY_BACKOFF_MS")? {
      config.retry_backoff = Duration::from_millis(ms);
    }
    if let Some(ms) = parse_var::<u64>(&lookup, "DISPATCH_PORT_TIMEOUT_MS")? {
      config.port_timeout = Duration::from_millis(ms);
    }
    if let Some(raw) = lookup("DISPATCH_RELEASE_POLICY") {
      config.release_policy = match raw.trim().to_ascii_lowercase().as_str() {
        "when_idle" | "idle" => ReleasePolicy::WhenIdle,
        "when_below_capacity" | "below_capacity" => ReleasePolicy::WhenBelowCapacity,
        _ => {
          return Err(DispatchError::validation(
            "DISPATCH_RELEASE_POLICY",
            "expected when_idle|when_below_capacity",
          ))
        }
      };
    }

    config.validate()?;
    Ok(config)
  }
}

fn parse_var<T: FromStr>(
  lookup: &impl Fn(&str) -> Option<String>,
  key: &str,
) -> Result<Option<T>, DispatchError> {
  match lookup(key) {
    Some(raw) => raw
      .trim()
      .parse()
      .map(Some)
      .map_err(|_| DispatchError::validation(key, &format!("cannot parse {:?}", raw))),
    None => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key: &str| map.get(key).cloned()
  }

  #[test]
  fn defaults_are_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.max_active_incidents_per_responder, 3);
    assert!((config.max_distance_km - 10.0).abs() < f64::EPSILON);
  }

  #[test]
  fn weights_must_sum_to_one() {
    let config = Config {
      weights: ScoreWeights {
        distance: 0.6,
        load: 0.3,
        recency: 0.2,
      },
      ..Config::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("weights"));
  }

  #[test]
  fn zero_capacity_rejected() {
    let config = Config {
      max_active_incidents_per_responder: 0,
      ..Config::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn env_overrides_apply() {
    let config = Config::from_lookup(lookup_from(&[
      ("DISPATCH_MAX_DISTANCE_KM", "25"),
      ("DISPATCH_MAX_ACTIVE_INCIDENTS", "1"),
      ("DISPATCH_WEIGHT_DISTANCE", "0.4"),
      ("DISPATCH_WEIGHT_LOAD", "0.4"),
      ("DISPATCH_RETRY_BACKOFF_MS", "5"),
      ("DISPATCH_RELEASE_POLICY", "below_capacity"),
    ]))
    .unwrap();
    assert!((config.max_distance_km - 25.0).abs() < f64::EPSILON);
    assert_eq!(config.max_active_incidents_per_responder, 1);
    assert_eq!(config.retry_backoff, Duration::from_millis(5));
    assert_eq!(config.release_policy, ReleasePolicy::WhenBelowCapacity);
  }

  #[test]
  fn unparsable_env_value_names_the_key() {
    let err = Config::from_lookup(lookup_from(&[("DISPATCH_MAX_RETRIES", "lots")])).unwrap_err();
    assert!(err.to_string().contains("DISPATCH_MAX_RETRIES"));
  }
}
