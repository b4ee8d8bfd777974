// Notification gate - decides whether an evaluation is worth a message.

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::evaluator::EvaluationResult;

/// Minimum score to notify when nothing else is configured.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Urgency threshold, validated to lie in [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&value) {
            // also rejects NaN
            return Err(ConfigError::ThresholdOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_met_by(&self, score: f64) -> bool {
        score >= self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

impl TryFrom<f64> for Threshold {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(threshold: Threshold) -> Self {
        threshold.0
    }
}

/// Send/skip decision for one evaluation.
pub fn should_notify(result: &EvaluationResult, threshold: Threshold, always_notify: bool) -> bool {
    if always_notify {
        return true;
    }
    threshold.is_met_by(result.score())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::evaluator::UrgencyEvaluator;
    use crate::core::signals::model::{Signal, SignalSet};

    fn evaluate(text: &str, signals: Vec<Signal>) -> EvaluationResult {
        UrgencyEvaluator::new(SignalSet::new(signals).unwrap(), Threshold::default())
            .unwrap()
            .evaluate(text)
    }

    #[test]
    fn test_threshold_range() {
        assert!(Threshold::new(0.0).is_ok());
        assert!(Threshold::new(1.0).is_ok());
        assert!(matches!(Threshold::new(1.01), Err(ConfigError::ThresholdOutOfRange(_))));
        assert!(Threshold::new(-0.1).is_err());
        assert!(Threshold::new(f64::NAN).is_err());
    }

    #[test]
    fn test_threshold_deserialize_validates() {
        let ok: Threshold = serde_json::from_str("0.5").unwrap();
        assert_eq!(ok.value(), 0.5);
        assert!(serde_json::from_str::<Threshold>("2.0").is_err());
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let result = evaluate("error", vec![Signal::new("error", 0.3)]);
        let exact = Threshold::new(result.score()).unwrap();
        assert!(should_notify(&result, exact, false));

        let above = Threshold::new((result.score() + 1e-12).min(1.0)).unwrap();
        assert!(!should_notify(&result, above, false));
    }

    #[test]
    fn test_always_notify_overrides_zero_score() {
        let result = evaluate("Daily backup completed", vec![Signal::new("error", 0.3)]);
        assert_eq!(result.score(), 0.0);
        assert!(!should_notify(&result, Threshold::default(), false));
        assert!(should_notify(&result, Threshold::default(), true));
        assert!(should_notify(&result, Threshold::new(1.0).unwrap(), true));
    }

    #[test]
    fn test_threshold_changes_decision() {
        // raw 0.53 normalizes to ~0.55
        let result = evaluate("outage", vec![Signal::new("outage", 0.53)]);
        assert!(result.score() > 0.5 && result.score() < 0.7, "score {}", result.score());
        assert!(should_notify(&result, Threshold::new(0.5).unwrap(), false));
        assert!(!should_notify(&result, Threshold::default(), false));
    }
}
