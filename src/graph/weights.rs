//! Online weight learning from directional human feedback.
//!
//! Feedback nudges one signal weight by `learning_rate * magnitude`, floors it
//! at zero, then renormalizes the whole vector to sum to 1. A vector whose sum
//! collapses to zero resets to the configured defaults instead of dividing.

use std::collections::VecDeque;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Direction, SignalKey, SignalWeights};

use super::numeric::round_to;

/// One applied feedback event, kept for audit in a bounded log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub id: String,
    pub borrower_id: String,
    pub signal: SignalKey,
    pub direction: Direction,
    pub magnitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub delta: f64,
    pub weights_before: SignalWeights,
    pub weights_after: SignalWeights,
    pub applied_at: String,
}

/// Renormalize to sum 1 (4 decimals each), or fall back to `defaults` on a zero sum.
pub fn normalize(weights: SignalWeights, defaults: SignalWeights) -> SignalWeights {
    let sum = weights.sum();
    if !sum.is_finite() || sum <= 0.0 {
        log::warn!("Signal weights collapsed to zero sum; resetting to defaults");
        return defaults;
    }
    weights.map(|w| round_to(w / sum, 4))
}

#[derive(Debug)]
pub struct WeightLearner {
    weights: SignalWeights,
    defaults: SignalWeights,
    learning_rate: f64,
    decay_factor: f64,
    history: VecDeque<FeedbackRecord>,
    max_history: usize,
}

impl WeightLearner {
    pub fn new(
        defaults: SignalWeights,
        learning_rate: f64,
        decay_factor: f64,
        max_history: usize,
    ) -> Self {
        WeightLearner {
            weights: defaults,
            defaults,
            learning_rate,
            decay_factor,
            history: VecDeque::new(),
            max_history,
        }
    }

    pub fn weights(&self) -> SignalWeights {
        self.weights
    }

    /// Nudge one signal and renormalize. Returns the applied delta.
    pub fn nudge(&mut self, signal: SignalKey, direction: Direction, magnitude: f64) -> f64 {
        let delta = self.learning_rate * magnitude * direction.sign();
        let mut next = self.weights;
        let slot = next.get_mut(signal);
        *slot = (*slot + delta).max(0.0);
        self.weights = normalize(next, self.defaults);
        delta
    }

    /// Multiply every weight by the decay factor, then renormalize.
    pub fn decay(&mut self) -> SignalWeights {
        let factor = self.decay_factor;
        let decayed = self.weights.map(|w| round_to(w * factor, 4));
        self.weights = normalize(decayed, self.defaults);
        self.weights
    }

    /// Apply feedback and append it to the log.
    pub fn apply(
        &mut self,
        borrower_id: &str,
        signal: SignalKey,
        direction: Direction,
        magnitude: f64,
        notes: Option<String>,
    ) -> FeedbackRecord {
        let weights_before = self.weights;
        let delta = self.nudge(signal, direction, magnitude);
        let record = FeedbackRecord {
            id: format!("fb-{}", Uuid::new_v4()),
            borrower_id: borrower_id.to_string(),
            signal,
            direction,
            magnitude,
            notes,
            delta,
            weights_before,
            weights_after: self.weights,
            applied_at: Utc::now().to_rfc3339(),
        };

        if self.max_history > 0 {
            self.history.push_back(record.clone());
            while self.history.len() > self.max_history {
                self.history.pop_front();
            }
        }
        record
    }

    /// Applied feedback, oldest first.
    pub fn history(&self) -> Vec<FeedbackRecord> {
        self.history.iter().cloned().collect()
    }

    pub fn reset(&mut self) {
        self.weights = self.defaults;
        self.history.clear();
    }
}
