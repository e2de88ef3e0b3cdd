use serde::{Deserialize, Serialize};

use crate::graph::numeric::round_to;

// =============================================================================
// Signals
// =============================================================================

/// One of the four risk inputs blended into a borrower evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalKey {
    PaymentHistory,
    AssetCoverage,
    CovenantHealth,
    TelemetryPulse,
}

impl SignalKey {
    pub const ALL: [SignalKey; 4] = [
        SignalKey::PaymentHistory,
        SignalKey::AssetCoverage,
        SignalKey::CovenantHealth,
        SignalKey::TelemetryPulse,
    ];

    /// Wire label, matching the weight vector keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKey::PaymentHistory => "paymentHistory",
            SignalKey::AssetCoverage => "assetCoverage",
            SignalKey::CovenantHealth => "covenantHealth",
            SignalKey::TelemetryPulse => "telemetryPulse",
        }
    }

    /// Exact-match parse of a wire label.
    pub fn parse(label: &str) -> Option<Self> {
        SignalKey::ALL.into_iter().find(|k| k.as_str() == label)
    }
}

impl std::fmt::Display for SignalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value per signal. Used both for the learned weight vector and for the
/// per-borrower signal scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalVector {
    pub payment_history: f64,
    pub asset_coverage: f64,
    pub covenant_health: f64,
    pub telemetry_pulse: f64,
}

pub type SignalWeights = SignalVector;
pub type SignalScores = SignalVector;

impl Default for SignalVector {
    /// The baseline weight vector.
    fn default() -> Self {
        SignalVector {
            payment_history: 0.30,
            asset_coverage: 0.25,
            covenant_health: 0.20,
            telemetry_pulse: 0.25,
        }
    }
}

impl SignalVector {
    pub fn splat(value: f64) -> Self {
        SignalVector {
            payment_history: value,
            asset_coverage: value,
            covenant_health: value,
            telemetry_pulse: value,
        }
    }

    pub fn get(&self, key: SignalKey) -> f64 {
        match key {
            SignalKey::PaymentHistory => self.payment_history,
            SignalKey::AssetCoverage => self.asset_coverage,
            SignalKey::CovenantHealth => self.covenant_health,
            SignalKey::TelemetryPulse => self.telemetry_pulse,
        }
    }

    pub fn get_mut(&mut self, key: SignalKey) -> &mut f64 {
        match key {
            SignalKey::PaymentHistory => &mut self.payment_history,
            SignalKey::AssetCoverage => &mut self.asset_coverage,
            SignalKey::CovenantHealth => &mut self.covenant_health,
            SignalKey::TelemetryPulse => &mut self.telemetry_pulse,
        }
    }

    pub fn sum(&self) -> f64 {
        SignalKey::ALL.iter().map(|k| self.get(*k)).sum()
    }

    /// Apply `f` to every entry.
    pub fn map(&self, mut f: impl FnMut(f64) -> f64) -> Self {
        SignalVector {
            payment_history: f(self.payment_history),
            asset_coverage: f(self.asset_coverage),
            covenant_health: f(self.covenant_health),
            telemetry_pulse: f(self.telemetry_pulse),
        }
    }

    /// Weighted sum `Σ self[k] * other[k]`.
    pub fn dot(&self, other: &SignalVector) -> f64 {
        SignalKey::ALL
            .iter()
            .map(|k| self.get(*k) * other.get(*k))
            .sum()
    }
}

// =============================================================================
// Feedback + evaluation labels
// =============================================================================

/// Direction of a human feedback nudge on one signal weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    /// Only the exact labels `positive` and `negative` are accepted.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "positive" => Some(Direction::Positive),
            "negative" => Some(Direction::Negative),
            _ => None,
        }
    }

    pub fn sign(&self) -> f64 {
        match self {
            Direction::Positive => 1.0,
            Direction::Negative => -1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Positive => "positive",
            Direction::Negative => "negative",
        }
    }
}

/// Qualitative bucket for a 0-100 risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Stable,
    Watch,
    Concern,
    Critical,
}

impl RiskTier {
    /// `>=75` stable, `>=55` watch, `>=35` concern, else critical.
    pub fn from_score(risk_score: f64) -> Self {
        if risk_score >= 75.0 {
            RiskTier::Stable
        } else if risk_score >= 55.0 {
            RiskTier::Watch
        } else if risk_score >= 35.0 {
            RiskTier::Concern
        } else {
            RiskTier::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Stable => "stable",
            RiskTier::Watch => "watch",
            RiskTier::Concern => "concern",
            RiskTier::Critical => "critical",
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Runtime tuning for a graph instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphConfig {
    /// Telemetry ring capacity per borrower/asset scope.
    #[serde(default = "default_max_telemetry")]
    pub max_telemetry: usize,
    /// Most recent events read by the telemetry pulse.
    #[serde(default = "default_telemetry_window")]
    pub telemetry_window: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    /// Initial weights, also the target of resets and zero-sum recovery.
    #[serde(default)]
    pub default_weights: SignalWeights,
    #[serde(default = "default_max_feedback_history")]
    pub max_feedback_history: usize,
    /// Edge relation used when an asset or link call names none.
    #[serde(default = "default_relation")]
    pub default_relation: String,
}

fn default_max_telemetry() -> usize {
    200
}

fn default_telemetry_window() -> usize {
    20
}

fn default_learning_rate() -> f64 {
    0.05
}

fn default_decay_factor() -> f64 {
    0.97
}

fn default_max_feedback_history() -> usize {
    500
}

fn default_relation() -> String {
    "collateral".to_string()
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            max_telemetry: default_max_telemetry(),
            telemetry_window: default_telemetry_window(),
            learning_rate: default_learning_rate(),
            decay_factor: default_decay_factor(),
            default_weights: SignalWeights::default(),
            max_feedback_history: default_max_feedback_history(),
            default_relation: default_relation(),
        }
    }
}

impl GraphConfig {
    /// Check ranges and renormalize the default weights in place.
    pub fn validate(&mut self) -> Result<(), String> {
        if self.max_telemetry == 0 {
            return Err("maxTelemetry must be at least 1".to_string());
        }
        if self.telemetry_window == 0 {
            return Err("telemetryWindow must be at least 1".to_string());
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(format!(
                "learningRate must be a non-negative number, got {}",
                self.learning_rate
            ));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(format!(
                "decayFactor must be in (0, 1], got {}",
                self.decay_factor
            ));
        }
        for key in SignalKey::ALL {
            let w = self.default_weights.get(key);
            if !w.is_finite() || w < 0.0 {
                return Err(format!("defaultWeights.{} must be non-negative, got {}", key, w));
            }
        }
        let sum = self.default_weights.sum();
        if sum <= 0.0 {
            return Err("defaultWeights must not all be zero".to_string());
        }
        self.default_weights = self.default_weights.map(|w| round_to(w / sum, 4));
        if self.default_relation.trim().is_empty() {
            self.default_relation = default_relation();
        }
        Ok(())
    }
}
