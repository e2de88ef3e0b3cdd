//! Request shapes for batch ingest and feedback, with up-front validation.

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::types::{Direction, SignalKey, SignalWeights};

use super::entities::{Asset, Borrower, Covenant, TelemetryEvent};
use super::fabric::BorrowerEvaluation;
use super::store::{require_id, require_scope};

/// Mixed batch of records applied borrowers -> assets -> covenants -> telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestBatch {
    #[serde(default)]
    pub borrowers: Vec<Borrower>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub covenants: Vec<Covenant>,
    #[serde(default)]
    pub telemetry: Vec<TelemetryEvent>,
}

impl IngestBatch {
    pub fn is_empty(&self) -> bool {
        self.borrowers.is_empty()
            && self.assets.is_empty()
            && self.covenants.is_empty()
            && self.telemetry.is_empty()
    }

    /// Check every record so that a bad one rejects the batch before any write.
    pub fn validate(&self) -> GraphResult<()> {
        if self.is_empty() {
            return Err(GraphError::validation(
                "batch must include at least one of borrowers, assets, covenants, telemetry",
            ));
        }
        for (i, b) in self.borrowers.iter().enumerate() {
            require_id("borrower", &b.id).map_err(|e| at_position(e, "borrowers", i))?;
        }
        for (i, a) in self.assets.iter().enumerate() {
            require_id("asset", &a.id).map_err(|e| at_position(e, "assets", i))?;
        }
        for (i, c) in self.covenants.iter().enumerate() {
            require_id("covenant", &c.id).map_err(|e| at_position(e, "covenants", i))?;
        }
        for (i, t) in self.telemetry.iter().enumerate() {
            require_scope(t).map_err(|e| at_position(e, "telemetry", i))?;
        }
        Ok(())
    }
}

fn at_position(err: GraphError, list: &str, index: usize) -> GraphError {
    match err {
        GraphError::Validation(msg) => GraphError::Validation(format!("{}[{}]: {}", list, index, msg)),
        other => other,
    }
}

/// Raw feedback as received from a caller. Every field is optional on the
/// wire so that absence is reported as a validation error, not a parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(default)]
    pub borrower_id: Option<String>,
    #[serde(default)]
    pub signal: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub magnitude: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl FeedbackRequest {
    pub fn new(borrower_id: &str, signal: &str, direction: &str) -> Self {
        FeedbackRequest {
            borrower_id: Some(borrower_id.to_string()),
            signal: Some(signal.to_string()),
            direction: Some(direction.to_string()),
            ..Default::default()
        }
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    /// Presence checks only; borrower existence and label parsing come later.
    pub(crate) fn required_fields(&self) -> GraphResult<(&str, &str, &str, f64)> {
        let borrower_id = required(&self.borrower_id, "borrowerId")?;
        let signal = required(&self.signal, "signal")?;
        let direction = required(&self.direction, "direction")?;
        let magnitude = self.magnitude.unwrap_or(1.0);
        if !magnitude.is_finite() || magnitude < 0.0 {
            return Err(GraphError::validation(format!(
                "magnitude must be a non-negative number, got {}",
                magnitude
            )));
        }
        Ok((borrower_id, signal, direction, magnitude))
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> GraphResult<&'a str> {
    field
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| GraphError::validation(format!("{} is required", name)))
}

/// Parse the signal and direction labels of a feedback request.
pub(crate) fn parse_labels(signal: &str, direction: &str) -> GraphResult<(SignalKey, Direction)> {
    let signal_key = SignalKey::parse(signal).ok_or_else(|| {
        GraphError::validation(format!(
            "unknown signal '{}'; expected one of paymentHistory, assetCoverage, covenantHealth, telemetryPulse",
            signal
        ))
    })?;
    let direction = Direction::parse(direction).ok_or_else(|| {
        GraphError::validation(format!(
            "direction must be 'positive' or 'negative', got '{}'",
            direction
        ))
    })?;
    Ok((signal_key, direction))
}

/// Result of applied feedback: new weights and a fresh evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackOutcome {
    pub feedback_id: String,
    pub weights: SignalWeights,
    pub evaluation: BorrowerEvaluation,
}
