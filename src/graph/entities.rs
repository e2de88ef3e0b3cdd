//! Typed graph records (borrowers, assets, covenants, telemetry, edges).
//!
//! Each record types the fields the signal engine reads and keeps every other
//! attribute in a flattened pass-through bag that the graph never interprets.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::merge::{merge_unique_by_key, overlay, overlay_attributes, union_ordered, MergeKeyed};

// ---------------------------------------------------------------------------
// History entries
// ---------------------------------------------------------------------------

/// One billing period in a borrower's payment history, keyed by `period`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(default, deserialize_with = "merge_key_label", skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_late: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaymentRecord {
    pub fn new(period: &str, status: &str) -> Self {
        PaymentRecord {
            period: Some(period.to_string()),
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    pub fn with_days_late(mut self, days_late: f64) -> Self {
        self.days_late = Some(days_late);
        self
    }

    fn status_label(&self) -> String {
        self.status
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase()
            .replace(['-', ' '], "_")
    }

    pub fn days_late(&self) -> f64 {
        self.days_late.filter(|d| d.is_finite()).unwrap_or(0.0)
    }

    /// Status `late`, or any positive `days_late`.
    pub fn is_late(&self) -> bool {
        self.status_label() == "late" || self.days_late() > 0.0
    }

    /// More than 30 days late.
    pub fn is_severe(&self) -> bool {
        self.days_late() > 30.0
    }

    pub fn is_on_time(&self) -> bool {
        matches!(self.status_label().as_str(), "on_time" | "paid" | "current") && !self.is_late()
    }
}

impl MergeKeyed for PaymentRecord {
    fn merge_key(&self) -> Option<&str> {
        self.period.as_deref()
    }

    fn absorb(&mut self, incoming: Self) {
        overlay(&mut self.status, incoming.status);
        overlay(&mut self.days_late, incoming.days_late);
        overlay_attributes(&mut self.extra, incoming.extra);
    }
}

/// A timestamped observation: asset performance points and covenant breaches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimestampedEntry {
    #[serde(default, deserialize_with = "merge_key_label", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type PerformancePoint = TimestampedEntry;
pub type CovenantBreach = TimestampedEntry;

impl TimestampedEntry {
    pub fn at(timestamp: &str) -> Self {
        TimestampedEntry {
            timestamp: Some(timestamp.to_string()),
            extra: Map::new(),
        }
    }
}

impl MergeKeyed for TimestampedEntry {
    fn merge_key(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    fn absorb(&mut self, incoming: Self) {
        overlay_attributes(&mut self.extra, incoming.extra);
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Borrower {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub payment_history: Vec<PaymentRecord>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_commitment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<f64>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Borrower {
    pub fn new(id: &str) -> Self {
        Borrower {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// First present of `total_commitment`, `balance`, `loan_amount`.
    pub fn obligation(&self) -> Option<f64> {
        self.total_commitment.or(self.balance).or(self.loan_amount)
    }

    pub(crate) fn absorb(&mut self, incoming: Borrower) {
        let history = std::mem::take(&mut self.payment_history);
        self.payment_history = merge_unique_by_key(history, incoming.payment_history);
        union_ordered(&mut self.tags, incoming.tags);
        overlay(&mut self.total_commitment, incoming.total_commitment);
        overlay(&mut self.balance, incoming.balance);
        overlay(&mut self.loan_amount, incoming.loan_amount);
        overlay_attributes(&mut self.attributes, incoming.attributes);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub performance_window: Vec<PerformancePoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_operating_income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noi: Option<f64>,
    #[serde(rename = "borrowerId", default, skip_serializing_if = "Option::is_none")]
    pub borrower_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Asset {
    pub fn new(id: &str) -> Self {
        Asset {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// `net_operating_income`, falling back to `noi`, then 0.
    pub fn operating_income(&self) -> f64 {
        finite_or_zero(self.net_operating_income.or(self.noi))
    }

    pub fn appraised_value(&self) -> f64 {
        finite_or_zero(self.value)
    }

    pub(crate) fn absorb(&mut self, incoming: Asset) {
        let window = std::mem::take(&mut self.performance_window);
        self.performance_window = merge_unique_by_key(window, incoming.performance_window);
        overlay(&mut self.value, incoming.value);
        overlay(&mut self.net_operating_income, incoming.net_operating_income);
        overlay(&mut self.noi, incoming.noi);
        overlay(&mut self.borrower_id, non_empty(incoming.borrower_id));
        overlay(&mut self.relationship, non_empty(incoming.relationship));
        overlay_attributes(&mut self.attributes, incoming.attributes);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Covenant {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub breaches: Vec<CovenantBreach>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// `None` marks a global covenant that applies to every borrower.
    #[serde(rename = "borrowerId", default, skip_serializing_if = "Option::is_none")]
    pub borrower_id: Option<String>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Covenant {
    pub fn new(id: &str) -> Self {
        Covenant {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("satisfied"))
    }

    /// Global covenants apply to everyone; scoped ones only to their borrower.
    pub fn applies_to(&self, borrower_id: &str) -> bool {
        match self.borrower_id.as_deref() {
            None | Some("") => true,
            Some(owner) => owner == borrower_id,
        }
    }

    pub(crate) fn absorb(&mut self, incoming: Covenant) {
        let breaches = std::mem::take(&mut self.breaches);
        self.breaches = merge_unique_by_key(breaches, incoming.breaches);
        overlay(&mut self.status, incoming.status);
        overlay(&mut self.borrower_id, non_empty(incoming.borrower_id));
        overlay_attributes(&mut self.attributes, incoming.attributes);
    }
}

/// A telemetry observation scoped to one borrower or one asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "borrowerId", default, skip_serializing_if = "Option::is_none")]
    pub borrower_id: Option<String>,
    #[serde(rename = "assetId", default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Free-form bag; only numeric entries are read.
    #[serde(default)]
    pub metrics: Map<String, Value>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl TelemetryEvent {
    pub fn for_borrower(borrower_id: &str) -> Self {
        TelemetryEvent {
            borrower_id: Some(borrower_id.to_string()),
            ..Default::default()
        }
    }

    pub fn for_asset(asset_id: &str) -> Self {
        TelemetryEvent {
            asset_id: Some(asset_id.to_string()),
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), Value::from(value));
        self
    }

    pub fn at(mut self, timestamp: &str) -> Self {
        self.timestamp = Some(timestamp.to_string());
        self
    }

    /// First numeric metric among `names`. Nulls and non-numbers fall through.
    pub fn metric(&self, names: &[&str]) -> Option<f64> {
        names
            .iter()
            .filter_map(|name| self.metrics.get(*name).and_then(Value::as_f64))
            .find(|v| !v.is_nan())
    }
}

/// Borrower-to-asset relationship. At most one per `(borrowerId, assetId)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub borrower_id: String,
    pub asset_id: String,
    pub relation: String,
    pub created_at: String,
    pub updated_at: String,
}

/// History keys arrive as strings or bare numbers (`"period": 202401`).
fn merge_key_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string or number key, got {}",
            other
        ))),
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}
