//! Signal engine: four independent borrower scores in `[0, 1]`.
//!
//! Each function reads current store state and has no side effects. Scores
//! are recomputed on every evaluation; nothing is cached. Neutral values for
//! empty inputs differ by signal (covenant health uses 0.6, the rest 0.5).

use crate::types::SignalScores;

use super::entities::{Asset, Borrower, Covenant, PaymentRecord, TelemetryEvent};
use super::numeric::clamp01;
use super::store::EntityStore;

const NEUTRAL: f64 = 0.5;
const COVENANT_NEUTRAL: f64 = 0.6;

const LATE_PENALTY: f64 = 0.1;
const SEVERE_PENALTY: f64 = 0.15;

/// Income is capitalized at 10x when measuring coverage.
const NOI_MULTIPLIER: f64 = 10.0;

/// `(minimum coverage ratio, score)`, checked top-down.
const COVERAGE_TIERS: &[(f64, f64)] = &[(2.0, 1.0), (1.2, 0.8), (1.0, 0.65), (0.8, 0.45)];
const COVERAGE_FLOOR: f64 = 0.25;

const BREACH_PENALTY: f64 = 0.05;
const MAX_BREACH_PENALTY: f64 = 0.4;

const OUTAGE_PENALTY: f64 = 0.05;
const MAX_OUTAGE_PENALTY: f64 = 0.3;

// ---------------------------------------------------------------------------
// Individual signals
// ---------------------------------------------------------------------------

/// On-time share minus `0.1` per late period and `0.15` per severe (>30 days) one.
pub fn payment_history_score(history: &[PaymentRecord]) -> f64 {
    if history.is_empty() {
        return NEUTRAL;
    }
    let total = history.len() as f64;
    let on_time = history.iter().filter(|p| p.is_on_time()).count() as f64;
    let late = history.iter().filter(|p| p.is_late()).count() as f64;
    let severe = history.iter().filter(|p| p.is_severe()).count() as f64;

    let base = on_time / total;
    let penalty = LATE_PENALTY * late + SEVERE_PENALTY * severe;
    clamp01(base - penalty)
}

/// Tiered `(Σ value + 10·Σ NOI) / max(1, obligation)`.
pub fn asset_coverage_score(borrower: &Borrower, assets: &[&Asset]) -> f64 {
    if assets.is_empty() {
        return NEUTRAL;
    }
    let value: f64 = assets.iter().map(|a| a.appraised_value()).sum();
    let income: f64 = assets.iter().map(|a| a.operating_income()).sum();
    let obligation = borrower
        .obligation()
        .filter(|o| o.is_finite())
        .unwrap_or(0.0)
        .max(1.0);

    let coverage = (value + NOI_MULTIPLIER * income) / obligation;
    let score = COVERAGE_TIERS
        .iter()
        .find(|(min, _)| coverage >= *min)
        .map_or(COVERAGE_FLOOR, |(_, score)| *score);
    clamp01(score)
}

/// Satisfied share minus `0.05` per breach across all considered covenants (capped at 0.4).
pub fn covenant_health_score(covenants: &[&Covenant]) -> f64 {
    if covenants.is_empty() {
        return COVENANT_NEUTRAL;
    }
    let total = covenants.len() as f64;
    let satisfied = covenants.iter().filter(|c| c.is_satisfied()).count() as f64;
    let breaches: usize = covenants.iter().map(|c| c.breaches.len()).sum();

    let base = satisfied / total;
    let penalty = (BREACH_PENALTY * breaches as f64).min(MAX_BREACH_PENALTY);
    clamp01(base - penalty)
}

/// Damped running sum over the most recent `window` events.
///
/// The seed value of 0.5 counts toward the denominator, so a single perfect
/// event cannot push the pulse all the way to 1.
pub fn telemetry_pulse_score(timeline: &[TelemetryEvent], window: usize) -> f64 {
    if timeline.is_empty() {
        return NEUTRAL;
    }
    let recent = &timeline[timeline.len().saturating_sub(window)..];

    let mut signal = NEUTRAL;
    for event in recent {
        let health = event.metric(&["health", "score"]).unwrap_or(0.5);
        let sentiment = event.metric(&["sentiment"]).unwrap_or(0.0);
        let outages = event.metric(&["outages", "incidents"]).unwrap_or(0.0);

        signal += 0.5 * clamp01(health) + 0.4 * clamp01((sentiment + 1.0) / 2.0)
            - (OUTAGE_PENALTY * outages).min(MAX_OUTAGE_PENALTY);
    }
    clamp01(signal / (recent.len() as f64 + 1.0))
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

/// Assets linked to the borrower that exist in the store.
pub fn linked_assets<'a>(store: &'a EntityStore, borrower_id: &'a str) -> Vec<&'a Asset> {
    store
        .edges_for_borrower(borrower_id)
        .filter_map(|edge| store.asset(&edge.asset_id))
        .collect()
}

/// All four signals for one borrower.
pub fn compute_signals(store: &EntityStore, borrower: &Borrower, window: usize) -> SignalScores {
    let assets = linked_assets(store, &borrower.id);
    let covenants: Vec<&Covenant> = store.covenants_for_borrower(&borrower.id).collect();
    let timeline = store.telemetry_for_borrower(&borrower.id);

    SignalScores {
        payment_history: payment_history_score(&borrower.payment_history),
        asset_coverage: asset_coverage_score(borrower, &assets),
        covenant_health: covenant_health_score(&covenants),
        telemetry_pulse: telemetry_pulse_score(&timeline, window),
    }
}
