//! Fabric builder: borrower evaluations, summaries and the full graph snapshot.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{RiskTier, SignalScores, SignalWeights};

use super::entities::{Asset, Borrower, Covenant, Edge, TelemetryEvent};
use super::numeric::to_risk_scale;
use super::signals::compute_signals;
use super::store::EntityStore;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Blended risk opinion on one borrower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerEvaluation {
    pub borrower_id: String,
    pub borrower: Borrower,
    pub signals: SignalScores,
    /// 0-100, 2 decimals.
    pub risk_score: f64,
    pub risk_tier: RiskTier,
    /// When this evaluation was computed.
    pub updated_at: String,
}

/// A linked asset as seen from the borrower, with its relation label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAsset {
    pub asset_id: String,
    pub relation: String,
    /// `None` when the edge exists but the asset was never upserted.
    pub asset: Option<Asset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerSummary {
    #[serde(flatten)]
    pub evaluation: BorrowerEvaluation,
    pub assets: Vec<LinkedAsset>,
    pub covenants: Vec<Covenant>,
    pub telemetry: Vec<TelemetryEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricIndexEntry {
    pub risk_score: f64,
    pub risk_tier: RiskTier,
}

/// Full-graph snapshot handed to external collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionFabric {
    pub generated_at: String,
    pub weights: SignalWeights,
    pub borrowers: Vec<BorrowerSummary>,
    /// `borrowerId -> {riskScore, riskTier}` for constant-time lookups.
    pub index: HashMap<String, FabricIndexEntry>,
    pub assets: Vec<Asset>,
    pub covenants: Vec<Covenant>,
    pub edges: Vec<Edge>,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Blend signal scores by weight onto the 0-100 scale.
pub fn blend(signals: &SignalScores, weights: &SignalWeights) -> (f64, RiskTier) {
    let risk_score = to_risk_scale(weights.dot(signals));
    (risk_score, RiskTier::from_score(risk_score))
}

/// `None` for an unknown borrower: absence is a valid "no opinion".
pub fn evaluate_borrower(
    store: &EntityStore,
    weights: &SignalWeights,
    borrower_id: &str,
    window: usize,
) -> Option<BorrowerEvaluation> {
    let borrower = store.borrower(borrower_id)?;
    let signals = compute_signals(store, borrower, window);
    let (risk_score, risk_tier) = blend(&signals, weights);

    Some(BorrowerEvaluation {
        borrower_id: borrower.id.clone(),
        borrower: borrower.clone(),
        signals,
        risk_score,
        risk_tier,
        updated_at: Utc::now().to_rfc3339(),
    })
}

pub fn borrower_summary(
    store: &EntityStore,
    weights: &SignalWeights,
    borrower_id: &str,
    window: usize,
) -> Option<BorrowerSummary> {
    let evaluation = evaluate_borrower(store, weights, borrower_id, window)?;

    let assets = store
        .edges_for_borrower(borrower_id)
        .map(|edge| LinkedAsset {
            asset_id: edge.asset_id.clone(),
            relation: edge.relation.clone(),
            asset: store.asset(&edge.asset_id).cloned(),
        })
        .collect();
    let covenants = store.covenants_for_borrower(borrower_id).cloned().collect();
    let telemetry = store.telemetry_for_borrower(borrower_id);

    Some(BorrowerSummary {
        evaluation,
        assets,
        covenants,
        telemetry,
    })
}

pub fn decision_fabric(store: &EntityStore, weights: &SignalWeights, window: usize) -> DecisionFabric {
    let borrowers: Vec<BorrowerSummary> = store
        .borrowers()
        .filter_map(|b| borrower_summary(store, weights, &b.id, window))
        .collect();

    let index = borrowers
        .iter()
        .map(|s| {
            (
                s.evaluation.borrower_id.clone(),
                FabricIndexEntry {
                    risk_score: s.evaluation.risk_score,
                    risk_tier: s.evaluation.risk_tier,
                },
            )
        })
        .collect();

    DecisionFabric {
        generated_at: Utc::now().to_rfc3339(),
        weights: *weights,
        borrowers,
        index,
        assets: store.assets().cloned().collect(),
        covenants: store.covenants().cloned().collect(),
        edges: store.edges().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::entities::PaymentRecord;

    fn store() -> EntityStore {
        EntityStore::new(200, "collateral")
    }

    #[test]
    fn test_unknown_borrower_has_no_opinion() {
        let store = store();
        let weights = SignalWeights::default();
        assert!(evaluate_borrower(&store, &weights, "ghost", 20).is_none());
        assert!(borrower_summary(&store, &weights, "ghost", 20).is_none());
    }

    #[test]
    fn test_neutral_borrower_signals() {
        let mut store = store();
        store.upsert_borrower(Borrower::new("b-1")).expect("upsert");
        let eval = evaluate_borrower(&store, &SignalWeights::default(), "b-1", 20).expect("eval");
        assert_eq!(
            eval.signals,
            SignalScores {
                payment_history: 0.5,
                asset_coverage: 0.5,
                covenant_health: 0.6,
                telemetry_pulse: 0.5,
            }
        );
        // 0.3*0.5 + 0.25*0.5 + 0.2*0.6 + 0.25*0.5 = 0.52
        assert!((eval.risk_score - 52.0).abs() < 1e-9);
        assert_eq!(eval.risk_tier, RiskTier::Concern);
    }

    #[test]
    fn test_global_covenant_weighs_on_every_borrower() {
        let mut store = store();
        store.upsert_borrower(Borrower::new("b-1")).expect("upsert");
        store.upsert_borrower(Borrower::new("b-2")).expect("upsert");

        let mut scoped = Covenant::new("c-1");
        scoped.borrower_id = Some("b-1".into());
        scoped.status = Some("satisfied".into());
        store.upsert_covenant(scoped).expect("upsert");

        let weights = SignalWeights::default();
        let before = evaluate_borrower(&store, &weights, "b-2", 20).expect("eval");
        assert_eq!(before.signals.covenant_health, 0.6);

        let mut global = Covenant::new("c-global");
        global.status = Some("breached".into());
        global.breaches = vec![crate::graph::entities::TimestampedEntry::at("2024-03-01T00:00:00Z")];
        store.upsert_covenant(global).expect("upsert");

        // b-1: one of two satisfied, minus 0.05 for the single breach.
        let b1 = evaluate_borrower(&store, &weights, "b-1", 20).expect("eval");
        assert!((b1.signals.covenant_health - 0.45).abs() < 1e-9);

        let b2 = evaluate_borrower(&store, &weights, "b-2", 20).expect("eval");
        assert_eq!(b2.signals.covenant_health, 0.0);
        assert!(b2.risk_score < before.risk_score);
    }

    #[test]
    fn test_blend_uses_supplied_weights() {
        let scores = SignalScores {
            payment_history: 1.0,
            asset_coverage: 0.0,
            covenant_health: 0.0,
            telemetry_pulse: 0.0,
        };
        let all_payment = SignalWeights {
            payment_history: 1.0,
            asset_coverage: 0.0,
            covenant_health: 0.0,
            telemetry_pulse: 0.0,
        };
        assert_eq!(blend(&scores, &all_payment), (100.0, RiskTier::Stable));
        assert_eq!(blend(&scores, &SignalWeights::default()).1, RiskTier::Critical);
    }

    #[test]
    fn test_summary_resolves_assets_covenants_and_telemetry() {
        let mut store = store();
        store.upsert_borrower(Borrower::new("b-1")).expect("borrower");
        let mut asset = Asset::new("a-1");
        asset.borrower_id = Some("b-1".into());
        asset.relationship = Some("collateral".into());
        store.upsert_asset(asset).expect("asset");
        store.link_borrower_to_asset("b-1", "a-missing", Some("guarantee"));

        let mut scoped = Covenant::new("c-1");
        scoped.borrower_id = Some("b-1".into());
        store.upsert_covenant(scoped).expect("covenant");
        store.upsert_covenant(Covenant::new("c-global")).expect("covenant");
        let mut other = Covenant::new("c-other");
        other.borrower_id = Some("b-2".into());
        store.upsert_covenant(other).expect("covenant");

        store
            .ingest_telemetry(TelemetryEvent::for_asset("a-1").with_metric("health", 0.9))
            .expect("telemetry");

        let summary = borrower_summary(&store, &SignalWeights::default(), "b-1", 20).expect("summary");
        assert_eq!(summary.assets.len(), 2);
        assert!(summary.assets[0].asset.is_some());
        assert_eq!(summary.assets[1].relation, "guarantee");
        assert!(summary.assets[1].asset.is_none());

        let covenant_ids: Vec<_> = summary.covenants.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(covenant_ids, vec!["c-1", "c-global"]);
        assert_eq!(summary.telemetry.len(), 1);
    }

    #[test]
    fn test_fabric_indexes_every_borrower() {
        let mut store = store();
        let mut good = Borrower::new("b-good");
        good.payment_history = vec![PaymentRecord::new("2024-01", "on_time")];
        store.upsert_borrower(good).expect("upsert");
        store.upsert_borrower(Borrower::new("b-new")).expect("upsert");
        store.link_borrower_to_asset("b-good", "a-1", None);

        let fabric = decision_fabric(&store, &SignalWeights::default(), 20);
        assert_eq!(fabric.borrowers.len(), 2);
        assert_eq!(fabric.borrowers[0].evaluation.borrower_id, "b-good");
        assert_eq!(fabric.index.len(), 2);
        assert_eq!(
            fabric.index["b-new"].risk_score,
            fabric.borrowers[1].evaluation.risk_score
        );
        assert_eq!(fabric.edges.len(), 1);
        assert_eq!(fabric.weights, SignalWeights::default());
    }

    #[test]
    fn test_summary_serializes_flat() {
        let mut store = store();
        store.upsert_borrower(Borrower::new("b-1")).expect("upsert");
        let summary = borrower_summary(&store, &SignalWeights::default(), "b-1", 20).expect("summary");
        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["borrowerId"], "b-1");
        assert_eq!(json["riskTier"], "concern");
        assert_eq!(json["signals"]["covenantHealth"], 0.6);
        assert!(json["assets"].as_array().is_some_and(|a| a.is_empty()));
    }
}
