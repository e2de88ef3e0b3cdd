//! Autonomous credit operating graph.
//!
//! An in-memory knowledge graph of borrowers, assets, covenants and telemetry
//! that scores each borrower on four signals and blends them with a weight
//! vector learned from human feedback. The graph is a volatile derived-data
//! cache; durable storage belongs to the caller.
//!
//! All state sits behind one `RwLock`. Writers hold it for the whole operation,
//! so readers never see a half-renormalized weight vector.

pub mod entities;
pub mod fabric;
pub mod merge;
pub mod numeric;
pub mod requests;
pub mod signals;
pub mod store;
pub mod telemetry;
pub mod weights;

use parking_lot::RwLock;

use crate::error::{GraphError, GraphResult};
use crate::types::{GraphConfig, SignalWeights};

use entities::{Asset, Borrower, Covenant, Edge, TelemetryEvent};
use fabric::{BorrowerEvaluation, BorrowerSummary, DecisionFabric};
use requests::{parse_labels, FeedbackOutcome, FeedbackRequest, IngestBatch};
use store::EntityStore;
use weights::{FeedbackRecord, WeightLearner};

struct GraphState {
    store: EntityStore,
    learner: WeightLearner,
}

/// Explicitly constructed graph service. `Sync`, so hosts may share it across threads.
pub struct CreditGraph {
    config: GraphConfig,
    state: RwLock<GraphState>,
}

impl Default for CreditGraph {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

impl CreditGraph {
    pub fn new(config: GraphConfig) -> Self {
        let state = GraphState {
            store: EntityStore::new(config.max_telemetry, &config.default_relation),
            learner: WeightLearner::new(
                config.default_weights,
                config.learning_rate,
                config.decay_factor,
                config.max_feedback_history,
            ),
        };
        CreditGraph {
            config,
            state: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // =========================================================================
    // Entity store
    // =========================================================================

    pub fn upsert_borrower(&self, record: Borrower) -> GraphResult<Borrower> {
        self.state.write().store.upsert_borrower(record)
    }

    pub fn upsert_asset(&self, record: Asset) -> GraphResult<Asset> {
        self.state.write().store.upsert_asset(record)
    }

    pub fn upsert_covenant(&self, record: Covenant) -> GraphResult<Covenant> {
        self.state.write().store.upsert_covenant(record)
    }

    /// No-op (returns `None`) when either id is blank.
    pub fn link_borrower_to_asset(
        &self,
        borrower_id: &str,
        asset_id: &str,
        relation: Option<&str>,
    ) -> Option<Edge> {
        self.state
            .write()
            .store
            .link_borrower_to_asset(borrower_id, asset_id, relation)
    }

    pub fn ingest_telemetry(&self, event: TelemetryEvent) -> GraphResult<TelemetryEvent> {
        self.state.write().store.ingest_telemetry(event)
    }

    /// Direct plus linked-asset telemetry for a borrower, oldest first.
    pub fn telemetry_for_borrower(&self, borrower_id: &str) -> Vec<TelemetryEvent> {
        self.state.read().store.telemetry_for_borrower(borrower_id)
    }

    /// Validate the whole batch, apply it in type order, return the fabric.
    pub fn ingest_batch(&self, batch: IngestBatch) -> GraphResult<DecisionFabric> {
        batch.validate()?;
        let counts = (
            batch.borrowers.len(),
            batch.assets.len(),
            batch.covenants.len(),
            batch.telemetry.len(),
        );

        let mut state = self.state.write();
        for record in batch.borrowers {
            state.store.upsert_borrower(record)?;
        }
        for record in batch.assets {
            state.store.upsert_asset(record)?;
        }
        for record in batch.covenants {
            state.store.upsert_covenant(record)?;
        }
        for event in batch.telemetry {
            state.store.ingest_telemetry(event)?;
        }
        log::info!(
            "Ingested batch: {} borrower(s), {} asset(s), {} covenant(s), {} telemetry event(s)",
            counts.0,
            counts.1,
            counts.2,
            counts.3
        );

        let weights = state.learner.weights();
        Ok(fabric::decision_fabric(&state.store, &weights, self.config.telemetry_window))
    }

    /// Clear every collection and restore default weights.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.store.reset();
        state.learner.reset();
        log::info!("Credit graph reset to defaults");
    }

    // =========================================================================
    // Weight learner
    // =========================================================================

    pub fn weights(&self) -> SignalWeights {
        self.state.read().learner.weights()
    }

    /// Nudge one signal weight from human feedback and re-evaluate the borrower.
    pub fn apply_feedback(&self, request: FeedbackRequest) -> GraphResult<FeedbackOutcome> {
        let (borrower_id, signal, direction, magnitude) = request.required_fields()?;

        let mut state = self.state.write();
        if !state.store.has_borrower(borrower_id) {
            return Err(GraphError::not_found(format!("borrower {}", borrower_id)));
        }
        let (signal, direction) = parse_labels(signal, direction)?;

        let record = state
            .learner
            .apply(borrower_id, signal, direction, magnitude, request.notes.clone());
        log::info!(
            "Applied {} feedback on {} for borrower {} (delta {:+.4})",
            direction.as_str(),
            signal,
            borrower_id,
            record.delta
        );

        let weights = state.learner.weights();
        let evaluation = fabric::evaluate_borrower(
            &state.store,
            &weights,
            borrower_id,
            self.config.telemetry_window,
        )
        .ok_or_else(|| GraphError::not_found(format!("borrower {}", borrower_id)))?;

        Ok(FeedbackOutcome {
            feedback_id: record.id,
            weights,
            evaluation,
        })
    }

    /// Caller-scheduled drift of every weight by the decay factor.
    pub fn decay_signal_weights(&self) -> SignalWeights {
        let weights = self.state.write().learner.decay();
        log::info!("Decayed signal weights: {:?}", weights);
        weights
    }

    pub fn feedback_history(&self) -> Vec<FeedbackRecord> {
        self.state.read().learner.history()
    }

    // =========================================================================
    // Fabric builder
    // =========================================================================

    pub fn evaluate_borrower(&self, borrower_id: &str) -> Option<BorrowerEvaluation> {
        let state = self.state.read();
        let weights = state.learner.weights();
        fabric::evaluate_borrower(&state.store, &weights, borrower_id, self.config.telemetry_window)
    }

    pub fn borrower_summary(&self, borrower_id: &str) -> Option<BorrowerSummary> {
        let state = self.state.read();
        let weights = state.learner.weights();
        fabric::borrower_summary(&state.store, &weights, borrower_id, self.config.telemetry_window)
    }

    pub fn decision_fabric(&self) -> DecisionFabric {
        let state = self.state.read();
        let weights = state.learner.weights();
        fabric::decision_fabric(&state.store, &weights, self.config.telemetry_window)
    }

    // -- plain reads ----------------------------------------------------------

    pub fn borrower(&self, id: &str) -> Option<Borrower> {
        self.state.read().store.borrower(id).cloned()
    }

    pub fn asset(&self, id: &str) -> Option<Asset> {
        self.state.read().store.asset(id).cloned()
    }

    pub fn covenant(&self, id: &str) -> Option<Covenant> {
        self.state.read().store.covenant(id).cloned()
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.state.read().store.edges().to_vec()
    }

    pub fn borrower_ids(&self) -> Vec<String> {
        self.state.read().store.borrowers().map(|b| b.id.clone()).collect()
    }
}
