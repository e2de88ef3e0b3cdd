//! Entity store: borrowers, assets, covenants, telemetry rings and edges.
//!
//! Records are created by their first upsert and merged by every later one.
//! Nothing is deleted except by `reset`. Every write validates before it
//! touches any collection.

use std::collections::HashMap;

use chrono::Utc;

use crate::error::{GraphError, GraphResult};

use super::entities::{Asset, Borrower, Covenant, Edge, TelemetryEvent};
use super::telemetry::{self, sort_timeline, TelemetryLog, TelemetryScope};

const DEFAULT_TELEMETRY_SOURCE: &str = "telemetry";

// ---------------------------------------------------------------------------
// Insertion-ordered table
// ---------------------------------------------------------------------------

/// Rows in first-insert order with an id index.
#[derive(Debug)]
pub struct EntityTable<T> {
    rows: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for EntityTable<T> {
    fn default() -> Self {
        EntityTable {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> EntityTable<T> {
    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&slot| &self.rows[slot])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert `row` under `id`, or merge it into the existing row with `merge`.
    fn upsert(&mut self, id: &str, row: T, merge: impl FnOnce(&mut T, T)) -> &mut T {
        let existing = self.index.get(id).copied();
        let slot = match existing {
            Some(slot) => {
                merge(&mut self.rows[slot], row);
                slot
            }
            None => {
                let slot = self.rows.len();
                self.index.insert(id.to_string(), slot);
                self.rows.push(row);
                slot
            }
        };
        &mut self.rows[slot]
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.index.clear();
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct EntityStore {
    borrowers: EntityTable<Borrower>,
    assets: EntityTable<Asset>,
    covenants: EntityTable<Covenant>,
    telemetry: TelemetryLog,
    edges: Vec<Edge>,
    edge_index: HashMap<(String, String), usize>,
    default_relation: String,
}

/// Reject a record whose `id` is missing or blank.
pub fn require_id(kind: &str, id: &str) -> GraphResult<()> {
    if id.trim().is_empty() {
        return Err(GraphError::validation(format!("{} id is required", kind)));
    }
    Ok(())
}

/// Reject a telemetry event that names neither a borrower nor an asset.
pub fn require_scope(event: &TelemetryEvent) -> GraphResult<TelemetryScope> {
    TelemetryScope::of(event)
        .ok_or_else(|| GraphError::validation("telemetry requires borrowerId or assetId"))
}

impl EntityStore {
    pub fn new(max_telemetry: usize, default_relation: &str) -> Self {
        EntityStore {
            borrowers: EntityTable::default(),
            assets: EntityTable::default(),
            covenants: EntityTable::default(),
            telemetry: TelemetryLog::new(max_telemetry),
            edges: Vec::new(),
            edge_index: HashMap::new(),
            default_relation: default_relation.to_string(),
        }
    }

    // -- writes -------------------------------------------------------------

    pub fn upsert_borrower(&mut self, record: Borrower) -> GraphResult<Borrower> {
        require_id("borrower", &record.id)?;
        let id = record.id.clone();
        let merged = self.borrowers.upsert(&id, record, Borrower::absorb);
        merged.updated_at = Some(Utc::now().to_rfc3339());
        log::debug!("Upserted borrower {} ({} periods)", id, merged.payment_history.len());
        Ok(merged.clone())
    }

    /// Upsert an asset. A `borrowerId` on the merged record links the asset.
    pub fn upsert_asset(&mut self, record: Asset) -> GraphResult<Asset> {
        require_id("asset", &record.id)?;
        let id = record.id.clone();
        let merged = self.assets.upsert(&id, record, Asset::absorb);
        merged.updated_at = Some(Utc::now().to_rfc3339());
        let merged = merged.clone();

        if let Some(borrower_id) = merged.borrower_id.as_deref() {
            self.link_borrower_to_asset(borrower_id, &merged.id, merged.relationship.as_deref());
        }
        log::debug!("Upserted asset {}", id);
        Ok(merged)
    }

    pub fn upsert_covenant(&mut self, record: Covenant) -> GraphResult<Covenant> {
        require_id("covenant", &record.id)?;
        let id = record.id.clone();
        let merged = self.covenants.upsert(&id, record, Covenant::absorb);
        merged.updated_at = Some(Utc::now().to_rfc3339());
        log::debug!("Upserted covenant {}", id);
        Ok(merged.clone())
    }

    /// Create or refresh the single edge for `(borrower_id, asset_id)`.
    ///
    /// Blank ids are a no-op and return `None`.
    pub fn link_borrower_to_asset(
        &mut self,
        borrower_id: &str,
        asset_id: &str,
        relation: Option<&str>,
    ) -> Option<Edge> {
        if borrower_id.trim().is_empty() || asset_id.trim().is_empty() {
            return None;
        }
        let relation = relation
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(self.default_relation.as_str())
            .to_string();
        let now = Utc::now().to_rfc3339();
        let key = (borrower_id.to_string(), asset_id.to_string());

        let existing = self.edge_index.get(&key).copied();
        let edge = match existing {
            Some(slot) => {
                let edge = &mut self.edges[slot];
                edge.relation = relation;
                edge.updated_at = now;
                edge.clone()
            }
            None => {
                let edge = Edge {
                    borrower_id: key.0.clone(),
                    asset_id: key.1.clone(),
                    relation,
                    created_at: now.clone(),
                    updated_at: now,
                };
                log::debug!("Linked borrower {} to asset {}", edge.borrower_id, edge.asset_id);
                self.edge_index.insert(key, self.edges.len());
                self.edges.push(edge.clone());
                edge
            }
        };
        Some(edge)
    }

    /// Append a telemetry event to its scope's ring. Fills `id` and `timestamp`.
    pub fn ingest_telemetry(&mut self, mut event: TelemetryEvent) -> GraphResult<TelemetryEvent> {
        let scope = require_scope(&event)?;
        let now = Utc::now();

        if event.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            let source = event
                .source
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(DEFAULT_TELEMETRY_SOURCE);
            event.id = Some(telemetry::synthesize_id(source, now));
        }
        if event.timestamp.as_deref().map_or(true, |ts| ts.trim().is_empty()) {
            event.timestamp = Some(now.to_rfc3339());
        }

        let evicted = self.telemetry.push(scope, event.clone());
        if evicted > 0 {
            log::debug!("Telemetry ring full, evicted {} event(s)", evicted);
        }
        Ok(event)
    }

    pub fn reset(&mut self) {
        self.borrowers.clear();
        self.assets.clear();
        self.covenants.clear();
        self.telemetry.clear();
        self.edges.clear();
        self.edge_index.clear();
    }

    // -- reads --------------------------------------------------------------

    pub fn borrower(&self, id: &str) -> Option<&Borrower> {
        self.borrowers.get(id)
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.get(id)
    }

    pub fn covenant(&self, id: &str) -> Option<&Covenant> {
        self.covenants.get(id)
    }

    pub fn has_borrower(&self, id: &str) -> bool {
        self.borrowers.contains(id)
    }

    pub fn borrowers(&self) -> impl Iterator<Item = &Borrower> {
        self.borrowers.iter()
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    pub fn covenants(&self) -> impl Iterator<Item = &Covenant> {
        self.covenants.iter()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges leaving `borrower_id`, in link order.
    pub fn edges_for_borrower<'a>(&'a self, borrower_id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.borrower_id == borrower_id)
    }

    /// Global covenants plus those scoped to `borrower_id`.
    pub fn covenants_for_borrower<'a>(
        &'a self,
        borrower_id: &'a str,
    ) -> impl Iterator<Item = &'a Covenant> {
        self.covenants.iter().filter(move |c| c.applies_to(borrower_id))
    }

    /// Borrower telemetry plus telemetry of every linked asset, oldest first.
    pub fn telemetry_for_borrower(&self, borrower_id: &str) -> Vec<TelemetryEvent> {
        let mut timeline: Vec<TelemetryEvent> = self
            .telemetry
            .scope(&TelemetryScope::Borrower(borrower_id.to_string()))
            .cloned()
            .collect();
        for edge in self.edges_for_borrower(borrower_id) {
            timeline.extend(
                self.telemetry
                    .scope(&TelemetryScope::Asset(edge.asset_id.clone()))
                    .cloned(),
            );
        }
        sort_timeline(&mut timeline);
        timeline
    }

    pub fn telemetry_len(&self, scope: &TelemetryScope) -> usize {
        self.telemetry.len(scope)
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
    fn test_upsert_rejects_missing_id() {
        let mut store = store();
        let err = store.upsert_borrower(Borrower::default()).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
        assert!(store.upsert_asset(Asset::new("  ")).is_err());
        assert!(store.upsert_covenant(Covenant::default()).is_err());
        assert_eq!(store.borrowers().count(), 0);
        assert_eq!(store.assets().count(), 0);
    }

    #[test]
    fn test_upsert_stamps_updated_at() {
        let mut store = store();
        let merged = store.upsert_borrower(Borrower::new("b-1")).expect("upsert");
        assert!(merged.updated_at.is_some());
        assert_eq!(store.borrower("b-1").and_then(|b| b.updated_at.clone()), merged.updated_at);
    }

    #[test]
    fn test_repeat_upsert_is_idempotent_on_periods() {
        let mut store = store();
        let mut record = Borrower::new("b-1");
        record.payment_history = vec![
            PaymentRecord::new("2024-01", "on_time"),
            PaymentRecord::new("2024-02", "late").with_days_late(5.0),
        ];
        store.upsert_borrower(record.clone()).expect("first");
        let merged = store.upsert_borrower(record).expect("second");
        assert_eq!(merged.payment_history.len(), 2);
        assert_eq!(store.borrowers().count(), 1);
    }

    #[test]
    fn test_asset_with_borrower_creates_single_edge() {
        let mut store = store();
        let mut asset = Asset::new("a-1");
        asset.borrower_id = Some("b-1".into());
        store.upsert_asset(asset.clone()).expect("first");
        asset.relationship = Some("guarantee".into());
        store.upsert_asset(asset).expect("second");

        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.edges()[0].relation, "guarantee");
    }

    #[test]
    fn test_asset_without_relationship_uses_default_relation() {
        let mut store = store();
        let mut asset = Asset::new("a-1");
        asset.borrower_id = Some("b-1".into());
        store.upsert_asset(asset).expect("upsert");
        assert_eq!(store.edges()[0].relation, "collateral");
    }

    #[test]
    fn test_link_is_idempotent_and_updates_in_place() {
        let mut store = store();
        let first = store
            .link_borrower_to_asset("b-1", "a-1", Some("collateral"))
            .expect("edge");
        let second = store
            .link_borrower_to_asset("b-1", "a-1", Some("cross-collateral"))
            .expect("edge");
        assert_eq!(store.edges().len(), 1);
        assert_eq!(second.relation, "cross-collateral");
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn test_link_with_blank_ids_is_noop() {
        let mut store = store();
        assert!(store.link_borrower_to_asset("", "a-1", None).is_none());
        assert!(store.link_borrower_to_asset("b-1", "", None).is_none());
        assert!(store.edges().is_empty());
    }

    #[test]
    fn test_telemetry_requires_scope() {
        let mut store = store();
        let err = store.ingest_telemetry(TelemetryEvent::default()).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn test_telemetry_blank_scope_is_rejected_like_blank_ids() {
        let mut store = store();
        assert!(store.ingest_telemetry(TelemetryEvent::for_borrower("   ")).is_err());
        assert!(store.ingest_telemetry(TelemetryEvent::for_asset("\t")).is_err());
        assert!(require_id("borrower", "   ").is_err());

        let mut both = TelemetryEvent::for_asset("a-1");
        both.borrower_id = Some("  ".into());
        let stored = store.ingest_telemetry(both).expect("asset scope");
        assert_eq!(stored.asset_id.as_deref(), Some("a-1"));
        assert_eq!(store.telemetry_len(&TelemetryScope::Asset("a-1".into())), 1);
    }

    #[test]
    fn test_telemetry_fills_id_and_timestamp() {
        let mut store = store();
        let mut event = TelemetryEvent::for_borrower("b-1");
        event.source = Some("servicer".into());
        let stored = store.ingest_telemetry(event).expect("ingest");
        assert!(stored.id.as_deref().is_some_and(|id| id.starts_with("servicer-")));
        assert!(stored.timestamp.is_some());

        let kept = store
            .ingest_telemetry(TelemetryEvent::for_borrower("b-1").at("2024-01-01T00:00:00Z"))
            .expect("ingest");
        assert!(kept.id.as_deref().is_some_and(|id| id.starts_with("telemetry-")));
        assert_eq!(kept.timestamp.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_telemetry_ring_is_bounded() {
        let mut store = EntityStore::new(5, "collateral");
        for i in 0..8 {
            let mut event = TelemetryEvent::for_borrower("b-1");
            event.id = Some(format!("e{i}"));
            store.ingest_telemetry(event).expect("ingest");
        }
        let scope = TelemetryScope::Borrower("b-1".into());
        assert_eq!(store.telemetry_len(&scope), 5);
        let timeline = store.telemetry_for_borrower("b-1");
        let ids: Vec<_> = timeline.iter().filter_map(|e| e.id.clone()).collect();
        assert_eq!(ids.first().map(String::as_str), Some("e3"));
    }

    #[test]
    fn test_borrower_timeline_includes_linked_assets_sorted() {
        let mut store = store();
        store.link_borrower_to_asset("b-1", "a-1", None);
        store
            .ingest_telemetry(TelemetryEvent::for_borrower("b-1").at("2024-01-03T00:00:00Z"))
            .expect("ingest");
        store
            .ingest_telemetry(TelemetryEvent::for_asset("a-1").at("2024-01-01T00:00:00Z"))
            .expect("ingest");
        store
            .ingest_telemetry(TelemetryEvent::for_asset("a-2").at("2024-01-02T00:00:00Z"))
            .expect("ingest");

        let timeline = store.telemetry_for_borrower("b-1");
        let stamps: Vec<_> = timeline.iter().filter_map(|e| e.timestamp.clone()).collect();
        assert_eq!(stamps, vec!["2024-01-01T00:00:00Z", "2024-01-03T00:00:00Z"]);
    }

    #[test]
    fn test_scopes_do_not_collide() {
        let mut store = store();
        store
            .ingest_telemetry(TelemetryEvent::for_asset("x-1"))
            .expect("ingest");
        assert!(store.telemetry_for_borrower("x-1").is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = store();
        store.upsert_borrower(Borrower::new("b-1")).expect("upsert");
        store.link_borrower_to_asset("b-1", "a-1", None);
        store
            .ingest_telemetry(TelemetryEvent::for_borrower("b-1"))
            .expect("ingest");
        store.reset();
        assert!(store.borrower("b-1").is_none());
        assert!(store.edges().is_empty());
        assert!(store.telemetry_for_borrower("b-1").is_empty());

        store.link_borrower_to_asset("b-1", "a-1", None);
        assert_eq!(store.edges().len(), 1);
    }
}
