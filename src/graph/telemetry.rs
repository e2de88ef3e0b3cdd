//! Bounded per-scope telemetry rings and borrower timelines.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, NaiveDateTime, Utc};

use super::entities::TelemetryEvent;

/// Which ring an event lives in. Borrower and asset ids never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TelemetryScope {
    Borrower(String),
    Asset(String),
}

impl TelemetryScope {
    /// Borrower scope wins when an event names both.
    pub fn of(event: &TelemetryEvent) -> Option<Self> {
        if let Some(id) = event.borrower_id.as_deref().filter(|id| !id.trim().is_empty()) {
            return Some(TelemetryScope::Borrower(id.to_string()));
        }
        event
            .asset_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(|id| TelemetryScope::Asset(id.to_string()))
    }
}

/// Telemetry rings keyed by scope, each capped at `capacity` (oldest evicted).
#[derive(Debug)]
pub struct TelemetryLog {
    rings: HashMap<TelemetryScope, VecDeque<TelemetryEvent>>,
    capacity: usize,
}

impl TelemetryLog {
    pub fn new(capacity: usize) -> Self {
        TelemetryLog {
            rings: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append to the scope's ring; returns how many events were evicted.
    pub fn push(&mut self, scope: TelemetryScope, event: TelemetryEvent) -> usize {
        let ring = self.rings.entry(scope).or_default();
        ring.push_back(event);
        let mut evicted = 0;
        while ring.len() > self.capacity {
            ring.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Events for one scope, oldest first.
    pub fn scope(&self, scope: &TelemetryScope) -> impl Iterator<Item = &TelemetryEvent> {
        self.rings.get(scope).into_iter().flatten()
    }

    pub fn len(&self, scope: &TelemetryScope) -> usize {
        self.rings.get(scope).map_or(0, VecDeque::len)
    }

    pub fn clear(&mut self) {
        self.rings.clear();
    }
}

/// Parse an RFC 3339 timestamp, falling back to a zone-less `YYYY-MM-DD HH:MM:SS`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Stable ascending sort by timestamp. Unparsable timestamps sort first.
pub fn sort_timeline(events: &mut [TelemetryEvent]) {
    events.sort_by_cached_key(|e| e.timestamp.as_deref().and_then(parse_timestamp));
}

/// Synthesized telemetry id: `{source}-{epochMillis}-{random}`.
pub fn synthesize_id(source: &str, now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::random();
    format!("{}-{}-{}", source, now.timestamp_millis(), to_base36(suffix))
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
