//! Merge-by-key for history lists and shallow attribute overlays.
//!
//! History lists (payment periods, performance points, covenant breaches) are
//! merged by a designated key field. Items that carry the key collapse onto
//! the first item with the same key (incoming fields win); items without a key
//! are always appended and never matched.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// A list item that can be deduplicated by a key field.
pub trait MergeKeyed {
    /// The item's merge key, or `None` if the key field is absent.
    fn merge_key(&self) -> Option<&str>;

    /// Shallow-merge `incoming` into `self`; present incoming fields win.
    fn absorb(&mut self, incoming: Self);
}

/// Merge `incoming` into `existing`, preserving first-seen key order.
///
/// Order is existing-then-incoming insertion order, not chronological order.
pub fn merge_unique_by_key<T: MergeKeyed>(existing: Vec<T>, incoming: Vec<T>) -> Vec<T> {
    let mut merged: Vec<T> = Vec::with_capacity(existing.len() + incoming.len());
    let mut slots: HashMap<String, usize> = HashMap::new();

    for item in existing.into_iter().chain(incoming) {
        let key = item.merge_key().map(str::to_string);
        match key {
            Some(key) => match slots.get(&key) {
                Some(&slot) => merged[slot].absorb(item),
                None => {
                    slots.insert(key, merged.len());
                    merged.push(item);
                }
            },
            None => merged.push(item),
        }
    }

    merged
}

/// Overwrite `target` keys with `incoming` keys (shallow, incoming wins).
pub fn overlay_attributes(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        target.insert(key, value);
    }
}

/// Replace `slot` when `incoming` carries a value.
pub fn overlay<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}

/// Ordered union: append the incoming values not already present.
pub fn union_ordered(target: &mut Vec<String>, incoming: Vec<String>) {
    for value in incoming {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        key: Option<String>,
        a: Option<i32>,
        b: Option<i32>,
    }

    impl MergeKeyed for Row {
        fn merge_key(&self) -> Option<&str> {
            self.key.as_deref()
        }

        fn absorb(&mut self, incoming: Self) {
            overlay(&mut self.a, incoming.a);
            overlay(&mut self.b, incoming.b);
        }
    }

    fn row(key: Option<&str>, a: Option<i32>, b: Option<i32>) -> Row {
        Row {
            key: key.map(str::to_string),
            a,
            b,
        }
    }

    #[test]
    fn test_matching_keys_merge_incoming_wins() {
        let merged = merge_unique_by_key(
            vec![row(Some("2024-01"), Some(1), Some(1))],
            vec![row(Some("2024-01"), Some(9), None)],
        );
        assert_eq!(merged, vec![row(Some("2024-01"), Some(9), Some(1))]);
    }

    #[test]
    fn test_unmatched_keys_append_in_order() {
        let merged = merge_unique_by_key(
            vec![row(Some("b"), Some(1), None)],
            vec![row(Some("a"), Some(2), None), row(Some("c"), Some(3), None)],
        );
        let keys: Vec<_> = merged.iter().map(|r| r.key.clone().unwrap_or_default()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_keyless_items_never_match() {
        let merged = merge_unique_by_key(
            vec![row(None, Some(1), None)],
            vec![row(None, Some(1), None), row(None, Some(2), None)],
        );
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_duplicate_keys_within_incoming_collapse() {
        let merged = merge_unique_by_key(
            Vec::new(),
            vec![row(Some("x"), Some(1), None), row(Some("x"), None, Some(2))],
        );
        assert_eq!(merged, vec![row(Some("x"), Some(1), Some(2))]);
    }

    #[test]
    fn test_union_ordered() {
        let mut tags = vec!["cre".to_string(), "watchlist".to_string()];
        union_ordered(&mut tags, vec!["watchlist".to_string(), "office".to_string()]);
        assert_eq!(tags, vec!["cre", "watchlist", "office"]);
    }
}
