//! Reconciling candidate facts against an existing record.

use std::collections::BTreeMap;
use tracing::debug;

use super::types::Fact;

/// Merge candidate facts into an existing fact map.
///
/// Per candidate: absent key → insert; present key with a different value →
/// supersede (the old value is discarded, no history kept); present key with
/// an identical value after case/whitespace normalization → no-op, so the
/// existing fact keeps its original `updated_at`. Merging the same batch
/// twice yields the same map as merging it once.
pub fn merge(existing: BTreeMap<String, Fact>, candidates: Vec<Fact>) -> BTreeMap<String, Fact> {
    let mut facts = existing;

    for candidate in candidates {
        match facts.get(&candidate.key) {
            Some(current) if normalized(&current.value) == normalized(&candidate.value) => {
                debug!(key = %candidate.key, "Fact unchanged, keeping existing entry");
            }
            Some(current) => {
                debug!(
                    key = %candidate.key,
                    old = %current.value,
                    new = %candidate.value,
                    "Superseding fact"
                );
                facts.insert(candidate.key.clone(), candidate);
            }
            None => {
                debug!(key = %candidate.key, value = %candidate.value, "New fact");
                facts.insert(candidate.key.clone(), candidate);
            }
        }
    }

    facts
}

fn normalized(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn fact(key: &str, value: &str, turn: u64) -> Fact {
        Fact {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: Utc::now(),
            source_turn_id: turn,
        }
    }

    #[test]
    fn test_insert_new_fact() {
        let merged = merge(BTreeMap::new(), vec![fact("name", "Sam", 1)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged["name"].value, "Sam");
    }

    #[test]
    fn test_supersede_keeps_single_entry() {
        let existing = merge(BTreeMap::new(), vec![fact("drink", "coffee", 1)]);
        let merged = merge(existing, vec![fact("drink", "tea", 5)]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged["drink"].value, "tea");
        assert_eq!(merged["drink"].source_turn_id, 5);
    }

    #[test]
    fn test_identical_value_is_noop() {
        let existing = merge(BTreeMap::new(), vec![fact("drink", "tea", 1)]);
        let original_stamp = existing["drink"].updated_at;

        // Same value modulo case and whitespace
        let merged = merge(existing, vec![fact("drink", "  TEA ", 9)]);
        assert_eq!(merged["drink"].value, "tea");
        assert_eq!(merged["drink"].updated_at, original_stamp);
        assert_eq!(merged["drink"].source_turn_id, 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batch = vec![fact("name", "Ana", 2), fact("drink", "tea", 2)];
        let once = merge(BTreeMap::new(), batch.clone());
        let twice = merge(once.clone(), batch);
        assert_eq!(once, twice);
    }
}
