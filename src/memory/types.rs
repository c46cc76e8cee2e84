//! Record types stored per identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single durable statement about an identity.
///
/// `key` is a normalized slot name ("favorite_drink"); the key is unique
/// within one record, so a new fact with the same key supersedes the old
/// value instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
    /// Turn the fact was extracted from
    pub source_turn_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One raw exchanged message, append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEntry {
    /// Strictly increasing per identity, continues across restarts
    pub turn_id: u64,
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// The complete persisted state for one identity.
///
/// `version` increments on every successfully persisted mutation and is the
/// optimistic-concurrency token checked by [`MemoryStore::put`].
///
/// [`MemoryStore::put`]: super::MemoryStore::put
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub identity: String,
    /// BTreeMap keeps the on-disk JSON sorted and hand-editable
    pub facts: BTreeMap<String, Fact>,
    pub turns: Vec<TurnEntry>,
    pub version: u64,
}

impl MemoryRecord {
    /// Fresh record for a previously unseen identity.
    pub fn empty(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            facts: BTreeMap::new(),
            turns: Vec::new(),
            version: 0,
        }
    }

    /// Next turn id: one past the last persisted turn, starting at 1.
    pub fn next_turn_id(&self) -> u64 {
        self.turns.last().map(|t| t.turn_id + 1).unwrap_or(1)
    }

    /// Append a turn with the next monotonic id. Returns the assigned id.
    pub fn push_turn(&mut self, role: TurnRole, text: impl Into<String>) -> u64 {
        let turn_id = self.next_turn_id();
        self.turns.push(TurnEntry {
            turn_id,
            role,
            text: text.into(),
            timestamp: Utc::now(),
        });
        turn_id
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.turns.is_empty()
    }
}
