//! Bounded context assembly for model prompts.

use super::types::{MemoryRecord, TurnRole};

const FACTS_HEADER: &str = "=== Known Facts ===\n";
const TURNS_HEADER: &str = "\n=== Recent Conversation ===\n";

/// Selects and formats a bounded subset of stored memory for injection
/// before the new user turn.
///
/// Priority under budget pressure: facts first (small, high-value,
/// most-recently-updated retained first), then the recent-turns window with
/// the oldest turns dropped first. Truncation is graceful degradation, never
/// an error; the returned string never exceeds the budget.
pub struct ContextAssembler {
    /// Upper bound on turns considered, regardless of budget
    recent_turns: usize,
}

impl ContextAssembler {
    pub fn new(recent_turns: usize) -> Self {
        Self { recent_turns }
    }

    /// Build the context block for one record within `budget` bytes.
    ///
    /// Returns an empty string for a brand-new identity with no facts and
    /// no turns.
    pub fn assemble(&self, record: &MemoryRecord, budget: usize) -> String {
        if record.is_empty() {
            return String::new();
        }

        let mut out = String::new();

        // Facts, most-recently-updated first when truncation bites
        let mut facts: Vec<_> = record.facts.values().collect();
        facts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut fact_block = String::new();
        let mut facts_truncated = false;
        for fact in facts {
            let line = format!("{}: {}\n", fact.key, fact.value);
            if FACTS_HEADER.len() + fact_block.len() + line.len() > budget {
                // Strict priority: once a fresher fact no longer fits,
                // staler ones must not sneak in ahead of it
                facts_truncated = true;
                break;
            }
            fact_block.push_str(&line);
        }
        if !fact_block.is_empty() {
            out.push_str(FACTS_HEADER);
            out.push_str(&fact_block);
        }

        // Turns only get whatever budget the facts left over. If even the
        // facts did not fit, every turn is dropped.
        if facts_truncated {
            return out;
        }

        let window_start = record.turns.len().saturating_sub(self.recent_turns);
        let window = &record.turns[window_start..];
        if window.is_empty() {
            return out;
        }

        let remaining = budget - out.len();

        // Walk newest-first to decide how many turns fit, then render the
        // survivors in chronological order so recency sits last.
        let mut used = TURNS_HEADER.len();
        let mut keep = 0;
        for turn in window.iter().rev() {
            let line_len = Self::turn_line(turn).len();
            if used + line_len > remaining {
                break;
            }
            used += line_len;
            keep += 1;
        }

        if keep > 0 {
            out.push_str(TURNS_HEADER);
            for turn in &window[window.len() - keep..] {
                out.push_str(&Self::turn_line(turn));
            }
        }

        out
    }

    fn turn_line(turn: &super::types::TurnEntry) -> String {
        let role = match turn.role {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        };
        format!("[{}] {}\n", role, turn.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::{Fact, MemoryRecord};
    use chrono::{Duration, Utc};

    fn record_with(facts: &[(&str, &str)], turns: &[(TurnRole, &str)]) -> MemoryRecord {
        let mut record = MemoryRecord::empty("u1");
        let base = Utc::now();
        for (i, (key, value)) in facts.iter().enumerate() {
            record.facts.insert(
                key.to_string(),
                Fact {
                    key: key.to_string(),
                    value: value.to_string(),
                    // Later facts are fresher
                    updated_at: base + Duration::seconds(i as i64),
                    source_turn_id: i as u64 + 1,
                },
            );
        }
        for (role, text) in turns {
            record.push_turn(*role, *text);
        }
        record
    }

    #[test]
    fn test_empty_record_yields_empty_string() {
        let assembler = ContextAssembler::new(10);
        assert_eq!(assembler.assemble(&MemoryRecord::empty("new-user"), 4000), "");
    }

    #[test]
    fn test_includes_facts_and_turns() {
        let assembler = ContextAssembler::new(10);
        let record = record_with(
            &[("favorite_drink", "tea")],
            &[(TurnRole::User, "hello"), (TurnRole::Assistant, "hi!")],
        );

        let context = assembler.assemble(&record, 4000);
        assert!(context.contains("favorite_drink: tea"));
        assert!(context.contains("[user] hello"));
        assert!(context.contains("[assistant] hi!"));
        // Recency last: the assistant line comes after the fact line
        assert!(context.find("favorite_drink").unwrap() < context.find("[user]").unwrap());
    }

    #[test]
    fn test_never_exceeds_budget() {
        let assembler = ContextAssembler::new(10);
        let record = record_with(
            &[("favorite_drink", "tea"), ("name", "Alexandra")],
            &[
                (TurnRole::User, "tell me something long and rambling"),
                (TurnRole::Assistant, "certainly, here is a long answer"),
            ],
        );

        for budget in 0..400 {
            let context = assembler.assemble(&record, budget);
            assert!(
                context.len() <= budget,
                "budget {} exceeded: {} bytes",
                budget,
                context.len()
            );
        }
    }

    #[test]
    fn test_turns_dropped_before_facts() {
        let assembler = ContextAssembler::new(10);
        let record = record_with(
            &[("favorite_drink", "tea")],
            &[(TurnRole::User, "a fairly long message about nothing much")],
        );

        // Enough for the fact block but not for any turn
        let fact_only = FACTS_HEADER.len() + "favorite_drink: tea\n".len();
        let context = assembler.assemble(&record, fact_only + 5);
        assert!(context.contains("favorite_drink: tea"));
        assert!(!context.contains("[user]"));
    }

    #[test]
    fn test_oldest_turns_dropped_first() {
        let assembler = ContextAssembler::new(10);
        let record = record_with(
            &[],
            &[
                (TurnRole::User, "first message, oldest"),
                (TurnRole::Assistant, "second message"),
                (TurnRole::User, "third message, newest"),
            ],
        );

        let full = assembler.assemble(&record, 4000);
        assert!(full.contains("first message"));

        // Shrink until only the newest survives
        let tight = TURNS_HEADER.len() + "[user] third message, newest\n".len();
        let context = assembler.assemble(&record, tight);
        assert!(context.contains("third message"));
        assert!(!context.contains("first message"));
        assert!(!context.contains("second message"));
    }

    #[test]
    fn test_recent_turns_window_caps_inclusion() {
        let assembler = ContextAssembler::new(2);
        let record = record_with(
            &[],
            &[
                (TurnRole::User, "ancient history"),
                (TurnRole::Assistant, "middle"),
                (TurnRole::User, "latest"),
            ],
        );

        let context = assembler.assemble(&record, 4000);
        assert!(!context.contains("ancient history"));
        assert!(context.contains("middle"));
        assert!(context.contains("latest"));
    }

    #[test]
    fn test_most_recent_facts_kept_under_truncation() {
        let assembler = ContextAssembler::new(10);
        // Second fact is fresher than the first
        let record = record_with(&[("old_fact", "stale value"), ("new_fact", "fresh")], &[]);

        let tight = FACTS_HEADER.len() + "new_fact: fresh\n".len();
        let context = assembler.assemble(&record, tight);
        assert!(context.contains("new_fact: fresh"));
        assert!(!context.contains("old_fact"));
    }
}
