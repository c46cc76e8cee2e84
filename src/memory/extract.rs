//! Heuristic fact extraction from user messages.
//!
//! Extraction is an ordered set of pure matcher rules over the new user
//! text; each rule yields zero or one candidate fact. Adding a rule means
//! adding an element to the set, not branching control flow. The heuristics
//! are deliberately conservative: a missed fact is recoverable (the user
//! will restate it), but a bogus fact persists indefinitely and silently
//! pollutes every future context.

use chrono::Utc;
use regex::{Captures, Regex};

use super::types::Fact;

/// Slot words too vague to persist as fact keys ("my guess is ...").
const SLOT_STOPLIST: &[&str] = &[
    "guess", "point", "question", "problem", "concern", "issue", "answer",
];

/// Word → category lexicon for "I like X" style statements. Only values the
/// lexicon recognizes produce a fact; unknown values yield nothing.
const CATEGORY_LEXICON: &[(&str, &str)] = &[
    ("tea", "drink"),
    ("coffee", "drink"),
    ("water", "drink"),
    ("juice", "drink"),
    ("soda", "drink"),
    ("milk", "drink"),
    ("beer", "drink"),
    ("wine", "drink"),
    ("pizza", "food"),
    ("pasta", "food"),
    ("sushi", "food"),
    ("ramen", "food"),
    ("tacos", "food"),
    ("curry", "food"),
    ("chocolate", "food"),
    ("red", "color"),
    ("blue", "color"),
    ("green", "color"),
    ("purple", "color"),
    ("orange", "color"),
    ("yellow", "color"),
    ("black", "color"),
    ("tennis", "sport"),
    ("soccer", "sport"),
    ("football", "sport"),
    ("basketball", "sport"),
    ("chess", "sport"),
    ("running", "sport"),
    ("climbing", "sport"),
    ("jazz", "music"),
    ("rock", "music"),
    ("pop", "music"),
    ("metal", "music"),
    ("classical", "music"),
];

/// One declarative-statement matcher: a compiled pattern plus a builder that
/// turns its captures into a `(key, value)` candidate pair.
struct ExtractionRule {
    name: &'static str,
    pattern: Regex,
    build: fn(&Captures) -> Option<(String, String)>,
}

/// Turns a user message into zero or more candidate facts.
pub struct FactExtractor {
    rules: Vec<ExtractionRule>,
}

impl FactExtractor {
    pub fn new() -> Self {
        Self {
            rules: Self::compile_rules(),
        }
    }

    fn compile_rules() -> Vec<ExtractionRule> {
        vec![
            // "I like tea more than coffee" / "I prefer trains over planes"
            ExtractionRule {
                name: "preference_comparison",
                pattern: Regex::new(
                    r"(?i)^i\s+(?:like|prefer)\s+(.+?)\s+(?:more\s+than|over)\s+.+$",
                )
                .unwrap(),
                build: |caps| {
                    let value = clean_value(&caps[1]);
                    let category = lookup_category(&value)?;
                    Some((format!("favorite_{}", category), value))
                },
            },
            // "my favorite drink is tea" / "my name is Sam"
            ExtractionRule {
                name: "my_slot_is",
                pattern: Regex::new(r"(?i)^my\s+([a-z][a-z' ]{0,40}?)\s+is\s+(.+)$").unwrap(),
                build: |caps| {
                    let slot = normalize_key(&caps[1]);
                    if slot.is_empty() || SLOT_STOPLIST.iter().any(|s| slot.contains(s)) {
                        return None;
                    }
                    let value = clean_value(&caps[2]);
                    if value.is_empty() {
                        return None;
                    }
                    Some((slot, value))
                },
            },
            // "I like tea" / "I love jazz" — only values the lexicon knows
            ExtractionRule {
                name: "simple_preference",
                pattern: Regex::new(r"(?i)^i\s+(?:really\s+)?(?:like|love|enjoy)\s+(.+)$")
                    .unwrap(),
                build: |caps| {
                    let value = clean_value(&caps[1]);
                    let category = lookup_category(&value)?;
                    Some((format!("favorite_{}", category), value))
                },
            },
        ]
    }

    /// Extract candidate facts from a user message.
    ///
    /// Statements are matched per sentence; the first rule to produce a
    /// candidate wins for that sentence. An empty result is the common
    /// case, not an error.
    pub fn extract(&self, user_text: &str, turn_id: u64) -> Vec<Fact> {
        let mut candidates = Vec::new();

        for sentence in user_text.split(['.', '!', '?', '\n']) {
            let stmt = strip_remember_prefix(sentence.trim());
            if stmt.is_empty() {
                continue;
            }

            for rule in &self.rules {
                let Some(caps) = rule.pattern.captures(stmt) else {
                    continue;
                };
                if let Some((key, value)) = (rule.build)(&caps) {
                    tracing::debug!(rule = rule.name, key = %key, "Extracted candidate fact");
                    candidates.push(Fact {
                        key,
                        value,
                        updated_at: Utc::now(),
                        source_turn_id: turn_id,
                    });
                    break;
                }
            }
        }

        candidates
    }
}

impl Default for FactExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip a leading "(please) remember that" so the declarative rules see the
/// statement itself. A remainder that matches no rule produces nothing;
/// there is no catch-all note key.
fn strip_remember_prefix(sentence: &str) -> &str {
    let lower = sentence.to_lowercase();
    for prefix in ["please remember that ", "remember that ", "remember "] {
        if lower.starts_with(prefix) {
            return sentence[prefix.len()..].trim_start();
        }
    }
    sentence
}

/// Normalize a slot phrase into a key: lowercase, runs of non-alphanumerics
/// collapsed to single underscores.
fn normalize_key(slot: &str) -> String {
    let mut key = String::with_capacity(slot.len());
    let mut last_underscore = true;
    for ch in slot.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            key.push(ch.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            key.push('_');
            last_underscore = true;
        }
    }
    key.trim_end_matches('_').to_string()
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_end_matches([',', ';', ':'])
        .trim()
        .to_string()
}

fn lookup_category(value: &str) -> Option<&'static str> {
    let needle = value.to_lowercase();
    CATEGORY_LEXICON
        .iter()
        .find(|(word, _)| *word == needle)
        .map(|(_, category)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_and_values(facts: &[Fact]) -> Vec<(&str, &str)> {
        facts
            .iter()
            .map(|f| (f.key.as_str(), f.value.as_str()))
            .collect()
    }

    #[test]
    fn test_preference_comparison() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("I like tea more than coffee", 1);
        assert_eq!(keys_and_values(&facts), vec![("favorite_drink", "tea")]);
        assert_eq!(facts[0].source_turn_id, 1);
    }

    #[test]
    fn test_my_slot_is() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("My name is Sam.", 3);
        assert_eq!(keys_and_values(&facts), vec![("name", "Sam")]);

        let facts = extractor.extract("my favorite drink is tea", 4);
        assert_eq!(keys_and_values(&facts), vec![("favorite_drink", "tea")]);
    }

    #[test]
    fn test_remember_prefix() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("Remember that my home city is Lisbon", 7);
        assert_eq!(keys_and_values(&facts), vec![("home_city", "Lisbon")]);
    }

    #[test]
    fn test_simple_preference_requires_known_value() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("I like jazz", 2);
        assert_eq!(keys_and_values(&facts), vec![("favorite_music", "jazz")]);

        // Unknown value: better to miss a fact than to persist noise
        let facts = extractor.extract("I like long walks on the beach", 2);
        assert!(facts.is_empty());
    }

    #[test]
    fn test_non_declarative_text_yields_nothing() {
        let extractor = FactExtractor::new();
        for msg in [
            "What's my favorite drink?",
            "How do I sort a vec in Rust?",
            "thanks!",
            "",
        ] {
            assert!(
                extractor.extract(msg, 1).is_empty(),
                "Should extract nothing from: {}",
                msg
            );
        }
    }

    #[test]
    fn test_stoplist_slots_rejected() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("my guess is 42", 1);
        assert!(facts.is_empty());
    }

    #[test]
    fn test_multiple_sentences() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("My name is Ana. I like coffee more than tea.", 5);
        assert_eq!(
            keys_and_values(&facts),
            vec![("name", "Ana"), ("favorite_drink", "coffee")]
        );
    }
}
