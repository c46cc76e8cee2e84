//! Turn orchestration.
//!
//! Flow per turn: read the identity's record, assemble bounded context,
//! call the model collaborator, then fold the exchange back into memory
//! through the optimistic-concurrency path. A memory fault never aborts the
//! conversation; worst case the assistant "forgets" this turn but still
//! answers.

mod client;

pub use client::{ModelClient, OpenRouterClient};

use crate::memory::{merge, ContextAssembler, FactExtractor, MemoryStore, TurnRole};
use crate::{MnemoConfig, MnemoError, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Retries for a stale `put` before degrading to unpersisted best-effort.
/// Contention is rare under one-human-typing load, so a stale write is
/// transient.
const PUT_ATTEMPTS: u32 = 3;

/// Drives one chat identity's turns against the shared memory store.
pub struct ChatAgent<M: ModelClient> {
    store: Arc<MemoryStore>,
    model: M,
    extractor: FactExtractor,
    assembler: ContextAssembler,
    context_budget: usize,
}

impl<M: ModelClient> ChatAgent<M> {
    pub fn new(config: &MnemoConfig, store: Arc<MemoryStore>, model: M) -> Self {
        Self {
            store,
            model,
            extractor: FactExtractor::new(),
            assembler: ContextAssembler::new(config.recent_turns),
            context_budget: config.context_budget,
        }
    }

    /// Handle one user turn and return the assistant reply.
    ///
    /// Persistence failures are logged for operators and swallowed: the
    /// reply is still delivered, the turn is simply not remembered.
    pub async fn handle_turn(&self, identity: &str, user_text: &str) -> Result<String> {
        let record = self.store.get(identity).await;
        let context = self.assembler.assemble(&record, self.context_budget);
        debug!(
            identity,
            context_bytes = context.len(),
            facts = record.facts.len(),
            "Assembled context"
        );

        let assistant_text = self.model.complete(&context, user_text).await?;

        if let Err(e) = self.persist_turn(identity, user_text, &assistant_text).await {
            error!(
                identity,
                error = %e,
                "Memory unavailable, turn answered but not persisted"
            );
        }

        Ok(assistant_text)
    }

    /// Fold the exchange into the identity's record: append both turns,
    /// extract candidate facts from the user text, merge, bump the version,
    /// `put`. A stale write re-reads the current record and re-applies.
    async fn persist_turn(
        &self,
        identity: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<()> {
        let mut last_err = None;

        for attempt in 1..=PUT_ATTEMPTS {
            let mut record = self.store.get(identity).await;

            let user_turn_id = record.push_turn(TurnRole::User, user_text);
            record.push_turn(TurnRole::Assistant, assistant_text);

            let candidates = self.extractor.extract(user_text, user_turn_id);
            if !candidates.is_empty() {
                info!(identity, count = candidates.len(), "Learned facts this turn");
            }
            record.facts = merge(std::mem::take(&mut record.facts), candidates);
            record.version += 1;

            match self.store.put(identity, record).await {
                Ok(()) => return Ok(()),
                Err(e @ MnemoError::StaleWrite { .. }) => {
                    debug!(identity, attempt, "Stale write, re-reading record");
                    last_err = Some(e);
                }
                Err(e) => {
                    last_err = Some(e);
                    break;
                }
            }
        }

        Err(MnemoError::MemoryUnavailable(
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "persist failed".to_string()),
        ))
    }
}
