use async_trait::async_trait;
use tracing::{debug, warn};

use super::{DeadLetterStore, Inbound};
use crate::message::Envelope;
use crate::pipeline::Settlement;
use crate::utils::error::Result;

/// Source recorded in the error information of dead-lettered envelopes.
pub const DEAD_LETTER_SOURCE: &str = "embus";

/// Settlement of an envelope the emulator already removed from its entity.
///
/// Completion has nothing left to do. Dead-lettering stamps the envelope's
/// error information with the reason and moves a copy to the entity's
/// dead-letter store.
#[derive(Debug, Clone)]
pub struct EmulatorSettlement {
    envelope: Envelope,
    entity_path: String,
    dead_letters: DeadLetterStore,
}

impl EmulatorSettlement {
    pub fn new(inbound: &Inbound) -> Self {
        Self {
            envelope: inbound.envelope.clone(),
            entity_path: inbound.entity_path.clone(),
            dead_letters: inbound.dead_letters.clone(),
        }
    }
}

#[async_trait]
impl Settlement for EmulatorSettlement {
    async fn complete(&self) -> Result<()> {
        debug!(entity = %self.entity_path, "message completed");
        Ok(())
    }

    async fn dead_letter(&self, reason: &str) -> Result<()> {
        let mut envelope = self.envelope.clone();
        envelope.set_error_information(DEAD_LETTER_SOURCE, reason);
        self.dead_letters.push(envelope);
        warn!(entity = %self.entity_path, reason = %reason, "message dead-lettered");
        Ok(())
    }
}
