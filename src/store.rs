use crate::errors::PalaverResult;
use crate::model::Message;
use std::collections::HashSet;
use tracing::debug;

/// Outcome of an [`MessageStore::ingest`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    Appended,
    Duplicate,
}

/// Canonical, deduplicated, ordered message list for the active
/// conversation.
///
/// Order is arrival/merge order, never timestamp order: an optimistic local
/// send and the push echo of the same message resolve purely by id dedup,
/// and near-simultaneous traffic may interleave. That approximation is
/// accepted; the store never re-sorts.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Replace content with a history batch, preserving the batch's order,
    /// then re-append any previously ingested message whose id the batch
    /// does not carry (in its prior relative order). Push events that raced
    /// ahead of the history fetch survive the batch landing.
    ///
    /// A malformed entry fails the whole batch with no mutation.
    pub fn load_batch(&mut self, batch: Vec<Message>) -> PalaverResult<()> {
        for message in &batch {
            message.validate()?;
        }

        let mut merged: Vec<Message> = Vec::with_capacity(batch.len() + self.messages.len());
        let mut seen: HashSet<String> = HashSet::with_capacity(batch.len());
        for message in batch {
            if seen.contains(message.id.as_str()) {
                debug!("duplicate id {} within history batch, keeping first", message.id);
                continue;
            }
            seen.insert(message.id.clone());
            merged.push(message);
        }

        let mut carried = 0usize;
        for message in self.messages.drain(..) {
            if !seen.contains(message.id.as_str()) {
                seen.insert(message.id.clone());
                merged.push(message);
                carried += 1;
            }
        }
        if carried > 0 {
            debug!("history batch landed after {} push-delivered messages, union kept them", carried);
        }

        self.messages = merged;
        Ok(())
    }

    /// Append a single message unless an entry with its id already exists.
    /// Both the push echo of a local send and a redundant redelivery report
    /// `Duplicate` and mutate nothing.
    pub fn ingest(&mut self, message: Message) -> PalaverResult<Ingest> {
        message.validate()?;
        if self.contains(&message.id) {
            return Ok(Ingest::Duplicate);
        }
        self.messages.push(message);
        Ok(Ingest::Appended)
    }
}
