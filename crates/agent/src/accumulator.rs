//! Reassembly of streamed text and tool-call fragments.

use delve_core::message::ToolCallRecord;
use delve_core::provider::{StreamChunk, ToolCallDelta};
use tracing::warn;

/// How far past the current end a delta index may reach.
pub const MAX_INDEX_GAP: usize = 1024;

/// Folds stream chunks into the assistant's text and its tool-call records.
///
/// Records are addressed by the delta's `index`. A delta for an index past
/// the end grows the collection with empty placeholders first, so a stream
/// that skips indices still yields one slot per index. Deltas more than
/// [`MAX_INDEX_GAP`] past the end are dropped.
#[derive(Debug, Default, Clone)]
pub struct DeltaAccumulator {
    text: String,
    slots: Vec<ToolCallRecord>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk and return the updated accumulator.
    pub fn fold(mut self, chunk: &StreamChunk) -> Self {
        self.absorb(chunk);
        self
    }

    /// Apply one chunk in place.
    pub fn absorb(&mut self, chunk: &StreamChunk) {
        if let Some(text) = &chunk.content {
            self.text.push_str(text);
        }
        for delta in &chunk.tool_calls {
            self.apply(delta);
        }
    }

    /// Apply a single tool-call fragment.
    pub fn apply(&mut self, delta: &ToolCallDelta) {
        let Some(slot) = self.ensure_slot(delta.index as usize) else {
            warn!(index = delta.index, "Dropping tool-call delta with out-of-range index");
            return;
        };

        if let Some(id) = delta.id.as_deref().filter(|id| !id.is_empty()) {
            if slot.id.is_empty() {
                slot.id = id.to_string();
            }
        }
        if let Some(name) = delta.name.as_deref().filter(|n| !n.is_empty()) {
            if slot.name.is_empty() {
                slot.name = name.to_string();
            }
        }
        if let Some(fragment) = &delta.arguments {
            slot.arguments.push_str(fragment);
        }
    }

    /// The record at `index`, creating placeholders up to and including it.
    /// `None` when `index` is more than [`MAX_INDEX_GAP`] past the end.
    pub fn ensure_slot(&mut self, index: usize) -> Option<&mut ToolCallRecord> {
        if index >= self.slots.len() + MAX_INDEX_GAP {
            return None;
        }
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, ToolCallRecord::default);
        }
        self.slots.get_mut(index)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn records(&self) -> &[ToolCallRecord] {
        &self.slots
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Split into the accumulated text and the records, in index order.
    pub fn finish(self) -> (String, Vec<ToolCallRecord>) {
        (self.text, self.slots)
    }
}
