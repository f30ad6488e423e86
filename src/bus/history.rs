//! Append-only message history and per-consumer read positions.
//!
//! Every message sent to a bus is appended here and keeps its index for the
//! lifetime of the bus. Consumers track their own [`ReadPointer`] into the
//! history; scanning advances the pointer by exactly one per entry, matched
//! or not.
//!
//! History is never truncated, so memory grows with the number of messages
//! ever sent to the bus.

use crate::error::CallbackError;

/// One history slot.
#[derive(Debug, Clone)]
pub(crate) struct Entry<M> {
    pub message: M,
    /// Set when a captor claimed the message. Captured entries are never
    /// shown to subscriptions or modifiers, including later backfills.
    pub captured: bool,
}

/// Index of the next history entry a consumer has not yet considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub(crate) struct ReadPointer(usize);

impl ReadPointer {
    pub fn index(self) -> usize {
        self.0
    }

    fn advance(&mut self) {
        self.0 += 1;
    }
}

/// A scanning callback failed on the entry at `index`.
#[derive(Debug)]
pub(crate) struct ScanFailure {
    pub index: usize,
    pub source: CallbackError,
}

#[derive(Debug)]
pub(crate) struct History<M> {
    entries: Vec<Entry<M>>,
}

impl<M> Default for History<M> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<M> History<M> {
    /// Append a message and return its index.
    pub fn push(&mut self, message: M) -> usize {
        self.entries.push(Entry {
            message,
            captured: false,
        });
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn end(&self) -> ReadPointer {
        ReadPointer(self.entries.len())
    }

    pub fn get(&self, index: usize) -> Option<&Entry<M>> {
        self.entries.get(index)
    }

    pub fn mark_captured(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.captured = true;
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &M> {
        self.entries.iter().map(|e| &e.message)
    }

    /// Step `pointer` over every entry it has not considered yet, without
    /// evaluating them.
    pub fn skip(&self, pointer: &mut ReadPointer) {
        if pointer.index() < self.entries.len() {
            *pointer = self.end();
        }
    }

    /// Evaluate `eval` against every entry from `pointer` to the end, in
    /// index order, returning `(index, output)` for each match.
    ///
    /// The pointer advances past every scanned entry, including captured
    /// entries (skipped without evaluation) and entries whose callback
    /// failed. Failures are collected rather than stopping the scan when
    /// `stop_on_error` is false.
    pub fn scan<T>(
        &self,
        pointer: &mut ReadPointer,
        stop_on_error: bool,
        mut eval: impl FnMut(&M) -> Result<Option<T>, CallbackError>,
    ) -> (Vec<(usize, T)>, Vec<ScanFailure>) {
        let mut matched = Vec::new();
        let mut failures = Vec::new();

        while let Some(entry) = self.entries.get(pointer.index()) {
            let index = pointer.index();
            pointer.advance();

            if entry.captured {
                continue;
            }
            match eval(&entry.message) {
                Ok(Some(output)) => matched.push((index, output)),
                Ok(None) => {}
                Err(source) => {
                    failures.push(ScanFailure { index, source });
                    if stop_on_error {
                        break;
                    }
                }
            }
        }

        (matched, failures)
    }
}
