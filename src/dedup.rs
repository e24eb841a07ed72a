use std::collections::HashSet;

use crate::record::JobRecord;

/// Tracks external ids emitted during one run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a record the first time its id is offered; reject repeats.
    pub fn offer(&mut self, record: &JobRecord) -> bool {
        self.seen.insert(record.external_id.clone())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
