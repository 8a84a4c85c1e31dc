use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::{AnalysisError, Job, SharedStore, TaskQueue};

/// In-process [`SharedStore`] for single-replica deployments and tests.
/// Per-key atomicity comes from the DashMap entry API; a multi-replica
/// deployment swaps in a store backed by something external.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> Result<bool, AnalysisError> {
        let applied = match (expected, new) {
            (None, Some(value)) => match self.map.entry(key.to_string()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(value.to_string());
                    true
                }
            },
            (Some(expected), Some(value)) => match self.map.entry(key.to_string()) {
                Entry::Occupied(mut slot) if slot.get() == expected => {
                    slot.insert(value.to_string());
                    true
                }
                _ => false,
            },
            (Some(expected), None) => self
                .map
                .remove_if(key, |_, current| current == expected)
                .is_some(),
            (None, None) => !self.map.contains_key(key),
        };
        Ok(applied)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AnalysisError> {
        Ok(self.map.get(key).map(|value| value.clone()))
    }
}

/// Default [`TaskQueue`]: fire-and-forget onto the tokio runtime
#[derive(Debug, Default)]
pub struct TokioSpawner;

impl TaskQueue for TokioSpawner {
    fn enqueue(&self, job: Job) {
        tokio::spawn(job);
    }
}
