//! In-memory zone used by the unit tests.

use async_trait::async_trait;
use dyndns_provider::{ChangeSet, ProviderError, RecordSet, RecordType, ZoneClient};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct MemoryZone {
    pub exists: bool,
    records: Mutex<Vec<RecordSet>>,
    /// Popped one per `list_record_sets` call before the real answer.
    list_failures: Mutex<VecDeque<ProviderError>>,
    commit_failures: Mutex<VecDeque<ProviderError>>,
    pub lists: AtomicUsize,
    pub commits: AtomicUsize,
}

impl MemoryZone {
    pub fn new() -> Self {
        Self {
            exists: true,
            ..Default::default()
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn with_a(self, name: &str, ip: &str) -> Self {
        self.records.lock().unwrap().push(RecordSet::new(
            name,
            RecordType::A,
            300,
            vec![ip.to_owned()],
        ));
        self
    }

    pub fn with_record(self, rr: RecordSet) -> Self {
        self.records.lock().unwrap().push(rr);
        self
    }

    pub fn fail_lists(self, errs: impl IntoIterator<Item = ProviderError>) -> Self {
        self.list_failures.lock().unwrap().extend(errs);
        self
    }

    pub fn fail_commits(self, errs: impl IntoIterator<Item = ProviderError>) -> Self {
        self.commit_failures.lock().unwrap().extend(errs);
        self
    }

    pub fn records(&self) -> Vec<RecordSet> {
        self.records.lock().unwrap().clone()
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ZoneClient for MemoryZone {
    fn name(&self) -> &'static str {
        "memory"
    }
    fn zone(&self) -> &str {
        "example-zone"
    }

    async fn zone_exists(&self) -> Result<bool, ProviderError> {
        Ok(self.exists)
    }

    async fn list_record_sets(&self) -> Result<Vec<RecordSet>, ProviderError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.list_failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        Ok(self.records())
    }

    async fn apply_changes(&self, changes: &ChangeSet) -> Result<(), ProviderError> {
        if let Some(e) = self.commit_failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        let mut records = self.records.lock().unwrap();
        let mut next = records.clone();
        for del in &changes.deletions {
            let Some(pos) = next.iter().position(|r| r == del) else {
                return Err(ProviderError::from_status(412, "deletion does not match"));
            };
            next.remove(pos);
        }
        next.extend(changes.additions.iter().cloned());
        *records = next;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
