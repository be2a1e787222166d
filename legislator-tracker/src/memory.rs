use std::collections::{HashMap, VecDeque};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::sub_feed::SubFeedType;
use crate::types::{NormalizedRecord, Result, PAGE_SIZE};

pub const DEFAULT_CAPACITY: usize = PAGE_SIZE;

/// Bounded recent history of emitted records, kept separately per sub-feed
/// type.
///
/// Each history is a FIFO queue: once it holds `capacity` records, recording
/// another evicts the oldest one. Membership is decided by the type's
/// composite key, never by whole-record equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupMemory {
    capacity: usize,
    histories: HashMap<SubFeedType, VecDeque<NormalizedRecord>>,
}

impl Default for DedupMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DedupMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            histories: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self, kind: SubFeedType) -> usize {
        self.histories.get(&kind).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.histories.values().all(VecDeque::is_empty)
    }

    /// Oldest first.
    pub fn history(&self, kind: SubFeedType) -> impl Iterator<Item = &NormalizedRecord> {
        self.histories.get(&kind).into_iter().flatten()
    }

    pub fn contains(&self, kind: SubFeedType, record: &NormalizedRecord) -> bool {
        let key_fields = kind.key_fields();
        let key = record.composite_key(key_fields);
        self.history(kind)
            .any(|seen| seen.composite_key(key_fields).matches(&key))
    }

    pub fn record(&mut self, kind: SubFeedType, record: NormalizedRecord) {
        let capacity = self.capacity;
        let history = self.histories.entry(kind).or_default();
        while history.len() >= capacity {
            if let Some(evicted) = history.pop_front() {
                debug!("Evicting {} {:?} from memory", kind, evicted.composite_key(kind.key_fields()));
            }
        }
        history.push_back(record);
    }

    /// Records `record` if it is novel. Returns whether it was.
    pub fn check_and_record(&mut self, kind: SubFeedType, record: &NormalizedRecord) -> bool {
        if self.contains(kind, record) {
            return false;
        }
        self.record(kind, record.clone());
        true
    }

    /// Keeps the novel records of a newest-first page, in page order, and
    /// remembers each of them.
    ///
    /// Novelty is judged against the history as it stood before this page,
    /// so recording one survivor can never evict a sibling that is checked
    /// later. Survivors are recorded oldest first, which keeps the front of
    /// the queue at the stalest record.
    pub fn retain_novel(&mut self, kind: SubFeedType, records: Vec<NormalizedRecord>) -> Vec<NormalizedRecord> {
        let key_fields = kind.key_fields();
        let mut novel: Vec<NormalizedRecord> = Vec::new();
        for record in records {
            let key = record.composite_key(key_fields);
            let repeated = novel
                .iter()
                .any(|kept| kept.composite_key(key_fields).matches(&key));
            if !repeated && !self.contains(kind, &record) {
                novel.push(record);
            }
        }

        for record in novel.iter().rev() {
            self.record(kind, record.clone());
        }
        novel
    }

    pub async fn load(path: &Path, capacity: usize) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            info!("No memory file at {}, starting empty", path.display());
            return Ok(Self::new(capacity));
        }
        let bytes = tokio::fs::read(path).await?;
        let mut memory: DedupMemory = serde_json::from_slice(&bytes)?;
        memory.resize(capacity);
        info!("Loaded memory from {}", path.display());
        Ok(memory)
    }

    /// Writes a sibling temp file and renames it over `path`, so a crash
    /// mid-write leaves the previous snapshot intact.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp_path = temp_path(path);
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        debug!("Saved memory to {}", path.display());
        Ok(())
    }

    /// Changes capacity, dropping the oldest entries that no longer fit.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        for history in self.histories.values_mut() {
            while history.len() > self.capacity {
                history.pop_front();
            }
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("memory"));
    name.push(".tmp");
    path.with_file_name(name)
}
