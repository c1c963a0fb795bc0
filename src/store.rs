//! Persisted topic -> paper key -> table row mapping.
//!
//! The file is read whole and rewritten whole. Writes go through a temporary
//! file in the target directory that is renamed into place. Concurrent
//! writers are not coordinated; the last one to rename wins.

use std::fs;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::paper::PaperRecord;

pub type PaperRows = IndexMap<String, String>;

/// Freshly fetched rows for a single topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBatch {
    pub topic: String,
    pub papers: PaperRows,
}

impl TopicBatch {
    pub fn new(topic: impl Into<String>, papers: PaperRows) -> Self {
        Self {
            topic: topic.into(),
            papers,
        }
    }

    /// Later records with an already seen key replace the earlier row.
    pub fn from_records(topic: &str, records: &[PaperRecord]) -> Self {
        let papers = records
            .iter()
            .map(|record| (record.key.clone(), record.table_row()))
            .collect();
        Self::new(topic, papers)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TopicStore {
    topics: IndexMap<String, PaperRows>,
}

// On-disk shape; rows may have been written as `null`
type StoredTopics = IndexMap<String, IndexMap<String, Option<String>>>;

impl<'de> Deserialize<'de> for TopicStore {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stored = StoredTopics::deserialize(deserializer)?;
        Ok(stored
            .into_iter()
            .map(|(topic, rows)| {
                let rows = rows
                    .into_iter()
                    .filter_map(|(key, row)| row.map(|row| (key, row)))
                    .collect();
                (topic, rows)
            })
            .collect())
    }
}

impl TopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the store, creating the file as `{}` when it does not exist.
    /// An empty file reads as an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            fs::write(path, "{}")?;
            info!(path = %path.display(), "created empty store");
            return Ok(Self::new());
        }

        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Self::new());
        }
        let store: Self = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), topics = store.topics.len(), "loaded store");
        Ok(store)
    }

    /// Existing topics gain new keys and have overlapping keys replaced;
    /// unknown topics are inserted as fetched.
    pub fn merge<I>(&mut self, batches: I)
    where
        I: IntoIterator<Item = TopicBatch>,
    {
        for batch in batches {
            match self.topics.get_mut(&batch.topic) {
                Some(existing) => existing.extend(batch.papers),
                None => {
                    self.topics.insert(batch.topic, batch.papers);
                }
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut json = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut json, formatter);
        self.serialize(&mut serializer)?;
        write_atomically(path, &json)?;
        info!(path = %path.display(), topics = self.topics.len(), papers = self.paper_count(), "store saved");
        Ok(())
    }

    pub fn topics(&self) -> impl Iterator<Item = (&str, &PaperRows)> {
        self.topics.iter().map(|(topic, rows)| (topic.as_str(), rows))
    }

    pub fn topic(&self, name: &str) -> Option<&PaperRows> {
        self.topics.get(name)
    }

    pub fn paper_count(&self) -> usize {
        self.topics.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

impl FromIterator<(String, PaperRows)> for TopicStore {
    fn from_iter<T: IntoIterator<Item = (String, PaperRows)>>(iter: T) -> Self {
        Self {
            topics: iter.into_iter().collect(),
        }
    }
}

/// Load, merge, and rewrite the store at `path`.
pub fn update_store<I>(path: &Path, batches: I) -> Result<TopicStore>
where
    I: IntoIterator<Item = TopicBatch>,
{
    let mut store = TopicStore::load(path)?;
    store.merge(batches);
    store.save(path)?;
    Ok(store)
}

/// Replaces `path` with `contents` via a sibling temp file and a rename.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
