//! Journal-backed collection implementation.

use crate::{StoreError, StoreResult};
use clinic_id::RecordId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Key used for tombstone journal lines.
const TOMBSTONE_KEY: &str = "$$deleted";

/// A record that can live in a [`Collection`].
///
/// Every document carries its own identifier; the collection keys its
/// working set and journal by it.
pub trait Document: Serialize + DeserializeOwned + Clone {
    fn id(&self) -> &RecordId;
}

/// Key extractor for an index. Returning `None` leaves the document out of
/// that index (sparse semantics).
type KeyFn<T> = fn(&T) -> Option<String>;

struct IndexSpec<T> {
    name: String,
    key: KeyFn<T>,
    unique: bool,
}

/// Builder for a [`Collection`].
///
/// Indexes must be registered before the journal is opened so that replay
/// can rebuild them and uniqueness holds from the first insert.
pub struct CollectionOptions<T: Document> {
    indexes: Vec<IndexSpec<T>>,
}

impl<T: Document> Default for CollectionOptions<T> {
    fn default() -> Self {
        Self {
            indexes: Vec::new(),
        }
    }
}

impl<T: Document> CollectionOptions<T> {
    /// Registers a unique index. Inserts and updates producing a key already
    /// held by another document fail with [`StoreError::UniqueViolation`].
    pub fn unique_index(mut self, name: impl Into<String>, key: KeyFn<T>) -> Self {
        self.indexes.push(IndexSpec {
            name: name.into(),
            key,
            unique: true,
        });
        self
    }

    /// Registers a non-unique index for keyed lookups via
    /// [`Collection::find_by`].
    pub fn index(mut self, name: impl Into<String>, key: KeyFn<T>) -> Self {
        self.indexes.push(IndexSpec {
            name: name.into(),
            key,
            unique: false,
        });
        self
    }

    /// Opens the collection, replaying and compacting the journal at `path`.
    ///
    /// Lines that cannot be parsed are skipped with a warning rather than
    /// failing the open; the subsequent compaction drops them from the file.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the journal cannot be read or rewritten, or
    /// if the replayed data violates a unique index (which indicates outside
    /// interference with the journal file).
    pub fn open(self, path: impl Into<PathBuf>) -> StoreResult<Collection<T>> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut collection = Collection {
            path,
            docs: BTreeMap::new(),
            indexes: self.indexes,
            entries: HashMap::new(),
        };
        for spec in &collection.indexes {
            collection.entries.insert(spec.name.clone(), HashMap::new());
        }

        collection.replay()?;
        collection.compact()?;
        Ok(collection)
    }
}

/// A file-backed collection of documents with in-memory indexes.
///
/// See the crate docs for the journal format and durability model. All reads
/// are served from memory; every mutation appends one journal line before
/// the working set changes, so a crash mid-operation leaves at worst a
/// truncated final line, which replay skips.
pub struct Collection<T: Document> {
    path: PathBuf,
    docs: BTreeMap<RecordId, T>,
    indexes: Vec<IndexSpec<T>>,
    entries: HashMap<String, HashMap<String, BTreeSet<RecordId>>>,
}

impl<T: Document> Collection<T> {
    /// Starts building a collection.
    pub fn options() -> CollectionOptions<T> {
        CollectionOptions::default()
    }

    /// Opens a collection with no indexes.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        CollectionOptions::default().open(path)
    }

    /// Path of the backing journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Inserts a new document.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::DuplicateId`] if the id is already present,
    /// [`StoreError::UniqueViolation`] if a unique index key is taken, or an
    /// I/O error if the journal append fails. Nothing is written on a
    /// constraint failure.
    pub fn insert(&mut self, doc: T) -> StoreResult<T> {
        if self.docs.contains_key(doc.id()) {
            return Err(StoreError::DuplicateId(doc.id().to_string()));
        }
        self.check_unique(&doc)?;

        let line = serde_json::to_string(&doc).map_err(StoreError::Serialize)?;
        self.append_line(&line)?;

        self.index_insert(&doc);
        self.docs.insert(doc.id().clone(), doc.clone());
        Ok(doc)
    }

    /// Returns the document with the given id, if any.
    pub fn get(&self, id: &RecordId) -> Option<T> {
        self.docs.get(id).cloned()
    }

    /// Returns the first document matching `pred`, in id order.
    pub fn find_one(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.docs.values().find(|d| pred(d)).cloned()
    }

    /// Returns all documents matching `pred`, in id order.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.docs.values().filter(|d| pred(d)).cloned().collect()
    }

    /// Returns all documents whose registered index `name` maps to `key`.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::UnknownIndex`] if `name` was never
    /// registered.
    pub fn find_by(&self, name: &str, key: &str) -> StoreResult<Vec<T>> {
        let entries = self
            .entries
            .get(name)
            .ok_or_else(|| StoreError::UnknownIndex(name.to_string()))?;

        let Some(ids) = entries.get(key) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| self.get(id)).collect())
    }

    /// Applies `f` to the document with the given id and persists the
    /// result.
    ///
    /// Returns `Ok(false)` when the id is absent; a zero-match update is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::UniqueViolation`] if the mutation moves a
    /// unique index key onto one held by another document; the stored
    /// document is left untouched in that case.
    pub fn update(&mut self, id: &RecordId, f: impl FnOnce(&mut T)) -> StoreResult<bool> {
        let Some(old) = self.docs.get(id).cloned() else {
            return Ok(false);
        };

        let mut updated = old.clone();
        f(&mut updated);
        self.check_unique(&updated)?;

        let line = serde_json::to_string(&updated).map_err(StoreError::Serialize)?;
        self.append_line(&line)?;

        self.index_remove(&old);
        self.index_insert(&updated);
        self.docs.insert(id.clone(), updated);
        Ok(true)
    }

    /// Removes the document with the given id.
    ///
    /// Returns `Ok(false)` when the id is absent; a zero-match delete is not
    /// an error.
    pub fn remove(&mut self, id: &RecordId) -> StoreResult<bool> {
        let Some(doc) = self.docs.get(id).cloned() else {
            return Ok(false);
        };

        let tombstone = serde_json::json!({ TOMBSTONE_KEY: id.to_string() });
        self.append_line(&tombstone.to_string())?;

        self.index_remove(&doc);
        self.docs.remove(id);
        Ok(true)
    }

    /// Removes every document matching `pred`, returning how many were
    /// removed.
    pub fn remove_where(&mut self, pred: impl Fn(&T) -> bool) -> StoreResult<usize> {
        let ids: Vec<RecordId> = self
            .docs
            .values()
            .filter(|d| pred(d))
            .map(|d| d.id().clone())
            .collect();

        let mut removed = 0;
        for id in ids {
            if self.remove(&id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Rewrites the journal with one line per live document, dropping
    /// superseded versions and tombstones.
    pub fn compact(&mut self) -> StoreResult<()> {
        let mut out = String::new();
        for doc in self.docs.values() {
            let line = serde_json::to_string(doc).map_err(StoreError::Serialize)?;
            out.push_str(&line);
            out.push('\n');
        }
        fs::write(&self.path, out)?;
        Ok(())
    }

    fn replay(&mut self) -> StoreResult<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let contents = fs::read_to_string(&self.path)?;
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }

            let value: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(
                        "skipping corrupt journal line in {}: {}",
                        self.path.display(),
                        e
                    );
                    continue;
                }
            };

            if let Some(id_str) = value.get(TOMBSTONE_KEY).and_then(|v| v.as_str()) {
                match RecordId::parse(id_str) {
                    Ok(id) => {
                        if let Some(doc) = self.docs.remove(&id) {
                            self.index_remove(&doc);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            "skipping tombstone with invalid id in {}: {}",
                            self.path.display(),
                            e
                        );
                    }
                }
                continue;
            }

            let doc: T = match serde_json::from_value(value) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(
                        "skipping unreadable document in {}: {}",
                        self.path.display(),
                        e
                    );
                    continue;
                }
            };

            // Later journal lines supersede earlier ones for the same id.
            if let Some(old) = self.docs.remove(doc.id()) {
                self.index_remove(&old);
            }
            self.check_unique(&doc)?;
            self.index_insert(&doc);
            self.docs.insert(doc.id().clone(), doc);
        }

        Ok(())
    }

    fn append_line(&self, line: &str) -> StoreResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn check_unique(&self, doc: &T) -> StoreResult<()> {
        for spec in self.indexes.iter().filter(|s| s.unique) {
            let Some(key) = (spec.key)(doc) else {
                continue;
            };
            let taken = self
                .entries
                .get(&spec.name)
                .and_then(|e| e.get(&key))
                .map(|ids| ids.iter().any(|id| id != doc.id()))
                .unwrap_or(false);
            if taken {
                return Err(StoreError::UniqueViolation {
                    index: spec.name.clone(),
                    key,
                });
            }
        }
        Ok(())
    }

    fn index_insert(&mut self, doc: &T) {
        for spec in &self.indexes {
            if let Some(key) = (spec.key)(doc) {
                if let Some(entries) = self.entries.get_mut(&spec.name) {
                    entries.entry(key).or_default().insert(doc.id().clone());
                }
            }
        }
    }

    fn index_remove(&mut self, doc: &T) {
        for spec in &self.indexes {
            if let Some(key) = (spec.key)(doc) {
                if let Some(entries) = self.entries.get_mut(&spec.name) {
                    if let Some(ids) = entries.get_mut(&key) {
                        ids.remove(doc.id());
                        if ids.is_empty() {
                            entries.remove(&key);
                        }
                    }
                }
            }
        }
    }
}
