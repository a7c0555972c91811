//! Persisted index layouts.
//!
//! Both layouts store `{term: {doc_id: {"positions": [..], "frequency": n}}}`:
//! [`ShardedStorage`] splits terms into one file per first character, [`FlatStorage`]
//! keeps the whole index in one file. Callers normally go through [`Storage`].

use crate::error::{QuireError, Result};
use crate::index::InvertedIndex;
use crate::persist::{
    file_stamp, load_manifest, read_json, save_manifest, write_json_atomic, FileStamp, IndexManifest, IndexPaths,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Sharded,
    Flat,
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sharded" | "tree" => Ok(Layout::Sharded),
            "flat" | "single" => Ok(Layout::Flat),
            other => Err(format!("unknown layout '{other}', expected 'sharded' or 'flat'")),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Layout::Sharded => "sharded",
            Layout::Flat => "flat",
        })
    }
}

/// Export and selective loading of an index.
pub trait IndexStorage {
    /// Replace the persisted index with `index`.
    fn export(&self, index: &InvertedIndex) -> Result<()>;

    /// Load the posting lists of `terms`; terms that are not indexed are absent
    /// from the returned index.
    fn resolve(&self, terms: &[String]) -> Result<InvertedIndex>;

    /// Load every term.
    fn load_all(&self) -> Result<InvertedIndex>;
}

/// First character of a term, if it can name a shard.
pub fn shard_key(term: &str) -> Option<char> {
    let c = term.chars().next()?.to_lowercase().next()?;
    c.is_alphanumeric().then_some(c)
}

fn distinct_docs(index: &InvertedIndex) -> usize {
    index.terms().flat_map(|(_, list)| list.doc_ids()).collect::<HashSet<_>>().len()
}

/// One JSON file per shard key under `<root>/<key>/<key>_words.json`, plus a manifest.
#[derive(Debug, Clone)]
pub struct ShardedStorage {
    paths: IndexPaths,
}

impl ShardedStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { paths: IndexPaths::new(root) }
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn manifest(&self) -> Result<IndexManifest> {
        load_manifest(&self.paths)
    }

    fn load_shard(&self, key: char) -> Result<InvertedIndex> {
        let path = self.paths.shard(key);
        let shard: InvertedIndex =
            read_json(&path)?.ok_or(QuireError::ShardNotFound { shard: key, path: path.clone() })?;
        tracing::debug!(shard = %key, terms = shard.len(), "loaded shard");
        Ok(shard)
    }
}

impl IndexStorage for ShardedStorage {
    fn export(&self, index: &InvertedIndex) -> Result<()> {
        let mut shards: BTreeMap<char, InvertedIndex> = BTreeMap::new();
        let mut dropped = 0usize;
        for (term, list) in index.terms() {
            let Some(key) = shard_key(term) else {
                dropped += 1;
                continue;
            };
            shards.entry(key).or_default().insert(term.to_string(), list.clone());
        }
        for (key, shard) in &shards {
            write_json_atomic(&self.paths.shard(*key), shard)?;
        }
        let manifest = IndexManifest::new(
            Layout::Sharded,
            distinct_docs(index),
            index.len() - dropped,
            shards.keys().copied().collect(),
        );
        save_manifest(&self.paths, &manifest)?;
        tracing::info!(root = %self.paths.root.display(), shards = shards.len(), dropped, "exported sharded index");
        Ok(())
    }

    fn resolve(&self, terms: &[String]) -> Result<InvertedIndex> {
        let manifest = self.manifest()?;
        let present: HashSet<char> = manifest.shards.iter().copied().collect();
        let keys: BTreeSet<char> = terms.iter().filter_map(|t| shard_key(t)).collect();
        let mut out = InvertedIndex::new();
        for key in keys {
            if !present.contains(&key) {
                continue;
            }
            out.absorb(self.load_shard(key)?.subset(terms));
        }
        Ok(out)
    }

    fn load_all(&self) -> Result<InvertedIndex> {
        let manifest = self.manifest()?;
        let mut out = InvertedIndex::new();
        for key in manifest.shards {
            out.absorb(self.load_shard(key)?);
        }
        Ok(out)
    }
}

/// The whole index in one JSON file. The decoded file is kept as an immutable
/// snapshot until the file on disk changes.
#[derive(Debug)]
pub struct FlatStorage {
    path: PathBuf,
    snapshot: RwLock<Option<(FileStamp, Arc<InvertedIndex>)>>,
}

impl FlatStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), snapshot: RwLock::new(None) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot, re-decoding the file when it was replaced or rewritten.
    pub fn snapshot(&self) -> Result<Arc<InvertedIndex>> {
        let stamp = file_stamp(&self.path)?.ok_or_else(|| QuireError::IndexNotFound(self.path.clone()))?;
        if let Some((seen, index)) = self.snapshot.read().as_ref() {
            if *seen == stamp {
                return Ok(Arc::clone(index));
            }
        }
        let index: InvertedIndex =
            read_json(&self.path)?.ok_or_else(|| QuireError::IndexNotFound(self.path.clone()))?;
        let index = Arc::new(index);
        tracing::debug!(path = %self.path.display(), terms = index.len(), "loaded flat index");
        *self.snapshot.write() = Some((stamp, Arc::clone(&index)));
        Ok(index)
    }
}

impl Clone for FlatStorage {
    fn clone(&self) -> Self {
        Self { path: self.path.clone(), snapshot: RwLock::new(self.snapshot.read().clone()) }
    }
}

impl IndexStorage for FlatStorage {
    fn export(&self, index: &InvertedIndex) -> Result<()> {
        write_json_atomic(&self.path, index)?;
        *self.snapshot.write() = None;
        tracing::info!(path = %self.path.display(), terms = index.len(), "exported flat index");
        Ok(())
    }

    fn resolve(&self, terms: &[String]) -> Result<InvertedIndex> {
        Ok(self.snapshot()?.subset(terms))
    }

    fn load_all(&self) -> Result<InvertedIndex> {
        Ok(self.snapshot()?.as_ref().clone())
    }
}

/// The configured storage backend.
#[derive(Debug, Clone)]
pub enum Storage {
    Sharded(ShardedStorage),
    Flat(FlatStorage),
}

impl Storage {
    pub fn open<P: AsRef<Path>>(layout: Layout, path: P) -> Self {
        match layout {
            Layout::Sharded => Storage::sharded(path),
            Layout::Flat => Storage::flat(path),
        }
    }

    pub fn sharded<P: AsRef<Path>>(root: P) -> Self {
        Storage::Sharded(ShardedStorage::new(root))
    }

    pub fn flat<P: AsRef<Path>>(path: P) -> Self {
        Storage::Flat(FlatStorage::new(path))
    }

    pub fn layout(&self) -> Layout {
        match self {
            Storage::Sharded(_) => Layout::Sharded,
            Storage::Flat(_) => Layout::Flat,
        }
    }

    fn backend(&self) -> &dyn IndexStorage {
        match self {
            Storage::Sharded(s) => s as &dyn IndexStorage,
            Storage::Flat(f) => f,
        }
    }
}

impl IndexStorage for Storage {
    fn export(&self, index: &InvertedIndex) -> Result<()> {
        self.backend().export(index)
    }

    fn resolve(&self, terms: &[String]) -> Result<InvertedIndex> {
        self.backend().resolve(terms)
    }

    fn load_all(&self) -> Result<InvertedIndex> {
        self.backend().load_all()
    }
}
