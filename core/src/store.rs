//! Document sources and body providers.
//!
//! The engine never owns documents. It reads them through [`BodyProvider`] when
//! building and again when cutting snippets, so both paths see the same text.

use crate::error::{QuireError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

lazy_static! {
    static ref START_MARKER: Regex = Regex::new(r"\*\*\* START OF .* \*\*\*").expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub body: String,
}

impl Document {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self { id: id.into(), body: body.into() }
    }
}

/// Re-reads a document body by id, already stripped of front matter.
pub trait BodyProvider {
    fn body(&self, doc_id: &str) -> Result<String>;
}

/// Cut everything up to and including the boilerplate start marker.
/// Returns None when the marker is absent.
pub fn strip_boilerplate(raw: &str) -> Option<&str> {
    START_MARKER.find(raw).map(|m| raw[m.end()..].trim())
}

/// A directory of `*.txt` files; the document id is the path relative to the root.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Document ids in a stable (sorted) order.
    pub fn ids(&self) -> Vec<String> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&self.root).ok()?;
                Some(rel.to_string_lossy().replace('\\', "/"))
            })
            .collect()
    }

    /// Every document, stripped, in id order. Unreadable or marker-less files are
    /// yielded as errors so the caller can skip them.
    pub fn documents(&self) -> impl Iterator<Item = Result<Document>> + '_ {
        self.ids().into_iter().map(move |id| self.body(&id).map(|body| Document { id, body }))
    }

    fn resolve_path(&self, doc_id: &str) -> Result<PathBuf> {
        let rel = Path::new(doc_id);
        let safe = !doc_id.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(QuireError::DocumentBuildFailure {
                doc_id: doc_id.to_string(),
                reason: "document id must be a relative path without '..'".into(),
            });
        }
        Ok(self.root.join(rel))
    }
}

impl BodyProvider for DirectoryStore {
    fn body(&self, doc_id: &str) -> Result<String> {
        let path = self.resolve_path(doc_id)?;
        let raw = fs::read_to_string(&path)
            .map_err(|source| QuireError::DocumentUnreadable { doc_id: doc_id.to_string(), source })?;
        match strip_boilerplate(&raw) {
            Some(body) => Ok(body.to_string()),
            None => Err(QuireError::DocumentBuildFailure {
                doc_id: doc_id.to_string(),
                reason: "no '*** START OF ... ***' marker".into(),
            }),
        }
    }
}

/// In-memory bodies keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, body: impl Into<String>) {
        self.docs.insert(id.into(), body.into());
    }

    pub fn documents(&self) -> impl Iterator<Item = Result<Document>> + '_ {
        self.docs.iter().map(|(id, body)| Ok(Document::new(id.clone(), body.clone())))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(items: I) -> Self {
        let mut store = MemoryStore::new();
        for (k, v) in items {
            store.insert(k, v);
        }
        store
    }
}

impl BodyProvider for MemoryStore {
    fn body(&self, doc_id: &str) -> Result<String> {
        self.docs.get(doc_id).cloned().ok_or_else(|| QuireError::DocumentUnreadable {
            doc_id: doc_id.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not in store"),
        })
    }
}
