use crate::error::{QuireError, Result};
use crate::storage::Layout;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;

pub const MANIFEST_VERSION: u32 = 1;

/// Summary written next to a sharded index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub version: u32,
    pub layout: Layout,
    pub created_at: String,
    pub num_docs: usize,
    pub num_terms: usize,
    pub shards: Vec<char>,
}

impl IndexManifest {
    pub fn new(layout: Layout, num_docs: usize, num_terms: usize, shards: Vec<char>) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { version: MANIFEST_VERSION, layout, created_at, num_docs, num_terms, shards }
    }
}

/// File layout of a sharded index rooted at `root`.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn manifest(&self) -> PathBuf { self.root.join("manifest.json") }
    pub fn shard_dir(&self, key: char) -> PathBuf { self.root.join(key.to_string()) }
    pub fn shard(&self, key: char) -> PathBuf { self.shard_dir(key).join(format!("{key}_words.json")) }
}

/// Serialize `value` as JSON into a temporary file next to `path`, then rename it
/// over `path`. Readers see either the old or the new file, never a partial one.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    create_dir_all(&dir)?;
    let tmp = NamedTempFile::new_in(&dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut w, value).map_err(std::io::Error::from)?;
        w.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| QuireError::Io(e.error))?;
    tracing::debug!(path = %path.display(), "wrote index file");
    Ok(())
}

/// Decode a JSON file. A missing file is returned as `Ok(None)`; decode
/// failures become `MalformedIndexFile`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = serde_json::from_reader(BufReader::new(f)).map_err(|e| QuireError::malformed(path, e))?;
    Ok(Some(value))
}

pub fn save_manifest(paths: &IndexPaths, manifest: &IndexManifest) -> Result<()> {
    write_json_atomic(&paths.manifest(), manifest)
}

pub fn load_manifest(paths: &IndexPaths) -> Result<IndexManifest> {
    let manifest: IndexManifest =
        read_json(&paths.manifest())?.ok_or_else(|| QuireError::IndexNotFound(paths.manifest()))?;
    if manifest.version > MANIFEST_VERSION {
        return Err(QuireError::malformed(
            paths.manifest(),
            format!("unsupported manifest version {}", manifest.version),
        ));
    }
    Ok(manifest)
}

/// Identity of a file on disk. Any replacement through an atomic rename changes
/// at least one field, even when the timestamp does not move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
    file_id: u64,
}

impl FileStamp {
    fn from_metadata(meta: &fs::Metadata) -> Self {
        #[cfg(unix)]
        let file_id = std::os::unix::fs::MetadataExt::ino(meta);
        #[cfg(not(unix))]
        let file_id = 0;
        Self { modified: meta.modified().ok(), len: meta.len(), file_id }
    }
}

pub(crate) fn file_stamp(path: &Path) -> Result<Option<FileStamp>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(FileStamp::from_metadata(&meta))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
