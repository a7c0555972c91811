//! Positional inverted index over plain-text documents.
//!
//! Documents are tokenized ([`tokenizer`]), accumulated by the [`builder`], persisted
//! through one of the [`storage`] layouts and queried with AND semantics by
//! [`query`]. [`snippet`] re-reads bodies to show context around each match.

pub mod builder;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod snippet;
pub mod storage;
pub mod store;
pub mod tokenizer;

pub use builder::{build, BuildOutcome, IndexBuilder};
pub use error::{QuireError, Result};
pub use index::{DocumentId, InvertedIndex, PostingEntry, PostingList};
pub use query::{lookup_documents, query, QueryOutcome, QueryResult, TermHit, UnknownTermPolicy};
pub use snippet::attach_snippets;
pub use storage::{FlatStorage, IndexStorage, Layout, ShardedStorage, Storage};
pub use store::{BodyProvider, DirectoryStore, Document, MemoryStore};
