use crate::error::{QuireError, Result};
use crate::index::InvertedIndex;
use crate::store::Document;
use crate::tokenizer::indexable_tokens;
use std::collections::HashSet;

/// Result of a build pass: the index plus how many documents made it in.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub index: InvertedIndex,
    pub indexed: usize,
    pub skipped: usize,
}

/// Accumulates documents into an [`InvertedIndex`] in a single pass.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    index: InvertedIndex,
    seen: HashSet<String>,
    indexed: usize,
    skipped: usize,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index one document body. A repeated id is skipped; the first body wins.
    pub fn add_document(&mut self, doc_id: &str, body: &str) {
        if !self.seen.insert(doc_id.to_string()) {
            self.skip(QuireError::DocumentBuildFailure {
                doc_id: doc_id.to_string(),
                reason: "duplicate document id".into(),
            });
            return;
        }
        let mut tokens = 0usize;
        for (term, pos) in indexable_tokens(body) {
            self.index.record(&term, doc_id, pos);
            tokens += 1;
        }
        tracing::debug!(doc_id, tokens, "indexed document");
        self.indexed += 1;
    }

    /// Add a document or skip it with a diagnostic; never aborts the batch.
    pub fn add(&mut self, doc: Result<Document>) {
        match doc {
            Ok(doc) => self.add_document(&doc.id, &doc.body),
            Err(err) => self.skip(err),
        }
    }

    fn skip(&mut self, err: QuireError) {
        tracing::warn!(error = %err, "skipping document");
        self.skipped += 1;
    }

    pub fn finish(self) -> BuildOutcome {
        tracing::info!(
            indexed = self.indexed,
            skipped = self.skipped,
            terms = self.index.len(),
            "index build complete"
        );
        BuildOutcome { index: self.index, indexed: self.indexed, skipped: self.skipped }
    }
}

/// Build an index from `(id, body)` documents in iteration order.
pub fn build<I>(documents: I) -> BuildOutcome
where
    I: IntoIterator<Item = Result<Document>>,
{
    let mut builder = IndexBuilder::new();
    for doc in documents {
        builder.add(doc);
    }
    builder.finish()
}
