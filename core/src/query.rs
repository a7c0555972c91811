use crate::error::{QuireError, Result};
use crate::index::InvertedIndex;
use crate::storage::IndexStorage;
use crate::tokenizer::query_terms;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What to do with query terms the index has never seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownTermPolicy {
    /// Any unknown term ends the query with no results, naming the term.
    #[default]
    FailFast,
    /// Unknown terms are removed before intersecting.
    DropUnknown,
}

impl FromStr for UnknownTermPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(UnknownTermPolicy::FailFast),
            "drop-unknown" => Ok(UnknownTermPolicy::DropUnknown),
            other => Err(format!("unknown policy '{other}', expected 'fail-fast' or 'drop-unknown'")),
        }
    }
}

impl fmt::Display for UnknownTermPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnknownTermPolicy::FailFast => "fail-fast",
            UnknownTermPolicy::DropUnknown => "drop-unknown",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermHit {
    pub frequency: usize,
    pub positions: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// document id -> term -> hit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryResult {
    docs: BTreeMap<String, BTreeMap<String, TermHit>>,
}

impl QueryResult {
    pub fn get(&self, doc_id: &str, term: &str) -> Option<&TermHit> {
        self.docs.get(doc_id)?.get(term)
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.docs.keys().map(String::as_str)
    }

    pub fn documents(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, TermHit>)> {
        self.docs.iter().map(|(d, hits)| (d.as_str(), hits))
    }

    pub(crate) fn documents_mut(&mut self) -> impl Iterator<Item = (&String, &mut BTreeMap<String, TermHit>)> {
        self.docs.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Outcome of evaluating a query. Everything but `Matches` is an explicit
/// "no results" answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Matches(QueryResult),
    /// Fail-fast policy hit a term that is not indexed.
    UnknownTerm { term: String },
    /// Drop-unknown policy removed every term.
    NoIndexedTerms,
    NoCommonDocuments { terms: Vec<String> },
}

impl QueryOutcome {
    pub fn message(&self) -> Option<String> {
        match self {
            QueryOutcome::Matches(_) => None,
            QueryOutcome::UnknownTerm { term } => Some(format!("No results found for '{term}'")),
            QueryOutcome::NoIndexedTerms => {
                Some("No words from the query are present in the inverted index.".to_string())
            }
            QueryOutcome::NoCommonDocuments { terms } => {
                Some(format!("No documents contain all the words: {}", terms.join(", ")))
            }
        }
    }

    pub fn matches(&self) -> Option<&QueryResult> {
        match self {
            QueryOutcome::Matches(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_matches(self) -> Option<QueryResult> {
        match self {
            QueryOutcome::Matches(r) => Some(r),
            _ => None,
        }
    }
}

/// Split, normalize, refuse empty queries.
pub fn parse_query(text: &str) -> Result<Vec<String>> {
    let terms = query_terms(text);
    if terms.is_empty() {
        return Err(QuireError::MissingQuery);
    }
    Ok(terms)
}

/// Apply `policy` to `terms` against the resolved index. Err carries the outcome
/// to report instead of intersecting.
fn known_terms(terms: Vec<String>, index: &InvertedIndex, policy: UnknownTermPolicy) -> std::result::Result<Vec<String>, QueryOutcome> {
    match policy {
        UnknownTermPolicy::FailFast => match terms.iter().find(|t| !index.contains_term(t)) {
            Some(term) => Err(QueryOutcome::UnknownTerm { term: term.clone() }),
            None => Ok(terms),
        },
        UnknownTermPolicy::DropUnknown => {
            let kept: Vec<String> = terms.into_iter().filter(|t| index.contains_term(t)).collect();
            if kept.is_empty() {
                Err(QueryOutcome::NoIndexedTerms)
            } else {
                Ok(kept)
            }
        }
    }
}

/// Documents containing every term. Starts from the shortest posting list.
fn intersect<'a>(index: &'a InvertedIndex, terms: &[String]) -> Vec<&'a str> {
    let mut lists: Vec<_> = terms.iter().filter_map(|t| index.get(t)).collect();
    if lists.len() != terms.len() {
        return Vec::new();
    }
    lists.sort_by_key(|l| l.len());
    let Some((first, rest)) = lists.split_first() else {
        return Vec::new();
    };
    let mut common: Vec<&str> = first.doc_ids().collect();
    for list in rest {
        common.retain(|d| list.contains(d));
        if common.is_empty() {
            break;
        }
    }
    common
}

/// Evaluate an AND query over `storage`.
pub fn query<S: IndexStorage + ?Sized>(text: &str, storage: &S, policy: UnknownTermPolicy) -> Result<QueryOutcome> {
    let terms = parse_query(text)?;
    let index = storage.resolve(&terms)?;
    Ok(evaluate(terms, &index, policy))
}

/// Evaluate already-parsed terms against a resolved (possibly partial) index.
pub fn evaluate(terms: Vec<String>, index: &InvertedIndex, policy: UnknownTermPolicy) -> QueryOutcome {
    let terms = match known_terms(terms, index, policy) {
        Ok(terms) => terms,
        Err(outcome) => return outcome,
    };
    let common = intersect(index, &terms);
    if common.is_empty() {
        return QueryOutcome::NoCommonDocuments { terms };
    }
    let mut result = QueryResult::default();
    for doc in common {
        let hits = result.docs.entry(doc.to_string()).or_default();
        for term in &terms {
            if let Some(entry) = index.get(term).and_then(|l| l.get(doc)) {
                hits.insert(
                    term.clone(),
                    TermHit { frequency: entry.frequency, positions: entry.positions.clone(), snippet: None },
                );
            }
        }
    }
    tracing::debug!(terms = ?terms, documents = result.len(), "query matched");
    QueryOutcome::Matches(result)
}

/// For every known query term, the documents that contain it. No intersection.
pub fn lookup_documents<S: IndexStorage + ?Sized>(text: &str, storage: &S) -> Result<BTreeMap<String, Vec<String>>> {
    let terms = parse_query(text)?;
    let index = storage.resolve(&terms)?;
    Ok(terms
        .into_iter()
        .filter_map(|t| {
            let docs = index.get(&t)?.doc_ids().map(str::to_string).collect();
            Some((t, docs))
        })
        .collect())
}
