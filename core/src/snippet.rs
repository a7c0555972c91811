use crate::query::QueryResult;
use crate::store::BodyProvider;
use std::ops::Range;

const LEAD: usize = 10;
const TRAIL: usize = 20;

/// Word window around `position` in a body of `len` words.
pub fn window(position: usize, len: usize) -> Range<usize> {
    let (start, end) = if position < LEAD {
        (0, position + LEAD)
    } else {
        (position - LEAD, position.saturating_add(TRAIL + 1))
    };
    start.min(len)..end.min(len)
}

/// The words of `body` around `position`, joined by single spaces.
pub fn snippet(body: &str, position: usize) -> String {
    let words: Vec<&str> = body.split_whitespace().collect();
    words[window(position, words.len())].join(" ")
}

/// Fill `snippet` for every (document, term) pair from the term's first position.
/// Bodies are re-read on every call; a body that cannot be read leaves its
/// snippets empty instead of failing.
pub fn attach_snippets<P: BodyProvider + ?Sized>(mut result: QueryResult, provider: &P) -> QueryResult {
    for (doc_id, hits) in result.documents_mut() {
        let body = match provider.body(doc_id) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(doc_id = %doc_id, error = %err, "document unreadable, omitting snippet");
                continue;
            }
        };
        for hit in hits.values_mut() {
            if let Some(&first) = hit.positions.first() {
                hit.snippet = Some(snippet(&body, first));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn early_positions_start_at_zero() {
        assert_eq!(window(3, 100), 0..13);
        assert_eq!(window(9, 100), 0..19);
    }

    #[test]
    fn later_positions_center() {
        assert_eq!(window(10, 100), 0..31);
        assert_eq!(window(50, 100), 40..71);
        assert_eq!(window(95, 100), 85..100);
    }

    #[test]
    fn short_document_is_returned_whole() {
        assert_eq!(snippet("one two three four five", 2), "one two three four five");
    }

    #[test]
    fn out_of_range_position_is_empty() {
        assert_eq!(snippet(&words(5), 40), "");
    }

    #[test]
    fn window_end_saturates() {
        assert_eq!(window(usize::MAX, 5), 5..5);
        assert_eq!(window(usize::MAX - 3, usize::MAX), usize::MAX - 13..usize::MAX);
        assert_eq!(snippet(&words(5), usize::MAX), "");
    }

    #[test]
    fn snippet_spacing_is_normalized() {
        let body = format!("{}\n\n  target   {}", words(12), words(30));
        let s = snippet(&body, 12);
        assert!(s.starts_with("w2 w3"));
        assert!(s.contains(" target w0 "));
        assert_eq!(s.split(' ').count(), 31);
    }
}
