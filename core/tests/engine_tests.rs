use quire_core::{
    attach_snippets, build, lookup_documents, query, DirectoryStore, Document, IndexStorage, InvertedIndex, MemoryStore,
    QueryOutcome, QuireError, Storage, UnknownTermPolicy,
};
use std::fs;
use tempfile::tempdir;

fn cars() -> MemoryStore {
    [("1", "the car is nice"), ("2", "that car is mine"), ("3", "the car is the best")].into_iter().collect()
}

fn cars_index() -> InvertedIndex {
    build(cars().documents()).index
}

#[test]
fn worked_example_index() {
    let index = cars_index();
    let car = index.get("car").unwrap();
    assert_eq!(car.doc_ids().collect::<Vec<_>>(), vec!["1", "2", "3"]);
    for entry in car.entries() {
        assert_eq!(entry.frequency, 1);
        assert_eq!(entry.positions, vec![1]);
    }
    for stop in ["the", "is", "that"] {
        assert!(!index.contains_term(stop), "{stop} should not be indexed");
    }
}

#[test]
fn worked_example_query_on_both_layouts() {
    let dir = tempdir().unwrap();
    let layouts = [Storage::sharded(dir.path().join("tree")), Storage::flat(dir.path().join("word_level.json"))];
    for storage in &layouts {
        storage.export(&cars_index()).unwrap();
        let out = query("car", storage, UnknownTermPolicy::FailFast).unwrap();
        let result = out.matches().unwrap();
        assert_eq!(result.doc_ids().collect::<Vec<_>>(), vec!["1", "2", "3"]);
        for doc in ["1", "2", "3"] {
            let hit = result.get(doc, "car").unwrap();
            assert_eq!(hit.frequency, 1);
            assert_eq!(hit.positions, vec![1]);
            assert!(hit.snippet.is_none());
        }
    }
}

#[test]
fn intersection_returns_only_shared_documents() {
    let docs = vec![
        Ok(Document::new("A", "harpoon")),
        Ok(Document::new("B", "harpoon lantern")),
        Ok(Document::new("C", "lantern")),
    ];
    let dir = tempdir().unwrap();
    let storage = Storage::sharded(dir.path());
    storage.export(&build(docs).index).unwrap();
    let out = query("Harpoon LANTERN", &storage, UnknownTermPolicy::FailFast).unwrap();
    assert_eq!(out.matches().unwrap().doc_ids().collect::<Vec<_>>(), vec!["B"]);
}

#[test]
fn policy_divergence_for_unknown_terms() {
    let dir = tempdir().unwrap();
    let storage = Storage::sharded(dir.path());
    storage.export(&cars_index()).unwrap();

    let fail = query("car zzz", &storage, UnknownTermPolicy::FailFast).unwrap();
    assert_eq!(fail, QueryOutcome::UnknownTerm { term: "zzz".into() });
    assert_eq!(fail.message().unwrap(), "No results found for 'zzz'");

    let dropped = query("car zzz", &storage, UnknownTermPolicy::DropUnknown).unwrap();
    let plain = query("car", &storage, UnknownTermPolicy::DropUnknown).unwrap();
    assert_eq!(dropped, plain);

    let nothing = query("zzz qqq", &storage, UnknownTermPolicy::DropUnknown).unwrap();
    assert_eq!(nothing, QueryOutcome::NoIndexedTerms);
}

#[test]
fn stop_words_in_queries_are_unknown_terms() {
    let dir = tempdir().unwrap();
    let storage = Storage::flat(dir.path().join("idx.json"));
    storage.export(&cars_index()).unwrap();
    let out = query("the car", &storage, UnknownTermPolicy::FailFast).unwrap();
    assert_eq!(out, QueryOutcome::UnknownTerm { term: "the".into() });
    let out = query("the car", &storage, UnknownTermPolicy::DropUnknown).unwrap();
    assert_eq!(out.matches().unwrap().len(), 3);
}

#[test]
fn empty_query_is_missing_query() {
    let dir = tempdir().unwrap();
    let storage = Storage::flat(dir.path().join("idx.json"));
    let err = query("   ", &storage, UnknownTermPolicy::FailFast).unwrap_err();
    assert!(matches!(err, QuireError::MissingQuery));
}

#[test]
fn no_common_documents_names_the_terms() {
    let dir = tempdir().unwrap();
    let storage = Storage::flat(dir.path().join("idx.json"));
    storage.export(&cars_index()).unwrap();
    let out = query("nice best", &storage, UnknownTermPolicy::FailFast).unwrap();
    assert_eq!(out.message().unwrap(), "No documents contain all the words: nice, best");
}

#[test]
fn build_is_deterministic_to_the_byte() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.json");
    let b = dir.path().join("b.json");
    Storage::flat(&a).export(&cars_index()).unwrap();
    Storage::flat(&b).export(&cars_index()).unwrap();
    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    assert_eq!(cars_index(), cars_index());
}

#[test]
fn flat_export_roundtrips() {
    let dir = tempdir().unwrap();
    let storage = Storage::flat(dir.path().join("word_level.json"));
    let index = cars_index();
    storage.export(&index).unwrap();
    let back = storage.load_all().unwrap();
    assert_eq!(back, index);
    let raw: serde_json::Value = serde_json::from_slice(&fs::read(dir.path().join("word_level.json")).unwrap()).unwrap();
    assert_eq!(raw["car"]["2"]["positions"], serde_json::json!([1]));
    assert_eq!(raw["car"]["2"]["frequency"], serde_json::json!(1));
}

#[test]
fn sharded_export_roundtrips_and_replaces_shards() {
    let dir = tempdir().unwrap();
    let storage = Storage::sharded(dir.path());
    storage.export(&cars_index()).unwrap();
    assert_eq!(storage.load_all().unwrap(), cars_index());

    let next = build(vec![Ok(Document::new("4", "cargo ship"))]).index;
    storage.export(&next).unwrap();
    let c_shard: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join("c").join("c_words.json")).unwrap()).unwrap();
    assert!(c_shard.get("car").is_none());
    assert!(c_shard.get("cargo").is_some());
    assert_eq!(storage.load_all().unwrap(), next);
}

#[test]
fn malformed_index_is_surfaced() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx.json");
    fs::write(&path, r#"{"car":{"1":{"positions":[1],"frequency":2}}}"#).unwrap();
    let err = query("car", &Storage::flat(&path), UnknownTermPolicy::FailFast).unwrap_err();
    assert!(matches!(err, QuireError::MalformedIndexFile { .. }));
}

#[test]
fn missing_shard_is_not_an_unknown_term() {
    let dir = tempdir().unwrap();
    let storage = Storage::sharded(dir.path());
    storage.export(&cars_index()).unwrap();
    fs::remove_dir_all(dir.path().join("n")).unwrap();
    let err = query("nice", &storage, UnknownTermPolicy::DropUnknown).unwrap_err();
    assert!(matches!(err, QuireError::ShardNotFound { shard: 'n', .. }));
}

#[test]
fn snippets_come_from_the_stripped_body() {
    let docs = tempdir().unwrap();
    let body: Vec<String> = (0..40).map(|i| if i == 25 { "Leviathan".to_string() } else { format!("w{i}") }).collect();
    fs::write(
        docs.path().join("moby.txt"),
        format!("Title: Moby Dick\n*** START OF THE PROJECT GUTENBERG EBOOK ***\n{}", body.join(" ")),
    )
    .unwrap();
    fs::write(docs.path().join("draft.txt"), "Leviathan without a marker").unwrap();

    let store = DirectoryStore::new(docs.path());
    let outcome = build(store.documents());
    assert_eq!(outcome.indexed, 1);
    assert_eq!(outcome.skipped, 1);

    let idx = tempdir().unwrap();
    let storage = Storage::sharded(idx.path());
    storage.export(&outcome.index).unwrap();
    let result = query("leviathan", &storage, UnknownTermPolicy::FailFast).unwrap().into_matches().unwrap();
    let result = attach_snippets(result, &store);
    let hit = result.get("moby.txt", "leviathan").unwrap();
    assert_eq!(hit.positions, vec![25]);
    let expected = body[15..40].join(" ");
    assert_eq!(hit.snippet.as_deref(), Some(expected.as_str()));
}

#[test]
fn short_document_snippet_is_whole_document() {
    let store: MemoryStore = [("s", "one two three four five")].into_iter().collect();
    let dir = tempdir().unwrap();
    let storage = Storage::flat(dir.path().join("idx.json"));
    storage.export(&build(store.documents()).index).unwrap();
    let result = query("three", &storage, UnknownTermPolicy::FailFast).unwrap().into_matches().unwrap();
    let result = attach_snippets(result, &store);
    assert_eq!(result.get("s", "three").unwrap().snippet.as_deref(), Some("one two three four five"));
}

#[test]
fn unreadable_body_omits_snippet() {
    let dir = tempdir().unwrap();
    let storage = Storage::flat(dir.path().join("idx.json"));
    storage.export(&cars_index()).unwrap();
    let result = query("car", &storage, UnknownTermPolicy::FailFast).unwrap().into_matches().unwrap();
    let partial: MemoryStore = [("1", "the car is nice")].into_iter().collect();
    let result = attach_snippets(result, &partial);
    assert_eq!(result.get("1", "car").unwrap().snippet.as_deref(), Some("the car is nice"));
    assert!(result.get("2", "car").unwrap().snippet.is_none());
    let json = serde_json::to_value(&result).unwrap();
    assert!(json["2"]["car"].get("snippet").is_none());
}

#[test]
fn record_level_lookup_lists_documents_per_term() {
    let dir = tempdir().unwrap();
    let storage = Storage::sharded(dir.path());
    storage.export(&cars_index()).unwrap();
    let found = lookup_documents("car nice zzz", &storage).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["car"], vec!["1", "2", "3"]);
    assert_eq!(found["nice"], vec!["1"]);
}

#[test]
fn duplicate_document_ids_still_export_a_loadable_index() {
    let docs = vec![Ok(Document::new("a", "whale")), Ok(Document::new("a", "whale"))];
    let outcome = build(docs);
    assert_eq!(outcome.skipped, 1);
    let dir = tempdir().unwrap();
    let storage = Storage::flat(dir.path().join("idx.json"));
    storage.export(&outcome.index).unwrap();
    let result = query("whale", &storage, UnknownTermPolicy::FailFast).unwrap().into_matches().unwrap();
    assert_eq!(result.get("a", "whale").unwrap().positions, vec![0]);
}

#[test]
fn huge_stored_position_yields_empty_snippet() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx.json");
    fs::write(&path, format!(r#"{{"whale":{{"a":{{"positions":[{}],"frequency":1}}}}}}"#, usize::MAX)).unwrap();
    let result = query("whale", &Storage::flat(&path), UnknownTermPolicy::FailFast).unwrap().into_matches().unwrap();
    let store: MemoryStore = [("a", "call me ishmael")].into_iter().collect();
    let result = attach_snippets(result, &store);
    assert_eq!(result.get("a", "whale").unwrap().snippet.as_deref(), Some(""));
}
