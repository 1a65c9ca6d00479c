use std::fs;

use docsearch_core::types::{Chunk, ChunkKind, Meta};
use docsearch_core::Error;
use docsearch_vector::{Snapshot, VectorIndex};

fn chunk(doc: &str, i: usize, text: &str) -> Chunk {
    Chunk {
        id: Chunk::make_id(doc, i),
        doc_id: doc.to_string(),
        text: text.to_string(),
        chunk_index: i,
        total_chunks: 1,
        kind: ChunkKind::Text,
        section: None,
        line_count: 1,
        metadata: Meta::new(),
    }
}

/// Four records along distinct directions of a 3-d space.
fn sample() -> VectorIndex {
    VectorIndex::create(
        vec![chunk("a", 0, "east"), chunk("a", 1, "north"), chunk("b", 0, "north-east"), chunk("b", 1, "west")],
        vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![1.0, 1.0, 0.0], vec![-1.0, 0.0, 0.0]],
    )
    .expect("create")
}

fn ids(results: &[docsearch_core::SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.id()).collect()
}

#[test]
fn create_rejects_inconsistent_input() {
    let err = VectorIndex::create(vec![chunk("a", 0, "x")], vec![]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = VectorIndex::create(
        vec![chunk("a", 0, "x"), chunk("a", 1, "y")],
        vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
    )
    .unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));

    let err = VectorIndex::create(vec![chunk("a", 0, "x"), chunk("a", 0, "y")], vec![vec![1.0], vec![2.0]]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn search_orders_by_similarity() {
    let index = sample();
    let results = index.search(&[1.0, 0.1, 0.0], 3, None).unwrap();

    assert_eq!(ids(&results), vec!["a_chunk_0", "b_chunk_0", "a_chunk_1"]);
    assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    assert!(results.iter().all(|r| r.relevance.is_none() && r.combined.is_none()));
}

#[test]
fn search_respects_k_and_floor() {
    let index = sample();
    assert_eq!(index.search(&[1.0, 0.0, 0.0], 10, None).unwrap().len(), 4);
    assert!(index.search(&[1.0, 0.0, 0.0], 0, None).unwrap().is_empty());

    let above_zero = index.search(&[1.0, 0.0, 0.0], 10, Some(0.5)).unwrap();
    assert_eq!(ids(&above_zero), vec!["a_chunk_0", "b_chunk_0"]);
}

#[test]
fn ties_keep_insertion_order() {
    let index = VectorIndex::create(
        vec![chunk("t", 0, "first"), chunk("t", 1, "second"), chunk("t", 2, "third")],
        vec![vec![0.0, 1.0], vec![0.0, 2.0], vec![0.0, 3.0]],
    )
    .unwrap();
    let results = index.search(&[0.0, 1.0], 3, None).unwrap();
    assert_eq!(ids(&results), vec!["t_chunk_0", "t_chunk_1", "t_chunk_2"]);
}

#[test]
fn identical_vector_scores_one() {
    let index = sample();
    let results = index.search(&[1.0, 1.0, 0.0], 1, None).unwrap();
    assert_eq!(results[0].id(), "b_chunk_0");
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
}

#[test]
fn zero_query_scores_zero_everywhere() {
    let results = sample().search(&[0.0, 0.0, 0.0], 4, None).unwrap();
    assert!(results.iter().all(|r| r.similarity == 0.0));
}

#[test]
fn search_dimension_mismatch_is_an_error() {
    let err = sample().search(&[1.0, 0.0], 3, None).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
}

#[test]
fn empty_index_returns_nothing() {
    let index = VectorIndex::new();
    assert!(index.search(&[1.0, 2.0], 5, None).unwrap().is_empty());
    assert!(!index.stats().initialized);
}

#[test]
fn upsert_overwrites_in_place() {
    let mut index = sample();
    let inserted = index.upsert(chunk("a", 1, "north, revised"), vec![0.0, 0.0, 1.0]).unwrap();
    assert!(!inserted);
    assert_eq!(index.len(), 4);
    assert_eq!(index.get("a_chunk_1").map(|c| c.text.as_str()), Some("north, revised"));
    assert_eq!(index.search(&[0.0, 0.0, 1.0], 1, None).unwrap()[0].id(), "a_chunk_1");

    assert!(index.upsert(chunk("c", 0, "up"), vec![0.0, 0.0, 2.0]).unwrap());
    assert_eq!(index.len(), 5);
}

#[test]
fn failed_upsert_leaves_index_untouched() {
    let mut index = sample();
    let err = index.upsert(chunk("c", 0, "bad"), vec![1.0, 0.0]).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));

    let err = index
        .upsert_many(vec![chunk("c", 0, "ok"), chunk("c", 1, "bad")], vec![vec![1.0, 0.0, 0.0], vec![1.0]])
        .unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));
    assert_eq!(index.len(), 4);
    assert!(!index.contains("c_chunk_0"));
}

#[test]
fn non_finite_vectors_are_rejected() -> anyhow::Result<()> {
    let mut index = sample();
    let err = index.upsert(chunk("c", 0, "bad"), vec![f32::NAN, 1.0, 0.0]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = index
        .upsert_many(vec![chunk("c", 0, "ok"), chunk("c", 1, "bad")], vec![vec![1.0, 0.0, 0.0], vec![f32::INFINITY, 0.0, 0.0]])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(VectorIndex::create(vec![chunk("c", 0, "bad")], vec![vec![f32::NEG_INFINITY, 0.0]]).is_err());
    assert_eq!(index.len(), 4);
    assert!(!index.contains("c_chunk_0"));

    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("index.json");
    index.save(&path)?;
    let mut fresh = VectorIndex::new();
    assert!(fresh.load(&path)?);
    assert_eq!(fresh.len(), 4);
    Ok(())
}

#[test]
fn delete_compacts_and_keeps_lookup_consistent() {
    let mut index = sample();
    assert!(index.delete("a_chunk_1"));
    assert_eq!(index.len(), 3);
    assert!(index.get("a_chunk_1").is_none());

    let results = index.search(&[0.0, 1.0, 0.0], 10, None).unwrap();
    assert!(!ids(&results).contains(&"a_chunk_1"));
    // records after the removed one are still addressable
    assert_eq!(index.get("b_chunk_1").map(|c| c.text.as_str()), Some("west"));
    assert!(index.delete("b_chunk_1"));
    assert_eq!(ids(&index.search(&[-1.0, 0.0, 0.0], 1, None).unwrap()), vec!["b_chunk_0"]);
}

#[test]
fn deleting_unknown_id_is_a_no_op() {
    let mut index = sample();
    assert!(!index.delete("missing_chunk_9"));
    assert_eq!(index.stats().count, 4);
}

#[test]
fn delete_document_removes_all_its_chunks() {
    let mut index = sample();
    assert_eq!(index.delete_document("a"), 2);
    assert_eq!(index.delete_document("a"), 0);
    assert_eq!(index.chunks().iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["b_chunk_0", "b_chunk_1"]);
    assert!(index.get("b_chunk_1").is_some());

    assert_eq!(index.delete_document("b"), 2);
    assert!(index.is_empty());
    // an emptied index accepts a new dimension
    index.upsert(chunk("z", 0, "fresh"), vec![1.0, 0.0]).unwrap();
    assert_eq!(index.dimension(), Some(2));
}

#[test]
fn similar_to_excludes_the_record_itself() {
    let index = sample();
    let results = index.similar_to("a_chunk_0", 2).unwrap();
    assert_eq!(ids(&results), vec!["b_chunk_0", "a_chunk_1"]);

    assert!(matches!(index.similar_to("nope", 2), Err(Error::NotFound(_))));
}

#[test]
fn stats_estimate_size() {
    let stats = sample().stats();
    assert!(stats.initialized);
    assert_eq!(stats.count, 4);
    assert_eq!(stats.dimension, Some(3));
    let text = "east".len() + "north".len() + "north-east".len() + "west".len();
    assert_eq!(stats.approx_size_bytes, 4 * 3 * 8 + text);
}

#[test]
fn save_then_load_reproduces_search() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("nested").join("index.json");
    let index = sample();
    index.save(&path)?;

    let mut restored = VectorIndex::new();
    assert!(restored.load(&path)?);
    assert_eq!(restored.len(), 4);
    for q in [[1.0, 0.2, 0.0], [-0.3, 1.0, 0.0], [0.0, 0.0, 1.0]] {
        assert_eq!(index.search(&q, 4, None)?, restored.search(&q, 4, None)?);
    }
    assert_eq!(restored.stats(), index.stats());
    Ok(())
}

#[test]
fn load_missing_file_returns_false() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = sample();
    assert!(!index.load(&tmp.path().join("absent.json"))?);
    assert_eq!(index.len(), 4);
    Ok(())
}

#[test]
fn corrupt_snapshots_are_rejected_without_touching_state() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("index.json");
    let mut index = sample();

    fs::write(&path, b"{ not json")?;
    assert!(matches!(index.load(&path), Err(Error::Corrupt(_))));

    let mut snapshot: Snapshot = sample().to_snapshot();
    snapshot.header.record_count = 7;
    fs::write(&path, serde_json::to_vec(&snapshot)?)?;
    assert!(matches!(index.load(&path), Err(Error::Corrupt(_))));

    let mut snapshot = sample().to_snapshot();
    snapshot.records[2].vector.pop();
    fs::write(&path, serde_json::to_vec(&snapshot)?)?;
    assert!(matches!(index.load(&path), Err(Error::Corrupt(_))));

    let mut snapshot = sample().to_snapshot();
    snapshot.header.format_version = 99;
    fs::write(&path, serde_json::to_vec(&snapshot)?)?;
    assert!(matches!(index.load(&path), Err(Error::Corrupt(_))));

    assert_eq!(index.len(), 4);
    Ok(())
}

#[test]
fn reset_clears_memory_and_snapshot() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("index.json");
    let mut index = sample();
    index.save(&path)?;

    index.reset(&path)?;
    assert!(index.is_empty());
    assert!(!path.exists());
    // resetting again without a snapshot is fine
    index.reset(&path)?;
    Ok(())
}
