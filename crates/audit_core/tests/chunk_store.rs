use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

use audit_core::domain::EvidenceChunk;
use audit_core::repo::{ChunkStore, PolicyItem};

fn chunk(id: &str, category: &str, document_id: &str, ordinal: u32, text: &str) -> EvidenceChunk {
    let mut metadata = serde_json::Map::new();
    match category {
        "regulation" => {
            metadata.insert("section".to_string(), json!("B-10 4.2"));
        }
        "policy" => {
            metadata.insert("version".to_string(), json!("v3"));
        }
        _ => {}
    }
    EvidenceChunk {
        id: id.to_string(),
        category: category.to_string(),
        document_id: document_id.to_string(),
        ordinal,
        text: text.to_string(),
        metadata,
        embedding_id: Some(format!("emb-{id}")),
    }
}

#[test]
fn fetch_many_resolves_known_ids_and_skips_unknown() {
    let store = ChunkStore::open_in_memory().expect("store");
    let reg = chunk("c1", "regulation", "osfi-b10", 0, "Exit strategies must be documented.");
    let pol = chunk("c2", "policy", "vendor-policy", 0, "Vendors are reviewed annually.");
    store.insert_chunk(&reg).expect("insert reg");
    store.insert_chunk(&pol).expect("insert pol");

    let mut found = store
        .fetch_many(&["c2".to_string(), "missing".to_string(), "c1".to_string()])
        .expect("fetch");
    found.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(found, vec![reg, pol]);
}

#[test]
fn fetch_many_with_no_ids_is_empty() {
    let store = ChunkStore::open_in_memory().expect("store");
    assert!(store.fetch_many(&[]).expect("fetch").is_empty());
}

#[test]
fn chunk_without_metadata_round_trips_as_empty_map() {
    let store = ChunkStore::open_in_memory().expect("store");
    let mut c = chunk("c1", "guidance", "faq", 0, "Free text.");
    c.embedding_id = None;
    store.insert_chunk(&c).expect("insert");

    let found = store.fetch_many(&["c1".to_string()]).expect("fetch");
    assert_eq!(found.len(), 1);
    assert!(found[0].metadata.is_empty());
    assert_eq!(found[0].embedding_id, None);
    assert_eq!(found[0].reference(), "Unknown");
}

#[test]
fn duplicate_ordinal_within_document_is_rejected() {
    let store = ChunkStore::open_in_memory().expect("store");
    store
        .insert_chunk(&chunk("c1", "policy", "vendor-policy", 0, "first"))
        .expect("insert");

    let err = store
        .insert_chunk(&chunk("c2", "policy", "vendor-policy", 0, "second"))
        .expect_err("duplicate ordinal");
    assert_eq!(err.code, "DB_CHUNK_DUPLICATE");

    // Same ordinal in another category of the same document is fine.
    store
        .insert_chunk(&chunk("c3", "regulation", "vendor-policy", 0, "third"))
        .expect("insert other category");
}

#[test]
fn duplicate_chunk_id_is_rejected() {
    let store = ChunkStore::open_in_memory().expect("store");
    store
        .insert_chunk(&chunk("c1", "policy", "a", 0, "first"))
        .expect("insert");
    let err = store
        .insert_chunk(&chunk("c1", "policy", "b", 0, "again"))
        .expect_err("duplicate id");
    assert_eq!(err.code, "DB_CHUNK_DUPLICATE");
}

#[test]
fn policies_are_listed_by_name() {
    let store = ChunkStore::open_in_memory().expect("store");
    store
        .insert_policy("p2", "Vendor Risk", "v2", "text")
        .expect("insert");
    store
        .insert_policy("p1", "Business Continuity", "v1", "text")
        .expect("insert");

    assert_eq!(
        store.list_policies().expect("list"),
        vec![
            PolicyItem {
                id: "p1".to_string(),
                name: "Business Continuity".to_string(),
            },
            PolicyItem {
                id: "p2".to_string(),
                name: "Vendor Risk".to_string(),
            },
        ]
    );

    let err = store
        .insert_policy("p3", "Vendor Risk", "v2", "dup")
        .expect_err("duplicate version");
    assert_eq!(err.code, "DB_INSERT_FAILED");
}

#[test]
fn on_disk_store_survives_reopen() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("compliance.db");

    {
        let store = ChunkStore::open(&path).expect("open");
        store
            .insert_chunk(&chunk("c1", "regulation", "osfi-b10", 0, "persisted"))
            .expect("insert");
    }

    let reopened = ChunkStore::open(&path).expect("reopen");
    let found = reopened.fetch_many(&["c1".to_string()]).expect("fetch");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].text, "persisted");
    assert_eq!(found[0].reference(), "B-10 4.2");
}

#[test]
fn undecodable_row_is_skipped_and_the_rest_resolve() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("compliance.db");
    let store = ChunkStore::open(&path).expect("open");
    for c in [
        chunk("reg", "regulation", "osfi-b10", 0, "Exit strategies must be documented."),
        chunk("pol", "policy", "vendor-policy", 0, "Vendors are reviewed annually."),
        chunk("bad", "policy", "vendor-policy", 1, "Corrupted metadata."),
    ] {
        store.insert_chunk(&c).expect("insert");
    }

    let raw = rusqlite::Connection::open(&path).expect("raw open");
    raw.execute(
        "UPDATE document_chunks SET metadata_json = '{not json' WHERE id = 'bad'",
        [],
    )
    .expect("corrupt");

    let mut found: Vec<String> = store
        .fetch_many(&["reg".to_string(), "bad".to_string(), "pol".to_string()])
        .expect("fetch")
        .into_iter()
        .map(|c| c.id)
        .collect();
    found.sort();
    assert_eq!(found, vec!["pol".to_string(), "reg".to_string()]);
}
