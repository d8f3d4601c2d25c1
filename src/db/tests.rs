#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;

fn store() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

// ── Filter ────────────────────────────────────────────────────

#[test]
fn test_empty_filter_matches_everything() {
    let filter = Filter::new();
    assert!(filter.is_empty());
    assert!(filter.matches(&json!({"id": 1})));
    assert!(filter.matches(&json!({})));
}

#[test]
fn test_filter_scalar_equality() {
    let filter = Filter::new().eq("parent_id", 4);
    assert!(filter.matches(&json!({"parent_id": 4, "name": "x"})));
    assert!(!filter.matches(&json!({"parent_id": 5})));
    assert!(!filter.matches(&json!({"name": "x"})));
}

#[test]
fn test_filter_structured_value_is_exact() {
    let filter = Filter::new().eq("metadata", json!({"label": {"bk_biz_id": "1"}}));
    assert!(filter.matches(&json!({"metadata": {"label": {"bk_biz_id": "1"}}})));
    assert!(!filter.matches(&json!({"metadata": {"label": {"bk_biz_id": "2"}}})));
    assert!(!filter.matches(&json!({
        "metadata": {"label": {"bk_biz_id": "1", "extra": "y"}}
    })));
}

// ── Schema ────────────────────────────────────────────────────

#[test]
fn test_reopen_keeps_documents_and_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svccat.db");

    {
        let db = SqliteStore::open(&path).unwrap();
        db.insert("t", &json!({"id": 1})).unwrap();
        assert_eq!(db.next_sequence("t").unwrap(), 1);
        assert_eq!(db.next_sequence("t").unwrap(), 2);
    }

    let db = SqliteStore::open(&path).unwrap();
    assert_eq!(db.count("t", &Filter::new()).unwrap(), 1);
    assert_eq!(db.next_sequence("t").unwrap(), 3);
}

fn schema_version(path: &std::path::Path) -> i32 {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))
        .unwrap()
}

fn index_names(path: &std::path::Path) -> Vec<String> {
    let conn = rusqlite::Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index' ORDER BY name")
        .unwrap();
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    names
}

#[test]
fn test_fresh_database_at_current_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svccat.db");
    drop(SqliteStore::open(&path).unwrap());

    assert_eq!(schema_version(&path), schema::CURRENT_VERSION);
    assert!(index_names(&path).contains(&"idx_documents_parent_id".to_string()));
}

#[test]
fn test_base_version_database_is_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svccat.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(schema::BASE_SCHEMA).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [schema::BASE_VERSION],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO documents (collection, body) VALUES ('t', '{\"id\":7}')",
            [],
        )
        .unwrap();
    }

    let db = SqliteStore::open(&path).unwrap();
    assert_eq!(
        db.find_one("t", &Filter::new().eq("id", 7)).unwrap(),
        Some(json!({"id": 7}))
    );
    drop(db);
    assert_eq!(schema_version(&path), schema::CURRENT_VERSION);
    assert!(index_names(&path).contains(&"idx_documents_id".to_string()));
}

#[test]
fn test_newer_schema_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svccat.db");
    drop(SqliteStore::open(&path).unwrap());
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE schema_version SET version = ?1",
            [schema::CURRENT_VERSION + 1],
        )
        .unwrap();
    }

    assert!(SqliteStore::open(&path).is_err());
    assert_eq!(schema_version(&path), schema::CURRENT_VERSION + 1);
}

#[test]
fn test_unreadable_schema_version_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svccat.db");
    drop(SqliteStore::open(&path).unwrap());
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute("UPDATE schema_version SET version = 'garbage'", [])
            .unwrap();
    }

    // must not be mistaken for an empty database and re-migrated
    assert!(SqliteStore::open(&path).is_err());
}

// ── CRUD ──────────────────────────────────────────────────────

#[test]
fn test_insert_and_find_one() {
    let db = store();
    db.insert("t", &json!({"id": 1, "name": "web"})).unwrap();
    db.insert("t", &json!({"id": 2, "name": "db"})).unwrap();

    let found = db.find_one("t", &Filter::new().eq("id", 2)).unwrap();
    assert_eq!(found, Some(json!({"id": 2, "name": "db"})));
}

#[test]
fn test_find_one_absent_is_none() {
    let db = store();
    db.insert("t", &json!({"id": 1})).unwrap();
    assert_eq!(db.find_one("t", &Filter::new().eq("id", 9)).unwrap(), None);
    assert_eq!(db.find_one("other", &Filter::new()).unwrap(), None);
}

#[test]
fn test_tables_are_isolated() {
    let db = store();
    db.insert("a", &json!({"id": 1})).unwrap();
    db.insert("b", &json!({"id": 1})).unwrap();
    db.insert("b", &json!({"id": 2})).unwrap();
    assert_eq!(db.count("a", &Filter::new()).unwrap(), 1);
    assert_eq!(db.count("b", &Filter::new()).unwrap(), 2);
}

#[test]
fn test_find_all_in_insertion_order() {
    let db = store();
    for id in [3, 1, 2] {
        db.insert("t", &json!({"id": id, "kind": "x"})).unwrap();
    }
    db.insert("t", &json!({"id": 4, "kind": "y"})).unwrap();

    let docs = db.find_all("t", &Filter::new().eq("kind", "x")).unwrap();
    let ids: Vec<i64> = docs.iter().map(|d| d["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![3, 1, 2]);
}

#[test]
fn test_insert_rejects_non_object() {
    let db = store();
    assert!(matches!(
        db.insert("t", &json!([1, 2])),
        Err(StoreError::Codec(_))
    ));
}

#[test]
fn test_update_sets_fields_on_matches() {
    let db = store();
    db.insert("t", &json!({"id": 1, "name": "a", "version": 0}))
        .unwrap();
    db.insert("t", &json!({"id": 2, "name": "b", "version": 0}))
        .unwrap();

    let matched = db
        .update("t", &Filter::new().eq("id", 1), &json!({"name": "z", "version": 1}))
        .unwrap();
    assert_eq!(matched, 1);

    let one = db.find_one("t", &Filter::new().eq("id", 1)).unwrap().unwrap();
    assert_eq!(one, json!({"id": 1, "name": "z", "version": 1}));
    let two = db.find_one("t", &Filter::new().eq("id", 2)).unwrap().unwrap();
    assert_eq!(two["name"], "b");
}

#[test]
fn test_update_without_match_reports_zero() {
    let db = store();
    db.insert("t", &json!({"id": 1, "version": 3})).unwrap();
    let matched = db
        .update(
            "t",
            &Filter::new().eq("id", 1).eq("version", 2),
            &json!({"version": 4}),
        )
        .unwrap();
    assert_eq!(matched, 0);
    let doc = db.find_one("t", &Filter::new().eq("id", 1)).unwrap().unwrap();
    assert_eq!(doc["version"], 3);
}

#[test]
fn test_delete_returns_removed_count() {
    let db = store();
    db.insert("t", &json!({"id": 1, "parent_id": 0})).unwrap();
    db.insert("t", &json!({"id": 2, "parent_id": 1})).unwrap();
    db.insert("t", &json!({"id": 3, "parent_id": 1})).unwrap();

    assert_eq!(db.delete("t", &Filter::new().eq("parent_id", 1)).unwrap(), 2);
    assert_eq!(db.delete("t", &Filter::new().eq("parent_id", 1)).unwrap(), 0);
    assert_eq!(db.count("t", &Filter::new()).unwrap(), 1);
}

#[test]
fn test_filter_keeps_json_types_exact() {
    let db = store();
    db.insert("t", &json!({"id": 1, "flag": true})).unwrap();
    db.insert("t", &json!({"id": "1", "flag": 1})).unwrap();
    db.insert("t", &json!({"id": 1.5, "flag": false})).unwrap();

    let numeric = db.find_all("t", &Filter::new().eq("id", 1)).unwrap();
    assert_eq!(numeric, vec![json!({"id": 1, "flag": true})]);
    let text = db.find_all("t", &Filter::new().eq("id", "1")).unwrap();
    assert_eq!(text, vec![json!({"id": "1", "flag": 1})]);
    assert_eq!(db.count("t", &Filter::new().eq("flag", true)).unwrap(), 1);
    assert_eq!(db.count("t", &Filter::new().eq("id", 1.5)).unwrap(), 1);
}

#[test]
fn test_filter_combines_scalar_and_structured_fields() {
    let db = store();
    let scope = json!({"label": {"bk_biz_id": "1"}});
    db.insert("t", &json!({"id": 1, "metadata": scope})).unwrap();
    db.insert("t", &json!({"id": 2, "metadata": scope})).unwrap();
    db.insert("t", &json!({"id": 1, "metadata": {"label": {"bk_biz_id": "2"}}}))
        .unwrap();

    let found = db
        .find_all("t", &Filter::new().eq("metadata", scope.clone()).eq("id", 1))
        .unwrap();
    assert_eq!(found, vec![json!({"id": 1, "metadata": scope})]);
}

#[test]
fn test_increment_counts_up_every_match() {
    let db = store();
    db.insert("t", &json!({"id": 1, "version": 4, "name": "a"}))
        .unwrap();
    db.insert("t", &json!({"id": 2})).unwrap();

    assert_eq!(db.increment("t", &Filter::new().eq("id", 1), "version").unwrap(), 1);
    assert_eq!(db.increment("t", &Filter::new().eq("id", 2), "version").unwrap(), 1);
    assert_eq!(db.increment("t", &Filter::new().eq("id", 9), "version").unwrap(), 0);

    let one = db.find_one("t", &Filter::new().eq("id", 1)).unwrap().unwrap();
    assert_eq!(one, json!({"id": 1, "version": 5, "name": "a"}));
    let two = db.find_one("t", &Filter::new().eq("id", 2)).unwrap().unwrap();
    assert_eq!(two["version"], 1);
}

#[test]
fn test_increment_is_atomic_across_threads() {
    let db = std::sync::Arc::new(store());
    db.insert("t", &json!({"id": 1, "version": 0})).unwrap();
    let barrier = std::sync::Arc::new(std::sync::Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                for _ in 0..10 {
                    db.increment("t", &Filter::new().eq("id", 1), "version")
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let doc = db.find_one("t", &Filter::new().eq("id", 1)).unwrap().unwrap();
    assert_eq!(doc["version"], 80);
}

#[test]
fn test_increment_rejects_odd_field_names() {
    let db = store();
    db.insert("t", &json!({"id": 1})).unwrap();
    assert!(matches!(
        db.increment("t", &Filter::new(), "a.b"),
        Err(StoreError::Codec(_))
    ));
}

// ── Sequences ─────────────────────────────────────────────────

#[test]
fn test_sequences_are_per_table() {
    let db = store();
    assert_eq!(db.next_sequence("a").unwrap(), 1);
    assert_eq!(db.next_sequence("a").unwrap(), 2);
    assert_eq!(db.next_sequence("b").unwrap(), 1);
    assert_eq!(db.next_sequence("a").unwrap(), 3);
}

#[test]
fn test_sequences_unique_across_threads() {
    let db = std::sync::Arc::new(store());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let db = db.clone();
            std::thread::spawn(move || {
                (0..25)
                    .map(|_| db.next_sequence("t").unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (1..=100).collect::<Vec<_>>());
}

// ── Typed helpers ─────────────────────────────────────────────

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct Row {
    id: i64,
    name: String,
}

#[test]
fn test_typed_round_trip() {
    let db = store();
    let row = Row {
        id: 5,
        name: "web".into(),
    };
    db.insert_record("t", &row).unwrap();

    let found: Option<Row> = db.find_one_record("t", &Filter::new().eq("id", 5)).unwrap();
    assert_eq!(found, Some(row));

    let all: Vec<Row> = db.find_all_records("t", &Filter::new()).unwrap();
    assert_eq!(all.len(), 1);
}

#[test]
fn test_typed_decode_failure_is_codec_error() {
    let db = store();
    db.insert("t", &json!({"id": "not-a-number"})).unwrap();
    let result: StoreResult<Option<Row>> = db.find_one_record("t", &Filter::new());
    assert!(matches!(result, Err(StoreError::Codec(_))));
}
