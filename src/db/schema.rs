/// Tables every database starts from, at `BASE_VERSION`.
pub(crate) const BASE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    doc_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    body       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);

CREATE TABLE IF NOT EXISTS sequences (
    name  TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
"#;

pub(crate) const BASE_VERSION: i32 = 1;

/// Expression indexes for the fields lookups filter on. The expressions must
/// stay textually identical to the ones `sqlite::matching` generates.
const V2_FIELD_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_documents_id
    ON documents(collection, json_extract(body, '$.id'));
CREATE INDEX IF NOT EXISTS idx_documents_parent_id
    ON documents(collection, json_extract(body, '$.parent_id'));
CREATE INDEX IF NOT EXISTS idx_documents_service_category_id
    ON documents(collection, json_extract(body, '$.service_category_id'));
"#;

/// `(version it applies to, sql)`, in order. Applying one moves the database
/// to the next version.
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[(1, V2_FIELD_INDEXES)];

pub(crate) const CURRENT_VERSION: i32 = 2;
