use rusqlite::Connection;

use crate::error::StoreError;

/// Per-notebook database: one parsed document's chunks and embeddings live
/// here, plus the tag vocabulary scoped to that notebook.
pub const NOTEBOOK_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS documents (
    doc_id            TEXT PRIMARY KEY,
    source_id         TEXT NOT NULL,
    file_hash         TEXT NOT NULL,
    size_bytes        INTEGER NOT NULL,
    page_count        INTEGER,
    total_chunks      INTEGER NOT NULL DEFAULT 0,
    detected_language TEXT,
    parser_version    TEXT NOT NULL,
    parsed_at         TEXT NOT NULL,
    effective_settings TEXT NOT NULL,
    is_enabled        INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS chunks (
    chunk_id        TEXT PRIMARY KEY,
    doc_id          TEXT NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
    chunk_index     INTEGER NOT NULL,
    chunk_type      TEXT NOT NULL,
    page_number     INTEGER,
    section_header  TEXT,
    parent_header   TEXT,
    prev_tail       TEXT,
    next_head       TEXT,
    text            TEXT NOT NULL,
    embedding_text  TEXT NOT NULL,
    parent_chunk_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id, chunk_index);

CREATE TABLE IF NOT EXISTS chunk_embeddings (
    chunk_id        TEXT PRIMARY KEY REFERENCES chunks(chunk_id) ON DELETE CASCADE,
    embedding_model TEXT NOT NULL,
    embedded_at     TEXT NOT NULL,
    embedding_failed INTEGER NOT NULL,
    vector          BLOB NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    chunk_id UNINDEXED,
    text
);

CREATE TABLE IF NOT EXISTS tags (
    name       TEXT PRIMARY KEY,
    is_enabled INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS document_tags (
    doc_id TEXT NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
    tag    TEXT NOT NULL REFERENCES tags(name) ON DELETE CASCADE,
    PRIMARY KEY (doc_id, tag)
);
";

/// Global catalogue database: notebooks, their sources, and per-notebook
/// parsing settings. Separate from the per-notebook chunk databases so a
/// corrupt notebook database never takes the catalogue down with it.
pub const GLOBAL_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS notebooks (
    id         TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sources (
    id                TEXT PRIMARY KEY,
    notebook_id       TEXT NOT NULL REFERENCES notebooks(id) ON DELETE CASCADE,
    original_filename TEXT NOT NULL,
    on_disk_path      TEXT NOT NULL,
    file_kind         TEXT NOT NULL,
    size_bytes        INTEGER NOT NULL,
    status            TEXT NOT NULL,
    enabled           INTEGER NOT NULL DEFAULT 1,
    has_docs          INTEGER NOT NULL DEFAULT 0,
    has_parsing       INTEGER NOT NULL DEFAULT 0,
    has_base          INTEGER NOT NULL DEFAULT 0,
    embeddings_status TEXT NOT NULL,
    warning           TEXT,
    sort_order        INTEGER NOT NULL,
    parser_override   TEXT,
    added_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sources_notebook ON sources(notebook_id, sort_order);

CREATE TABLE IF NOT EXISTS parsing_settings (
    notebook_id TEXT PRIMARY KEY REFERENCES notebooks(id) ON DELETE CASCADE,
    settings    TEXT NOT NULL
);
";

pub fn apply_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

pub fn migrate_notebook_db(conn: &Connection) -> Result<(), StoreError> {
    apply_pragmas(conn)?;
    conn.execute_batch(NOTEBOOK_SCHEMA_SQL)?;
    Ok(())
}

pub fn migrate_global_db(conn: &Connection) -> Result<(), StoreError> {
    apply_pragmas(conn)?;
    conn.execute_batch(GLOBAL_SCHEMA_SQL)?;
    Ok(())
}
