use std::path::Path;

use chrono::Utc;
use corpus_model::{ChunkId, ChunkType, DocId, DocumentMetadata, EmbeddedChunk, ParsedChunk, ParsingSettings, Tag};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use tracing::debug;

use crate::error::StoreError;
use crate::schema::migrate_notebook_db;
use crate::vector::{cosine_similarity, decode_vector, encode_vector};

/// One notebook's chunk database: documents, their chunks, embeddings and
/// tag vocabulary. Each notebook owns exactly one of these sqlite files.
pub struct NotebookStore {
    conn: Connection,
}

pub struct ScoredChunk {
    pub chunk: ParsedChunk,
    pub doc_id: DocId,
    pub score: f32,
}

/// Gates which chunks a retrieval call can see (spec §3, §4.D): a chunk is
/// visible only if its document is enabled, optionally narrowed to a set of
/// sources, and — when `exclude_disabled_tags` is set — only if none of its
/// document's tags are disabled.
#[derive(Debug, Clone, Default)]
pub struct VisibilityFilter {
    pub selected_source_ids: Option<Vec<String>>,
    pub exclude_disabled_tags: bool,
}

impl VisibilityFilter {
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds the `AND`-joined SQL predicate (referencing a `documents`
    /// alias `d` and a `chunks` alias `c`) plus its bound parameters, in
    /// the order they appear in the predicate.
    fn build(&self) -> (String, Vec<String>) {
        let mut clauses = vec!["d.is_enabled = 1".to_string()];
        let mut bound: Vec<String> = Vec::new();

        if let Some(ids) = &self.selected_source_ids {
            if ids.is_empty() {
                clauses.push("0".to_string());
            } else {
                let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
                clauses.push(format!("d.source_id IN ({})", placeholders.join(",")));
                bound.extend(ids.iter().cloned());
            }
        }

        if self.exclude_disabled_tags {
            clauses.push(
                "NOT EXISTS (SELECT 1 FROM document_tags dt JOIN tags t ON t.name = dt.tag \
                 WHERE dt.doc_id = d.doc_id AND t.is_enabled = 0)"
                    .to_string(),
            );
        }

        (clauses.join(" AND "), bound)
    }
}

impl NotebookStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        migrate_notebook_db(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        migrate_notebook_db(&conn)?;
        Ok(Self { conn })
    }

    /// Replaces a document's chunk set in one transaction: delete the old
    /// rows (if any), insert the new metadata/chunks/embeddings/FTS rows,
    /// commit. A crash mid-way leaves the previous version intact rather
    /// than a half-written document.
    pub fn upsert_document(
        &mut self,
        metadata: &DocumentMetadata,
        source_id: &str,
        chunks: &[EmbeddedChunk],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        let stale_chunk_ids: Vec<String> = tx
            .prepare("SELECT chunk_id FROM chunks WHERE doc_id = ?1")?
            .query_map(params![metadata.doc_id.as_str()], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        for chunk_id in &stale_chunk_ids {
            tx.execute("DELETE FROM chunks_fts WHERE chunk_id = ?1", params![chunk_id])?;
        }
        tx.execute("DELETE FROM document_tags WHERE doc_id = ?1", params![metadata.doc_id.as_str()])?;
        tx.execute("DELETE FROM documents WHERE doc_id = ?1", params![metadata.doc_id.as_str()])?;

        let settings_json = serde_json::to_string(&metadata.effective_settings)?;
        tx.execute(
            "INSERT INTO documents
                (doc_id, source_id, file_hash, size_bytes, page_count, total_chunks,
                 detected_language, parser_version, parsed_at, effective_settings, is_enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                metadata.doc_id.as_str(),
                source_id,
                metadata.file_hash,
                metadata.size_bytes as i64,
                metadata.page_count,
                metadata.total_chunks as i64,
                metadata.detected_language,
                metadata.parser_version,
                metadata.parsed_at.to_rfc3339(),
                settings_json,
                metadata.is_enabled as i64,
            ],
        )?;

        for embedded in chunks {
            let c = &embedded.chunk;
            tx.execute(
                "INSERT INTO chunks
                    (chunk_id, doc_id, chunk_index, chunk_type, page_number, section_header,
                     parent_header, prev_tail, next_head, text, embedding_text, parent_chunk_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    c.chunk_id.as_str(),
                    c.doc_id.as_str(),
                    c.chunk_index,
                    serde_json::to_value(c.chunk_type)?.as_str().unwrap_or("text"),
                    c.page_number,
                    c.section_header,
                    c.parent_header,
                    c.prev_tail,
                    c.next_head,
                    c.text,
                    c.text_for_embedding(),
                    c.parent_chunk_id,
                ],
            )?;
            tx.execute(
                "INSERT INTO chunks_fts (chunk_id, text) VALUES (?1, ?2)",
                params![c.chunk_id.as_str(), c.text],
            )?;
            tx.execute(
                "INSERT INTO chunk_embeddings (chunk_id, embedding_model, embedded_at, embedding_failed, vector)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    c.chunk_id.as_str(),
                    embedded.embedding_model,
                    embedded.embedded_at.to_rfc3339(),
                    embedded.embedding_failed as i64,
                    encode_vector(&embedded.vector),
                ],
            )?;
        }

        tx.commit()?;
        debug!(doc_id = %metadata.doc_id, chunk_count = chunks.len(), "document upserted");
        Ok(())
    }

    pub fn delete_document(&mut self, doc_id: &DocId) -> Result<(), StoreError> {
        let chunk_ids: Vec<String> = self
            .conn
            .prepare("SELECT chunk_id FROM chunks WHERE doc_id = ?1")?
            .query_map(params![doc_id.as_str()], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        for chunk_id in &chunk_ids {
            self.conn
                .execute("DELETE FROM chunks_fts WHERE chunk_id = ?1", params![chunk_id])?;
        }
        self.conn
            .execute("DELETE FROM document_tags WHERE doc_id = ?1", params![doc_id.as_str()])?;
        self.conn
            .execute("DELETE FROM documents WHERE doc_id = ?1", params![doc_id.as_str()])?;
        Ok(())
    }

    pub fn set_document_enabled(&self, doc_id: &DocId, enabled: bool) -> Result<(), StoreError> {
        let n = self.conn.execute(
            "UPDATE documents SET is_enabled = ?1 WHERE doc_id = ?2",
            params![enabled as i64, doc_id.as_str()],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound(format!("document {doc_id}")));
        }
        Ok(())
    }

    pub fn list_chunks(&self, doc_id: &DocId) -> Result<Vec<ParsedChunk>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT chunk_id, doc_id, chunk_index, chunk_type, page_number, section_header,
                    parent_header, prev_tail, next_head, text, embedding_text, parent_chunk_id
             FROM chunks WHERE doc_id = ?1 ORDER BY chunk_index ASC",
        )?;
        let rows = stmt.query_map(params![doc_id.as_str()], row_to_chunk)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn chunk_count(&self, doc_id: &DocId) -> Result<u32, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE doc_id = ?1",
            params![doc_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as u32)
    }

    /// Full-text search with the fallback chain: FTS5 BM25 match, then a
    /// plain `LIKE` OR-of-terms scan, then the newest rows as a last
    /// resort so a query never returns nothing just because FTS5 choked
    /// on special syntax.
    pub fn search_fts(&self, query: &str, limit: usize, filter: &VisibilityFilter) -> Result<Vec<ScoredChunk>, StoreError> {
        if let Ok(rows) = self.search_fts_bm25(query, limit, filter) {
            if !rows.is_empty() {
                return Ok(rows);
            }
        }
        let like_rows = self.search_fts_like(query, limit, filter)?;
        if !like_rows.is_empty() {
            return Ok(like_rows);
        }
        self.search_fts_newest(limit, filter)
    }

    fn search_fts_bm25(&self, query: &str, limit: usize, filter: &VisibilityFilter) -> Result<Vec<ScoredChunk>, StoreError> {
        let (visibility, mut bound) = filter.build();
        let sql = format!(
            "SELECT c.chunk_id, c.doc_id, c.chunk_index, c.chunk_type, c.page_number, c.section_header,
                    c.parent_header, c.prev_tail, c.next_head, c.text, c.embedding_text, c.parent_chunk_id,
                    bm25(chunks_fts) AS rank
             FROM chunks_fts
             JOIN chunks c ON c.chunk_id = chunks_fts.chunk_id
             JOIN documents d ON d.doc_id = c.doc_id
             WHERE chunks_fts MATCH ? AND {visibility}
             ORDER BY rank ASC
             LIMIT ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut params: Vec<String> = vec![fts_query(query)];
        params.append(&mut bound);
        let limit_str = limit.to_string();
        params.push(limit_str);
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            let chunk = row_to_chunk(row)?;
            let rank: f64 = row.get(12)?;
            Ok(ScoredChunk {
                doc_id: chunk.doc_id.clone(),
                score: (-rank) as f32,
                chunk,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    fn search_fts_like(&self, query: &str, limit: usize, filter: &VisibilityFilter) -> Result<Vec<ScoredChunk>, StoreError> {
        let terms: Vec<&str> = query.split_whitespace().filter(|t| !t.is_empty()).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let (visibility, mut bound) = filter.build();
        let clauses: Vec<String> = terms.iter().map(|_| "c.text LIKE ?".to_string()).collect();
        let sql = format!(
            "SELECT c.chunk_id, c.doc_id, c.chunk_index, c.chunk_type, c.page_number, c.section_header,
                    c.parent_header, c.prev_tail, c.next_head, c.text, c.embedding_text, c.parent_chunk_id
             FROM chunks c
             JOIN documents d ON d.doc_id = c.doc_id
             WHERE ({}) AND {visibility}
             ORDER BY c.chunk_index ASC
             LIMIT ?",
            clauses.join(" OR ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut params: Vec<String> = terms.iter().map(|t| format!("%{t}%")).collect();
        params.append(&mut bound);
        params.push(limit.to_string());
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            let chunk = row_to_chunk(row)?;
            Ok(ScoredChunk { doc_id: chunk.doc_id.clone(), score: 0.0, chunk })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    fn search_fts_newest(&self, limit: usize, filter: &VisibilityFilter) -> Result<Vec<ScoredChunk>, StoreError> {
        let (visibility, mut bound) = filter.build();
        let sql = format!(
            "SELECT c.chunk_id, c.doc_id, c.chunk_index, c.chunk_type, c.page_number, c.section_header,
                    c.parent_header, c.prev_tail, c.next_head, c.text, c.embedding_text, c.parent_chunk_id
             FROM chunks c
             JOIN documents d ON d.doc_id = c.doc_id
             WHERE {visibility}
             ORDER BY d.parsed_at DESC, c.chunk_index ASC
             LIMIT ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        bound.push(limit.to_string());
        let rows = stmt.query_map(params_from_iter(bound.iter()), |row| {
            let chunk = row_to_chunk(row)?;
            Ok(ScoredChunk { doc_id: chunk.doc_id.clone(), score: 0.0, chunk })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Brute-force cosine scan over every stored embedding. Acceptable at
    /// the notebook sizes this store targets; no approximate index.
    pub fn search_vector(&self, query_vec: &[f32], limit: usize, filter: &VisibilityFilter) -> Result<Vec<ScoredChunk>, StoreError> {
        let (visibility, bound) = filter.build();
        let sql = format!(
            "SELECT c.chunk_id, c.doc_id, c.chunk_index, c.chunk_type, c.page_number, c.section_header,
                    c.parent_header, c.prev_tail, c.next_head, c.text, c.embedding_text, c.parent_chunk_id,
                    e.vector
             FROM chunk_embeddings e
             JOIN chunks c ON c.chunk_id = e.chunk_id
             JOIN documents d ON d.doc_id = c.doc_id
             WHERE e.embedding_failed = 0 AND {visibility}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params: Vec<&dyn ToSql> = bound.iter().map(|p| p as &dyn ToSql).collect();
        let mut scored: Vec<ScoredChunk> = stmt
            .query_map(params.as_slice(), |row| {
                let chunk = row_to_chunk(row)?;
                let vector_bytes: Vec<u8> = row.get(12)?;
                Ok((chunk, vector_bytes))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(chunk, bytes)| {
                let vector = decode_vector(&bytes);
                let score = cosine_similarity(query_vec, &vector);
                ScoredChunk { doc_id: chunk.doc_id.clone(), score, chunk }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    pub fn upsert_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO tags (name, is_enabled) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET is_enabled = excluded.is_enabled",
            params![tag.name, tag.is_enabled as i64],
        )?;
        Ok(())
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT name, is_enabled FROM tags ORDER BY name ASC")?;
        let rows = stmt.query_map(params![], |row| {
            Ok(Tag { name: row.get(0)?, is_enabled: row.get::<_, i64>(1)? != 0 })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn set_document_tags(&mut self, doc_id: &DocId, tags: &[String]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM document_tags WHERE doc_id = ?1", params![doc_id.as_str()])?;
        for tag in tags {
            tx.execute(
                "INSERT OR IGNORE INTO tags (name, is_enabled) VALUES (?1, 1)",
                params![tag],
            )?;
            tx.execute(
                "INSERT INTO document_tags (doc_id, tag) VALUES (?1, ?2)",
                params![doc_id.as_str(), tag],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_document(&self, doc_id: &DocId) -> Result<Option<DocumentMetadata>, StoreError> {
        self.conn
            .query_row(
                "SELECT doc_id, file_hash, size_bytes, page_count, total_chunks, detected_language,
                        parser_version, parsed_at, effective_settings, is_enabled
                 FROM documents WHERE doc_id = ?1",
                params![doc_id.as_str()],
                row_to_document,
            )
            .optional()
            .map_err(StoreError::from)
    }

    /// Rewrites `doc_id` and `source_id` references throughout the database
    /// according to the given old→new maps. Used by notebook duplication
    /// (spec §4.F) after the database file itself has been byte-copied, so
    /// the copy's rows point at the new notebook's own source/doc ids
    /// rather than aliasing the original notebook's.
    pub fn remap_ids(
        &mut self,
        doc_id_map: &std::collections::HashMap<String, String>,
        source_id_map: &std::collections::HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for (old, new) in doc_id_map {
            tx.execute("UPDATE documents SET doc_id = ?1 WHERE doc_id = ?2", params![new, old])?;
            tx.execute("UPDATE chunks SET doc_id = ?1 WHERE doc_id = ?2", params![new, old])?;
            tx.execute("UPDATE document_tags SET doc_id = ?1 WHERE doc_id = ?2", params![new, old])?;
        }
        for (old, new) in source_id_map {
            tx.execute("UPDATE documents SET source_id = ?1 WHERE source_id = ?2", params![new, old])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// All `(doc_id, source_id)` pairs currently stored, for building the
    /// remap tables a notebook duplication needs.
    pub fn list_doc_source_pairs(&self) -> Result<Vec<(String, String)>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT doc_id, source_id FROM documents")?;
        let rows = stmt.query_map(params![], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn get_document_by_source(&self, source_id: &str) -> Result<Option<DocumentMetadata>, StoreError> {
        self.conn
            .query_row(
                "SELECT doc_id, file_hash, size_bytes, page_count, total_chunks, detected_language,
                        parser_version, parsed_at, effective_settings, is_enabled
                 FROM documents WHERE source_id = ?1",
                params![source_id],
                row_to_document,
            )
            .optional()
            .map_err(StoreError::from)
    }
}

fn fts_query(query: &str) -> String {
    let terms: Vec<String> = query
        .split_whitespace()
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.replace('"', "")))
        .collect();
    terms.join(" OR ")
}

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<ParsedChunk> {
    let chunk_type_str: String = row.get(3)?;
    let chunk_type: ChunkType = serde_json::from_value(serde_json::Value::String(chunk_type_str))
        .unwrap_or(ChunkType::Text);
    Ok(ParsedChunk {
        chunk_id: ChunkId::new(row.get::<_, String>(0)?),
        doc_id: DocId::new(row.get::<_, String>(1)?),
        chunk_index: row.get::<_, i64>(2)? as u32,
        chunk_type,
        page_number: row.get(4)?,
        section_header: row.get(5)?,
        parent_header: row.get(6)?,
        prev_tail: row.get(7)?,
        next_head: row.get(8)?,
        text: row.get(9)?,
        embedding_text: row.get(10)?,
        parent_chunk_id: row.get(11)?,
    })
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<DocumentMetadata> {
    let settings_json: String = row.get(8)?;
    let settings: ParsingSettings = serde_json::from_str(&settings_json).unwrap_or_default();
    let parsed_at_str: String = row.get(7)?;
    Ok(DocumentMetadata {
        doc_id: DocId::new(row.get::<_, String>(0)?),
        file_hash: row.get(1)?,
        size_bytes: row.get::<_, i64>(2)? as u64,
        page_count: row.get(3)?,
        total_chunks: row.get::<_, i64>(4)? as u32,
        detected_language: row.get(5)?,
        parser_version: row.get(6)?,
        parsed_at: parsed_at_str.parse().unwrap_or_else(|_| Utc::now()),
        effective_settings: settings,
        is_enabled: row.get::<_, i64>(9)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_model::ChunkId as CId;
    use corpus_model::DocId as DId;

    fn sample_chunk(doc_id: &str, index: u32, text: &str) -> ParsedChunk {
        ParsedChunk {
            chunk_id: CId::new(format!("{doc_id}-{index}")),
            doc_id: DId::new(doc_id.to_string()),
            chunk_index: index,
            chunk_type: ChunkType::Text,
            page_number: Some(1),
            section_header: None,
            parent_header: None,
            prev_tail: None,
            next_head: None,
            text: text.to_string(),
            embedding_text: None,
            parent_chunk_id: None,
        }
    }

    fn sample_metadata(doc_id: &str) -> DocumentMetadata {
        DocumentMetadata {
            doc_id: DId::new(doc_id.to_string()),
            file_hash: "abc".to_string(),
            size_bytes: 100,
            page_count: Some(1),
            total_chunks: 1,
            detected_language: None,
            parser_version: "1".to_string(),
            parsed_at: Utc::now(),
            effective_settings: ParsingSettings::default(),
            is_enabled: true,
        }
    }

    #[test]
    fn upsert_then_list_round_trips_chunks() {
        let mut store = NotebookStore::open_in_memory().unwrap();
        let chunk = sample_chunk("doc1", 0, "hello world");
        let embedded = EmbeddedChunk::new(chunk, vec![1.0, 0.0], "m".to_string(), Utc::now());
        store.upsert_document(&sample_metadata("doc1"), "src1", &[embedded]).unwrap();

        let chunks = store.list_chunks(&DId::new("doc1".to_string())).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
    }

    #[test]
    fn upsert_replaces_previous_chunk_set() {
        let mut store = NotebookStore::open_in_memory().unwrap();
        let first = EmbeddedChunk::new(sample_chunk("doc1", 0, "first version"), vec![1.0], "m".to_string(), Utc::now());
        store.upsert_document(&sample_metadata("doc1"), "src1", &[first]).unwrap();

        let second = EmbeddedChunk::new(sample_chunk("doc1", 0, "second version"), vec![1.0], "m".to_string(), Utc::now());
        store.upsert_document(&sample_metadata("doc1"), "src1", &[second]).unwrap();

        let chunks = store.list_chunks(&DId::new("doc1".to_string())).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "second version");
    }

    #[test]
    fn upsert_called_twice_with_same_args_is_idempotent() {
        let mut store = NotebookStore::open_in_memory().unwrap();
        let chunk = EmbeddedChunk::new(sample_chunk("doc1", 0, "stable text"), vec![1.0], "m".to_string(), Utc::now());
        store.upsert_document(&sample_metadata("doc1"), "src1", &[chunk.clone()]).unwrap();
        store.upsert_document(&sample_metadata("doc1"), "src1", &[chunk]).unwrap();

        assert_eq!(store.chunk_count(&DId::new("doc1".to_string())).unwrap(), 1);
    }

    #[test]
    fn fts_search_finds_matching_text() {
        let mut store = NotebookStore::open_in_memory().unwrap();
        let chunk = sample_chunk("doc1", 0, "reciprocal rank fusion combines rankings");
        let embedded = EmbeddedChunk::new(chunk, vec![1.0], "m".to_string(), Utc::now());
        store.upsert_document(&sample_metadata("doc1"), "src1", &[embedded]).unwrap();

        let results = store.search_fts("fusion", 10, &VisibilityFilter::none()).unwrap();
        assert!(!results.is_empty());
        assert!(results[0].chunk.text.contains("fusion"));
    }

    #[test]
    fn empty_query_falls_back_to_newest_rows() {
        let mut store = NotebookStore::open_in_memory().unwrap();
        let chunk = sample_chunk("doc1", 0, "anything at all");
        let embedded = EmbeddedChunk::new(chunk, vec![1.0], "m".to_string(), Utc::now());
        store.upsert_document(&sample_metadata("doc1"), "src1", &[embedded]).unwrap();

        let results = store
            .search_fts(
                "",
                10,
                &VisibilityFilter { selected_source_ids: Some(vec!["src1".to_string()]), exclude_disabled_tags: false },
            )
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn vector_search_ranks_by_cosine_similarity() {
        let mut store = NotebookStore::open_in_memory().unwrap();
        let a = EmbeddedChunk::new(sample_chunk("doc1", 0, "a"), vec![1.0, 0.0], "m".to_string(), Utc::now());
        let b = EmbeddedChunk::new(sample_chunk("doc1", 1, "b"), vec![0.0, 1.0], "m".to_string(), Utc::now());
        store.upsert_document(&sample_metadata("doc1"), "src1", &[a, b]).unwrap();

        let results = store.search_vector(&[1.0, 0.0], 1, &VisibilityFilter::none()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.text, "a");
    }

    #[test]
    fn selected_source_ids_narrows_results() {
        let mut store = NotebookStore::open_in_memory().unwrap();
        let a = EmbeddedChunk::new(sample_chunk("doc1", 0, "from source one"), vec![1.0, 0.0], "m".to_string(), Utc::now());
        let b = EmbeddedChunk::new(sample_chunk("doc2", 0, "from source two"), vec![1.0, 0.0], "m".to_string(), Utc::now());
        store.upsert_document(&sample_metadata("doc1"), "src1", &[a]).unwrap();
        store.upsert_document(&sample_metadata("doc2"), "src2", &[b]).unwrap();

        let filter = VisibilityFilter { selected_source_ids: Some(vec!["src2".to_string()]), exclude_disabled_tags: false };
        let results = store.search_vector(&[1.0, 0.0], 10, &filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.doc_id.as_str(), "doc2");
    }

    #[test]
    fn disabled_tag_hides_document_when_gated() {
        let mut store = NotebookStore::open_in_memory().unwrap();
        let chunk = EmbeddedChunk::new(sample_chunk("doc1", 0, "gated text"), vec![1.0], "m".to_string(), Utc::now());
        store.upsert_document(&sample_metadata("doc1"), "src1", &[chunk]).unwrap();
        store.set_document_tags(&DId::new("doc1".to_string()), &["restricted".to_string()]).unwrap();
        store.upsert_tag(&Tag { name: "restricted".to_string(), is_enabled: false }).unwrap();

        let gated = VisibilityFilter { selected_source_ids: None, exclude_disabled_tags: true };
        let results = store.search_fts("gated", 10, &gated).unwrap();
        assert!(results.is_empty());

        let ungated = VisibilityFilter::none();
        let results = store.search_fts("gated", 10, &ungated).unwrap();
        assert!(!results.is_empty());
    }

    #[test]
    fn disabled_document_never_surfaces() {
        let mut store = NotebookStore::open_in_memory().unwrap();
        let chunk = EmbeddedChunk::new(sample_chunk("doc1", 0, "disabled doc text"), vec![1.0], "m".to_string(), Utc::now());
        store.upsert_document(&sample_metadata("doc1"), "src1", &[chunk]).unwrap();
        store.set_document_enabled(&DId::new("doc1".to_string()), false).unwrap();

        let results = store.search_fts("disabled", 10, &VisibilityFilter::none()).unwrap();
        assert!(results.is_empty());
    }
}
