use std::path::Path;

use chrono::Utc;
use corpus_model::{
    EmbeddingsStatus, FileKind, Notebook, NotebookId, ParsingSettings, Source, SourceId, SourceStatus,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::schema::migrate_global_db;

/// The catalogue database: notebooks, their sources, and per-notebook
/// parsing settings. One file, shared across every notebook.
pub struct GlobalStore {
    conn: Connection,
}

impl GlobalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        migrate_global_db(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        migrate_global_db(&conn)?;
        Ok(Self { conn })
    }

    /// Reconciles sources left in `Indexing` by a process that died
    /// mid-ingestion: there is no worker left to finish them, so they are
    /// marked `Failed` with an explanatory warning. Call once at startup,
    /// before the orchestrator's worker loop starts.
    pub fn reconcile_interrupted_sources(&self) -> Result<usize, StoreError> {
        let n = self.conn.execute(
            "UPDATE sources SET status = 'failed', warning = 'interrupted by restart'
             WHERE status = 'indexing'",
            params![],
        )?;
        if n > 0 {
            warn!(count = n, "reconciled sources interrupted by a previous restart");
        }
        Ok(n)
    }

    pub fn create_notebook(&self, notebook: &Notebook) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO notebooks (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                notebook.id.as_str(),
                notebook.title,
                notebook.created_at.to_rfc3339(),
                notebook.updated_at.to_rfc3339(),
            ],
        )?;
        self.conn.execute(
            "INSERT INTO parsing_settings (notebook_id, settings) VALUES (?1, ?2)",
            params![notebook.id.as_str(), serde_json::to_string(&ParsingSettings::default())?],
        )?;
        info!(notebook_id = %notebook.id, "notebook created");
        Ok(())
    }

    pub fn list_notebooks(&self) -> Result<Vec<Notebook>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, created_at, updated_at FROM notebooks ORDER BY created_at DESC")?;
        let rows = stmt.query_map(params![], row_to_notebook)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn get_notebook(&self, id: &NotebookId) -> Result<Option<Notebook>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, title, created_at, updated_at FROM notebooks WHERE id = ?1",
                params![id.as_str()],
                row_to_notebook,
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn rename_notebook(&self, id: &NotebookId, title: &str) -> Result<(), StoreError> {
        let n = self.conn.execute(
            "UPDATE notebooks SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, Utc::now().to_rfc3339(), id.as_str()],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound(format!("notebook {id}")));
        }
        Ok(())
    }

    pub fn delete_notebook(&self, id: &NotebookId) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM notebooks WHERE id = ?1", params![id.as_str()])?;
        Ok(())
    }

    pub fn get_parsing_settings(&self, notebook_id: &NotebookId) -> Result<ParsingSettings, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT settings FROM parsing_settings WHERE notebook_id = ?1",
                params![notebook_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(ParsingSettings::default()),
        }
    }

    pub fn set_parsing_settings(&self, notebook_id: &NotebookId, settings: &ParsingSettings) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO parsing_settings (notebook_id, settings) VALUES (?1, ?2)
             ON CONFLICT(notebook_id) DO UPDATE SET settings = excluded.settings",
            params![notebook_id.as_str(), serde_json::to_string(settings)?],
        )?;
        Ok(())
    }

    pub fn add_source(&self, source: &Source) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sources
                (id, notebook_id, original_filename, on_disk_path, file_kind, size_bytes, status,
                 enabled, has_docs, has_parsing, has_base, embeddings_status, warning, sort_order,
                 parser_override, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                source.id.as_str(),
                source.notebook_id.as_str(),
                source.original_filename,
                source.on_disk_path,
                file_kind_str(source.file_kind),
                source.size_bytes as i64,
                source_status_str(source.status),
                source.enabled as i64,
                source.has_docs as i64,
                source.has_parsing as i64,
                source.has_base as i64,
                embeddings_status_str(source.embeddings_status),
                source.warning,
                source.sort_order,
                serde_json::to_string(&source.parser_override)?,
                source.added_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn update_source(&self, source: &Source) -> Result<(), StoreError> {
        let n = self.conn.execute(
            "UPDATE sources SET
                original_filename = ?2, on_disk_path = ?3, file_kind = ?4, size_bytes = ?5,
                status = ?6, enabled = ?7, has_docs = ?8, has_parsing = ?9, has_base = ?10,
                embeddings_status = ?11, warning = ?12, sort_order = ?13, parser_override = ?14
             WHERE id = ?1",
            params![
                source.id.as_str(),
                source.original_filename,
                source.on_disk_path,
                file_kind_str(source.file_kind),
                source.size_bytes as i64,
                source_status_str(source.status),
                source.enabled as i64,
                source.has_docs as i64,
                source.has_parsing as i64,
                source.has_base as i64,
                embeddings_status_str(source.embeddings_status),
                source.warning,
                source.sort_order,
                serde_json::to_string(&source.parser_override)?,
            ],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound(format!("source {}", source.id)));
        }
        Ok(())
    }

    pub fn delete_source(&self, id: &SourceId) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM sources WHERE id = ?1", params![id.as_str()])?;
        Ok(())
    }

    pub fn get_source(&self, id: &SourceId) -> Result<Option<Source>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, notebook_id, original_filename, on_disk_path, file_kind, size_bytes, status,
                        enabled, has_docs, has_parsing, has_base, embeddings_status, warning, sort_order,
                        parser_override, added_at
                 FROM sources WHERE id = ?1",
                params![id.as_str()],
                row_to_source,
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn list_sources(&self, notebook_id: &NotebookId) -> Result<Vec<Source>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, notebook_id, original_filename, on_disk_path, file_kind, size_bytes, status,
                    enabled, has_docs, has_parsing, has_base, embeddings_status, warning, sort_order,
                    parser_override, added_at
             FROM sources WHERE notebook_id = ?1 ORDER BY sort_order ASC, added_at ASC",
        )?;
        let rows = stmt.query_map(params![notebook_id.as_str()], row_to_source)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Every source across every notebook, for startup reconciliation (spec
    /// §4.E) where the check (file existence) is per-source but not scoped
    /// to one notebook.
    pub fn list_all_sources(&self) -> Result<Vec<Source>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, notebook_id, original_filename, on_disk_path, file_kind, size_bytes, status,
                    enabled, has_docs, has_parsing, has_base, embeddings_status, warning, sort_order,
                    parser_override, added_at
             FROM sources ORDER BY notebook_id ASC, sort_order ASC, added_at ASC",
        )?;
        let rows = stmt.query_map(params![], row_to_source)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Renumbers `sort_order` densely `1..=N` to match `ordered_ids`, the
    /// caller's desired display order (spec §8: the union of sort_order
    /// values equals `1..|sources(N)|` after any deletion sequence).
    /// Unknown ids are ignored.
    pub fn reorder_sources(&mut self, notebook_id: &NotebookId, ordered_ids: &[SourceId]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for (index, id) in ordered_ids.iter().enumerate() {
            tx.execute(
                "UPDATE sources SET sort_order = ?1 WHERE id = ?2 AND notebook_id = ?3",
                params![(index + 1) as i64, id.as_str(), notebook_id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Renumbers every source in a notebook to a dense `1..=N` sequence,
    /// preserving current relative order. Call after deleting a source.
    pub fn renumber_sources(&mut self, notebook_id: &NotebookId) -> Result<(), StoreError> {
        let ids = self.list_sources(notebook_id)?.into_iter().map(|s| s.id).collect::<Vec<_>>();
        self.reorder_sources(notebook_id, &ids)
    }
}

fn file_kind_str(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Pdf => "pdf",
        FileKind::Docx => "docx",
        FileKind::Xlsx => "xlsx",
        FileKind::Other => "other",
    }
}

fn source_status_str(status: SourceStatus) -> &'static str {
    match status {
        SourceStatus::New => "new",
        SourceStatus::Indexing => "indexing",
        SourceStatus::Indexed => "indexed",
        SourceStatus::Failed => "failed",
    }
}

fn embeddings_status_str(status: EmbeddingsStatus) -> &'static str {
    match status {
        EmbeddingsStatus::Available => "available",
        EmbeddingsStatus::Unavailable => "unavailable",
    }
}

fn row_to_notebook(row: &rusqlite::Row) -> rusqlite::Result<Notebook> {
    let created_at: String = row.get(2)?;
    let updated_at: String = row.get(3)?;
    Ok(Notebook {
        id: NotebookId::new(row.get::<_, String>(0)?),
        title: row.get(1)?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_source(row: &rusqlite::Row) -> rusqlite::Result<Source> {
    let file_kind: String = row.get(4)?;
    let status: String = row.get(6)?;
    let embeddings_status: String = row.get(11)?;
    let parser_override_json: String = row.get(14)?;
    let added_at: String = row.get(15)?;
    Ok(Source {
        id: SourceId::new(row.get::<_, String>(0)?),
        notebook_id: NotebookId::new(row.get::<_, String>(1)?),
        original_filename: row.get(2)?,
        on_disk_path: row.get(3)?,
        file_kind: match file_kind.as_str() {
            "pdf" => FileKind::Pdf,
            "docx" => FileKind::Docx,
            "xlsx" => FileKind::Xlsx,
            _ => FileKind::Other,
        },
        size_bytes: row.get::<_, i64>(5)? as u64,
        status: match status.as_str() {
            "new" => SourceStatus::New,
            "indexing" => SourceStatus::Indexing,
            "indexed" => SourceStatus::Indexed,
            _ => SourceStatus::Failed,
        },
        enabled: row.get::<_, i64>(7)? != 0,
        has_docs: row.get::<_, i64>(8)? != 0,
        has_parsing: row.get::<_, i64>(9)? != 0,
        has_base: row.get::<_, i64>(10)? != 0,
        embeddings_status: match embeddings_status.as_str() {
            "available" => EmbeddingsStatus::Available,
            _ => EmbeddingsStatus::Unavailable,
        },
        warning: row.get(12)?,
        sort_order: row.get::<_, i64>(13)? as u32,
        parser_override: serde_json::from_str(&parser_override_json).unwrap_or_default(),
        added_at: added_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_model::ParsingSettingsOverride;

    fn sample_notebook() -> Notebook {
        Notebook::new(NotebookId::new("nb1".to_string()), "First notebook", Utc::now())
    }

    fn sample_source(notebook_id: &NotebookId, order: u32) -> Source {
        Source {
            id: SourceId::new(format!("src-{order}")),
            notebook_id: notebook_id.clone(),
            original_filename: format!("file-{order}.pdf"),
            on_disk_path: format!("/tmp/file-{order}.pdf"),
            file_kind: FileKind::Pdf,
            size_bytes: 10,
            status: SourceStatus::New,
            enabled: true,
            has_docs: false,
            has_parsing: false,
            has_base: false,
            embeddings_status: EmbeddingsStatus::Unavailable,
            warning: None,
            sort_order: order,
            parser_override: ParsingSettingsOverride::default(),
            added_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_fetch_notebook_round_trips() {
        let store = GlobalStore::open_in_memory().unwrap();
        let notebook = sample_notebook();
        store.create_notebook(&notebook).unwrap();

        let fetched = store.get_notebook(&notebook.id).unwrap().unwrap();
        assert_eq!(fetched.title, "First notebook");
    }

    #[test]
    fn interrupted_sources_are_marked_failed_on_reconcile() {
        let store = GlobalStore::open_in_memory().unwrap();
        let notebook = sample_notebook();
        store.create_notebook(&notebook).unwrap();
        let mut source = sample_source(&notebook.id, 0);
        source.status = SourceStatus::Indexing;
        store.add_source(&source).unwrap();

        let reconciled = store.reconcile_interrupted_sources().unwrap();
        assert_eq!(reconciled, 1);

        let refreshed = store.get_source(&source.id).unwrap().unwrap();
        assert_eq!(refreshed.status, SourceStatus::Failed);
        assert!(refreshed.warning.is_some());
    }

    #[test]
    fn reorder_sources_renumbers_densely() {
        let mut store = GlobalStore::open_in_memory().unwrap();
        let notebook = sample_notebook();
        store.create_notebook(&notebook).unwrap();
        let a = sample_source(&notebook.id, 0);
        let b = sample_source(&notebook.id, 1);
        store.add_source(&a).unwrap();
        store.add_source(&b).unwrap();

        store.reorder_sources(&notebook.id, &[b.id.clone(), a.id.clone()]).unwrap();

        let sources = store.list_sources(&notebook.id).unwrap();
        assert_eq!(sources[0].id, b.id);
        assert_eq!(sources[1].id, a.id);
    }

    #[test]
    fn default_parsing_settings_applied_on_create() {
        let store = GlobalStore::open_in_memory().unwrap();
        let notebook = sample_notebook();
        store.create_notebook(&notebook).unwrap();

        let settings = store.get_parsing_settings(&notebook.id).unwrap();
        assert_eq!(settings.chunk_size, ParsingSettings::default().chunk_size);
    }
}
