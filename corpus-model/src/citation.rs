use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{NoteId, NotebookId, SourceId};

/// User-persisted pointer into a source (spec §3). Deleting the owning
/// source cascades removal of its citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCitation {
    pub id: String,
    pub notebook_id: NotebookId,
    pub source_id: SourceId,
    pub page: Option<u32>,
    pub quote: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A free-standing note not bound to any notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalNote {
    pub id: NoteId,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
