use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::NotebookId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub id: NotebookId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notebook {
    pub fn new(id: NotebookId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
