use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::NotebookId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub notebook_id: NotebookId,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
