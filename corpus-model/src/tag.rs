use serde::{Deserialize, Serialize};

/// Per-notebook label. A chunk is visible to retrieval only if its document
/// is enabled and none of its attached tags are disabled (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub is_enabled: bool,
}
