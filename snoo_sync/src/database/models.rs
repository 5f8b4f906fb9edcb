use serde::{Deserialize, Serialize};

/// One record of the graph. `payload` is the record's thing JSON; the header fields that
/// a parse would overwrite are kept in their own columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    pub kind: String,
    pub identifier: String,
    pub payload: String,
    pub expires_at: Option<String>,
    pub last_refreshed_at: Option<String>,
    pub bookmarked: bool,
    pub reported: bool,
    pub sort_order: i64,
    pub last_visited_at: Option<String>,
}

/// An owned relation: a reply under a comment, or a member of a multireddit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub owner_kind: String,
    pub owner_identifier: String,
    pub child_kind: String,
    pub child_identifier: String,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetadataRow {
    pub post_identifier: String,
    pub visited: bool,
    pub expires_at: Option<String>,
}
