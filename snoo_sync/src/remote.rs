//! Port to the remote reddit API. The engine never talks HTTP itself; callers inject an
//! implementation and the engine awaits it without holding any lock.

use crate::error::RemoteError;
use crate::records::VoteStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    #[default]
    Confidence,
    Top,
    New,
    Controversial,
    Old,
    Qa,
}

impl CommentSort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confidence => "confidence",
            Self::Top => "top",
            Self::New => "new",
            Self::Controversial => "controversial",
            Self::Old => "old",
            Self::Qa => "qa",
        }
    }
}

#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn submit_vote(&self, fullname: &str, status: VoteStatus) -> Result<(), RemoteError>;

    /// Returns a things response (`{"json": {"data": {"things": [..]}}}`) holding the new
    /// comment.
    async fn submit_reply(&self, parent_fullname: &str, text: &str) -> Result<Value, RemoteError>;

    /// Expands a placeholder's child tokens. Returns a things response.
    async fn fetch_more_children(
        &self,
        link_fullname: &str,
        children: &[String],
    ) -> Result<Value, RemoteError>;

    /// Returns `[post listing, comment listing]`. `focus` narrows the response to one
    /// comment's subtree.
    async fn fetch_comments(
        &self,
        post_fullname: &str,
        focus: Option<&str>,
        sort: CommentSort,
    ) -> Result<Value, RemoteError>;
}

/// A client with no connectivity. Every call fails with [`RemoteError::Offline`], which lets
/// a session browse what the store already holds.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineClient;

#[async_trait]
impl RemoteClient for OfflineClient {
    async fn submit_vote(&self, _fullname: &str, _status: VoteStatus) -> Result<(), RemoteError> {
        Err(RemoteError::Offline)
    }

    async fn submit_reply(&self, _parent_fullname: &str, _text: &str) -> Result<Value, RemoteError> {
        Err(RemoteError::Offline)
    }

    async fn fetch_more_children(
        &self,
        _link_fullname: &str,
        _children: &[String],
    ) -> Result<Value, RemoteError> {
        Err(RemoteError::Offline)
    }

    async fn fetch_comments(
        &self,
        _post_fullname: &str,
        _focus: Option<&str>,
        _sort: CommentSort,
    ) -> Result<Value, RemoteError> {
        Err(RemoteError::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_client_reports_offline() {
        let client = OfflineClient;
        assert_eq!(
            client.submit_vote("t1_x", VoteStatus::Up).await,
            Err(RemoteError::Offline)
        );
        assert_eq!(
            client
                .fetch_comments("t3_p", None, CommentSort::Top)
                .await
                .map(|_| ()),
            Err(RemoteError::Offline)
        );
    }

    #[test]
    fn sort_names() {
        assert_eq!(CommentSort::default().as_str(), "confidence");
        assert_eq!(CommentSort::Qa.as_str(), "qa");
    }
}
