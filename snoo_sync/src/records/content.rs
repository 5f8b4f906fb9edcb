use super::{RecordHeader, RecordId};
use crate::optimistic::Optimistic;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
    #[default]
    Neutral,
    Up,
    Down,
}

impl VoteStatus {
    pub fn value(self) -> i64 {
        match self {
            Self::Neutral => 0,
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// Maps the API's `likes` field: `true` up, `false` down, absent neutral.
    pub fn from_likes(likes: Option<bool>) -> Self {
        match likes {
            Some(true) => Self::Up,
            Some(false) => Self::Down,
            None => Self::Neutral,
        }
    }

    pub fn likes(self) -> Option<bool> {
        match self {
            Self::Up => Some(true),
            Self::Down => Some(false),
            Self::Neutral => None,
        }
    }
}

/// Score and the current user's vote. They change together, so they are tracked as one
/// optimistic field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteTally {
    pub score: i64,
    pub status: VoteStatus,
}

impl VoteTally {
    pub fn score_delta(old: VoteStatus, new: VoteStatus) -> i64 {
        match (old, new) {
            (VoteStatus::Down, VoteStatus::Up) => 2,
            (VoteStatus::Up, VoteStatus::Down) => -2,
            (VoteStatus::Neutral, new) => new.value(),
            (old, VoteStatus::Neutral) => -old.value(),
            _ => 0,
        }
    }

    /// The tally after the user switches to `status`, and the score change it caused.
    pub fn with_vote(self, status: VoteStatus) -> (Self, i64) {
        let delta = Self::score_delta(self.status, status);
        (
            Self {
                score: self.score + delta,
                status,
            },
            delta,
        )
    }
}

/// An image attached to a post, owned by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct Content {
    pub body: Option<String>,
    pub author: Option<String>,
    pub permalink: Option<String>,
    pub tally: Optimistic<VoteTally>,
    pub upvotes: Option<i64>,
    pub downvotes: Option<i64>,
    pub gild_count: Option<i64>,
    pub author_flair_text: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub score_hidden: bool,
    pub is_saved: bool,
    pub is_stickied: bool,
    pub is_archived: bool,
    pub is_locked: bool,
    pub media: Vec<MediaRef>,
}

impl Content {
    pub fn score(&self) -> i64 {
        self.tally.value().score
    }

    pub fn vote_status(&self) -> VoteStatus {
        self.tally.value().status
    }

    pub fn has_been_deleted(&self) -> bool {
        let removed = |value: &Option<String>| {
            matches!(value.as_deref(), Some("[deleted]") | Some("[removed]"))
        };
        removed(&self.author) && removed(&self.body)
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub header: RecordHeader,
    pub content: Content,
    /// Owned, ordered.
    pub replies: Vec<RecordId>,
    /// Back-reference only; never followed for deletion.
    pub parent: Option<RecordId>,
    /// Back-reference only.
    pub post: Option<RecordId>,
}

impl Comment {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            header: RecordHeader::new(identifier),
            content: Content::default(),
            replies: Vec::new(),
            parent: None,
            post: None,
        }
    }
}

/// Stand-in for children the server has not sent yet.
#[derive(Debug, Clone)]
pub struct MoreComments {
    pub comment: Comment,
    pub pending_count: Option<i64>,
    pub child_tokens: Vec<String>,
}

impl MoreComments {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            comment: Comment::new(identifier),
            pending_count: None,
            child_tokens: Vec::new(),
        }
    }

    /// The comma-joined form sent to the `morechildren` endpoint.
    pub fn joined_children(&self) -> String {
        self.child_tokens.join(",")
    }
}

#[derive(Debug, Clone)]
pub struct Post {
    pub header: RecordHeader,
    pub content: Content,
    pub title: Option<String>,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub flair_text: Option<String>,
    pub comment_count: Option<i64>,
    pub subreddit: Option<RecordId>,
    pub is_nsfw: bool,
    pub is_spoiler: bool,
    pub is_self: bool,
    pub is_hidden: bool,
}

impl Post {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            header: RecordHeader::new(identifier),
            content: Content::default(),
            title: None,
            url: None,
            thumbnail_url: None,
            flair_text: None,
            comment_count: None,
            subreddit: None,
            is_nsfw: false,
            is_spoiler: false,
            is_self: false,
            is_hidden: false,
        }
    }
}

/// Per-post state that must outlive the post itself, keyed by post identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostMetadata {
    pub visited: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PostMetadata {
    /// Visiting cannot be undone. Any change pushes the expiration out by `ttl`.
    /// Returns whether the visited flag changed.
    pub fn mark_visited(&mut self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let changed = !self.visited;
        self.visited = true;
        if changed {
            self.expires_at = Some(now + ttl);
        }
        changed
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub header: RecordHeader,
    pub content: Content,
    pub subject: Option<String>,
    pub post_title: Option<String>,
    pub destination: Option<String>,
    pub unread: bool,
}

impl Message {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            header: RecordHeader::new(identifier),
            content: Content::default(),
            subject: None,
            post_title: None,
            destination: None,
            unread: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub header: RecordHeader,
    pub username: Option<String>,
    pub link_karma: Option<i64>,
    pub comment_karma: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub is_gold: bool,
    pub is_mod: bool,
    pub has_mail: bool,
}

impl Account {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            header: RecordHeader::new(identifier),
            username: None,
            link_karma: None,
            comment_karma: None,
            created_at: None,
            is_gold: false,
            is_mod: false,
            has_mail: false,
        }
    }
}

/// Minimal record for thing types this client has no model for.
#[derive(Debug, Clone)]
pub struct GenericRecord {
    pub header: RecordHeader,
    pub thing_prefix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_delta_table() {
        use VoteStatus::*;
        assert_eq!(VoteTally::score_delta(Neutral, Up), 1);
        assert_eq!(VoteTally::score_delta(Neutral, Down), -1);
        assert_eq!(VoteTally::score_delta(Up, Down), -2);
        assert_eq!(VoteTally::score_delta(Down, Up), 2);
        assert_eq!(VoteTally::score_delta(Up, Neutral), -1);
        assert_eq!(VoteTally::score_delta(Down, Neutral), 1);
        assert_eq!(VoteTally::score_delta(Neutral, Neutral), 0);
        assert_eq!(VoteTally::score_delta(Up, Up), 0);
    }

    #[test]
    fn with_vote_applies_delta() {
        let tally = VoteTally {
            score: 10,
            status: VoteStatus::Up,
        };
        let (next, delta) = tally.with_vote(VoteStatus::Down);
        assert_eq!(delta, -2);
        assert_eq!(next.score, 8);
        assert_eq!(next.status, VoteStatus::Down);
    }

    #[test]
    fn deleted_requires_author_and_body() {
        let mut content = Content {
            author: Some("[deleted]".into()),
            body: Some("still here".into()),
            ..Content::default()
        };
        assert!(!content.has_been_deleted());
        content.body = Some("[removed]".into());
        assert!(content.has_been_deleted());
    }

    #[test]
    fn post_metadata_visit_is_sticky() {
        let now = Utc::now();
        let mut metadata = PostMetadata::default();
        assert!(metadata.mark_visited(now, Duration::days(30)));
        assert_eq!(metadata.expires_at, Some(now + Duration::days(30)));
        assert!(!metadata.mark_visited(now + Duration::days(1), Duration::days(30)));
        assert!(metadata.visited);
    }
}
