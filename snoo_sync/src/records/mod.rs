//! The record graph: one closed enum over every thing type the client models.

mod content;
mod kind;
mod payload;
mod subreddit;

pub use content::{
    Account, Comment, Content, GenericRecord, MediaRef, Message, MoreComments, Post,
    PostMetadata, VoteStatus, VoteTally,
};
pub use kind::{Fullname, RecordKind, ThingType};
pub use payload::{to_payload, to_thing};
pub use subreddit::{
    section_name_for, Multireddit, SubmissionType, Subreddit, SubredditVisibility,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Handle into a [`crate::store::RecordStore`]. Only valid for the store that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordId(pub(crate) usize);

impl RecordId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fields every record carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub identifier: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub is_bookmarked: bool,
    pub order: i64,
    pub is_reported: bool,
}

impl RecordHeader {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            expires_at: None,
            last_refreshed_at: None,
            is_bookmarked: false,
            order: 0,
            is_reported: false,
        }
    }
}

/// Shared-field access across every record type.
pub trait SyncObject {
    fn header(&self) -> &RecordHeader;
    fn header_mut(&mut self) -> &mut RecordHeader;

    fn identifier(&self) -> &str {
        &self.header().identifier
    }
}

macro_rules! impl_sync_object {
    ($($ty:ty => $($field:ident).+;)*) => {
        $(
            impl SyncObject for $ty {
                fn header(&self) -> &RecordHeader {
                    &self.$($field).+
                }
                fn header_mut(&mut self) -> &mut RecordHeader {
                    &mut self.$($field).+
                }
            }
        )*
    };
}

impl_sync_object! {
    Comment => header;
    MoreComments => comment.header;
    Post => header;
    Message => header;
    Account => header;
    Subreddit => header;
    Multireddit => subreddit.header;
    GenericRecord => header;
}

#[derive(Debug, Clone)]
pub enum Record {
    Comment(Comment),
    More(MoreComments),
    Link(Post),
    Message(Message),
    Account(Account),
    Subreddit(Subreddit),
    Multireddit(Multireddit),
    Unknown(GenericRecord),
}

impl Record {
    /// An empty record of `kind` carrying nothing but its identity.
    pub fn bare(kind: RecordKind, identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        match kind {
            RecordKind::Comment => Self::Comment(Comment::new(identifier)),
            RecordKind::More => Self::More(MoreComments::new(identifier)),
            RecordKind::Link => Self::Link(Post::new(identifier)),
            RecordKind::Message => Self::Message(Message::new(identifier)),
            RecordKind::Account => Self::Account(Account::new(identifier)),
            RecordKind::Subreddit => Self::Subreddit(Subreddit::new(identifier)),
            RecordKind::Multireddit => Self::Multireddit(Multireddit::new(identifier)),
            RecordKind::Unknown => Self::Unknown(GenericRecord {
                header: RecordHeader::new(identifier),
                thing_prefix: None,
            }),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Comment(_) => RecordKind::Comment,
            Self::More(_) => RecordKind::More,
            Self::Link(_) => RecordKind::Link,
            Self::Message(_) => RecordKind::Message,
            Self::Account(_) => RecordKind::Account,
            Self::Subreddit(_) => RecordKind::Subreddit,
            Self::Multireddit(_) => RecordKind::Multireddit,
            Self::Unknown(_) => RecordKind::Unknown,
        }
    }

    fn object(&self) -> &dyn SyncObject {
        match self {
            Self::Comment(record) => record,
            Self::More(record) => record,
            Self::Link(record) => record,
            Self::Message(record) => record,
            Self::Account(record) => record,
            Self::Subreddit(record) => record,
            Self::Multireddit(record) => record,
            Self::Unknown(record) => record,
        }
    }

    fn object_mut(&mut self) -> &mut dyn SyncObject {
        match self {
            Self::Comment(record) => record,
            Self::More(record) => record,
            Self::Link(record) => record,
            Self::Message(record) => record,
            Self::Account(record) => record,
            Self::Subreddit(record) => record,
            Self::Multireddit(record) => record,
            Self::Unknown(record) => record,
        }
    }

    /// `"{prefix}_{identifier}"`; unknown records fall back to the prefix they were parsed
    /// with, or the bare identifier.
    pub fn fullname(&self) -> String {
        let prefix = match self {
            Self::Unknown(record) => record.thing_prefix.as_deref(),
            other => other.kind().prefix(),
        };
        match prefix {
            Some(prefix) => format!("{prefix}_{}", self.identifier()),
            None => self.identifier().to_string(),
        }
    }

    pub fn content(&self) -> Option<&Content> {
        match self {
            Self::Comment(comment) => Some(&comment.content),
            Self::More(more) => Some(&more.comment.content),
            Self::Link(post) => Some(&post.content),
            Self::Message(message) => Some(&message.content),
            _ => None,
        }
    }

    pub fn content_mut(&mut self) -> Option<&mut Content> {
        match self {
            Self::Comment(comment) => Some(&mut comment.content),
            Self::More(more) => Some(&mut more.comment.content),
            Self::Link(post) => Some(&mut post.content),
            Self::Message(message) => Some(&mut message.content),
            _ => None,
        }
    }

    /// The comment part of a comment or "more" placeholder.
    pub fn as_comment(&self) -> Option<&Comment> {
        match self {
            Self::Comment(comment) => Some(comment),
            Self::More(more) => Some(&more.comment),
            _ => None,
        }
    }

    pub fn as_comment_mut(&mut self) -> Option<&mut Comment> {
        match self {
            Self::Comment(comment) => Some(comment),
            Self::More(more) => Some(&mut more.comment),
            _ => None,
        }
    }

    pub fn as_more(&self) -> Option<&MoreComments> {
        match self {
            Self::More(more) => Some(more),
            _ => None,
        }
    }

    pub fn as_post(&self) -> Option<&Post> {
        match self {
            Self::Link(post) => Some(post),
            _ => None,
        }
    }

    pub fn as_post_mut(&mut self) -> Option<&mut Post> {
        match self {
            Self::Link(post) => Some(post),
            _ => None,
        }
    }

    /// Subreddit fields, including those embedded in a multireddit.
    pub fn as_subreddit(&self) -> Option<&Subreddit> {
        match self {
            Self::Subreddit(subreddit) => Some(subreddit),
            Self::Multireddit(multi) => Some(&multi.subreddit),
            _ => None,
        }
    }

    pub fn as_subreddit_mut(&mut self) -> Option<&mut Subreddit> {
        match self {
            Self::Subreddit(subreddit) => Some(subreddit),
            Self::Multireddit(multi) => Some(&mut multi.subreddit),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::More(_))
    }

    pub fn replies(&self) -> &[RecordId] {
        self.as_comment()
            .map(|comment| comment.replies.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self) -> Option<RecordId> {
        self.as_comment().and_then(|comment| comment.parent)
    }

    /// Everything this record owns; eviction cascades along these edges only.
    pub fn owned_children(&self) -> Vec<RecordId> {
        match self {
            Self::Comment(comment) => comment.replies.clone(),
            Self::More(more) => more.comment.replies.clone(),
            Self::Multireddit(multi) => multi.members.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Drops every reference, owned or not, to a record that no longer exists.
    pub(crate) fn forget(&mut self, gone: RecordId) {
        if let Some(comment) = self.as_comment_mut() {
            comment.replies.retain(|child| *child != gone);
            if comment.parent == Some(gone) {
                comment.parent = None;
            }
            if comment.post == Some(gone) {
                comment.post = None;
            }
            return;
        }
        match self {
            Self::Link(post) => {
                if post.subreddit == Some(gone) {
                    post.subreddit = None;
                }
            }
            Self::Multireddit(multi) => {
                multi.members.remove(&gone);
            }
            _ => {}
        }
    }
}

impl SyncObject for Record {
    fn header(&self) -> &RecordHeader {
        self.object().header()
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        self.object_mut().header_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_records_match_their_kind() {
        for kind in RecordKind::ALL {
            let record = Record::bare(kind, "abc");
            assert_eq!(record.kind(), kind);
            assert_eq!(record.identifier(), "abc");
            assert_eq!(record.header().expires_at, None);
        }
    }

    #[test]
    fn fullname_uses_kind_prefix() {
        assert_eq!(Record::bare(RecordKind::Comment, "c1").fullname(), "t1_c1");
        assert_eq!(
            Record::bare(RecordKind::Multireddit, "m").fullname(),
            "LabeledMulti_m"
        );
        assert_eq!(Record::bare(RecordKind::Unknown, "x").fullname(), "x");
    }

    #[test]
    fn placeholder_exposes_comment_part() {
        let mut record = Record::bare(RecordKind::More, "m1");
        record
            .as_comment_mut()
            .expect("comment part")
            .replies
            .push(RecordId(4));
        assert!(record.is_placeholder());
        assert_eq!(record.replies(), &[RecordId(4)]);
        assert_eq!(record.owned_children(), vec![RecordId(4)]);
    }

    #[test]
    fn forget_scrubs_back_references() {
        let mut record = Record::bare(RecordKind::Comment, "c");
        if let Record::Comment(comment) = &mut record {
            comment.parent = Some(RecordId(1));
            comment.post = Some(RecordId(2));
            comment.replies = vec![RecordId(1), RecordId(3)];
        }
        record.forget(RecordId(1));
        let comment = record.as_comment().expect("comment");
        assert_eq!(comment.parent, None);
        assert_eq!(comment.post, Some(RecordId(2)));
        assert_eq!(comment.replies, vec![RecordId(3)]);
    }
}
