use super::{RecordHeader, RecordId};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubredditVisibility {
    Public,
    Restricted,
    Private,
    GoldOnly,
}

impl SubredditVisibility {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "public" => Some(Self::Public),
            "restricted" => Some(Self::Restricted),
            "private" => Some(Self::Private),
            "gold_only" => Some(Self::GoldOnly),
            _ => None,
        }
    }

    pub fn publicly_visible(self) -> bool {
        matches!(self, Self::Public | Self::Restricted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionType {
    Any,
    Link,
    SelfText,
    None,
}

impl SubmissionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "any" => Some(Self::Any),
            "link" => Some(Self::Link),
            "text" => Some(Self::SelfText),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn can_post_link(self) -> bool {
        matches!(self, Self::Any | Self::Link)
    }

    pub fn can_post_self_text(self) -> bool {
        matches!(self, Self::Any | Self::SelfText)
    }
}

#[derive(Debug, Clone)]
pub struct Subreddit {
    pub header: RecordHeader,
    pub display_name: Option<String>,
    /// Alphabetic grouping key; see [`section_name_for`].
    pub section_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub public_description: Option<String>,
    pub permalink: Option<String>,
    pub subscribers: Option<i64>,
    pub visibility_raw: Option<String>,
    pub submission_type_raw: Option<String>,
    pub last_visited_at: Option<DateTime<Utc>>,
    pub is_nsfw: bool,
    pub is_subscriber: bool,
    pub is_moderator: bool,
    pub is_owner: bool,
    pub is_contributor: bool,
}

impl Subreddit {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            header: RecordHeader::new(identifier),
            display_name: None,
            section_name: None,
            title: None,
            description: None,
            public_description: None,
            permalink: None,
            subscribers: None,
            visibility_raw: None,
            submission_type_raw: None,
            last_visited_at: None,
            is_nsfw: false,
            is_subscriber: false,
            is_moderator: false,
            is_owner: false,
            is_contributor: false,
        }
    }

    /// Unknown or missing visibility is treated as public.
    pub fn visibility(&self) -> SubredditVisibility {
        self.visibility_raw
            .as_deref()
            .and_then(SubredditVisibility::parse)
            .unwrap_or(SubredditVisibility::Public)
    }

    pub fn submission_type(&self) -> SubmissionType {
        self.submission_type_raw
            .as_deref()
            .and_then(SubmissionType::parse)
            .unwrap_or(SubmissionType::Any)
    }

    pub fn is_user_authorized(&self) -> bool {
        self.visibility() == SubredditVisibility::Public
            || self.is_contributor
            || self.is_owner
            || self.is_moderator
            || self.is_subscriber
    }

    pub fn refresh_section_name(&mut self) {
        self.section_name =
            section_name_for(self.display_name.as_deref(), self.header.is_bookmarked);
    }

    pub fn change_bookmark(&mut self, bookmarked: bool) {
        self.header.is_bookmarked = bookmarked;
        self.refresh_section_name();
    }
}

/// Empty when bookmarked (bookmarks sort into their own section), `#` for names starting
/// with a digit, otherwise the uppercased first character.
pub fn section_name_for(display_name: Option<&str>, bookmarked: bool) -> Option<String> {
    if bookmarked {
        return Some(String::new());
    }
    let first = display_name?.chars().next()?;
    if first.is_ascii_digit() {
        Some("#".to_string())
    } else {
        Some(first.to_uppercase().collect())
    }
}

#[derive(Debug, Clone)]
pub struct Multireddit {
    pub subreddit: Subreddit,
    pub copied_from: Option<String>,
    pub can_edit: bool,
    /// Owned, unordered.
    pub members: BTreeSet<RecordId>,
}

impl Multireddit {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            subreddit: Subreddit::new(identifier),
            copied_from: None,
            can_edit: false,
            members: BTreeSet::new(),
        }
    }

    /// Multireddits aggregate other subreddits, so nothing can be submitted to them directly
    /// unless the API says otherwise.
    pub fn submission_type(&self) -> SubmissionType {
        self.subreddit
            .submission_type_raw
            .as_deref()
            .and_then(SubmissionType::parse)
            .unwrap_or(SubmissionType::None)
    }
}
