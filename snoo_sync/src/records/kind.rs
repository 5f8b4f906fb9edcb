use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fullname prefix table used by the reddit API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThingType {
    Comment,
    Account,
    Link,
    Message,
    Subreddit,
    Award,
    PromoCampaign,
    More,
    LabeledMulti,
    /// A prefix this client does not know about yet.
    Other(String),
}

impl ThingType {
    pub fn from_prefix(prefix: &str) -> Self {
        match prefix {
            "t1" => Self::Comment,
            "t2" => Self::Account,
            "t3" => Self::Link,
            "t4" => Self::Message,
            "t5" => Self::Subreddit,
            "t6" => Self::Award,
            "t8" => Self::PromoCampaign,
            "more" => Self::More,
            "LabeledMulti" => Self::LabeledMulti,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn prefix(&self) -> &str {
        match self {
            Self::Comment => "t1",
            Self::Account => "t2",
            Self::Link => "t3",
            Self::Message => "t4",
            Self::Subreddit => "t5",
            Self::Award => "t6",
            Self::PromoCampaign => "t8",
            Self::More => "more",
            Self::LabeledMulti => "LabeledMulti",
            Self::Other(prefix) => prefix,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Which concrete record a thing of this type is parsed into. Types without a
    /// dedicated record degrade to [`RecordKind::Unknown`].
    pub fn record_kind(&self) -> RecordKind {
        match self {
            Self::Comment => RecordKind::Comment,
            Self::Account => RecordKind::Account,
            Self::Link => RecordKind::Link,
            Self::Message => RecordKind::Message,
            Self::Subreddit => RecordKind::Subreddit,
            Self::More => RecordKind::More,
            Self::LabeledMulti => RecordKind::Multireddit,
            Self::Award | Self::PromoCampaign | Self::Other(_) => RecordKind::Unknown,
        }
    }
}

/// Storage kind of a record. Identity is unique per `(RecordKind, identifier)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Comment,
    Account,
    Link,
    Message,
    Subreddit,
    More,
    Multireddit,
    Unknown,
}

impl RecordKind {
    pub const ALL: [RecordKind; 8] = [
        Self::Comment,
        Self::Account,
        Self::Link,
        Self::Message,
        Self::Subreddit,
        Self::More,
        Self::Multireddit,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Account => "account",
            Self::Link => "link",
            Self::Message => "message",
            Self::Subreddit => "subreddit",
            Self::More => "more",
            Self::Multireddit => "multireddit",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// The fullname prefix for this kind, if reddit assigns one.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            Self::Comment => Some("t1"),
            Self::Account => Some("t2"),
            Self::Link => Some("t3"),
            Self::Message => Some("t4"),
            Self::Subreddit => Some("t5"),
            Self::More => Some("more"),
            Self::Multireddit => Some("LabeledMulti"),
            Self::Unknown => None,
        }
    }

    /// Comments and "more" placeholders can appear in a reply list.
    pub fn is_interactive(self) -> bool {
        matches!(self, Self::Comment | Self::More)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `"{prefix}_{identifier}"`, the canonical external key of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fullname {
    pub thing: ThingType,
    pub identifier: String,
}

impl Fullname {
    pub fn new(thing: ThingType, identifier: impl Into<String>) -> Self {
        Self {
            thing,
            identifier: identifier.into(),
        }
    }

    /// Splits on the last underscore. Both halves must be non-empty; an unrecognised prefix
    /// is kept as [`ThingType::Other`] rather than rejected.
    pub fn parse(raw: &str) -> SyncResult<Self> {
        let (prefix, identifier) = raw
            .rsplit_once('_')
            .ok_or_else(|| SyncError::MalformedFullname(raw.to_string()))?;
        if prefix.is_empty() || identifier.is_empty() {
            return Err(SyncError::MalformedFullname(raw.to_string()));
        }
        Ok(Self::new(ThingType::from_prefix(prefix), identifier))
    }

    pub fn record_kind(&self) -> RecordKind {
        self.thing.record_kind()
    }
}

impl fmt::Display for Fullname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.thing.prefix(), self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_table_dispatches_to_record_kinds() {
        assert_eq!(ThingType::from_prefix("t1").record_kind(), RecordKind::Comment);
        assert_eq!(ThingType::from_prefix("t3").record_kind(), RecordKind::Link);
        assert_eq!(ThingType::from_prefix("more").record_kind(), RecordKind::More);
        assert_eq!(
            ThingType::from_prefix("LabeledMulti").record_kind(),
            RecordKind::Multireddit
        );
        assert_eq!(ThingType::from_prefix("t6").record_kind(), RecordKind::Unknown);
        assert_eq!(ThingType::from_prefix("t9").record_kind(), RecordKind::Unknown);
    }

    #[test]
    fn fullname_parse_and_display() {
        let name = Fullname::parse("t3_abc123").expect("parse");
        assert_eq!(name.thing, ThingType::Link);
        assert_eq!(name.identifier, "abc123");
        assert_eq!(name.to_string(), "t3_abc123");
    }

    #[test]
    fn fullname_without_separator_is_malformed() {
        assert!(matches!(
            Fullname::parse("abc123"),
            Err(SyncError::MalformedFullname(_))
        ));
        assert!(matches!(Fullname::parse("t1_"), Err(SyncError::MalformedFullname(_))));
        assert!(matches!(Fullname::parse("_x"), Err(SyncError::MalformedFullname(_))));
    }

    #[test]
    fn record_kind_names_roundtrip() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::from_name(kind.as_str()), Some(kind));
        }
    }
}
