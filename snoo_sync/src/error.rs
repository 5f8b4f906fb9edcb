use crate::records::RecordKind;
use thiserror::Error;

/// Failure reported by a [`crate::remote::RemoteClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The device has no connectivity; shown with a dedicated message.
    #[error("no internet connection")]
    Offline,
    #[error("remote request failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("record identifier must not be empty")]
    InvalidIdentifier,
    #[error("payload carries neither an `id` nor a `name` key")]
    MalformedPayload,
    #[error("fullname `{0}` has an incorrect format")]
    MalformedFullname(String),
    #[error("a load for this placeholder is already in progress")]
    LoadInProgress,
    #[error("record not found")]
    RecordNotFound,
    #[error("expected a {expected} record")]
    WrongKind { expected: RecordKind },
    #[error("content is locked")]
    Locked,
    #[error("content is archived")]
    Archived,
    #[error("another change to this field is still pending")]
    MutationPending,
    #[error("request was cancelled")]
    Cancelled,
    #[error("sync context mutex poisoned")]
    ContextPoisoned,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SyncError {
    /// Text suitable for an alert in the presentation layer.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Remote(RemoteError::Offline) => {
                "You appear to be offline. Check your connection and try again."
            }
            Self::Locked => "This thread has been locked. You can no longer vote or comment.",
            Self::Archived => "This post has been archived. You can no longer vote or comment.",
            Self::LoadInProgress => "",
            _ => "Something went wrong. Please try again later.",
        }
    }

    /// Errors that only affect one record of a batch; the caller skips it and continues.
    pub fn is_record_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier | Self::MalformedPayload | Self::MalformedFullname(_)
        )
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_message_differs_from_generic_failure() {
        let offline = SyncError::Remote(RemoteError::Offline).user_message();
        let failed = SyncError::Remote(RemoteError::Failed("500".into())).user_message();
        assert_ne!(offline, failed);
        assert!(offline.contains("offline"));
    }

    #[test]
    fn parse_errors_are_record_local() {
        assert!(SyncError::MalformedPayload.is_record_local());
        assert!(SyncError::MalformedFullname("x".into()).is_record_local());
        assert!(!SyncError::LoadInProgress.is_record_local());
    }
}
