use super::fields::{self, epoch, flag, int, merge, merge_flag, object, string, text, Data};
use super::{Parser, Worklist};
use crate::error::{SyncError, SyncResult};
use crate::records::{Content, Fullname, Record, RecordId, RecordKind, SyncObject, VoteStatus};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Fields shared by comments, posts and messages.
pub(super) fn apply_content(content: &mut Content, data: &Data) {
    merge(&mut content.permalink, string(data, "permalink"));
    merge(&mut content.body, text(data, "body"));
    merge(&mut content.downvotes, int(data, "downs"));
    merge(&mut content.upvotes, int(data, "ups"));
    merge(&mut content.gild_count, int(data, "gilded"));
    merge(&mut content.author, string(data, "author"));
    merge(&mut content.author_flair_text, text(data, "author_flair_text"));
    merge_flag(&mut content.is_saved, flag(data, "saved"));
    merge_flag(&mut content.score_hidden, flag(data, "score_hidden"));
    merge_flag(&mut content.is_stickied, flag(data, "stickied"));
    merge_flag(&mut content.is_archived, flag(data, "archived"));
    merge_flag(&mut content.is_locked, flag(data, "locked"));

    let score = int(data, "score");
    let status = flag(data, "likes").map(|likes| VoteStatus::from_likes(Some(likes)));
    if score.is_some() || status.is_some() {
        content.tally.merge_confirmed(|tally| {
            merge_value(&mut tally.score, score);
            merge_value(&mut tally.status, status);
        });
    }

    if content.created_at.is_none() {
        content.created_at = epoch(data, "created_utc");
    }
}

fn merge_value<T>(target: &mut T, incoming: Option<T>) {
    if let Some(value) = incoming {
        *target = value;
    }
}

static CONTEXT_PATH: OnceLock<Option<Regex>> = OnceLock::new();

/// Recovers the post identifier from a comment context path such as
/// `/r/{subreddit}/comments/{post}/{slug}/{comment}/`, or a short `/r/{subreddit}/{post}/`.
pub(super) fn post_identifier_from_path(path: &str) -> Option<String> {
    let pattern = fields::compiled(
        &CONTEXT_PATH,
        r"^[^/]*/[^/]*/[^/]*/(?P<segment>[^/]*)(?:/(?P<next>[^/]*))?",
    )?;
    let captures = pattern.captures(path)?;
    let candidate = match captures.name("segment")?.as_str() {
        "comments" => captures.name("next")?.as_str(),
        segment => segment,
    };
    (!candidate.is_empty()).then(|| candidate.to_string())
}

impl<'s> Parser<'s> {
    pub(super) fn populate_comment<'v>(
        &mut self,
        id: RecordId,
        data: &'v Data,
        work: &mut Worklist<'v>,
    ) -> SyncResult<()> {
        let linked_post = match string(data, "link_id") {
            Some(link) => self.resolve_post_reference(&link)?,
            None => None,
        };
        let post = self.recover_post(linked_post, data)?;

        let parent = match string(data, "parent_id") {
            Some(parent) => match parent.strip_prefix("t1_") {
                Some(identifier) => Some(self.resolve(RecordKind::Comment, identifier)?),
                None => None,
            },
            None => None,
        };

        let replies = match object(data, "replies")
            .and_then(|listing| object(listing, "data"))
            .and_then(|listing| fields::array(listing, "children"))
        {
            Some(children) => Some(self.queue_children(children, work, RecordKind::is_interactive)?),
            None => None,
        };

        let record = self.store.record_mut(id)?;
        if let Some(content) = record.content_mut() {
            apply_content(content, data);
        }
        if let Record::More(more) = record {
            more.comment.content.body = None;
            merge(&mut more.pending_count, int(data, "count"));
            if let Some(children) = fields::array(data, "children") {
                more.child_tokens = children
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
            }
        }

        let comment = record.as_comment_mut().ok_or(SyncError::WrongKind {
            expected: RecordKind::Comment,
        })?;
        merge(&mut comment.post, post);
        let previous_parent = comment.parent;
        merge(&mut comment.parent, parent);
        let dropped_replies = match replies {
            Some(replies) => {
                let previous = std::mem::replace(&mut comment.replies, replies.clone());
                Some((previous, replies))
            }
            None => None,
        };

        if let Some(parent) = parent {
            self.attach_to_parent(id, parent, previous_parent);
        }
        if let Some((previous, current)) = dropped_replies {
            for child in &current {
                if let Some(reply) = self.store.get_mut(*child).and_then(Record::as_comment_mut) {
                    reply.parent = Some(id);
                }
            }
            for child in previous.iter().filter(|child| !current.contains(child)) {
                if let Some(reply) = self.store.get_mut(*child).and_then(Record::as_comment_mut) {
                    if reply.parent == Some(id) {
                        reply.parent = None;
                    }
                }
            }
        }
        Ok(())
    }

    /// Keeps `parent.replies` consistent with a child's back-reference.
    fn attach_to_parent(&mut self, child: RecordId, parent: RecordId, previous: Option<RecordId>) {
        if let Some(previous) = previous.filter(|previous| *previous != parent) {
            if let Some(old) = self.store.get_mut(previous).and_then(Record::as_comment_mut) {
                old.replies.retain(|reply| *reply != child);
            }
        }
        if let Some(comment) = self.store.get_mut(parent).and_then(Record::as_comment_mut) {
            if !comment.replies.contains(&child) {
                comment.replies.push(child);
            }
        }
    }

    fn resolve_post_reference(&mut self, link: &str) -> SyncResult<Option<RecordId>> {
        let fullname = Fullname::parse(link)?;
        if fullname.record_kind() != RecordKind::Link {
            return Ok(None);
        }
        self.resolve(RecordKind::Link, &fullname.identifier).map(Some)
    }

    /// Degraded payloads (inbox replies, user pages) describe their post only through
    /// `context` and a few `link_*` fields. Build enough of the post to navigate to it.
    fn recover_post(&mut self, post: Option<RecordId>, data: &Data) -> SyncResult<Option<RecordId>> {
        let context = string(data, "context");
        let link_id = string(data, "link_id");
        if context.is_none() && link_id.is_none() {
            return Ok(post);
        }
        let complete = post
            .and_then(|id| self.store.get(id))
            .and_then(Record::as_post)
            .map(|post| post.subreddit.is_some() && post.content.permalink.is_some())
            .unwrap_or(false);
        if complete {
            return Ok(post);
        }

        let path = context.as_deref().map(fields::link_path).map(str::to_string);
        let mut post_identifier = path.as_deref().and_then(post_identifier_from_path);
        if let Some(fullname) = link_id.as_deref().and_then(|link| Fullname::parse(link).ok()) {
            post_identifier = Some(fullname.identifier);
        }
        let Some(post_identifier) = post_identifier else {
            return Ok(post);
        };

        let post_id = self.resolve(RecordKind::Link, &post_identifier)?;
        let subreddit = match (string(data, "subreddit_id"), string(data, "subreddit")) {
            (Some(subreddit_id), Some(display_name)) => {
                Some(self.synthesize_subreddit(&subreddit_id, &display_name)?)
            }
            _ => None,
        };

        let record = self.store.record_mut(post_id)?;
        let kind = record.kind();
        self.policy.stamp(record.header_mut(), kind, self.now);
        if let Record::Link(post) = record {
            merge(&mut post.title, text(data, "link_title"));
            merge(&mut post.content.author, string(data, "link_author"));
            merge(&mut post.subreddit, subreddit);
            merge(&mut post.content.permalink, path);
        }
        Ok(Some(post_id))
    }

    fn synthesize_subreddit(&mut self, subreddit_id: &str, display_name: &str) -> SyncResult<RecordId> {
        let mut summary = Map::new();
        summary.insert("name".into(), Value::String(subreddit_id.to_string()));
        summary.insert("display_name".into(), Value::String(display_name.to_string()));
        let identifier = crate::identity::payload_identifier(&summary)?;
        let id = self.resolve(RecordKind::Subreddit, &identifier)?;
        let mut work = Vec::new();
        self.populate(id, &summary, &mut work)?;
        Ok(id)
    }

    pub(super) fn populate_message(&mut self, id: RecordId, data: &Data) -> SyncResult<()> {
        let record = self.store.record_mut(id)?;
        let Record::Message(message) = record else {
            return Err(SyncError::WrongKind {
                expected: RecordKind::Message,
            });
        };
        apply_content(&mut message.content, data);
        if let Some(body) = string(data, "body") {
            message.content.body = Some(fields::unescape_html(body.trim()));
        }
        merge(&mut message.post_title, string(data, "link_title"));
        merge(&mut message.subject, string(data, "subject"));
        merge(&mut message.destination, string(data, "dest"));
        merge_flag(&mut message.unread, flag(data, "new"));
        Ok(())
    }

    pub(super) fn populate_account(&mut self, id: RecordId, data: &Data) -> SyncResult<()> {
        let record = self.store.record_mut(id)?;
        let Record::Account(account) = record else {
            return Err(SyncError::WrongKind {
                expected: RecordKind::Account,
            });
        };
        merge(&mut account.username, string(data, "name"));
        merge(&mut account.link_karma, int(data, "link_karma"));
        merge(&mut account.comment_karma, int(data, "comment_karma"));
        merge_flag(&mut account.is_gold, flag(data, "is_gold"));
        merge_flag(&mut account.is_mod, flag(data, "is_mod"));
        merge_flag(&mut account.has_mail, flag(data, "has_mail"));
        if account.created_at.is_none() {
            account.created_at = epoch(data, "created_utc");
        }
        Ok(())
    }
}
