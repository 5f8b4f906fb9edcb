//! Reddit-shaped dictionary representation of a record.
//!
//! The output uses the same keys the parser reads, so feeding it back through the parser
//! reproduces the record's fields. Owned relations (replies, multireddit members) are not
//! nested; callers that need them walk the graph themselves.

use super::{Comment, Content, Record, RecordId, Subreddit, SyncObject};
use crate::parser::fields::escape_html;
use crate::store::RecordStore;
use serde_json::{Map, Value};

fn put(data: &mut Map<String, Value>, key: &str, value: Option<impl Into<Value>>) {
    if let Some(value) = value {
        data.insert(key.to_string(), value.into());
    }
}

/// Writes user-visible text escaped the way the API sends it, so the parser's entity
/// decoding gives back exactly the stored text.
fn put_text(data: &mut Map<String, Value>, key: &str, value: Option<&String>) {
    put(data, key, value.map(|value| escape_html(value)));
}

fn content_fields(data: &mut Map<String, Value>, content: &Content, body_key: &str) {
    put_text(data, body_key, content.body.as_ref());
    put(data, "author", content.author.clone());
    put(data, "permalink", content.permalink.clone());
    put_text(data, "author_flair_text", content.author_flair_text.as_ref());
    put(data, "ups", content.upvotes);
    put(data, "downs", content.downvotes);
    put(data, "gilded", content.gild_count);
    put(data, "score", Some(content.score()));
    put(data, "likes", content.vote_status().likes());
    put(data, "score_hidden", Some(content.score_hidden));
    put(data, "saved", Some(content.is_saved));
    put(data, "stickied", Some(content.is_stickied));
    put(data, "archived", Some(content.is_archived));
    put(data, "locked", Some(content.is_locked));
    put(
        data,
        "created_utc",
        content.created_at.map(|at| at.timestamp() as f64),
    );
}

fn comment_references(data: &mut Map<String, Value>, store: &RecordStore, comment: &Comment) {
    let post = comment.post.and_then(|id| store.get(id));
    put(data, "link_id", post.map(Record::fullname));
    put_text(
        data,
        "link_title",
        post.and_then(Record::as_post).and_then(|post| post.title.as_ref()),
    );
    let parent = comment.parent.and_then(|id| store.fullname(id));
    put(data, "parent_id", parent.or_else(|| post.map(Record::fullname)));
}

fn subreddit_fields(data: &mut Map<String, Value>, subreddit: &Subreddit) {
    put(data, "display_name", subreddit.display_name.clone());
    put_text(data, "title", subreddit.title.as_ref());
    put_text(data, "description", subreddit.description.as_ref());
    put_text(data, "public_description", subreddit.public_description.as_ref());
    put(data, "subscribers", subreddit.subscribers);
    put(data, "subreddit_type", subreddit.visibility_raw.clone());
    put(data, "submission_type", subreddit.submission_type_raw.clone());
    put(data, "url", subreddit.permalink.clone());
    put(data, "over18", Some(subreddit.is_nsfw));
    put(data, "user_is_owner", Some(subreddit.is_owner));
    put(data, "user_is_moderator", Some(subreddit.is_moderator));
    put(data, "user_is_contributor", Some(subreddit.is_contributor));
    put(data, "user_is_subscriber", Some(subreddit.is_subscriber));
}

pub fn to_payload(store: &RecordStore, id: RecordId) -> Option<Value> {
    let record = store.get(id)?;
    let mut data = Map::new();
    put(&mut data, "id", Some(record.identifier()));
    put(&mut data, "name", Some(record.fullname()));

    match record {
        Record::Comment(comment) => {
            content_fields(&mut data, &comment.content, "body");
            comment_references(&mut data, store, comment);
        }
        Record::More(more) => {
            comment_references(&mut data, store, &more.comment);
            put(&mut data, "count", more.pending_count);
            put(&mut data, "children", Some(more.child_tokens.clone()));
        }
        Record::Link(post) => {
            content_fields(&mut data, &post.content, "selftext");
            put_text(&mut data, "title", post.title.as_ref());
            put_text(&mut data, "url", post.url.as_ref());
            put_text(&mut data, "thumbnail", post.thumbnail_url.as_ref());
            put(&mut data, "link_flair_text", post.flair_text.clone());
            put(&mut data, "num_comments", post.comment_count);
            put(&mut data, "over_18", Some(post.is_nsfw));
            put(&mut data, "spoiler", Some(post.is_spoiler));
            put(&mut data, "is_self", Some(post.is_self));
            put(&mut data, "hidden", Some(post.is_hidden));
            let subreddit = post.subreddit.and_then(|id| store.get(id));
            put(&mut data, "subreddit_id", subreddit.map(Record::fullname));
            put(
                &mut data,
                "subreddit",
                subreddit
                    .and_then(Record::as_subreddit)
                    .and_then(|subreddit| subreddit.display_name.clone()),
            );
            if !post.content.media.is_empty() {
                let images: Vec<Value> = post
                    .content
                    .media
                    .iter()
                    .map(|media| {
                        serde_json::json!({
                            "source": {"url": escape_html(&media.url), "width": media.width, "height": media.height}
                        })
                    })
                    .collect();
                put(&mut data, "preview", Some(serde_json::json!({ "images": images })));
            }
        }
        Record::Message(message) => {
            content_fields(&mut data, &message.content, "body");
            put(&mut data, "subject", message.subject.clone());
            put(&mut data, "link_title", message.post_title.clone());
            put(&mut data, "dest", message.destination.clone());
            put(&mut data, "new", Some(message.unread));
        }
        Record::Account(account) => {
            // Reddit uses `name` for the username on accounts.
            put(&mut data, "name", account.username.clone());
            put(&mut data, "link_karma", account.link_karma);
            put(&mut data, "comment_karma", account.comment_karma);
            put(&mut data, "is_gold", Some(account.is_gold));
            put(&mut data, "is_mod", Some(account.is_mod));
            put(&mut data, "has_mail", Some(account.has_mail));
            put(
                &mut data,
                "created_utc",
                account.created_at.map(|at| at.timestamp() as f64),
            );
        }
        Record::Subreddit(subreddit) => subreddit_fields(&mut data, subreddit),
        Record::Multireddit(multi) => {
            subreddit_fields(&mut data, &multi.subreddit);
            put(&mut data, "name", multi.subreddit.display_name.clone());
            put(&mut data, "path", multi.subreddit.permalink.clone());
            put(&mut data, "visibility", multi.subreddit.visibility_raw.clone());
            put_text(&mut data, "description_md", multi.subreddit.description.as_ref());
            put(&mut data, "copied_from", multi.copied_from.clone());
            put(&mut data, "can_edit", Some(multi.can_edit));
        }
        Record::Unknown(_) => {}
    }
    Some(Value::Object(data))
}

/// Wraps [`to_payload`] in a `{"kind", "data"}` thing.
pub fn to_thing(store: &RecordStore, id: RecordId) -> Option<Value> {
    let record = store.get(id)?;
    let kind = match record {
        Record::Unknown(generic) => generic.thing_prefix.clone(),
        other => other.kind().prefix().map(str::to_string),
    }?;
    let data = to_payload(store, id)?;
    Some(serde_json::json!({ "kind": kind, "data": data }))
}
