use super::comment::apply_content;
use super::fields::{self, array, flag, int, merge, merge_flag, object, string, text, Data};
use super::Parser;
use crate::error::{SyncError, SyncResult};
use crate::records::{Fullname, MediaRef, Record, RecordId, RecordKind, SyncObject};
use serde_json::Value;

/// Hosts whose preview images are the post's own media rather than a link thumbnail.
const REDDIT_UPLOAD_HOSTS: [&str; 5] = [
    "i.reddituploads.com",
    "i.reddit.com",
    "g.redditmedia.com",
    "i.redditmedia.com",
    "i.redd.it",
];

const SPOILER_WORDS: [&str; 1] = ["spoiler"];
const NON_SPOILER_WORDS: [&str; 6] = [
    "no spoiler",
    "not spoiler",
    "non spoiler",
    "no-spoiler",
    "not-spoiler",
    "non-spoiler",
];

/// Older posts carry their spoiler marker only in the title.
pub(super) fn title_marks_spoiler(title: &str, flagged: bool) -> bool {
    let title = title.to_lowercase();
    if NON_SPOILER_WORDS.iter().any(|word| title.contains(word)) {
        return false;
    }
    flagged || SPOILER_WORDS.iter().any(|word| title.contains(word))
}

fn image_source(image: &Data) -> Option<MediaRef> {
    let animated = object(image, "variants")
        .and_then(|variants| object(variants, "mp4"))
        .and_then(|mp4| array(mp4, "resolutions"))
        .and_then(|resolutions| {
            resolutions.iter().filter_map(Value::as_object).max_by_key(|resolution| {
                int(resolution, "width").unwrap_or(0) * int(resolution, "height").unwrap_or(0)
            })
        });
    let source = animated.or_else(|| object(image, "source"))?;
    Some(MediaRef {
        url: text(source, "url")?,
        width: int(source, "width"),
        height: int(source, "height"),
    })
}

/// The second preview resolution makes a sharper thumbnail than reddit's own.
fn preview_thumbnail(preview: &Data) -> Option<String> {
    let first = array(preview, "images")?.first()?.as_object()?;
    let resolutions = array(first, "resolutions")?;
    let resolution = if resolutions.len() >= 2 {
        resolutions.get(1)
    } else {
        resolutions.last()
    }?;
    text(resolution.as_object()?, "url")
}

impl<'s> Parser<'s> {
    pub(super) fn populate_post(&mut self, id: RecordId, data: &Data) -> SyncResult<()> {
        let record = self.store.record(id)?;
        let identifier = record.identifier().to_string();
        let needs_subreddit = record
            .as_post()
            .map(|post| post.subreddit.is_none())
            .unwrap_or(false);

        let mut subreddit = None;
        if needs_subreddit {
            let reference = string(data, "subreddit_id")
                .and_then(|name| Fullname::parse(&name).ok())
                .filter(|name| name.record_kind() == RecordKind::Subreddit);
            if let Some(reference) = reference {
                let subreddit_id = self.resolve(RecordKind::Subreddit, &reference.identifier)?;
                if self.cache.was_inserted(subreddit_id) {
                    if let Some(display_name) = string(data, "subreddit") {
                        if let Some(summary) = self
                            .store
                            .get_mut(subreddit_id)
                            .and_then(Record::as_subreddit_mut)
                        {
                            summary.display_name.get_or_insert(display_name);
                            summary.refresh_section_name();
                        }
                    }
                }
                subreddit = Some(subreddit_id);
            }
        }

        let Record::Link(post) = self.store.record_mut(id)? else {
            return Err(SyncError::WrongKind {
                expected: RecordKind::Link,
            });
        };
        apply_content(&mut post.content, data);
        merge(&mut post.subreddit, subreddit);
        merge(&mut post.url, text(data, "url"));
        merge(&mut post.title, text(data, "title"));
        merge(&mut post.content.body, text(data, "selftext"));
        merge(&mut post.comment_count, int(data, "num_comments"));
        merge(&mut post.flair_text, string(data, "link_flair_text"));
        merge_flag(&mut post.is_hidden, flag(data, "hidden"));
        merge_flag(&mut post.is_self, flag(data, "is_self"));
        merge_flag(&mut post.is_nsfw, flag(data, "over_18"));
        merge_flag(&mut post.is_spoiler, flag(data, "spoiler"));

        if let Some(thumbnail) = text(data, "thumbnail").filter(|url| url.contains("http")) {
            post.thumbnail_url = Some(thumbnail);
        }
        let preview = object(data, "preview");
        merge(&mut post.thumbnail_url, preview.and_then(preview_thumbnail));

        let uploaded = post
            .url
            .as_deref()
            .and_then(fields::url_host)
            .map(|host| REDDIT_UPLOAD_HOSTS.contains(&host.as_str()))
            .unwrap_or(false);
        if let (true, Some(images)) = (uploaded, preview.and_then(|p| array(p, "images"))) {
            if images.len() != post.content.media.len() {
                post.content.media = images
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(image_source)
                    .collect();
            }
        }

        if let Some(title) = post.title.as_deref() {
            post.is_spoiler = title_marks_spoiler(title, post.is_spoiler);
        }

        if flag(data, "visited") == Some(true) {
            let ttl = self.policy.post_metadata_ttl;
            self.store
                .post_metadata_mut(&identifier)
                .mark_visited(self.now, ttl);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiration::ExpirationPolicy;
    use crate::records::Post;
    use crate::store::RecordStore;
    use chrono::Utc;
    use serde_json::json;

    fn parse(store: &mut RecordStore, thing: Value) -> RecordId {
        Parser::new(store, ExpirationPolicy::default(), Utc::now())
            .parse_thing(&thing)
            .expect("parse thing")
    }

    fn post(store: &RecordStore, id: RecordId) -> &Post {
        store.get(id).and_then(Record::as_post).expect("post")
    }

    #[test]
    fn spoiler_words() {
        assert!(title_marks_spoiler("Huge SPOILER inside", false));
        assert!(!title_marks_spoiler("No spoiler here", true));
        assert!(title_marks_spoiler("plain", true));
        assert!(!title_marks_spoiler("plain", false));
    }

    #[test]
    fn subreddit_is_resolved_once_with_display_name() {
        let mut store = RecordStore::new();
        let id = parse(
            &mut store,
            json!({"kind": "t3", "data": {"id": "p", "subreddit_id": "t5_s", "subreddit": "rust"}}),
        );
        let subreddit = post(&store, id).subreddit.expect("subreddit");
        assert_eq!(
            store.get(subreddit).and_then(Record::as_subreddit).and_then(|s| s.display_name.clone()),
            Some("rust".to_string())
        );

        parse(
            &mut store,
            json!({"kind": "t3", "data": {"id": "p", "subreddit_id": "t5_other", "subreddit": "other"}}),
        );
        assert_eq!(post(&store, id).subreddit, Some(subreddit));
    }

    #[test]
    fn icon_thumbnails_are_ignored() {
        let mut store = RecordStore::new();
        let id = parse(
            &mut store,
            json!({"kind": "t3", "data": {"id": "p", "thumbnail": "self"}}),
        );
        assert_eq!(post(&store, id).thumbnail_url, None);
        parse(
            &mut store,
            json!({"kind": "t3", "data": {"id": "p", "thumbnail": "https://b.thumbs.redditmedia.com/x.jpg"}}),
        );
        assert_eq!(
            post(&store, id).thumbnail_url.as_deref(),
            Some("https://b.thumbs.redditmedia.com/x.jpg")
        );
    }

    #[test]
    fn uploads_get_preview_media() {
        let mut store = RecordStore::new();
        let id = parse(
            &mut store,
            json!({"kind": "t3", "data": {
                "id": "p", "url": "https://i.redd.it/abc.jpg",
                "preview": {"images": [{
                    "source": {"url": "https://i.redditmedia.com/abc.jpg?a=1&amp;b=2", "width": 640, "height": 480},
                    "resolutions": [
                        {"url": "https://small", "width": 108, "height": 81},
                        {"url": "https://medium", "width": 216, "height": 162}
                    ]
                }]}
            }}),
        );
        let post = post(&store, id);
        assert_eq!(post.thumbnail_url.as_deref(), Some("https://medium"));
        assert_eq!(
            post.content.media,
            vec![MediaRef {
                url: "https://i.redditmedia.com/abc.jpg?a=1&b=2".into(),
                width: Some(640),
                height: Some(480),
            }]
        );
    }

    #[test]
    fn external_links_have_no_media() {
        let mut store = RecordStore::new();
        let id = parse(
            &mut store,
            json!({"kind": "t3", "data": {
                "id": "p", "url": "https://example.com/article",
                "preview": {"images": [{"source": {"url": "https://x", "width": 1, "height": 1}}]}
            }}),
        );
        assert!(post(&store, id).content.media.is_empty());
    }

    #[test]
    fn visited_flag_creates_metadata() {
        let mut store = RecordStore::new();
        parse(&mut store, json!({"kind": "t3", "data": {"id": "p", "visited": true}}));
        assert!(store.is_visited("p"));
        assert!(store
            .post_metadata("p")
            .and_then(|metadata| metadata.expires_at)
            .is_some());
    }
}
