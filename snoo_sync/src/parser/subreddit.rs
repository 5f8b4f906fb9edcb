use super::fields::{array, flag, int, merge, merge_flag, string, text, Data};
use super::{Parser, Worklist};
use crate::error::{SyncError, SyncResult};
use crate::records::{Record, RecordId, RecordKind, Subreddit};
use std::collections::BTreeSet;

fn apply_subreddit(subreddit: &mut Subreddit, data: &Data) {
    merge(&mut subreddit.description, text(data, "description"));
    merge(&mut subreddit.public_description, text(data, "public_description"));
    merge(&mut subreddit.title, text(data, "title"));
    merge(&mut subreddit.display_name, string(data, "display_name"));
    merge(&mut subreddit.subscribers, int(data, "subscribers"));
    merge(&mut subreddit.visibility_raw, string(data, "subreddit_type"));
    merge(&mut subreddit.submission_type_raw, string(data, "submission_type"));
    merge(&mut subreddit.permalink, string(data, "url"));
    merge_flag(&mut subreddit.is_owner, flag(data, "user_is_owner"));
    merge_flag(&mut subreddit.is_moderator, flag(data, "user_is_moderator"));
    merge_flag(&mut subreddit.is_contributor, flag(data, "user_is_contributor"));
    merge_flag(&mut subreddit.is_subscriber, flag(data, "user_is_subscriber"));
    merge_flag(&mut subreddit.is_nsfw, flag(data, "over18"));
}

impl<'s> Parser<'s> {
    pub(super) fn populate_subreddit(&mut self, id: RecordId, data: &Data) -> SyncResult<()> {
        let Record::Subreddit(subreddit) = self.store.record_mut(id)? else {
            return Err(SyncError::WrongKind {
                expected: RecordKind::Subreddit,
            });
        };
        apply_subreddit(subreddit, data);
        subreddit.refresh_section_name();
        if subreddit.permalink.is_none() {
            subreddit.permalink = subreddit
                .display_name
                .as_ref()
                .map(|name| format!("/r/{name}/"));
        }
        Ok(())
    }

    /// Member subreddits are only parsed when the entries are full summaries carrying a
    /// `data` object; bare name references leave the member set alone.
    pub(super) fn populate_multireddit<'v>(
        &mut self,
        id: RecordId,
        data: &'v Data,
        work: &mut Worklist<'v>,
    ) -> SyncResult<()> {
        let summaries = array(data, "subreddits").filter(|entries| {
            entries
                .first()
                .map(|entry| entry.get("data").is_some())
                .unwrap_or(false)
        });
        let members = match summaries {
            Some(entries) => {
                let things: Vec<_> = entries
                    .iter()
                    .filter_map(|entry| entry.get("data").and_then(|data| data.as_object()))
                    .collect();
                let mut members = BTreeSet::new();
                for summary in things {
                    match crate::identity::payload_identifier(summary)
                        .and_then(|identifier| self.resolve(RecordKind::Subreddit, &identifier))
                    {
                        Ok(member) => {
                            members.insert(member);
                            work.push((member, summary));
                        }
                        Err(err) if err.is_record_local() => self.skip(&err),
                        Err(err) => return Err(err),
                    }
                }
                Some(members)
            }
            None => None,
        };

        let Record::Multireddit(multi) = self.store.record_mut(id)? else {
            return Err(SyncError::WrongKind {
                expected: RecordKind::Multireddit,
            });
        };
        apply_subreddit(&mut multi.subreddit, data);
        merge(&mut multi.copied_from, string(data, "copied_from"));
        merge_flag(&mut multi.can_edit, flag(data, "can_edit"));
        merge(&mut multi.subreddit.visibility_raw, string(data, "visibility"));
        merge(&mut multi.subreddit.permalink, string(data, "path"));
        merge(&mut multi.subreddit.description, text(data, "description_md"));
        // `display_name` on multireddits is stale; `name` is the one reddit keeps current.
        merge(&mut multi.subreddit.display_name, string(data, "name"));
        multi.subreddit.refresh_section_name();
        if let Some(members) = members {
            multi.members = members;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiration::ExpirationPolicy;
    use crate::records::{SubredditVisibility, SyncObject};
    use crate::store::RecordStore;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};

    fn parse(store: &mut RecordStore, thing: Value) -> RecordId {
        Parser::new(store, ExpirationPolicy::default(), Utc::now())
            .parse_thing(&thing)
            .expect("parse thing")
    }

    #[test]
    fn subreddit_fields_and_defaults() {
        let mut store = RecordStore::new();
        let now = Utc::now();
        let id = Parser::new(&mut store, ExpirationPolicy::default(), now)
            .parse_thing(&json!({"kind": "t5", "data": {
                "id": "2qh1i", "display_name": "askscience", "title": "Ask &amp; learn",
                "subreddit_type": "private", "subscribers": 10
            }}))
            .expect("parse");
        let record = store.get(id).expect("record");
        let subreddit = record.as_subreddit().expect("subreddit");
        assert_eq!(subreddit.section_name.as_deref(), Some("A"));
        assert_eq!(subreddit.permalink.as_deref(), Some("/r/askscience/"));
        assert_eq!(subreddit.title.as_deref(), Some("Ask & learn"));
        assert_eq!(subreddit.visibility(), SubredditVisibility::Private);
        assert_eq!(
            record.header().expires_at,
            Some(now + Duration::days(365))
        );
    }

    #[test]
    fn bookmarked_subreddit_keeps_empty_section_on_reparse() {
        let mut store = RecordStore::new();
        let id = parse(&mut store, json!({"kind": "t5", "data": {"id": "s", "display_name": "rust"}}));
        store
            .get_mut(id)
            .and_then(Record::as_subreddit_mut)
            .expect("subreddit")
            .change_bookmark(true);
        parse(&mut store, json!({"kind": "t5", "data": {"id": "s"}}));
        let subreddit = store.get(id).and_then(Record::as_subreddit).expect("subreddit");
        assert_eq!(subreddit.section_name.as_deref(), Some(""));
    }

    #[test]
    fn multireddit_parses_full_summaries_only() {
        let mut store = RecordStore::new();
        let id = parse(
            &mut store,
            json!({"kind": "LabeledMulti", "data": {
                "name": "coding", "display_name": "old name", "path": "/user/me/m/coding",
                "can_edit": true,
                "subreddits": [
                    {"name": "rust", "data": {"id": "r1", "display_name": "rust"}},
                    {"name": "golang", "data": {"id": "g1", "display_name": "golang"}}
                ]
            }}),
        );
        let Some(Record::Multireddit(multi)) = store.get(id) else {
            panic!("expected multireddit");
        };
        assert_eq!(multi.identifier(), "coding");
        assert_eq!(multi.subreddit.display_name.as_deref(), Some("coding"));
        assert_eq!(multi.subreddit.permalink.as_deref(), Some("/user/me/m/coding"));
        assert!(multi.can_edit);
        assert_eq!(multi.members.len(), 2);

        parse(
            &mut store,
            json!({"kind": "LabeledMulti", "data": {"name": "coding", "subreddits": [{"name": "python"}]}}),
        );
        let Some(Record::Multireddit(multi)) = store.get(id) else {
            panic!("expected multireddit");
        };
        assert_eq!(multi.members.len(), 2);
        let golang = store.find(RecordKind::Subreddit, "g1").expect("member");
        assert_eq!(
            store.get(golang).and_then(Record::as_subreddit).and_then(|s| s.section_name.clone()),
            Some("G".to_string())
        );
    }
}
