use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use snoo_sync::records::{RecordKind, VoteStatus};
use snoo_sync::remote::{CommentSort, RemoteClient};
use snoo_sync::session::{CommentQuery, CommentSession, ReplyPlacement, RowPosition};
use snoo_sync::tree::RowKind;
use snoo_sync::{RecordId, RemoteError, SyncContext, SyncError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Answers from canned responses. With `hold` set, the first call to a fetch method parks
/// until `release` is notified, announcing itself through `started`.
#[derive(Default)]
struct ScriptedRemote {
    votes: Mutex<VecDeque<Result<(), RemoteError>>>,
    replies: Mutex<VecDeque<Result<Value, RemoteError>>>,
    more: Mutex<VecDeque<Result<Value, RemoteError>>>,
    comments: Mutex<VecDeque<Result<Value, RemoteError>>>,
    hold: bool,
    /// Votes that never get an answer.
    stalled_votes: AtomicUsize,
    calls: AtomicUsize,
    started: Notify,
    release: Notify,
}

impl ScriptedRemote {
    fn holding() -> Self {
        Self {
            hold: true,
            ..Self::default()
        }
    }

    async fn park_first_call(&self) {
        if self.hold && self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
            self.release.notified().await;
        }
    }

    fn next<T>(queue: &Mutex<VecDeque<Result<T, RemoteError>>>) -> Result<T, RemoteError> {
        queue
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(Err(RemoteError::Offline))
    }
}

#[async_trait]
impl RemoteClient for ScriptedRemote {
    async fn submit_vote(&self, _fullname: &str, _status: VoteStatus) -> Result<(), RemoteError> {
        let stalled = self
            .stalled_votes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if stalled {
            std::future::pending::<()>().await;
        }
        Self::next(&self.votes)
    }

    async fn submit_reply(&self, _parent_fullname: &str, _text: &str) -> Result<Value, RemoteError> {
        Self::next(&self.replies)
    }

    async fn fetch_more_children(
        &self,
        _link_fullname: &str,
        _children: &[String],
    ) -> Result<Value, RemoteError> {
        self.park_first_call().await;
        Self::next(&self.more)
    }

    async fn fetch_comments(
        &self,
        _post_fullname: &str,
        _focus: Option<&str>,
        _sort: CommentSort,
    ) -> Result<Value, RemoteError> {
        self.park_first_call().await;
        Self::next(&self.comments)
    }
}

fn comment(id: &str, parent: &str, extra: Value) -> Value {
    let mut data = json!({"id": id, "link_id": "t3_p", "parent_id": parent});
    if let (Some(data), Value::Object(extra)) = (data.as_object_mut(), extra) {
        data.extend(extra);
    }
    json!({"kind": "t1", "data": data})
}

/// Post `p` with a thread `r -> [a, b]` and a top-level placeholder `m1` after it.
fn comments_page() -> Value {
    json!([
        {"kind": "Listing", "data": {"children": [
            {"kind": "t3", "data": {"id": "p", "title": "A post", "score": 10}}
        ]}},
        {"kind": "Listing", "data": {"children": [
            comment("r", "t3_p", json!({"score": 5, "body": "root", "replies": {
                "kind": "Listing", "data": {"children": [
                    comment("a", "t1_r", json!({})),
                    comment("b", "t1_r", json!({}))
                ]}
            }})),
            {"kind": "more", "data": {
                "id": "m1", "link_id": "t3_p", "parent_id": "t3_p",
                "count": 2, "children": ["x", "y"]
            }}
        ]}}
    ])
}

fn things(children: Vec<Value>) -> Value {
    json!({"json": {"data": {"things": children}}})
}

async fn loaded_session(remote: Arc<ScriptedRemote>) -> CommentSession {
    remote
        .comments
        .lock()
        .expect("script lock")
        .push_back(Ok(comments_page()));
    let session = CommentSession::new(SyncContext::with_defaults(), remote, CommentQuery::new("p"));
    session.fetch().await.expect("initial fetch");
    session
}

fn find(session: &CommentSession, kind: RecordKind, identifier: &str) -> RecordId {
    session
        .context()
        .perform(|store| Ok(store.find(kind, identifier)))
        .expect("perform")
        .expect("record stored")
}

fn row_identifiers(session: &CommentSession, thread: usize) -> Vec<String> {
    session.threads().expect("threads")[thread]
        .rows
        .iter()
        .map(|row| row.identifier.clone())
        .collect()
}

fn tally(session: &CommentSession, id: RecordId) -> (i64, VoteStatus) {
    session
        .context()
        .perform(|store| {
            let content = store.record(id)?.content().expect("content");
            Ok((content.score(), content.vote_status()))
        })
        .expect("perform")
}

#[tokio::test]
async fn fetch_builds_threads_with_placeholder_row() {
    let session = loaded_session(Arc::new(ScriptedRemote::default())).await;
    let threads = session.threads().expect("threads");
    assert_eq!(threads.len(), 2);
    assert_eq!(row_identifiers(&session, 0), vec!["r", "a", "b"]);
    assert_eq!(threads[1].rows[0].kind, RowKind::LoadMore);

    let a = find(&session, RecordKind::Comment, "a");
    assert_eq!(session.indentation_level(a).expect("level"), Some(1));
}

#[tokio::test]
async fn failed_vote_restores_score_and_status() {
    let remote = Arc::new(ScriptedRemote::default());
    let session = loaded_session(remote.clone()).await;
    let root = find(&session, RecordKind::Comment, "r");

    remote
        .votes
        .lock()
        .expect("script lock")
        .push_back(Err(RemoteError::Offline));
    let err = session.vote(root, VoteStatus::Up).await.expect_err("vote fails");
    assert!(matches!(err, SyncError::Remote(RemoteError::Offline)));
    assert_eq!(tally(&session, root), (5, VoteStatus::Neutral));

    remote.votes.lock().expect("script lock").push_back(Ok(()));
    session.vote(root, VoteStatus::Up).await.expect("vote confirmed");
    assert_eq!(tally(&session, root), (6, VoteStatus::Up));
}

#[tokio::test]
async fn abandoned_vote_is_rolled_back() {
    let remote = Arc::new(ScriptedRemote::default());
    let session = loaded_session(remote.clone()).await;
    let root = find(&session, RecordKind::Comment, "r");

    remote.stalled_votes.store(1, Ordering::SeqCst);
    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), session.vote(root, VoteStatus::Up)).await;
    assert!(abandoned.is_err());
    assert_eq!(tally(&session, root), (5, VoteStatus::Neutral));

    remote.votes.lock().expect("script lock").push_back(Ok(()));
    session.vote(root, VoteStatus::Up).await.expect("vote after abandoned one");
    assert_eq!(tally(&session, root), (6, VoteStatus::Up));
}

#[tokio::test]
async fn vote_on_locked_post_is_refused() {
    let remote = Arc::new(ScriptedRemote::default());
    let session = loaded_session(remote).await;
    session
        .context()
        .parse(|parser| {
            parser.parse_thing(&json!({"kind": "t3", "data": {"id": "p", "locked": true}}))
        })
        .expect("parse");
    let root = find(&session, RecordKind::Comment, "r");
    let err = session.vote(root, VoteStatus::Down).await.expect_err("locked");
    assert!(matches!(err, SyncError::Locked));
    assert_eq!(tally(&session, root), (5, VoteStatus::Neutral));
}

#[tokio::test]
async fn reply_lands_directly_below_parent() {
    let remote = Arc::new(ScriptedRemote::default());
    let session = loaded_session(remote.clone()).await;
    let root = find(&session, RecordKind::Comment, "r");

    remote
        .replies
        .lock()
        .expect("script lock")
        .push_back(Ok(things(vec![comment("c", "t1_r", json!({"body": "new"}))])));
    let (child, placement) = session.submit_reply(root, "new").await.expect("reply");

    assert_eq!(
        placement,
        ReplyPlacement::Row(RowPosition { thread: 0, row: 1 })
    );
    assert_eq!(row_identifiers(&session, 0), vec!["r", "c", "a", "b"]);
    assert_eq!(session.indentation_level(child).expect("level"), Some(1));
    let parent = session
        .context()
        .perform(|store| Ok(store.record(child)?.parent()))
        .expect("perform");
    assert_eq!(parent, Some(root));
}

#[tokio::test]
async fn reply_under_collapsed_parent_is_folded() {
    let remote = Arc::new(ScriptedRemote::default());
    let session = loaded_session(remote.clone()).await;
    let root = find(&session, RecordKind::Comment, "r");
    assert!(session.toggle_collapse(root).expect("toggle"));
    assert_eq!(row_identifiers(&session, 0), vec!["r"]);

    remote
        .replies
        .lock()
        .expect("script lock")
        .push_back(Ok(things(vec![comment("c", "t1_r", json!({}))])));
    let (child, placement) = session.submit_reply(root, "hidden").await.expect("reply");
    assert_eq!(
        placement,
        ReplyPlacement::Folded(RowPosition { thread: 0, row: 0 })
    );
    assert!(session.is_collapsed(child).expect("collapsed"));
}

#[tokio::test]
async fn failed_load_more_keeps_placeholder() {
    let remote = Arc::new(ScriptedRemote::default());
    let session = loaded_session(remote.clone()).await;
    let more = find(&session, RecordKind::More, "m1");

    remote
        .more
        .lock()
        .expect("script lock")
        .push_back(Err(RemoteError::Failed("503".into())));
    let err = session.load_more(more).await.expect_err("load fails");
    assert!(matches!(err, SyncError::Remote(RemoteError::Failed(_))));
    assert!(!session.is_loading_more(more).expect("flag"));
    assert_eq!(
        session.position_of(more).expect("position"),
        Some(RowPosition { thread: 1, row: 0 })
    );
}

#[tokio::test]
async fn load_more_replaces_placeholder_in_place() {
    let remote = Arc::new(ScriptedRemote::default());
    let session = loaded_session(remote.clone()).await;
    let more = find(&session, RecordKind::More, "m1");

    remote.more.lock().expect("script lock").push_back(Ok(things(vec![
        comment("x", "t3_p", json!({})),
        comment("y", "t3_p", json!({})),
    ])));
    let loaded = session.load_more(more).await.expect("load");
    assert_eq!(loaded.len(), 2);

    let threads = session.threads().expect("threads");
    let roots: Vec<&str> = threads
        .iter()
        .map(|thread| thread.rows[0].identifier.as_str())
        .collect();
    assert_eq!(roots, vec!["r", "x", "y"]);
    let still_stored = session
        .context()
        .perform(|store| Ok(store.find(RecordKind::More, "m1")))
        .expect("perform");
    assert_eq!(still_stored, None);
}

#[tokio::test]
async fn second_load_of_same_placeholder_is_rejected() {
    let remote = Arc::new(ScriptedRemote::holding());
    remote
        .comments
        .lock()
        .expect("script lock")
        .push_back(Ok(comments_page()));
    let session = CommentSession::new(
        SyncContext::with_defaults(),
        remote.clone(),
        CommentQuery::new("p"),
    );
    // Parked first call: the initial fetch is released right away.
    let (fetched, ()) = tokio::join!(session.fetch(), async {
        remote.started.notified().await;
        remote.release.notify_one();
    });
    fetched.expect("initial fetch");

    let more = find(&session, RecordKind::More, "m1");
    remote
        .more
        .lock()
        .expect("script lock")
        .push_back(Ok(things(vec![comment("x", "t3_p", json!({}))])));
    remote.calls.store(0, Ordering::SeqCst);

    let (first, second) = tokio::join!(session.load_more(more), async {
        remote.started.notified().await;
        assert!(session.is_loading_more(more).expect("flag"));
        let second = session.load_more(more).await;
        remote.release.notify_one();
        second
    });
    assert!(matches!(second, Err(SyncError::LoadInProgress)));
    assert_eq!(first.expect("first load").len(), 1);
    assert!(!session.is_loading_more(more).expect("flag"));
}

#[tokio::test]
async fn newer_fetch_cancels_older_one() {
    let remote = Arc::new(ScriptedRemote::holding());
    remote
        .comments
        .lock()
        .expect("script lock")
        .push_back(Ok(comments_page()));
    let session = CommentSession::new(
        SyncContext::with_defaults(),
        remote.clone(),
        CommentQuery::new("p"),
    );

    let (older, newer) = tokio::join!(session.fetch(), async {
        remote.started.notified().await;
        session.fetch().await
    });
    assert!(matches!(older, Err(SyncError::Cancelled)));
    let page = newer.expect("newer fetch");
    assert_eq!(page.comments.len(), 2);
    assert_eq!(session.threads().expect("threads").len(), 2);
}

#[tokio::test]
async fn continuation_opens_focused_session() {
    let remote = Arc::new(ScriptedRemote::default());
    remote.comments.lock().expect("script lock").push_back(Ok(comments_page()));
    let session = CommentSession::new(
        SyncContext::with_defaults(),
        remote,
        CommentQuery::new("p").with_max_depth(2),
    );
    session.fetch().await.expect("fetch");
    assert_eq!(row_identifiers(&session, 0), vec!["r", "a"]);

    let a = find(&session, RecordKind::Comment, "a");
    let root = find(&session, RecordKind::Comment, "r");
    let row = session.row_at(0, 1).expect("row").expect("present");
    assert_eq!(row.kind, RowKind::Continuation);
    assert_eq!(session.continuation_root(a).expect("root"), Some(root));

    let focused = session
        .open_continuation(a)
        .expect("open")
        .expect("continuation");
    assert_eq!(focused.query().focus.as_deref(), Some("r"));
    assert_eq!(focused.roots().expect("roots"), vec![root]);
}
