//! A comment page as the presentation layer sees it: the flattened threads of one post plus
//! the mutations that change them.
//!
//! Session state and the sync context each sit behind their own lock. When both are needed
//! the session state is taken first. Neither lock is held while a remote call is awaited.

use crate::collapse::{CollapseSet, Visibility};
use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::parser::CommentsPage;
use crate::records::{Record, RecordId, RecordKind, SyncObject, VoteStatus};
use crate::remote::{CommentSort, RemoteClient};
use crate::store::RecordStore;
use crate::tree::{RowKind, Thread, ThreadRow, TreeBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_DEPTH: usize = 8;

/// What a session shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentQuery {
    /// Identifier of the post, without the `t3_` prefix.
    pub post: String,
    /// A comment identifier to root the view at instead of the post's top-level comments.
    pub focus: Option<String>,
    pub max_depth: usize,
    pub sort: CommentSort,
}

impl CommentQuery {
    pub fn new(post: impl Into<String>) -> Self {
        Self {
            post: post.into(),
            focus: None,
            max_depth: DEFAULT_MAX_DEPTH,
            sort: CommentSort::default(),
        }
    }

    pub fn focused(mut self, comment: impl Into<String>) -> Self {
        self.focus = Some(comment.into());
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_sort(mut self, sort: CommentSort) -> Self {
        self.sort = sort;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowPosition {
    pub thread: usize,
    pub row: usize,
}

/// Where a new reply ended up on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyPlacement {
    /// Directly below its parent's row.
    Row(RowPosition),
    /// The parent is in no thread, so the reply became a thread of its own.
    NewThread(RowPosition),
    /// The parent row is folded or truncated; nothing new is shown at this position.
    Folded(RowPosition),
}

impl ReplyPlacement {
    pub fn position(self) -> RowPosition {
        match self {
            Self::Row(position) | Self::NewThread(position) | Self::Folded(position) => position,
        }
    }
}

#[derive(Default)]
struct SessionState {
    roots: Vec<RecordId>,
    collapse: CollapseSet,
    threads: Vec<Thread>,
    loading_more: HashSet<RecordId>,
    fetch: Option<(u64, CancellationToken)>,
    fetch_generation: u64,
}

pub struct CommentSession {
    context: SyncContext,
    remote: Arc<dyn RemoteClient>,
    query: CommentQuery,
    state: Mutex<SessionState>,
}

/// Clears a placeholder's in-flight flag however the load ends, including when the load
/// future is dropped.
struct LoadingGuard<'a> {
    state: &'a Mutex<SessionState>,
    placeholder: RecordId,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.loading_more.remove(&self.placeholder);
        }
    }
}

/// Settles a vote's optimistic tally. If the vote future is dropped before the remote
/// answers, the tally is rolled back so the field never stays pending.
struct PendingVote<'a> {
    context: &'a SyncContext,
    id: RecordId,
    settled: bool,
}

impl PendingVote<'_> {
    fn settle(&mut self, confirmed: bool) -> SyncResult<()> {
        self.settled = true;
        self.context.perform(|store| {
            if let Some(content) = store.get_mut(self.id).and_then(Record::content_mut) {
                if confirmed {
                    content.tally.commit();
                } else {
                    content.tally.rollback();
                }
            }
            Ok(())
        })
    }
}

impl Drop for PendingVote<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(err) = self.settle(false) {
            tracing::warn!(record = %self.id, error = %err, "could not roll back abandoned vote");
        } else {
            tracing::debug!(record = %self.id, "abandoned vote rolled back");
        }
    }
}

/// Votes and replies are refused on locked or archived content, and on anything under a
/// locked or archived post.
fn ensure_interactive(store: &RecordStore, id: RecordId) -> SyncResult<()> {
    let record = store.record(id)?;
    let post = store
        .post_of(id)
        .and_then(|post| store.get(post))
        .and_then(Record::content);
    for content in record.content().into_iter().chain(post) {
        if content.is_locked {
            return Err(SyncError::Locked);
        }
        if content.is_archived {
            return Err(SyncError::Archived);
        }
    }
    Ok(())
}

fn by_order(store: &RecordStore, ids: &mut [RecordId]) {
    ids.sort_by_key(|id| store.get(*id).map(|record| record.header().order).unwrap_or(0));
}

impl CommentSession {
    pub fn new(context: SyncContext, remote: Arc<dyn RemoteClient>, query: CommentQuery) -> Self {
        Self {
            context,
            remote,
            query,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn query(&self) -> &CommentQuery {
        &self.query
    }

    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    fn lock_state(&self) -> SyncResult<MutexGuard<'_, SessionState>> {
        self.state.lock().map_err(|_| SyncError::ContextPoisoned)
    }

    fn rebuild(&self, state: &mut SessionState) -> SyncResult<()> {
        let max_depth = self.query.max_depth;
        let threads = self.context.perform(|store| {
            Ok(TreeBuilder::new(store, &state.collapse, max_depth).build(&state.roots))
        })?;
        state.threads = threads;
        Ok(())
    }

    /// The focus comment when there is one, else the post's top-level comments.
    fn roots_in_store(&self, store: &RecordStore, page: Option<&CommentsPage>) -> Vec<RecordId> {
        if let Some(focus) = self.query.focus.as_deref() {
            return store
                .find(RecordKind::Comment, focus)
                .into_iter()
                .collect();
        }
        let mut roots = match page {
            Some(page) => page.comments.clone(),
            None => match store.find(RecordKind::Link, &self.query.post) {
                Some(post) => store.select(|record| {
                    record.kind().is_interactive()
                        && record.parent().is_none()
                        && record.as_comment().and_then(|comment| comment.post) == Some(post)
                }),
                None => Vec::new(),
            },
        };
        roots.retain(|id| {
            store
                .get(*id)
                .map(|record| record.kind().is_interactive())
                .unwrap_or(false)
        });
        by_order(store, &mut roots);
        roots
    }

    /// Rebuilds from what the store already holds, without a network round trip.
    pub fn refresh_from_store(&self) -> SyncResult<()> {
        let mut state = self.lock_state()?;
        state.roots = self
            .context
            .perform(|store| Ok(self.roots_in_store(store, None)))?;
        self.rebuild(&mut state)
    }

    /// Fetches the post's comments and rebuilds every thread. Starting a fetch cancels the
    /// one still in flight on this session.
    pub async fn fetch(&self) -> SyncResult<CommentsPage> {
        let token = CancellationToken::new();
        let generation = {
            let mut state = self.lock_state()?;
            state.fetch_generation += 1;
            let generation = state.fetch_generation;
            if let Some((_, previous)) = state.fetch.replace((generation, token.clone())) {
                previous.cancel();
            }
            generation
        };

        let post = format!("t3_{}", self.query.post);
        let request = self
            .remote
            .fetch_comments(&post, self.query.focus.as_deref(), self.query.sort);
        let response = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!(post = %post, "comment fetch superseded");
                return Err(SyncError::Cancelled);
            }
            response = request => response,
        };

        let mut state = self.lock_state()?;
        if token.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        if state.fetch.as_ref().map(|(current, _)| *current) == Some(generation) {
            state.fetch = None;
        }
        let response = response.map_err(|err| {
            tracing::warn!(post = %post, error = %err, "comment fetch failed");
            SyncError::Remote(err)
        })?;

        let page = self
            .context
            .parse(|parser| parser.parse_comments_response(&response))?;
        state.roots = self
            .context
            .perform(|store| Ok(self.roots_in_store(store, Some(&page))))?;
        self.rebuild(&mut state)?;
        Ok(page)
    }

    pub fn threads(&self) -> SyncResult<Vec<Thread>> {
        Ok(self.lock_state()?.threads.clone())
    }

    pub fn roots(&self) -> SyncResult<Vec<RecordId>> {
        Ok(self.lock_state()?.roots.clone())
    }

    /// Flips the comment's folded state and rebuilds. Returns whether it is now folded.
    pub fn toggle_collapse(&self, id: RecordId) -> SyncResult<bool> {
        let mut state = self.lock_state()?;
        let identifier = self
            .context
            .perform(|store| Ok(store.record(id)?.identifier().to_string()))?;
        let collapsed = state.collapse.toggle(&identifier);
        self.rebuild(&mut state)?;
        Ok(collapsed)
    }

    /// Applies the vote locally, then confirms it remotely. A failed remote call, or dropping
    /// this future before the call returns, restores the previous score and status.
    pub async fn vote(&self, id: RecordId, status: VoteStatus) -> SyncResult<()> {
        let fullname = self.context.perform(|store| {
            ensure_interactive(store, id)?;
            let record = store.record_mut(id)?;
            let fullname = record.fullname();
            let content = record.content_mut().ok_or(SyncError::WrongKind {
                expected: RecordKind::Comment,
            })?;
            let (next, _) = content.tally.value().with_vote(status);
            content.tally.begin(next)?;
            Ok(fullname)
        })?;

        let mut pending = PendingVote {
            context: &self.context,
            id,
            settled: false,
        };
        let outcome = self.remote.submit_vote(&fullname, status).await;
        pending.settle(outcome.is_ok())?;
        outcome.map_err(|err| {
            tracing::warn!(fullname = %fullname, error = %err, "vote rolled back");
            SyncError::Remote(err)
        })
    }

    /// Links `child` under `parent` and shows it right below the parent's row.
    pub fn insert_reply(&self, parent: RecordId, child: RecordId) -> SyncResult<ReplyPlacement> {
        let mut state = self.lock_state()?;
        self.context.perform(|store| {
            let post = match store.record(parent)?.kind() {
                RecordKind::Link => Some(parent),
                _ => store.post_of(parent),
            };
            let parent_is_comment = store.record(parent)?.as_comment().is_some();
            let reply = store
                .record_mut(child)?
                .as_comment_mut()
                .ok_or(SyncError::WrongKind {
                    expected: RecordKind::Comment,
                })?;
            if parent_is_comment {
                reply.parent = Some(parent);
            }
            if reply.post.is_none() {
                reply.post = post;
            }
            if let Some(comment) = store.get_mut(parent).and_then(Record::as_comment_mut) {
                if !comment.replies.contains(&child) {
                    comment.replies.push(child);
                }
            }
            Ok(())
        })?;

        let found = state
            .threads
            .iter()
            .enumerate()
            .find_map(|(index, thread)| thread.position_of(parent).map(|row| (index, row)));
        let Some((thread, row)) = found else {
            let identifier = self
                .context
                .perform(|store| Ok(store.record(child)?.identifier().to_string()))?;
            state.roots.push(child);
            state.threads.push(Thread {
                root: child,
                rows: vec![ThreadRow {
                    id: child,
                    identifier,
                    level: 0,
                    kind: RowKind::Comment,
                }],
            });
            return Ok(ReplyPlacement::NewThread(RowPosition {
                thread: state.threads.len() - 1,
                row: 0,
            }));
        };

        let parent_row = state.threads[thread].rows[row].clone();
        if parent_row.kind != RowKind::Comment {
            return Ok(ReplyPlacement::Folded(RowPosition { thread, row }));
        }
        let identifier = self
            .context
            .perform(|store| Ok(store.record(child)?.identifier().to_string()))?;
        let level = parent_row.level + 1;
        let kind = if level + 1 >= self.query.max_depth.max(crate::tree::MIN_DEPTH) {
            RowKind::Continuation
        } else {
            RowKind::Comment
        };
        state.threads[thread].rows.insert(
            row + 1,
            ThreadRow {
                id: child,
                identifier,
                level,
                kind,
            },
        );
        Ok(ReplyPlacement::Row(RowPosition {
            thread,
            row: row + 1,
        }))
    }

    /// Posts a reply remotely and inserts the returned comment.
    pub async fn submit_reply(
        &self,
        parent: RecordId,
        text: &str,
    ) -> SyncResult<(RecordId, ReplyPlacement)> {
        let fullname = self.context.perform(|store| {
            ensure_interactive(store, parent)?;
            Ok(store.record(parent)?.fullname())
        })?;
        let response = self
            .remote
            .submit_reply(&fullname, text)
            .await
            .map_err(|err| {
                tracing::warn!(parent = %fullname, error = %err, "reply failed");
                SyncError::Remote(err)
            })?;
        let ids = self
            .context
            .parse(|parser| parser.parse_things_response(&response))?;
        let child = self
            .context
            .perform(|store| {
                Ok(ids.into_iter().find(|id| {
                    store
                        .get(*id)
                        .map(|record| record.kind() == RecordKind::Comment)
                        .unwrap_or(false)
                }))
            })?
            .ok_or(SyncError::MalformedPayload)?;
        let placement = self.insert_reply(parent, child)?;
        Ok((child, placement))
    }

    /// Replaces a "more comments" placeholder with the comments it stands for.
    ///
    /// Only one load per placeholder runs at a time. On failure the placeholder stays where
    /// it was so the user can retry.
    pub async fn load_more(&self, placeholder: RecordId) -> SyncResult<Vec<RecordId>> {
        {
            let mut state = self.lock_state()?;
            if !state.loading_more.insert(placeholder) {
                return Err(SyncError::LoadInProgress);
            }
        }
        let _guard = LoadingGuard {
            state: &self.state,
            placeholder,
        };

        let (link, tokens) = self.context.perform(|store| {
            let more = store.record(placeholder)?.as_more().ok_or(SyncError::WrongKind {
                expected: RecordKind::More,
            })?;
            let link = store
                .post_of(placeholder)
                .and_then(|post| store.fullname(post))
                .unwrap_or_else(|| format!("t3_{}", self.query.post));
            Ok((link, more.child_tokens.clone()))
        })?;

        let response = self
            .remote
            .fetch_more_children(&link, &tokens)
            .await
            .map_err(|err| {
                tracing::warn!(link = %link, error = %err, "loading more comments failed");
                SyncError::Remote(err)
            })?;

        let mut state = self.lock_state()?;
        let fetched = self
            .context
            .parse(|parser| parser.parse_things_response(&response))?;
        let roots = &mut state.roots;
        let top_level = self.context.perform(|store| {
            let Some(record) = store.get(placeholder) else {
                return Ok(Vec::new());
            };
            let parent = record.parent();
            let post = store.post_of(placeholder);
            let top_level: Vec<RecordId> = fetched
                .iter()
                .copied()
                .filter(|id| *id != placeholder)
                .filter(|id| {
                    store
                        .get(*id)
                        .map(|record| record.kind().is_interactive() && record.parent() == parent)
                        .unwrap_or(false)
                })
                .collect();

            match parent {
                Some(parent) => {
                    if let Some(comment) = store.get_mut(parent).and_then(Record::as_comment_mut) {
                        splice(&mut comment.replies, placeholder, &top_level);
                    }
                }
                None => {
                    splice(roots, placeholder, &top_level);
                    for id in &top_level {
                        if let Some(comment) = store.get_mut(*id).and_then(Record::as_comment_mut) {
                            if comment.post.is_none() {
                                comment.post = post;
                            }
                        }
                    }
                }
            }
            store.delete(&HashSet::from([placeholder]));
            Ok(top_level)
        })?;
        self.rebuild(&mut state)?;
        tracing::debug!(loaded = top_level.len(), "replaced more-comments placeholder");
        Ok(top_level)
    }

    pub fn is_loading_more(&self, id: RecordId) -> SyncResult<bool> {
        Ok(self.lock_state()?.loading_more.contains(&id))
    }

    pub fn position_of(&self, id: RecordId) -> SyncResult<Option<RowPosition>> {
        let state = self.lock_state()?;
        Ok(state
            .threads
            .iter()
            .enumerate()
            .find_map(|(index, thread)| {
                thread
                    .position_of(id)
                    .map(|row| RowPosition { thread: index, row })
            }))
    }

    pub fn row_at(&self, thread: usize, row: usize) -> SyncResult<Option<ThreadRow>> {
        let state = self.lock_state()?;
        Ok(state
            .threads
            .get(thread)
            .and_then(|thread| thread.rows.get(row))
            .cloned())
    }

    /// Level of the comment's row, if it is shown.
    pub fn indentation_level(&self, id: RecordId) -> SyncResult<Option<usize>> {
        let state = self.lock_state()?;
        Ok(state
            .threads
            .iter()
            .flat_map(|thread| thread.rows.iter())
            .find(|row| row.id == id)
            .map(|row| row.level))
    }

    pub fn visibility(&self, id: RecordId) -> SyncResult<Visibility> {
        let state = self.lock_state()?;
        self.context.perform(|store| {
            Ok(state
                .collapse
                .visibility(store, id, |ancestor| state.roots.contains(&ancestor)))
        })
    }

    /// Folded directly or through an ancestor.
    pub fn is_collapsed(&self, id: RecordId) -> SyncResult<bool> {
        let state = self.lock_state()?;
        self.context.perform(|store| {
            Ok(state
                .collapse
                .is_collapsed(store, id, |ancestor| state.roots.contains(&ancestor)))
        })
    }

    /// The reply a continuation row opens: the parent of the row's comment.
    pub fn continuation_root(&self, id: RecordId) -> SyncResult<Option<RecordId>> {
        let is_continuation = {
            let state = self.lock_state()?;
            state
                .threads
                .iter()
                .flat_map(|thread| thread.rows.iter())
                .any(|row| row.id == id && row.kind == RowKind::Continuation)
        };
        if !is_continuation {
            return Ok(None);
        }
        self.context.perform(|store| Ok(store.record(id)?.parent()))
    }

    /// A new session rooted at the reply a continuation row stands for, with its depth reset.
    pub fn open_continuation(&self, id: RecordId) -> SyncResult<Option<CommentSession>> {
        let Some(root) = self.continuation_root(id)? else {
            return Ok(None);
        };
        let identifier = self
            .context
            .perform(|store| Ok(store.record(root)?.identifier().to_string()))?;
        let session = CommentSession::new(
            self.context.clone(),
            Arc::clone(&self.remote),
            self.query.clone().focused(identifier),
        );
        session.refresh_from_store()?;
        Ok(Some(session))
    }
}

/// Puts `replacement` where `placeholder` was, dropping any earlier copies of the
/// replacement ids from `list`.
fn splice(list: &mut Vec<RecordId>, placeholder: RecordId, replacement: &[RecordId]) {
    list.retain(|id| !replacement.contains(id));
    match list.iter().position(|id| *id == placeholder) {
        Some(index) => {
            list.splice(index..=index, replacement.iter().copied());
        }
        None => list.extend_from_slice(replacement),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_replaces_in_place() {
        let ids: Vec<RecordId> = (0..5).map(RecordId).collect();
        let mut list = vec![ids[0], ids[1], ids[2], ids[3]];
        splice(&mut list, ids[1], &[ids[4], ids[3]]);
        assert_eq!(list, vec![ids[0], ids[4], ids[3], ids[2]]);
    }

    #[test]
    fn splice_appends_when_placeholder_is_gone() {
        let ids: Vec<RecordId> = (0..3).map(RecordId).collect();
        let mut list = vec![ids[0]];
        splice(&mut list, ids[1], &[ids[2]]);
        assert_eq!(list, vec![ids[0], ids[2]]);
    }

    #[test]
    fn placement_exposes_position() {
        let position = RowPosition { thread: 1, row: 2 };
        assert_eq!(ReplyPlacement::Folded(position).position(), position);
    }
}
