use crate::config::SyncConfig;
use crate::context::SyncContext;
use crate::database::{Database, SnapshotReport};
use crate::records::{to_thing, RecordId, RecordKind};
use crate::remote::OfflineClient;
use crate::session::{CommentQuery, CommentSession};
use crate::tree::RowKind;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// An opened database with its snapshot loaded into a fresh context.
pub struct Workspace {
    pub config: SyncConfig,
    pub database: Database,
    pub context: SyncContext,
}

impl Workspace {
    pub fn open(config: SyncConfig) -> Result<Self> {
        let database = Database::connect(&config.paths)?;
        database.ensure_migrations()?;
        let context = SyncContext::new(
            config.expiration.policy(),
            Arc::new(crate::utils::SystemClock),
        );
        let restored = database.restore(&context)?;
        tracing::debug!(records = restored.records, "workspace opened");
        Ok(Self {
            config,
            database,
            context,
        })
    }

    fn save(&self) -> Result<SnapshotReport> {
        self.database.persist(&self.context)
    }
}

/// Imports a saved API response: a thing, a listing, a comments page or a things response.
pub async fn import(workspace: &Workspace, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let payload: Value =
        serde_json::from_str(&raw).with_context(|| format!("{} is not JSON", file.display()))?;

    let parsed = workspace.context.parse(|parser| {
        let ids: Vec<RecordId> = match &payload {
            Value::Array(_) => {
                let page = parser.parse_comments_response(&payload)?;
                page.post.into_iter().chain(page.comments).collect()
            }
            Value::Object(object) if object.contains_key("json") => {
                parser.parse_things_response(&payload)?
            }
            Value::Object(object)
                if object.get("kind").and_then(Value::as_str) == Some("Listing") =>
            {
                parser.parse_listing(&payload)?
            }
            _ => vec![parser.parse_thing(&payload)?],
        };
        Ok((ids.len(), parser.skipped()))
    })?;
    let saved = workspace.save()?;
    println!(
        "Imported {} top-level record(s), skipped {}; {} record(s) stored.",
        parsed.0, parsed.1, saved.records
    );
    Ok(())
}

/// Prints the comment threads of a post as stored locally.
pub fn print_thread(
    workspace: &Workspace,
    post: &str,
    depth: Option<usize>,
    collapse: &[String],
) -> Result<()> {
    let max_depth = depth.unwrap_or(workspace.config.comments.max_depth);
    let session = CommentSession::new(
        workspace.context.clone(),
        Arc::new(OfflineClient),
        CommentQuery::new(post).with_max_depth(max_depth),
    );
    session.refresh_from_store()?;
    for identifier in collapse {
        let id = workspace
            .context
            .perform(|store| Ok(store.find(RecordKind::Comment, identifier)))?
            .ok_or_else(|| anyhow!("no comment with identifier {identifier}"))?;
        session.toggle_collapse(id)?;
    }

    let threads = session.threads()?;
    if threads.is_empty() {
        println!("No comments stored for post {post}.");
        return Ok(());
    }
    let lines = workspace.context.perform(|store| {
        let mut lines = Vec::new();
        for thread in &threads {
            for row in &thread.rows {
                let indent = "  ".repeat(row.level);
                let record = store.record(row.id)?;
                let line = match row.kind {
                    RowKind::Continuation => format!("{indent}-> continue this thread"),
                    RowKind::LoadMore => {
                        let count = record
                            .as_more()
                            .and_then(|more| more.pending_count)
                            .unwrap_or(0);
                        format!("{indent}[load {count} more]")
                    }
                    RowKind::Collapsed | RowKind::Comment => {
                        let content = record.content();
                        let author = content
                            .and_then(|content| content.author.as_deref())
                            .unwrap_or("[unknown]");
                        let score = content.map(|content| content.score()).unwrap_or(0);
                        if row.kind == RowKind::Collapsed {
                            format!("{indent}[+] {author} ({score})")
                        } else {
                            let body = content
                                .and_then(|content| content.body.as_deref())
                                .unwrap_or("");
                            format!("{indent}{author} ({score}): {body}")
                        }
                    }
                };
                lines.push(line);
            }
            lines.push(String::new());
        }
        Ok(lines)
    })?;
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Prints a record by fullname in its reddit shape.
pub fn show(workspace: &Workspace, fullname: &str) -> Result<()> {
    let thing = workspace.context.perform(|store| {
        Ok(store
            .find_fullname(fullname)?
            .and_then(|id| to_thing(store, id)))
    })?;
    match thing {
        Some(thing) => println!("{}", serde_json::to_string_pretty(&thing)?),
        None => println!("{fullname} is not stored."),
    }
    Ok(())
}

/// Evicts expired records and saves the result.
pub fn sweep(workspace: &Workspace) -> Result<()> {
    let report = workspace.context.sweep()?;
    workspace.save()?;
    println!(
        "Removed {} record(s) and {} post metadata entr{}.",
        report.records_removed,
        report.metadata_removed,
        if report.metadata_removed == 1 { "y" } else { "ies" }
    );
    for (kind, count) in &report.by_kind {
        println!("  {kind}: {count}");
    }
    Ok(())
}
