use crate::expiration::ExpirationPolicy;
use crate::session::DEFAULT_MAX_DEPTH;
use crate::tree::MIN_DEPTH;
use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub paths: SyncPaths,
    pub expiration: ExpirationConfig,
    pub comments: CommentsConfig,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("SNOO_HOME") {
            Ok(home) if !home.trim().is_empty() => SyncPaths::from_base_dir(home)?,
            _ => SyncPaths::discover()?,
        };
        Ok(Self {
            paths,
            expiration: ExpirationConfig::from_env(),
            comments: CommentsConfig::from_env(),
        })
    }

    pub fn new(paths: SyncPaths) -> Self {
        Self {
            paths,
            expiration: ExpirationConfig::default(),
            comments: CommentsConfig::default(),
        }
    }
}

fn seconds_var(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|seconds| *seconds > 0)
        .map(Duration::seconds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationConfig {
    pub content_ttl: Duration,
    pub subreddit_ttl: Duration,
    pub post_metadata_ttl: Duration,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        let policy = ExpirationPolicy::default();
        Self {
            content_ttl: policy.content_ttl,
            subreddit_ttl: policy.subreddit_ttl,
            post_metadata_ttl: policy.post_metadata_ttl,
        }
    }
}

impl ExpirationConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            content_ttl: seconds_var("SNOO_CONTENT_TTL_SECS").unwrap_or(defaults.content_ttl),
            subreddit_ttl: seconds_var("SNOO_SUBREDDIT_TTL_SECS")
                .unwrap_or(defaults.subreddit_ttl),
            post_metadata_ttl: seconds_var("SNOO_POST_METADATA_TTL_SECS")
                .unwrap_or(defaults.post_metadata_ttl),
        }
    }

    pub fn policy(&self) -> ExpirationPolicy {
        ExpirationPolicy {
            content_ttl: self.content_ttl,
            subreddit_ttl: self.subreddit_ttl,
            post_metadata_ttl: self.post_metadata_ttl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentsConfig {
    pub max_depth: usize,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CommentsConfig {
    pub fn from_env() -> Self {
        let max_depth = env::var("SNOO_MAX_COMMENT_DEPTH")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_DEPTH);
        Self::with_max_depth(max_depth)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(MIN_DEPTH),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl SyncPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("snoo.db");
        let logs_dir = base.join("logs");
        Ok(Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        })
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.logs_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
