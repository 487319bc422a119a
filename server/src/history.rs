use std::sync::Arc;

use anyhow::{Context as _, Result};
use genai::{Content, Role};
use tracing::{debug, warn};

use crate::kv::KvStore;

/// Hard cap on persisted history length; truncation drops oldest first.
pub const MAX_HISTORY_LEN: usize = 50;

/// Stand-in identity for callers that never supply a userId.
pub const DEFAULT_USER_ID: &str = "default";

/// User-scoped storage key. All writes go here.
pub fn primary_key(user_id: Option<&str>, session_id: &str) -> String {
    match user_id {
        Some(user_id) => format!("user:{}:chat:{}", user_id, session_id),
        None => format!("chat:{}", session_id),
    }
}

/// Pre-user-scoping key layout, kept readable so sessions created before
/// the migration keep their history. Never written to.
pub fn legacy_key(session_id: &str) -> String {
    format!("chat:{}", session_id)
}

/// Owns the mapping from (user, session) to an ordered message log:
/// key derivation, fallback reads, turn merging, and truncation.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KvStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Load the log for an identity pair. Reads the primary key first and
    /// falls back to the legacy key only when the primary read comes back
    /// empty. A missing key is an empty log, not an error; store or decode
    /// failures propagate.
    pub async fn load(&self, user_id: Option<&str>, session_id: &str) -> Result<Vec<Content>> {
        let log = self.read_key(&primary_key(user_id, session_id)).await?;
        if !log.is_empty() || user_id.is_none() {
            return Ok(log);
        }

        let legacy = self.read_key(&legacy_key(session_id)).await?;
        if !legacy.is_empty() {
            debug!(session_id, "serving history from legacy key");
        }
        Ok(legacy)
    }

    /// Load for paths that feed model invocation: a failed read degrades to
    /// a fresh empty log so the conversation can still proceed.
    pub async fn load_or_empty(&self, user_id: Option<&str>, session_id: &str) -> Vec<Content> {
        match self.load(user_id, session_id).await {
            Ok(log) => log,
            Err(e) => {
                warn!(session_id, error = %e, "history read failed, starting empty");
                Vec::new()
            }
        }
    }

    /// Merge one user/model turn into the log. The pair is skipped when the
    /// trailing two entries already equal exactly this pair (a duplicate
    /// submission retry); a partial match still appends. Truncation to the
    /// most recent `MAX_HISTORY_LEN` entries applies either way.
    pub fn append_turn(mut log: Vec<Content>, user_text: &str, reply: &str) -> Vec<Content> {
        if !Self::is_duplicate_turn(&log, user_text, reply) {
            log.push(Content::user(user_text));
            log.push(Content::model(reply));
        }
        if log.len() > MAX_HISTORY_LEN {
            log.drain(..log.len() - MAX_HISTORY_LEN);
        }
        log
    }

    fn is_duplicate_turn(log: &[Content], user_text: &str, reply: &str) -> bool {
        let n = log.len();
        if n < 2 {
            return false;
        }
        let prev_user = &log[n - 2];
        let prev_model = &log[n - 1];
        prev_user.role == Role::User
            && prev_user.text() == user_text
            && prev_model.role == Role::Model
            && prev_model.text() == reply
    }

    /// Persist under the primary key with the given expiry.
    pub async fn save(
        &self,
        user_id: Option<&str>,
        session_id: &str,
        log: &[Content],
        ttl_secs: u64,
    ) -> Result<()> {
        let value = serde_json::to_string(log).context("encode history")?;
        self.store
            .set(&primary_key(user_id, session_id), &value, ttl_secs)
            .await
    }

    /// Save for call sites that already hold a generated reply: a lost
    /// history write is preferable to losing the answer, so failures are
    /// logged and swallowed.
    pub async fn save_best_effort(
        &self,
        user_id: Option<&str>,
        session_id: &str,
        log: &[Content],
        ttl_secs: u64,
    ) {
        if let Err(e) = self.save(user_id, session_id, log, ttl_secs).await {
            warn!(session_id, error = %e, "history save failed, reply still returned");
        }
    }

    /// Delete the primary key. The legacy key is left untouched: clearing
    /// is scoped to the user-qualified identity. Idempotent.
    pub async fn clear(&self, user_id: Option<&str>, session_id: &str) -> Result<()> {
        self.store.delete(&primary_key(user_id, session_id)).await
    }

    async fn read_key(&self, key: &str) -> Result<Vec<Content>> {
        match self.store.get(key).await? {
            Some(raw) => serde_json::from_str(&raw).context("decode history"),
            None => Ok(Vec::new()),
        }
    }
}
