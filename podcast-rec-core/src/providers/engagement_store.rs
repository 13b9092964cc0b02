//! Engagement Store (§6): read/write access to per-user engagement
//! history.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Engagement, EngagementType};

/// Cap applied to stored engagements returned for ranking (§6, §4.6).
pub const ENGAGEMENT_HISTORY_CAP: usize = 500;

/// Read/write contract for per-user engagement history (§6).
#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// Resolve the engagements to use for ranking: if `user_id` is set,
    /// the store's persisted history (newest-first, capped at
    /// [`ENGAGEMENT_HISTORY_CAP`]); otherwise `request_engagements`
    /// verbatim.
    async fn get_engagements_for_ranking(
        &self,
        user_id: Option<&str>,
        request_engagements: &[Engagement],
    ) -> Result<Vec<Engagement>>;

    /// Record a new engagement. A no-op if `user_id` is absent (§6) —
    /// anonymous requests are never persisted.
    async fn record_engagement(
        &self,
        user_id: Option<&str>,
        episode_id: &str,
        engagement_type: EngagementType,
        timestamp: Option<DateTime<Utc>>,
        episode_title: Option<&str>,
        series_name: Option<&str>,
    ) -> Result<()>;

    /// Delete one engagement by its opaque id. Returns whether anything
    /// was deleted.
    async fn delete_engagement(&self, user_id: &str, engagement_id: &str) -> Result<bool>;

    /// Delete all of a user's engagement history.
    async fn delete_all_engagements(&self, user_id: &str) -> Result<()>;
}

/// An in-memory engagement store keyed by user id. Suitable for the
/// file-backed deployment mode; a real deployment would back this with a
/// document store (out of scope, §1).
#[derive(Debug, Default)]
pub struct InMemoryEngagementStore {
    by_user: Arc<RwLock<HashMap<String, Vec<Engagement>>>>,
}

impl InMemoryEngagementStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's history directly (test/fixture convenience).
    pub fn seed(&self, user_id: impl Into<String>, engagements: Vec<Engagement>) {
        self.by_user.write().insert(user_id.into(), engagements);
    }
}

#[async_trait]
impl EngagementStore for InMemoryEngagementStore {
    async fn get_engagements_for_ranking(
        &self,
        user_id: Option<&str>,
        request_engagements: &[Engagement],
    ) -> Result<Vec<Engagement>> {
        let Some(user_id) = user_id else {
            return Ok(request_engagements.to_vec());
        };
        let by_user = self.by_user.read();
        let mut stored = by_user.get(user_id).cloned().unwrap_or_default();
        stored.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        stored.truncate(ENGAGEMENT_HISTORY_CAP);
        Ok(stored)
    }

    async fn record_engagement(
        &self,
        user_id: Option<&str>,
        episode_id: &str,
        engagement_type: EngagementType,
        timestamp: Option<DateTime<Utc>>,
        _episode_title: Option<&str>,
        _series_name: Option<&str>,
    ) -> Result<()> {
        let Some(user_id) = user_id else {
            return Ok(());
        };
        let engagement = Engagement {
            id: Some(Uuid::new_v4().to_string()),
            episode_id: episode_id.to_string(),
            engagement_type,
            timestamp: timestamp.unwrap_or_else(Utc::now),
        };
        self.by_user
            .write()
            .entry(user_id.to_string())
            .or_default()
            .push(engagement);
        Ok(())
    }

    async fn delete_engagement(&self, user_id: &str, engagement_id: &str) -> Result<bool> {
        let mut by_user = self.by_user.write();
        let Some(history) = by_user.get_mut(user_id) else {
            return Ok(false);
        };
        let before = history.len();
        history.retain(|e| e.id.as_deref() != Some(engagement_id));
        Ok(history.len() != before)
    }

    async fn delete_all_engagements(&self, user_id: &str) -> Result<()> {
        self.by_user.write().remove(user_id);
        Ok(())
    }
}
