// src/services/engagement.rs

use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        counter::{CounterField, EntityRef},
        directory::Blog,
        identity::{BlogId, UserId},
    },
    services::fanout::NotificationFanOut,
    store::{BlogStore, CounterLedger},
};

/// Likes and reads on blogs.
///
/// A like is a set, not a counter: the like notification is the primary
/// record, and `total_likes` only moves when that record is actually created
/// or removed.
#[derive(Clone)]
pub struct EngagementService {
    blogs: Arc<dyn BlogStore>,
    ledger: Arc<dyn CounterLedger>,
    fanout: NotificationFanOut,
}

impl EngagementService {
    pub fn new(
        blogs: Arc<dyn BlogStore>,
        ledger: Arc<dyn CounterLedger>,
        fanout: NotificationFanOut,
    ) -> Self {
        Self {
            blogs,
            ledger,
            fanout,
        }
    }

    /// Flips the caller's like and returns whether the blog is now liked.
    pub async fn toggle_like(&self, blog_id: BlogId, actor_id: UserId) -> Result<bool, AppError> {
        let blog = self.find(blog_id).await?;

        if self.fanout.is_liked(blog.id, actor_id).await? {
            if self.fanout.retract_like(blog.id, actor_id).await? {
                self.adjust(EntityRef::Blog(blog.id), CounterField::TotalLikes, -1)
                    .await;
            }
            return Ok(false);
        }

        if self
            .fanout
            .notify_like(blog.id, blog.author_id, actor_id)
            .await?
            .is_some()
        {
            self.adjust(EntityRef::Blog(blog.id), CounterField::TotalLikes, 1)
                .await;
        }
        Ok(true)
    }

    pub async fn is_liked(&self, blog_id: BlogId, actor_id: UserId) -> Result<bool, AppError> {
        self.fanout.is_liked(blog_id, actor_id).await
    }

    /// Returns the blog and counts a read on it and on its author, unless it is
    /// opened for editing. Drafts are only reachable in edit mode.
    pub async fn record_read(&self, blog_id: BlogId, editing: bool) -> Result<Blog, AppError> {
        let blog = self.find(blog_id).await?;

        if blog.draft && !editing {
            return Err(AppError::NotFound("Blog not found".to_string()));
        }

        if !editing {
            tokio::join!(
                self.adjust(EntityRef::Blog(blog.id), CounterField::TotalReads, 1),
                self.adjust(EntityRef::User(blog.author_id), CounterField::TotalReads, 1),
            );
        }

        Ok(blog)
    }

    async fn find(&self, blog_id: BlogId) -> Result<Blog, AppError> {
        self.blogs
            .find_blog(blog_id)
            .await?
            .ok_or(AppError::NotFound("Blog not found".to_string()))
    }

    /// Counter updates here are fire-and-forget.
    async fn adjust(&self, entity: EntityRef, field: CounterField, delta: i64) {
        if let Err(e) = self.ledger.apply_delta(entity, field, delta).await {
            tracing::warn!("Failed to apply {} {:+} on {:?}: {}", field, delta, entity, e);
        }
    }
}
