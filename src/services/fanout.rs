// src/services/fanout.rs

use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        identity::{BlogId, CommentId, NotificationId, UserId},
        notification::{
            FeedFilter, NOTIFICATION_PAGE_SIZE, NewNotification, NotificationKind,
            NotificationRecord,
        },
    },
    store::NotificationRepository,
};

/// Everything needed to notify the author of a replied-to comment.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyNotice {
    pub blog_id: BlogId,
    /// Who a plain comment would have notified (the blog author).
    pub recipient_hint: UserId,
    pub actor_id: UserId,
    pub comment_id: CommentId,
    pub parent_comment_id: CommentId,
    pub parent_author_id: UserId,
    /// The feed entry the reply was written from, if any.
    pub update_notification_id: Option<NotificationId>,
}

/// Skip for a 1-based feed page, shifted back by records the client deleted
/// after loading earlier pages.
pub fn feed_skip(page: i64, deleted_doc_count: i64) -> i64 {
    ((page.max(1) - 1) * NOTIFICATION_PAGE_SIZE - deleted_doc_count.max(0)).max(0)
}

/// Notification Fan-Out: secondary records for comment, reply and like events.
#[derive(Clone)]
pub struct NotificationFanOut {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationFanOut {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    /// Returns `None` if the comment was already notified.
    pub async fn notify_comment(
        &self,
        blog_id: BlogId,
        recipient_id: UserId,
        actor_id: UserId,
        comment_id: CommentId,
    ) -> Result<Option<NotificationRecord>, AppError> {
        let record = self
            .repo
            .insert_notification(NewNotification {
                kind: NotificationKind::Comment,
                blog_id,
                recipient_id,
                actor_id,
                comment_id: Some(comment_id),
                replied_on_comment_id: None,
                dedupe_key: Some(NewNotification::comment_key(comment_id)),
            })
            .await?;

        Ok(record)
    }

    /// Replies notify the author of the parent comment, not the blog owner.
    pub async fn notify_reply(
        &self,
        notice: ReplyNotice,
    ) -> Result<Option<NotificationRecord>, AppError> {
        if notice.recipient_hint != notice.parent_author_id {
            tracing::debug!(
                "Reply {} notifies parent author {} instead of blog author {}",
                notice.comment_id,
                notice.parent_author_id,
                notice.recipient_hint
            );
        }

        let record = self
            .repo
            .insert_notification(NewNotification {
                kind: NotificationKind::Reply,
                blog_id: notice.blog_id,
                recipient_id: notice.parent_author_id,
                actor_id: notice.actor_id,
                comment_id: Some(notice.comment_id),
                replied_on_comment_id: Some(notice.parent_comment_id),
                dedupe_key: Some(NewNotification::reply_key(notice.comment_id)),
            })
            .await?;

        // The replier answered from their own feed: link the reply there too.
        if let Some(notification_id) = notice.update_notification_id {
            let linked = self
                .repo
                .attach_reply(notification_id, notice.actor_id, notice.comment_id)
                .await?;
            if !linked {
                tracing::warn!(
                    "Notification {} not linked to reply {}: missing or not owned by {}",
                    notification_id,
                    notice.comment_id,
                    notice.actor_id
                );
            }
        }

        Ok(record)
    }

    /// Idempotent: a second like by the same actor returns `None`.
    pub async fn notify_like(
        &self,
        blog_id: BlogId,
        recipient_id: UserId,
        actor_id: UserId,
    ) -> Result<Option<NotificationRecord>, AppError> {
        let record = self
            .repo
            .insert_notification(NewNotification {
                kind: NotificationKind::Like,
                blog_id,
                recipient_id,
                actor_id,
                comment_id: None,
                replied_on_comment_id: None,
                dedupe_key: Some(NewNotification::like_key(actor_id, blog_id)),
            })
            .await?;

        Ok(record)
    }

    /// Returns whether a like record was removed.
    pub async fn retract_like(&self, blog_id: BlogId, actor_id: UserId) -> Result<bool, AppError> {
        Ok(self.repo.delete_like(actor_id, blog_id).await?)
    }

    pub async fn is_liked(&self, blog_id: BlogId, actor_id: UserId) -> Result<bool, AppError> {
        Ok(self.repo.like_exists(actor_id, blog_id).await?)
    }

    pub async fn delete_for_comment(&self, comment_id: CommentId) -> Result<u64, AppError> {
        Ok(self.repo.delete_for_comment(comment_id).await?)
    }

    /// Returns one feed page and marks it seen. The records keep the `seen`
    /// value they had when fetched so the client can highlight new ones.
    pub async fn list_feed(
        &self,
        recipient_id: UserId,
        filter: FeedFilter,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        let records = self
            .repo
            .list_feed(recipient_id, filter, skip.max(0), limit)
            .await?;

        let unseen: Vec<NotificationId> = records
            .iter()
            .filter(|record| !record.seen)
            .map(|record| record.id)
            .collect();
        if let Err(e) = self.repo.mark_seen(&unseen).await {
            tracing::warn!("Failed to mark notifications seen for {}: {}", recipient_id, e);
        }

        Ok(records)
    }

    pub async fn has_unseen(&self, recipient_id: UserId) -> Result<bool, AppError> {
        Ok(self.repo.has_unseen(recipient_id).await?)
    }

    pub async fn count_feed(
        &self,
        recipient_id: UserId,
        filter: FeedFilter,
    ) -> Result<i64, AppError> {
        Ok(self.repo.count_feed(recipient_id, filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_skip_accounts_for_deleted_records() {
        assert_eq!(feed_skip(1, 0), 0);
        assert_eq!(feed_skip(3, 0), 20);
        assert_eq!(feed_skip(3, 4), 16);
        assert_eq!(feed_skip(1, 4), 0);
        assert_eq!(feed_skip(0, 0), 0);
    }
}
