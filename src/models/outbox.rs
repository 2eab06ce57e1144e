use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use super::comment::CommentNode;
use super::identity::{BlogId, CommentId, NotificationId, UserId};

/// Secondary work owed after a primary write. Recorded in the same atomic
/// step as the write, applied later by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FollowUp {
    CommentCreated {
        comment_id: CommentId,
        blog_id: BlogId,
        blog_author_id: UserId,
        author_id: UserId,
        parent_comment_id: Option<CommentId>,
        parent_author_id: Option<UserId>,
        in_flight_notification_id: Option<NotificationId>,
    },
    CommentsDeleted {
        blog_id: BlogId,
        removed: Vec<RemovedComment>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedComment {
    pub id: CommentId,
    pub is_reply: bool,
}

impl FollowUp {
    pub fn created(
        node: &CommentNode,
        parent_author_id: Option<UserId>,
        in_flight_notification_id: Option<NotificationId>,
    ) -> Self {
        FollowUp::CommentCreated {
            comment_id: node.id,
            blog_id: node.blog_id,
            blog_author_id: node.blog_author_id,
            author_id: node.author_id,
            parent_comment_id: node.parent_comment_id,
            parent_author_id,
            in_flight_notification_id,
        }
    }

    pub fn deleted(blog_id: BlogId, removed: &[CommentNode]) -> Self {
        FollowUp::CommentsDeleted {
            blog_id,
            removed: removed
                .iter()
                .map(|node| RemovedComment {
                    id: node.id,
                    is_reply: node.is_reply,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "outbox_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Done,
    /// Gave up after the configured number of attempts.
    Dead,
}

/// Represents the 'outbox_events' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct OutboxEvent {
    pub id: i64,
    pub follow_up: Json<FollowUp>,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
