use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::identity::{BlogId, CommentId, NotificationId, UserId};

/// Page size of the notification feed.
pub const NOTIFICATION_PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Reply,
}

/// Represents the 'notifications' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub blog_id: BlogId,
    /// Who is notified.
    pub recipient_id: UserId,
    /// Who triggered it.
    pub actor_id: UserId,
    pub comment_id: Option<CommentId>,
    pub replied_on_comment_id: Option<CommentId>,
    pub reply_id: Option<CommentId>,
    pub seen: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Input for a notification write.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub blog_id: BlogId,
    pub recipient_id: UserId,
    pub actor_id: UserId,
    pub comment_id: Option<CommentId>,
    pub replied_on_comment_id: Option<CommentId>,
    /// Unique when present; a second insert with the same key is ignored.
    pub dedupe_key: Option<String>,
}

impl NewNotification {
    pub fn like_key(actor_id: UserId, blog_id: BlogId) -> String {
        format!("like:{actor_id}:{blog_id}")
    }

    pub fn comment_key(comment_id: CommentId) -> String {
        format!("comment:{comment_id}")
    }

    pub fn reply_key(comment_id: CommentId) -> String {
        format!("reply:{comment_id}")
    }
}

/// Feed filter: everything, or one notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedFilter {
    #[default]
    All,
    Only(NotificationKind),
}

impl FeedFilter {
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") | Some("all") => Ok(FeedFilter::All),
            Some("like") => Ok(FeedFilter::Only(NotificationKind::Like)),
            Some("comment") => Ok(FeedFilter::Only(NotificationKind::Comment)),
            Some("reply") => Ok(FeedFilter::Only(NotificationKind::Reply)),
            Some(other) => Err(format!("Unknown notification filter '{}'", other)),
        }
    }

    pub fn kind(self) -> Option<NotificationKind> {
        match self {
            FeedFilter::All => None,
            FeedFilter::Only(kind) => Some(kind),
        }
    }

    pub fn matches(self, kind: NotificationKind) -> bool {
        self.kind().is_none_or(|k| k == kind)
    }
}

/// Query parameters for the notification feed.
#[derive(Debug, Deserialize)]
pub struct NotificationListParams {
    /// 1-based page number.
    pub page: Option<i64>,
    pub filter: Option<String>,
    /// Records the client removed since loading earlier pages.
    pub deleted_doc_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationCountParams {
    pub filter: Option<String>,
}
