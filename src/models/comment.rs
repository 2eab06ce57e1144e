use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::identity::{BlogId, CommentId, NotificationId, UserId};

/// Maximum length of a comment body, in characters.
pub const MAX_COMMENT_LEN: usize = 1000;

/// Represents the 'comments' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CommentNode {
    pub id: CommentId,
    pub blog_id: BlogId,
    /// Snapshot of the blog's author taken at creation.
    /// Authorization cache for deletes, not live truth: it goes stale if blog
    /// ownership ever moves.
    pub blog_author_id: UserId,
    pub author_id: UserId,
    pub body: String,
    pub parent_comment_id: Option<CommentId>,
    pub is_reply: bool,
    /// Direct replies, in the order they were created.
    pub children: Vec<CommentId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Input for a node write. `parent_comment_id` decides top-level vs reply.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub blog_id: BlogId,
    pub blog_author_id: UserId,
    pub author_id: UserId,
    pub body: String,
    pub parent_comment_id: Option<CommentId>,
    /// The notification the replier was looking at, if the reply came from the feed.
    pub in_flight_notification_id: Option<NotificationId>,
}

/// Result of a cascading delete.
#[derive(Debug, Clone)]
pub struct Cascade {
    pub removed: Vec<CommentNode>,
    pub blog_id: BlogId,
    pub parent_id: Option<CommentId>,
}

impl Cascade {
    pub fn deleted_ids(&self) -> Vec<CommentId> {
        self.removed.iter().map(|node| node.id).collect()
    }
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub comment: String,

    /// Optional: the ID of the comment being replied to.
    pub replying_to: Option<CommentId>,

    /// Optional: the notification the reply was written from.
    pub notification_id: Option<NotificationId>,

    /// Optional: the blog author as the client knows it. Checked, never trusted.
    pub blog_author: Option<UserId>,
}

/// Body returned after a comment is created.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedComment {
    pub id: CommentId,
    pub comment: String,
    pub commented_at: chrono::DateTime<chrono::Utc>,
    pub user_id: UserId,
    pub children: Vec<CommentId>,
}

impl From<CommentNode> for CreatedComment {
    fn from(node: CommentNode) -> Self {
        Self {
            id: node.id,
            comment: node.body,
            commented_at: node.created_at,
            user_id: node.author_id,
            children: node.children,
        }
    }
}

/// Minimal author info attached to listed comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: UserId,
    pub username: String,
}

/// DTO for displaying a comment with author info.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: CommentId,
    pub blog_id: BlogId,
    pub comment: String,
    pub commented_by: Option<AuthorSummary>,
    pub is_reply: bool,
    pub parent_comment_id: Option<CommentId>,
    pub children: Vec<CommentId>,
    pub commented_at: chrono::DateTime<chrono::Utc>,
}

impl CommentResponse {
    pub fn new(node: CommentNode, commented_by: Option<AuthorSummary>) -> Self {
        Self {
            id: node.id,
            blog_id: node.blog_id,
            comment: node.body,
            commented_by,
            is_reply: node.is_reply,
            parent_comment_id: node.parent_comment_id,
            children: node.children,
            commented_at: node.created_at,
        }
    }
}

/// Query parameters for comment listings.
#[derive(Debug, Deserialize)]
pub struct CommentListParams {
    pub skip: Option<i64>,
}
