// src/models/directory.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::identity::{BlogId, UserId};

/// Represents the 'users' table: the slice of an account the comment subsystem reads.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub username: String,
    pub total_posts: i64,
    pub total_reads: i64,
}

/// Represents the 'blogs' table: publish state and counters.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Blog {
    pub id: BlogId,
    pub author_id: UserId,
    pub title: String,
    pub draft: bool,
    pub total_comments: i64,
    pub total_parent_comments: i64,
    pub total_reads: i64,
    pub total_likes: i64,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

/// Query parameters for reading a blog.
#[derive(Debug, Deserialize)]
pub struct BlogReadParams {
    /// `edit` opens the blog in the editor without counting a read.
    pub mode: Option<String>,
}
