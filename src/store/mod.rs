// src/store/mod.rs

//! Storage seams of the comment subsystem.
//!
//! Each trait is one capability the services consume. Both backends implement
//! all of them on a single type, so one `Arc` can be handed out as every seam
//! through [`Stores::from_backend`].

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    comment::{Cascade, CommentNode, NewComment},
    counter::{CounterField, EntityRef},
    directory::{Account, Blog},
    identity::{BlogId, CommentId, NotificationId, UserId},
    notification::{FeedFilter, NewNotification, NotificationRecord},
    outbox::{OutboxEvent, OutboxStatus},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Counter {field} is not tracked on {entity:?}")]
    UnknownCounter {
        entity: EntityRef,
        field: CounterField,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A primary write together with the outbox event recorded alongside it.
#[derive(Debug, Clone)]
pub struct Persisted<T> {
    pub value: T,
    pub event_id: i64,
}

/// Comment nodes and their parent/child links.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Writes the node and its `CommentCreated` follow-up atomically.
    /// A reply's parent must exist in the same blog; it is locked while its
    /// `children` list is extended.
    async fn insert_comment(&self, new: NewComment) -> Result<Persisted<CommentNode>>;

    async fn find_comment(&self, id: CommentId) -> Result<Option<CommentNode>>;

    /// Top-level comments of a blog, newest first.
    async fn list_top_level(&self, blog_id: BlogId, skip: i64, limit: i64)
    -> Result<Vec<CommentNode>>;

    /// Direct replies of a comment, newest first.
    async fn list_children(
        &self,
        parent_id: CommentId,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<CommentNode>>;

    /// Removes a node and every descendant, detaches it from its parent and
    /// records the `CommentsDeleted` follow-up, all in one atomic step.
    async fn delete_subtree(&self, id: CommentId) -> Result<Persisted<Cascade>>;
}

/// Signed-delta access to Blog and User counters.
#[async_trait]
pub trait CounterLedger: Send + Sync {
    async fn apply_delta(&self, entity: EntityRef, field: CounterField, delta: i64) -> Result<()>;

    /// Applies the delta only if `key` was never applied before.
    /// Returns whether the delta was applied by this call.
    async fn apply_delta_once(
        &self,
        key: &str,
        entity: EntityRef,
        field: CounterField,
        delta: i64,
    ) -> Result<bool>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Returns `None` when a record with the same dedupe key already exists.
    async fn insert_notification(&self, new: NewNotification)
    -> Result<Option<NotificationRecord>>;

    /// Links a reply to a notification owned by `recipient_id`.
    async fn attach_reply(
        &self,
        notification_id: NotificationId,
        recipient_id: UserId,
        reply_id: CommentId,
    ) -> Result<bool>;

    async fn delete_like(&self, actor_id: UserId, blog_id: BlogId) -> Result<bool>;

    async fn like_exists(&self, actor_id: UserId, blog_id: BlogId) -> Result<bool>;

    /// Deletes records about `comment_id` and unlinks it where it was a reply.
    /// Returns the number of deleted records.
    async fn delete_for_comment(&self, comment_id: CommentId) -> Result<u64>;

    /// Feed of a recipient, newest first, self-notifications excluded.
    async fn list_feed(
        &self,
        recipient_id: UserId,
        filter: FeedFilter,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<NotificationRecord>>;

    async fn mark_seen(&self, ids: &[NotificationId]) -> Result<()>;

    async fn has_unseen(&self, recipient_id: UserId) -> Result<bool>;

    async fn count_feed(&self, recipient_id: UserId, filter: FeedFilter) -> Result<i64>;
}

/// Durable queue of follow-ups.
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn fetch_event(&self, id: i64) -> Result<Option<OutboxEvent>>;

    /// Oldest pending events first.
    async fn pending_events(&self, limit: i64) -> Result<Vec<OutboxEvent>>;

    async fn complete_event(&self, id: i64) -> Result<()>;

    /// Counts a failed attempt; the event turns dead once `max_attempts` is reached.
    async fn fail_event(&self, id: i64, error: &str, max_attempts: i32) -> Result<OutboxStatus>;
}

#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn find_blog(&self, id: BlogId) -> Result<Option<Blog>>;

    async fn blog_exists(&self, id: BlogId) -> Result<bool>;
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_account(&self, id: UserId) -> Result<Option<Account>>;
}

/// Every storage seam, as trait objects.
#[derive(Clone)]
pub struct Stores {
    pub comments: Arc<dyn CommentRepository>,
    pub ledger: Arc<dyn CounterLedger>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub outbox: Arc<dyn Outbox>,
    pub blogs: Arc<dyn BlogStore>,
    pub accounts: Arc<dyn AccountDirectory>,
}

impl Stores {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: CommentRepository
            + CounterLedger
            + NotificationRepository
            + Outbox
            + BlogStore
            + AccountDirectory
            + 'static,
    {
        Self {
            comments: backend.clone(),
            ledger: backend.clone(),
            notifications: backend.clone(),
            outbox: backend.clone(),
            blogs: backend.clone(),
            accounts: backend,
        }
    }
}
