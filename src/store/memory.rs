// src/store/memory.rs

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::RwLock;

use super::{
    AccountDirectory, BlogStore, CommentRepository, CounterLedger, NotificationRepository,
    Outbox, Persisted, Result, StoreError,
};
use crate::models::{
    comment::{Cascade, CommentNode, NewComment},
    counter::{CounterField, EntityRef},
    directory::{Account, Blog},
    identity::{BlogId, CommentId, NotificationId, UserId},
    notification::{FeedFilter, NewNotification, NotificationKind, NotificationRecord},
    outbox::{FollowUp, OutboxEvent, OutboxStatus},
};

/// In-process backend. Every operation takes the single lock once, which
/// makes each trait call atomic the same way a Postgres transaction is.
#[derive(Default, Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<UserId, Account>,
    blogs: HashMap<BlogId, Blog>,
    comments: HashMap<CommentId, CommentNode>,
    notifications: BTreeMap<NotificationId, Stored>,
    outbox: BTreeMap<i64, OutboxEvent>,
    applied: HashSet<String>,
    next_id: i64,
}

struct Stored {
    record: NotificationRecord,
    dedupe_key: Option<String>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn enqueue(&mut self, follow_up: FollowUp) -> i64 {
        let id = self.next_id();
        self.outbox.insert(
            id,
            OutboxEvent {
                id,
                follow_up: Json(follow_up),
                status: OutboxStatus::Pending,
                attempts: 0,
                last_error: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn counter_mut(&mut self, entity: EntityRef, field: CounterField) -> Result<&mut i64> {
        let unknown = StoreError::UnknownCounter { entity, field };
        match entity {
            EntityRef::Blog(id) => {
                let blog = self.blogs.get_mut(&id).ok_or(StoreError::NotFound("Blog"))?;
                match field {
                    CounterField::TotalComments => Ok(&mut blog.total_comments),
                    CounterField::TotalParentComments => Ok(&mut blog.total_parent_comments),
                    CounterField::TotalReads => Ok(&mut blog.total_reads),
                    CounterField::TotalLikes => Ok(&mut blog.total_likes),
                    CounterField::TotalPosts => Err(unknown),
                }
            }
            EntityRef::User(id) => {
                let account = self.accounts.get_mut(&id).ok_or(StoreError::NotFound("User"))?;
                match field {
                    CounterField::TotalPosts => Ok(&mut account.total_posts),
                    CounterField::TotalReads => Ok(&mut account.total_reads),
                    _ => Err(unknown),
                }
            }
        }
    }

    fn feed(&self, recipient_id: UserId, filter: FeedFilter) -> Vec<&NotificationRecord> {
        let mut records: Vec<&NotificationRecord> = self
            .notifications
            .values()
            .map(|stored| &stored.record)
            .filter(|r| {
                r.recipient_id == recipient_id
                    && r.actor_id != recipient_id
                    && filter.matches(r.kind)
            })
            .collect();
        newest_first(&mut records, |r| (r.created_at, r.id));
        records
    }
}

fn newest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn page<T: Clone>(items: &[&T], skip: i64, limit: i64) -> Vec<T> {
    items
        .iter()
        .skip(skip.max(0) as usize)
        .take(limit.max(0) as usize)
        .map(|item| (*item).clone())
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account, standing in for the platform's signup flow.
    pub async fn create_account(&self, username: &str) -> Account {
        let mut state = self.state.write().await;
        let account = Account {
            id: state.next_id(),
            username: username.to_string(),
            total_posts: 0,
            total_reads: 0,
        };
        state.accounts.insert(account.id, account.clone());
        account
    }

    /// Publishes a blog, standing in for the platform's blog editor.
    pub async fn create_blog(&self, author_id: UserId, title: &str) -> Blog {
        self.insert_blog(author_id, title, false).await
    }

    /// Saves an unpublished blog.
    pub async fn create_draft(&self, author_id: UserId, title: &str) -> Blog {
        self.insert_blog(author_id, title, true).await
    }

    async fn insert_blog(&self, author_id: UserId, title: &str, draft: bool) -> Blog {
        let mut state = self.state.write().await;
        let blog = Blog {
            id: state.next_id(),
            author_id,
            title: title.to_string(),
            draft,
            total_comments: 0,
            total_parent_comments: 0,
            total_reads: 0,
            total_likes: 0,
            published_at: Utc::now(),
        };
        state.blogs.insert(blog.id, blog.clone());
        blog
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn insert_comment(&self, new: NewComment) -> Result<Persisted<CommentNode>> {
        let mut state = self.state.write().await;

        let parent_author_id = match new.parent_comment_id {
            Some(parent_id) => {
                let parent = state
                    .comments
                    .get(&parent_id)
                    .filter(|parent| parent.blog_id == new.blog_id)
                    .ok_or(StoreError::NotFound("Parent comment"))?;
                Some(parent.author_id)
            }
            None => None,
        };

        let node = CommentNode {
            id: state.next_id(),
            blog_id: new.blog_id,
            blog_author_id: new.blog_author_id,
            author_id: new.author_id,
            body: new.body,
            parent_comment_id: new.parent_comment_id,
            is_reply: new.parent_comment_id.is_some(),
            children: Vec::new(),
            created_at: Utc::now(),
        };

        if let Some(parent) = node
            .parent_comment_id
            .and_then(|parent_id| state.comments.get_mut(&parent_id))
        {
            parent.children.push(node.id);
        }
        state.comments.insert(node.id, node.clone());

        let event_id = state.enqueue(FollowUp::created(
            &node,
            parent_author_id,
            new.in_flight_notification_id,
        ));

        Ok(Persisted {
            value: node,
            event_id,
        })
    }

    async fn find_comment(&self, id: CommentId) -> Result<Option<CommentNode>> {
        Ok(self.state.read().await.comments.get(&id).cloned())
    }

    async fn list_top_level(
        &self,
        blog_id: BlogId,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<CommentNode>> {
        let state = self.state.read().await;
        let mut nodes: Vec<&CommentNode> = state
            .comments
            .values()
            .filter(|node| node.blog_id == blog_id && !node.is_reply)
            .collect();
        newest_first(&mut nodes, |node| (node.created_at, node.id));
        Ok(page(&nodes, skip, limit))
    }

    async fn list_children(
        &self,
        parent_id: CommentId,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<CommentNode>> {
        let state = self.state.read().await;
        let Some(parent) = state.comments.get(&parent_id) else {
            return Ok(Vec::new());
        };
        let mut nodes: Vec<&CommentNode> = parent
            .children
            .iter()
            .filter_map(|id| state.comments.get(id))
            .collect();
        newest_first(&mut nodes, |node| (node.created_at, node.id));
        Ok(page(&nodes, skip, limit))
    }

    async fn delete_subtree(&self, id: CommentId) -> Result<Persisted<Cascade>> {
        let mut state = self.state.write().await;

        let (blog_id, parent_id) = state
            .comments
            .get(&id)
            .map(|root| (root.blog_id, root.parent_comment_id))
            .ok_or(StoreError::NotFound("Comment"))?;

        if let Some(parent) = parent_id.and_then(|pid| state.comments.get_mut(&pid)) {
            parent.children.retain(|child| *child != id);
        }

        let mut removed = Vec::new();
        let mut worklist = VecDeque::from([id]);
        while let Some(current) = worklist.pop_front() {
            if let Some(node) = state.comments.remove(&current) {
                worklist.extend(node.children.iter().copied());
                removed.push(node);
            }
        }

        let event_id = state.enqueue(FollowUp::deleted(blog_id, &removed));

        Ok(Persisted {
            value: Cascade {
                removed,
                blog_id,
                parent_id,
            },
            event_id,
        })
    }
}

#[async_trait]
impl CounterLedger for MemoryStore {
    async fn apply_delta(&self, entity: EntityRef, field: CounterField, delta: i64) -> Result<()> {
        let mut state = self.state.write().await;
        *state.counter_mut(entity, field)? += delta;
        Ok(())
    }

    async fn apply_delta_once(
        &self,
        key: &str,
        entity: EntityRef,
        field: CounterField,
        delta: i64,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.applied.contains(key) {
            return Ok(false);
        }
        *state.counter_mut(entity, field)? += delta;
        state.applied.insert(key.to_string());
        Ok(true)
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(
        &self,
        new: NewNotification,
    ) -> Result<Option<NotificationRecord>> {
        let mut state = self.state.write().await;

        if let Some(key) = &new.dedupe_key {
            let taken = state
                .notifications
                .values()
                .any(|stored| stored.dedupe_key.as_ref() == Some(key));
            if taken {
                return Ok(None);
            }
        }

        let record = NotificationRecord {
            id: state.next_id(),
            kind: new.kind,
            blog_id: new.blog_id,
            recipient_id: new.recipient_id,
            actor_id: new.actor_id,
            comment_id: new.comment_id,
            replied_on_comment_id: new.replied_on_comment_id,
            reply_id: None,
            seen: false,
            created_at: Utc::now(),
        };
        state.notifications.insert(
            record.id,
            Stored {
                record: record.clone(),
                dedupe_key: new.dedupe_key,
            },
        );

        Ok(Some(record))
    }

    async fn attach_reply(
        &self,
        notification_id: NotificationId,
        recipient_id: UserId,
        reply_id: CommentId,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.notifications.get_mut(&notification_id) {
            Some(stored) if stored.record.recipient_id == recipient_id => {
                stored.record.reply_id = Some(reply_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_like(&self, actor_id: UserId, blog_id: BlogId) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.notifications.len();
        state.notifications.retain(|_, stored| {
            let r = &stored.record;
            !(r.kind == NotificationKind::Like && r.actor_id == actor_id && r.blog_id == blog_id)
        });
        Ok(state.notifications.len() < before)
    }

    async fn like_exists(&self, actor_id: UserId, blog_id: BlogId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.notifications.values().any(|stored| {
            let r = &stored.record;
            r.kind == NotificationKind::Like && r.actor_id == actor_id && r.blog_id == blog_id
        }))
    }

    async fn delete_for_comment(&self, comment_id: CommentId) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.notifications.len();
        state
            .notifications
            .retain(|_, stored| stored.record.comment_id != Some(comment_id));
        let deleted = (before - state.notifications.len()) as u64;

        for stored in state.notifications.values_mut() {
            if stored.record.reply_id == Some(comment_id) {
                stored.record.reply_id = None;
            }
        }

        Ok(deleted)
    }

    async fn list_feed(
        &self,
        recipient_id: UserId,
        filter: FeedFilter,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<NotificationRecord>> {
        let state = self.state.read().await;
        Ok(page(&state.feed(recipient_id, filter), skip, limit))
    }

    async fn mark_seen(&self, ids: &[NotificationId]) -> Result<()> {
        let mut state = self.state.write().await;
        for id in ids {
            if let Some(stored) = state.notifications.get_mut(id) {
                stored.record.seen = true;
            }
        }
        Ok(())
    }

    async fn has_unseen(&self, recipient_id: UserId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .feed(recipient_id, FeedFilter::All)
            .iter()
            .any(|record| !record.seen))
    }

    async fn count_feed(&self, recipient_id: UserId, filter: FeedFilter) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.feed(recipient_id, filter).len() as i64)
    }
}

#[async_trait]
impl Outbox for MemoryStore {
    async fn fetch_event(&self, id: i64) -> Result<Option<OutboxEvent>> {
        Ok(self.state.read().await.outbox.get(&id).cloned())
    }

    async fn pending_events(&self, limit: i64) -> Result<Vec<OutboxEvent>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .values()
            .filter(|event| event.status == OutboxStatus::Pending)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn complete_event(&self, id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(event) = state.outbox.get_mut(&id) {
            event.status = OutboxStatus::Done;
            event.last_error = None;
        }
        Ok(())
    }

    async fn fail_event(&self, id: i64, error: &str, max_attempts: i32) -> Result<OutboxStatus> {
        let mut state = self.state.write().await;
        let event = state
            .outbox
            .get_mut(&id)
            .ok_or(StoreError::NotFound("Outbox event"))?;

        event.attempts += 1;
        event.last_error = Some(error.to_string());
        event.status = if event.attempts >= max_attempts {
            OutboxStatus::Dead
        } else {
            OutboxStatus::Pending
        };

        Ok(event.status)
    }
}

#[async_trait]
impl BlogStore for MemoryStore {
    async fn find_blog(&self, id: BlogId) -> Result<Option<Blog>> {
        Ok(self.state.read().await.blogs.get(&id).cloned())
    }

    async fn blog_exists(&self, id: BlogId) -> Result<bool> {
        Ok(self.state.read().await.blogs.contains_key(&id))
    }
}

#[async_trait]
impl AccountDirectory for MemoryStore {
    async fn find_account(&self, id: UserId) -> Result<Option<Account>> {
        Ok(self.state.read().await.accounts.get(&id).cloned())
    }
}
