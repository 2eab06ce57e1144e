// src/store/postgres.rs

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, types::Json};

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

/// Postgres-backed implementation of every storage seam.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// `col = col + delta` on the row, a single atomic statement.
async fn apply_column_delta<'e, E>(
    executor: E,
    entity: EntityRef,
    field: CounterField,
    delta: i64,
) -> Result<()>
where
    E: PgExecutor<'e>,
{
    let column = field
        .column_for(entity)
        .ok_or(StoreError::UnknownCounter { entity, field })?;
    let (table, id, missing) = match entity {
        EntityRef::Blog(id) => ("blogs", id, "Blog"),
        EntityRef::User(id) => ("users", id, "User"),
    };

    let sql = format!("UPDATE {table} SET {column} = {column} + $1 WHERE id = $2");
    let result = sqlx::query(&sql)
        .bind(delta)
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(missing));
    }
    Ok(())
}

#[async_trait]
impl CommentRepository for PgStore {
    async fn insert_comment(&self, new: NewComment) -> Result<Persisted<CommentNode>> {
        let mut tx = self.pool.begin().await?;

        // Lock the parent so a concurrent delete cannot orphan the reply.
        let parent_author_id = match new.parent_comment_id {
            Some(parent_id) => {
                let author_id: Option<UserId> = sqlx::query_scalar(
                    "SELECT author_id FROM comments WHERE id = $1 AND blog_id = $2 FOR UPDATE",
                )
                .bind(parent_id)
                .bind(new.blog_id)
                .fetch_optional(&mut *tx)
                .await?;
                Some(author_id.ok_or(StoreError::NotFound("Parent comment"))?)
            }
            None => None,
        };

        let node = sqlx::query_as::<_, CommentNode>(
            r#"
            INSERT INTO comments (blog_id, blog_author_id, author_id, body, parent_comment_id, is_reply)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, blog_id, blog_author_id, author_id, body,
                      parent_comment_id, is_reply, children, created_at
            "#,
        )
        .bind(new.blog_id)
        .bind(new.blog_author_id)
        .bind(new.author_id)
        .bind(&new.body)
        .bind(new.parent_comment_id)
        .bind(new.parent_comment_id.is_some())
        .fetch_one(&mut *tx)
        .await?;

        if let Some(parent_id) = node.parent_comment_id {
            sqlx::query("UPDATE comments SET children = array_append(children, $1) WHERE id = $2")
                .bind(node.id)
                .bind(parent_id)
                .execute(&mut *tx)
                .await?;
        }

        let follow_up = FollowUp::created(&node, parent_author_id, new.in_flight_notification_id);
        let event_id: i64 =
            sqlx::query_scalar("INSERT INTO outbox_events (follow_up) VALUES ($1) RETURNING id")
                .bind(Json(follow_up))
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(Persisted {
            value: node,
            event_id,
        })
    }

    async fn find_comment(&self, id: CommentId) -> Result<Option<CommentNode>> {
        let node = sqlx::query_as::<_, CommentNode>(
            r#"
            SELECT id, blog_id, blog_author_id, author_id, body,
                   parent_comment_id, is_reply, children, created_at
            FROM comments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(node)
    }

    async fn list_top_level(
        &self,
        blog_id: BlogId,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<CommentNode>> {
        let nodes = sqlx::query_as::<_, CommentNode>(
            r#"
            SELECT id, blog_id, blog_author_id, author_id, body,
                   parent_comment_id, is_reply, children, created_at
            FROM comments
            WHERE blog_id = $1 AND is_reply = FALSE
            ORDER BY created_at DESC, id DESC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(blog_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(nodes)
    }

    async fn list_children(
        &self,
        parent_id: CommentId,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<CommentNode>> {
        let nodes = sqlx::query_as::<_, CommentNode>(
            r#"
            SELECT c.id, c.blog_id, c.blog_author_id, c.author_id, c.body,
                   c.parent_comment_id, c.is_reply, c.children, c.created_at
            FROM comments p
            JOIN comments c ON c.id = ANY(p.children)
            WHERE p.id = $1
            ORDER BY c.created_at DESC, c.id DESC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(parent_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(nodes)
    }

    async fn delete_subtree(&self, id: CommentId) -> Result<Persisted<Cascade>> {
        let mut tx = self.pool.begin().await?;

        let root = sqlx::query_as::<_, CommentNode>(
            r#"
            SELECT id, blog_id, blog_author_id, author_id, body,
                   parent_comment_id, is_reply, children, created_at
            FROM comments
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("Comment"))?;

        if let Some(parent_id) = root.parent_comment_id {
            sqlx::query("UPDATE comments SET children = array_remove(children, $1) WHERE id = $2")
                .bind(root.id)
                .bind(parent_id)
                .execute(&mut *tx)
                .await?;
        }

        // Worklist instead of recursion: depth is unbounded.
        let mut removed = Vec::new();
        let mut visited = HashSet::new();
        let mut worklist = VecDeque::from([root.id]);

        while let Some(current) = worklist.pop_front() {
            if !visited.insert(current) {
                continue;
            }

            let node = sqlx::query_as::<_, CommentNode>(
                r#"
                DELETE FROM comments
                WHERE id = $1
                RETURNING id, blog_id, blog_author_id, author_id, body,
                          parent_comment_id, is_reply, children, created_at
                "#,
            )
            .bind(current)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(node) = node else { continue };

            // Children recorded on the node plus any row that still points at it.
            let linked: Vec<CommentId> =
                sqlx::query_scalar("SELECT id FROM comments WHERE parent_comment_id = $1")
                    .bind(current)
                    .fetch_all(&mut *tx)
                    .await?;

            worklist.extend(node.children.iter().copied());
            worklist.extend(linked);
            removed.push(node);
        }

        let follow_up = FollowUp::deleted(root.blog_id, &removed);
        let event_id: i64 =
            sqlx::query_scalar("INSERT INTO outbox_events (follow_up) VALUES ($1) RETURNING id")
                .bind(Json(follow_up))
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(Persisted {
            value: Cascade {
                removed,
                blog_id: root.blog_id,
                parent_id: root.parent_comment_id,
            },
            event_id,
        })
    }
}

#[async_trait]
impl CounterLedger for PgStore {
    async fn apply_delta(&self, entity: EntityRef, field: CounterField, delta: i64) -> Result<()> {
        apply_column_delta(&self.pool, entity, field, delta).await
    }

    async fn apply_delta_once(
        &self,
        key: &str,
        entity: EntityRef,
        field: CounterField,
        delta: i64,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let fresh = sqlx::query("INSERT INTO applied_effects (key) VALUES ($1) ON CONFLICT (key) DO NOTHING")
            .bind(key)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            == 1;

        if !fresh {
            return Ok(false);
        }

        apply_column_delta(&mut *tx, entity, field, delta).await?;
        tx.commit().await?;

        Ok(true)
    }
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert_notification(
        &self,
        new: NewNotification,
    ) -> Result<Option<NotificationRecord>> {
        let record = sqlx::query_as::<_, NotificationRecord>(
            r#"
            INSERT INTO notifications
                (kind, blog_id, recipient_id, actor_id, comment_id, replied_on_comment_id, dedupe_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (dedupe_key) DO NOTHING
            RETURNING id, kind, blog_id, recipient_id, actor_id, comment_id,
                      replied_on_comment_id, reply_id, seen, created_at
            "#,
        )
        .bind(new.kind)
        .bind(new.blog_id)
        .bind(new.recipient_id)
        .bind(new.actor_id)
        .bind(new.comment_id)
        .bind(new.replied_on_comment_id)
        .bind(new.dedupe_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn attach_reply(
        &self,
        notification_id: NotificationId,
        recipient_id: UserId,
        reply_id: CommentId,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE notifications SET reply_id = $1 WHERE id = $2 AND recipient_id = $3")
                .bind(reply_id)
                .bind(notification_id)
                .bind(recipient_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_like(&self, actor_id: UserId, blog_id: BlogId) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE actor_id = $1 AND blog_id = $2 AND kind = $3",
        )
        .bind(actor_id)
        .bind(blog_id)
        .bind(NotificationKind::Like)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn like_exists(&self, actor_id: UserId, blog_id: BlogId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM notifications
                WHERE actor_id = $1 AND blog_id = $2 AND kind = $3
            )
            "#,
        )
        .bind(actor_id)
        .bind(blog_id)
        .bind(NotificationKind::Like)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn delete_for_comment(&self, comment_id: CommentId) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM notifications WHERE comment_id = $1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE notifications SET reply_id = NULL WHERE reply_id = $1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted)
    }

    async fn list_feed(
        &self,
        recipient_id: UserId,
        filter: FeedFilter,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<NotificationRecord>> {
        let records = sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT id, kind, blog_id, recipient_id, actor_id, comment_id,
                   replied_on_comment_id, reply_id, seen, created_at
            FROM notifications
            WHERE recipient_id = $1
              AND actor_id <> $1
              AND ($2::notification_kind IS NULL OR kind = $2)
            ORDER BY created_at DESC, id DESC
            OFFSET $3
            LIMIT $4
            "#,
        )
        .bind(recipient_id)
        .bind(filter.kind())
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn mark_seen(&self, ids: &[NotificationId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        sqlx::query("UPDATE notifications SET seen = TRUE WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn has_unseen(&self, recipient_id: UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM notifications
                WHERE recipient_id = $1 AND actor_id <> $1 AND seen = FALSE
            )
            "#,
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn count_feed(&self, recipient_id: UserId, filter: FeedFilter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE recipient_id = $1
              AND actor_id <> $1
              AND ($2::notification_kind IS NULL OR kind = $2)
            "#,
        )
        .bind(recipient_id)
        .bind(filter.kind())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl Outbox for PgStore {
    async fn fetch_event(&self, id: i64) -> Result<Option<OutboxEvent>> {
        let event = sqlx::query_as::<_, OutboxEvent>(
            "SELECT id, follow_up, status, attempts, last_error, created_at FROM outbox_events WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    async fn pending_events(&self, limit: i64) -> Result<Vec<OutboxEvent>> {
        let events = sqlx::query_as::<_, OutboxEvent>(
            r#"
            SELECT id, follow_up, status, attempts, last_error, created_at
            FROM outbox_events
            WHERE status = $1
            ORDER BY id ASC
            LIMIT $2
            "#,
        )
        .bind(OutboxStatus::Pending)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn complete_event(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE outbox_events SET status = $1, last_error = NULL WHERE id = $2")
            .bind(OutboxStatus::Done)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fail_event(&self, id: i64, error: &str, max_attempts: i32) -> Result<OutboxStatus> {
        let status: Option<OutboxStatus> = sqlx::query_scalar(
            r#"
            UPDATE outbox_events
            SET attempts = attempts + 1,
                last_error = $2,
                status = CASE WHEN attempts + 1 >= $3 THEN $4 ELSE $5 END
            WHERE id = $1
            RETURNING status
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts)
        .bind(OutboxStatus::Dead)
        .bind(OutboxStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;

        status.ok_or(StoreError::NotFound("Outbox event"))
    }
}

#[async_trait]
impl BlogStore for PgStore {
    async fn find_blog(&self, id: BlogId) -> Result<Option<Blog>> {
        let blog = sqlx::query_as::<_, Blog>(
            r#"
            SELECT id, author_id, title, draft,
                   total_comments, total_parent_comments, total_reads, total_likes,
                   published_at
            FROM blogs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(blog)
    }

    async fn blog_exists(&self, id: BlogId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM blogs WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}

#[async_trait]
impl AccountDirectory for PgStore {
    async fn find_account(&self, id: UserId) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, username, total_posts, total_reads FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }
}
