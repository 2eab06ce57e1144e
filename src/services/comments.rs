// src/services/comments.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        comment::{AuthorSummary, Cascade, CommentNode, CommentResponse},
        identity::{BlogId, CommentId, NotificationId, UserId},
    },
    services::{
        follow_up::FollowUpDispatcher,
        tree::CommentTree,
    },
    store::{AccountDirectory, BlogStore},
};

/// Page size of comment and reply listings.
pub const COMMENT_PAGE_SIZE: i64 = 5;

/// A comment-creation request after authentication.
#[derive(Debug, Clone)]
pub struct CreateComment {
    pub blog_id: BlogId,
    pub author_id: UserId,
    pub body: String,
    /// Blog author as the client sent it, if it did.
    pub blog_author_id: Option<UserId>,
    pub replying_to: Option<CommentId>,
    pub in_flight_notification_id: Option<NotificationId>,
}

/// Orchestrates comment writes: the node write is the only step whose failure
/// reaches the caller; counters and notifications follow through the outbox.
#[derive(Clone)]
pub struct CommentService {
    tree: CommentTree,
    blogs: Arc<dyn BlogStore>,
    accounts: Arc<dyn AccountDirectory>,
    dispatcher: FollowUpDispatcher,
}

impl CommentService {
    pub fn new(
        tree: CommentTree,
        blogs: Arc<dyn BlogStore>,
        accounts: Arc<dyn AccountDirectory>,
        dispatcher: FollowUpDispatcher,
    ) -> Self {
        Self {
            tree,
            blogs,
            accounts,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &FollowUpDispatcher {
        &self.dispatcher
    }

    pub async fn create_comment(&self, req: CreateComment) -> Result<CommentNode, AppError> {
        // 1. Validate against the blog
        let blog = self
            .blogs
            .find_blog(req.blog_id)
            .await?
            .ok_or(AppError::NotFound("Blog not found".to_string()))?;

        if let Some(claimed) = req.blog_author_id {
            if claimed != blog.author_id {
                return Err(AppError::BadRequest(
                    "blog_author does not match the blog".to_string(),
                ));
            }
        }

        // 2. Clean the body, persist node (and its follow-up record)
        let persisted = match req.replying_to {
            Some(parent_id) => {
                self.tree
                    .create_reply(
                        blog.id,
                        blog.author_id,
                        req.author_id,
                        &req.body,
                        parent_id,
                        req.in_flight_notification_id,
                    )
                    .await?
            }
            None => {
                self.tree
                    .create_top_level(blog.id, blog.author_id, req.author_id, &req.body)
                    .await?
            }
        };

        tracing::info!(
            "Comment {} created on blog {} by user {}",
            persisted.value.id,
            blog.id,
            req.author_id
        );

        // 3. Counters and notifications, best effort
        self.dispatcher.dispatch(persisted.event_id).await;

        Ok(persisted.value)
    }

    /// Only the comment's author or the blog's author may delete.
    pub async fn delete_comment(
        &self,
        comment_id: CommentId,
        caller_id: UserId,
    ) -> Result<Cascade, AppError> {
        // 1. Authorize
        let node = self
            .tree
            .find(comment_id)
            .await?
            .ok_or(AppError::NotFound("Comment not found".to_string()))?;

        if caller_id != node.author_id && caller_id != node.blog_author_id {
            return Err(AppError::Forbidden(
                "You can not delete this comment".to_string(),
            ));
        }

        // 2. Cascade
        let persisted = self.tree.delete_recursive(comment_id).await?;

        tracing::info!(
            "Comment {} deleted by user {} ({} nodes removed)",
            comment_id,
            caller_id,
            persisted.value.removed.len()
        );

        // 3. Notification cleanup and counters, best effort
        self.dispatcher.dispatch(persisted.event_id).await;

        Ok(persisted.value)
    }

    pub async fn list_comments(
        &self,
        blog_id: BlogId,
        skip: i64,
    ) -> Result<Vec<CommentResponse>, AppError> {
        if !self.blogs.blog_exists(blog_id).await? {
            return Err(AppError::NotFound("Blog not found".to_string()));
        }

        let nodes = self
            .tree
            .list_top_level(blog_id, skip, COMMENT_PAGE_SIZE)
            .await?;
        self.with_authors(nodes).await
    }

    pub async fn list_replies(
        &self,
        comment_id: CommentId,
        skip: i64,
    ) -> Result<Vec<CommentResponse>, AppError> {
        let nodes = self
            .tree
            .list_replies(comment_id, skip, COMMENT_PAGE_SIZE)
            .await?;
        self.with_authors(nodes).await
    }

    /// Attaches author info; an author missing from the directory shows as `None`.
    async fn with_authors(&self, nodes: Vec<CommentNode>) -> Result<Vec<CommentResponse>, AppError> {
        let mut authors: HashMap<UserId, Option<AuthorSummary>> = HashMap::new();
        for node in &nodes {
            if !authors.contains_key(&node.author_id) {
                let summary = self
                    .accounts
                    .find_account(node.author_id)
                    .await?
                    .map(|account| AuthorSummary {
                        id: account.id,
                        username: account.username,
                    });
                authors.insert(node.author_id, summary);
            }
        }

        Ok(nodes
            .into_iter()
            .map(|node| {
                let author = authors.get(&node.author_id).cloned().flatten();
                CommentResponse::new(node, author)
            })
            .collect())
    }
}
