// src/services/tree.rs

use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        comment::{Cascade, CommentNode, MAX_COMMENT_LEN, NewComment},
        identity::{BlogId, CommentId, NotificationId, UserId},
    },
    store::{CommentRepository, Persisted},
    utils::html::visible_text,
};

/// Trims a comment body and rejects it if it is empty, markup only, or too long.
///
/// The trimmed text is returned unchanged: no escaping happens here.
pub fn prepare_body(raw: &str) -> Result<String, AppError> {
    let body = raw.trim();

    if body.is_empty() || visible_text(body).trim().is_empty() {
        return Err(AppError::BadRequest("Comment can't be empty".to_string()));
    }
    if body.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_LEN
        )));
    }

    Ok(body.to_string())
}

/// Comment Tree Store: node creation, listing and cascading deletion.
#[derive(Clone)]
pub struct CommentTree {
    repo: Arc<dyn CommentRepository>,
}

impl CommentTree {
    pub fn new(repo: Arc<dyn CommentRepository>) -> Self {
        Self { repo }
    }

    pub async fn create_top_level(
        &self,
        blog_id: BlogId,
        blog_author_id: UserId,
        author_id: UserId,
        body: &str,
    ) -> Result<Persisted<CommentNode>, AppError> {
        let body = prepare_body(body)?;

        let persisted = self
            .repo
            .insert_comment(NewComment {
                blog_id,
                blog_author_id,
                author_id,
                body,
                parent_comment_id: None,
                in_flight_notification_id: None,
            })
            .await?;

        Ok(persisted)
    }

    /// Fails with `NotFound` unless `parent_comment_id` lives in `blog_id`.
    pub async fn create_reply(
        &self,
        blog_id: BlogId,
        blog_author_id: UserId,
        author_id: UserId,
        body: &str,
        parent_comment_id: CommentId,
        in_flight_notification_id: Option<NotificationId>,
    ) -> Result<Persisted<CommentNode>, AppError> {
        let body = prepare_body(body)?;

        let persisted = self
            .repo
            .insert_comment(NewComment {
                blog_id,
                blog_author_id,
                author_id,
                body,
                parent_comment_id: Some(parent_comment_id),
                in_flight_notification_id,
            })
            .await?;

        Ok(persisted)
    }

    pub async fn find(&self, id: CommentId) -> Result<Option<CommentNode>, AppError> {
        Ok(self.repo.find_comment(id).await?)
    }

    pub async fn list_top_level(
        &self,
        blog_id: BlogId,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<CommentNode>, AppError> {
        Ok(self.repo.list_top_level(blog_id, skip.max(0), limit).await?)
    }

    pub async fn list_replies(
        &self,
        parent_comment_id: CommentId,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<CommentNode>, AppError> {
        if self.repo.find_comment(parent_comment_id).await?.is_none() {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }

        Ok(self
            .repo
            .list_children(parent_comment_id, skip.max(0), limit)
            .await?)
    }

    /// Every descendant is gone once this returns; the removed nodes come back
    /// so their counters and notifications can be cleaned up.
    pub async fn delete_recursive(&self, id: CommentId) -> Result<Persisted<Cascade>, AppError> {
        Ok(self.repo.delete_subtree(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_markup_only_bodies_are_rejected() {
        assert!(matches!(prepare_body(""), Err(AppError::BadRequest(_))));
        assert!(matches!(prepare_body("   \n"), Err(AppError::BadRequest(_))));
        assert!(matches!(
            prepare_body("<script>alert(1)</script>"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn plain_text_survives() {
        assert_eq!(prepare_body("  nice post ").unwrap(), "nice post");
    }

    #[test]
    fn overlong_body_is_rejected() {
        let body = "a".repeat(MAX_COMMENT_LEN + 1);
        assert!(matches!(prepare_body(&body), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn special_characters_are_kept_verbatim() {
        assert_eq!(prepare_body(" Tom & Jerry: 1 < 2 ").unwrap(), "Tom & Jerry: 1 < 2");
        assert_eq!(prepare_body("<b>bold</b>").unwrap(), "<b>bold</b>");
    }

    #[test]
    fn length_is_measured_on_the_text_as_sent() {
        let ampersands = "&".repeat(300);
        assert_eq!(prepare_body(&ampersands).unwrap(), ampersands);

        let at_limit = "<".repeat(MAX_COMMENT_LEN);
        assert_eq!(prepare_body(&at_limit).unwrap().chars().count(), MAX_COMMENT_LEN);
    }
}
