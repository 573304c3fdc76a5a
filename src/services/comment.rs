//! Comment service
//!
//! Reader comments on published blog posts. New comments are held for
//! moderation unless the site settings enable auto-approval.

use crate::db::repositories::{BlogPostRepository, CommentRepository};
use crate::models::{
    Comment, CommentStatus, CommentThread, CreateCommentInput, ListParams, PagedResult,
};
use crate::services::content::ContentError;
use crate::store::{JsonStore, SiteSettings};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

pub const MAX_COMMENT_LENGTH: usize = 5000;
pub const MAX_AUTHOR_NAME_LENGTH: usize = 100;
const MAX_EMAIL_LENGTH: usize = 254;

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    posts: Arc<dyn BlogPostRepository>,
    site: Arc<JsonStore<SiteSettings>>,
}

impl CommentService {
    pub fn new(
        repo: Arc<dyn CommentRepository>,
        posts: Arc<dyn BlogPostRepository>,
        site: Arc<JsonStore<SiteSettings>>,
    ) -> Self {
        Self { repo, posts, site }
    }

    /// Submit a comment on a published post.
    ///
    /// Replies must point at a comment on the same post.
    pub async fn create(
        &self,
        input: CreateCommentInput,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Comment, ContentError> {
        let settings = self.site.get().await;
        if !settings.comments_enabled {
            return Err(ContentError::Disabled("Comments are disabled".to_string()));
        }

        let author_name = input.author_name.trim().to_string();
        let author_email = input.author_email.trim().to_lowercase();
        let content = input.content.trim().to_string();
        validate_comment(&author_name, &author_email, &content)?;

        let post = self
            .posts
            .get_by_id(input.post_id)
            .await
            .context("Failed to load post for comment")?
            .filter(|p| p.is_published())
            .ok_or_else(|| ContentError::not_found("Blog post", input.post_id))?;

        if let Some(parent_id) = input.parent_id {
            let parent = self
                .repo
                .get_by_id(parent_id)
                .await
                .context("Failed to load parent comment")?;
            if parent.map(|p| p.post_id) != Some(post.id) {
                return Err(ContentError::Validation(
                    "Parent comment does not belong to this post".to_string(),
                ));
            }
        }

        let status = if settings.comments_auto_approve {
            CommentStatus::Approved
        } else {
            CommentStatus::Pending
        };

        let comment = Comment {
            id: 0,
            post_id: post.id,
            parent_id: input.parent_id,
            author_name,
            author_email,
            content,
            status,
            ip_address: ip,
            user_agent: user_agent.map(|ua| ua.chars().take(255).collect()),
            created_at: Utc::now(),
        };

        let comment = self.repo.create(&comment).await.context("Failed to create comment")?;
        tracing::info!(id = comment.id, post_id = post.id, status = %comment.status, "Comment submitted");
        Ok(comment)
    }

    /// Approved comments of a post as reply trees, oldest first
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentThread>, ContentError> {
        let comments = self
            .repo
            .list_for_post(post_id, Some(CommentStatus::Approved))
            .await
            .context("Failed to list comments")?;
        Ok(CommentThread::build_tree(&comments))
    }

    /// Moderation queue / admin listing, newest first
    pub async fn list(
        &self,
        status: Option<CommentStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, ContentError> {
        let (items, total) = self
            .repo
            .list(status, params)
            .await
            .context("Failed to list comments")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn moderate(&self, id: i64, status: CommentStatus) -> Result<Comment, ContentError> {
        if !self
            .repo
            .set_status(id, status)
            .await
            .context("Failed to update comment status")?
        {
            return Err(ContentError::not_found("Comment", id));
        }
        tracing::info!(id, status = %status, "Comment moderated");

        self.repo
            .get_by_id(id)
            .await
            .context("Failed to reload comment")?
            .ok_or_else(|| ContentError::not_found("Comment", id))
    }

    /// Deleting a comment removes its replies too
    pub async fn delete(&self, id: i64) -> Result<(), ContentError> {
        if !self.repo.delete(id).await.context("Failed to delete comment")? {
            return Err(ContentError::not_found("Comment", id));
        }
        Ok(())
    }

    pub async fn count_by_status(&self) -> Result<Vec<(CommentStatus, i64)>, ContentError> {
        Ok(self
            .repo
            .count_by_status()
            .await
            .context("Failed to count comments")?)
    }
}

fn validate_comment(name: &str, email: &str, content: &str) -> Result<(), ContentError> {
    if name.is_empty() {
        return Err(ContentError::Validation("Name is required".to_string()));
    }
    if name.chars().count() > MAX_AUTHOR_NAME_LENGTH {
        return Err(ContentError::Validation(format!(
            "Name must be at most {} characters",
            MAX_AUTHOR_NAME_LENGTH
        )));
    }
    if !is_valid_email(email) {
        return Err(ContentError::Validation("A valid email is required".to_string()));
    }
    if content.is_empty() {
        return Err(ContentError::Validation("Comment cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(ContentError::Validation(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_LENGTH
        )));
    }
    Ok(())
}

/// Loose structural check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}
