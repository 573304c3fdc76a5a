//! Blog service
//!
//! Business logic for blog posts:
//! - CRUD with validation and slug uniqueness
//! - Markdown rendering and excerpt generation
//! - Publication lifecycle (draft, scheduled, published)
//! - Cached public lookups, invalidated on every write

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{BlogPostRepository, ContentFilter};
use crate::models::{
    normalize_tags, BlogPost, ContentStatus, CreateBlogPostInput, Lifecycle, ListParams, PagedResult,
    UpdateBlogPostInput,
};
use crate::services::content::{
    resolve_slug, validate_content, validate_title, ContentError, EXCERPT_LENGTH,
};
use crate::services::markdown::MarkdownRenderer;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Cache TTL for a single published post
const POST_CACHE_TTL_SECS: u64 = 3600;

/// Lists refresh faster
const POST_LIST_CACHE_TTL_SECS: u64 = 300;

const CACHE_KEY_POST_BY_SLUG: &str = "blog:slug:";
const CACHE_KEY_POST_LIST: &str = "blog:list:";

pub struct BlogService {
    repo: Arc<dyn BlogPostRepository>,
    cache: Arc<Cache>,
    markdown: MarkdownRenderer,
}

impl BlogService {
    pub fn new(repo: Arc<dyn BlogPostRepository>, cache: Arc<Cache>, markdown: MarkdownRenderer) -> Self {
        Self { repo, cache, markdown }
    }

    /// Create a post. The slug is derived from the title when absent and the
    /// initial status defaults to draft.
    pub async fn create(&self, input: CreateBlogPostInput) -> Result<BlogPost, ContentError> {
        validate_title(&input.title)?;
        validate_content(&input.content)?;

        let slug = resolve_slug(input.slug.as_deref(), &input.title)?;
        if self
            .repo
            .exists_by_slug(&slug, None)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(ContentError::DuplicateSlug(slug));
        }

        let lifecycle = Lifecycle::draft().transition(
            input.status.unwrap_or_default(),
            input.scheduled_at,
            Utc::now(),
        )?;

        let content_html = self.markdown.render(&input.content);
        let mut post = BlogPost::new(slug, input.title.trim().to_string(), input.content, content_html);
        post.excerpt = non_empty(input.excerpt)
            .or_else(|| Some(MarkdownRenderer::excerpt(&post.content, EXCERPT_LENGTH)));
        post.cover_image = non_empty(input.cover_image);
        post.author = non_empty(input.author);
        post.tags = normalize_tags(&input.tags);
        post.meta_title = non_empty(input.meta_title);
        post.meta_description = non_empty(input.meta_description);
        post.lifecycle = lifecycle;

        let post = self.repo.create(&post).await.context("Failed to create blog post")?;
        tracing::info!(id = post.id, slug = %post.slug, status = %post.status(), "Blog post created");

        self.invalidate_cache(&post.slug).await;
        Ok(post)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<BlogPost, ContentError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get blog post")?
            .ok_or_else(|| ContentError::not_found("Blog post", id))
    }

    /// Published post by slug, served from the cache when possible
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, ContentError> {
        let cache_key = format!("{}{}", CACHE_KEY_POST_BY_SLUG, slug);
        if let Some(post) = self.cache.get::<BlogPost>(&cache_key).await.ok().flatten() {
            return Ok(Some(post));
        }

        let post = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get blog post by slug")?
            .filter(BlogPost::is_published);

        if let Some(ref p) = post {
            let _ = self
                .cache
                .set(&cache_key, p, Duration::from_secs(POST_CACHE_TTL_SECS))
                .await;
        }

        Ok(post)
    }

    /// Admin listing, any status, newest first
    pub async fn list(
        &self,
        filter: &ContentFilter,
        params: &ListParams,
    ) -> Result<PagedResult<BlogPost>, ContentError> {
        let (items, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list blog posts")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Public listing of published posts, optionally by tag
    pub async fn list_published(
        &self,
        tag: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<BlogPost>, ContentError> {
        let tag = tag.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
        let cache_key = format!(
            "{}{}:{}:{}",
            CACHE_KEY_POST_LIST,
            tag.as_deref().unwrap_or("*"),
            params.page,
            params.per_page
        );
        if let Some(result) = self
            .cache
            .get::<PagedResult<BlogPost>>(&cache_key)
            .await
            .ok()
            .flatten()
        {
            return Ok(result);
        }

        let filter = ContentFilter {
            tag,
            ..ContentFilter::published()
        };
        let result = self.list(&filter, params).await?;

        let _ = self
            .cache
            .set(&cache_key, &result, Duration::from_secs(POST_LIST_CACHE_TTL_SECS))
            .await;
        Ok(result)
    }

    pub async fn update(&self, id: i64, input: UpdateBlogPostInput) -> Result<BlogPost, ContentError> {
        let mut post = self.get_by_id(id).await?;
        if !input.has_changes() {
            return Ok(post);
        }
        let old_slug = post.slug.clone();

        if let Some(title) = input.title {
            validate_title(&title)?;
            post.title = title.trim().to_string();
        }

        if let Some(slug) = input.slug {
            let slug = resolve_slug(Some(&slug), &post.title)?;
            if slug != post.slug
                && self
                    .repo
                    .exists_by_slug(&slug, Some(id))
                    .await
                    .context("Failed to check slug uniqueness")?
            {
                return Err(ContentError::DuplicateSlug(slug));
            }
            post.slug = slug;
        }

        if let Some(content) = input.content {
            validate_content(&content)?;
            post.content_html = self.markdown.render(&content);
            post.content = content;
        }

        // An explicit empty string clears optional fields
        if let Some(excerpt) = input.excerpt {
            post.excerpt = non_empty(Some(excerpt));
        }
        if post.excerpt.is_none() {
            post.excerpt = Some(MarkdownRenderer::excerpt(&post.content, EXCERPT_LENGTH));
        }
        if let Some(cover) = input.cover_image {
            post.cover_image = non_empty(Some(cover));
        }
        if let Some(author) = input.author {
            post.author = non_empty(Some(author));
        }
        if let Some(tags) = input.tags {
            post.tags = normalize_tags(&tags);
        }
        if let Some(meta_title) = input.meta_title {
            post.meta_title = non_empty(Some(meta_title));
        }
        if let Some(meta_description) = input.meta_description {
            post.meta_description = non_empty(Some(meta_description));
        }

        let post = self.repo.update(&post).await.context("Failed to update blog post")?;

        self.invalidate_cache(&old_slug).await;
        if old_slug != post.slug {
            self.invalidate_cache(&post.slug).await;
        }
        Ok(post)
    }

    /// Move a post to `status`; `scheduled_at` is required for scheduling
    pub async fn set_status(
        &self,
        id: i64,
        status: ContentStatus,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<BlogPost, ContentError> {
        let mut post = self.get_by_id(id).await?;
        post.lifecycle = post.lifecycle.transition(status, scheduled_at, Utc::now())?;

        self.repo
            .set_lifecycle(id, &post.lifecycle)
            .await
            .context("Failed to update blog post status")?;
        tracing::info!(id, slug = %post.slug, status = %status, "Blog post status changed");

        self.invalidate_cache(&post.slug).await;
        Ok(post)
    }

    /// Publish every scheduled post whose time has come. Returns the count.
    pub async fn publish_due(&self, now: DateTime<Utc>) -> Result<usize, ContentError> {
        let due = self.repo.list_due(now).await.context("Failed to list due posts")?;
        let mut published = 0;

        for post in due.iter().filter(|p| p.lifecycle.is_due(now)) {
            self.repo
                .set_lifecycle(post.id, &post.lifecycle.publish_scheduled())
                .await
                .with_context(|| format!("Failed to publish scheduled post {}", post.id))?;
            tracing::info!(id = post.id, slug = %post.slug, "Scheduled post published");
            self.invalidate_cache(&post.slug).await;
            published += 1;
        }

        Ok(published)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentError> {
        let post = self.get_by_id(id).await?;
        if !self.repo.delete(id).await.context("Failed to delete blog post")? {
            return Err(ContentError::not_found("Blog post", id));
        }
        self.invalidate_cache(&post.slug).await;
        Ok(())
    }

    /// Count a public view and return the stored total. Failures are logged,
    /// never surfaced to readers.
    pub async fn record_view(&self, id: i64) -> Option<i64> {
        match self.repo.increment_views(id).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(id, "Failed to record post view: {:#}", e);
                None
            }
        }
    }

    pub async fn count_by_status(&self) -> Result<Vec<(ContentStatus, i64)>, ContentError> {
        Ok(self
            .repo
            .count_by_status()
            .await
            .context("Failed to count blog posts")?)
    }

    pub fn render_markdown(&self, content: &str) -> String {
        self.markdown.render(content)
    }

    async fn invalidate_cache(&self, slug: &str) {
        let _ = self
            .cache
            .delete(&format!("{}{}", CACHE_KEY_POST_BY_SLUG, slug))
            .await;
        let _ = self
            .cache
            .delete_pattern(&format!("{}*", CACHE_KEY_POST_LIST))
            .await;
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::SqlxBlogPostRepository;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration as ChronoDuration;

    async fn setup_service() -> BlogService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        BlogService::new(
            SqlxBlogPostRepository::boxed(pool),
            Arc::new(MemoryCache::new()),
            MarkdownRenderer::new(),
        )
    }

    #[tokio::test]
    async fn test_create_generates_slug_and_excerpt() {
        let service = setup_service().await;
        let post = service
            .create(CreateBlogPostInput::new("How to Merge PDFs", "Combine **several** files."))
            .await
            .unwrap();

        assert_eq!(post.slug, "how-to-merge-pdfs");
        assert_eq!(post.status(), ContentStatus::Draft);
        assert!(post.content_html.contains("<strong>several</strong>"));
        assert_eq!(post.excerpt.as_deref(), Some("Combine several files."));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = setup_service().await;

        let err = service.create(CreateBlogPostInput::new("  ", "body")).await.unwrap_err();
        assert!(matches!(err, ContentError::Validation(_)));

        let err = service.create(CreateBlogPostInput::new("Title", "\n")).await.unwrap_err();
        assert!(matches!(err, ContentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let service = setup_service().await;
        service.create(CreateBlogPostInput::new("Same", "a")).await.unwrap();

        let err = service.create(CreateBlogPostInput::new("Same", "b")).await.unwrap_err();
        assert!(matches!(err, ContentError::DuplicateSlug(ref s) if s == "same"));

        let other = service
            .create(CreateBlogPostInput::new("Other", "c"))
            .await
            .unwrap();
        let err = service
            .update(
                other.id,
                UpdateBlogPostInput {
                    slug: Some("same".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::DuplicateSlug(_)));
    }

    #[tokio::test]
    async fn test_schedule_in_past_rejected() {
        let service = setup_service().await;
        let input = CreateBlogPostInput::new("Later", "x").with_schedule(Utc::now() - ChronoDuration::hours(1));
        let err = service.create(input).await.unwrap_err();
        assert!(matches!(err, ContentError::Transition(_)));
    }

    #[tokio::test]
    async fn test_published_lookup_and_cache_invalidation() {
        let service = setup_service().await;
        let post = service
            .create(CreateBlogPostInput::new("Hidden", "x"))
            .await
            .unwrap();
        assert!(service.get_published_by_slug("hidden").await.unwrap().is_none());

        service
            .set_status(post.id, ContentStatus::Published, None)
            .await
            .unwrap();
        let found = service.get_published_by_slug("hidden").await.unwrap().unwrap();
        assert!(found.lifecycle.published_at.is_some());

        // Cached copy must not survive the status change
        service.set_status(post.id, ContentStatus::Draft, None).await.unwrap();
        assert!(service.get_published_by_slug("hidden").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_published_by_tag() {
        let service = setup_service().await;
        for (title, tags) in [("One", vec!["pdf"]), ("Two", vec!["image"]), ("Three", vec!["PDF", "ocr"])] {
            let input = CreateBlogPostInput::new(title, "x")
                .with_tags(tags.into_iter().map(String::from).collect())
                .with_status(ContentStatus::Published);
            service.create(input).await.unwrap();
        }
        service.create(CreateBlogPostInput::new("Draft", "x").with_tags(vec!["pdf".into()])).await.unwrap();

        let params = ListParams::new(1, 10);
        let all = service.list_published(None, &params).await.unwrap();
        assert_eq!(all.total, 3);

        let pdf = service.list_published(Some(" PDF "), &params).await.unwrap();
        assert_eq!(pdf.total, 2);
        assert!(pdf.items.iter().all(|p| p.tags.contains(&"pdf".to_string())));

        // New post shows up after list cache invalidation
        service
            .create(CreateBlogPostInput::new("Four", "x").with_status(ContentStatus::Published))
            .await
            .unwrap();
        assert_eq!(service.list_published(None, &params).await.unwrap().total, 4);
    }

    #[tokio::test]
    async fn test_publish_due() {
        let service = setup_service().await;
        let at = Utc::now() + ChronoDuration::minutes(5);
        let post = service
            .create(CreateBlogPostInput::new("Soon", "x").with_schedule(at))
            .await
            .unwrap();
        assert_eq!(post.status(), ContentStatus::Scheduled);

        assert_eq!(service.publish_due(Utc::now()).await.unwrap(), 0);
        assert_eq!(
            service.publish_due(Utc::now() + ChronoDuration::minutes(10)).await.unwrap(),
            1
        );

        let post = service.get_by_id(post.id).await.unwrap();
        assert_eq!(post.status(), ContentStatus::Published);
        assert_eq!(post.lifecycle.published_at.map(|t| t.timestamp()), Some(at.timestamp()));
        assert!(post.lifecycle.scheduled_at.is_none());
    }

    #[tokio::test]
    async fn test_update_rerenders_and_clears_fields() {
        let service = setup_service().await;
        let mut input = CreateBlogPostInput::new("Edit me", "old");
        input.author = Some("Asha".into());
        let post = service.create(input).await.unwrap();

        let updated = service
            .update(
                post.id,
                UpdateBlogPostInput {
                    content: Some("# New".into()),
                    author: Some("".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.content_html.contains("<h1>New</h1>"));
        assert!(updated.author.is_none());
        assert_eq!(updated.slug, "edit-me");
    }

    #[tokio::test]
    async fn test_views_and_delete() {
        let service = setup_service().await;
        let post = service.create(CreateBlogPostInput::new("Counted", "x")).await.unwrap();
        assert_eq!(service.record_view(post.id).await, Some(1));
        assert_eq!(service.record_view(post.id).await, Some(2));
        assert_eq!(service.get_by_id(post.id).await.unwrap().view_count, 2);

        service.delete(post.id).await.unwrap();
        assert!(matches!(service.get_by_id(post.id).await, Err(ContentError::NotFound(_))));
        assert!(matches!(service.delete(post.id).await, Err(ContentError::NotFound(_))));
    }
}
