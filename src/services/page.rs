//! Page service

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{ContentFilter, PageRepository};
use crate::models::{
    ContentStatus, CreatePageInput, Lifecycle, ListParams, Page, PagedResult, UpdatePageInput,
};
use crate::services::blog::non_empty;
use crate::services::content::{resolve_slug, validate_content, validate_title, ContentError};
use crate::services::markdown::MarkdownRenderer;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const PAGE_CACHE_TTL_SECS: u64 = 3600;
const CACHE_KEY_PAGE_BY_SLUG: &str = "page:slug:";

pub struct PageService {
    repo: Arc<dyn PageRepository>,
    cache: Arc<Cache>,
    markdown: MarkdownRenderer,
}

impl PageService {
    pub fn new(repo: Arc<dyn PageRepository>, cache: Arc<Cache>, markdown: MarkdownRenderer) -> Self {
        Self { repo, cache, markdown }
    }

    pub async fn create(&self, input: CreatePageInput) -> Result<Page, ContentError> {
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
        let mut page = Page::new(slug, input.title.trim().to_string(), input.content, content_html);
        page.meta_title = non_empty(input.meta_title);
        page.meta_description = non_empty(input.meta_description);
        page.lifecycle = lifecycle;

        let page = self.repo.create(&page).await.context("Failed to create page")?;
        tracing::info!(id = page.id, slug = %page.slug, "Page created");
        self.invalidate_cache(&page.slug).await;
        Ok(page)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Page, ContentError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get page")?
            .ok_or_else(|| ContentError::not_found("Page", id))
    }

    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Option<Page>, ContentError> {
        let cache_key = format!("{}{}", CACHE_KEY_PAGE_BY_SLUG, slug);
        if let Some(page) = self.cache.get::<Page>(&cache_key).await.ok().flatten() {
            return Ok(Some(page));
        }

        let page = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get page by slug")?
            .filter(|p| p.lifecycle.is_published());

        if let Some(ref p) = page {
            let _ = self
                .cache
                .set(&cache_key, p, Duration::from_secs(PAGE_CACHE_TTL_SECS))
                .await;
        }
        Ok(page)
    }

    pub async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<PagedResult<Page>, ContentError> {
        let (items, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list pages")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn update(&self, id: i64, input: UpdatePageInput) -> Result<Page, ContentError> {
        let mut page = self.get_by_id(id).await?;
        let old_slug = page.slug.clone();

        if let Some(title) = input.title {
            validate_title(&title)?;
            page.title = title.trim().to_string();
        }

        if let Some(slug) = input.slug {
            let slug = resolve_slug(Some(&slug), &page.title)?;
            if slug != page.slug
                && self
                    .repo
                    .exists_by_slug(&slug, Some(id))
                    .await
                    .context("Failed to check slug uniqueness")?
            {
                return Err(ContentError::DuplicateSlug(slug));
            }
            page.slug = slug;
        }

        if let Some(content) = input.content {
            validate_content(&content)?;
            page.content_html = self.markdown.render(&content);
            page.content = content;
        }

        if let Some(meta_title) = input.meta_title {
            page.meta_title = non_empty(Some(meta_title));
        }
        if let Some(meta_description) = input.meta_description {
            page.meta_description = non_empty(Some(meta_description));
        }

        let page = self.repo.update(&page).await.context("Failed to update page")?;
        self.invalidate_cache(&old_slug).await;
        self.invalidate_cache(&page.slug).await;
        Ok(page)
    }

    pub async fn set_status(
        &self,
        id: i64,
        status: ContentStatus,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Page, ContentError> {
        let mut page = self.get_by_id(id).await?;
        page.lifecycle = page.lifecycle.transition(status, scheduled_at, Utc::now())?;

        self.repo
            .set_lifecycle(id, &page.lifecycle)
            .await
            .context("Failed to update page status")?;
        tracing::info!(id, slug = %page.slug, status = %status, "Page status changed");

        self.invalidate_cache(&page.slug).await;
        Ok(page)
    }

    pub async fn publish_due(&self, now: DateTime<Utc>) -> Result<usize, ContentError> {
        let due = self.repo.list_due(now).await.context("Failed to list due pages")?;
        let mut published = 0;

        for page in due.iter().filter(|p| p.lifecycle.is_due(now)) {
            self.repo
                .set_lifecycle(page.id, &page.lifecycle.publish_scheduled())
                .await
                .with_context(|| format!("Failed to publish scheduled page {}", page.id))?;
            self.invalidate_cache(&page.slug).await;
            published += 1;
        }

        if published > 0 {
            tracing::info!(count = published, "Scheduled pages published");
        }
        Ok(published)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentError> {
        let page = self.get_by_id(id).await?;
        if !self.repo.delete(id).await.context("Failed to delete page")? {
            return Err(ContentError::not_found("Page", id));
        }
        self.invalidate_cache(&page.slug).await;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, ContentError> {
        Ok(self.repo.count().await.context("Failed to count pages")?)
    }

    async fn invalidate_cache(&self, slug: &str) {
        let _ = self
            .cache
            .delete(&format!("{}{}", CACHE_KEY_PAGE_BY_SLUG, slug))
            .await;
    }
}
