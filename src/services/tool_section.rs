//! Tool section service
//!
//! Editorial copy shown beneath each tool page. Sections are keyed by the
//! tool's slug and kept in `position` order.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{ContentFilter, ToolSectionRepository};
use crate::models::{
    ContentStatus, CreateToolSectionInput, Lifecycle, ListParams, PagedResult, ToolSection,
    UpdateToolSectionInput,
};
use crate::services::content::{validate_content, validate_title, ContentError};
use crate::services::markdown::MarkdownRenderer;
use crate::tools::registry;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const SECTIONS_CACHE_TTL_SECS: u64 = 1800;
const CACHE_KEY_SECTIONS: &str = "sections:tool:";

pub struct ToolSectionService {
    repo: Arc<dyn ToolSectionRepository>,
    cache: Arc<Cache>,
    markdown: MarkdownRenderer,
}

impl ToolSectionService {
    pub fn new(repo: Arc<dyn ToolSectionRepository>, cache: Arc<Cache>, markdown: MarkdownRenderer) -> Self {
        Self { repo, cache, markdown }
    }

    fn validate_tool_slug(tool_slug: &str) -> Result<String, ContentError> {
        let slug = tool_slug.trim().to_lowercase();
        if !registry::is_known(&slug) {
            return Err(ContentError::Validation(format!("Unknown tool: {}", tool_slug)));
        }
        Ok(slug)
    }

    /// New sections go to the end of the tool's list unless a position is given
    pub async fn create(&self, input: CreateToolSectionInput) -> Result<ToolSection, ContentError> {
        let tool_slug = Self::validate_tool_slug(&input.tool_slug)?;
        validate_title(&input.title)?;
        validate_content(&input.content)?;

        let lifecycle = Lifecycle::draft().transition(
            input.status.unwrap_or_default(),
            input.scheduled_at,
            Utc::now(),
        )?;

        let position = match input.position {
            Some(p) => p.max(0),
            None => self
                .repo
                .next_position(&tool_slug)
                .await
                .context("Failed to compute section position")?,
        };

        let content_html = self.markdown.render(&input.content);
        let mut section = ToolSection::new(
            tool_slug,
            input.title.trim().to_string(),
            input.content,
            content_html,
        );
        section.position = position;
        section.lifecycle = lifecycle;

        let section = self
            .repo
            .create(&section)
            .await
            .context("Failed to create tool section")?;
        tracing::info!(id = section.id, tool = %section.tool_slug, "Tool section created");

        self.invalidate_cache(&section.tool_slug).await;
        Ok(section)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<ToolSection, ContentError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tool section")?
            .ok_or_else(|| ContentError::not_found("Tool section", id))
    }

    /// Published sections for a tool page, cached per tool
    pub async fn list_published_for_tool(&self, tool_slug: &str) -> Result<Vec<ToolSection>, ContentError> {
        let cache_key = format!("{}{}", CACHE_KEY_SECTIONS, tool_slug);
        if let Some(sections) = self.cache.get::<Vec<ToolSection>>(&cache_key).await.ok().flatten() {
            return Ok(sections);
        }

        let sections = self
            .repo
            .list_for_tool(tool_slug, true)
            .await
            .context("Failed to list tool sections")?;

        let _ = self
            .cache
            .set(&cache_key, &sections, Duration::from_secs(SECTIONS_CACHE_TTL_SECS))
            .await;
        Ok(sections)
    }

    /// Every section of a tool, drafts included
    pub async fn list_for_tool(&self, tool_slug: &str) -> Result<Vec<ToolSection>, ContentError> {
        Ok(self
            .repo
            .list_for_tool(tool_slug, false)
            .await
            .context("Failed to list tool sections")?)
    }

    pub async fn list(
        &self,
        filter: &ContentFilter,
        params: &ListParams,
    ) -> Result<PagedResult<ToolSection>, ContentError> {
        let (items, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list tool sections")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn update(&self, id: i64, input: UpdateToolSectionInput) -> Result<ToolSection, ContentError> {
        let mut section = self.get_by_id(id).await?;
        let old_tool = section.tool_slug.clone();

        if let Some(tool_slug) = input.tool_slug {
            section.tool_slug = Self::validate_tool_slug(&tool_slug)?;
        }
        if let Some(title) = input.title {
            validate_title(&title)?;
            section.title = title.trim().to_string();
        }
        if let Some(content) = input.content {
            validate_content(&content)?;
            section.content_html = self.markdown.render(&content);
            section.content = content;
        }
        if let Some(position) = input.position {
            section.position = position.max(0);
        }

        let section = self
            .repo
            .update(&section)
            .await
            .context("Failed to update tool section")?;

        self.invalidate_cache(&old_tool).await;
        if old_tool != section.tool_slug {
            self.invalidate_cache(&section.tool_slug).await;
        }
        Ok(section)
    }

    pub async fn set_status(
        &self,
        id: i64,
        status: ContentStatus,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<ToolSection, ContentError> {
        let mut section = self.get_by_id(id).await?;
        section.lifecycle = section.lifecycle.transition(status, scheduled_at, Utc::now())?;

        self.repo
            .set_lifecycle(id, &section.lifecycle)
            .await
            .context("Failed to update tool section status")?;

        self.invalidate_cache(&section.tool_slug).await;
        Ok(section)
    }

    pub async fn publish_due(&self, now: DateTime<Utc>) -> Result<usize, ContentError> {
        let due = self
            .repo
            .list_due(now)
            .await
            .context("Failed to list due tool sections")?;
        let mut published = 0;

        for section in due.iter().filter(|s| s.lifecycle.is_due(now)) {
            self.repo
                .set_lifecycle(section.id, &section.lifecycle.publish_scheduled())
                .await
                .with_context(|| format!("Failed to publish scheduled section {}", section.id))?;
            self.invalidate_cache(&section.tool_slug).await;
            published += 1;
        }

        if published > 0 {
            tracing::info!(count = published, "Scheduled tool sections published");
        }
        Ok(published)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentError> {
        let section = self.get_by_id(id).await?;
        if !self.repo.delete(id).await.context("Failed to delete tool section")? {
            return Err(ContentError::not_found("Tool section", id));
        }
        self.invalidate_cache(&section.tool_slug).await;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, ContentError> {
        Ok(self.repo.count().await.context("Failed to count tool sections")?)
    }

    async fn invalidate_cache(&self, tool_slug: &str) {
        let _ = self
            .cache
            .delete(&format!("{}{}", CACHE_KEY_SECTIONS, tool_slug))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::SqlxToolSectionRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_service() -> ToolSectionService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        ToolSectionService::new(
            SqlxToolSectionRepository::boxed(pool),
            Arc::new(MemoryCache::new()),
            MarkdownRenderer::new(),
        )
    }

    fn input(tool: &str, title: &str) -> CreateToolSectionInput {
        CreateToolSectionInput {
            tool_slug: tool.to_string(),
            title: title.to_string(),
            content: format!("About {}", title),
            status: Some(ContentStatus::Published),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_positions_append() {
        let service = setup_service().await;
        let a = service.create(input("merge-pdf", "How it works")).await.unwrap();
        let b = service.create(input("merge-pdf", "FAQ")).await.unwrap();
        let c = service.create(input("split-pdf", "FAQ")).await.unwrap();
        assert_eq!((a.position, b.position, c.position), (0, 1, 0));

        let titles: Vec<_> = service
            .list_published_for_tool("merge-pdf")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["How it works", "FAQ"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_rejected() {
        let service = setup_service().await;
        let err = service.create(input("no-such-tool", "X")).await.unwrap_err();
        assert!(matches!(err, ContentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reorder_invalidates_cache() {
        let service = setup_service().await;
        let first = service.create(input("compress-pdf", "First")).await.unwrap();
        service.create(input("compress-pdf", "Second")).await.unwrap();
        assert_eq!(service.list_published_for_tool("compress-pdf").await.unwrap()[0].title, "First");

        service
            .update(
                first.id,
                UpdateToolSectionInput {
                    position: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(service.list_published_for_tool("compress-pdf").await.unwrap()[0].title, "Second");
    }

    #[tokio::test]
    async fn test_drafts_hidden_from_public_list() {
        let service = setup_service().await;
        let section = service.create(input("ocr-image", "Tips")).await.unwrap();
        service.set_status(section.id, ContentStatus::Draft, None).await.unwrap();

        assert!(service.list_published_for_tool("ocr-image").await.unwrap().is_empty());
        assert_eq!(service.list_for_tool("ocr-image").await.unwrap().len(), 1);

        service.delete(section.id).await.unwrap();
        assert_eq!(service.count().await.unwrap(), 0);
    }
}
