//! Background maintenance
//!
//! One interval task publishes scheduled content whose time has come,
//! removes expired sessions and prunes the login rate limiter.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::services::{BlogService, LoginRateLimiter, PageService, ToolSectionService, UserService};

#[derive(Clone)]
pub struct Scheduler {
    blog: Arc<BlogService>,
    pages: Arc<PageService>,
    sections: Arc<ToolSectionService>,
    users: Arc<UserService>,
    limiter: Arc<LoginRateLimiter>,
}

/// What one tick did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub posts_published: usize,
    pub pages_published: usize,
    pub sections_published: usize,
    pub sessions_removed: i64,
}

impl TickReport {
    pub fn published(&self) -> usize {
        self.posts_published + self.pages_published + self.sections_published
    }
}

impl Scheduler {
    pub fn new(
        blog: Arc<BlogService>,
        pages: Arc<PageService>,
        sections: Arc<ToolSectionService>,
        users: Arc<UserService>,
        limiter: Arc<LoginRateLimiter>,
    ) -> Self {
        Self {
            blog,
            pages,
            sections,
            users,
            limiter,
        }
    }

    /// Run every job once. A failing job is logged and does not stop the others.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        match self.blog.publish_due(now).await {
            Ok(n) => report.posts_published = n,
            Err(e) => tracing::error!("Failed to publish scheduled posts: {}", e),
        }
        match self.pages.publish_due(now).await {
            Ok(n) => report.pages_published = n,
            Err(e) => tracing::error!("Failed to publish scheduled pages: {}", e),
        }
        match self.sections.publish_due(now).await {
            Ok(n) => report.sections_published = n,
            Err(e) => tracing::error!("Failed to publish scheduled tool sections: {}", e),
        }
        match self.users.cleanup_expired_sessions().await {
            Ok(n) => report.sessions_removed = n,
            Err(e) => tracing::error!("Failed to clean up sessions: {}", e),
        }
        self.limiter.cleanup().await;

        if report.published() > 0 || report.sessions_removed > 0 {
            tracing::info!(
                posts = report.posts_published,
                pages = report.pages_published,
                sections = report.sections_published,
                sessions = report.sessions_removed,
                "Scheduler tick"
            );
        }
        report
    }

    /// Spawn the interval loop. The first tick runs immediately.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.tick(Utc::now()).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::{
        SqlxBlogPostRepository, SqlxPageRepository, SqlxSessionRepository, SqlxToolSectionRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ContentStatus, CreateBlogPostInput, CreatePageInput};
    use crate::services::MarkdownRenderer;

    async fn setup() -> (Scheduler, Arc<BlogService>, Arc<PageService>) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let cache = create_cache(&CacheConfig::default());
        let markdown = MarkdownRenderer::new();
        let limiter = Arc::new(LoginRateLimiter::new());

        let blog = Arc::new(BlogService::new(
            SqlxBlogPostRepository::boxed(pool.clone()),
            cache.clone(),
            markdown.clone(),
        ));
        let pages = Arc::new(PageService::new(
            SqlxPageRepository::boxed(pool.clone()),
            cache.clone(),
            markdown.clone(),
        ));
        let sections = Arc::new(ToolSectionService::new(
            SqlxToolSectionRepository::boxed(pool.clone()),
            cache,
            markdown,
        ));
        let users = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            limiter.clone(),
        ));

        let scheduler = Scheduler::new(blog.clone(), pages.clone(), sections, users, limiter);
        (scheduler, blog, pages)
    }

    #[tokio::test]
    async fn test_tick_publishes_due_content() {
        let (scheduler, blog, pages) = setup().await;
        let at = Utc::now() + chrono::Duration::hours(1);

        let post = blog
            .create(CreateBlogPostInput::new("Merging PDFs", "Body").with_schedule(at))
            .await
            .unwrap();
        let page = pages
            .create(CreatePageInput {
                title: "About".into(),
                content: "About us".into(),
                status: Some(ContentStatus::Scheduled),
                scheduled_at: Some(at),
                ..Default::default()
            })
            .await
            .unwrap();

        // Not due yet
        let report = scheduler.tick(Utc::now()).await;
        assert_eq!(report.published(), 0);

        let report = scheduler.tick(at + chrono::Duration::minutes(1)).await;
        assert_eq!(report.posts_published, 1);
        assert_eq!(report.pages_published, 1);

        assert_eq!(blog.get_by_id(post.id).await.unwrap().status(), ContentStatus::Published);
        assert_eq!(pages.get_by_id(page.id).await.unwrap().status(), ContentStatus::Published);

        // Nothing left to do
        let report = scheduler.tick(at + chrono::Duration::minutes(2)).await;
        assert_eq!(report.published(), 0);
    }
}
