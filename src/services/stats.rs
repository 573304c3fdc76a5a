//! Dashboard statistics
//!
//! Content counts for the superadmin dashboard, tool usage reports and
//! process/system figures. Request counters are kept lock-free and fed by
//! the request stats middleware.

use crate::db::repositories::{
    BlogPostRepository, CommentRepository, PageRepository, SubscriberRepository, ToolSectionRepository,
    ToolUsage, ToolUsageRepository,
};
use crate::models::{CommentStatus, ContentStatus, SubscriberStatus};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{Pid, System};

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest usage report window
pub const MAX_USAGE_DAYS: u32 = 365;

/// Request counters shared with the middleware
pub struct RequestStats {
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    /// Microseconds, for the average
    total_response_time_us: AtomicU64,
    tool_runs: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            tool_runs: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record(&self, duration_us: u64, server_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us.fetch_add(duration_us, Ordering::Relaxed);
        if server_error {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_tool_run(&self) {
        self.tool_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    pub fn tool_runs(&self) -> u64 {
        self.tool_runs.load(Ordering::Relaxed)
    }

    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.total_response_time_us.load(Ordering::Relaxed) as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusCounts {
    pub draft: i64,
    pub scheduled: i64,
    pub published: i64,
}

impl StatusCounts {
    fn from_pairs(pairs: &[(ContentStatus, i64)]) -> Self {
        let mut counts = Self::default();
        for (status, n) in pairs {
            match status {
                ContentStatus::Draft => counts.draft += n,
                ContentStatus::Scheduled => counts.scheduled += n,
                ContentStatus::Published => counts.published += n,
            }
        }
        counts
    }

    pub fn total(&self) -> i64 {
        self.draft + self.scheduled + self.published
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub posts: StatusCounts,
    pub pages: i64,
    pub tool_sections: i64,
    pub pending_comments: i64,
    pub total_comments: i64,
    pub subscribers: i64,
    pub unsubscribed: i64,
    /// Tool runs over the last 30 days
    pub tool_runs_30d: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyUsage {
    pub day: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub days: u32,
    pub since: NaiveDate,
    pub total: i64,
    pub tools: Vec<ToolUsage>,
    pub daily: Vec<DailyUsage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub version: String,
    pub memory_bytes: u64,
    pub memory_formatted: String,
    pub system_total_memory: u64,
    pub system_used_memory: u64,
    pub os_name: String,
    pub uptime_seconds: u64,
    pub uptime_formatted: String,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub tool_runs: u64,
    pub avg_response_time_ms: f64,
}

pub struct StatsService {
    posts: Arc<dyn BlogPostRepository>,
    pages: Arc<dyn PageRepository>,
    sections: Arc<dyn ToolSectionRepository>,
    comments: Arc<dyn CommentRepository>,
    subscribers: Arc<dyn SubscriberRepository>,
    usage: Arc<dyn ToolUsageRepository>,
    requests: Arc<RequestStats>,
}

impl StatsService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        posts: Arc<dyn BlogPostRepository>,
        pages: Arc<dyn PageRepository>,
        sections: Arc<dyn ToolSectionRepository>,
        comments: Arc<dyn CommentRepository>,
        subscribers: Arc<dyn SubscriberRepository>,
        usage: Arc<dyn ToolUsageRepository>,
        requests: Arc<RequestStats>,
    ) -> Self {
        Self {
            posts,
            pages,
            sections,
            comments,
            subscribers,
            usage,
            requests,
        }
    }

    pub fn requests(&self) -> &RequestStats {
        &self.requests
    }

    pub async fn dashboard(&self) -> Result<DashboardStats> {
        let posts = StatusCounts::from_pairs(&self.posts.count_by_status().await?);
        let pages = self.pages.count().await?;
        let tool_sections = self.sections.count().await?;

        let comment_counts = self.comments.count_by_status().await?;
        let pending_comments = count_of(&comment_counts, CommentStatus::Pending);
        let total_comments = comment_counts.iter().map(|(_, n)| n).sum();

        let subscriber_counts = self.subscribers.count_by_status().await?;
        let subscribers = count_of(&subscriber_counts, SubscriberStatus::Subscribed);
        let unsubscribed = count_of(&subscriber_counts, SubscriberStatus::Unsubscribed);

        let since = Utc::now().date_naive() - Duration::days(29);
        let tool_runs_30d = self
            .usage
            .totals_since(since)
            .await?
            .iter()
            .map(|u| u.count)
            .sum();

        Ok(DashboardStats {
            posts,
            pages,
            tool_sections,
            pending_comments,
            total_comments,
            subscribers,
            unsubscribed,
            tool_runs_30d,
        })
    }

    /// Count one successful run of a tool for today
    pub async fn record_tool_use(&self, tool_slug: &str) -> Result<()> {
        self.requests.record_tool_run();
        self.usage
            .increment(tool_slug, Utc::now().date_naive())
            .await
            .with_context(|| format!("Failed to record usage of {}", tool_slug))
    }

    /// Usage over the last `days` days including today
    pub async fn tool_usage(&self, days: u32) -> Result<UsageReport> {
        let days = days.clamp(1, MAX_USAGE_DAYS);
        let since = Utc::now().date_naive() - Duration::days(i64::from(days) - 1);

        let tools = self.usage.totals_since(since).await?;
        let daily = self
            .usage
            .daily_since(since)
            .await?
            .into_iter()
            .map(|(day, count)| DailyUsage { day, count })
            .collect();

        Ok(UsageReport {
            days,
            since,
            total: tools.iter().map(|t| t.count).sum(),
            tools,
            daily,
        })
    }

    /// Process and host figures
    pub fn system(&self) -> SystemStats {
        let mut sys = System::new_all();
        sys.refresh_all();

        let memory_bytes = sys
            .process(Pid::from_u32(process::id()))
            .map(|p| p.memory())
            .unwrap_or(0);
        let uptime_seconds = self.requests.uptime_seconds();

        SystemStats {
            version: APP_VERSION.to_string(),
            memory_bytes,
            memory_formatted: format_bytes(memory_bytes),
            system_total_memory: sys.total_memory(),
            system_used_memory: sys.used_memory(),
            os_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
            uptime_seconds,
            uptime_formatted: format_uptime(uptime_seconds),
            total_requests: self.requests.total_requests(),
            failed_requests: self.requests.failed_requests(),
            tool_runs: self.requests.tool_runs(),
            avg_response_time_ms: self.requests.avg_response_time_us() / 1000.0,
        }
    }
}

fn count_of<S: PartialEq>(pairs: &[(S, i64)], status: S) -> i64 {
    pairs
        .iter()
        .filter(|(s, _)| *s == status)
        .map(|(_, n)| *n)
        .sum()
}

pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
