//! Publication lifecycle shared by blog posts, pages and tool sections,
//! plus pagination types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CMS publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Draft,
    Scheduled,
    Published,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "published" => Ok(Self::Published),
            _ => Err(anyhow::anyhow!("Invalid content status: {}", s)),
        }
    }
}

/// Rejected status change
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("scheduled_at is required to schedule content")]
    MissingSchedule,
    #[error("scheduled_at must be in the future")]
    ScheduleInPast,
}

/// Status plus the timestamps that go with it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lifecycle {
    pub status: ContentStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    pub fn draft() -> Self {
        Self::default()
    }

    /// Compute the lifecycle after moving to `target`.
    ///
    /// - Draft clears the schedule and keeps any earlier publish date.
    /// - Scheduled needs a `scheduled_at` strictly after `now`.
    /// - Published clears the schedule; `published_at` is set to `now` unless
    ///   the content was published before.
    pub fn transition(
        &self,
        target: ContentStatus,
        scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        match target {
            ContentStatus::Draft => Ok(Self {
                status: ContentStatus::Draft,
                scheduled_at: None,
                published_at: self.published_at,
            }),
            ContentStatus::Scheduled => {
                let at = scheduled_at.ok_or(TransitionError::MissingSchedule)?;
                if at <= now {
                    return Err(TransitionError::ScheduleInPast);
                }
                Ok(Self {
                    status: ContentStatus::Scheduled,
                    scheduled_at: Some(at),
                    published_at: self.published_at,
                })
            }
            ContentStatus::Published => Ok(Self {
                status: ContentStatus::Published,
                scheduled_at: None,
                published_at: Some(self.published_at.unwrap_or(now)),
            }),
        }
    }

    /// Scheduled and the time has come
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ContentStatus::Scheduled && self.scheduled_at.is_some_and(|at| at <= now)
    }

    /// Publish a due item at its scheduled time
    pub fn publish_scheduled(&self) -> Self {
        Self {
            status: ContentStatus::Published,
            scheduled_at: None,
            published_at: self.published_at.or(self.scheduled_at),
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        let total = self.total.max(0) as u64;
        total.div_ceil(self.per_page as u64) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            per_page: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_parse_and_display() {
        for status in [
            ContentStatus::Draft,
            ContentStatus::Scheduled,
            ContentStatus::Published,
        ] {
            assert_eq!(status.to_string().parse::<ContentStatus>().unwrap(), status);
        }
        assert_eq!("PUBLISHED".parse::<ContentStatus>().unwrap(), ContentStatus::Published);
        assert!("archived".parse::<ContentStatus>().is_err());
    }

    #[test]
    fn test_schedule_requires_future_time() {
        let now = Utc::now();
        let draft = Lifecycle::draft();

        assert_eq!(
            draft.transition(ContentStatus::Scheduled, None, now),
            Err(TransitionError::MissingSchedule)
        );
        assert_eq!(
            draft.transition(ContentStatus::Scheduled, Some(now - Duration::minutes(1)), now),
            Err(TransitionError::ScheduleInPast)
        );

        let at = now + Duration::hours(1);
        let scheduled = draft
            .transition(ContentStatus::Scheduled, Some(at), now)
            .unwrap();
        assert_eq!(scheduled.status, ContentStatus::Scheduled);
        assert_eq!(scheduled.scheduled_at, Some(at));
        assert!(scheduled.published_at.is_none());
    }

    #[test]
    fn test_publish_sets_and_keeps_published_at() {
        let now = Utc::now();
        let published = Lifecycle::draft()
            .transition(ContentStatus::Published, None, now)
            .unwrap();
        assert_eq!(published.published_at, Some(now));

        let later = now + Duration::days(3);
        let unpublished = published
            .transition(ContentStatus::Draft, None, later)
            .unwrap();
        let republished = unpublished
            .transition(ContentStatus::Published, None, later)
            .unwrap();
        assert_eq!(republished.published_at, Some(now));
    }

    #[test]
    fn test_due_and_publish_scheduled() {
        let now = Utc::now();
        let at = now + Duration::minutes(5);
        let scheduled = Lifecycle::draft()
            .transition(ContentStatus::Scheduled, Some(at), now)
            .unwrap();

        assert!(!scheduled.is_due(now));
        assert!(scheduled.is_due(at));

        let published = scheduled.publish_scheduled();
        assert!(published.is_published());
        assert_eq!(published.published_at, Some(at));
        assert!(published.scheduled_at.is_none());
    }

    #[test]
    fn test_list_params_clamping() {
        let params = ListParams::new(0, 500);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
        assert_eq!(ListParams::new(3, 20).offset(), 40);
    }

    #[test]
    fn test_paged_result_pages() {
        let params = ListParams::new(2, 10);
        let result = PagedResult::new(vec![1, 2, 3], 23, &params);
        assert_eq!(result.total_pages(), 3);
        assert!(result.has_next());
        let mapped = result.map(|n| n * 2);
        assert_eq!(mapped.items, vec![2, 4, 6]);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn status_strategy() -> impl Strategy<Value = ContentStatus> {
        prop_oneof![
            Just(ContentStatus::Draft),
            Just(ContentStatus::Scheduled),
            Just(ContentStatus::Published),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Any sequence of valid transitions keeps the timestamps consistent
        /// with the status.
        #[test]
        fn lifecycle_timestamps_match_status(
            steps in prop::collection::vec((status_strategy(), -120i64..120), 1..12)
        ) {
            let now = Utc::now();
            let mut lifecycle = Lifecycle::draft();
            for (target, offset) in steps {
                let at = now + Duration::minutes(offset);
                if let Ok(next) = lifecycle.transition(target, Some(at), now) {
                    lifecycle = next;
                }
                match lifecycle.status {
                    ContentStatus::Scheduled => prop_assert!(lifecycle.scheduled_at.is_some_and(|s| s > now)),
                    ContentStatus::Published => {
                        prop_assert!(lifecycle.published_at.is_some());
                        prop_assert!(lifecycle.scheduled_at.is_none());
                    }
                    ContentStatus::Draft => prop_assert!(lifecycle.scheduled_at.is_none()),
                }
            }
        }

        #[test]
        fn total_pages_covers_total(total in 0i64..10_000, per_page in 1u32..=100) {
            let result: PagedResult<()> = PagedResult::new(vec![], total, &ListParams::new(1, per_page));
            let pages = result.total_pages() as i64;
            prop_assert!(pages * per_page as i64 >= total);
            prop_assert!((pages - 1).max(0) * (per_page as i64) < total.max(1));
        }
    }
}
