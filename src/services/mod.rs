//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories:
//! - Implementing business rules and validation
//! - Coordinating between repositories, the cache and the settings stores
//! - Mapping storage failures into typed errors

pub mod blog;
pub mod comment;
pub mod content;
pub mod markdown;
pub mod newsletter;
pub mod page;
pub mod password;
pub mod rate_limiter;
pub mod stats;
pub mod tool_section;
pub mod user;

pub use blog::BlogService;
pub use comment::{is_valid_email, CommentService};
pub use content::{generate_slug, ContentError};
pub use markdown::MarkdownRenderer;
pub use newsletter::{NewsletterError, NewsletterService};
pub use page::PageService;
pub use password::{hash_password, verify_password};
pub use rate_limiter::{LoginRateLimiter, SlidingWindowLimiter};
pub use stats::{RequestStats, StatsService};
pub use tool_section::ToolSectionService;
pub use user::{LoginInput, UserService, UserServiceError};
