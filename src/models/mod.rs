//! Data models
//!
//! Database entities for the CMS (blog posts, pages, tool sections,
//! comments, subscribers) and back-office accounts, plus the shared
//! publication lifecycle and pagination types.

mod blog_post;
mod comment;
mod content;
mod page;
mod session;
mod subscriber;
mod tool_section;
mod user;

pub use blog_post::{normalize_tags, BlogPost, CreateBlogPostInput, UpdateBlogPostInput};
pub use comment::{Comment, CommentStatus, CommentThread, CreateCommentInput};
pub use content::{ContentStatus, Lifecycle, ListParams, PagedResult, TransitionError};
pub use page::{CreatePageInput, Page, UpdatePageInput};
pub use session::{Session, SESSION_TTL_DAYS};
pub use subscriber::{Subscriber, SubscriberStatus};
pub use tool_section::{CreateToolSectionInput, ToolSection, UpdateToolSectionInput};
pub use user::{CreateUserInput, User, UserRole, UserStatus};
