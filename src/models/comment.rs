//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment moderation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Spam,
}

impl std::fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Spam => write!(f, "spam"),
        }
    }
}

impl std::str::FromStr for CommentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "spam" => Ok(Self::Spam),
            _ => Err(format!("Invalid comment status: {}", s)),
        }
    }
}

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    #[serde(skip_serializing)]
    pub author_email: String,
    pub content: String,
    pub status: CommentStatus,
    #[serde(skip_serializing)]
    pub ip_address: Option<String>,
    #[serde(skip_serializing)]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Approved comment as shown under a post, with nested replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentThread {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub avatar_url: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub replies: Vec<CommentThread>,
}

impl CommentThread {
    /// Generate Gravatar URL from email
    pub fn gravatar_url(email: &str) -> String {
        let email = email.trim();
        if email.is_empty() {
            return "https://www.gravatar.com/avatar/?d=mp&s=80".to_string();
        }
        let hash = format!("{:x}", md5::compute(email.to_lowercase()));
        format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
    }

    /// Build reply trees from a flat, chronologically ordered list.
    /// Replies whose parent is not in the list are promoted to the top level.
    pub fn build_tree(comments: &[Comment]) -> Vec<CommentThread> {
        use std::collections::HashMap;

        let ids: std::collections::HashSet<i64> = comments.iter().map(|c| c.id).collect();
        let mut children: HashMap<i64, Vec<&Comment>> = HashMap::new();
        let mut roots = Vec::new();

        for comment in comments {
            match comment.parent_id {
                Some(parent) if ids.contains(&parent) && parent != comment.id => {
                    children.entry(parent).or_default().push(comment)
                }
                _ => roots.push(comment),
            }
        }

        fn build(comment: &Comment, children: &HashMap<i64, Vec<&Comment>>, depth: usize) -> CommentThread {
            let replies = if depth < 16 {
                children
                    .get(&comment.id)
                    .map(|kids| kids.iter().map(|c| build(c, children, depth + 1)).collect())
                    .unwrap_or_default()
            } else {
                Vec::new()
            };
            CommentThread {
                id: comment.id,
                parent_id: comment.parent_id,
                author_name: comment.author_name.clone(),
                avatar_url: CommentThread::gravatar_url(&comment.author_email),
                content: comment.content.clone(),
                created_at: comment.created_at,
                replies,
            }
        }

        roots.into_iter().map(|c| build(c, &children, 0)).collect()
    }
}

/// Input for creating a comment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub post_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub author_email: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: i64, parent_id: Option<i64>) -> Comment {
        Comment {
            id,
            post_id: 1,
            parent_id,
            author_name: format!("user{}", id),
            author_email: "Someone@Example.com ".to_string(),
            content: "hi".to_string(),
            status: CommentStatus::Approved,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_gravatar_normalizes_email() {
        assert_eq!(
            CommentThread::gravatar_url("someone@example.com"),
            CommentThread::gravatar_url("  SOMEONE@example.com ")
        );
        assert!(CommentThread::gravatar_url("").contains("d=mp"));
    }

    #[test]
    fn test_build_tree_nests_replies() {
        let comments = vec![comment(1, None), comment(2, Some(1)), comment(3, Some(2)), comment(4, None)];
        let tree = CommentThread::build_tree(&comments);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].replies[0].id, 3);
    }

    #[test]
    fn test_build_tree_promotes_orphans() {
        let comments = vec![comment(5, Some(99))];
        let tree = CommentThread::build_tree(&comments);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, 5);
    }

    #[test]
    fn test_email_not_serialized() {
        let json = serde_json::to_value(comment(1, None)).unwrap();
        assert!(json.get("author_email").is_none());
        assert_eq!(json["status"], "approved");
    }
}
