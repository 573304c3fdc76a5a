//! Comment repository

use super::pg_placeholders;
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentStatus, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

const COMMENT_COLUMNS: &str = "id, post_id, parent_id, author_name, author_email, content, status, \
     ip_address, user_agent, created_at";

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Oldest first, optionally restricted to one status
    async fn list_for_post(&self, post_id: i64, status: Option<CommentStatus>) -> Result<Vec<Comment>>;

    /// Moderation queue, newest first
    async fn list(&self, status: Option<CommentStatus>, params: &ListParams) -> Result<(Vec<Comment>, i64)>;

    async fn set_status(&self, id: i64, status: CommentStatus) -> Result<bool>;

    /// Replies go with their parent
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count_by_status(&self) -> Result<Vec<(CommentStatus, i64)>>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }

    async fn select(&self, sql: &str, text_args: &[String], int_args: &[i64]) -> Result<Vec<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(sql);
                for arg in int_args {
                    query = query.bind(*arg);
                }
                for arg in text_args {
                    query = query.bind(arg);
                }
                query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to query comments")?
                    .iter()
                    .map(row_to_comment_sqlite)
                    .collect()
            }
            DatabaseDriver::Postgres => {
                let sql = pg_placeholders(sql);
                let mut query = sqlx::query(&sql);
                for arg in int_args {
                    query = query.bind(*arg);
                }
                for arg in text_args {
                    query = query.bind(arg);
                }
                query
                    .fetch_all(self.pool.postgres()?)
                    .await
                    .context("Failed to query comments")?
                    .iter()
                    .map(row_to_comment_postgres)
                    .collect()
            }
        }
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        let now = Utc::now();
        let sql = r#"
            INSERT INTO comments (post_id, parent_id, author_name, author_email, content, status,
                                  ip_address, user_agent, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        let id: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(comment.post_id)
                .bind(comment.parent_id)
                .bind(&comment.author_name)
                .bind(&comment.author_email)
                .bind(&comment.content)
                .bind(comment.status.to_string())
                .bind(&comment.ip_address)
                .bind(&comment.user_agent)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            DatabaseDriver::Postgres => {
                let sql = format!("{} RETURNING id", pg_placeholders(sql.trim_end()));
                sqlx::query(&sql)
                    .bind(comment.post_id)
                    .bind(comment.parent_id)
                    .bind(&comment.author_name)
                    .bind(&comment.author_email)
                    .bind(&comment.content)
                    .bind(comment.status.to_string())
                    .bind(&comment.ip_address)
                    .bind(&comment.user_agent)
                    .bind(now)
                    .fetch_one(self.pool.postgres()?)
                    .await
                    .context("Failed to create comment")?
                    .get("id")
            }
        };

        Ok(Comment {
            id,
            created_at: now,
            ..comment.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS);
        Ok(self.select(&sql, &[], &[id]).await?.into_iter().next())
    }

    async fn list_for_post(&self, post_id: i64, status: Option<CommentStatus>) -> Result<Vec<Comment>> {
        let (status_sql, args) = match status {
            Some(s) => (" AND status = ?", vec![s.to_string()]),
            None => ("", Vec::new()),
        };
        let sql = format!(
            "SELECT {} FROM comments WHERE post_id = ?{} ORDER BY created_at, id",
            COMMENT_COLUMNS, status_sql
        );
        self.select(&sql, &args, &[post_id]).await
    }

    async fn list(&self, status: Option<CommentStatus>, params: &ListParams) -> Result<(Vec<Comment>, i64)> {
        let (where_sql, args) = match status {
            Some(s) => ("WHERE status = ?", vec![s.to_string()]),
            None => ("", Vec::new()),
        };
        // select() binds integers first, so limit and offset are inlined
        let list_sql = format!(
            "SELECT {} FROM comments {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            COMMENT_COLUMNS,
            where_sql,
            params.limit(),
            params.offset()
        );
        let items = self.select(&list_sql, &args, &[]).await?;

        let count_sql = format!("SELECT COUNT(*) as count FROM comments {}", where_sql);
        let total: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&count_sql);
                for arg in &args {
                    query = query.bind(arg);
                }
                query
                    .fetch_one(self.pool.sqlite()?)
                    .await
                    .context("Failed to count comments")?
                    .get("count")
            }
            DatabaseDriver::Postgres => {
                let count_sql = pg_placeholders(&count_sql);
                let mut query = sqlx::query(&count_sql);
                for arg in &args {
                    query = query.bind(arg);
                }
                query
                    .fetch_one(self.pool.postgres()?)
                    .await
                    .context("Failed to count comments")?
                    .get("count")
            }
        };

        Ok((items, total))
    }

    async fn set_status(&self, id: i64, status: CommentStatus) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("UPDATE comments SET status = ? WHERE id = ?")
                .bind(status.to_string())
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update comment status")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("UPDATE comments SET status = $1 WHERE id = $2")
                .bind(status.to_string())
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to update comment status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM comments WHERE id = $1")
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count_by_status(&self) -> Result<Vec<(CommentStatus, i64)>> {
        let sql = "SELECT status, COUNT(*) as count FROM comments GROUP BY status";
        let pairs: Vec<(String, i64)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to count comments by status")?
                .iter()
                .map(|r| (r.get("status"), r.get("count")))
                .collect(),
            DatabaseDriver::Postgres => sqlx::query(sql)
                .fetch_all(self.pool.postgres()?)
                .await
                .context("Failed to count comments by status")?
                .iter()
                .map(|r| (r.get("status"), r.get("count")))
                .collect(),
        };
        Ok(pairs
            .into_iter()
            .filter_map(|(status, count)| CommentStatus::from_str(&status).ok().map(|s| (s, count)))
            .collect())
    }
}

fn parse_status(raw: &str) -> Result<CommentStatus> {
    CommentStatus::from_str(raw).map_err(|e| anyhow::anyhow!(e))
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Comment> {
    let status: String = row.get("status");
    Ok(Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        parent_id: row.get("parent_id"),
        author_name: row.get("author_name"),
        author_email: row.get("author_email"),
        content: row.get("content"),
        status: parse_status(&status)?,
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        created_at: row.get("created_at"),
    })
}

fn row_to_comment_postgres(row: &sqlx::postgres::PgRow) -> Result<Comment> {
    let status: String = row.get("status");
    Ok(Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        parent_id: row.get("parent_id"),
        author_name: row.get("author_name"),
        author_email: row.get("author_email"),
        content: row.get("content"),
        status: parse_status(&status)?,
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> (DynDatabasePool, SqlxCommentRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let post_id = sqlx::query(
            "INSERT INTO blog_posts (slug, title, content, content_html) VALUES ('p', 'P', 'x', 'x')",
        )
        .execute(pool.sqlite().unwrap())
        .await
        .unwrap()
        .last_insert_rowid();
        (pool.clone(), SqlxCommentRepository::new(pool), post_id)
    }

    fn comment(post_id: i64, parent_id: Option<i64>, status: CommentStatus) -> Comment {
        Comment {
            id: 0,
            post_id,
            parent_id,
            author_name: "Reader".into(),
            author_email: "reader@example.com".into(),
            content: "Nice tool".into(),
            status,
            ip_address: Some("127.0.0.1".into()),
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_for_post() {
        let (_pool, repo, post_id) = setup().await;
        let root = repo.create(&comment(post_id, None, CommentStatus::Approved)).await.unwrap();
        repo.create(&comment(post_id, Some(root.id), CommentStatus::Pending)).await.unwrap();

        let all = repo.list_for_post(post_id, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, root.id);

        let approved = repo.list_for_post(post_id, Some(CommentStatus::Approved)).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].ip_address.as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_moderation_queue() {
        let (_pool, repo, post_id) = setup().await;
        let c = repo.create(&comment(post_id, None, CommentStatus::Pending)).await.unwrap();
        repo.create(&comment(post_id, None, CommentStatus::Pending)).await.unwrap();

        let (pending, total) = repo
            .list(Some(CommentStatus::Pending), &ListParams::new(1, 1))
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(pending.len(), 1);

        assert!(repo.set_status(c.id, CommentStatus::Spam).await.unwrap());
        assert!(!repo.set_status(9999, CommentStatus::Spam).await.unwrap());
        let counts = repo.count_by_status().await.unwrap();
        assert!(counts.contains(&(CommentStatus::Spam, 1)));
        assert!(counts.contains(&(CommentStatus::Pending, 1)));
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (pool, repo, post_id) = setup().await;
        let root = repo.create(&comment(post_id, None, CommentStatus::Approved)).await.unwrap();
        let reply = repo.create(&comment(post_id, Some(root.id), CommentStatus::Approved)).await.unwrap();

        assert!(repo.delete(root.id).await.unwrap());
        assert!(repo.get_by_id(reply.id).await.unwrap().is_none());

        let other = repo.create(&comment(post_id, None, CommentStatus::Approved)).await.unwrap();
        pool.execute("DELETE FROM blog_posts").await.unwrap();
        assert!(repo.get_by_id(other.id).await.unwrap().is_none());
    }
}
