//! Newsletter service
//!
//! Signups, signed unsubscribe links and the admin subscriber list.
//! Unsubscribe tokens are `hex(HMAC-SHA256(secret, email))`, so links need
//! no stored state and cannot be forged for other addresses.

use crate::db::repositories::SubscriberRepository;
use crate::models::{ListParams, PagedResult, Subscriber, SubscriberStatus};
use crate::services::comment::is_valid_email;
use anyhow::Context;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum NewsletterError {
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Invalid or expired unsubscribe link")]
    InvalidToken,

    #[error("Subscriber not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct NewsletterService {
    repo: Arc<dyn SubscriberRepository>,
    secret: String,
}

impl NewsletterService {
    pub fn new(repo: Arc<dyn SubscriberRepository>, secret: impl Into<String>) -> Self {
        Self {
            repo,
            secret: secret.into(),
        }
    }

    fn mac(&self, email: &str) -> anyhow::Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid newsletter secret: {}", e))?;
        mac.update(email.as_bytes());
        Ok(mac)
    }

    /// Unsubscribe token for an address
    pub fn token_for(&self, email: &str) -> anyhow::Result<String> {
        let email = normalize_email(email);
        Ok(self
            .mac(&email)?
            .finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect())
    }

    /// Constant-time token check
    pub fn verify_token(&self, email: &str, token: &str) -> bool {
        let Some(bytes) = decode_hex(token.trim()) else {
            return false;
        };
        match self.mac(&normalize_email(email)) {
            Ok(mac) => mac.verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }

    /// Subscribe an address. Already-subscribed addresses are returned as-is;
    /// unsubscribed ones are reactivated.
    pub async fn subscribe(&self, email: &str, source: Option<&str>) -> Result<Subscriber, NewsletterError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(NewsletterError::InvalidEmail);
        }
        let source = source.map(str::trim).filter(|s| !s.is_empty());

        if let Some(existing) = self
            .repo
            .get_by_email(&email)
            .await
            .context("Failed to look up subscriber")?
        {
            if existing.is_active() {
                return Ok(existing);
            }
            self.repo
                .set_status(existing.id, SubscriberStatus::Subscribed, None)
                .await
                .context("Failed to resubscribe")?;
            tracing::info!(id = existing.id, "Subscriber resubscribed");
            return Ok(Subscriber {
                status: SubscriberStatus::Subscribed,
                unsubscribed_at: None,
                ..existing
            });
        }

        let subscriber = self
            .repo
            .create(&email, source)
            .await
            .context("Failed to create subscriber")?;
        tracing::info!(id = subscriber.id, source = ?source, "New newsletter subscriber");
        Ok(subscriber)
    }

    /// Unsubscribe through a signed link. Unknown addresses with a valid
    /// token succeed silently.
    pub async fn unsubscribe(&self, email: &str, token: &str) -> Result<(), NewsletterError> {
        if !self.verify_token(email, token) {
            return Err(NewsletterError::InvalidToken);
        }
        let email = normalize_email(email);

        let Some(subscriber) = self
            .repo
            .get_by_email(&email)
            .await
            .context("Failed to look up subscriber")?
        else {
            return Ok(());
        };

        if subscriber.is_active() {
            self.repo
                .set_status(subscriber.id, SubscriberStatus::Unsubscribed, Some(Utc::now()))
                .await
                .context("Failed to unsubscribe")?;
            tracing::info!(id = subscriber.id, "Subscriber unsubscribed");
        }
        Ok(())
    }

    pub async fn list(
        &self,
        status: Option<SubscriberStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Subscriber>, NewsletterError> {
        let (items, total) = self
            .repo
            .list(status, Some(params))
            .await
            .context("Failed to list subscribers")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Every subscriber as CSV with a header row
    pub async fn export_csv(&self, status: Option<SubscriberStatus>) -> Result<String, NewsletterError> {
        let (items, _) = self
            .repo
            .list(status, None)
            .await
            .context("Failed to export subscribers")?;

        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(["email", "status", "source", "created_at", "unsubscribed_at"])
            .context("Failed to write CSV header")?;
        for s in &items {
            wtr.write_record([
                neutralize_formula(&s.email),
                s.status.to_string(),
                neutralize_formula(s.source.as_deref().unwrap_or("")),
                s.created_at.to_rfc3339(),
                s.unsubscribed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            ])
            .context("Failed to write CSV row")?;
        }

        let bytes = wtr
            .into_inner()
            .map_err(|e| e.into_error())
            .context("Failed to flush CSV")?;
        Ok(String::from_utf8(bytes).context("CSV output is not UTF-8")?)
    }

    pub async fn delete(&self, id: i64) -> Result<(), NewsletterError> {
        if !self.repo.delete(id).await.context("Failed to delete subscriber")? {
            return Err(NewsletterError::NotFound);
        }
        Ok(())
    }

    pub async fn count_by_status(&self) -> Result<Vec<(SubscriberStatus, i64)>, NewsletterError> {
        Ok(self
            .repo
            .count_by_status()
            .await
            .context("Failed to count subscribers")?)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Spreadsheets run cells starting with these as formulas
fn neutralize_formula(value: &str) -> String {
    if value.starts_with(['=', '+', '-', '@']) {
        format!("'{}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxSubscriberRepository;
    use crate::db::{create_test_pool, migrations};

    /// Encodes one cell the way `export_csv` does
    fn csv_field(value: &str) -> String {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record([neutralize_formula(value)]).unwrap();
        let bytes = wtr.into_inner().unwrap();
        String::from_utf8(bytes).unwrap().trim_end_matches('\n').to_string()
    }

    async fn setup_service() -> NewsletterService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        NewsletterService::new(SqlxSubscriberRepository::boxed(pool), "test-secret")
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("00ff10"), Some(vec![0, 255, 16]));
        assert_eq!(decode_hex("0"), None);
        assert_eq!(decode_hex("zz"), None);
    }

    #[test]
    fn test_csv_field() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("=SUM(A1)"), "'=SUM(A1)");
    }

    #[tokio::test]
    async fn test_token_roundtrip() {
        let service = setup_service().await;
        let token = service.token_for("Reader@Example.com").unwrap();
        assert_eq!(token.len(), 64);
        assert!(service.verify_token("reader@example.com", &token));
        assert!(!service.verify_token("other@example.com", &token));
        assert!(!service.verify_token("reader@example.com", "deadbeef"));

        let other = NewsletterService::new(
            SqlxSubscriberRepository::boxed(create_test_pool().await.unwrap()),
            "another-secret",
        );
        assert!(!other.verify_token("reader@example.com", &token));
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let service = setup_service().await;
        let first = service.subscribe(" Reader@Example.com ", Some("footer")).await.unwrap();
        let again = service.subscribe("reader@example.com", Some("blog")).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(first.email, "reader@example.com");
        assert_eq!(again.source.as_deref(), Some("footer"));

        assert!(matches!(
            service.subscribe("not-an-email", None).await,
            Err(NewsletterError::InvalidEmail)
        ));
    }

    #[tokio::test]
    async fn test_unsubscribe_and_resubscribe() {
        let service = setup_service().await;
        let sub = service.subscribe("reader@example.com", None).await.unwrap();

        assert!(matches!(
            service.unsubscribe("reader@example.com", "bad").await,
            Err(NewsletterError::InvalidToken)
        ));

        let token = service.token_for("reader@example.com").unwrap();
        service.unsubscribe("reader@example.com", &token).await.unwrap();
        let counts = service.count_by_status().await.unwrap();
        assert!(counts.contains(&(SubscriberStatus::Unsubscribed, 1)));

        let back = service.subscribe("reader@example.com", None).await.unwrap();
        assert_eq!(back.id, sub.id);
        assert!(back.is_active());
        assert!(back.unsubscribed_at.is_none());
    }

    #[tokio::test]
    async fn test_export_and_delete() {
        let service = setup_service().await;
        let a = service.subscribe("a@example.com", Some("tool,page")).await.unwrap();
        service.subscribe("b@example.com", None).await.unwrap();

        let csv = service.export_csv(None).await.unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "email,status,source,created_at,unsubscribed_at");
        assert!(csv.contains("a@example.com,subscribed,\"tool,page\","));

        service.subscribe("c@example.com", Some("=HYPERLINK(\"x\")")).await.unwrap();
        let csv = service.export_csv(None).await.unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let sources: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[2].to_string())
            .collect();
        assert!(sources.contains(&"'=HYPERLINK(\"x\")".to_string()));

        service.delete(a.id).await.unwrap();
        assert!(matches!(service.delete(a.id).await, Err(NewsletterError::NotFound)));
        assert_eq!(service.list(None, &ListParams::default()).await.unwrap().total, 1);
    }
}
