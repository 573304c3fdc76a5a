//! User service
//!
//! Back-office authentication:
//! - Bootstrap superadmin from configuration on first start
//! - Login with rate limiting, logout
//! - Session validation (7-day sessions)
//! - Password changes

use crate::config::AdminConfig;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User, UserRole};
use crate::services::comment::is_valid_email;
use crate::services::password::{check_password_rules, hash_password, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials or disabled account
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Too many login attempts, retry in {retry_after} seconds")]
    RateLimited { retry_after: i64 },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    /// Username or email
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    limiter: Arc<LoginRateLimiter>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        limiter: Arc<LoginRateLimiter>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            limiter,
        }
    }

    /// Create the superadmin from configuration when no user exists yet.
    ///
    /// Without a configured password a random one is generated and logged
    /// once, so a fresh install is never left with a guessable account.
    pub async fn ensure_admin(&self, config: &AdminConfig) -> Result<Option<User>, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        if count > 0 {
            return Ok(None);
        }

        let password = if config.password.is_empty() {
            let generated = Uuid::new_v4().simple().to_string();
            tracing::warn!(
                username = %config.username,
                password = %generated,
                "No admin password configured; generated one for the initial superadmin"
            );
            generated
        } else {
            config.password.clone()
        };

        let user = self
            .create_user(CreateUserInput {
                username: config.username.clone(),
                email: config.email.clone(),
                password,
                role: Some(UserRole::SuperAdmin),
                display_name: None,
            })
            .await?;
        tracing::info!(id = user.id, username = %user.username, "Bootstrap superadmin created");
        Ok(Some(user))
    }

    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();

        if username.is_empty() || username.chars().count() > 50 {
            return Err(UserServiceError::ValidationError(
                "Username must be 1-50 characters".to_string(),
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(UserServiceError::ValidationError(
                "Username may only contain letters, digits, '_', '-' and '.'".to_string(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError("Invalid email address".to_string()));
        }
        check_password_rules(&input.password).map_err(UserServiceError::ValidationError)?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(username));
        }
        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(email));
        }

        let hash = hash_password(&input.password)?;
        let mut user = User::new(username, email, hash, input.role.unwrap_or_default());
        user.display_name = input.display_name.filter(|n| !n.trim().is_empty());

        Ok(self.user_repo.create(&user).await.context("Failed to create user")?)
    }

    /// Verify credentials and open a session.
    ///
    /// Failed attempts count against the username; every attempt counts
    /// against the client IP.
    pub async fn login(&self, input: LoginInput, ip: Option<IpAddr>) -> Result<(Session, User), UserServiceError> {
        let username = input.username.trim();

        if let Some(ip) = ip {
            if self.limiter.is_ip_limited(ip).await {
                return Err(UserServiceError::RateLimited {
                    retry_after: self.limiter.ip_retry_after(ip).await,
                });
            }
            self.limiter.record_ip_request(ip).await;
        }
        if self.limiter.is_username_limited(username).await {
            tracing::warn!(username, "Login blocked by rate limit");
            return Err(UserServiceError::RateLimited { retry_after: 15 * 60 });
        }

        let user = match self.find_user(username).await? {
            Some(user) if verify_password(&input.password, &user.password_hash)? => user,
            _ => {
                self.limiter.record_failed_attempt(username).await;
                tracing::warn!(username, "Failed login");
                return Err(UserServiceError::AuthenticationError(
                    "Invalid username or password".to_string(),
                ));
            }
        };

        if !user.is_active() {
            return Err(UserServiceError::AuthenticationError(
                "This account is disabled".to_string(),
            ));
        }

        self.limiter.clear_username_attempts(username).await;
        let session = self.create_session(user.id).await?;
        self.user_repo
            .record_login(user.id, Utc::now())
            .await
            .context("Failed to record login")?;
        tracing::info!(user_id = user.id, "User logged in");

        Ok((session, user))
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// The user behind a session token; `None` when the session is unknown,
    /// expired, or its user is gone or disabled.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user.filter(User::is_active))
    }

    /// Change the password after checking the current one. All sessions of
    /// the user are revoked and a fresh one is returned.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<Session, UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| UserServiceError::AuthenticationError("User not found".to_string()))?;

        if !verify_password(current_password, &user.password_hash)? {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }
        check_password_rules(new_password).map_err(UserServiceError::ValidationError)?;
        if current_password == new_password {
            return Err(UserServiceError::ValidationError(
                "New password must differ from the current one".to_string(),
            ));
        }

        user.password_hash = hash_password(new_password)?;
        self.user_repo.update(&user).await.context("Failed to update password")?;
        self.session_repo
            .delete_by_user(user_id)
            .await
            .context("Failed to revoke sessions")?;
        tracing::info!(user_id, "Password changed");

        self.create_session(user_id).await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user by ID")?)
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    async fn find_user(&self, username_or_email: &str) -> Result<Option<User>, UserServiceError> {
        let user = if username_or_email.contains('@') {
            self.user_repo
                .get_by_email(&username_or_email.to_lowercase())
                .await
        } else {
            self.user_repo.get_by_username(username_or_email).await
        };
        Ok(user.context("Failed to find user")?)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        // 256 bits of randomness
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let session = Session::new(token, user_id);
        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use std::str::FromStr;

    async fn setup_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            Arc::new(LoginRateLimiter::new()),
        )
    }

    fn admin_config() -> AdminConfig {
        AdminConfig {
            username: "owner".into(),
            email: "owner@example.com".into(),
            password: "correct horse".into(),
        }
    }

    #[tokio::test]
    async fn test_ensure_admin_runs_once() {
        let service = setup_service().await;
        let admin = service.ensure_admin(&admin_config()).await.unwrap().unwrap();
        assert!(admin.is_superadmin());
        assert!(service.ensure_admin(&admin_config()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ensure_admin_with_default_config() {
        let service = setup_service().await;
        let admin = service
            .ensure_admin(&AdminConfig::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.username, "admin");
        assert!(is_valid_email(&admin.email));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let service = setup_service().await;
        service.ensure_admin(&admin_config()).await.unwrap();

        let (session, user) = service
            .login(LoginInput::new("owner", "correct horse"), None)
            .await
            .unwrap();
        assert_eq!(session.id.len(), 64);
        assert_eq!(user.username, "owner");

        let by_email = service
            .login(LoginInput::new("OWNER@example.com", "correct horse"), None)
            .await;
        assert!(by_email.is_ok());

        let found = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(found.last_login_at.is_some());

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user() {
        let service = setup_service().await;
        service.ensure_admin(&admin_config()).await.unwrap();

        let err = service.login(LoginInput::new("owner", "nope"), None).await.unwrap_err();
        assert!(matches!(err, UserServiceError::AuthenticationError(_)));
        let err = service.login(LoginInput::new("ghost", "nope"), None).await.unwrap_err();
        assert!(matches!(err, UserServiceError::AuthenticationError(_)));
    }

    #[tokio::test]
    async fn test_username_lockout_after_five_failures() {
        let service = setup_service().await;
        service.ensure_admin(&admin_config()).await.unwrap();

        for _ in 0..5 {
            let _ = service.login(LoginInput::new("owner", "bad"), None).await;
        }
        let err = service
            .login(LoginInput::new("owner", "correct horse"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_ip_limit() {
        let service = setup_service().await;
        let ip = IpAddr::from_str("10.0.0.7").unwrap();
        for _ in 0..10 {
            let _ = service.login(LoginInput::new("ghost", "x"), Some(ip)).await;
        }
        let err = service.login(LoginInput::new("other", "x"), Some(ip)).await.unwrap_err();
        assert!(matches!(err, UserServiceError::RateLimited { retry_after } if retry_after > 0));
    }

    #[tokio::test]
    async fn test_change_password_revokes_sessions() {
        let service = setup_service().await;
        let admin = service.ensure_admin(&admin_config()).await.unwrap().unwrap();
        let (old, _) = service
            .login(LoginInput::new("owner", "correct horse"), None)
            .await
            .unwrap();

        let err = service
            .change_password(admin.id, "wrong", "battery staple")
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::AuthenticationError(_)));
        let err = service
            .change_password(admin.id, "correct horse", "short")
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::ValidationError(_)));

        let fresh = service
            .change_password(admin.id, "correct horse", "battery staple")
            .await
            .unwrap();
        assert!(service.validate_session(&old.id).await.unwrap().is_none());
        assert!(service.validate_session(&fresh.id).await.unwrap().is_some());
        assert!(service
            .login(LoginInput::new("owner", "battery staple"), None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let service = setup_service().await;
        let input = |username: &str, email: &str, password: &str| CreateUserInput {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: None,
            display_name: None,
        };

        assert!(matches!(
            service.create_user(input("bad name", "a@b.co", "longenough")).await,
            Err(UserServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create_user(input("ed", "nope", "longenough")).await,
            Err(UserServiceError::ValidationError(_))
        ));

        let ed = service.create_user(input("ed", "ed@b.co", "longenough")).await.unwrap();
        assert_eq!(ed.role, UserRole::Editor);
        assert!(matches!(
            service.create_user(input("ed", "other@b.co", "longenough")).await,
            Err(UserServiceError::UserExists(_))
        ));
    }
}
