//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of a login session
pub const SESSION_TTL_DAYS: i64 = 7;

/// Login session, keyed by an opaque token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: String, user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            expires_at: now + Duration::days(SESSION_TTL_DAYS),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_expires_in_a_week() {
        let session = Session::new("tok".into(), 1);
        assert!(!session.is_expired());
        assert_eq!((session.expires_at - session.created_at).num_days(), SESSION_TTL_DAYS);
    }
}
