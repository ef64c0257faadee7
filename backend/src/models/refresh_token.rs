use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for refresh tokens. Rows are never deleted: rotation and
/// logout only stamp `revoked_at`/`replaced_by_token`, so the chain of
/// superseded tokens stays auditable.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefreshTokenRow {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    /// A token is active iff it has not been revoked and has not expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now <= self.expires_at
    }
}
