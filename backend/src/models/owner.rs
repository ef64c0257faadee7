use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use shared::OwnerSummary;

/// Database model for owner (tenant) profiles. Linked 0..1 to a user via
/// `identity_user_id`; administrator accounts have no owner profile.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OwnerRow {
    pub id: String,
    pub identity_user_id: Option<String>,
    pub company_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub primary_contact_name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub okta_group_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnerRow {
    pub fn to_summary(&self) -> OwnerSummary {
        OwnerSummary {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            company_name: self.company_name.clone(),
            contact_email: self.contact_email.clone(),
            contact_phone: self.contact_phone.clone(),
            city: self.city.clone(),
            country: self.country.clone(),
        }
    }
}
