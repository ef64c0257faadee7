use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for fleets
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FleetRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FleetRow {
    pub fn to_shared(&self) -> shared::Fleet {
        shared::Fleet {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            owner_id: Uuid::parse_str(&self.owner_id).unwrap_or_default(),
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fleet_row_to_shared() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();

        let row = FleetRow {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            name: "North depot".to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        };

        let fleet = row.to_shared();

        assert_eq!(fleet.id, id);
        assert_eq!(fleet.owner_id, owner_id);
        assert_eq!(fleet.name, "North depot");
    }
}
