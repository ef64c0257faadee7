use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use shared::VehicleStatus;

/// Database model for vehicles
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VehicleRow {
    pub id: String,
    pub fleet_id: String,
    pub license_plate: String,
    pub model: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VehicleRow {
    pub fn to_shared(&self) -> shared::Vehicle {
        shared::Vehicle {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            fleet_id: Uuid::parse_str(&self.fleet_id).unwrap_or_default(),
            license_plate: self.license_plate.clone(),
            model: self.model.clone(),
            status: self.status.parse().unwrap_or(VehicleStatus::Active),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Database model for telemetry snapshots
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TelemetryRow {
    pub id: String,
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kph: f64,
    pub fuel_level: f64,
    pub captured_at: DateTime<Utc>,
}

impl TelemetryRow {
    pub fn to_shared(&self) -> shared::TelemetrySnapshot {
        shared::TelemetrySnapshot {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            vehicle_id: Uuid::parse_str(&self.vehicle_id).unwrap_or_default(),
            latitude: self.latitude,
            longitude: self.longitude,
            speed_kph: self.speed_kph,
            fuel_level: self.fuel_level,
            captured_at: self.captured_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_row_to_shared() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let fleet_id = Uuid::new_v4();

        let row = VehicleRow {
            id: id.to_string(),
            fleet_id: fleet_id.to_string(),
            license_plate: "B-FL 1234".to_string(),
            model: Some("Sprinter".to_string()),
            status: "maintenance".to_string(),
            created_at: now,
            updated_at: now,
        };

        let vehicle = row.to_shared();

        assert_eq!(vehicle.id, id);
        assert_eq!(vehicle.fleet_id, fleet_id);
        assert_eq!(vehicle.status, VehicleStatus::Maintenance);
    }

    #[test]
    fn test_unknown_status_defaults_to_active() {
        let now = Utc::now();
        let row = VehicleRow {
            id: Uuid::new_v4().to_string(),
            fleet_id: Uuid::new_v4().to_string(),
            license_plate: "B-FL 1".to_string(),
            model: None,
            status: "bogus".to_string(),
            created_at: now,
            updated_at: now,
        };

        assert_eq!(row.to_shared().status, VehicleStatus::Active);
    }
}
