use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Auth Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterOwnerRequest {
    pub company_name: String,
    pub email: String,
    pub password: String,
    pub primary_contact_name: String,
    pub phone_number: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeTokenRequest {
    pub refresh_token: String,
}

/// Issued on successful registration, login, or refresh. The refresh token
/// is returned in plaintext exactly once and stored only as a hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at_utc: DateTime<Utc>,
    pub owner: Option<OwnerSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub company_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

// ============================================================================
// Role Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Owner,
    FleetManager,
    Driver,
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "Owner",
            Role::FleetManager => "FleetManager",
            Role::Driver => "Driver",
            Role::Administrator => "Administrator",
        }
    }

    pub fn can_manage_fleets(&self) -> bool {
        matches!(self, Role::Owner | Role::FleetManager | Role::Administrator)
    }

    pub fn can_manage_owners(&self) -> bool {
        matches!(self, Role::Administrator)
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "fleetmanager" => Ok(Role::FleetManager),
            "driver" => Ok(Role::Driver),
            "administrator" => Ok(Role::Administrator),
            _ => Err(()),
        }
    }
}

// ============================================================================
// Fleet Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fleet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFleetRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFleetRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

// ============================================================================
// Vehicle Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Active,
    Maintenance,
    Retired,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Active => "active",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::Retired => "retired",
        }
    }
}

impl FromStr for VehicleStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(VehicleStatus::Active),
            "maintenance" => Ok(VehicleStatus::Maintenance),
            "retired" => Ok(VehicleStatus::Retired),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub fleet_id: Uuid,
    pub license_plate: String,
    pub model: Option<String>,
    pub status: VehicleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVehicleRequest {
    pub license_plate: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateVehicleRequest {
    pub license_plate: Option<String>,
    pub model: Option<String>,
    pub status: Option<VehicleStatus>,
}

// ============================================================================
// Telemetry Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kph: f64,
    pub fuel_level: f64,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushTelemetryRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kph: f64,
    pub fuel_level: f64,
}

// ============================================================================
// WebSocket Types
// ============================================================================

/// Messages sent by clients over the realtime socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    Authenticate { token: String },
    JoinFleet { fleet_id: Uuid },
    LeaveFleet { fleet_id: Uuid },
    SubscribeVehicles { vehicle_ids: Vec<Uuid> },
    UnsubscribeVehicles { vehicle_ids: Vec<Uuid> },
    Ping,
}

/// Messages pushed to clients over the realtime socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    Connected {
        owner_id: Option<Uuid>,
    },
    JoinedGroup {
        group: String,
    },
    LeftGroup {
        group: String,
    },
    Subscribed {
        vehicle_ids: Vec<Uuid>,
    },
    Unsubscribed {
        vehicle_ids: Vec<Uuid>,
    },
    /// Domain event fan-out. The `event_id` and `occurred_at` fields let a
    /// client subscribed to overlapping groups drop duplicate deliveries.
    Event {
        event: String,
        event_id: Uuid,
        occurred_at: DateTime<Utc>,
        payload: serde_json::Value,
    },
    Error {
        code: String,
        message: String,
    },
    Pong,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSuccess<T> {
    pub data: T,
}

impl<T> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(Role::Owner.can_manage_fleets());
        assert!(Role::FleetManager.can_manage_fleets());
        assert!(Role::Administrator.can_manage_fleets());
        assert!(!Role::Driver.can_manage_fleets());

        assert!(Role::Administrator.can_manage_owners());
        assert!(!Role::Owner.can_manage_owners());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("owner".parse(), Ok(Role::Owner));
        assert_eq!("FLEETMANAGER".parse(), Ok(Role::FleetManager));
        assert_eq!("Driver".parse(), Ok(Role::Driver));
        assert_eq!("administrator".parse(), Ok(Role::Administrator));
        assert!("invalid".parse::<Role>().is_err());
    }

    #[test]
    fn test_vehicle_status_from_str() {
        assert_eq!("active".parse(), Ok(VehicleStatus::Active));
        assert_eq!("MAINTENANCE".parse(), Ok(VehicleStatus::Maintenance));
        assert_eq!("Retired".parse(), Ok(VehicleStatus::Retired));
        assert!("scrapped".parse::<VehicleStatus>().is_err());
    }

    #[test]
    fn test_api_success() {
        let success = ApiSuccess::new("test data");
        assert_eq!(success.data, "test data");
    }

    #[test]
    fn test_ws_client_message_roundtrip() {
        let json = r#"{"type":"join_fleet","fleet_id":"7f1a3bfb-94be-4c9b-8d60-9d41f53eae11"}"#;
        let msg: WsClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            WsClientMessage::JoinFleet { fleet_id } => {
                assert_eq!(
                    fleet_id,
                    "7f1a3bfb-94be-4c9b-8d60-9d41f53eae11".parse::<Uuid>().unwrap()
                );
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_ws_server_event_serializes_envelope() {
        let msg = WsServerMessage::Event {
            event: "FleetCreated".to_string(),
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            payload: serde_json::json!({"name": "North depot"}),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"event\""));
        assert!(json.contains("\"event\":\"FleetCreated\""));
        assert!(json.contains("event_id"));
    }
}
