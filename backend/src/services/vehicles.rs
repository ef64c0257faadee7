use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{TelemetryRow, VehicleRow};
use shared::{
    CreateVehicleRequest, PushTelemetryRequest, TelemetrySnapshot, UpdateVehicleRequest, Vehicle,
    VehicleStatus,
};

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("Vehicle not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn create_vehicle(
    pool: &SqlitePool,
    fleet_id: &Uuid,
    request: &CreateVehicleRequest,
) -> Result<Vehicle, VehicleError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO vehicles (id, fleet_id, license_plate, model, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(fleet_id.to_string())
    .bind(&request.license_plate)
    .bind(&request.model)
    .bind(VehicleStatus::Active.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Vehicle {
        id,
        fleet_id: *fleet_id,
        license_plate: request.license_plate.clone(),
        model: request.model.clone(),
        status: VehicleStatus::Active,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_vehicle(
    pool: &SqlitePool,
    vehicle_id: &Uuid,
) -> Result<Option<Vehicle>, VehicleError> {
    let vehicle: Option<VehicleRow> = sqlx::query_as("SELECT * FROM vehicles WHERE id = ?")
        .bind(vehicle_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(vehicle.map(|v| v.to_shared()))
}

pub async fn list_vehicles(
    pool: &SqlitePool,
    fleet_id: Option<&Uuid>,
) -> Result<Vec<Vehicle>, VehicleError> {
    let vehicles: Vec<VehicleRow> = match fleet_id {
        Some(fleet_id) => {
            sqlx::query_as("SELECT * FROM vehicles WHERE fleet_id = ? ORDER BY created_at DESC")
                .bind(fleet_id.to_string())
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM vehicles ORDER BY created_at DESC")
                .fetch_all(pool)
                .await?
        }
    };

    Ok(vehicles.into_iter().map(|v| v.to_shared()).collect())
}

pub async fn update_vehicle(
    pool: &SqlitePool,
    vehicle_id: &Uuid,
    request: &UpdateVehicleRequest,
) -> Result<Vehicle, VehicleError> {
    let mut vehicle: VehicleRow = sqlx::query_as("SELECT * FROM vehicles WHERE id = ?")
        .bind(vehicle_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(VehicleError::NotFound)?;

    if let Some(ref license_plate) = request.license_plate {
        vehicle.license_plate = license_plate.clone();
    }
    if let Some(ref model) = request.model {
        vehicle.model = Some(model.clone());
    }
    if let Some(status) = request.status {
        vehicle.status = status.as_str().to_string();
    }

    let now = Utc::now();
    vehicle.updated_at = now;

    sqlx::query(
        "UPDATE vehicles SET license_plate = ?, model = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&vehicle.license_plate)
    .bind(&vehicle.model)
    .bind(&vehicle.status)
    .bind(now)
    .bind(vehicle_id.to_string())
    .execute(pool)
    .await?;

    Ok(vehicle.to_shared())
}

/// Delete a vehicle and its telemetry; returns the deleted vehicle so
/// callers can notify the fleet and owner groups.
pub async fn delete_vehicle(pool: &SqlitePool, vehicle_id: &Uuid) -> Result<Vehicle, VehicleError> {
    let vehicle: VehicleRow = sqlx::query_as("SELECT * FROM vehicles WHERE id = ?")
        .bind(vehicle_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(VehicleError::NotFound)?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM vehicle_telemetry WHERE vehicle_id = ?")
        .bind(vehicle_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM vehicles WHERE id = ?")
        .bind(vehicle_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(vehicle.to_shared())
}

pub async fn record_telemetry(
    pool: &SqlitePool,
    vehicle_id: &Uuid,
    request: &PushTelemetryRequest,
) -> Result<TelemetrySnapshot, VehicleError> {
    // Reject telemetry for unknown vehicles up front
    get_vehicle(pool, vehicle_id)
        .await?
        .ok_or(VehicleError::NotFound)?;

    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO vehicle_telemetry (id, vehicle_id, latitude, longitude, speed_kph, fuel_level, captured_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(vehicle_id.to_string())
    .bind(request.latitude)
    .bind(request.longitude)
    .bind(request.speed_kph)
    .bind(request.fuel_level)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(TelemetrySnapshot {
        id,
        vehicle_id: *vehicle_id,
        latitude: request.latitude,
        longitude: request.longitude,
        speed_kph: request.speed_kph,
        fuel_level: request.fuel_level,
        captured_at: now,
    })
}

pub async fn latest_telemetry(
    pool: &SqlitePool,
    vehicle_id: &Uuid,
) -> Result<Option<TelemetrySnapshot>, VehicleError> {
    let row: Option<TelemetryRow> = sqlx::query_as(
        "SELECT * FROM vehicle_telemetry WHERE vehicle_id = ? ORDER BY captured_at DESC LIMIT 1",
    )
    .bind(vehicle_id.to_string())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.to_shared()))
}

pub async fn latest_telemetry_batch(
    pool: &SqlitePool,
    vehicle_ids: &[Uuid],
) -> Result<Vec<TelemetrySnapshot>, VehicleError> {
    let mut snapshots = Vec::with_capacity(vehicle_ids.len());
    for vehicle_id in vehicle_ids {
        if let Some(snapshot) = latest_telemetry(pool, vehicle_id).await? {
            snapshots.push(snapshot);
        }
    }
    Ok(snapshots)
}
