use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::FleetRow;
use shared::{CreateFleetRequest, Fleet, UpdateFleetRequest};

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Fleet not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn create_fleet(
    pool: &SqlitePool,
    owner_id: &Uuid,
    request: &CreateFleetRequest,
) -> Result<Fleet, FleetError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO fleets (id, owner_id, name, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(owner_id.to_string())
    .bind(&request.name)
    .bind(&request.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Fleet {
        id,
        owner_id: *owner_id,
        name: request.name.clone(),
        description: request.description.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_fleet(pool: &SqlitePool, fleet_id: &Uuid) -> Result<Option<Fleet>, FleetError> {
    let fleet: Option<FleetRow> = sqlx::query_as("SELECT * FROM fleets WHERE id = ?")
        .bind(fleet_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(fleet.map(|f| f.to_shared()))
}

pub async fn list_owner_fleets(
    pool: &SqlitePool,
    owner_id: &Uuid,
) -> Result<Vec<Fleet>, FleetError> {
    let fleets: Vec<FleetRow> =
        sqlx::query_as("SELECT * FROM fleets WHERE owner_id = ? ORDER BY created_at DESC")
            .bind(owner_id.to_string())
            .fetch_all(pool)
            .await?;

    Ok(fleets.into_iter().map(|f| f.to_shared()).collect())
}

pub async fn update_fleet(
    pool: &SqlitePool,
    fleet_id: &Uuid,
    request: &UpdateFleetRequest,
) -> Result<Fleet, FleetError> {
    let mut fleet: FleetRow = sqlx::query_as("SELECT * FROM fleets WHERE id = ?")
        .bind(fleet_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(FleetError::NotFound)?;

    if let Some(ref name) = request.name {
        fleet.name = name.clone();
    }
    if let Some(ref description) = request.description {
        fleet.description = Some(description.clone());
    }

    let now = Utc::now();
    fleet.updated_at = now;

    sqlx::query("UPDATE fleets SET name = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&fleet.name)
        .bind(&fleet.description)
        .bind(now)
        .bind(fleet_id.to_string())
        .execute(pool)
        .await?;

    Ok(fleet.to_shared())
}

/// Delete a fleet and its vehicles; returns the deleted fleet so callers
/// can notify the owner group.
pub async fn delete_fleet(pool: &SqlitePool, fleet_id: &Uuid) -> Result<Fleet, FleetError> {
    let fleet: FleetRow = sqlx::query_as("SELECT * FROM fleets WHERE id = ?")
        .bind(fleet_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(FleetError::NotFound)?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM vehicle_telemetry WHERE vehicle_id IN (SELECT id FROM vehicles WHERE fleet_id = ?)",
    )
    .bind(fleet_id.to_string())
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM vehicles WHERE fleet_id = ?")
        .bind(fleet_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM fleets WHERE id = ?")
        .bind(fleet_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(fleet.to_shared())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn seed_owner(pool: &SqlitePool) -> Uuid {
        let owner_id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO owners (id, company_name, contact_email, primary_contact_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(owner_id.to_string())
        .bind("Acme Logistics")
        .bind("ops@acme.test")
        .bind("Jo Doe")
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
        owner_id
    }

    #[tokio::test]
    async fn test_create_and_list_fleets() {
        let pool = setup_pool().await;
        let owner_id = seed_owner(&pool).await;

        let fleet = create_fleet(
            &pool,
            &owner_id,
            &CreateFleetRequest {
                name: "North depot".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();

        let fleets = list_owner_fleets(&pool, &owner_id).await.unwrap();
        assert_eq!(fleets.len(), 1);
        assert_eq!(fleets[0].id, fleet.id);

        let other_owner = Uuid::new_v4();
        assert!(list_owner_fleets(&pool, &other_owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_fleet() {
        let pool = setup_pool().await;
        let owner_id = seed_owner(&pool).await;

        let fleet = create_fleet(
            &pool,
            &owner_id,
            &CreateFleetRequest {
                name: "North depot".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();

        let updated = update_fleet(
            &pool,
            &fleet.id,
            &UpdateFleetRequest {
                name: Some("South depot".to_string()),
                description: Some("Overflow yard".to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "South depot");
        assert_eq!(updated.description.as_deref(), Some("Overflow yard"));
    }

    #[tokio::test]
    async fn test_update_missing_fleet_is_not_found() {
        let pool = setup_pool().await;

        let result = update_fleet(
            &pool,
            &Uuid::new_v4(),
            &UpdateFleetRequest {
                name: Some("ghost".to_string()),
                description: None,
            },
        )
        .await;

        assert!(matches!(result, Err(FleetError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_fleet_removes_vehicles() {
        let pool = setup_pool().await;
        let owner_id = seed_owner(&pool).await;

        let fleet = create_fleet(
            &pool,
            &owner_id,
            &CreateFleetRequest {
                name: "North depot".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO vehicles (id, fleet_id, license_plate, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(fleet.id.to_string())
        .bind("B-FL 1234")
        .bind("active")
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();

        let deleted = delete_fleet(&pool, &fleet.id).await.unwrap();
        assert_eq!(deleted.owner_id, owner_id);

        assert!(get_fleet(&pool, &fleet.id).await.unwrap().is_none());
        let vehicles = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM vehicles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(vehicles, 0);
    }
}
