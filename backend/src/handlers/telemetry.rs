use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::fleets::require_principal;
use crate::models::AppState;
use crate::services::fleets as fleet_service;
use crate::services::vehicles::{self as vehicle_service, VehicleError};
use crate::services::websocket::{owner_group, vehicle_group};
use shared::{ApiError, ApiSuccess, PushTelemetryRequest};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/vehicles/{vehicle_id}/telemetry",
        web::post().to(push_telemetry),
    )
    .route(
        "/vehicles/{vehicle_id}/telemetry/latest",
        web::get().to(latest_telemetry),
    )
    .route("/telemetry", web::get().to(latest_telemetry_batch));
}

#[derive(Debug, Deserialize)]
struct TelemetryBatchQuery {
    vehicle_ids: String,
}

/// Ingest a telemetry snapshot from a telematics device and fan it out to
/// the vehicle's subscribers and the owning tenant. Device submissions are
/// keyed by vehicle id, not a user session.
async fn push_telemetry(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<PushTelemetryRequest>,
) -> Result<HttpResponse> {
    let vehicle_id = path.into_inner();

    match vehicle_service::record_telemetry(&state.db, &vehicle_id, &body).await {
        Ok(snapshot) => {
            let mut groups = vec![vehicle_group(&vehicle_id)];
            if let Ok(Some(vehicle)) = vehicle_service::get_vehicle(&state.db, &vehicle_id).await {
                if let Ok(Some(fleet)) = fleet_service::get_fleet(&state.db, &vehicle.fleet_id).await
                {
                    groups.push(owner_group(&fleet.owner_id));
                }
            }

            state
                .hub
                .publish_event(
                    &groups,
                    "VehicleTelemetry",
                    serde_json::to_value(&snapshot).unwrap_or_default(),
                )
                .await;

            Ok(HttpResponse::Created().json(ApiSuccess::new(snapshot)))
        }
        Err(e) => Ok(telemetry_error_response(e)),
    }
}

async fn latest_telemetry(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    if let Err(response) = require_principal(&req, &state) {
        return Ok(response);
    }

    match vehicle_service::latest_telemetry(&state.db, &path).await {
        Ok(Some(snapshot)) => Ok(HttpResponse::Ok().json(ApiSuccess::new(snapshot))),
        Ok(None) => Ok(HttpResponse::NotFound().json(ApiError {
            error: "not_found".to_string(),
            message: "No telemetry recorded for this vehicle".to_string(),
        })),
        Err(e) => Ok(telemetry_error_response(e)),
    }
}

async fn latest_telemetry_batch(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<TelemetryBatchQuery>,
) -> Result<HttpResponse> {
    if let Err(response) = require_principal(&req, &state) {
        return Ok(response);
    }

    let vehicle_ids: Vec<Uuid> = query
        .vehicle_ids
        .split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect();

    if vehicle_ids.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ApiError {
            error: "validation_error".to_string(),
            message: "vehicle_ids query parameter is required".to_string(),
        }));
    }

    match vehicle_service::latest_telemetry_batch(&state.db, &vehicle_ids).await {
        Ok(snapshots) => Ok(HttpResponse::Ok().json(ApiSuccess::new(snapshots))),
        Err(e) => Ok(telemetry_error_response(e)),
    }
}

fn telemetry_error_response(error: VehicleError) -> HttpResponse {
    match error {
        VehicleError::NotFound => HttpResponse::NotFound().json(ApiError {
            error: "not_found".to_string(),
            message: "Vehicle not found".to_string(),
        }),
        e => {
            log::error!("Telemetry handler error: {:?}", e);
            HttpResponse::InternalServerError().json(ApiError {
                error: "internal_error".to_string(),
                message: "An unexpected error occurred".to_string(),
            })
        }
    }
}
