use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::fleets::{authorized_for_owner, forbidden, require_principal};
use crate::models::AppState;
use crate::services::fleets as fleet_service;
use crate::services::vehicles::{self as vehicle_service, VehicleError};
use crate::services::websocket::{fleet_group, owner_group};
use shared::{ApiError, ApiSuccess, CreateVehicleRequest, Fleet, UpdateVehicleRequest};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/fleets/{fleet_id}/vehicles",
        web::post().to(create_vehicle),
    )
    .route("/vehicles", web::get().to(list_vehicles))
    .route("/vehicles/{vehicle_id}", web::get().to(get_vehicle))
    .route("/vehicles/{vehicle_id}", web::put().to(update_vehicle))
    .route("/vehicles/{vehicle_id}", web::delete().to(delete_vehicle));
}

#[derive(Debug, Deserialize)]
struct ListVehiclesQuery {
    fleet_id: Option<Uuid>,
}

async fn load_fleet(state: &AppState, fleet_id: &Uuid) -> std::result::Result<Fleet, HttpResponse> {
    match fleet_service::get_fleet(&state.db, fleet_id).await {
        Ok(Some(fleet)) => Ok(fleet),
        Ok(None) => Err(HttpResponse::NotFound().json(ApiError {
            error: "not_found".to_string(),
            message: "Fleet not found".to_string(),
        })),
        Err(e) => {
            log::error!("Failed to load fleet {}: {:?}", fleet_id, e);
            Err(HttpResponse::InternalServerError().json(ApiError {
                error: "internal_error".to_string(),
                message: "An unexpected error occurred".to_string(),
            }))
        }
    }
}

async fn create_vehicle(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<CreateVehicleRequest>,
) -> Result<HttpResponse> {
    let principal = match require_principal(&req, &state) {
        Ok(principal) => principal,
        Err(response) => return Ok(response),
    };
    let fleet_id = path.into_inner();

    let fleet = match load_fleet(&state, &fleet_id).await {
        Ok(fleet) => fleet,
        Err(response) => return Ok(response),
    };
    if !authorized_for_owner(&principal, &fleet.owner_id) {
        return Ok(forbidden());
    }

    match vehicle_service::create_vehicle(&state.db, &fleet_id, &body).await {
        Ok(vehicle) => {
            // Dual delivery: fleet subscribers and the owner tenant both hear
            // about vehicle mutations
            state
                .hub
                .publish_event(
                    &[fleet_group(&fleet_id), owner_group(&fleet.owner_id)],
                    "VehicleCreated",
                    serde_json::to_value(&vehicle).unwrap_or_default(),
                )
                .await;
            Ok(HttpResponse::Created().json(ApiSuccess::new(vehicle)))
        }
        Err(e) => Ok(vehicle_error_response(e)),
    }
}

async fn list_vehicles(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListVehiclesQuery>,
) -> Result<HttpResponse> {
    if let Err(response) = require_principal(&req, &state) {
        return Ok(response);
    }

    match vehicle_service::list_vehicles(&state.db, query.fleet_id.as_ref()).await {
        Ok(vehicles) => Ok(HttpResponse::Ok().json(ApiSuccess::new(vehicles))),
        Err(e) => Ok(vehicle_error_response(e)),
    }
}

async fn get_vehicle(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    if let Err(response) = require_principal(&req, &state) {
        return Ok(response);
    }

    match vehicle_service::get_vehicle(&state.db, &path).await {
        Ok(Some(vehicle)) => Ok(HttpResponse::Ok().json(ApiSuccess::new(vehicle))),
        Ok(None) => Ok(vehicle_error_response(VehicleError::NotFound)),
        Err(e) => Ok(vehicle_error_response(e)),
    }
}

async fn update_vehicle(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<UpdateVehicleRequest>,
) -> Result<HttpResponse> {
    let principal = match require_principal(&req, &state) {
        Ok(principal) => principal,
        Err(response) => return Ok(response),
    };
    let vehicle_id = path.into_inner();

    let vehicle = match vehicle_service::get_vehicle(&state.db, &vehicle_id).await {
        Ok(Some(vehicle)) => vehicle,
        Ok(None) => return Ok(vehicle_error_response(VehicleError::NotFound)),
        Err(e) => return Ok(vehicle_error_response(e)),
    };
    let fleet = match load_fleet(&state, &vehicle.fleet_id).await {
        Ok(fleet) => fleet,
        Err(response) => return Ok(response),
    };
    if !authorized_for_owner(&principal, &fleet.owner_id) {
        return Ok(forbidden());
    }

    match vehicle_service::update_vehicle(&state.db, &vehicle_id, &body).await {
        Ok(updated) => {
            state
                .hub
                .publish_event(
                    &[fleet_group(&updated.fleet_id), owner_group(&fleet.owner_id)],
                    "VehicleUpdated",
                    serde_json::to_value(&updated).unwrap_or_default(),
                )
                .await;
            Ok(HttpResponse::Ok().json(ApiSuccess::new(updated)))
        }
        Err(e) => Ok(vehicle_error_response(e)),
    }
}

async fn delete_vehicle(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let principal = match require_principal(&req, &state) {
        Ok(principal) => principal,
        Err(response) => return Ok(response),
    };
    let vehicle_id = path.into_inner();

    let vehicle = match vehicle_service::get_vehicle(&state.db, &vehicle_id).await {
        Ok(Some(vehicle)) => vehicle,
        Ok(None) => return Ok(vehicle_error_response(VehicleError::NotFound)),
        Err(e) => return Ok(vehicle_error_response(e)),
    };
    let fleet = match load_fleet(&state, &vehicle.fleet_id).await {
        Ok(fleet) => fleet,
        Err(response) => return Ok(response),
    };
    if !authorized_for_owner(&principal, &fleet.owner_id) {
        return Ok(forbidden());
    }

    match vehicle_service::delete_vehicle(&state.db, &vehicle_id).await {
        Ok(deleted) => {
            state
                .hub
                .publish_event(
                    &[fleet_group(&deleted.fleet_id), owner_group(&fleet.owner_id)],
                    "VehicleDeleted",
                    serde_json::json!({
                        "vehicleId": deleted.id,
                        "fleetId": deleted.fleet_id,
                    }),
                )
                .await;
            Ok(HttpResponse::NoContent().finish())
        }
        Err(e) => Ok(vehicle_error_response(e)),
    }
}

fn vehicle_error_response(error: VehicleError) -> HttpResponse {
    match error {
        VehicleError::NotFound => HttpResponse::NotFound().json(ApiError {
            error: "not_found".to_string(),
            message: "Vehicle not found".to_string(),
        }),
        e => {
            log::error!("Vehicle handler error: {:?}", e);
            HttpResponse::InternalServerError().json(ApiError {
                error: "internal_error".to_string(),
                message: "An unexpected error occurred".to_string(),
            })
        }
    }
}
