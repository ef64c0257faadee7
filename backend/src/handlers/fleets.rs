use actix_web::{web, HttpRequest, HttpResponse, Result};
use uuid::Uuid;

use crate::models::AppState;
use crate::services::fleets::{self as fleet_service, FleetError};
use crate::services::tokens::AuthenticatedUser;
use crate::services::websocket::owner_group;
use shared::{ApiError, ApiSuccess, CreateFleetRequest, Role, UpdateFleetRequest};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/owners/{owner_id}/fleets",
        web::get().to(list_fleets),
    )
    .route(
        "/owners/{owner_id}/fleets",
        web::post().to(create_fleet),
    )
    .route("/fleets/{fleet_id}", web::put().to(update_fleet))
    .route("/fleets/{fleet_id}", web::delete().to(delete_fleet));
}

/// An owner may act on their own tenant; administrators on any
pub fn authorized_for_owner(principal: &AuthenticatedUser, owner_id: &Uuid) -> bool {
    principal.roles.contains(Role::Administrator.as_str())
        || principal.owner_id.as_ref() == Some(owner_id)
}

pub fn require_principal(
    req: &HttpRequest,
    state: &AppState,
) -> std::result::Result<AuthenticatedUser, HttpResponse> {
    crate::middleware::auth::extract_principal(req, &state.config.jwt).map_err(|_| {
        HttpResponse::Unauthorized().json(ApiError {
            error: "unauthorized".to_string(),
            message: "Invalid or missing token".to_string(),
        })
    })
}

pub fn forbidden() -> HttpResponse {
    HttpResponse::Forbidden().json(ApiError {
        error: "forbidden".to_string(),
        message: "You do not have access to this owner".to_string(),
    })
}

async fn list_fleets(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let principal = match require_principal(&req, &state) {
        Ok(principal) => principal,
        Err(response) => return Ok(response),
    };
    let owner_id = path.into_inner();
    if !authorized_for_owner(&principal, &owner_id) {
        return Ok(forbidden());
    }

    match fleet_service::list_owner_fleets(&state.db, &owner_id).await {
        Ok(fleets) => Ok(HttpResponse::Ok().json(ApiSuccess::new(fleets))),
        Err(e) => Ok(fleet_error_response(e)),
    }
}

async fn create_fleet(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<CreateFleetRequest>,
) -> Result<HttpResponse> {
    let principal = match require_principal(&req, &state) {
        Ok(principal) => principal,
        Err(response) => return Ok(response),
    };
    let owner_id = path.into_inner();
    if !authorized_for_owner(&principal, &owner_id) {
        return Ok(forbidden());
    }

    match fleet_service::create_fleet(&state.db, &owner_id, &body).await {
        Ok(fleet) => {
            state
                .hub
                .publish_event(
                    &[owner_group(&owner_id)],
                    "FleetCreated",
                    serde_json::to_value(&fleet).unwrap_or_default(),
                )
                .await;
            Ok(HttpResponse::Created().json(ApiSuccess::new(fleet)))
        }
        Err(e) => Ok(fleet_error_response(e)),
    }
}

async fn update_fleet(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<UpdateFleetRequest>,
) -> Result<HttpResponse> {
    let principal = match require_principal(&req, &state) {
        Ok(principal) => principal,
        Err(response) => return Ok(response),
    };
    let fleet_id = path.into_inner();

    let fleet = match fleet_service::get_fleet(&state.db, &fleet_id).await {
        Ok(Some(fleet)) => fleet,
        Ok(None) => return Ok(fleet_error_response(FleetError::NotFound)),
        Err(e) => return Ok(fleet_error_response(e)),
    };
    if !authorized_for_owner(&principal, &fleet.owner_id) {
        return Ok(forbidden());
    }

    match fleet_service::update_fleet(&state.db, &fleet_id, &body).await {
        Ok(updated) => {
            state
                .hub
                .publish_event(
                    &[owner_group(&updated.owner_id)],
                    "FleetUpdated",
                    serde_json::to_value(&updated).unwrap_or_default(),
                )
                .await;
            Ok(HttpResponse::Ok().json(ApiSuccess::new(updated)))
        }
        Err(e) => Ok(fleet_error_response(e)),
    }
}

async fn delete_fleet(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let principal = match require_principal(&req, &state) {
        Ok(principal) => principal,
        Err(response) => return Ok(response),
    };
    let fleet_id = path.into_inner();

    let fleet = match fleet_service::get_fleet(&state.db, &fleet_id).await {
        Ok(Some(fleet)) => fleet,
        Ok(None) => return Ok(fleet_error_response(FleetError::NotFound)),
        Err(e) => return Ok(fleet_error_response(e)),
    };
    if !authorized_for_owner(&principal, &fleet.owner_id) {
        return Ok(forbidden());
    }

    match fleet_service::delete_fleet(&state.db, &fleet_id).await {
        Ok(deleted) => {
            state
                .hub
                .publish_event(
                    &[owner_group(&deleted.owner_id)],
                    "FleetDeleted",
                    serde_json::json!({ "fleetId": deleted.id }),
                )
                .await;
            Ok(HttpResponse::NoContent().finish())
        }
        Err(e) => Ok(fleet_error_response(e)),
    }
}

fn fleet_error_response(error: FleetError) -> HttpResponse {
    match error {
        FleetError::NotFound => HttpResponse::NotFound().json(ApiError {
            error: "not_found".to_string(),
            message: "Fleet not found".to_string(),
        }),
        e => {
            log::error!("Fleet handler error: {:?}", e);
            HttpResponse::InternalServerError().json(ApiError {
                error: "internal_error".to_string(),
                message: "An unexpected error occurred".to_string(),
            })
        }
    }
}
