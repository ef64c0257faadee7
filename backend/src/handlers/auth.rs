use actix_web::{web, HttpResponse, Result};

use crate::models::AppState;
use crate::services::auth::{self as auth_service, AuthError};
use shared::{ApiError, LoginRequest, RefreshTokenRequest, RegisterOwnerRequest, RevokeTokenRequest};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register-owner", web::post().to(register_owner))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .route("/revoke", web::post().to(revoke)),
    );
}

async fn register_owner(
    state: web::Data<AppState>,
    body: web::Json<RegisterOwnerRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();

    if request.company_name.is_empty()
        || request.email.is_empty()
        || request.password.is_empty()
        || request.primary_contact_name.is_empty()
    {
        return Ok(HttpResponse::BadRequest().json(ApiError {
            error: "validation_error".to_string(),
            message: "Company name, email, password, and contact name are required".to_string(),
        }));
    }

    match auth_service::register_owner(&state.db, &state.config.jwt, &state.okta, &request).await {
        Ok(response) => Ok(HttpResponse::Created().json(response)),
        Err(e) => Ok(auth_error_response(e)),
    }
}

async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> Result<HttpResponse> {
    let request = body.into_inner();

    if !state.login_rate_limiter.check(&request.email) {
        return Ok(HttpResponse::TooManyRequests().json(ApiError {
            error: "rate_limited".to_string(),
            message: "Too many failed login attempts, try again later".to_string(),
        }));
    }

    match auth_service::login(&state.db, &state.config.jwt, &request).await {
        Ok(response) => {
            state.login_rate_limiter.clear(&request.email);
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            if matches!(e, AuthError::InvalidCredentials) {
                state.login_rate_limiter.record(&request.email);
            }
            Ok(auth_error_response(e))
        }
    }
}

async fn refresh(
    state: web::Data<AppState>,
    body: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse> {
    match auth_service::refresh(&state.db, &state.config.jwt, &body.refresh_token).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => Ok(auth_error_response(e)),
    }
}

async fn revoke(
    state: web::Data<AppState>,
    body: web::Json<RevokeTokenRequest>,
) -> Result<HttpResponse> {
    match auth_service::revoke(&state.db, &body.refresh_token).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(auth_error_response(e)),
    }
}

/// Map session-manager errors onto the response taxonomy. Authentication
/// failures share one body so the response never reveals which check fired;
/// a lost rotation race is an expected 401, not a 500.
fn auth_error_response(error: AuthError) -> HttpResponse {
    match error {
        AuthError::Validation(message) => HttpResponse::BadRequest().json(ApiError {
            error: "validation_error".to_string(),
            message,
        }),
        AuthError::InvalidCredentials => HttpResponse::Unauthorized().json(ApiError {
            error: "authentication_error".to_string(),
            message: "Invalid credentials".to_string(),
        }),
        AuthError::InvalidRefreshToken => HttpResponse::Unauthorized().json(ApiError {
            error: "authentication_error".to_string(),
            message: "Refresh token is invalid or expired".to_string(),
        }),
        e => {
            log::error!("Unexpected auth error: {:?}", e);
            HttpResponse::InternalServerError().json(ApiError {
                error: "internal_error".to_string(),
                message: "An unexpected error occurred".to_string(),
            })
        }
    }
}
