use actix_web::HttpRequest;

use crate::config::JwtSettings;
use crate::services::tokens::{self, AuthenticatedUser};

/// Extract and verify the bearer principal from the Authorization header
pub fn extract_principal(
    req: &HttpRequest,
    jwt: &JwtSettings,
) -> Result<AuthenticatedUser, AuthMiddlewareError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or(AuthMiddlewareError::MissingToken)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthMiddlewareError::InvalidToken)?;

    if !auth_str.starts_with("Bearer ") {
        return Err(AuthMiddlewareError::InvalidToken);
    }

    let token = &auth_str[7..];

    tokens::verify_access_token(jwt, token).map_err(|_| AuthMiddlewareError::InvalidToken)
}

#[derive(Debug)]
pub enum AuthMiddlewareError {
    MissingToken,
    InvalidToken,
}

impl std::fmt::Display for AuthMiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMiddlewareError::MissingToken => write!(f, "Missing authorization token"),
            AuthMiddlewareError::InvalidToken => write!(f, "Invalid authorization token"),
        }
    }
}

impl std::error::Error for AuthMiddlewareError {}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::UserRow;
    use crate::services::tokens::create_token_pair;

    fn jwt_settings() -> JwtSettings {
        JwtSettings {
            signing_key: "test-signing-key".to_string(),
            issuer: "fleet-backend".to_string(),
            audience: "fleet-clients".to_string(),
            access_token_minutes: 30,
            refresh_token_days: 14,
        }
    }

    fn test_user() -> UserRow {
        let now = Utc::now();
        UserRow {
            id: Uuid::new_v4().to_string(),
            email: "ops@acme.test".to_string(),
            password_hash: None,
            okta_user_id: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_auth_error_display() {
        assert_eq!(
            AuthMiddlewareError::MissingToken.to_string(),
            "Missing authorization token"
        );
        assert_eq!(
            AuthMiddlewareError::InvalidToken.to_string(),
            "Invalid authorization token"
        );
    }

    #[test]
    fn test_extract_principal_from_bearer_header() {
        let jwt = jwt_settings();
        let user = test_user();
        let pair = create_token_pair(&jwt, &user, None, &["Owner".to_string()]).unwrap();

        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", pair.access_token)))
            .to_http_request();

        let principal = extract_principal(&req, &jwt).unwrap();
        assert_eq!(principal.subject_id.to_string(), user.id);
        assert!(principal.roles.contains("Owner"));
    }

    #[test]
    fn test_extract_principal_rejects_missing_and_malformed_headers() {
        let jwt = jwt_settings();

        let no_header = TestRequest::default().to_http_request();
        assert!(matches!(
            extract_principal(&no_header, &jwt),
            Err(AuthMiddlewareError::MissingToken)
        ));

        let not_bearer = TestRequest::default()
            .insert_header(("Authorization", "Basic abc"))
            .to_http_request();
        assert!(matches!(
            extract_principal(&not_bearer, &jwt),
            Err(AuthMiddlewareError::InvalidToken)
        ));

        let garbage = TestRequest::default()
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_http_request();
        assert!(matches!(
            extract_principal(&garbage, &jwt),
            Err(AuthMiddlewareError::InvalidToken)
        ));
    }
}
