use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use rand_core::OsRng;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::models::{OwnerRow, RefreshTokenRow, UserRow};
use crate::services::okta::OktaDirectory;
use crate::services::tokens::{self, TokenError, TokenPair};
use shared::{AuthResponse, LoginRequest, RegisterOwnerRequest, Role};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    // Unknown email and wrong password must be indistinguishable
    #[error("Invalid credentials")]
    InvalidCredentials,
    // Not-found, expired, and revoked are deliberately collapsed
    #[error("Refresh token is invalid or expired")]
    InvalidRefreshToken,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Password hashing error")]
    Hashing,
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

/// Register a new owner tenant: user + default role + owner profile are one
/// transaction, then a token pair is issued and the refresh half persisted.
pub async fn register_owner(
    pool: &SqlitePool,
    jwt: &JwtSettings,
    okta: &OktaDirectory,
    request: &RegisterOwnerRequest,
) -> Result<AuthResponse, AuthError> {
    validate_password(&request.password, &request.company_name)?;
    ensure_email_is_unique(pool, &request.email).await?;

    let password_hash = hash_password(&request.password)?;
    let now = Utc::now();
    let user_id = Uuid::new_v4();
    let owner_id = Uuid::new_v4();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id.to_string())
    .bind(&request.email)
    .bind(&password_hash)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO user_roles (user_id, role) VALUES (?, ?)")
        .bind(user_id.to_string())
        .bind(Role::Owner.as_str())
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO owners (
            id, identity_user_id, company_name, contact_email, contact_phone,
            primary_contact_name, city, country, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(owner_id.to_string())
    .bind(user_id.to_string())
    .bind(&request.company_name)
    .bind(&request.email)
    .bind(&request.phone_number)
    .bind(&request.primary_contact_name)
    .bind(&request.city)
    .bind(&request.country)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    // Best-effort federation; the registration stands even when the
    // directory is unreachable or unconfigured.
    let (first_name, last_name) = split_contact_name(&request.primary_contact_name);
    if let Some(group_id) = okta.ensure_owner_group(&request.company_name).await {
        sqlx::query("UPDATE owners SET okta_group_id = ? WHERE id = ?")
            .bind(&group_id)
            .bind(owner_id.to_string())
            .execute(pool)
            .await?;
    }
    if let Some(okta_user_id) = okta
        .provision_user(&request.email, &request.password, first_name, last_name)
        .await
    {
        sqlx::query("UPDATE users SET okta_user_id = ? WHERE id = ?")
            .bind(&okta_user_id)
            .bind(user_id.to_string())
            .execute(pool)
            .await?;
    }

    let user = find_user_by_id(pool, &user_id)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    let owner = find_owner_by_user(pool, &user.id).await?;
    let roles = load_roles(pool, &user.id).await?;

    let pair = tokens::create_token_pair(jwt, &user, owner.as_ref(), &roles)?;
    persist_refresh_token(pool, &user.id, &pair.refresh_token, jwt.refresh_token_days).await?;

    log::info!("Registered owner {} for user {}", owner_id, user_id);

    Ok(build_response(pair, owner))
}

/// Authenticate by email and password; issues a fresh pair without touching
/// other live sessions (multi-device by design).
pub async fn login(
    pool: &SqlitePool,
    jwt: &JwtSettings,
    request: &LoginRequest,
) -> Result<AuthResponse, AuthError> {
    let user = find_user_by_email(pool, &request.email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let password_hash = user
        .password_hash
        .as_ref()
        .ok_or(AuthError::InvalidCredentials)?;
    verify_password(&request.password, password_hash)?;

    let now = Utc::now();
    sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(&user.id)
        .execute(pool)
        .await?;

    let owner = find_owner_by_user(pool, &user.id).await?;
    let roles = load_roles(pool, &user.id).await?;

    let pair = tokens::create_token_pair(jwt, &user, owner.as_ref(), &roles)?;
    persist_refresh_token(pool, &user.id, &pair.refresh_token, jwt.refresh_token_days).await?;

    Ok(build_response(pair, owner))
}

/// Exchange an active refresh token for a new pair. Single-use: the matched
/// token is revoked in the same transaction that inserts its replacement,
/// and the revoke is conditional so that of two racing calls exactly one
/// wins and the other sees the token as already rotated.
pub async fn refresh(
    pool: &SqlitePool,
    jwt: &JwtSettings,
    plain_token: &str,
) -> Result<AuthResponse, AuthError> {
    let token_hash = tokens::hash_refresh_token(plain_token);
    let now = Utc::now();

    let stored: RefreshTokenRow = sqlx::query_as("SELECT * FROM refresh_tokens WHERE token_hash = ?")
        .bind(&token_hash)
        .fetch_optional(pool)
        .await?
        .ok_or(AuthError::InvalidRefreshToken)?;

    if !stored.is_active(now) {
        return Err(AuthError::InvalidRefreshToken);
    }

    let user_id = Uuid::parse_str(&stored.user_id).map_err(|_| AuthError::InvalidRefreshToken)?;
    let user = find_user_by_id(pool, &user_id)
        .await?
        .ok_or(AuthError::InvalidRefreshToken)?;
    let owner = find_owner_by_user(pool, &user.id).await?;
    let roles = load_roles(pool, &user.id).await?;

    let pair = tokens::create_token_pair(jwt, &user, owner.as_ref(), &roles)?;
    let replacement_hash = tokens::hash_refresh_token(&pair.refresh_token);

    let mut tx = pool.begin().await?;

    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked_at = ?, replaced_by_token = ?
        WHERE id = ? AND revoked_at IS NULL
        "#,
    )
    .bind(now)
    .bind(&replacement_hash)
    .bind(&stored.id)
    .execute(&mut *tx)
    .await?;

    if revoked.rows_affected() == 0 {
        // A concurrent refresh rotated this token first
        tx.rollback().await?;
        return Err(AuthError::InvalidRefreshToken);
    }

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&user.id)
    .bind(&replacement_hash)
    .bind(now + Duration::days(jwt.refresh_token_days))
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(build_response(pair, owner))
}

/// Logout path. Revoking an unknown token is an error; revoking a token
/// that is already revoked is an idempotent no-op. Access tokens already in
/// flight stay valid until their natural expiry.
pub async fn revoke(pool: &SqlitePool, plain_token: &str) -> Result<(), AuthError> {
    let token_hash = tokens::hash_refresh_token(plain_token);
    let now = Utc::now();

    let updated = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = ? WHERE token_hash = ? AND revoked_at IS NULL",
    )
    .bind(now)
    .bind(&token_hash)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM refresh_tokens WHERE token_hash = ?",
        )
        .bind(&token_hash)
        .fetch_one(pool)
        .await?;

        if exists == 0 {
            return Err(AuthError::InvalidRefreshToken);
        }
    }

    Ok(())
}

pub async fn find_user_by_id(pool: &SqlitePool, user_id: &Uuid) -> Result<Option<UserRow>, AuthError> {
    let user: Option<UserRow> =
        sqlx::query_as("SELECT * FROM users WHERE id = ? AND deleted_at IS NULL")
            .bind(user_id.to_string())
            .fetch_optional(pool)
            .await?;

    Ok(user)
}

async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserRow>, AuthError> {
    // The email column is COLLATE NOCASE, so equality is case-insensitive
    let user: Option<UserRow> =
        sqlx::query_as("SELECT * FROM users WHERE email = ? AND deleted_at IS NULL")
            .bind(email)
            .fetch_optional(pool)
            .await?;

    Ok(user)
}

pub async fn find_owner_by_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<OwnerRow>, AuthError> {
    let owner: Option<OwnerRow> =
        sqlx::query_as("SELECT * FROM owners WHERE identity_user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(owner)
}

async fn load_roles(pool: &SqlitePool, user_id: &str) -> Result<Vec<String>, AuthError> {
    let roles = sqlx::query_scalar::<_, String>(
        "SELECT role FROM user_roles WHERE user_id = ? ORDER BY role",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(roles)
}

async fn ensure_email_is_unique(pool: &SqlitePool, email: &str) -> Result<(), AuthError> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if existing > 0 {
        return Err(AuthError::Validation(
            "Email address already exists".to_string(),
        ));
    }

    Ok(())
}

async fn persist_refresh_token(
    pool: &SqlitePool,
    user_id: &str,
    plain_token: &str,
    refresh_token_days: i64,
) -> Result<(), AuthError> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(tokens::hash_refresh_token(plain_token))
    .bind(now + Duration::days(refresh_token_days))
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

fn build_response(pair: TokenPair, owner: Option<OwnerRow>) -> AuthResponse {
    AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_at_utc: pair.expires_at,
        owner: owner.map(|o| o.to_summary()),
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::Hashing)?;

    Ok(hash.to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(stored_hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

fn validate_password(password: &str, company_name: &str) -> Result<(), AuthError> {
    if password.chars().count() < 12 {
        return Err(AuthError::Validation(
            "Password must be at least 12 characters".to_string(),
        ));
    }

    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_alphanumeric());
    if !(has_upper && has_lower && has_digit && has_symbol) {
        return Err(AuthError::Validation(
            "Password must mix upper and lower case letters, digits, and symbols".to_string(),
        ));
    }

    if !company_name.is_empty()
        && password
            .to_lowercase()
            .contains(&company_name.to_lowercase())
    {
        return Err(AuthError::Validation(
            "Password cannot contain company name".to_string(),
        ));
    }

    Ok(())
}

fn split_contact_name(full_name: &str) -> (&str, &str) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or(full_name);
    let last = parts.last().unwrap_or(first);
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OktaSettings;
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

    fn jwt_settings() -> JwtSettings {
        JwtSettings {
            signing_key: "test-signing-key".to_string(),
            issuer: "fleet-backend".to_string(),
            audience: "fleet-clients".to_string(),
            access_token_minutes: 30,
            refresh_token_days: 14,
        }
    }

    fn disabled_okta() -> OktaDirectory {
        OktaDirectory::new(&OktaSettings {
            domain: None,
            api_token: None,
            timeout_secs: 1,
        })
    }

    fn register_request() -> RegisterOwnerRequest {
        RegisterOwnerRequest {
            company_name: "Acme".to_string(),
            email: "a@acme.test".to_string(),
            password: "CorrectHorse99!".to_string(),
            primary_contact_name: "Jo Doe".to_string(),
            phone_number: None,
            city: Some("Berlin".to_string()),
            country: Some("Germany".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_returns_owner_summary() {
        let pool = setup_pool().await;
        let response = register_owner(&pool, &jwt_settings(), &disabled_okta(), &register_request())
            .await
            .unwrap();

        let owner = response.owner.unwrap();
        assert_eq!(owner.company_name, "Acme");
        assert_eq!(owner.contact_email, "a@acme.test");
        assert!(!response.access_token.is_empty());
        assert!(!response.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_rejected() {
        let pool = setup_pool().await;
        let jwt = jwt_settings();
        let okta = disabled_okta();

        register_owner(&pool, &jwt, &okta, &register_request())
            .await
            .unwrap();

        // Same address, different case
        let mut second = register_request();
        second.email = "A@ACME.TEST".to_string();
        second.company_name = "Other Co".to_string();
        let result = register_owner(&pool, &jwt, &okta, &second).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));

        let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 1);
    }

    #[tokio::test]
    async fn test_register_rejects_password_containing_company_name() {
        let pool = setup_pool().await;
        let mut request = register_request();
        request.password = "SuperAcme2024!x".to_string();

        let result =
            register_owner(&pool, &jwt_settings(), &disabled_okta(), &request).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));

        let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 0);
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let pool = setup_pool().await;
        let mut request = register_request();
        request.password = "short1!A".to_string();

        let result =
            register_owner(&pool, &jwt_settings(), &disabled_okta(), &request).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_errors_are_indistinguishable() {
        let pool = setup_pool().await;
        let jwt = jwt_settings();

        register_owner(&pool, &jwt, &disabled_okta(), &register_request())
            .await
            .unwrap();

        let wrong_password = login(
            &pool,
            &jwt,
            &LoginRequest {
                email: "a@acme.test".to_string(),
                password: "WrongHorse99!x".to_string(),
            },
        )
        .await
        .unwrap_err();

        let unknown_email = login(
            &pool,
            &jwt,
            &LoginRequest {
                email: "nobody@acme.test".to_string(),
                password: "CorrectHorse99!".to_string(),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_login_issues_fresh_pair_and_stamps_last_login() {
        let pool = setup_pool().await;
        let jwt = jwt_settings();

        let registered = register_owner(&pool, &jwt, &disabled_okta(), &register_request())
            .await
            .unwrap();

        let logged_in = login(
            &pool,
            &jwt,
            &LoginRequest {
                email: "a@acme.test".to_string(),
                password: "CorrectHorse99!".to_string(),
            },
        )
        .await
        .unwrap();

        assert_ne!(registered.refresh_token, logged_in.refresh_token);
        assert_eq!(logged_in.owner.unwrap().company_name, "Acme");

        let last_login: Option<chrono::DateTime<Utc>> =
            sqlx::query_scalar("SELECT last_login_at FROM users WHERE email = ?")
                .bind("a@acme.test")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(last_login.is_some());
    }

    #[tokio::test]
    async fn test_refresh_tokens_are_single_use() {
        let pool = setup_pool().await;
        let jwt = jwt_settings();

        let registered = register_owner(&pool, &jwt, &disabled_okta(), &register_request())
            .await
            .unwrap();

        let rotated = refresh(&pool, &jwt, &registered.refresh_token)
            .await
            .unwrap();
        assert_ne!(rotated.refresh_token, registered.refresh_token);

        // Reusing the rotated-away token must fail...
        let reuse = refresh(&pool, &jwt, &registered.refresh_token).await;
        assert!(matches!(reuse, Err(AuthError::InvalidRefreshToken)));

        // ...while its replacement still works
        let again = refresh(&pool, &jwt, &rotated.refresh_token).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_rotation_links_replacement_token() {
        let pool = setup_pool().await;
        let jwt = jwt_settings();

        let registered = register_owner(&pool, &jwt, &disabled_okta(), &register_request())
            .await
            .unwrap();
        let rotated = refresh(&pool, &jwt, &registered.refresh_token)
            .await
            .unwrap();

        let old_hash = tokens::hash_refresh_token(&registered.refresh_token);
        let stored: RefreshTokenRow =
            sqlx::query_as("SELECT * FROM refresh_tokens WHERE token_hash = ?")
                .bind(&old_hash)
                .fetch_one(&pool)
                .await
                .unwrap();

        assert!(stored.revoked_at.is_some());
        assert_eq!(
            stored.replaced_by_token.as_deref(),
            Some(tokens::hash_refresh_token(&rotated.refresh_token).as_str())
        );
    }

    #[tokio::test]
    async fn test_revoke_then_refresh_fails() {
        let pool = setup_pool().await;
        let jwt = jwt_settings();

        let registered = register_owner(&pool, &jwt, &disabled_okta(), &register_request())
            .await
            .unwrap();

        revoke(&pool, &registered.refresh_token).await.unwrap();

        let result = refresh(&pool, &jwt, &registered.refresh_token).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent_for_known_tokens() {
        let pool = setup_pool().await;
        let jwt = jwt_settings();

        let registered = register_owner(&pool, &jwt, &disabled_okta(), &register_request())
            .await
            .unwrap();

        revoke(&pool, &registered.refresh_token).await.unwrap();
        revoke(&pool, &registered.refresh_token).await.unwrap();

        let unknown = revoke(&pool, "not-a-real-token").await;
        assert!(matches!(unknown, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_even_if_unrevoked() {
        let pool = setup_pool().await;
        let jwt = jwt_settings();

        let registered = register_owner(&pool, &jwt, &disabled_okta(), &register_request())
            .await
            .unwrap();

        let token_hash = tokens::hash_refresh_token(&registered.refresh_token);
        sqlx::query("UPDATE refresh_tokens SET expires_at = ? WHERE token_hash = ?")
            .bind(Utc::now() - Duration::minutes(1))
            .bind(&token_hash)
            .execute(&pool)
            .await
            .unwrap();

        let result = refresh(&pool, &jwt, &registered.refresh_token).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_register_login_refresh_scenario() {
        let pool = setup_pool().await;
        let jwt = jwt_settings();
        let okta = disabled_okta();

        // Register owner "Acme"
        let registered = register_owner(&pool, &jwt, &okta, &register_request())
            .await
            .unwrap();
        assert_eq!(registered.owner.as_ref().unwrap().company_name, "Acme");

        // Login issues a distinct refresh token
        let logged_in = login(
            &pool,
            &jwt,
            &LoginRequest {
                email: "a@acme.test".to_string(),
                password: "CorrectHorse99!".to_string(),
            },
        )
        .await
        .unwrap();
        assert_ne!(logged_in.refresh_token, registered.refresh_token);

        // Registration's token was never rotated, so it works exactly once
        let rotated = refresh(&pool, &jwt, &registered.refresh_token)
            .await
            .unwrap();
        assert!(rotated.owner.is_some());

        let retry = refresh(&pool, &jwt, &registered.refresh_token).await;
        assert!(matches!(retry, Err(AuthError::InvalidRefreshToken)));

        // The login session is untouched by that rotation
        assert!(refresh(&pool, &jwt, &logged_in.refresh_token).await.is_ok());
    }

    #[test]
    fn test_validate_password_policy() {
        assert!(validate_password("CorrectHorse99!", "Acme").is_ok());
        // too short
        assert!(validate_password("Ab1!", "Acme").is_err());
        // missing digit
        assert!(validate_password("CorrectHorse!!", "Acme").is_err());
        // missing symbol
        assert!(validate_password("CorrectHorse99", "Acme").is_err());
        // company name embedded, case-insensitive
        assert!(validate_password("xxACME99!horse", "Acme").is_err());
    }

    #[test]
    fn test_split_contact_name() {
        assert_eq!(split_contact_name("Jo Doe"), ("Jo", "Doe"));
        assert_eq!(split_contact_name("Cher"), ("Cher", "Cher"));
        assert_eq!(split_contact_name("Ana de la Cruz"), ("Ana", "Cruz"));
    }
}
