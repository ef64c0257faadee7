use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::models::{OwnerRow, UserRow};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Token subject is not a valid id")]
    InvalidSubject,
}

/// Signed claims carried by an access token. Verification converts these
/// into an [`AuthenticatedUser`] once; nothing downstream reads raw claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub jti: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Typed principal derived from a verified access token.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct AuthenticatedUser {
    pub subject_id: Uuid,
    pub email: String,
    pub owner_id: Option<Uuid>,
    pub roles: HashSet<String>,
}

/// One issued access/refresh pair. The refresh token here is the plaintext
/// form; only its hash may reach the store.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Create a signed access token plus an opaque refresh token for a user.
/// Owner claims are attached when the user has a linked owner profile.
pub fn create_token_pair(
    settings: &JwtSettings,
    user: &UserRow,
    owner: Option<&OwnerRow>,
    roles: &[String],
) -> Result<TokenPair, TokenError> {
    let now = Utc::now();
    let expires_at = now + Duration::minutes(settings.access_token_minutes);

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        jti: Uuid::new_v4().to_string(),
        owner_id: owner.map(|o| o.id.clone()),
        owner_name: owner.map(|o| o.company_name.clone()),
        roles: roles.to_vec(),
        iss: settings.issuer.clone(),
        aud: settings.audience.clone(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let access_token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.signing_key.as_bytes()),
    )?;

    Ok(TokenPair {
        access_token,
        refresh_token: generate_refresh_token(),
        expires_at,
    })
}

/// 64 bytes of CSPRNG output, base64-encoded. Carries no claims.
pub fn generate_refresh_token() -> String {
    let mut buffer = [0u8; 64];
    OsRng.fill_bytes(&mut buffer);
    BASE64.encode(buffer)
}

/// One-way hash of a plaintext refresh token; the storage layer only ever
/// sees this form.
pub fn hash_refresh_token(plain_token: &str) -> String {
    let digest = Sha256::digest(plain_token.as_bytes());
    BASE64.encode(digest)
}

/// Validate signature, expiry, issuer, and audience, and build the typed
/// principal.
pub fn verify_access_token(
    settings: &JwtSettings,
    token: &str,
) -> Result<AuthenticatedUser, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&settings.issuer]);
    validation.set_audience(&[&settings.audience]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.signing_key.as_bytes()),
        &validation,
    )?;

    let claims = token_data.claims;
    let subject_id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::InvalidSubject)?;
    let owner_id = claims
        .owner_id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok());

    Ok(AuthenticatedUser {
        subject_id,
        email: claims.email,
        owner_id,
        roles: claims.roles.into_iter().collect(),
    })
}

/// Startup self-check: signing only fails on misconfiguration, so surface
/// that before the server accepts traffic.
pub fn ensure_signing_key(settings: &JwtSettings) -> Result<(), TokenError> {
    let probe = UserRow {
        id: Uuid::nil().to_string(),
        email: String::new(),
        password_hash: None,
        okta_user_id: None,
        last_login_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    };
    create_token_pair(settings, &probe, None, &[]).map(|_| ())
}
