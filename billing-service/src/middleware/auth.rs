//! Identity-provider boundary.
//!
//! The identity provider authenticates the caller and hands us a signed
//! HS256 token carrying the stable external id and verified email. This
//! middleware verifies the token and exposes the identity to handlers;
//! nothing else about the provider is assumed.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Claims the identity provider puts in caller tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Stable external user id.
    pub sub: String,
    /// Verified email address.
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub exp: i64,
}

/// The authenticated caller as seen by the core: what the identity
/// adapter needs and nothing more.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl From<IdentityClaims> for ExternalIdentity {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            external_id: claims.sub,
            email: claims.email,
            name: claims.name,
            phone: claims.phone,
        }
    }
}

/// Validate a caller token against the configured identity secret.
pub fn validate_identity_token(secret: &str, token: &str) -> Result<IdentityClaims, jsonwebtoken::errors::Error> {
    let data = decode::<IdentityClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Sign a caller token the way the identity provider would. Used by the
/// test harness and local tooling.
pub fn sign_identity_token(secret: &str, claims: &IdentityClaims) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Require a valid identity token on the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let token = match token {
        Some(token) => token,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing or invalid Authorization header".to_string(),
                }),
            ));
        }
    };

    let secret = state.config.identity.jwt_secret.expose_secret();
    let claims = match validate_identity_token(secret, token) {
        Ok(claims) => claims,
        Err(_) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or expired token".to_string(),
                }),
            ));
        }
    };

    req.extensions_mut().insert(ExternalIdentity::from(claims));

    Ok(next.run(req).await)
}

/// Extractor handlers use to get the authenticated identity.
pub struct AuthUser(pub ExternalIdentity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<ExternalIdentity>().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Identity missing from request extensions".to_string(),
            }),
        ))?;

        Ok(AuthUser(identity.clone()))
    }
}
