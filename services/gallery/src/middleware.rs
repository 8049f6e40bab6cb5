//! Admin authentication for JWT bearer tokens
//!
//! Admin and public handlers share paths, so authentication is an extractor
//! rather than a route layer. Handlers that only admins may call take
//! [`AdminUser`]; read handlers take `Option<AdminUser>` to skip gating.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{env, time::Duration};
use tracing::{debug, warn};

use crate::{error::ApiError, state::AppState};

/// Role a token must carry to manage media
pub const ADMIN_ROLE: &str = "admin";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, usually the dashboard user name
    pub sub: String,
    pub roles: Vec<String>,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Authenticated admin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser {
    pub subject: String,
}

/// JWT configuration
#[derive(Clone)]
pub struct AdminAuthConfig {
    secret: String,
    issuer: Option<String>,
}

impl AdminAuthConfig {
    pub fn new(secret: impl Into<String>, issuer: Option<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer,
        }
    }

    /// Create a new AdminAuthConfig from environment variables
    pub fn from_env() -> Result<Self, String> {
        let secret = env::var("ADMIN_JWT_SECRET")
            .map_err(|_| "ADMIN_JWT_SECRET environment variable not set".to_string())?;
        if secret.trim().is_empty() {
            return Err("ADMIN_JWT_SECRET must not be empty".to_string());
        }

        let issuer = env::var("ADMIN_JWT_ISSUER")
            .ok()
            .filter(|issuer| !issuer.is_empty());

        Ok(Self::new(secret, issuer))
    }

    /// Sign an admin token for `subject`, valid for `ttl`.
    pub fn issue_token(
        &self,
        subject: &str,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: subject.to_string(),
            roles: vec![ADMIN_ROLE.to_string()],
            iat: now,
            exp: now + ttl.as_secs(),
            iss: self.issuer.clone(),
        };

        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    /// Validate a bearer token and require the admin role.
    pub fn verify(&self, token: &str) -> Result<AdminUser, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["exp", "iss"]);
        }

        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!("Rejected admin token: {}", e);
            ApiError::Unauthorized
        })?;

        if !token_data.claims.roles.iter().any(|r| r == ADMIN_ROLE) {
            warn!(
                "Token for {} lacks the {} role",
                token_data.claims.sub, ADMIN_ROLE
            );
            return Err(ApiError::Unauthorized);
        }

        Ok(AdminUser {
            subject: token_data.claims.sub,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized)?;

        state.auth.verify(bearer.token())
    }
}
