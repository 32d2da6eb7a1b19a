//! Authentication and authorization
//!
//! Tokens carry the caller's identity, role and (for a chef) the led team.
//! The middleware turns valid claims into a [`core_kernel::Actor`]; all
//! finer-grained authorization lives in the domain services, keyed on the
//! role.

use chrono::{Duration, Utc};
use core_kernel::{Actor, Role, TeamId, UserId};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Wire name of the user's role, e.g. `CHEF_EQUIPE`
    pub role: String,
    /// Led or joined team, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// Resolves the claims into the domain actor
    pub fn actor(&self) -> Result<Actor, AuthError> {
        let user_id = self
            .sub
            .parse::<Uuid>()
            .map(UserId::from_uuid)
            .map_err(|_| AuthError::InvalidClaims("sub is not a uuid".to_string()))?;
        let role: Role = self
            .role
            .parse()
            .map_err(|_| AuthError::InvalidClaims(format!("unknown role {}", self.role)))?;
        let mut actor = Actor::new(user_id, role);
        if let Some(team) = &self.team {
            let team_id = team
                .parse::<Uuid>()
                .map(TeamId::from_uuid)
                .map_err(|_| AuthError::InvalidClaims("team is not a uuid".to_string()))?;
            actor = actor.with_team(team_id);
        }
        Ok(actor)
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `user_id` - User identifier
/// * `role` - Wire name of the user's role
/// * `team` - Led team for a chef, joined team otherwise
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    user_id: &str,
    role: &str,
    team: Option<&str>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        team: team.map(str::to_string),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
///
/// # Arguments
///
/// * `token` - The JWT token to validate
/// * `secret` - JWT secret key
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        if e.to_string().contains("ExpiredSignature") {
            AuthError::TokenExpired
        } else {
            AuthError::InvalidToken
        }
    })?;

    Ok(token_data.claims)
}
