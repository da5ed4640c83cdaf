//! Bearer-token authentication and the capability policy
//!
//! Every route runs one check, `authorize(role, resource, action)`, at the
//! API boundary. The settlement engine itself knows nothing about callers.

use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;
use types::ids::{AccountId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    OrderManager,
    Customer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Orders,
    Accounts,
    Assets,
    Ledger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Cancel,
}

/// The capability table.
pub fn authorize(role: Role, resource: Resource, action: Action) -> bool {
    match role {
        Role::Admin => true,
        Role::OrderManager => match resource {
            Resource::Orders => true,
            Resource::Accounts | Resource::Ledger | Resource::Assets => action == Action::Read,
        },
        Role::Customer => match resource {
            Resource::Orders => matches!(action, Action::Create | Action::Read | Action::Cancel),
            Resource::Accounts => action == Action::Read,
            Resource::Ledger | Resource::Assets => false,
        },
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub exp: u64,
    pub role: Role,
    /// The one account a customer may act on
    #[serde(default)]
    pub account_id: Option<AccountId>,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub role: Role,
    pub account_id: Option<AccountId>,
}

impl AuthenticatedUser {
    pub fn require(&self, resource: Resource, action: Action) -> Result<(), AppError> {
        if authorize(self.role, resource, action) {
            return Ok(());
        }
        warn!(user_id = %self.user_id, role = ?self.role, ?resource, ?action, "Access denied");
        Err(AppError::Forbidden(format!(
            "{:?} may not {:?} {:?}",
            self.role, action, resource
        )))
    }

    /// Customers are confined to their own account.
    pub fn require_account(&self, account_id: AccountId) -> Result<(), AppError> {
        if self.role != Role::Customer || self.account_id == Some(account_id) {
            return Ok(());
        }
        warn!(user_id = %self.user_id, account_id = %account_id, "Access to foreign account denied");
        Err(AppError::Forbidden("Cannot act on another account".to_string()))
    }
}

pub fn decoding_key(secret: &str) -> DecodingKey {
    DecodingKey::from_secret(secret.as_bytes())
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .ok_or_else(|| AppError::Unauthorized("Missing authentication credentials".to_string()))?;
        let header = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid header string".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Expected a bearer token".into()))?;

        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(token, &state.decoding_key, &validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;
        let claims = token_data.claims;
        let user_id = UserId::from_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Token subject is not a user id".into()))?;

        Ok(AuthenticatedUser {
            user_id,
            role: claims.role,
            account_id: claims.account_id,
        })
    }
}
