//! Users as seen by circulation: roles, JWT claims and contact details

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::AppError;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Staff,
    Admin,
}

/// Authenticated identity performing a circulation operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i32,
    pub role: Role,
}

impl Actor {
    pub fn member(user_id: i32) -> Self {
        Self {
            user_id,
            role: Role::Member,
        }
    }

    pub fn staff(user_id: i32) -> Self {
        Self {
            user_id,
            role: Role::Staff,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Staff | Role::Admin)
    }

    /// Require staff or admin role
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Unauthorized("Staff privileges required".to_string()))
        }
    }

    /// Members may only act on their own records; staff may act on any
    pub fn require_owner_or_staff(&self, owner_id: i32) -> Result<(), AppError> {
        if self.is_staff() || self.user_id == owner_id {
            Ok(())
        } else {
            Err(AppError::Unauthorized(format!(
                "User {} cannot act on records of user {}",
                self.user_id, owner_id
            )))
        }
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user_id: i32, role: Role, expiration_hours: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            user_id,
            role,
            exp: now + (expiration_hours as i64) * 3600,
            iat: now,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
        }
    }
}

/// Contact details used to address circulation notices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserContact {
    pub id: i32,
    pub display_name: String,
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip_keeps_role() {
        let claims = UserClaims::new(42, Role::Staff, 1);
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.actor(), Actor::staff(42));
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_member_ownership() {
        let member = Actor::member(5);
        assert!(member.require_owner_or_staff(5).is_ok());
        assert!(matches!(
            member.require_owner_or_staff(6),
            Err(AppError::Unauthorized(_))
        ));
        assert!(member.require_staff().is_err());

        let admin = Actor {
            user_id: 1,
            role: Role::Admin,
        };
        assert!(admin.require_staff().is_ok());
        assert!(admin.require_owner_or_staff(6).is_ok());
    }
}
