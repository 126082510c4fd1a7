use crate::models::user::UserRole;
use crate::token::{Expiring, HmacSha256Verifier, Token, TokenError};

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum AuthTokenType {
    Access,
    Refresh,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthTokenClaims {
    #[serde(rename = "uid")]
    pub user_id: Uuid,
    #[serde(rename = "rol")]
    pub role: UserRole,
    #[serde(rename = "exp")]
    pub expiration: u64,
    #[serde(rename = "typ")]
    pub token_type: AuthTokenType,
}

impl AuthTokenClaims {
    pub fn new(
        user_id: Uuid,
        role: UserRole,
        token_type: AuthTokenType,
        lifetime: Duration,
    ) -> Result<Self, TokenError> {
        let expiration = (SystemTime::now() + lifetime)
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TokenError::SigningFailed)?
            .as_secs();

        Ok(Self {
            user_id,
            role,
            expiration,
            token_type,
        })
    }
}

impl Expiring for AuthTokenClaims {
    fn expiration(&self) -> u64 {
        self.expiration
    }
}

pub struct AuthToken {}

impl AuthToken {
    pub fn sign_new(claims: &AuthTokenClaims, signing_key: &[u8]) -> Result<String, TokenError> {
        let token_unencoded =
            serde_json::to_vec(claims).map_err(|_| TokenError::SigningFailed)?;
        HmacSha256Verifier::sign(token_unencoded, signing_key)
    }
}

impl Token for AuthToken {
    type Claims = AuthTokenClaims;
    type Verifier = HmacSha256Verifier;

    fn token_name() -> &'static str {
        "AuthToken"
    }
}
