//! HS256 claims for the auth gate.
//!
//! Tokens are stateless: nothing is stored server side, so a token stays
//! valid until `exp` whatever happens to the account meanwhile.

use chrono::{DateTime, Duration, Utc};
use domains::{DomainError, IssuedToken, Result, TokenService};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user id
    iat: i64,
    exp: i64,
}

pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtTokenService {
    /// `secret` is the process-wide signing key, read once at startup.
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    fn issue_at(&self, user_id: Uuid, issued_at: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = issued_at + self.ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| DomainError::internal(format!("failed to sign token: {e}")))?;
        Ok(IssuedToken { token, expires_at })
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, user_id: Uuid) -> Result<IssuedToken> {
        self.issue_at(user_id, Utc::now())
    }

    fn verify(&self, token: &str) -> Result<Uuid> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            DomainError::InvalidToken
        })?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| DomainError::InvalidToken)
    }
}
