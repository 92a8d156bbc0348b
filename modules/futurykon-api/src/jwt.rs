use anyhow::Result;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use futurykon_common::UserDisplay;

/// Claims we read from access tokens issued by the hosted auth backend.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub iss: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct UserMetadata {
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| anyhow::anyhow!("token subject is not a user id"))
    }

    pub fn display(&self) -> UserDisplay {
        UserDisplay {
            display_name: self.user_metadata.display_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Verifies bearer tokens. Tokens are minted elsewhere; this side only
/// checks signature, expiry and (when configured) issuer.
#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
    issuer: Option<String>,
}

impl JwtService {
    pub fn new(secret: &str, issuer: Option<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Verify and decode a JWT token. Returns claims if valid and not expired.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub const SECRET: &str = "test-secret-key";

    pub fn token(secret: &str, sub: &str, issuer: Option<&str>, ttl_secs: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            email: Some("ada@example.com".into()),
            user_metadata: UserMetadata {
                display_name: Some("Ada".into()),
            },
            exp: now + ttl_secs,
            iat: Some(now),
            iss: issuer.map(str::to_string),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .unwrap()
    }

    pub fn user_token(user_id: Uuid) -> String {
        token(SECRET, &user_id.to_string(), None, 3600)
    }
}
