use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use tracing::debug;

use chatcoder_types::api::Claims;

/// Issues and verifies signed, time-limited bearer tokens.
///
/// Tokens are compact HS256 JWTs (`header.payload.signature`, base64url).
/// Signature checks go through `jsonwebtoken`, which compares MACs in
/// constant time.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, username: &str) -> Result<String> {
        self.issue_at(username, Utc::now())
    }

    pub fn issue_at(&self, username: &str, now: DateTime<Utc>) -> Result<String> {
        let iat = now.timestamp();
        let claims = Claims {
            username: username.to_string(),
            iat,
            exp: iat + self.ttl.num_seconds(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Option<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Returns the claims iff the signature verifies and `now < exp`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<Claims> {
        if token.split('.').count() != 3 {
            debug!("Rejecting token: not three segments");
            return None;
        }

        // Expiry is checked below against the caller's clock, without leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let claims = match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!("Rejecting token: {}", e);
                return None;
            }
        };

        if now.timestamp() >= claims.exp {
            debug!("Rejecting token for {}: expired", claims.username);
            return None;
        }

        Some(claims)
    }
}

/// Random 256-bit secret, base64 encoded, for deployments that configure none.
pub fn generate_secret() -> String {
    let mut secret = [0u8; 32];
    rand::rng().fill_bytes(&mut secret);
    B64.encode(secret)
}
