//! Signed access tokens.

use base64::Engine;
use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccessClaims {
    email: String,
}

/// Verified contents of an access token.
#[derive(Debug, Clone)]
pub struct Claims {
    pub user_id: i32,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct JwtConfig {
    key_pair: Arc<Ed25519KeyPair>,
    public_key: Arc<Ed25519PublicKey>,
    pub access_token_expiry: i64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl JwtConfig {
    /// Uses the base64 Ed25519 key from `JWT_PRIVATE_KEY`. Without one, a key
    /// is generated for this process and tokens stop verifying on restart.
    pub fn from_config(config: &Config) -> Result<Self> {
        let key_pair = match &config.jwt.private_key {
            Some(encoded) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| Error::Token(format!("JWT_PRIVATE_KEY is not base64: {}", e)))?;
                Ed25519KeyPair::from_bytes(&bytes)
                    .map_err(|e| Error::Token(format!("JWT_PRIVATE_KEY is not Ed25519: {}", e)))?
            }
            None => {
                warn!("JWT_PRIVATE_KEY not set; using an ephemeral signing key");
                Ed25519KeyPair::generate()
            }
        };

        let mut jwt = Self::from_key_pair(key_pair);
        jwt.access_token_expiry = config.jwt.access_token_expiry_secs;
        jwt.issuer = config.jwt.issuer.clone();
        jwt.audience = config.jwt.audience.clone();
        Ok(jwt)
    }

    pub fn from_key_pair(key_pair: Ed25519KeyPair) -> Self {
        let public_key = key_pair.public_key();
        Self {
            key_pair: Arc::new(key_pair),
            public_key: Arc::new(public_key),
            access_token_expiry: 3600,
            issuer: None,
            audience: None,
        }
    }

    /// Returns `(private, public)`, both base64.
    pub fn generate_key_pair() -> (String, String) {
        let engine = base64::engine::general_purpose::STANDARD;
        let key_pair = Ed25519KeyPair::generate();
        (
            engine.encode(key_pair.to_bytes()),
            engine.encode(key_pair.public_key().to_bytes()),
        )
    }

    pub fn generate_access_token(&self, user_id: i32, email: &str) -> Result<String> {
        let custom = AccessClaims {
            email: email.to_string(),
        };

        let mut claims = jwt_simple::claims::Claims::with_custom_claims(
            custom,
            Duration::from_secs(self.access_token_expiry.max(1) as u64),
        )
        .with_subject(user_id.to_string());

        if let Some(issuer) = &self.issuer {
            claims = claims.with_issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            claims = claims.with_audience(audience);
        }

        self.key_pair
            .sign(claims)
            .map_err(|e| Error::Token(e.to_string()))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        let mut options = VerificationOptions::default();
        if let Some(issuer) = &self.issuer {
            options.allowed_issuers = Some(HashSet::from([issuer.clone()]));
        }
        if let Some(audience) = &self.audience {
            options.allowed_audiences = Some(HashSet::from([audience.clone()]));
        }

        let token_data = self
            .public_key
            .verify_token::<AccessClaims>(token, Some(options))
            .map_err(|e| Error::Token(e.to_string()))?;

        let user_id = token_data
            .subject
            .as_deref()
            .and_then(|sub| sub.parse::<i32>().ok())
            .ok_or_else(|| Error::Token("token subject is not a user id".to_string()))?;

        Ok(Claims {
            user_id,
            email: token_data.custom.email,
            exp: token_data
                .expires_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
            iat: token_data
                .issued_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
        })
    }
}
