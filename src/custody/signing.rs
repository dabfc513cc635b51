// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request authentication for the custody API.
//!
//! Every request carries the API key in `X-API-Key` and a bearer JWT signed
//! with the matching RSA private key (RS256). The token is bound to one
//! request through the `uri` claim (path and query) and `bodyHash`, the hex
//! SHA-256 of the exact body bytes sent (empty string for GET).

use std::fmt;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::client::CustodyError;

/// Token lifetime. The platform rejects tokens living longer than 30s.
pub const TOKEN_TTL_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestClaims {
    pub uri: String,
    pub nonce: String,
    pub iat: i64,
    pub exp: i64,
    pub sub: String,
    pub body_hash: String,
}

/// Hex SHA-256 of a request body.
pub fn body_hash(body: &str) -> String {
    format!("{:x}", Sha256::digest(body.as_bytes()))
}

/// One API key and its RSA signing key.
#[derive(Clone)]
pub struct RequestSigner {
    api_key: String,
    key: EncodingKey,
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn from_pem(
        api_key: impl Into<String>,
        private_key_pem: &str,
    ) -> Result<Self, CustodyError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| CustodyError::Config(format!("invalid RSA private key: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            key,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Sign a token for `uri` (path plus query) and `body`, issued at `now`
    /// (epoch seconds).
    pub fn sign(&self, uri: &str, body: &str, now: i64) -> Result<String, CustodyError> {
        let claims = RequestClaims {
            uri: uri.to_string(),
            nonce: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + TOKEN_TTL_SECS,
            sub: self.api_key.clone(),
            body_hash: body_hash(body),
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| CustodyError::Signing(e.to_string()))
    }
}
