// Bearer-token identity.
//
// The sign-in flow lives with the identity provider; this side only checks
// tokens. Token format: base64url(json claims).base64url(hmac_sha256(json)).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

pub trait IdentityVerifier: Send + Sync {
    /// Resolve a bearer token to an identity, or `ServiceError::Unauthorized`.
    fn verify(&self, token: &str) -> Result<Identity, ServiceError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    uid: String,
    email: String,
    #[serde(default)]
    name: String,
    /// Expiry, unix seconds.
    exp: i64,
}

/// Verifies tokens signed with a shared HMAC key.
pub struct SignedTokenVerifier {
    mac: HmacSha256,
}

impl SignedTokenVerifier {
    pub fn new(key: &str) -> anyhow::Result<Self> {
        if key.is_empty() {
            anyhow::bail!("auth signing key is empty");
        }
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid auth signing key: {e}"))?;
        Ok(Self { mac })
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }

    /// Sign a token for `identity` valid for `ttl`. Used by tooling and tests;
    /// production tokens come from the identity provider.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> String {
        let claims = Claims {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            name: identity.display_name.clone(),
            exp: (Utc::now() + ttl).timestamp(),
        };
        // Serializing a struct of strings and an integer cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let mut mac = self.mac();
        mac.update(&payload);
        let sig = mac.finalize().into_bytes();
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(sig)
        )
    }
}

fn unauthorized(msg: &str) -> ServiceError {
    ServiceError::Unauthorized(msg.to_string())
}

impl IdentityVerifier for SignedTokenVerifier {
    fn verify(&self, token: &str) -> Result<Identity, ServiceError> {
        let (p1, p2) = token
            .trim()
            .split_once('.')
            .ok_or_else(|| unauthorized("malformed token"))?;
        let payload = URL_SAFE_NO_PAD
            .decode(p1)
            .map_err(|_| unauthorized("malformed token"))?;
        let sig = URL_SAFE_NO_PAD
            .decode(p2)
            .map_err(|_| unauthorized("malformed token"))?;

        let mut mac = self.mac();
        mac.update(&payload);
        mac.verify_slice(&sig)
            .map_err(|_| unauthorized("bad token signature"))?;

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| unauthorized("malformed token claims"))?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(unauthorized("token expired"));
        }
        if claims.uid.is_empty() {
            return Err(unauthorized("token has no subject"));
        }

        let display_name = if claims.name.trim().is_empty() {
            claims
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        } else {
            claims.name
        };
        Ok(Identity {
            uid: claims.uid,
            email: claims.email,
            display_name,
        })
    }
}

/// Verifier used when no signing key is configured: rejects everything.
pub struct DisabledVerifier;

impl IdentityVerifier for DisabledVerifier {
    fn verify(&self, _token: &str) -> Result<Identity, ServiceError> {
        Err(unauthorized("authentication is not configured"))
    }
}
