// One-time league upgrade through the hosted payments provider.
//
// We create a payment intent for the configured flat fee and hand its client
// secret back to the caller. The provider later calls our webhook; a
// `payment_intent.succeeded` event carrying `metadata.league_id` marks the
// league paid and every membership in it premium.

use anyhow::Context;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, warn};

use cfmpicks_core::config::{CredentialsConfig, PaymentsConfig};

use crate::app::App;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::Identity;

type HmacSha256 = Hmac<Sha256>;

const SUCCEEDED: &str = "payment_intent.succeeded";

// ---------------------------------------------------------------------------
// Provider client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    client_secret: String,
}

pub struct PaymentsClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl PaymentsClient {
    pub fn new(api_base: &str, secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    /// Create a payment intent and return its client secret.
    async fn create_intent(
        &self,
        amount: u64,
        currency: &str,
        league_id: &str,
        user_id: &str,
    ) -> anyhow::Result<String> {
        let url = format!("{}/v1/payment_intents", self.api_base);
        let amount = amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency),
            ("metadata[league_id]", league_id),
            ("metadata[user_id]", user_id),
        ];

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .with_context(|| format!("payment intent request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("payments provider returned {status}: {body}");
        }

        let intent: PaymentIntent = resp
            .json()
            .await
            .context("failed to decode payment intent response")?;
        debug!(intent_id = %intent.id, league_id, "payment intent created");
        Ok(intent.client_secret)
    }
}

// ---------------------------------------------------------------------------
// Webhook signature
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("malformed signature header")]
    MalformedHeader,

    #[error("signature timestamp outside tolerance ({age_secs}s old)")]
    Stale { age_secs: i64 },

    #[error("no matching signature")]
    BadSignature,

    #[error("invalid webhook payload: {0}")]
    Payload(String),
}

/// Checks `t=<unix>,v1=<hex>` signature headers.
pub struct WebhookVerifier {
    mac: HmacSha256,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: &str, tolerance_secs: i64) -> anyhow::Result<Self> {
        if secret.is_empty() {
            anyhow::bail!("webhook secret is empty");
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid webhook secret: {e}"))?;
        Ok(Self {
            mac,
            tolerance_secs,
        })
    }

    /// Verify `header` against `body` as of `now` (unix seconds).
    pub fn verify(&self, header: &str, body: &[u8], now: i64) -> Result<(), WebhookError> {
        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", v)) => {
                    timestamp = Some(v.parse::<i64>().map_err(|_| WebhookError::MalformedHeader)?)
                }
                Some(("v1", v)) => candidates.push(v),
                // Other schemes (v0 and friends) are ignored.
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
        if candidates.is_empty() {
            return Err(WebhookError::MalformedHeader);
        }

        let age_secs = now - timestamp;
        if age_secs.abs() > self.tolerance_secs {
            return Err(WebhookError::Stale { age_secs });
        }

        let mut signed = self.mac.clone();
        signed.update(timestamp.to_string().as_bytes());
        signed.update(b".");
        signed.update(body);

        let matched = candidates
            .into_iter()
            .filter_map(|c| hex::decode(c).ok())
            .any(|sig| signed.clone().verify_slice(&sig).is_ok());
        if matched {
            return Ok(());
        }
        Err(WebhookError::BadSignature)
    }

    /// Build a header for `body` at `timestamp`. Used by tests and local tooling.
    pub fn sign(&self, body: &[u8], timestamp: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        )
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: WebhookData,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookData {
    #[serde(default)]
    object: WebhookObject,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookObject {
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Payments wiring. Either half can be missing: intents need the secret key,
/// webhooks need the signing secret.
pub struct Payments {
    client: Option<PaymentsClient>,
    webhook: Option<WebhookVerifier>,
    fee_cents: u64,
    currency: String,
}

impl Payments {
    pub fn disabled() -> Self {
        Self {
            client: None,
            webhook: None,
            fee_cents: 0,
            currency: String::new(),
        }
    }

    pub fn from_config(
        config: &PaymentsConfig,
        credentials: &CredentialsConfig,
    ) -> anyhow::Result<Self> {
        let client = match &credentials.stripe_secret_key {
            Some(key) if !key.is_empty() => {
                Some(PaymentsClient::new(&config.api_base, key.clone()))
            }
            _ => None,
        };
        let webhook = match &credentials.stripe_webhook_secret {
            Some(secret) if !secret.is_empty() => {
                Some(WebhookVerifier::new(secret, config.webhook_tolerance_secs)?)
            }
            _ => None,
        };
        Ok(Self {
            client,
            webhook,
            fee_cents: config.upgrade_fee_cents,
            currency: config.currency.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeIntent {
    pub client_secret: String,
    pub amount: u64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    /// Whether the event changed anything.
    pub applied: bool,
}

impl App {
    pub async fn create_upgrade_intent(
        &self,
        identity: &Identity,
        league_id: &str,
    ) -> ServiceResult<UpgradeIntent> {
        let (league, _) = self.require_admin(identity, league_id)?;
        if league.paid {
            return Err(ServiceError::validation("league is already upgraded"));
        }
        let client = self
            .payments
            .client
            .as_ref()
            .ok_or_else(|| ServiceError::Unavailable("payments are not configured".into()))?;

        let client_secret = client
            .create_intent(
                self.payments.fee_cents,
                &self.payments.currency,
                league_id,
                &identity.uid,
            )
            .await?;
        Ok(UpgradeIntent {
            client_secret,
            amount: self.payments.fee_cents,
            currency: self.payments.currency.clone(),
        })
    }

    pub fn handle_webhook(&self, signature: &str, body: &[u8]) -> ServiceResult<WebhookAck> {
        self.handle_webhook_at(signature, body, Utc::now().timestamp())
    }

    pub(crate) fn handle_webhook_at(
        &self,
        signature: &str,
        body: &[u8],
        now: i64,
    ) -> ServiceResult<WebhookAck> {
        let verifier = self
            .payments
            .webhook
            .as_ref()
            .ok_or_else(|| ServiceError::Unavailable("payments are not configured".into()))?;
        verifier.verify(signature, body, now).map_err(|e| {
            warn!(error = %e, "rejected payments webhook");
            ServiceError::validation(e.to_string())
        })?;

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| ServiceError::validation(WebhookError::Payload(e.to_string()).to_string()))?;

        if event.event_type != SUCCEEDED {
            debug!(event_type = %event.event_type, "ignoring payments event");
            return Ok(WebhookAck {
                received: true,
                applied: false,
            });
        }

        let Some(league_id) = event.data.object.metadata.get("league_id") else {
            warn!("payment succeeded without a league id");
            return Ok(WebhookAck {
                received: true,
                applied: false,
            });
        };

        if !self.store.mark_league_paid(league_id)? {
            warn!(league_id = %league_id, "payment succeeded for unknown league");
            return Ok(WebhookAck {
                received: true,
                applied: false,
            });
        }
        let upgraded = self.store.set_league_premium(league_id)?;
        info!(league_id = %league_id, memberships = upgraded, "league upgraded");
        Ok(WebhookAck {
            received: true,
            applied: true,
        })
    }
}
