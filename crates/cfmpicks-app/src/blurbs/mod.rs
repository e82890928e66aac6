// Short AI-written previews for matchups.
//
// Generated text is cached per matchup fingerprint. When the model is
// disabled or fails, callers get a template blurb instead; template text is
// not cached so a later request can still reach the model.

pub mod cache;
pub mod client;
pub mod prompt;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use cfmpicks_core::config::Config;

use crate::app::App;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::Identity;

pub use cache::BlurbCache;
pub use client::{BlurbClient, ClaudeClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlurbSource {
    Model,
    Cache,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchupBlurb {
    pub matchup_id: i64,
    pub blurb: String,
    pub source: BlurbSource,
}

pub struct BlurbService {
    client: BlurbClient,
    cache: Mutex<BlurbCache>,
    max_tokens: u32,
}

impl BlurbService {
    pub fn new(client: BlurbClient, max_tokens: u32, capacity: usize, ttl: Duration) -> Self {
        Self {
            client,
            cache: Mutex::new(BlurbCache::new(capacity, ttl)),
            max_tokens,
        }
    }

    /// Template blurbs only.
    pub fn disabled() -> Self {
        Self::new(BlurbClient::Disabled, 0, 1, Duration::ZERO)
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            BlurbClient::from_config(config),
            config.blurbs.max_tokens,
            config.blurbs.cache_capacity,
            Duration::from_secs(config.blurbs.cache_ttl_secs),
        )
    }

    fn cached(&self, key: &str) -> Option<String> {
        self.cache
            .lock()
            .expect("blurb cache mutex poisoned")
            .get(key, Instant::now())
    }

    fn store(&self, key: String, blurb: String) {
        self.cache
            .lock()
            .expect("blurb cache mutex poisoned")
            .insert(key, blurb, Instant::now());
    }
}

impl App {
    pub async fn matchup_blurb(
        &self,
        identity: &Identity,
        league_id: &str,
        matchup_id: i64,
    ) -> ServiceResult<MatchupBlurb> {
        self.require_member(identity, league_id)?;
        let matchup = self
            .store
            .matchup(league_id, matchup_id)?
            .ok_or_else(|| ServiceError::not_found(format!("matchup {matchup_id} not found")))?;

        let key = cache::fingerprint(&matchup);
        if let Some(blurb) = self.blurbs.cached(&key) {
            debug!(matchup_id, "blurb cache hit");
            return Ok(MatchupBlurb {
                matchup_id,
                blurb,
                source: BlurbSource::Cache,
            });
        }

        let generated = match &self.blurbs.client {
            BlurbClient::Disabled => None,
            client => match client
                .complete(
                    prompt::system_prompt(),
                    &prompt::matchup_prompt(&matchup),
                    self.blurbs.max_tokens,
                )
                .await
            {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(matchup_id, error = %e, "blurb generation failed, using template");
                    None
                }
            },
        };

        Ok(match generated {
            Some(blurb) => {
                self.blurbs.store(key, blurb.clone());
                MatchupBlurb {
                    matchup_id,
                    blurb,
                    source: BlurbSource::Model,
                }
            }
            None => MatchupBlurb {
                matchup_id,
                blurb: prompt::template_blurb(&matchup),
                source: BlurbSource::Template,
            },
        })
    }
}
