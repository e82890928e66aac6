// User profiles and the one-time migration of bootstrap-era role rows.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use cfmpicks_core::model::{Membership, UserProfile};

use crate::app::App;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::Identity;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 20;
const DISPLAY_NAME_MAX: usize = 50;

/// Partial profile update. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub default_league_id: Option<String>,
    pub preferences: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
}

/// Lowercase and validate a requested username.
pub fn normalize_username(input: &str) -> ServiceResult<String> {
    let name = input.trim().to_ascii_lowercase();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&name.len()) {
        return Err(ServiceError::validation(format!(
            "username must be {USERNAME_MIN}-{USERNAME_MAX} characters"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
    {
        return Err(ServiceError::validation(
            "username may only contain letters, digits and underscores",
        ));
    }
    Ok(name)
}

impl App {
    /// The caller's profile, created on first use.
    pub fn ensure_profile(&self, identity: &Identity) -> ServiceResult<UserProfile> {
        if let Some(mut profile) = self.store.profile(&identity.uid)? {
            if !identity.email.is_empty() && profile.email != identity.email {
                profile.email = identity.email.clone();
                profile.updated_at = Utc::now();
                self.store.upsert_profile(&profile)?;
            }
            return Ok(profile);
        }

        let now = Utc::now();
        let profile = UserProfile {
            id: Uuid::new_v4().to_string(),
            user_id: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            username: None,
            default_league_id: None,
            preferences: Default::default(),
            created_at: now,
            updated_at: now,
        };
        self.store.upsert_profile(&profile)?;
        info!(user_id = %identity.uid, "created profile");
        Ok(profile)
    }

    pub fn update_profile(
        &self,
        identity: &Identity,
        update: ProfileUpdate,
    ) -> ServiceResult<UserProfile> {
        let mut profile = self.ensure_profile(identity)?;

        if let Some(name) = update.display_name {
            let name = name.trim();
            if name.is_empty() || name.chars().count() > DISPLAY_NAME_MAX {
                return Err(ServiceError::validation(format!(
                    "display name must be 1-{DISPLAY_NAME_MAX} characters"
                )));
            }
            profile.display_name = name.to_string();
        }

        if let Some(requested) = update.username {
            let username = normalize_username(&requested)?;
            match self.store.username_owner(&username)? {
                Some(owner) if owner != identity.uid => {
                    return Err(ServiceError::validation("username already taken"));
                }
                _ => profile.username = Some(username),
            }
        }

        if let Some(league_id) = update.default_league_id {
            if league_id.is_empty() {
                profile.default_league_id = None;
            } else {
                match self.store.membership(&identity.uid, &league_id)? {
                    Some(m) if m.active => profile.default_league_id = Some(league_id),
                    _ => {
                        return Err(ServiceError::forbidden(
                            "default league must be one you belong to",
                        ))
                    }
                }
            }
        }

        if let Some(prefs) = update.preferences {
            profile.preferences = prefs;
        }

        profile.updated_at = Utc::now();
        self.store.upsert_profile(&profile)?;
        Ok(profile)
    }

    /// Make `league_id` the caller's default league if they have none.
    pub(crate) fn default_league_if_unset(
        &self,
        identity: &Identity,
        league_id: &str,
    ) -> ServiceResult<()> {
        let mut profile = self.ensure_profile(identity)?;
        if profile.default_league_id.is_none() {
            profile.default_league_id = Some(league_id.to_string());
            profile.updated_at = Utc::now();
            self.store.upsert_profile(&profile)?;
        }
        Ok(())
    }

    /// Turn legacy role rows for the caller's email into memberships.
    /// Rows for leagues that no longer exist, or where the caller already has
    /// a membership, are skipped.
    pub fn migrate_legacy_roles(&self, identity: &Identity) -> ServiceResult<MigrationReport> {
        self.ensure_profile(identity)?;
        let mut report = MigrationReport {
            migrated: 0,
            skipped: 0,
        };

        for role in self.store.legacy_roles(&identity.email)? {
            if self.store.league(&role.league_id)?.is_none() {
                warn!(league_id = %role.league_id, "legacy role for unknown league");
                report.skipped += 1;
                continue;
            }
            if self
                .store
                .membership(&identity.uid, &role.league_id)?
                .is_some()
            {
                report.skipped += 1;
                continue;
            }

            let now = Utc::now();
            self.store.insert_membership(&Membership {
                id: Uuid::new_v4().to_string(),
                user_id: identity.uid.clone(),
                league_id: role.league_id.clone(),
                role: role.role,
                active: true,
                premium: false,
                joined_at: now,
                last_accessed: now,
            })?;
            self.store.adjust_member_count(&role.league_id, 1)?;
            self.default_league_if_unset(identity, &role.league_id)?;
            report.migrated += 1;
        }

        info!(
            user_id = %identity.uid,
            migrated = report.migrated,
            skipped = report.skipped,
            "migrated legacy roles"
        );
        Ok(report)
    }
}
