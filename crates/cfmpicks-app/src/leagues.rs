// League lifecycle: create, join, list, settings, leave.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use cfmpicks_core::league_code::{generate_unique_code, normalize_league_code};
use cfmpicks_core::mirror::MirrorEvent;
use cfmpicks_core::model::{League, LeagueSettings, Membership, Role};

use crate::app::App;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::Identity;

const LEAGUE_NAME_MAX: usize = 60;

/// Where a newly created league was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    Primary,
    /// The primary store refused the insert and the league row only exists
    /// in the fallback sheet. No membership was recorded.
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedLeague {
    #[serde(flatten)]
    pub league: League,
    pub storage: Storage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedLeague {
    pub league: League,
    pub membership: Membership,
    pub already_member: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueSummary {
    pub league: League,
    pub role: Role,
    pub premium: bool,
    pub last_accessed: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub user_id: String,
    pub display_name: String,
    pub username: Option<String>,
    pub role: Role,
    pub premium: bool,
    pub joined_at: DateTime<Utc>,
}

/// Admin-editable league fields. An empty `seasonLabel` or `spreadsheetId`
/// clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub name: Option<String>,
    pub active: Option<bool>,
    pub season_label: Option<String>,
    pub spreadsheet_id: Option<String>,
}

fn validate_league_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > LEAGUE_NAME_MAX {
        return Err(ServiceError::validation(format!(
            "league name must be 1-{LEAGUE_NAME_MAX} characters"
        )));
    }
    Ok(name.to_string())
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl App {
    pub async fn create_league(
        &self,
        identity: &Identity,
        name: &str,
    ) -> ServiceResult<CreatedLeague> {
        let name = validate_league_name(name)?;
        self.ensure_profile(identity)?;

        let code = {
            let mut rng = rand::thread_rng();
            generate_unique_code(&mut rng, self.rules.max_code_attempts, |c| {
                self.store.league_code_exists(c)
            })?
        };

        let league = League {
            id: Uuid::new_v4().to_string(),
            name,
            admin_user_id: identity.uid.clone(),
            admin_email: identity.email.clone(),
            code,
            active: true,
            paid: false,
            member_count: 1,
            settings: LeagueSettings::default(),
            created_at: Utc::now(),
        };

        let now = Utc::now();
        let admin = Membership {
            id: Uuid::new_v4().to_string(),
            user_id: identity.uid.clone(),
            league_id: league.id.clone(),
            role: Role::Admin,
            active: true,
            premium: false,
            joined_at: now,
            last_accessed: now,
        };

        if let Err(e) = self.store.insert_league_with_admin(&league, &admin) {
            warn!(league_id = %league.id, error = %format!("{e:#}"), "primary league insert failed");
            let Some(fallback) = &self.fallback else {
                return Err(ServiceError::Unavailable(
                    "league storage is unavailable".into(),
                ));
            };
            return match fallback.write_league(&league).await {
                Ok(()) => {
                    info!(league_id = %league.id, "league written to fallback store");
                    Ok(CreatedLeague {
                        league,
                        storage: Storage::Fallback,
                    })
                }
                Err(fe) => {
                    error!(league_id = %league.id, error = %format!("{fe:#}"), "fallback league write failed");
                    Err(ServiceError::Unavailable(
                        "league storage is unavailable".into(),
                    ))
                }
            };
        }

        // The league is usable from here on; a missing default is only a
        // convenience.
        if let Err(e) = self.default_league_if_unset(identity, &league.id) {
            warn!(league_id = %league.id, error = %e, "could not set default league");
        }

        info!(league_id = %league.id, code = %league.code, "created league");
        self.mirror(MirrorEvent::LeagueCreated {
            league: league.clone(),
        });
        self.mirror(MirrorEvent::MembershipAdded {
            email: identity.email.clone(),
            league_id: league.id.clone(),
            role: Role::Admin,
        });

        Ok(CreatedLeague {
            league,
            storage: Storage::Primary,
        })
    }

    pub fn join_league(&self, identity: &Identity, code: &str) -> ServiceResult<JoinedLeague> {
        let code = normalize_league_code(code)?;
        let mut league = self
            .store
            .league_by_code(&code)?
            .ok_or_else(|| ServiceError::not_found("no league with that code"))?;
        if !league.active {
            return Err(ServiceError::forbidden("league is not active"));
        }
        self.ensure_profile(identity)?;

        let existing = self.store.membership(&identity.uid, &league.id)?;
        if let Some(m) = &existing {
            if m.active {
                return Ok(JoinedLeague {
                    league,
                    membership: m.clone(),
                    already_member: true,
                });
            }
        }

        if league.member_count >= self.rules.max_members {
            return Err(ServiceError::forbidden("league is full"));
        }

        let now = Utc::now();
        let membership = match existing {
            // A member who left comes back with their old role and flags.
            Some(mut m) => {
                m.active = true;
                m.last_accessed = now;
                self.store.update_membership(&m)?;
                m
            }
            None => {
                let m = Membership {
                    id: Uuid::new_v4().to_string(),
                    user_id: identity.uid.clone(),
                    league_id: league.id.clone(),
                    role: Role::User,
                    active: true,
                    premium: league.paid,
                    joined_at: now,
                    last_accessed: now,
                };
                self.store.insert_membership(&m)?;
                m
            }
        };
        self.store.adjust_member_count(&league.id, 1)?;
        league.member_count += 1;
        self.default_league_if_unset(identity, &league.id)?;

        info!(league_id = %league.id, user_id = %identity.uid, "joined league");
        self.mirror(MirrorEvent::MembershipAdded {
            email: identity.email.clone(),
            league_id: league.id.clone(),
            role: membership.role,
        });

        Ok(JoinedLeague {
            league,
            membership,
            already_member: false,
        })
    }

    /// Active memberships with their leagues, most recently used first.
    pub fn my_leagues(&self, identity: &Identity) -> ServiceResult<Vec<LeagueSummary>> {
        let mut out = Vec::new();
        for m in self.store.memberships_for_user(&identity.uid)? {
            if !m.active {
                continue;
            }
            match self.store.league(&m.league_id)? {
                Some(league) => out.push(LeagueSummary {
                    league,
                    role: m.role,
                    premium: m.premium,
                    last_accessed: m.last_accessed,
                }),
                None => warn!(league_id = %m.league_id, "membership for missing league"),
            }
        }
        out.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
        Ok(out)
    }

    /// A league the caller belongs to. Records the access time.
    pub fn get_league(&self, identity: &Identity, league_id: &str) -> ServiceResult<LeagueSummary> {
        let (league, mut membership) = self.require_member(identity, league_id)?;
        membership.last_accessed = Utc::now();
        self.store.update_membership(&membership)?;
        Ok(LeagueSummary {
            league,
            role: membership.role,
            premium: membership.premium,
            last_accessed: membership.last_accessed,
        })
    }

    pub fn update_settings(
        &self,
        identity: &Identity,
        league_id: &str,
        patch: SettingsPatch,
    ) -> ServiceResult<League> {
        let (mut league, _) = self.require_admin(identity, league_id)?;

        if let Some(name) = patch.name {
            league.name = validate_league_name(&name)?;
        }
        if let Some(active) = patch.active {
            league.active = active;
        }
        if let Some(label) = patch.season_label {
            league.settings.season_label = non_empty(label);
        }
        if let Some(sheet) = patch.spreadsheet_id {
            league.settings.spreadsheet_id = non_empty(sheet);
        }

        if !self.store.update_league(&league)? {
            return Err(ServiceError::not_found(format!("league {league_id} not found")));
        }
        info!(league_id, "updated league settings");
        Ok(league)
    }

    pub fn leave_league(&self, identity: &Identity, league_id: &str) -> ServiceResult<()> {
        let (_, mut membership) = self.require_member(identity, league_id)?;
        if membership.is_admin() {
            return Err(ServiceError::validation(
                "league admins cannot leave their own league",
            ));
        }
        membership.active = false;
        self.store.update_membership(&membership)?;
        self.store.adjust_member_count(league_id, -1)?;

        let mut profile = self.ensure_profile(identity)?;
        if profile.default_league_id.as_deref() == Some(league_id) {
            profile.default_league_id = None;
            profile.updated_at = Utc::now();
            self.store.upsert_profile(&profile)?;
        }
        info!(league_id, user_id = %identity.uid, "left league");
        Ok(())
    }

    pub fn members(&self, identity: &Identity, league_id: &str) -> ServiceResult<Vec<MemberView>> {
        self.require_member(identity, league_id)?;
        let mut out = Vec::new();
        for m in self.store.memberships_for_league(league_id)? {
            if !m.active {
                continue;
            }
            let profile = self.store.profile(&m.user_id)?;
            out.push(MemberView {
                display_name: profile
                    .as_ref()
                    .map(|p| p.display_name.clone())
                    .unwrap_or_else(|| m.user_id.clone()),
                username: profile.and_then(|p| p.username),
                user_id: m.user_id,
                role: m.role,
                premium: m.premium,
                joined_at: m.joined_at,
            });
        }
        Ok(out)
    }
}
