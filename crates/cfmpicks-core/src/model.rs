// Domain records shared by the store, the sheet mirror and the services.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Leagues
// ---------------------------------------------------------------------------

/// Per-league settings that do not affect standings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueSettings {
    /// Spreadsheet that mirrors this league's game data, if connected.
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    /// Free-form label shown next to the league name (e.g. "Season 3").
    #[serde(default)]
    pub season_label: Option<String>,
}

/// An isolated group of users sharing matchups, picks and a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct League {
    pub id: String,
    pub name: String,
    pub admin_user_id: String,
    pub admin_email: String,
    /// Shareable join code, `XXX-XXX-XXXX`.
    pub code: String,
    pub active: bool,
    /// Set once the one-time upgrade payment has been confirmed.
    pub paid: bool,
    pub member_count: u32,
    pub settings: LeagueSettings,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub username: Option<String>,
    pub default_league_id: Option<String>,
    #[serde(default)]
    pub preferences: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Name recorded on picks and shown on the leaderboard: the username when
    /// one is set, otherwise the display name.
    pub fn pick_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.display_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Parse a stored or sheet-provided role string (case-insensitive).
    /// Unknown roles are rejected rather than downgraded to `User`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Links a user to a league.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    pub user_id: String,
    pub league_id: String,
    pub role: Role,
    pub active: bool,
    pub premium: bool,
    pub joined_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl Membership {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A role row from the bootstrap-era `userRoles` collection, keyed by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRole {
    pub email: String,
    pub league_id: String,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Game data
// ---------------------------------------------------------------------------

/// One head-to-head pairing for a given week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matchup {
    pub id: i64,
    pub league_id: String,
    pub week: u32,
    pub home_team: String,
    pub away_team: String,
    pub home_record: Option<String>,
    pub away_record: Option<String>,
    pub winner: Option<String>,
}

impl Matchup {
    /// Resolve `team` against this matchup's two teams, ignoring case and
    /// surrounding whitespace. Returns the canonical spelling.
    pub fn canonical_team(&self, team: &str) -> Option<&str> {
        let wanted = team.trim();
        [self.home_team.as_str(), self.away_team.as_str()]
            .into_iter()
            .find(|t| t.eq_ignore_ascii_case(wanted))
    }

    pub fn is_decided(&self) -> bool {
        self.winner.is_some()
    }
}

/// A matchup before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMatchup {
    pub week: u32,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub home_record: Option<String>,
    #[serde(default)]
    pub away_record: Option<String>,
}

/// A user's selection of a winner for one matchup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: i64,
    pub league_id: String,
    pub user_id: String,
    pub user_name: String,
    pub matchup_id: i64,
    pub team: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBet {
    pub user_id: String,
    pub user_name: String,
    pub matchup_id: i64,
    pub team: String,
}

/// A recorded winner for a matchup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub matchup_id: i64,
    pub winner: String,
}

/// Derived standing for one user. Never stored as the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// Stable key for the row. Names can repeat across users.
    pub user_id: String,
    pub user_name: String,
    pub wins: u32,
    pub losses: u32,
    /// Correct-pick percentage, rounded to a whole number.
    pub points: u32,
    pub rank: u32,
}

impl LeaderboardEntry {
    pub fn total_picks(&self) -> u32 {
        self.wins + self.losses
    }
}

/// Audit row appended every time a winner is marked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultLogEntry {
    pub matchup_id: i64,
    pub winner: String,
    pub correct: u32,
    pub incorrect: u32,
    pub total: u32,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Whether `record` looks like a franchise-mode team record: `W-L` or `W-L-T`.
pub fn is_valid_record(record: &str) -> bool {
    let parts: Vec<&str> = record.trim().split('-').collect();
    (2..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
