// Primary store interface. Services only talk to this trait; the SQLite
// `Database` is the production implementation.

use anyhow::Result;
use thiserror::Error;

use crate::model::{
    Bet, LeaderboardEntry, League, LegacyRole, MatchResult, Matchup, Membership, NewBet,
    NewMatchup, ResultLogEntry, UserProfile,
};

/// Returned (inside `anyhow::Error`) by [`LeagueStore::insert_open_bets`]
/// when a matchup is no longer open for picks at write time.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("matchup {matchup_id} is no longer open for picks")]
pub struct MatchupClosed {
    pub matchup_id: i64,
}

pub trait LeagueStore: Send + Sync {
    // -- leagues --------------------------------------------------------

    fn insert_league(&self, league: &League) -> Result<()>;
    /// Insert a new league and its admin membership together. Either both
    /// rows are written or neither is.
    fn insert_league_with_admin(&self, league: &League, admin: &Membership) -> Result<()>;
    fn league(&self, league_id: &str) -> Result<Option<League>>;
    fn league_by_code(&self, code: &str) -> Result<Option<League>>;
    fn league_code_exists(&self, code: &str) -> Result<bool>;
    /// Persist name, active flag and settings. Returns `false` when the
    /// league does not exist.
    fn update_league(&self, league: &League) -> Result<bool>;
    fn mark_league_paid(&self, league_id: &str) -> Result<bool>;
    fn adjust_member_count(&self, league_id: &str, delta: i32) -> Result<()>;

    // -- profiles -------------------------------------------------------

    fn profile(&self, user_id: &str) -> Result<Option<UserProfile>>;
    fn upsert_profile(&self, profile: &UserProfile) -> Result<()>;
    /// The user id owning `username`, if any.
    fn username_owner(&self, username: &str) -> Result<Option<String>>;

    // -- memberships ----------------------------------------------------

    fn membership(&self, user_id: &str, league_id: &str) -> Result<Option<Membership>>;
    fn insert_membership(&self, membership: &Membership) -> Result<()>;
    /// Persist role, active/premium flags and last-accessed time.
    fn update_membership(&self, membership: &Membership) -> Result<()>;
    fn memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>>;
    fn memberships_for_league(&self, league_id: &str) -> Result<Vec<Membership>>;
    /// Flag every membership of the league as premium. Returns rows changed.
    fn set_league_premium(&self, league_id: &str) -> Result<usize>;

    // -- legacy roles ---------------------------------------------------

    fn legacy_roles(&self, email: &str) -> Result<Vec<LegacyRole>>;
    fn insert_legacy_role(&self, role: &LegacyRole) -> Result<()>;

    // -- matchups and results -------------------------------------------

    fn insert_matchups(&self, league_id: &str, matchups: &[NewMatchup]) -> Result<Vec<Matchup>>;
    fn matchups(&self, league_id: &str) -> Result<Vec<Matchup>>;
    fn matchups_for_week(&self, league_id: &str, week: u32) -> Result<Vec<Matchup>>;
    fn matchup(&self, league_id: &str, matchup_id: i64) -> Result<Option<Matchup>>;
    /// Highest week number present for the league.
    fn current_week(&self, league_id: &str) -> Result<Option<u32>>;
    /// Set (or overwrite) the winner of a matchup.
    fn record_result(&self, league_id: &str, matchup_id: i64, winner: &str) -> Result<()>;
    fn results(&self, league_id: &str) -> Result<Vec<MatchResult>>;

    // -- bets -----------------------------------------------------------

    /// Insert all bets in one transaction; any conflict rolls back the batch.
    fn insert_bets(&self, league_id: &str, bets: &[NewBet]) -> Result<Vec<Bet>>;
    /// Like `insert_bets`, but each matchup must still be undecided and in
    /// the league's current week when the row is written. The first bet that
    /// fails the check rolls back the batch with [`MatchupClosed`].
    fn insert_open_bets(&self, league_id: &str, bets: &[NewBet]) -> Result<Vec<Bet>>;
    fn bets(&self, league_id: &str) -> Result<Vec<Bet>>;
    fn bets_for_matchup(&self, league_id: &str, matchup_id: i64) -> Result<Vec<Bet>>;
    fn bets_for_user(&self, league_id: &str, user_id: &str) -> Result<Vec<Bet>>;

    // -- results log and leaderboard cache ------------------------------

    fn append_result_log(&self, league_id: &str, entry: &ResultLogEntry) -> Result<()>;
    fn result_log(&self, league_id: &str) -> Result<Vec<ResultLogEntry>>;
    /// Cache of the last computed leaderboard. Never read back as input to
    /// a recompute.
    fn save_leaderboard_snapshot(&self, league_id: &str, entries: &[LeaderboardEntry])
        -> Result<()>;
    fn leaderboard_snapshot(&self, league_id: &str) -> Result<Option<Vec<LeaderboardEntry>>>;
}
