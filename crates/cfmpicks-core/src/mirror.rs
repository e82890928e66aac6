// Secondary persistence seams.
//
// The primary store is always written first. A `MirrorSink` is then told
// about the change and copies it somewhere else (the league spreadsheet) on
// its own schedule; it can neither block nor fail the primary path. The only
// synchronous secondary write is `LeagueFallback`, used by league creation
// when the primary insert itself fails.

use async_trait::async_trait;

use crate::model::{Bet, LeaderboardEntry, League, Matchup, ResultLogEntry, Role};

/// A change worth copying to the spreadsheet mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorEvent {
    /// Goes to the bootstrap `Leagues` range.
    LeagueCreated { league: League },
    /// Goes to the bootstrap `UserRoles` range.
    MembershipAdded {
        email: String,
        league_id: String,
        role: Role,
    },
    MatchupsAdded {
        spreadsheet_id: String,
        matchups: Vec<Matchup>,
    },
    BetsPlaced {
        spreadsheet_id: String,
        bets: Vec<Bet>,
    },
    /// Appends to `Results` and replaces `Leaderboard` wholesale.
    ResultRecorded {
        spreadsheet_id: String,
        log: ResultLogEntry,
        leaderboard: Vec<LeaderboardEntry>,
    },
}

impl MirrorEvent {
    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            MirrorEvent::LeagueCreated { .. } => "league_created",
            MirrorEvent::MembershipAdded { .. } => "membership_added",
            MirrorEvent::MatchupsAdded { .. } => "matchups_added",
            MirrorEvent::BetsPlaced { .. } => "bets_placed",
            MirrorEvent::ResultRecorded { .. } => "result_recorded",
        }
    }
}

/// Fire-and-forget notification of a primary-store change.
///
/// Implementations must return quickly and must not report errors to the
/// caller; a lost mirror write is logged by the sink, never surfaced.
pub trait MirrorSink: Send + Sync {
    fn notify(&self, event: MirrorEvent);
}

/// Mirror used when no spreadsheet credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMirror;

impl MirrorSink for NoopMirror {
    fn notify(&self, event: MirrorEvent) {
        tracing::trace!(kind = event.kind(), "mirror disabled, dropping event");
    }
}

/// Secondary league store consulted only when the primary insert fails.
#[async_trait]
pub trait LeagueFallback: Send + Sync {
    async fn write_league(&self, league: &League) -> anyhow::Result<()>;
}
