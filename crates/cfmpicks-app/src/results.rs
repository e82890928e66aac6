// Marking winners and reading standings.
//
// Standings are always rebuilt from every bet and every recorded result.
// The stored snapshot is written for the sheet mirror and for inspection;
// it is never read back as an input.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use cfmpicks_core::leaderboard::{compute_leaderboard_named, grade_matchup, GradeCounts};
use cfmpicks_core::mirror::MirrorEvent;
use cfmpicks_core::model::{LeaderboardEntry, MatchResult, ResultLogEntry};

use crate::app::App;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::Identity;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerMarked {
    pub result: MatchResult,
    pub counts: GradeCounts,
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl App {
    /// Record `winner` for a matchup and rebuild the leaderboard.
    ///
    /// Marking a matchup again overwrites the earlier winner; repeating the
    /// same call leaves the standings unchanged.
    pub fn mark_winner(
        &self,
        identity: &Identity,
        league_id: &str,
        matchup_id: i64,
        winner: &str,
    ) -> ServiceResult<WinnerMarked> {
        let (league, _) = self.require_admin(identity, league_id)?;
        let matchup = self
            .store
            .matchup(league_id, matchup_id)?
            .ok_or_else(|| ServiceError::not_found(format!("matchup {matchup_id} not found")))?;
        let winner = matchup
            .canonical_team(winner)
            .ok_or_else(|| {
                ServiceError::validation(format!(
                    "`{}` is not playing in matchup {matchup_id}",
                    winner.trim()
                ))
            })?
            .to_string();

        self.store.record_result(league_id, matchup_id, &winner)?;

        let counts = grade_matchup(
            &self.store.bets_for_matchup(league_id, matchup_id)?,
            matchup_id,
            &winner,
        );
        let leaderboard = self.rebuild_leaderboard(league_id)?;

        let log = ResultLogEntry {
            matchup_id,
            winner: winner.clone(),
            correct: counts.correct,
            incorrect: counts.incorrect,
            total: counts.total,
            recorded_at: Utc::now(),
        };
        self.store.append_result_log(league_id, &log)?;

        info!(
            league_id,
            matchup_id,
            winner = %winner,
            correct = counts.correct,
            incorrect = counts.incorrect,
            "winner marked"
        );
        self.mirror_to_sheet(&league, |spreadsheet_id| MirrorEvent::ResultRecorded {
            spreadsheet_id,
            log,
            leaderboard: leaderboard.clone(),
        });

        Ok(WinnerMarked {
            result: MatchResult { matchup_id, winner },
            counts,
            leaderboard,
        })
    }

    /// Recompute standings from source data and refresh the snapshot.
    pub(crate) fn rebuild_leaderboard(&self, league_id: &str) -> ServiceResult<Vec<LeaderboardEntry>> {
        let board = self.standings(league_id)?;
        self.store.save_leaderboard_snapshot(league_id, &board)?;
        Ok(board)
    }

    /// Standings keyed by user id, labelled with each bettor's current
    /// profile name. Sheet-imported bettors have no profile and keep the
    /// name from their bets.
    fn standings(&self, league_id: &str) -> ServiceResult<Vec<LeaderboardEntry>> {
        let bets = self.store.bets(league_id)?;
        let results = self.store.results(league_id)?;

        let bettors: HashSet<&str> = bets.iter().map(|b| b.user_id.as_str()).collect();
        let mut names = HashMap::with_capacity(bettors.len());
        for user_id in bettors {
            if let Some(profile) = self.store.profile(user_id)? {
                names.insert(user_id.to_string(), profile.pick_name().to_string());
            }
        }
        Ok(compute_leaderboard_named(&bets, &results, &names))
    }

    pub fn leaderboard(
        &self,
        identity: &Identity,
        league_id: &str,
    ) -> ServiceResult<Vec<LeaderboardEntry>> {
        self.require_member(identity, league_id)?;
        self.standings(league_id)
    }

    pub fn results_log(
        &self,
        identity: &Identity,
        league_id: &str,
    ) -> ServiceResult<Vec<ResultLogEntry>> {
        self.require_member(identity, league_id)?;
        Ok(self.store.result_log(league_id)?)
    }
}
