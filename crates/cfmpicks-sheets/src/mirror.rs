// Spreadsheet mirror: a bounded queue in front of a single worker task that
// copies primary-store changes into the league and bootstrap spreadsheets.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cfmpicks_core::mirror::{LeagueFallback, MirrorEvent, MirrorSink};
use cfmpicks_core::model::{LeaderboardEntry, League, LegacyRole, ResultLogEntry};

use crate::client::{SheetsApi, SheetsError};
use crate::rows::{header_row, BetRow, LeagueRow, MatchupRow, SheetRow};

/// `MirrorSink` that hands events to a background worker.
///
/// `notify` never waits: when the queue is full or the worker has stopped
/// the event is logged and dropped.
pub struct SheetMirror {
    tx: mpsc::Sender<MirrorEvent>,
}

impl SheetMirror {
    /// Start the worker on the current runtime. The worker runs until every
    /// `SheetMirror` handle is dropped and the queue has drained.
    pub fn spawn(
        api: Arc<dyn SheetsApi>,
        bootstrap_spreadsheet_id: Option<String>,
        queue_size: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_size);
        let handle = tokio::spawn(run_worker(api, bootstrap_spreadsheet_id, rx));
        (Self { tx }, handle)
    }
}

impl MirrorSink for SheetMirror {
    fn notify(&self, event: MirrorEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(kind = event.kind(), "sheet mirror queue full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                warn!(kind = event.kind(), "sheet mirror stopped, dropping event");
            }
        }
    }
}

async fn run_worker(
    api: Arc<dyn SheetsApi>,
    bootstrap: Option<String>,
    mut rx: mpsc::Receiver<MirrorEvent>,
) {
    info!("sheet mirror started");
    while let Some(event) = rx.recv().await {
        let kind = event.kind();
        match apply(api.as_ref(), bootstrap.as_deref(), event).await {
            Ok(()) => debug!(kind, "mirrored event"),
            Err(e) => warn!(kind, error = %e, "sheet mirror write failed"),
        }
    }
    info!("sheet mirror stopped");
}

async fn apply(
    api: &dyn SheetsApi,
    bootstrap: Option<&str>,
    event: MirrorEvent,
) -> Result<(), SheetsError> {
    match event {
        MirrorEvent::LeagueCreated { league } => {
            let Some(id) = bootstrap else {
                debug!(league_id = %league.id, "no bootstrap spreadsheet, skipping league row");
                return Ok(());
            };
            let row = LeagueRow::from(&league).to_row();
            api.append_rows(id, LeagueRow::RANGE, vec![row]).await
        }
        MirrorEvent::MembershipAdded {
            email,
            league_id,
            role,
        } => {
            let Some(id) = bootstrap else {
                debug!(%league_id, "no bootstrap spreadsheet, skipping role row");
                return Ok(());
            };
            let row = LegacyRole {
                email,
                league_id,
                role,
            }
            .to_row();
            api.append_rows(id, LegacyRole::RANGE, vec![row]).await
        }
        MirrorEvent::MatchupsAdded {
            spreadsheet_id,
            matchups,
        } => {
            let rows = matchups
                .iter()
                .map(|m| MatchupRow::from(m).to_row())
                .collect();
            api.append_rows(&spreadsheet_id, MatchupRow::RANGE, rows)
                .await
        }
        MirrorEvent::BetsPlaced {
            spreadsheet_id,
            bets,
        } => {
            let rows = bets
                .into_iter()
                .map(|b| {
                    BetRow {
                        user_name: b.user_name,
                        matchup_id: b.matchup_id,
                        team: b.team,
                        placed_at: Some(b.created_at),
                    }
                    .to_row()
                })
                .collect();
            api.append_rows(&spreadsheet_id, BetRow::RANGE, rows).await
        }
        MirrorEvent::ResultRecorded {
            spreadsheet_id,
            log,
            leaderboard,
        } => {
            api.append_rows(&spreadsheet_id, ResultLogEntry::RANGE, vec![log.to_row()])
                .await?;

            let mut rows = vec![header_row::<LeaderboardEntry>()];
            rows.extend(leaderboard.iter().map(SheetRow::to_row));
            api.replace_range(&spreadsheet_id, LeaderboardEntry::RANGE, rows)
                .await
        }
    }
}

/// Writes a league row to the bootstrap spreadsheet when the primary store
/// refused the insert.
pub struct SheetsLeagueFallback {
    api: Arc<dyn SheetsApi>,
    spreadsheet_id: String,
}

impl SheetsLeagueFallback {
    pub fn new(api: Arc<dyn SheetsApi>, spreadsheet_id: String) -> Self {
        Self {
            api,
            spreadsheet_id,
        }
    }
}

#[async_trait]
impl LeagueFallback for SheetsLeagueFallback {
    async fn write_league(&self, league: &League) -> anyhow::Result<()> {
        self.api
            .append_rows(
                &self.spreadsheet_id,
                LeagueRow::RANGE,
                vec![LeagueRow::from(league).to_row()],
            )
            .await
            .with_context(|| format!("failed to write league {} to fallback sheet", league.id))
    }
}
