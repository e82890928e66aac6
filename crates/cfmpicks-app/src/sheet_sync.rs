// Connecting a league spreadsheet and importing game data from it.

use std::collections::{HashMap, HashSet};

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use cfmpicks_core::model::{Matchup, NewBet, NewMatchup};
use cfmpicks_sheets::setup::{import_game_data, initialize_sheet, SetupError};
use cfmpicks_sheets::SheetsApi;

use crate::app::App;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::Identity;

/// Prefix for user ids of bets that came from a sheet rather than a login.
pub const SHEET_USER_PREFIX: &str = "sheet:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetConnection {
    pub spreadsheet_id: String,
    /// Ranges that received header rows.
    pub initialized: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetImport {
    pub matchups: usize,
    pub bets: usize,
    pub results: usize,
    pub skipped: usize,
}

fn same_game(a: (u32, &str, &str), b: (u32, &str, &str)) -> bool {
    a.0 == b.0 && a.1.eq_ignore_ascii_case(b.1) && a.2.eq_ignore_ascii_case(b.2)
}

impl App {
    fn sheets_or_503(&self) -> ServiceResult<&dyn SheetsApi> {
        self.sheets
            .as_deref()
            .ok_or_else(|| ServiceError::Unavailable("spreadsheet access is not configured".into()))
    }

    /// Attach a spreadsheet to the league and write any missing headers.
    pub async fn connect_sheet(
        &self,
        identity: &Identity,
        league_id: &str,
        spreadsheet_id: &str,
    ) -> ServiceResult<SheetConnection> {
        let (mut league, _) = self.require_admin(identity, league_id)?;
        let spreadsheet_id = spreadsheet_id.trim();
        if spreadsheet_id.is_empty() {
            return Err(ServiceError::validation("spreadsheet id is required"));
        }
        let sheets = self.sheets_or_503()?;

        let initialized = initialize_sheet(sheets, spreadsheet_id)
            .await
            .with_context(|| format!("failed to initialize spreadsheet {spreadsheet_id}"))?;

        league.settings.spreadsheet_id = Some(spreadsheet_id.to_string());
        self.store.update_league(&league)?;
        info!(league_id, spreadsheet_id, "league sheet connected");

        Ok(SheetConnection {
            spreadsheet_id: spreadsheet_id.to_string(),
            initialized,
        })
    }

    /// Pull matchups, bets and results from the league's sheet into the
    /// primary store.
    ///
    /// Sheet matchup ids are remapped to store ids. Matchups already present
    /// (same week and teams) are reused, and bets already recorded for the
    /// same name and matchup are skipped, so importing twice adds nothing.
    /// Imported data is not mirrored back to the sheet.
    pub async fn import_from_sheet(
        &self,
        identity: &Identity,
        league_id: &str,
    ) -> ServiceResult<SheetImport> {
        let (league, _) = self.require_admin(identity, league_id)?;
        let spreadsheet_id = league
            .settings
            .spreadsheet_id
            .clone()
            .ok_or_else(|| ServiceError::not_found("league has no connected sheet"))?;
        let sheets = self.sheets_or_503()?;

        let data = import_game_data(sheets, &spreadsheet_id)
            .await
            .map_err(|e| match e {
                SetupError::Row(row) => ServiceError::validation(row.to_string()),
                SetupError::Sheets(err) => ServiceError::Upstream(
                    anyhow::Error::new(err)
                        .context(format!("failed to read spreadsheet {spreadsheet_id}")),
                ),
            })?;

        let mut report = SheetImport::default();

        // -- matchups -----------------------------------------------------
        let mut existing = self.store.matchups(league_id)?;
        let mut id_map: HashMap<i64, i64> = HashMap::new();
        let mut to_insert: Vec<(i64, NewMatchup)> = Vec::new();
        // Sheet rows repeating a game queued earlier in this import, mapped
        // to the sheet id of that first row.
        let mut repeats: Vec<(i64, i64)> = Vec::new();
        for row in &data.matchups {
            let home = row.home_team.trim();
            let away = row.away_team.trim();
            if row.week == 0 || home.is_empty() || away.is_empty() || home.eq_ignore_ascii_case(away)
            {
                warn!(sheet_id = row.id, "skipping invalid sheet matchup");
                report.skipped += 1;
                continue;
            }
            if let Some(found) = existing.iter().find(|m| {
                same_game(
                    (m.week, m.home_team.as_str(), m.away_team.as_str()),
                    (row.week, home, away),
                )
            }) {
                id_map.insert(row.id, found.id);
                continue;
            }
            if let Some((first, _)) = to_insert.iter().find(|(_, m)| {
                same_game(
                    (m.week, m.home_team.as_str(), m.away_team.as_str()),
                    (row.week, home, away),
                )
            }) {
                repeats.push((row.id, *first));
                continue;
            }
            to_insert.push((
                row.id,
                NewMatchup {
                    week: row.week,
                    home_team: home.to_string(),
                    away_team: away.to_string(),
                    home_record: row.home_record.clone(),
                    away_record: row.away_record.clone(),
                },
            ));
        }
        if !to_insert.is_empty() {
            let new: Vec<NewMatchup> = to_insert.iter().map(|(_, m)| m.clone()).collect();
            let inserted = self.store.insert_matchups(league_id, &new)?;
            for ((sheet_id, _), stored) in to_insert.iter().zip(&inserted) {
                id_map.insert(*sheet_id, stored.id);
            }
            report.matchups = inserted.len();
            existing.extend(inserted);
        }
        for (repeat, first) in repeats {
            if let Some(&id) = id_map.get(&first) {
                id_map.insert(repeat, id);
            }
        }
        let by_id: HashMap<i64, &Matchup> =
            existing.iter().map(|m| (m.id, m)).collect();

        // -- bets ---------------------------------------------------------
        let mut seen: HashSet<(String, i64)> = self
            .store
            .bets(league_id)?
            .into_iter()
            .map(|b| (b.user_name.to_ascii_lowercase(), b.matchup_id))
            .collect();
        let mut new_bets = Vec::new();
        for row in &data.bets {
            let name = row.user_name.trim();
            let Some(matchup) = id_map.get(&row.matchup_id).and_then(|id| by_id.get(id)) else {
                report.skipped += 1;
                continue;
            };
            let Some(team) = matchup.canonical_team(&row.team) else {
                warn!(user = name, matchup_id = row.matchup_id, "sheet bet names an unknown team");
                report.skipped += 1;
                continue;
            };
            if name.is_empty() || !seen.insert((name.to_ascii_lowercase(), matchup.id)) {
                report.skipped += 1;
                continue;
            }
            new_bets.push(NewBet {
                user_id: format!("{SHEET_USER_PREFIX}{}", name.to_ascii_lowercase()),
                user_name: name.to_string(),
                matchup_id: matchup.id,
                team: team.to_string(),
            });
        }
        if !new_bets.is_empty() {
            report.bets = self.store.insert_bets(league_id, &new_bets)?.len();
        }

        // -- results ------------------------------------------------------
        let mut winners: Vec<(&i64, &String)> = data.winners.iter().collect();
        winners.sort();
        for (sheet_id, winner) in winners {
            let Some(matchup) = id_map.get(sheet_id).and_then(|id| by_id.get(id)) else {
                report.skipped += 1;
                continue;
            };
            let Some(team) = matchup.canonical_team(winner) else {
                warn!(matchup_id = matchup.id, winner = %winner, "sheet winner is not playing");
                report.skipped += 1;
                continue;
            };
            self.store.record_result(league_id, matchup.id, team)?;
            report.results += 1;
        }

        if report.results > 0 || report.bets > 0 {
            self.rebuild_leaderboard(league_id)?;
        }

        info!(
            league_id,
            spreadsheet_id = %spreadsheet_id,
            matchups = report.matchups,
            bets = report.bets,
            results = report.results,
            skipped = report.skipped,
            "imported league sheet"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::{app, who};
    use cfmpicks_core::model::ResultLogEntry;
    use cfmpicks_sheets::memory::MemorySheets;
    use cfmpicks_sheets::rows::{header_row, BetRow, MatchupRow};
    use std::sync::Arc;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn seeded() -> Arc<MemorySheets> {
        let sheets = Arc::new(MemorySheets::new());
        sheets.seed(
            "s1",
            "Matchups",
            vec![
                header_row::<MatchupRow>(),
                row(&["10", "1", "TeamA", "TeamB", "1-0", "0-1", "TeamA"]),
                row(&["11", "1", "TeamB", "TeamA"]),
                row(&["12", "1", "TeamC", "TeamC"]),
            ],
        );
        sheets.seed(
            "s1",
            "Bets",
            vec![
                header_row::<BetRow>(),
                row(&["U1", "10", "teama"]),
                row(&["U2", "10", "TeamA"]),
                row(&["U1", "11", "TeamA"]),
                row(&["U1", "11", "TeamB"]),
                row(&["U3", "99", "TeamA"]),
            ],
        );
        sheets.seed(
            "s1",
            "Results",
            vec![header_row::<ResultLogEntry>()],
        );
        sheets
    }

    #[tokio::test]
    async fn connect_stores_id_and_writes_headers() {
        let sheets = Arc::new(MemorySheets::new());
        let app = app().with_sheets(sheets.clone());
        let league = app.create_league(&who("ann"), "Crew").await.unwrap().league;

        let conn = app.connect_sheet(&who("ann"), &league.id, " s9 ").await.unwrap();
        assert_eq!(conn.spreadsheet_id, "s9");
        assert_eq!(conn.initialized.len(), 4);
        assert_eq!(sheets.rows("s9", "Matchups"), vec![header_row::<MatchupRow>()]);
        let stored = app.store().league(&league.id).unwrap().unwrap();
        assert_eq!(stored.settings.spreadsheet_id.as_deref(), Some("s9"));
    }

    #[tokio::test]
    async fn connect_failures() {
        let sheets = Arc::new(MemorySheets::new());
        let app = app().with_sheets(sheets.clone());
        let league = app.create_league(&who("ann"), "Crew").await.unwrap().league;

        sheets.set_failing(true);
        let err = app.connect_sheet(&who("ann"), &league.id, "s1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));
        let stored = app.store().league(&league.id).unwrap().unwrap();
        assert_eq!(stored.settings.spreadsheet_id, None);

        let bare = crate::app::test_support::app();
        let league = bare.create_league(&who("ann"), "Crew").await.unwrap().league;
        let err = bare.connect_sheet(&who("ann"), &league.id, "s1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn import_remaps_ids_and_builds_standings() {
        let app = app().with_sheets(seeded());
        let league = app.create_league(&who("ann"), "Crew").await.unwrap().league;

        let err = app.import_from_sheet(&who("ann"), &league.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        app.connect_sheet(&who("ann"), &league.id, "s1").await.unwrap();
        let report = app.import_from_sheet(&who("ann"), &league.id).await.unwrap();
        assert_eq!(
            report,
            SheetImport {
                matchups: 2,
                bets: 3,
                results: 1,
                // TeamC vs TeamC, duplicate U1 pick, U3 on an unknown matchup.
                skipped: 3,
            }
        );

        let bets = app.store().bets(&league.id).unwrap();
        assert!(bets.iter().all(|b| b.user_id.starts_with(SHEET_USER_PREFIX)));
        assert!(bets.iter().all(|b| b.matchup_id != 10 && b.matchup_id != 11));

        let board = app.leaderboard(&who("ann"), &league.id).unwrap();
        let rows: Vec<(&str, u32, u32)> = board
            .iter()
            .map(|e| (e.user_name.as_str(), e.wins, e.losses))
            .collect();
        assert_eq!(rows, vec![("U1", 1, 0), ("U2", 1, 0)]);
    }

    #[tokio::test]
    async fn importing_twice_adds_nothing() {
        let app = app().with_sheets(seeded());
        let league = app.create_league(&who("ann"), "Crew").await.unwrap().league;
        app.connect_sheet(&who("ann"), &league.id, "s1").await.unwrap();

        app.import_from_sheet(&who("ann"), &league.id).await.unwrap();
        let again = app.import_from_sheet(&who("ann"), &league.id).await.unwrap();
        assert_eq!((again.matchups, again.bets), (0, 0));
        assert_eq!(app.store().matchups(&league.id).unwrap().len(), 2);
        assert_eq!(app.store().bets(&league.id).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn repeated_game_in_one_sheet_is_stored_once() {
        let sheets = Arc::new(MemorySheets::new());
        sheets.seed(
            "s1",
            "Matchups",
            vec![
                header_row::<MatchupRow>(),
                row(&["20", "3", "Bears", "Lions"]),
                row(&["21", "3", "bears", "LIONS"]),
            ],
        );
        sheets.seed(
            "s1",
            "Bets",
            vec![
                header_row::<BetRow>(),
                row(&["Cy", "20", "Bears"]),
                row(&["Di", "21", "Lions"]),
            ],
        );
        let app = app().with_sheets(sheets);
        let league = app.create_league(&who("ann"), "Crew").await.unwrap().league;
        app.connect_sheet(&who("ann"), &league.id, "s1").await.unwrap();

        let report = app.import_from_sheet(&who("ann"), &league.id).await.unwrap();
        assert_eq!((report.matchups, report.bets, report.skipped), (1, 2, 0));

        let stored = app.store().matchups(&league.id).unwrap();
        assert_eq!(stored.len(), 1);
        let bets = app.store().bets(&league.id).unwrap();
        assert!(bets.iter().all(|b| b.matchup_id == stored[0].id));
        assert_eq!(bets[0].user_id, "sheet:cy");
    }

    #[tokio::test]
    async fn bad_rows_are_rejected() {
        let sheets = Arc::new(MemorySheets::new());
        sheets.seed(
            "s1",
            "Matchups",
            vec![header_row::<MatchupRow>(), row(&["x", "1", "A", "B"])],
        );
        let app = app().with_sheets(sheets);
        let league = app.create_league(&who("ann"), "Crew").await.unwrap().league;
        app.connect_sheet(&who("ann"), &league.id, "s1").await.unwrap();

        let err = app.import_from_sheet(&who("ann"), &league.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = app.import_from_sheet(&who("bo"), &league.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
