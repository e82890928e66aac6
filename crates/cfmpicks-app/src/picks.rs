// Weekly matchups and pick submission.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use cfmpicks_core::mirror::MirrorEvent;
use cfmpicks_core::model::{is_valid_record, Bet, Matchup, NewBet, NewMatchup};
use cfmpicks_core::store::MatchupClosed;

use crate::app::App;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::Identity;

/// One matchup as submitted by an admin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchupInput {
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub home_record: Option<String>,
    #[serde(default)]
    pub away_record: Option<String>,
}

/// One row of a matchup CSV upload.
#[derive(Debug, Deserialize)]
struct CsvMatchup {
    week: u32,
    home_team: String,
    away_team: String,
    #[serde(default)]
    home_record: Option<String>,
    #[serde(default)]
    away_record: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvImport {
    pub matchups: Vec<Matchup>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekMatchups {
    /// `None` when the league has no matchups yet.
    pub week: Option<u32>,
    pub matchups: Vec<Matchup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickInput {
    pub matchup_id: i64,
    pub team: String,
}

fn clean_record(record: Option<String>, side: &str) -> ServiceResult<Option<String>> {
    match record.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(r) if is_valid_record(r) => Ok(Some(r.to_string())),
        Some(r) => Err(ServiceError::validation(format!(
            "{side} record `{r}` must look like W-L or W-L-T"
        ))),
    }
}

/// Validate and normalize one matchup for `week`.
fn validate_matchup(week: u32, input: MatchupInput) -> ServiceResult<NewMatchup> {
    if week == 0 {
        return Err(ServiceError::validation("week must be 1 or greater"));
    }
    let home = input.home_team.trim();
    let away = input.away_team.trim();
    if home.is_empty() || away.is_empty() {
        return Err(ServiceError::validation("both teams are required"));
    }
    if home.eq_ignore_ascii_case(away) {
        return Err(ServiceError::validation(format!(
            "a team cannot play itself ({home})"
        )));
    }
    Ok(NewMatchup {
        week,
        home_team: home.to_string(),
        away_team: away.to_string(),
        home_record: clean_record(input.home_record, "home")?,
        away_record: clean_record(input.away_record, "away")?,
    })
}

/// Parse a matchup CSV (`week,home_team,away_team,home_record,away_record`).
/// Rows that fail to parse or validate are skipped with a warning.
fn parse_matchup_csv(text: &str) -> (Vec<NewMatchup>, usize) {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut out = Vec::new();
    let mut skipped = 0;
    for (i, result) in reader.deserialize::<CsvMatchup>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!(row = i + 2, "skipping malformed matchup row: {e}");
                skipped += 1;
                continue;
            }
        };
        let input = MatchupInput {
            home_team: row.home_team,
            away_team: row.away_team,
            home_record: row.home_record,
            away_record: row.away_record,
        };
        match validate_matchup(row.week, input) {
            Ok(m) => out.push(m),
            Err(e) => {
                warn!(row = i + 2, "skipping invalid matchup row: {}", e.details());
                skipped += 1;
            }
        }
    }
    (out, skipped)
}

impl App {
    pub fn add_matchups(
        &self,
        identity: &Identity,
        league_id: &str,
        week: u32,
        inputs: Vec<MatchupInput>,
    ) -> ServiceResult<Vec<Matchup>> {
        let (league, _) = self.require_admin(identity, league_id)?;
        if inputs.is_empty() {
            return Err(ServiceError::validation("no matchups given"));
        }
        let new = inputs
            .into_iter()
            .map(|m| validate_matchup(week, m))
            .collect::<ServiceResult<Vec<_>>>()?;

        let matchups = self.store.insert_matchups(league_id, &new)?;
        info!(league_id, week, count = matchups.len(), "added matchups");
        self.mirror_to_sheet(&league, |spreadsheet_id| MirrorEvent::MatchupsAdded {
            spreadsheet_id,
            matchups: matchups.clone(),
        });
        Ok(matchups)
    }

    pub fn import_matchups_csv(
        &self,
        identity: &Identity,
        league_id: &str,
        csv_text: &str,
    ) -> ServiceResult<CsvImport> {
        let (league, _) = self.require_admin(identity, league_id)?;
        let (new, skipped) = parse_matchup_csv(csv_text);
        if new.is_empty() {
            return Err(ServiceError::validation(format!(
                "no valid matchup rows found ({skipped} skipped)"
            )));
        }

        let matchups = self.store.insert_matchups(league_id, &new)?;
        info!(league_id, count = matchups.len(), skipped, "imported matchups from csv");
        self.mirror_to_sheet(&league, |spreadsheet_id| MirrorEvent::MatchupsAdded {
            spreadsheet_id,
            matchups: matchups.clone(),
        });
        Ok(CsvImport { matchups, skipped })
    }

    /// Matchups for `week`, or for the current (highest) week when omitted.
    pub fn list_matchups(
        &self,
        identity: &Identity,
        league_id: &str,
        week: Option<u32>,
    ) -> ServiceResult<WeekMatchups> {
        self.require_member(identity, league_id)?;
        let week = match week {
            Some(w) => Some(w),
            None => self.store.current_week(league_id)?,
        };
        let matchups = match week {
            Some(w) => self.store.matchups_for_week(league_id, w)?,
            None => Vec::new(),
        };
        Ok(WeekMatchups { week, matchups })
    }

    /// Record the caller's picks for the current week.
    ///
    /// The whole batch is validated before anything is written: each matchup
    /// must belong to this league and the current week, must not be decided
    /// yet, must not already carry a pick from the caller, and the team must
    /// be one of its two teams.
    pub fn submit_picks(
        &self,
        identity: &Identity,
        league_id: &str,
        picks: Vec<PickInput>,
    ) -> ServiceResult<Vec<Bet>> {
        let (league, _) = self.require_member(identity, league_id)?;
        if picks.is_empty() {
            return Err(ServiceError::validation("no picks given"));
        }
        let current_week = self
            .store
            .current_week(league_id)?
            .ok_or_else(|| ServiceError::validation("this league has no matchups yet"))?;

        let already: HashSet<i64> = self
            .store
            .bets_for_user(league_id, &identity.uid)?
            .into_iter()
            .map(|b| b.matchup_id)
            .collect();
        let user_name = self.ensure_profile(identity)?.pick_name().to_string();

        let mut seen = HashSet::new();
        let mut new = Vec::with_capacity(picks.len());
        for pick in picks {
            if !seen.insert(pick.matchup_id) {
                return Err(ServiceError::validation(format!(
                    "matchup {} picked more than once",
                    pick.matchup_id
                )));
            }
            let matchup = self
                .store
                .matchup(league_id, pick.matchup_id)?
                .ok_or_else(|| {
                    ServiceError::validation(format!("matchup {} not found", pick.matchup_id))
                })?;
            if matchup.week != current_week {
                return Err(ServiceError::validation(format!(
                    "matchup {} is not in the current week ({current_week})",
                    matchup.id
                )));
            }
            if matchup.is_decided() {
                return Err(ServiceError::validation(format!(
                    "matchup {} is already decided",
                    matchup.id
                )));
            }
            if already.contains(&matchup.id) {
                return Err(ServiceError::validation(format!(
                    "you already picked matchup {}",
                    matchup.id
                )));
            }
            let team = matchup.canonical_team(&pick.team).ok_or_else(|| {
                ServiceError::validation(format!(
                    "`{}` is not playing in matchup {}",
                    pick.team.trim(),
                    matchup.id
                ))
            })?;
            new.push(NewBet {
                user_id: identity.uid.clone(),
                user_name: user_name.clone(),
                matchup_id: matchup.id,
                team: team.to_string(),
            });
        }

        // A winner marked or a new week added since validation still rejects
        // the batch here.
        let bets = self
            .store
            .insert_open_bets(league_id, &new)
            .map_err(|e| match e.downcast_ref::<MatchupClosed>() {
                Some(closed) => ServiceError::validation(closed.to_string()),
                None => ServiceError::from(e),
            })?;
        info!(league_id, user_id = %identity.uid, count = bets.len(), "picks submitted");
        self.mirror_to_sheet(&league, |spreadsheet_id| MirrorEvent::BetsPlaced {
            spreadsheet_id,
            bets: bets.clone(),
        });
        Ok(bets)
    }

    pub fn my_bets(&self, identity: &Identity, league_id: &str) -> ServiceResult<Vec<Bet>> {
        self.require_member(identity, league_id)?;
        Ok(self.store.bets_for_user(league_id, &identity.uid)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::{app, who};
    use cfmpicks_core::mirror::MirrorSink;
    use std::sync::{Arc, Mutex};

    fn game(home: &str, away: &str) -> MatchupInput {
        MatchupInput {
            home_team: home.into(),
            away_team: away.into(),
            home_record: None,
            away_record: None,
        }
    }

    fn pick(matchup_id: i64, team: &str) -> PickInput {
        PickInput {
            matchup_id,
            team: team.into(),
        }
    }

    async fn league_with_member(app: &App) -> String {
        let league = app.create_league(&who("ann"), "Crew").await.unwrap().league;
        app.join_league(&who("bo"), &league.code).unwrap();
        league.id
    }

    #[tokio::test]
    async fn admin_adds_matchups() {
        let app = app();
        let league = league_with_member(&app).await;

        let err = app
            .add_matchups(&who("bo"), &league, 1, vec![game("Bears", "Packers")])
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let mut input = game(" Bears ", "Packers");
        input.home_record = Some("3-1".into());
        let added = app.add_matchups(&who("ann"), &league, 1, vec![input]).unwrap();
        assert_eq!(added[0].home_team, "Bears");
        assert_eq!(added[0].home_record.as_deref(), Some("3-1"));
    }

    #[tokio::test]
    async fn matchup_validation() {
        let app = app();
        let league = league_with_member(&app).await;
        let admin = who("ann");

        for (week, input) in [
            (0, game("Bears", "Packers")),
            (1, game("Bears", " bears")),
            (1, game("", "Packers")),
            (
                1,
                MatchupInput {
                    away_record: Some("three-one".into()),
                    ..game("Bears", "Packers")
                },
            ),
        ] {
            let err = app.add_matchups(&admin, &league, week, vec![input]).unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert!(app.add_matchups(&admin, &league, 1, vec![]).is_err());
    }

    #[tokio::test]
    async fn list_defaults_to_current_week() {
        let app = app();
        let league = league_with_member(&app).await;

        let empty = app.list_matchups(&who("bo"), &league, None).unwrap();
        assert_eq!(empty.week, None);
        assert!(empty.matchups.is_empty());

        app.add_matchups(&who("ann"), &league, 1, vec![game("A", "B")])
            .unwrap();
        app.add_matchups(&who("ann"), &league, 2, vec![game("C", "D"), game("E", "F")])
            .unwrap();

        let current = app.list_matchups(&who("bo"), &league, None).unwrap();
        assert_eq!(current.week, Some(2));
        assert_eq!(current.matchups.len(), 2);
        let week1 = app.list_matchups(&who("bo"), &league, Some(1)).unwrap();
        assert_eq!(week1.matchups[0].home_team, "A");
    }

    #[tokio::test]
    async fn picks_restricted_to_current_week() {
        let app = app();
        let league = league_with_member(&app).await;
        let old = app
            .add_matchups(&who("ann"), &league, 1, vec![game("A", "B")])
            .unwrap();
        let cur = app
            .add_matchups(&who("ann"), &league, 2, vec![game("C", "D")])
            .unwrap();

        let err = app
            .submit_picks(&who("bo"), &league, vec![pick(old[0].id, "A")])
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let bets = app
            .submit_picks(&who("bo"), &league, vec![pick(cur[0].id, " d ")])
            .unwrap();
        assert_eq!(bets[0].team, "D");
        assert_eq!(bets[0].user_name, "bo");
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let app = app();
        let league = league_with_member(&app).await;
        let ms = app
            .add_matchups(&who("ann"), &league, 1, vec![game("A", "B"), game("C", "D")])
            .unwrap();

        // Second pick names a team not in the matchup: nothing is stored.
        let err = app
            .submit_picks(
                &who("bo"),
                &league,
                vec![pick(ms[0].id, "A"), pick(ms[1].id, "Z")],
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(app.my_bets(&who("bo"), &league).unwrap().is_empty());

        // Same matchup twice in one batch.
        assert!(app
            .submit_picks(
                &who("bo"),
                &league,
                vec![pick(ms[0].id, "A"), pick(ms[0].id, "B")]
            )
            .is_err());

        app.submit_picks(&who("bo"), &league, vec![pick(ms[0].id, "A")])
            .unwrap();
        // A second pick on the same matchup is rejected.
        let err = app
            .submit_picks(&who("bo"), &league, vec![pick(ms[0].id, "B")])
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(app.my_bets(&who("bo"), &league).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn decided_matchups_are_locked() {
        let app = app();
        let league = league_with_member(&app).await;
        let ms = app
            .add_matchups(&who("ann"), &league, 1, vec![game("A", "B")])
            .unwrap();
        app.mark_winner(&who("ann"), &league, ms[0].id, "A").unwrap();

        let err = app
            .submit_picks(&who("bo"), &league, vec![pick(ms[0].id, "A")])
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn non_members_cannot_pick() {
        let app = app();
        let league = league_with_member(&app).await;
        let ms = app
            .add_matchups(&who("ann"), &league, 1, vec![game("A", "B")])
            .unwrap();
        let err = app
            .submit_picks(&who("cy"), &league, vec![pick(ms[0].id, "A")])
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn csv_import_skips_bad_rows() {
        let app = app();
        let league = league_with_member(&app).await;
        let csv = "week,home_team,away_team,home_record,away_record\n\
                   3,Bears,Packers,2-1,1-2\n\
                   x,Lions,Vikings,,\n\
                   3,Jets,Jets,,\n\
                   3,Bills,Dolphins\n";
        let imported = app.import_matchups_csv(&who("ann"), &league, csv).unwrap();
        assert_eq!(imported.matchups.len(), 2);
        assert_eq!(imported.skipped, 2);
        assert_eq!(imported.matchups[1].away_team, "Dolphins");
        assert_eq!(imported.matchups[1].home_record, None);

        let err = app
            .import_matchups_csv(&who("ann"), &league, "week,home_team,away_team\n")
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<MirrorEvent>>);

    impl MirrorSink for Recorder {
        fn notify(&self, event: MirrorEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn game_data_mirrored_only_with_a_sheet() {
        let recorder = Arc::new(Recorder::default());
        let app = app().with_mirror(recorder.clone());
        let league = league_with_member(&app).await;

        app.add_matchups(&who("ann"), &league, 1, vec![game("A", "B")])
            .unwrap();
        let kinds = |r: &Recorder| -> Vec<&'static str> {
            r.0.lock().unwrap().iter().map(|e| e.kind()).collect()
        };
        assert_eq!(
            kinds(&recorder),
            vec!["league_created", "membership_added", "membership_added"]
        );

        app.update_settings(
            &who("ann"),
            &league,
            crate::leagues::SettingsPatch {
                spreadsheet_id: Some("sheet-1".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let ms = app
            .add_matchups(&who("ann"), &league, 2, vec![game("C", "D")])
            .unwrap();
        app.submit_picks(&who("bo"), &league, vec![pick(ms[0].id, "C")])
            .unwrap();
        let recorded = kinds(&recorder);
        assert_eq!(&recorded[3..], &["matchups_added", "bets_placed"]);
    }
}
