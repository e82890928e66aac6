// End-to-end league flow through the public service API, with the sheet
// mirror running against an in-memory spreadsheet.

use std::sync::Arc;

use cfmpicks_app::identity::Identity;
use cfmpicks_app::picks::{MatchupInput, PickInput};
use cfmpicks_app::App;
use cfmpicks_core::config::LeagueRules;
use cfmpicks_core::db::Database;
use cfmpicks_sheets::memory::MemorySheets;
use cfmpicks_sheets::SheetMirror;

fn who(name: &str) -> Identity {
    Identity {
        uid: format!("uid-{name}"),
        email: format!("{name}@example.com"),
        display_name: name.to_string(),
    }
}

fn rules() -> LeagueRules {
    LeagueRules {
        max_code_attempts: 10,
        max_members: 16,
    }
}

fn game(home: &str, away: &str) -> MatchupInput {
    MatchupInput {
        home_team: home.into(),
        away_team: away.into(),
        home_record: None,
        away_record: None,
    }
}

#[tokio::test]
async fn season_week_with_sheet_mirror() {
    let sheets = Arc::new(MemorySheets::new());
    let (mirror, worker) = SheetMirror::spawn(sheets.clone(), Some("boot".into()), 64);
    let app = App::new(Arc::new(Database::open(":memory:").unwrap()), rules())
        .with_mirror(Arc::new(mirror))
        .with_sheets(sheets.clone());

    // Admin creates the league and connects its sheet; two friends join.
    let league = app.create_league(&who("ann"), "Sunday Crew").await.unwrap().league;
    app.connect_sheet(&who("ann"), &league.id, "crew-sheet")
        .await
        .unwrap();
    app.join_league(&who("U1"), &league.code).unwrap();
    app.join_league(&who("U2"), &league.code).unwrap();

    // Week 1 is superseded by week 2; only week 2 takes picks.
    app.add_matchups(&who("ann"), &league.id, 1, vec![game("Old", "Game")])
        .unwrap();
    let week2 = app
        .add_matchups(
            &who("ann"),
            &league.id,
            2,
            vec![game("TeamA", "TeamB"), game("TeamB", "TeamA")],
        )
        .unwrap();
    let (m1, m2) = (week2[0].id, week2[1].id);

    let listed = app.list_matchups(&who("U1"), &league.id, None).unwrap();
    assert_eq!(listed.week, Some(2));
    assert_eq!(listed.matchups.len(), 2);

    let pick = |matchup_id, team: &str| PickInput {
        matchup_id,
        team: team.into(),
    };
    app.submit_picks(&who("U1"), &league.id, vec![pick(m1, "TeamA"), pick(m2, "TeamA")])
        .unwrap();
    app.submit_picks(&who("U2"), &league.id, vec![pick(m1, "TeamA")])
        .unwrap();

    app.mark_winner(&who("ann"), &league.id, m1, "TeamA").unwrap();
    let marked = app.mark_winner(&who("ann"), &league.id, m2, "TeamB").unwrap();

    let board: Vec<(&str, u32, u32, u32)> = marked
        .leaderboard
        .iter()
        .map(|e| (e.user_name.as_str(), e.wins, e.losses, e.points))
        .collect();
    assert_eq!(board, vec![("U2", 1, 0, 100), ("U1", 1, 1, 50)]);

    // Closing the app closes the mirror queue; wait for the worker to drain.
    drop(app);
    worker.await.unwrap();

    assert_eq!(sheets.rows("boot", "Leagues").len(), 1);
    assert_eq!(sheets.rows("boot", "UserRoles").len(), 3);
    // Header, the week-1 game and both week-2 games.
    assert_eq!(sheets.rows("crew-sheet", "Matchups").len(), 4);
    assert_eq!(sheets.rows("crew-sheet", "Bets").len(), 4);
    assert_eq!(sheets.rows("crew-sheet", "Results").len(), 3);

    let leaderboard = sheets.rows("crew-sheet", "Leaderboard");
    assert_eq!(leaderboard.len(), 3);
    assert_eq!(leaderboard[1][1], "U2");
    assert_eq!(leaderboard[2][1], "U1");
}
