// Leaderboard aggregation: a pure function of all bets and all recorded
// results. Nothing here reads a previous leaderboard, so recomputing after
// every result (or twice for the same result) always yields the same table.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Bet, LeaderboardEntry, MatchResult};

/// Correct/incorrect counts for the bets on a single matchup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCounts {
    pub correct: u32,
    pub incorrect: u32,
    pub total: u32,
}

/// Whether a selected team matches the winning team.
pub fn is_correct_pick(selected: &str, winner: &str) -> bool {
    selected.trim().eq_ignore_ascii_case(winner.trim())
}

/// Percentage of correct picks, rounded half away from zero. Zero when the
/// user has no resolved picks.
pub fn win_percentage(wins: u32, losses: u32) -> u32 {
    let total = wins + losses;
    if total == 0 {
        return 0;
    }
    (f64::from(wins) / f64::from(total) * 100.0).round() as u32
}

/// Grade every bet on `matchup_id` against `winner`. Bets on other matchups
/// are ignored.
pub fn grade_matchup(bets: &[Bet], matchup_id: i64, winner: &str) -> GradeCounts {
    let mut counts = GradeCounts::default();
    for bet in bets.iter().filter(|b| b.matchup_id == matchup_id) {
        if is_correct_pick(&bet.team, winner) {
            counts.correct += 1;
        } else {
            counts.incorrect += 1;
        }
        counts.total += 1;
    }
    counts
}

/// Build the full leaderboard from source data.
///
/// Bets on matchups without a recorded result are skipped entirely, so a
/// user only appears once at least one of their picks has been decided.
/// Standings are keyed by user id; the name shown is the one on the user's
/// most recent bet.
///
/// Ordering: percentage descending, then total resolved picks descending,
/// then user name and user id ascending so equal rows come out in a stable
/// order. Rank is the 1-based position in that order.
pub fn compute_leaderboard(bets: &[Bet], results: &[MatchResult]) -> Vec<LeaderboardEntry> {
    compute_leaderboard_named(bets, results, &HashMap::new())
}

/// Like [`compute_leaderboard`], but `names` (user id to display name)
/// overrides the name recorded on the bets. Users missing from `names` keep
/// the name from their latest bet.
pub fn compute_leaderboard_named(
    bets: &[Bet],
    results: &[MatchResult],
    names: &HashMap<String, String>,
) -> Vec<LeaderboardEntry> {
    let winners: HashMap<i64, &str> = results
        .iter()
        .map(|r| (r.matchup_id, r.winner.as_str()))
        .collect();

    let mut tallies: HashMap<&str, Tally<'_>> = HashMap::new();
    for bet in bets {
        let Some(winner) = winners.get(&bet.matchup_id) else {
            continue;
        };
        let tally = tallies.entry(bet.user_id.as_str()).or_insert(Tally {
            latest_bet: bet.id,
            name: bet.user_name.as_str(),
            wins: 0,
            losses: 0,
        });
        if bet.id >= tally.latest_bet {
            tally.latest_bet = bet.id;
            tally.name = bet.user_name.as_str();
        }
        if is_correct_pick(&bet.team, winner) {
            tally.wins += 1;
        } else {
            tally.losses += 1;
        }
    }

    let mut entries: Vec<LeaderboardEntry> = tallies
        .into_iter()
        .map(|(user_id, t)| LeaderboardEntry {
            user_id: user_id.to_string(),
            user_name: names
                .get(user_id)
                .cloned()
                .unwrap_or_else(|| t.name.to_string()),
            wins: t.wins,
            losses: t.losses,
            points: win_percentage(t.wins, t.losses),
            rank: 0,
        })
        .collect();

    entries.sort_by(compare_entries);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i as u32 + 1;
    }
    entries
}

struct Tally<'a> {
    latest_bet: i64,
    name: &'a str,
    wins: u32,
    losses: u32,
}

fn compare_entries(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.total_picks().cmp(&a.total_picks()))
        .then_with(|| a.user_name.cmp(&b.user_name))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn bet(user: &str, matchup_id: i64, team: &str) -> Bet {
        named_bet(&format!("uid-{user}"), user, matchup_id, team)
    }

    fn named_bet(user_id: &str, name: &str, matchup_id: i64, team: &str) -> Bet {
        Bet {
            id: matchup_id,
            league_id: "league".into(),
            user_id: user_id.into(),
            user_name: name.into(),
            matchup_id,
            team: team.into(),
            created_at: Utc::now(),
        }
    }

    fn result(matchup_id: i64, winner: &str) -> MatchResult {
        MatchResult {
            matchup_id,
            winner: winner.into(),
        }
    }

    #[test]
    fn worked_example() {
        let bets = vec![
            bet("U1", 1, "TeamA"),
            bet("U2", 1, "TeamB"),
            bet("U1", 2, "TeamA"),
        ];
        let results = vec![result(1, "TeamA"), result(2, "TeamB")];

        let board = compute_leaderboard(&bets, &results);
        // U2 picked TeamB for M1 and lost; U1 split.
        let names: Vec<&str> = board.iter().map(|e| e.user_name.as_str()).collect();
        assert_eq!(names, vec!["U1", "U2"]);

        let u1 = board.iter().find(|e| e.user_name == "U1").unwrap();
        assert_eq!((u1.wins, u1.losses, u1.points), (1, 1, 50));
        let u2 = board.iter().find(|e| e.user_name == "U2").unwrap();
        assert_eq!((u2.wins, u2.losses, u2.points), (0, 1, 0));
    }

    #[test]
    fn worked_example_with_u2_correct() {
        let bets = vec![
            bet("U1", 1, "TeamA"),
            bet("U2", 1, "TeamA"),
            bet("U1", 2, "TeamA"),
        ];
        let results = vec![result(1, "TeamA"), result(2, "TeamB")];

        let board = compute_leaderboard(&bets, &results);
        assert_eq!(board[0].user_name, "U2");
        assert_eq!(
            (board[0].wins, board[0].losses, board[0].points, board[0].rank),
            (1, 0, 100, 1)
        );
        assert_eq!(board[1].user_name, "U1");
        assert_eq!(
            (board[1].wins, board[1].losses, board[1].points, board[1].rank),
            (1, 1, 50, 2)
        );
    }

    #[test]
    fn undecided_matchups_are_excluded() {
        let bets = vec![bet("U1", 1, "A"), bet("U2", 2, "B")];
        let results = vec![result(1, "A")];

        let board = compute_leaderboard(&bets, &results);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].user_name, "U1");
        assert_eq!(board[0].total_picks(), 1);
    }

    #[test]
    fn team_match_is_case_insensitive() {
        let bets = vec![bet("U1", 1, " teama ")];
        let board = compute_leaderboard(&bets, &[result(1, "TeamA")]);
        assert_eq!(board[0].wins, 1);
    }

    #[test]
    fn ties_break_on_total_picks_then_name() {
        // Both at 50%; "b" has four resolved picks, "a" and "c" two each.
        let bets = vec![
            bet("a", 1, "X"),
            bet("a", 2, "X"),
            bet("c", 1, "X"),
            bet("c", 2, "X"),
            bet("b", 1, "X"),
            bet("b", 2, "X"),
            bet("b", 3, "X"),
            bet("b", 4, "X"),
        ];
        let results = vec![
            result(1, "X"),
            result(2, "Y"),
            result(3, "X"),
            result(4, "Y"),
        ];
        let board = compute_leaderboard(&bets, &results);
        let order: Vec<(&str, u32)> = board
            .iter()
            .map(|e| (e.user_name.as_str(), e.rank))
            .collect();
        assert_eq!(order, vec![("b", 1), ("a", 2), ("c", 3)]);
    }

    #[test]
    fn users_sharing_a_name_get_separate_rows() {
        let bets = vec![
            named_bet("uid-1", "Alex", 1, "A"),
            named_bet("uid-2", "Alex", 1, "B"),
        ];
        let board = compute_leaderboard(&bets, &[result(1, "A")]);
        let rows: Vec<(&str, &str, u32, u32, u32)> = board
            .iter()
            .map(|e| (e.user_id.as_str(), e.user_name.as_str(), e.wins, e.losses, e.rank))
            .collect();
        assert_eq!(
            rows,
            vec![("uid-1", "Alex", 1, 0, 1), ("uid-2", "Alex", 0, 1, 2)]
        );
    }

    #[test]
    fn renamed_user_keeps_one_row_under_latest_name() {
        let bets = vec![
            named_bet("uid-bo", "bo", 1, "A"),
            named_bet("uid-bo", "bobo", 2, "B"),
        ];
        let results = vec![result(1, "A"), result(2, "B")];

        let board = compute_leaderboard(&bets, &results);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].user_name, "bobo");
        assert_eq!((board[0].wins, board[0].losses, board[0].points), (2, 0, 100));

        let names = HashMap::from([("uid-bo".to_string(), "Bo Jackson".to_string())]);
        let board = compute_leaderboard_named(&bets, &results, &names);
        assert_eq!(board[0].user_name, "Bo Jackson");
        assert_eq!(board[0].wins, 2);
    }

    #[test]
    fn percentage_rounds_to_nearest() {
        assert_eq!(win_percentage(0, 0), 0);
        assert_eq!(win_percentage(1, 2), 33);
        assert_eq!(win_percentage(2, 1), 67);
        assert_eq!(win_percentage(1, 7), 13); // 12.5 rounds up
        assert_eq!(win_percentage(5, 0), 100);
    }

    #[test]
    fn grade_matchup_counts_only_that_matchup() {
        let bets = vec![
            bet("U1", 1, "A"),
            bet("U2", 1, "b"),
            bet("U3", 1, "B"),
            bet("U1", 2, "B"),
        ];
        let counts = grade_matchup(&bets, 1, "B");
        assert_eq!(
            counts,
            GradeCounts {
                correct: 2,
                incorrect: 1,
                total: 3
            }
        );
    }

    #[test]
    fn recomputing_is_idempotent() {
        let bets = vec![bet("U1", 1, "A"), bet("U2", 1, "B")];
        let mut results = vec![result(1, "A")];
        let first = compute_leaderboard(&bets, &results);
        // Recording the same winner again must not double count.
        results.push(result(1, "A"));
        let second = compute_leaderboard(&bets, &results);
        assert_eq!(first, second);
    }

    #[test]
    fn totals_match_resolved_bets_and_order_holds() {
        let mut rng = StdRng::seed_from_u64(2024);
        let users = ["ann", "bo", "cy", "di", "ed"];
        for _ in 0..50 {
            let matchups: i64 = rng.gen_range(1..12);
            let mut bets = Vec::new();
            for m in 1..=matchups {
                for u in users {
                    if rng.gen_bool(0.7) {
                        let team = if rng.gen_bool(0.5) { "H" } else { "A" };
                        bets.push(bet(u, m, team));
                    }
                }
            }
            let results: Vec<MatchResult> = (1..=matchups)
                .filter_map(|m| {
                    if rng.gen_bool(0.6) {
                        Some(result(m, if rng.gen_bool(0.5) { "H" } else { "A" }))
                    } else {
                        None
                    }
                })
                .collect();
            let decided: std::collections::HashSet<i64> =
                results.iter().map(|r| r.matchup_id).collect();

            let board = compute_leaderboard(&bets, &results);
            let resolved = bets
                .iter()
                .filter(|b| decided.contains(&b.matchup_id))
                .count() as u32;
            let total: u32 = board.iter().map(|e| e.wins + e.losses).sum();
            assert_eq!(total, resolved);

            for pair in board.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                assert!(
                    a.points > b.points
                        || (a.points == b.points && a.total_picks() >= b.total_picks())
                );
                assert_eq!(a.rank + 1, b.rank);
            }
            for e in &board {
                assert_eq!(e.points, win_percentage(e.wins, e.losses));
            }
        }
    }
}
