// SQLite persistence layer: the primary store for leagues, profiles,
// memberships and game data.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::model::{
    Bet, LeaderboardEntry, League, LeagueSettings, LegacyRole, MatchResult, Matchup, Membership,
    NewBet, NewMatchup, ResultLogEntry, Role, UserProfile,
};
use crate::store::{LeagueStore, MatchupClosed};

const LEAGUE_COLUMNS: &str = "id, name, admin_user_id, admin_email, code, active, paid, \
     member_count, spreadsheet_id, season_label, created_at";
const PROFILE_COLUMNS: &str = "id, user_id, email, display_name, username, default_league_id, \
     preferences, created_at, updated_at";
const MEMBERSHIP_COLUMNS: &str =
    "id, user_id, league_id, role, active, premium, joined_at, last_accessed";
const MATCHUP_COLUMNS: &str =
    "id, league_id, week, home_team, away_team, home_record, away_record, winner";
const BET_COLUMNS: &str = "id, league_id, user_id, user_name, matchup_id, team, created_at";

/// SQLite-backed implementation of [`LeagueStore`].
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS leagues (
                id             TEXT PRIMARY KEY,
                name           TEXT NOT NULL,
                admin_user_id  TEXT NOT NULL,
                admin_email    TEXT NOT NULL,
                code           TEXT NOT NULL UNIQUE,
                active         INTEGER NOT NULL DEFAULT 1,
                paid           INTEGER NOT NULL DEFAULT 0,
                member_count   INTEGER NOT NULL DEFAULT 0,
                spreadsheet_id TEXT,
                season_label   TEXT,
                created_at     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_profiles (
                id                TEXT PRIMARY KEY,
                user_id           TEXT NOT NULL UNIQUE,
                email             TEXT NOT NULL,
                display_name      TEXT NOT NULL,
                username          TEXT UNIQUE,
                default_league_id TEXT,
                preferences       TEXT NOT NULL DEFAULT '{}',
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS memberships (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL,
                league_id     TEXT NOT NULL REFERENCES leagues(id),
                role          TEXT NOT NULL,
                active        INTEGER NOT NULL DEFAULT 1,
                premium       INTEGER NOT NULL DEFAULT 0,
                joined_at     TEXT NOT NULL,
                last_accessed TEXT NOT NULL,
                UNIQUE(user_id, league_id)
            );

            CREATE TABLE IF NOT EXISTS user_roles (
                email     TEXT NOT NULL,
                league_id TEXT NOT NULL,
                role      TEXT NOT NULL,
                PRIMARY KEY (email, league_id)
            );

            CREATE TABLE IF NOT EXISTS matchups (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id   TEXT NOT NULL REFERENCES leagues(id),
                week        INTEGER NOT NULL,
                home_team   TEXT NOT NULL,
                away_team   TEXT NOT NULL,
                home_record TEXT,
                away_record TEXT,
                winner      TEXT
            );

            CREATE TABLE IF NOT EXISTS bets (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id  TEXT NOT NULL REFERENCES leagues(id),
                user_id    TEXT NOT NULL,
                user_name  TEXT NOT NULL,
                matchup_id INTEGER NOT NULL REFERENCES matchups(id),
                team       TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(league_id, user_id, matchup_id)
            );

            CREATE TABLE IF NOT EXISTS results_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id   TEXT NOT NULL,
                matchup_id  INTEGER NOT NULL,
                winner      TEXT NOT NULL,
                correct     INTEGER NOT NULL,
                incorrect   INTEGER NOT NULL,
                total       INTEGER NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS leaderboard_snapshots (
                league_id  TEXT PRIMARY KEY,
                entries    TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_matchups_league_week ON matchups(league_id, week);
            CREATE INDEX IF NOT EXISTS idx_bets_league_matchup ON bets(league_id, matchup_id);
            CREATE INDEX IF NOT EXISTS idx_memberships_league ON memberships(league_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Insert a batch of bets in one transaction. With `open_only`, a bet is
    /// written only while its matchup is undecided and in the current week;
    /// otherwise the batch fails with [`MatchupClosed`].
    fn insert_bet_rows(&self, league_id: &str, bets: &[NewBet], open_only: bool) -> Result<Vec<Bet>> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let sql = if open_only {
            "INSERT INTO bets (league_id, user_id, user_name, matchup_id, team, created_at)
             SELECT ?1, ?2, ?3, m.id, ?5, ?6 FROM matchups m
             WHERE m.id = ?4 AND m.league_id = ?1 AND m.winner IS NULL
               AND m.week = (SELECT MAX(week) FROM matchups WHERE league_id = ?1)"
        } else {
            "INSERT INTO bets (league_id, user_id, user_name, matchup_id, team, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        };
        let now = Utc::now();
        let created_at = ts(now);
        let mut inserted = Vec::with_capacity(bets.len());
        for b in bets {
            let written = tx
                .execute(
                    sql,
                    params![league_id, b.user_id, b.user_name, b.matchup_id, b.team, created_at],
                )
                .context("failed to insert bet")?;
            if written == 0 {
                return Err(MatchupClosed {
                    matchup_id: b.matchup_id,
                }
                .into());
            }
            inserted.push(Bet {
                id: tx.last_insert_rowid(),
                league_id: league_id.to_string(),
                user_id: b.user_id.clone(),
                user_name: b.user_name.clone(),
                matchup_id: b.matchup_id,
                team: b.team.clone(),
                created_at: now,
            });
        }
        tx.commit().context("failed to commit bets")?;
        Ok(inserted)
    }

    /// Run a query returning zero or more rows mapped by `map`.
    fn query_all<T, P, F>(&self, sql: &str, params: P, map: F, what: &str) -> Result<Vec<T>>
    where
        P: rusqlite::Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(sql)
            .with_context(|| format!("failed to prepare {what} query"))?;
        let rows = stmt
            .query_map(params, map)
            .with_context(|| format!("failed to query {what}"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("failed to map {what} rows"))?;
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_role(row: &Row<'_>, idx: usize) -> rusqlite::Result<Role> {
    let raw: String = row.get(idx)?;
    Role::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown role `{raw}`").into(),
        )
    })
}

fn league_from_row(row: &Row<'_>) -> rusqlite::Result<League> {
    Ok(League {
        id: row.get(0)?,
        name: row.get(1)?,
        admin_user_id: row.get(2)?,
        admin_email: row.get(3)?,
        code: row.get(4)?,
        active: row.get(5)?,
        paid: row.get(6)?,
        member_count: row.get(7)?,
        settings: LeagueSettings {
            spreadsheet_id: row.get(8)?,
            season_label: row.get(9)?,
        },
        created_at: parse_ts(row, 10)?,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    let prefs_json: String = row.get(6)?;
    let preferences = serde_json::from_str(&prefs_json).unwrap_or_default();
    Ok(UserProfile {
        id: row.get(0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        display_name: row.get(3)?,
        username: row.get(4)?,
        default_league_id: row.get(5)?,
        preferences,
        created_at: parse_ts(row, 7)?,
        updated_at: parse_ts(row, 8)?,
    })
}

fn membership_from_row(row: &Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        id: row.get(0)?,
        user_id: row.get(1)?,
        league_id: row.get(2)?,
        role: parse_role(row, 3)?,
        active: row.get(4)?,
        premium: row.get(5)?,
        joined_at: parse_ts(row, 6)?,
        last_accessed: parse_ts(row, 7)?,
    })
}

fn matchup_from_row(row: &Row<'_>) -> rusqlite::Result<Matchup> {
    Ok(Matchup {
        id: row.get(0)?,
        league_id: row.get(1)?,
        week: row.get(2)?,
        home_team: row.get(3)?,
        away_team: row.get(4)?,
        home_record: row.get(5)?,
        away_record: row.get(6)?,
        winner: row.get(7)?,
    })
}

fn bet_from_row(row: &Row<'_>) -> rusqlite::Result<Bet> {
    Ok(Bet {
        id: row.get(0)?,
        league_id: row.get(1)?,
        user_id: row.get(2)?,
        user_name: row.get(3)?,
        matchup_id: row.get(4)?,
        team: row.get(5)?,
        created_at: parse_ts(row, 6)?,
    })
}

fn insert_league_row(conn: &Connection, league: &League) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO leagues ({LEAGUE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            league.id,
            league.name,
            league.admin_user_id,
            league.admin_email,
            league.code,
            league.active,
            league.paid,
            league.member_count,
            league.settings.spreadsheet_id,
            league.settings.season_label,
            ts(league.created_at),
        ],
    )
    .context("failed to insert league")?;
    Ok(())
}

fn insert_membership_row(conn: &Connection, membership: &Membership) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO memberships ({MEMBERSHIP_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            membership.id,
            membership.user_id,
            membership.league_id,
            membership.role.as_str(),
            membership.active,
            membership.premium,
            ts(membership.joined_at),
            ts(membership.last_accessed),
        ],
    )
    .context("failed to insert membership")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// LeagueStore implementation
// ---------------------------------------------------------------------------

impl LeagueStore for Database {
    fn insert_league(&self, league: &League) -> Result<()> {
        insert_league_row(&self.conn(), league)
    }

    fn insert_league_with_admin(&self, league: &League, admin: &Membership) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        insert_league_row(&tx, league)?;
        insert_membership_row(&tx, admin)?;
        tx.commit().context("failed to commit league")?;
        Ok(())
    }

    fn league(&self, league_id: &str) -> Result<Option<League>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {LEAGUE_COLUMNS} FROM leagues WHERE id = ?1"),
            params![league_id],
            league_from_row,
        )
        .optional()
        .context("failed to load league")
    }

    fn league_by_code(&self, code: &str) -> Result<Option<League>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {LEAGUE_COLUMNS} FROM leagues WHERE code = ?1"),
            params![code],
            league_from_row,
        )
        .optional()
        .context("failed to load league by code")
    }

    fn league_code_exists(&self, code: &str) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM leagues WHERE code = ?1)",
                params![code],
                |row| row.get(0),
            )
            .context("failed to check league code")?;
        Ok(exists)
    }

    fn update_league(&self, league: &League) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE leagues SET name = ?2, active = ?3, spreadsheet_id = ?4, season_label = ?5
                 WHERE id = ?1",
                params![
                    league.id,
                    league.name,
                    league.active,
                    league.settings.spreadsheet_id,
                    league.settings.season_label,
                ],
            )
            .context("failed to update league")?;
        Ok(changed > 0)
    }

    fn mark_league_paid(&self, league_id: &str) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE leagues SET paid = 1 WHERE id = ?1",
                params![league_id],
            )
            .context("failed to mark league paid")?;
        Ok(changed > 0)
    }

    fn adjust_member_count(&self, league_id: &str, delta: i32) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE leagues SET member_count = MAX(0, member_count + ?2) WHERE id = ?1",
            params![league_id, delta],
        )
        .context("failed to adjust member count")?;
        Ok(())
    }

    fn profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = ?1"),
            params![user_id],
            profile_from_row,
        )
        .optional()
        .context("failed to load profile")
    }

    fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        let conn = self.conn();
        let prefs = serde_json::to_string(&profile.preferences)
            .context("failed to serialize preferences")?;
        conn.execute(
            "INSERT INTO user_profiles
                (id, user_id, email, display_name, username, default_league_id, preferences, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(user_id) DO UPDATE SET
                email             = excluded.email,
                display_name      = excluded.display_name,
                username          = excluded.username,
                default_league_id = excluded.default_league_id,
                preferences       = excluded.preferences,
                updated_at        = excluded.updated_at",
            params![
                profile.id,
                profile.user_id,
                profile.email,
                profile.display_name,
                profile.username,
                profile.default_league_id,
                prefs,
                ts(profile.created_at),
                ts(profile.updated_at),
            ],
        )
        .context("failed to upsert profile")?;
        Ok(())
    }

    fn username_owner(&self, username: &str) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT user_id FROM user_profiles WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )
        .optional()
        .context("failed to look up username")
    }

    fn membership(&self, user_id: &str, league_id: &str) -> Result<Option<Membership>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = ?1 AND league_id = ?2"
            ),
            params![user_id, league_id],
            membership_from_row,
        )
        .optional()
        .context("failed to load membership")
    }

    fn insert_membership(&self, membership: &Membership) -> Result<()> {
        insert_membership_row(&self.conn(), membership)
    }

    fn update_membership(&self, membership: &Membership) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE memberships SET role = ?2, active = ?3, premium = ?4, last_accessed = ?5
             WHERE id = ?1",
            params![
                membership.id,
                membership.role.as_str(),
                membership.active,
                membership.premium,
                ts(membership.last_accessed),
            ],
        )
        .context("failed to update membership")?;
        Ok(())
    }

    fn memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>> {
        self.query_all(
            &format!(
                "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = ?1 ORDER BY joined_at"
            ),
            params![user_id],
            membership_from_row,
            "memberships for user",
        )
    }

    fn memberships_for_league(&self, league_id: &str) -> Result<Vec<Membership>> {
        self.query_all(
            &format!(
                "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE league_id = ?1 ORDER BY joined_at"
            ),
            params![league_id],
            membership_from_row,
            "memberships for league",
        )
    }

    fn set_league_premium(&self, league_id: &str) -> Result<usize> {
        let conn = self.conn();
        conn.execute(
            "UPDATE memberships SET premium = 1 WHERE league_id = ?1",
            params![league_id],
        )
        .context("failed to set premium memberships")
    }

    fn legacy_roles(&self, email: &str) -> Result<Vec<LegacyRole>> {
        let rows: Vec<(String, String, String)> = self.query_all(
            "SELECT email, league_id, role FROM user_roles WHERE email = ?1 COLLATE NOCASE",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            "legacy roles",
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|(email, league_id, role)| {
                let role = Role::parse(&role);
                if role.is_none() {
                    tracing::warn!(%email, %league_id, "skipping legacy role with unknown value");
                }
                role.map(|role| LegacyRole {
                    email,
                    league_id,
                    role,
                })
            })
            .collect())
    }

    fn insert_legacy_role(&self, role: &LegacyRole) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO user_roles (email, league_id, role) VALUES (?1, ?2, ?3)",
            params![role.email, role.league_id, role.role.as_str()],
        )
        .context("failed to insert legacy role")?;
        Ok(())
    }

    fn insert_matchups(&self, league_id: &str, matchups: &[NewMatchup]) -> Result<Vec<Matchup>> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let mut inserted = Vec::with_capacity(matchups.len());
        for m in matchups {
            tx.execute(
                "INSERT INTO matchups (league_id, week, home_team, away_team, home_record, away_record)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    league_id,
                    m.week,
                    m.home_team,
                    m.away_team,
                    m.home_record,
                    m.away_record,
                ],
            )
            .context("failed to insert matchup")?;
            inserted.push(Matchup {
                id: tx.last_insert_rowid(),
                league_id: league_id.to_string(),
                week: m.week,
                home_team: m.home_team.clone(),
                away_team: m.away_team.clone(),
                home_record: m.home_record.clone(),
                away_record: m.away_record.clone(),
                winner: None,
            });
        }
        tx.commit().context("failed to commit matchups")?;
        Ok(inserted)
    }

    fn matchups(&self, league_id: &str) -> Result<Vec<Matchup>> {
        self.query_all(
            &format!("SELECT {MATCHUP_COLUMNS} FROM matchups WHERE league_id = ?1 ORDER BY week, id"),
            params![league_id],
            matchup_from_row,
            "matchups",
        )
    }

    fn matchups_for_week(&self, league_id: &str, week: u32) -> Result<Vec<Matchup>> {
        self.query_all(
            &format!(
                "SELECT {MATCHUP_COLUMNS} FROM matchups WHERE league_id = ?1 AND week = ?2 ORDER BY id"
            ),
            params![league_id, week],
            matchup_from_row,
            "matchups for week",
        )
    }

    fn matchup(&self, league_id: &str, matchup_id: i64) -> Result<Option<Matchup>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {MATCHUP_COLUMNS} FROM matchups WHERE league_id = ?1 AND id = ?2"),
            params![league_id, matchup_id],
            matchup_from_row,
        )
        .optional()
        .context("failed to load matchup")
    }

    fn current_week(&self, league_id: &str) -> Result<Option<u32>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT MAX(week) FROM matchups WHERE league_id = ?1",
            params![league_id],
            |row| row.get(0),
        )
        .context("failed to compute current week")
    }

    fn record_result(&self, league_id: &str, matchup_id: i64, winner: &str) -> Result<()> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE matchups SET winner = ?3 WHERE league_id = ?1 AND id = ?2",
                params![league_id, matchup_id, winner],
            )
            .context("failed to record result")?;
        if changed == 0 {
            anyhow::bail!("matchup {matchup_id} not found in league {league_id}");
        }
        Ok(())
    }

    fn results(&self, league_id: &str) -> Result<Vec<MatchResult>> {
        self.query_all(
            "SELECT id, winner FROM matchups
             WHERE league_id = ?1 AND winner IS NOT NULL ORDER BY id",
            params![league_id],
            |row| {
                Ok(MatchResult {
                    matchup_id: row.get(0)?,
                    winner: row.get(1)?,
                })
            },
            "results",
        )
    }

    fn insert_bets(&self, league_id: &str, bets: &[NewBet]) -> Result<Vec<Bet>> {
        self.insert_bet_rows(league_id, bets, false)
    }

    fn insert_open_bets(&self, league_id: &str, bets: &[NewBet]) -> Result<Vec<Bet>> {
        self.insert_bet_rows(league_id, bets, true)
    }

    fn bets(&self, league_id: &str) -> Result<Vec<Bet>> {
        self.query_all(
            &format!("SELECT {BET_COLUMNS} FROM bets WHERE league_id = ?1 ORDER BY id"),
            params![league_id],
            bet_from_row,
            "bets",
        )
    }

    fn bets_for_matchup(&self, league_id: &str, matchup_id: i64) -> Result<Vec<Bet>> {
        self.query_all(
            &format!(
                "SELECT {BET_COLUMNS} FROM bets WHERE league_id = ?1 AND matchup_id = ?2 ORDER BY id"
            ),
            params![league_id, matchup_id],
            bet_from_row,
            "bets for matchup",
        )
    }

    fn bets_for_user(&self, league_id: &str, user_id: &str) -> Result<Vec<Bet>> {
        self.query_all(
            &format!(
                "SELECT {BET_COLUMNS} FROM bets WHERE league_id = ?1 AND user_id = ?2 ORDER BY id"
            ),
            params![league_id, user_id],
            bet_from_row,
            "bets for user",
        )
    }

    fn append_result_log(&self, league_id: &str, entry: &ResultLogEntry) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO results_log (league_id, matchup_id, winner, correct, incorrect, total, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                league_id,
                entry.matchup_id,
                entry.winner,
                entry.correct,
                entry.incorrect,
                entry.total,
                ts(entry.recorded_at),
            ],
        )
        .context("failed to append results log")?;
        Ok(())
    }

    fn result_log(&self, league_id: &str) -> Result<Vec<ResultLogEntry>> {
        self.query_all(
            "SELECT matchup_id, winner, correct, incorrect, total, recorded_at
             FROM results_log WHERE league_id = ?1 ORDER BY id",
            params![league_id],
            |row| {
                Ok(ResultLogEntry {
                    matchup_id: row.get(0)?,
                    winner: row.get(1)?,
                    correct: row.get(2)?,
                    incorrect: row.get(3)?,
                    total: row.get(4)?,
                    recorded_at: parse_ts(row, 5)?,
                })
            },
            "results log",
        )
    }

    fn save_leaderboard_snapshot(
        &self,
        league_id: &str,
        entries: &[LeaderboardEntry],
    ) -> Result<()> {
        let conn = self.conn();
        let json = serde_json::to_string(entries).context("failed to serialize leaderboard")?;
        conn.execute(
            "INSERT OR REPLACE INTO leaderboard_snapshots (league_id, entries, updated_at)
             VALUES (?1, ?2, ?3)",
            params![league_id, json, ts(Utc::now())],
        )
        .context("failed to save leaderboard snapshot")?;
        Ok(())
    }

    fn leaderboard_snapshot(&self, league_id: &str) -> Result<Option<Vec<LeaderboardEntry>>> {
        let conn = self.conn();
        let json: Option<String> = conn
            .query_row(
                "SELECT entries FROM leaderboard_snapshots WHERE league_id = ?1",
                params![league_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to load leaderboard snapshot")?;
        match json {
            Some(json) => {
                let entries = serde_json::from_str(&json)
                    .context("failed to deserialize leaderboard snapshot")?;
                Ok(Some(entries))
            }
            None => Ok(None),
        }
    }
}
