// Typed rows for the spreadsheet ranges.
//
// Cells come back from the API as loosely typed strings. Every range has a
// fixed header layout; rows are checked against it here and turned into
// domain records, so nothing past this module sees raw cells.

use chrono::{DateTime, Utc};
use thiserror::Error;

use cfmpicks_core::model::{LeaderboardEntry, League, LegacyRole, Matchup, ResultLogEntry, Role};

#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("expected at most {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("column `{column}` is required")]
    Missing { column: &'static str },

    #[error("column `{column}` has invalid value `{value}`: {reason}")]
    Invalid {
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("{range} row {row}: {source}")]
    AtRow {
        range: &'static str,
        row: usize,
        source: Box<RowError>,
    },
}

/// A record stored as one row of a named sheet range.
pub trait SheetRow: Sized {
    const RANGE: &'static str;
    const HEADERS: &'static [&'static str];

    fn from_row(cells: &[String]) -> Result<Self, RowError>;
    fn to_row(&self) -> Vec<String>;
}

/// The header row for `T`, ready to write.
pub fn header_row<T: SheetRow>() -> Vec<String> {
    T::HEADERS.iter().map(|h| h.to_string()).collect()
}

/// Decode every data row of a range.
///
/// A leading row that repeats the headers is skipped, as are rows with no
/// content. The first bad row aborts decoding and is reported with its
/// 1-based row number as shown in the sheet.
pub fn decode_rows<T: SheetRow>(values: &[Vec<String>]) -> Result<Vec<T>, RowError> {
    let mut out = Vec::with_capacity(values.len());
    for (i, row) in values.iter().enumerate() {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if i == 0 && is_header(row, T::HEADERS) {
            continue;
        }
        let record = T::from_row(row).map_err(|source| RowError::AtRow {
            range: T::RANGE,
            row: i + 1,
            source: Box::new(source),
        })?;
        out.push(record);
    }
    Ok(out)
}

fn is_header(row: &[String], headers: &[&str]) -> bool {
    row.first()
        .zip(headers.first())
        .is_some_and(|(cell, h)| cell.trim().eq_ignore_ascii_case(h))
}

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

/// Cursor over a row's cells that pads missing trailing cells with "".
struct Cells<'a> {
    cells: &'a [String],
    headers: &'static [&'static str],
    idx: usize,
}

impl<'a> Cells<'a> {
    fn new(cells: &'a [String], headers: &'static [&'static str]) -> Result<Self, RowError> {
        if cells.len() > headers.len() {
            return Err(RowError::ColumnCount {
                expected: headers.len(),
                found: cells.len(),
            });
        }
        Ok(Self {
            cells,
            headers,
            idx: 0,
        })
    }

    fn next_raw(&mut self) -> (&'static str, &'a str) {
        let column = self.headers[self.idx];
        let value = self.cells.get(self.idx).map(|s| s.trim()).unwrap_or("");
        self.idx += 1;
        (column, value)
    }

    fn text(&mut self) -> Result<String, RowError> {
        let (column, value) = self.next_raw();
        if value.is_empty() {
            return Err(RowError::Missing { column });
        }
        Ok(value.to_string())
    }

    fn optional(&mut self) -> Option<String> {
        let (_, value) = self.next_raw();
        (!value.is_empty()).then(|| value.to_string())
    }

    fn number<N>(&mut self) -> Result<N, RowError>
    where
        N: std::str::FromStr,
        N::Err: std::fmt::Display,
    {
        let (column, value) = self.next_raw();
        if value.is_empty() {
            return Err(RowError::Missing { column });
        }
        value.parse().map_err(|e: N::Err| RowError::Invalid {
            column,
            value: value.to_string(),
            reason: e.to_string(),
        })
    }

    fn flag(&mut self) -> Result<bool, RowError> {
        let (column, value) = self.next_raw();
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            _ => Err(RowError::Invalid {
                column,
                value: value.to_string(),
                reason: "expected TRUE or FALSE".into(),
            }),
        }
    }

    fn timestamp(&mut self) -> Result<Option<DateTime<Utc>>, RowError> {
        let (column, value) = self.next_raw();
        if value.is_empty() {
            return Ok(None);
        }
        DateTime::parse_from_rfc3339(value)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| RowError::Invalid {
                column,
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    fn role(&mut self) -> Result<Role, RowError> {
        let (column, value) = self.next_raw();
        Role::parse(value).ok_or_else(|| RowError::Invalid {
            column,
            value: value.to_string(),
            reason: "expected admin or user".into(),
        })
    }
}

fn flag_cell(b: bool) -> String {
    let cell = if b { "TRUE" } else { "FALSE" };
    cell.to_string()
}

// ---------------------------------------------------------------------------
// Per-league ranges
// ---------------------------------------------------------------------------

/// A matchup as kept in a league's `Matchups` range. The id is the one the
/// sheet was written with and is remapped on import.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupRow {
    pub id: i64,
    pub week: u32,
    pub home_team: String,
    pub away_team: String,
    pub home_record: Option<String>,
    pub away_record: Option<String>,
    pub winner: Option<String>,
}

impl From<&Matchup> for MatchupRow {
    fn from(m: &Matchup) -> Self {
        Self {
            id: m.id,
            week: m.week,
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            home_record: m.home_record.clone(),
            away_record: m.away_record.clone(),
            winner: m.winner.clone(),
        }
    }
}

impl SheetRow for MatchupRow {
    const RANGE: &'static str = "Matchups";
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "Week",
        "Home Team",
        "Away Team",
        "Home Record",
        "Away Record",
        "Winner",
    ];

    fn from_row(cells: &[String]) -> Result<Self, RowError> {
        let mut c = Cells::new(cells, Self::HEADERS)?;
        Ok(Self {
            id: c.number()?,
            week: c.number()?,
            home_team: c.text()?,
            away_team: c.text()?,
            home_record: c.optional(),
            away_record: c.optional(),
            winner: c.optional(),
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.week.to_string(),
            self.home_team.clone(),
            self.away_team.clone(),
            self.home_record.clone().unwrap_or_default(),
            self.away_record.clone().unwrap_or_default(),
            self.winner.clone().unwrap_or_default(),
        ]
    }
}

/// A pick as kept in a league's `Bets` range. Sheets only know the name the
/// pick was made under.
#[derive(Debug, Clone, PartialEq)]
pub struct BetRow {
    pub user_name: String,
    pub matchup_id: i64,
    pub team: String,
    pub placed_at: Option<DateTime<Utc>>,
}

impl SheetRow for BetRow {
    const RANGE: &'static str = "Bets";
    const HEADERS: &'static [&'static str] = &["User", "Matchup ID", "Team", "Placed At"];

    fn from_row(cells: &[String]) -> Result<Self, RowError> {
        let mut c = Cells::new(cells, Self::HEADERS)?;
        Ok(Self {
            user_name: c.text()?,
            matchup_id: c.number()?,
            team: c.text()?,
            placed_at: c.timestamp()?,
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.user_name.clone(),
            self.matchup_id.to_string(),
            self.team.clone(),
            self.placed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ]
    }
}

impl SheetRow for LeaderboardEntry {
    const RANGE: &'static str = "Leaderboard";
    const HEADERS: &'static [&'static str] =
        &["Rank", "User", "Wins", "Losses", "Points", "User ID"];

    /// Sheets written before the `User ID` column existed fall back to the
    /// user name as the key.
    fn from_row(cells: &[String]) -> Result<Self, RowError> {
        let mut c = Cells::new(cells, Self::HEADERS)?;
        let rank = c.number()?;
        let user_name = c.text()?;
        let wins = c.number()?;
        let losses = c.number()?;
        let points = c.number()?;
        let user_id = c.optional().unwrap_or_else(|| user_name.clone());
        Ok(Self {
            user_id,
            user_name,
            wins,
            losses,
            points,
            rank,
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.rank.to_string(),
            self.user_name.clone(),
            self.wins.to_string(),
            self.losses.to_string(),
            self.points.to_string(),
            self.user_id.clone(),
        ]
    }
}

impl SheetRow for ResultLogEntry {
    const RANGE: &'static str = "Results";
    const HEADERS: &'static [&'static str] = &[
        "Matchup ID",
        "Winner",
        "Correct",
        "Incorrect",
        "Total",
        "Recorded At",
    ];

    fn from_row(cells: &[String]) -> Result<Self, RowError> {
        let mut c = Cells::new(cells, Self::HEADERS)?;
        let matchup_id = c.number()?;
        let winner = c.text()?;
        let correct = c.number()?;
        let incorrect = c.number()?;
        let total = c.number()?;
        let recorded_at = c.timestamp()?.ok_or(RowError::Missing {
            column: "Recorded At",
        })?;
        Ok(Self {
            matchup_id,
            winner,
            correct,
            incorrect,
            total,
            recorded_at,
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.matchup_id.to_string(),
            self.winner.clone(),
            self.correct.to_string(),
            self.incorrect.to_string(),
            self.total.to_string(),
            self.recorded_at.to_rfc3339(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Bootstrap ranges
// ---------------------------------------------------------------------------

/// A league as listed in the bootstrap `Leagues` range.
#[derive(Debug, Clone, PartialEq)]
pub struct LeagueRow {
    pub id: String,
    pub name: String,
    pub code: String,
    pub admin_email: String,
    pub active: bool,
    pub paid: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&League> for LeagueRow {
    fn from(l: &League) -> Self {
        Self {
            id: l.id.clone(),
            name: l.name.clone(),
            code: l.code.clone(),
            admin_email: l.admin_email.clone(),
            active: l.active,
            paid: l.paid,
            created_at: Some(l.created_at),
        }
    }
}

impl SheetRow for LeagueRow {
    const RANGE: &'static str = "Leagues";
    const HEADERS: &'static [&'static str] = &[
        "League ID",
        "Name",
        "Code",
        "Admin Email",
        "Active",
        "Paid",
        "Created At",
    ];

    fn from_row(cells: &[String]) -> Result<Self, RowError> {
        let mut c = Cells::new(cells, Self::HEADERS)?;
        Ok(Self {
            id: c.text()?,
            name: c.text()?,
            code: c.text()?,
            admin_email: c.text()?,
            active: c.flag()?,
            paid: c.flag()?,
            created_at: c.timestamp()?,
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.code.clone(),
            self.admin_email.clone(),
            flag_cell(self.active),
            flag_cell(self.paid),
            self.created_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ]
    }
}

impl SheetRow for LegacyRole {
    const RANGE: &'static str = "UserRoles";
    const HEADERS: &'static [&'static str] = &["Email", "League ID", "Role"];

    fn from_row(cells: &[String]) -> Result<Self, RowError> {
        let mut c = Cells::new(cells, Self::HEADERS)?;
        Ok(Self {
            email: c.text()?,
            league_id: c.text()?,
            role: c.role()?,
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.email.clone(),
            self.league_id.clone(),
            self.role.to_string(),
        ]
    }
}
