// League spreadsheet setup and import.

use std::collections::HashMap;

use cfmpicks_core::model::{LeaderboardEntry, ResultLogEntry};
use thiserror::Error;
use tracing::info;

use crate::client::{SheetsApi, SheetsError};
use crate::rows::{decode_rows, header_row, BetRow, MatchupRow, RowError, SheetRow};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Sheets(#[from] SheetsError),
    #[error(transparent)]
    Row(#[from] RowError),
}

/// Write header rows into every per-league range that is still empty.
/// Ranges that already hold data are left untouched. Returns the ranges
/// that were initialized.
pub async fn initialize_sheet(
    api: &dyn SheetsApi,
    spreadsheet_id: &str,
) -> Result<Vec<&'static str>, SheetsError> {
    let ranges: [(&'static str, Vec<String>); 4] = [
        (MatchupRow::RANGE, header_row::<MatchupRow>()),
        (BetRow::RANGE, header_row::<BetRow>()),
        (ResultLogEntry::RANGE, header_row::<ResultLogEntry>()),
        (LeaderboardEntry::RANGE, header_row::<LeaderboardEntry>()),
    ];

    let mut initialized = Vec::new();
    for (range, headers) in ranges {
        let existing = api.read_range(spreadsheet_id, range).await?;
        if existing.iter().any(|row| row.iter().any(|c| !c.trim().is_empty())) {
            continue;
        }
        api.replace_range(spreadsheet_id, range, vec![headers]).await?;
        initialized.push(range);
    }
    info!(spreadsheet_id, ?initialized, "initialized league sheet");
    Ok(initialized)
}

/// Game data read back from a league spreadsheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetGameData {
    pub matchups: Vec<MatchupRow>,
    pub bets: Vec<BetRow>,
    /// Winner per sheet matchup id. The `Results` log wins over the
    /// `Winner` column, and later log rows win over earlier ones.
    pub winners: HashMap<i64, String>,
}

/// Read and decode the `Matchups`, `Bets` and `Results` ranges.
pub async fn import_game_data(
    api: &dyn SheetsApi,
    spreadsheet_id: &str,
) -> Result<SheetGameData, SetupError> {
    let matchups: Vec<MatchupRow> =
        decode_rows(&api.read_range(spreadsheet_id, MatchupRow::RANGE).await?)?;
    let bets: Vec<BetRow> = decode_rows(&api.read_range(spreadsheet_id, BetRow::RANGE).await?)?;
    let log: Vec<ResultLogEntry> =
        decode_rows(&api.read_range(spreadsheet_id, ResultLogEntry::RANGE).await?)?;

    let mut winners: HashMap<i64, String> = matchups
        .iter()
        .filter_map(|m| m.winner.clone().map(|w| (m.id, w)))
        .collect();
    for entry in log {
        winners.insert(entry.matchup_id, entry.winner);
    }

    info!(
        spreadsheet_id,
        matchups = matchups.len(),
        bets = bets.len(),
        results = winners.len(),
        "read league sheet"
    );
    Ok(SheetGameData {
        matchups,
        bets,
        winners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySheets;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn initialize_writes_headers_into_empty_ranges_only() {
        let sheets = MemorySheets::new();
        sheets.seed(
            "s1",
            "Bets",
            vec![header_row::<BetRow>(), row(&["ann", "1", "Bears"])],
        );

        let initialized = initialize_sheet(&sheets, "s1").await.unwrap();
        assert_eq!(initialized, vec!["Matchups", "Results", "Leaderboard"]);
        assert_eq!(sheets.rows("s1", "Matchups"), vec![header_row::<MatchupRow>()]);
        assert_eq!(sheets.rows("s1", "Bets").len(), 2);

        // Second run is a no-op.
        assert!(initialize_sheet(&sheets, "s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_merges_winner_column_and_results_log() {
        let sheets = MemorySheets::new();
        sheets.seed(
            "s1",
            "Matchups",
            vec![
                header_row::<MatchupRow>(),
                row(&["1", "1", "Bears", "Packers", "", "", "Bears"]),
                row(&["2", "1", "Lions", "Vikings"]),
                row(&["3", "2", "Jets", "Bills"]),
            ],
        );
        sheets.seed(
            "s1",
            "Bets",
            vec![
                header_row::<BetRow>(),
                row(&["ann", "1", "Bears"]),
                row(&["bo", "2", "Lions"]),
            ],
        );
        sheets.seed(
            "s1",
            "Results",
            vec![
                header_row::<ResultLogEntry>(),
                row(&["1", "Packers", "0", "1", "1", "2024-09-01T00:00:00Z"]),
                row(&["2", "Lions", "1", "0", "1", "2024-09-01T00:00:00Z"]),
            ],
        );

        let data = import_game_data(&sheets, "s1").await.unwrap();
        assert_eq!(data.matchups.len(), 3);
        assert_eq!(data.bets.len(), 2);
        assert_eq!(data.winners.len(), 2);
        assert_eq!(data.winners[&1], "Packers");
        assert_eq!(data.winners[&2], "Lions");
    }

    #[tokio::test]
    async fn import_reports_bad_rows() {
        let sheets = MemorySheets::new();
        sheets.seed("s1", "Matchups", vec![row(&["x", "1", "Bears", "Packers"])]);
        let err = import_game_data(&sheets, "s1").await.unwrap_err();
        assert!(matches!(err, SetupError::Row(RowError::AtRow { row: 1, .. })));
    }

    #[tokio::test]
    async fn import_of_empty_sheet_is_empty() {
        let sheets = MemorySheets::new();
        let data = import_game_data(&sheets, "s1").await.unwrap();
        assert_eq!(data, SheetGameData::default());
    }
}
