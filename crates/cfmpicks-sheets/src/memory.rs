// In-process spreadsheet store standing in for the HTTP client in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{SheetsApi, SheetsError};

type Key = (String, String);

#[derive(Debug, Default)]
pub struct MemorySheets {
    ranges: Mutex<HashMap<Key, Vec<Vec<String>>>>,
    failing: AtomicBool,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `SheetsError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Current contents of a range (empty when never written).
    pub fn rows(&self, spreadsheet_id: &str, range: &str) -> Vec<Vec<String>> {
        self.lock()
            .get(&(spreadsheet_id.to_string(), range.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Overwrite a range directly, bypassing the failure switch.
    pub fn seed(&self, spreadsheet_id: &str, range: &str, rows: Vec<Vec<String>>) {
        self.lock()
            .insert((spreadsheet_id.to_string(), range.to_string()), rows);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Key, Vec<Vec<String>>>> {
        self.ranges.lock().expect("sheet store mutex poisoned")
    }

    fn check(&self, spreadsheet_id: &str) -> Result<(), SheetsError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SheetsError::Unavailable {
                spreadsheet_id: spreadsheet_id.to_string(),
                message: "memory sheets switched to failing".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SheetsApi for MemorySheets {
    async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError> {
        self.check(spreadsheet_id)?;
        Ok(self.rows(spreadsheet_id, range))
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetsError> {
        self.check(spreadsheet_id)?;
        self.lock()
            .entry((spreadsheet_id.to_string(), range.to_string()))
            .or_default()
            .extend(rows);
        Ok(())
    }

    async fn replace_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetsError> {
        self.check(spreadsheet_id)?;
        self.seed(spreadsheet_id, range, rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn append_then_replace() {
        let sheets = MemorySheets::new();
        sheets
            .append_rows("s", "Bets", vec![cells(&["a"])])
            .await
            .unwrap();
        sheets
            .append_rows("s", "Bets", vec![cells(&["b"])])
            .await
            .unwrap();
        assert_eq!(sheets.rows("s", "Bets").len(), 2);

        sheets
            .replace_range("s", "Bets", vec![cells(&["c"])])
            .await
            .unwrap();
        assert_eq!(sheets.read_range("s", "Bets").await.unwrap(), vec![cells(&["c"])]);
        assert!(sheets.rows("other", "Bets").is_empty());
    }

    #[tokio::test]
    async fn failing_switch() {
        let sheets = MemorySheets::new();
        sheets.set_failing(true);
        assert!(sheets.read_range("s", "Bets").await.is_err());
        sheets.set_failing(false);
        assert!(sheets.read_range("s", "Bets").await.is_ok());
    }
}
