// Bounded, time-limited cache of generated matchup blurbs.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use cfmpicks_core::model::Matchup;

/// Cache key for a matchup: everything that goes into the prompt.
///
/// Two matchups with the same teams, week and records share a blurb; editing
/// a record changes the key.
pub fn fingerprint(m: &Matchup) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        m.week,
        m.home_team,
        m.away_team,
        m.home_record.as_deref().unwrap_or(""),
        m.away_record.as_deref().unwrap_or("")
    )
}

#[derive(Debug)]
struct Entry {
    blurb: String,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct BlurbCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<String, Entry>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
}

impl BlurbCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A fresh entry for `key`. Expired entries are dropped and reported as
    /// misses.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<String> {
        let expired = match self.entries.get(key) {
            None => return None,
            Some(e) => now.saturating_duration_since(e.stored_at) >= self.ttl,
        };
        if expired {
            self.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.blurb.clone())
    }

    /// Store `blurb`, evicting the oldest entry when full.
    pub fn insert(&mut self, key: String, blurb: String, now: Instant) {
        if self.entries.contains_key(&key) {
            self.remove(&key);
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            Entry {
                blurb,
                stored_at: now,
            },
        );
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> BlurbCache {
        BlurbCache::new(2, Duration::from_secs(60))
    }

    #[test]
    fn hit_then_expire() {
        let mut c = cache();
        let t0 = Instant::now();
        c.insert("k".into(), "blurb".into(), t0);
        assert_eq!(c.get("k", t0 + Duration::from_secs(59)).as_deref(), Some("blurb"));
        assert_eq!(c.get("k", t0 + Duration::from_secs(60)), None);
        assert!(c.is_empty());
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut c = cache();
        let t0 = Instant::now();
        c.insert("a".into(), "1".into(), t0);
        c.insert("b".into(), "2".into(), t0);
        // Re-inserting "a" makes "b" the oldest.
        c.insert("a".into(), "1b".into(), t0);
        c.insert("c".into(), "3".into(), t0);

        assert_eq!(c.len(), 2);
        assert_eq!(c.get("b", t0), None);
        assert_eq!(c.get("a", t0).as_deref(), Some("1b"));
        assert_eq!(c.get("c", t0).as_deref(), Some("3"));
    }

    #[test]
    fn fingerprint_covers_records() {
        let mut m = Matchup {
            id: 7,
            league_id: "l".into(),
            week: 4,
            home_team: "Bears".into(),
            away_team: "Lions".into(),
            home_record: Some("3-0".into()),
            away_record: None,
            winner: None,
        };
        assert_eq!(fingerprint(&m), "4|Bears|Lions|3-0|");
        let before = fingerprint(&m);
        m.away_record = Some("1-2".into());
        assert_ne!(fingerprint(&m), before);
    }
}
