// Library root for the league domain: types, league codes, leaderboard
// aggregation, configuration and the primary SQLite store.

pub mod config;
pub mod db;
pub mod leaderboard;
pub mod league_code;
pub mod mirror;
pub mod model;
pub mod store;
