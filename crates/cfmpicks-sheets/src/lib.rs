pub mod client;
pub mod memory;
pub mod mirror;
pub mod rows;
pub mod setup;

pub use client::{SheetsApi, SheetsClient, SheetsError};
pub use mirror::{SheetMirror, SheetsLeagueFallback};
