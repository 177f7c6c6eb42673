pub mod app;
pub mod backup;
pub mod cli;
pub mod clock;
pub mod config;
pub mod due;
pub mod highlight;
pub mod model;
pub mod prefs;
pub mod registry;
pub mod reminders;
pub mod search;
pub mod stats;
pub mod storage;
pub mod ui;

#[cfg(test)]
mod test_support;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
