//! Opsboard library
//!
//! Task lifecycle and recurrence engine for an operations board, with a
//! SQLite-backed store. This module exports the core components for testing
//! and integration.

pub mod board;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod format;
pub mod logging;
pub mod reminders;
pub mod store;
pub mod types;
