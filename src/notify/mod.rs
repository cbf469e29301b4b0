//! Presentation of scan progress and results.
//!
//! This module handles:
//! - Colored console rendering of reports and failures
//! - A progress bar driven by orchestrator state transitions

pub mod console;

pub use console::ConsoleOutput;
