//! TUI debugger for the CP-1600 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register and flag view
//! - Memory hex view
//! - Step/run/breakpoint controls
//! - Disassembly from PC

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
