// LogWatch - app/mod.rs
//
// Application layer: background workers, the multi-file watcher with its tail
// state and change sources, the scanner, and state persistence.
// Dependencies: core, platform, util.

pub mod change_source;
pub mod scanner;
pub mod session;
pub mod tail;
pub mod watcher;
pub mod worker;
