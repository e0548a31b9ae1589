// LogWatch - core/mod.rs
//
// Core logic layer: data model, timestamp extraction, pattern matching and
// log-file classification heuristics.
// Dependencies: util, regex, chrono, serde.
// Must NOT depend on: platform, app, or perform any I/O.

pub mod classify;
pub mod model;
pub mod pattern;
pub mod timestamp;
