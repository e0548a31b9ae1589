// LogWatch - platform/mod.rs
//
// Platform abstraction layer: filesystem helpers, platform directories and
// config.toml loading.
// Dependencies: util, core::model (plain data types), directories, toml.
// Must NOT depend on: app.

pub mod config;
pub mod fs;
