// LogWatch - lib.rs
//
// Library entry point. The `logwatch` binary in `main.rs` is a thin driver
// over these modules; everything is public for integration testing and for
// embedding the watcher in other front ends.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
