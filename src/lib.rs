// ChatSleuth - lib.rs
//
// Library entry point, exposing every module for integration testing and
// for embedding the monitor in another host.
//
// The CLI host lives in `main.rs` and is not part of the library surface.

pub mod app;
pub mod core;
pub mod platform;
pub mod ui;
pub mod util;
