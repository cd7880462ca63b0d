// ChatSleuth - core/mod.rs
//
// Core business logic layer.
// Dependencies: standard library, serde, tracing.
// Must NOT depend on: ui, platform, app, or any file I/O.

pub mod filter;
pub mod history;
pub mod model;
pub mod parser;
pub mod sequence;
