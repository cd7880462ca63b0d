// ChatSleuth - app/mod.rs
//
// Application layer: orchestration of the tail pipeline.
// Dependencies: core layer, platform traits.
// Must NOT depend on: ui.

pub mod bus;
pub mod monitor;
pub mod notifier;
pub mod tail;
