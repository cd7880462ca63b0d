// ChatSleuth - ui/mod.rs
//
// UI layer: presentation only.
// Dependencies: core (read-only models).
// Must NOT depend on: platform, direct I/O.

pub mod console;
