//! Host-side wiring for the authwatch engine: configuration, the
//! scheduled evaluation loop, and concrete snapshot/history adapters.

pub mod config;
pub mod engine;
pub mod history;
pub mod logging;
pub mod rule_seed;
pub mod snapshot;
