//! Shared schemas for the authwatch alerting engine.
//!
//! Everything that crosses a crate boundary lives here: threshold rules,
//! the auth-event snapshot consumed each tick, and the alert record handed
//! to notification channels and the history sink.

pub mod id;
pub mod types;
