//! Domain core for the ManimGen client.
//!
//! Holds the job identity types, the scene-plan view model builder and
//! the user-facing event log. Nothing in this crate performs I/O; the
//! HTTP plumbing and polling live in `manimgen-client`.

pub mod error;
pub mod event_log;
pub mod job;
pub mod plan;
pub mod types;
