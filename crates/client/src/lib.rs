//! HTTP client, job submission and dual polling for the ManimGen backend.
//!
//! Submits prompts, then tracks the two independently paced results of a
//! job (the scene plan and the rendered video) by fixed-interval polling,
//! feeding a single-owner [`session::TrackingSession`].

pub mod api;
pub mod config;
pub mod poller;
pub mod session;
pub mod submission;
