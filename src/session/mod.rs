//! Orchestration: configuration, per-call options, and the [`composer::Composer`] itself.

/// Worker-backed orchestrator.
pub mod composer;
/// Engine-wide defaults loaded from JSON.
pub mod config;
pub(crate) mod elision;
/// Per-call options and callbacks.
pub mod options;
