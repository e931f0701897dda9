//! Shared types for the Scout point-of-sale sync pipeline.
//!
//! Source records as read from the transactional system, the canonical
//! bronze transaction, checkpoint and run-log state, the structured
//! connector error model, and the reader/sink contracts.

#![warn(clippy::pedantic)]

pub mod connector;
pub mod error;
pub mod record;
pub mod state;
pub mod transaction;
