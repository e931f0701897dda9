//! Checkpoint persistence for the Scout sync pipeline.
//!
//! Provides the [`CheckpointStore`] trait and a [`SqliteCheckpointStore`]
//! implementation for watermark tracking and run history.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod sqlite;

pub use backend::CheckpointStore;
pub use error::StateError;
pub use sqlite::SqliteCheckpointStore;
