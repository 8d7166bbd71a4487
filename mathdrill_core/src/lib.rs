#![forbid(unsafe_code)]

//! Core domain model and business logic for mathdrill.
//!
//! This crate provides:
//! - Domain types (calculations, drill configuration, profiles, medals)
//! - Calculation generation and question ordering
//! - The session state machine
//! - Achievement evaluation
//! - Profile persistence over a key-value store
//! - Navigation snapshots and the rainbow countdown

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod generator;
pub mod sequencing;
pub mod session;
pub mod achievements;
pub mod storage;
pub mod profile;
pub mod navigation;
pub mod countdown;
pub mod choices;
pub mod app;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use generator::{generate, generate_for};
pub use session::{Feedback, FeedbackSink, Session, SessionAction};
pub use achievements::{AchievementPolicy, RainbowRule};
pub use storage::{FallbackStore, FileStore, KeyValueStore, MemoryStore};
pub use profile::ProfileStore;
pub use navigation::NavState;
pub use app::App;
