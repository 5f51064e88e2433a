//! questlog-core - Core library for Questlog
//!
//! Offline-first storage for tasks and player progress, an atomic outbox of
//! local mutations, and the sync engine that pushes the outbox and pulls
//! newer remote state.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rules;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use config::{StoreConfig, SyncConfig};
pub use error::{Error, Result};
pub use models::{Player, PlayerProgress, Task, TaskId, TaskStatus};
pub use rules::{Mutation, Rejection};
pub use services::LocalStore;
pub use state::SyncPhase;
pub use sync::{SyncCredentials, SyncOrchestrator, SyncOutcome, SyncScheduler, SyncSnapshot};
