//! Outbox push, newest-wins pull and the cycle driver around them.

pub mod classify;
mod http;
pub mod orchestrator;
mod pull;
mod push;
mod remote;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod testing;

pub use classify::{backoff_interval, classify, classify_error, SyncErrorKind};
pub use http::HttpRemoteBackend;
pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncSnapshot, SyncState};
pub use pull::{pull, PullReport};
pub use push::{push, PushReport};
pub use remote::{RemoteBackend, RemoteError, RemoteTask, SyncCredentials};
pub use scheduler::SyncScheduler;
