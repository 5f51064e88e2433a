//! Error classification and retry cadence for sync cycles.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::RemoteError;

/// Cadence with zero or one consecutive failure
pub const BASE_INTERVAL: Duration = Duration::from_secs(15);
/// Cadence after two consecutive failures
pub const ELEVATED_INTERVAL: Duration = Duration::from_secs(30);
/// Cap for every later failure
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Whole-word phrases that only ever describe rejected credentials
const AUTH_PHRASES: &[&str] = &[
    "jwt",
    "unauthorized",
    "unauthorised",
    "not authenticated",
    "authentication required",
    "authentication failed",
    "invalid token",
    "token expired",
    "expired token",
    "invalid api key",
];

const NETWORK_KEYWORDS: &[&str] = &[
    "failed to fetch",
    "networkerror",
    "network",
    "connection",
    "timed out",
    "timeout",
    "offline",
    "dns",
];

/// How a failed sync step should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncErrorKind {
    /// Credentials rejected; halt until the user signs in again
    Auth,
    /// No connectivity; retry on the next cycle
    Network,
    /// Remote rejected the payload shape
    Validation,
    Unknown,
}

impl SyncErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn contains_any(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| message.contains(keyword))
}

/// Match phrases on word boundaries so "author" or "OAuth" never count
fn contains_phrase(message: &str, phrases: &[&str]) -> bool {
    let words: Vec<&str> = message
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    phrases.iter().any(|phrase| {
        let parts: Vec<&str> = phrase.split(' ').collect();
        words.windows(parts.len()).any(|window| window == parts.as_slice())
    })
}

/// Classify a remote failure; `None` is `Unknown`
pub fn classify(error: Option<&RemoteError>) -> SyncErrorKind {
    let Some(error) = error else {
        return SyncErrorKind::Unknown;
    };

    if matches!(error.status, Some(401 | 403)) {
        return SyncErrorKind::Auth;
    }

    let message = error.message.to_ascii_lowercase();
    if contains_phrase(&message, AUTH_PHRASES) {
        return SyncErrorKind::Auth;
    }

    match error.status {
        None if contains_any(&message, NETWORK_KEYWORDS) => SyncErrorKind::Network,
        Some(400..=499) => SyncErrorKind::Validation,
        _ => SyncErrorKind::Unknown,
    }
}

/// Classify any error raised during a cycle; local failures are `Unknown`
pub fn classify_error(error: &Error) -> SyncErrorKind {
    match error {
        Error::Remote(remote) => classify(Some(remote)),
        _ => classify(None),
    }
}

/// Delay before the next scheduled cycle
pub const fn backoff_interval(consecutive_errors: u32) -> Duration {
    match consecutive_errors {
        0 | 1 => BASE_INTERVAL,
        2 => ELEVATED_INTERVAL,
        _ => MAX_INTERVAL,
    }
}
