//! Player model

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::SyncStatus;

/// Progress and economy state.
///
/// The sync engine never interprets these fields; game rules compute new
/// values and the whole struct travels to the remote backend as one blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlayerProgress {
    pub currency: i64,
    pub experience: i64,
    pub unlocked_items: BTreeSet<String>,
    pub claimed_rewards: BTreeSet<String>,
    /// Last time idle earnings were collected (Unix ms)
    pub idle_collected_at: Option<i64>,
}

/// Local record of the last sync attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyncTelemetry {
    pub last_sync_at: Option<i64>,
    pub last_sync_ok_at: Option<i64>,
    pub last_sync_error_at: Option<i64>,
    pub last_sync_error_message: Option<String>,
}

/// The singleton player record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub progress: PlayerProgress,
    /// Last local or merged change (Unix ms), the conflict signal
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub telemetry: SyncTelemetry,
}

impl Default for Player {
    /// Fresh defaults used whenever the row does not exist yet.
    ///
    /// `updated_at` is zero so any remote copy wins on first pull.
    fn default() -> Self {
        Self {
            progress: PlayerProgress::default(),
            updated_at: 0,
            sync_status: SyncStatus::Synced,
            telemetry: SyncTelemetry::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_default_loses_to_any_remote() {
        let player = Player::default();
        assert_eq!(player.updated_at, 0);
        assert_eq!(player.progress.currency, 0);
        assert!(player.telemetry.last_sync_at.is_none());
    }

    #[test]
    fn test_progress_tolerates_missing_fields() {
        let progress: PlayerProgress = serde_json::from_str(r#"{"currency": 12}"#).unwrap();
        assert_eq!(progress.currency, 12);
        assert!(progress.unlocked_items.is_empty());
    }
}
