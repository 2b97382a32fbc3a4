// Settings storage for the audio subsystem
//
// Volume, gain and vibration settings are persisted per (profile, playback
// type) pair under slash-joined key paths. The core consumes a synchronous
// `SettingsStore`; the SQLite database behind it is loaded into memory at
// service start and written through on change.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::audio::profile;
use crate::audio::types::{db_path, PlaybackType, Setting};

/// Synchronous key-value settings collaborator consumed by the audio core
pub trait SettingsStore: Send + Sync {
    fn get(&self, path: &str) -> Option<String>;
    fn set(&self, path: &str, value: &str);
}

/// In-memory settings store; the core's default collaborator and the test
/// double
#[derive(Default)]
pub struct MemorySettings {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            entries: Mutex::new(entries.into_iter().collect()),
        }
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, path: &str) -> Option<String> {
        self.entries.lock().ok()?.get(path).cloned()
    }

    fn set(&self, path: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(path.to_string(), value.to_string());
        } else {
            warn!("Settings lock poisoned; dropping write to {}", path);
        }
    }
}

/// SQLite-based settings database
pub struct SettingsDatabase {
    pool: SqlitePool,
}

impl SettingsDatabase {
    /// Open (creating if needed) the settings database
    pub async fn new(database_path: &Path) -> Result<Self> {
        info!(
            "Initializing audio settings database at: {}",
            database_path.display()
        );

        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create settings database directory")?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .context("Failed to connect to settings database")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS audio_settings (
                path TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .context("Failed to create audio_settings table")?;

        Ok(Self { pool })
    }

    pub async fn get(&self, path: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM audio_settings WHERE path = ?1",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .context("Settings read failed")?;
        Ok(value)
    }

    pub async fn set(&self, path: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO audio_settings (path, value) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET value = excluded.value",
        )
        .bind(path)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("Settings write failed")?;
        Ok(())
    }

    /// Insert every factory default that is not already present
    pub async fn seed_defaults(&self) -> Result<()> {
        for (path, value) in default_audio_settings() {
            sqlx::query(
                "INSERT OR IGNORE INTO audio_settings (path, value) VALUES (?1, ?2)",
            )
            .bind(&path)
            .bind(&value)
            .execute(&self.pool)
            .await
            .context("Settings seed failed")?;
        }
        Ok(())
    }

    /// Snapshot of every persisted setting, used to build the in-memory
    /// store the core reads from
    pub async fn load_all(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT path, value FROM audio_settings",
        )
        .fetch_all(&self.pool)
        .await
        .context("Settings snapshot failed")?;
        Ok(rows.into_iter().collect())
    }
}

/// Factory defaults for every setting the operations consult
pub fn default_audio_settings() -> Vec<(String, String)> {
    const PLAYBACK_PROFILES: [profile::Type; 3] = [
        profile::Type::PlaybackLoudspeaker,
        profile::Type::PlaybackHeadphones,
        profile::Type::PlaybackBluetoothA2DP,
    ];
    const PLAYBACK_TYPES: [PlaybackType; 7] = [
        PlaybackType::Multimedia,
        PlaybackType::Notifications,
        PlaybackType::KeypadSound,
        PlaybackType::CallRingtone,
        PlaybackType::TextMessageRingtone,
        PlaybackType::Meditation,
        PlaybackType::Alarm,
    ];
    const RECORDING_PROFILES: [profile::Type; 3] = [
        profile::Type::RecordingBuiltInMic,
        profile::Type::RecordingHeadphones,
        profile::Type::RecordingBluetoothHSP,
    ];
    const ROUTING_PROFILES: [profile::Type; 5] = [
        profile::Type::RoutingEarspeaker,
        profile::Type::RoutingLoudspeaker,
        profile::Type::RoutingHeadphones,
        profile::Type::RoutingBluetoothHSP,
        profile::Type::RoutingBluetoothHFP,
    ];

    let mut defaults = Vec::new();

    for profile_type in PLAYBACK_PROFILES {
        for playback in PLAYBACK_TYPES {
            defaults.push((
                db_path(Setting::Volume, playback, profile_type),
                format!("{}", profile::Profile::default_volume(profile_type)),
            ));
        }
    }

    for profile_type in RECORDING_PROFILES {
        defaults.push((
            db_path(Setting::Gain, PlaybackType::None, profile_type),
            format!("{}", profile::Profile::default_gain(profile_type)),
        ));
    }

    for profile_type in ROUTING_PROFILES {
        defaults.push((
            db_path(Setting::Volume, PlaybackType::None, profile_type),
            format!("{}", profile::Profile::default_volume(profile_type)),
        ));
        defaults.push((
            db_path(Setting::Gain, PlaybackType::None, profile_type),
            format!("{}", profile::Profile::default_gain(profile_type)),
        ));
    }

    // Vibration accompanies attention sounds by default, not media.
    for playback in PLAYBACK_TYPES {
        let vibrate = matches!(
            playback,
            PlaybackType::CallRingtone
                | PlaybackType::TextMessageRingtone
                | PlaybackType::Notifications
        );
        defaults.push((
            db_path(Setting::EnableVibration, playback, profile::Type::Idle),
            if vibrate { "1" } else { "0" }.to_string(),
        ));
    }

    defaults
}
