// Operation state machines
//
// Exactly one operation governs an `Audio` instance at any time. The four
// variants are a sum type dispatched by match; switching type swaps the
// whole variant, never mutates one in place. Construction of the non-idle
// variants can fail; that failure is consumed once, at the `Audio::start`
// boundary, which falls back to the always-valid idle variant.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::db::SettingsStore;

use super::devices::AudioDeviceFactory;
use super::events::Event;
use super::profile::{self, Profile};
use super::types::{
    db_path, AudioInitError, Gain, PlaybackType, RetCode, Setting, Token, Volume,
};

pub mod idle;
pub mod playback;
pub mod recorder;
pub mod router;

pub use idle::IdleOperation;
pub use playback::PlaybackOperation;
pub use recorder::RecorderOperation;
pub use router::RouterOperation;

/// Operation variant identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Idle,
    Playback,
    Recorder,
    Router,
}

/// Lifecycle state of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Idle,
    Active,
    Paused,
}

/// Operation state cell shared with the codec workers, which flip it to
/// `Idle` on end-of-file and file-system-full conditions
#[derive(Debug, Clone)]
pub struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub fn new(state: State) -> Self {
        Self(Arc::new(AtomicU8::new(Self::encode(state))))
    }

    pub fn get(&self) -> State {
        match self.0.load(Ordering::Acquire) {
            1 => State::Active,
            2 => State::Paused,
            _ => State::Idle,
        }
    }

    pub fn set(&self, state: State) {
        self.0.store(Self::encode(state), Ordering::Release);
    }

    fn encode(state: State) -> u8 {
        match state {
            State::Idle => 0,
            State::Active => 1,
            State::Paused => 2,
        }
    }
}

/// Outbound fire-and-forget notifications raised by operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioNotification {
    EndOfFile { token: Token },
    FileDeleted { token: Token },
    FileSystemNoSpace { token: Token },
}

/// Channel end operations push notifications into
pub type NotificationSender = UnboundedSender<AudioNotification>;

/// Collaborators every concrete operation needs
#[derive(Clone)]
pub struct OperationDeps {
    pub factory: Arc<AudioDeviceFactory>,
    pub settings: Arc<dyn SettingsStore>,
    pub notifications: NotificationSender,
}

/// A profile with its current hardware availability. The list order inside
/// an operation encodes static priority and never changes; only the
/// availability flags do.
#[derive(Debug, Clone)]
pub struct SupportedProfile {
    pub profile: Profile,
    pub available: bool,
}

/// Fetch a persisted f32 setting for a (profile, playback type) pair
fn fetch_setting(
    settings: &dyn SettingsStore,
    setting: Setting,
    playback: PlaybackType,
    profile_type: profile::Type,
) -> Option<f32> {
    let path = db_path(setting, playback, profile_type);
    if path.is_empty() {
        return None;
    }
    settings.get(&path)?.parse().ok()
}

/// Build a profile with its persisted volume/gain (falling back to the
/// profile defaults) and append it to the supported list
pub(crate) fn add_profile(
    supported: &mut Vec<SupportedProfile>,
    settings: &dyn SettingsStore,
    profile_type: profile::Type,
    playback: PlaybackType,
    available: bool,
) -> Result<(), AudioInitError> {
    let volume = fetch_setting(settings, Setting::Volume, playback, profile_type)
        .unwrap_or_else(|| Profile::default_volume(profile_type));
    let gain = fetch_setting(settings, Setting::Gain, playback, profile_type)
        .unwrap_or_else(|| Profile::default_gain(profile_type));

    let profile = Profile::create(profile_type, Some(volume), Some(gain))
        .map_err(AudioInitError::from)?;
    supported.push(SupportedProfile { profile, available });
    Ok(())
}

/// The one operation an `Audio` instance runs at a time
pub enum Operation {
    Idle(IdleOperation),
    Playback(PlaybackOperation),
    Recorder(RecorderOperation),
    Router(RouterOperation),
}

impl Operation {
    /// Construct the requested variant. `file_path` is required for
    /// playback and recording; `playback` only matters for playback.
    pub fn create(
        op_type: Type,
        file_path: Option<&Path>,
        playback: PlaybackType,
        token: Token,
        deps: OperationDeps,
    ) -> Result<Operation, AudioInitError> {
        match op_type {
            Type::Idle => Ok(Operation::Idle(IdleOperation::new())),
            Type::Playback => {
                let path = file_path.ok_or(AudioInitError {
                    code: RetCode::OperationCreateFailed,
                })?;
                PlaybackOperation::create(path, playback, token, deps).map(Operation::Playback)
            }
            Type::Recorder => {
                let path = file_path.ok_or(AudioInitError {
                    code: RetCode::OperationCreateFailed,
                })?;
                RecorderOperation::create(path, token, deps).map(Operation::Recorder)
            }
            Type::Router => RouterOperation::create(token, deps).map(Operation::Router),
        }
    }

    pub fn idle() -> Operation {
        Operation::Idle(IdleOperation::new())
    }

    pub fn op_type(&self) -> Type {
        match self {
            Operation::Idle(_) => Type::Idle,
            Operation::Playback(_) => Type::Playback,
            Operation::Recorder(_) => Type::Recorder,
            Operation::Router(_) => Type::Router,
        }
    }

    pub fn state(&self) -> State {
        match self {
            Operation::Idle(op) => op.state(),
            Operation::Playback(op) => op.state(),
            Operation::Recorder(op) => op.state(),
            Operation::Router(op) => op.state(),
        }
    }

    /// Playback purpose currently served; `None` for non-playback variants
    pub fn playback_type(&self) -> PlaybackType {
        match self {
            Operation::Playback(op) => op.playback_type(),
            _ => PlaybackType::None,
        }
    }

    pub fn token(&self) -> Token {
        match self {
            Operation::Idle(op) => op.token(),
            Operation::Playback(op) => op.token(),
            Operation::Recorder(op) => op.token(),
            Operation::Router(op) => op.token(),
        }
    }

    pub fn current_profile_type(&self) -> profile::Type {
        match self {
            Operation::Idle(_) => profile::Type::Idle,
            Operation::Playback(op) => op.current_profile_type(),
            Operation::Recorder(op) => op.current_profile_type(),
            Operation::Router(op) => op.current_profile_type(),
        }
    }

    pub fn start(&mut self) -> RetCode {
        match self {
            Operation::Idle(op) => op.start(),
            Operation::Playback(op) => op.start(),
            Operation::Recorder(op) => op.start(),
            Operation::Router(op) => op.start(),
        }
    }

    pub fn stop(&mut self) -> RetCode {
        match self {
            Operation::Idle(op) => op.stop(),
            Operation::Playback(op) => op.stop(),
            Operation::Recorder(op) => op.stop(),
            Operation::Router(op) => op.stop(),
        }
    }

    pub fn pause(&mut self) -> RetCode {
        match self {
            Operation::Idle(op) => op.pause(),
            Operation::Playback(op) => op.pause(),
            Operation::Recorder(op) => op.pause(),
            Operation::Router(op) => op.pause(),
        }
    }

    pub fn resume(&mut self) -> RetCode {
        match self {
            Operation::Idle(op) => op.resume(),
            Operation::Playback(op) => op.resume(),
            Operation::Recorder(op) => op.resume(),
            Operation::Router(op) => op.resume(),
        }
    }

    pub fn send_event(&mut self, event: &Event) -> RetCode {
        match self {
            Operation::Idle(op) => op.send_event(event),
            Operation::Playback(op) => op.send_event(event),
            Operation::Recorder(op) => op.send_event(event),
            Operation::Router(op) => op.send_event(event),
        }
    }

    /// Re-run priority selection over the supported profile list
    pub fn switch_to_priority_profile(&mut self) -> RetCode {
        match self {
            Operation::Idle(_) => RetCode::Success,
            Operation::Playback(op) => op.switch_to_priority_profile(),
            Operation::Recorder(op) => op.switch_to_priority_profile(),
            Operation::Router(op) => op.switch_to_priority_profile(),
        }
    }

    pub fn set_output_volume(&mut self, volume: Volume) -> RetCode {
        match self {
            Operation::Idle(op) => op.set_output_volume(volume),
            Operation::Playback(op) => op.set_output_volume(volume),
            Operation::Recorder(op) => op.set_output_volume(volume),
            Operation::Router(op) => op.set_output_volume(volume),
        }
    }

    pub fn set_input_gain(&mut self, gain: Gain) -> RetCode {
        match self {
            Operation::Idle(op) => op.set_input_gain(gain),
            Operation::Playback(op) => op.set_input_gain(gain),
            Operation::Recorder(op) => op.set_input_gain(gain),
            Operation::Router(op) => op.set_input_gain(gain),
        }
    }

    pub fn output_volume(&self) -> Volume {
        match self {
            Operation::Idle(_) => 0.0,
            Operation::Playback(op) => op.output_volume(),
            Operation::Recorder(op) => op.output_volume(),
            Operation::Router(op) => op.output_volume(),
        }
    }

    pub fn input_gain(&self) -> Gain {
        match self {
            Operation::Idle(_) => 0.0,
            Operation::Playback(op) => op.input_gain(),
            Operation::Recorder(op) => op.input_gain(),
            Operation::Router(op) => op.input_gain(),
        }
    }

    /// Stream position in seconds; 0 where the variant has no stream
    pub fn position_seconds(&self) -> f32 {
        match self {
            Operation::Idle(op) => op.position_seconds(),
            Operation::Playback(op) => op.position_seconds(),
            Operation::Recorder(op) => op.position_seconds(),
            Operation::Router(_) => 0.0,
        }
    }

    /// Seek to a relative stream position; only playback can seek
    pub fn set_position(&mut self, position: f32) -> RetCode {
        match self {
            Operation::Idle(_) => RetCode::Success,
            Operation::Playback(op) => op.set_position(position),
            Operation::Recorder(_) | Operation::Router(_) => RetCode::InvokedInIncorrectState,
        }
    }
}
