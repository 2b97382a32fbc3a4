// Core audio vocabulary shared across the subsystem
//
// This module contains the fundamental value types used throughout the audio
// system: result codes, session tokens, playback purposes with their priority
// ordering, persisted setting names and the settings key builder, and the PCM
// format descriptor negotiated with audio devices.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::profile;

/// Output volume, valid range 0.0 to 10.0
pub type Volume = f32;

/// Input gain, valid range 0.0 to 100.0
pub type Gain = f32;

pub const MIN_VOLUME: Volume = 0.0;
pub const MAX_VOLUME: Volume = 10.0;
pub const MIN_GAIN: Gain = 0.0;
pub const MAX_GAIN: Gain = 100.0;

/// Timeout for blocking cross-component audio requests (e.g. settings
/// fetches issued by the owning service). Collaborators enforce it; this
/// core only publishes the constant.
pub const AUDIO_OPERATION_TIMEOUT: Duration = Duration::from_millis(1000);

/// Clamp a requested output volume into the valid range
pub fn clamp_volume(volume: Volume) -> Volume {
    volume.clamp(MIN_VOLUME, MAX_VOLUME)
}

/// Clamp a requested input gain into the valid range
pub fn clamp_gain(gain: Gain) -> Gain {
    gain.clamp(MIN_GAIN, MAX_GAIN)
}

/// Result codes returned across the public audio API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetCode {
    Success,
    InvokedInIncorrectState,
    UnsupportedProfile,
    UnsupportedEvent,
    InvalidFormat,
    OperationCreateFailed,
    FileDoesntExist,
    FailedToAllocateMemory,
    OperationNotSet,
    ProfileNotSet,
    DeviceFailure,
    TokenNotFound,
    Ignored,
    Failed,
}

impl fmt::Display for RetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetCode::Success => "Success",
            RetCode::InvokedInIncorrectState => "InvokedInIncorrectState",
            RetCode::UnsupportedProfile => "UnsupportedProfile",
            RetCode::UnsupportedEvent => "UnsupportedEvent",
            RetCode::InvalidFormat => "InvalidFormat",
            RetCode::OperationCreateFailed => "OperationCreateFailed",
            RetCode::FileDoesntExist => "FileDoesntExist",
            RetCode::FailedToAllocateMemory => "FailedToAllocateMemory",
            RetCode::OperationNotSet => "OperationNotSet",
            RetCode::ProfileNotSet => "ProfileNotSet",
            RetCode::DeviceFailure => "DeviceFailure",
            RetCode::TokenNotFound => "TokenNotFound",
            RetCode::Ignored => "Ignored",
            RetCode::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Construction-time failure of an operation. Raised while building a
/// Playback/Recorder/Router variant and consumed exactly once at the
/// `Audio::start` boundary, which downgrades it to an Idle operation plus
/// the embedded code.
#[derive(Debug, Clone, thiserror::Error)]
#[error("operation init failed: {code}")]
pub struct AudioInitError {
    pub code: RetCode,
}

impl From<RetCode> for AudioInitError {
    fn from(code: RetCode) -> Self {
        Self { code }
    }
}

/// Session handle binding a caller to one `AudioMux` input.
///
/// Issued and incremented by the mux on every input reset. A token stays
/// valid only until the bound input is reset; stale tokens simply stop
/// matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token(i16);

impl Token {
    const UNINITIALIZED: i16 = -1;
    const BAD: i16 = -2;

    /// A token that has never been bound to an input
    pub fn uninitialized() -> Self {
        Token(Self::UNINITIALIZED)
    }

    /// An explicitly invalidated, unusable token
    pub fn bad() -> Self {
        Token(Self::BAD)
    }

    pub fn is_valid(&self) -> bool {
        self.0 > Self::UNINITIALIZED
    }

    pub fn is_uninitialized(&self) -> bool {
        self.0 == Self::UNINITIALIZED
    }

    pub fn is_bad(&self) -> bool {
        self.0 == Self::BAD
    }

    /// Next token in the issuing sequence; wraps to 0 after the maximum
    pub(crate) fn incremented(self) -> Token {
        if self.0 >= i16::MAX {
            Token(0)
        } else {
            Token(self.0.max(Self::UNINITIALIZED) + 1)
        }
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::uninitialized()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The purpose of a sound, independent of its physical routing.
///
/// Drives arbitration priority and per-type settings lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackType {
    None,
    Multimedia,
    Notifications,
    KeypadSound,
    CallRingtone,
    TextMessageRingtone,
    Meditation,
    Alarm,
}

impl PlaybackType {
    pub const COUNT: u8 = 8;

    /// Arbitration priority; lower number wins
    pub fn priority(self) -> u8 {
        match self {
            PlaybackType::Meditation => 1,
            PlaybackType::CallRingtone => 2,
            PlaybackType::Alarm => 3,
            PlaybackType::Multimedia => 4,
            PlaybackType::TextMessageRingtone => 5,
            PlaybackType::Notifications => 5,
            PlaybackType::KeypadSound => 6,
            PlaybackType::None => Self::COUNT,
        }
    }

    /// Whether overlapping sounds of this type combine into one active
    /// instance instead of spawning a second one
    pub fn is_mergeable(self) -> bool {
        matches!(
            self,
            PlaybackType::None
                | PlaybackType::Notifications
                | PlaybackType::KeypadSound
                | PlaybackType::TextMessageRingtone
        )
    }

    /// Settings path segment; `None` renders empty and is omitted
    pub fn db_str(self) -> &'static str {
        match self {
            PlaybackType::None => "",
            PlaybackType::Multimedia => "Multimedia",
            PlaybackType::Notifications => "Notifications",
            PlaybackType::KeypadSound => "KeypadSound",
            PlaybackType::CallRingtone => "CallRingtone",
            PlaybackType::TextMessageRingtone => "TextMessageRingtone",
            PlaybackType::Meditation => "Meditation",
            PlaybackType::Alarm => "Alarm",
        }
    }
}

/// Names of persisted audio settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Setting {
    Volume,
    Gain,
    EnableVibration,
    Sound,
}

impl Setting {
    pub fn db_str(self) -> &'static str {
        match self {
            Setting::Volume => "Volume",
            Setting::Gain => "Gain",
            Setting::EnableVibration => "EnableVibration",
            Setting::Sound => "Sound",
        }
    }
}

/// Build the settings key for a (setting, playback type, profile type)
/// triple: `"audio/<profile>/<playback>/<setting>"`, omitting segments whose
/// string form is empty. Idle profile together with the None playback type
/// yields an empty path (no such setting is persisted).
pub fn db_path(setting: Setting, playback: PlaybackType, profile: profile::Type) -> String {
    let profile_segment = profile.db_str();
    let playback_segment = playback.db_str();

    if profile_segment.is_empty() && playback_segment.is_empty() {
        return String::new();
    }

    let mut path = String::from("audio");
    for segment in [profile_segment, playback_segment, setting.db_str()] {
        if !segment.is_empty() {
            path.push('/');
            path.push_str(segment);
        }
    }
    path
}

/// PCM format negotiated between an operation and its audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub bit_width: u32,
    pub channels: u32,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, bit_width: u32, channels: u32) -> Self {
        Self {
            sample_rate,
            bit_width,
            channels,
        }
    }

    /// Bytes consumed by one frame (all channels)
    pub fn bytes_per_frame(&self) -> usize {
        (self.bit_width as usize / 8) * self.channels as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            bit_width: 16,
            channels: 2,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz/{} bit/{} ch",
            self.sample_rate, self.bit_width, self.channels
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lifecycle() {
        let token = Token::uninitialized();
        assert!(!token.is_valid());
        assert!(token.is_uninitialized());

        let issued = token.incremented();
        assert!(issued.is_valid());
        assert_eq!(issued, Token(0));
        assert_eq!(issued.incremented(), Token(1));

        assert!(Token::bad().is_bad());
        assert!(!Token::bad().is_valid());
    }

    #[test]
    fn test_token_wraps_after_max() {
        let max = Token(i16::MAX);
        assert_eq!(max.incremented(), Token(0));
    }

    #[test]
    fn test_priority_table() {
        assert_eq!(PlaybackType::Meditation.priority(), 1);
        assert_eq!(PlaybackType::CallRingtone.priority(), 2);
        assert_eq!(PlaybackType::Alarm.priority(), 3);
        assert_eq!(PlaybackType::Multimedia.priority(), 4);
        assert_eq!(PlaybackType::TextMessageRingtone.priority(), 5);
        assert_eq!(PlaybackType::Notifications.priority(), 5);
        assert_eq!(PlaybackType::KeypadSound.priority(), 6);
        assert_eq!(PlaybackType::None.priority(), PlaybackType::COUNT);
    }

    #[test]
    fn test_mergeable_table() {
        assert!(PlaybackType::None.is_mergeable());
        assert!(PlaybackType::Notifications.is_mergeable());
        assert!(PlaybackType::KeypadSound.is_mergeable());
        assert!(PlaybackType::TextMessageRingtone.is_mergeable());

        assert!(!PlaybackType::Meditation.is_mergeable());
        assert!(!PlaybackType::CallRingtone.is_mergeable());
        assert!(!PlaybackType::Alarm.is_mergeable());
        assert!(!PlaybackType::Multimedia.is_mergeable());
    }

    #[test]
    fn test_volume_and_gain_clamping() {
        assert_eq!(clamp_volume(-5.0), 0.0);
        assert_eq!(clamp_volume(50.0), 10.0);
        assert_eq!(clamp_volume(7.5), 7.5);

        assert_eq!(clamp_gain(-1.0), 0.0);
        assert_eq!(clamp_gain(150.0), 100.0);
        assert_eq!(clamp_gain(42.0), 42.0);
    }
}
