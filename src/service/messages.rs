// Inbound and outbound message contracts
//
// These are the payloads the owning service exchanges with the rest of the
// OS over its message bus. The bus itself is out of scope here; the types
// define the wire contract and serialize with a tag/data envelope.

use serde::{Deserialize, Serialize};

use crate::audio::devices::{AudioDeviceInfo, DeviceType};
use crate::audio::events::Event;
use crate::audio::profile;
use crate::audio::types::{Gain, PlaybackType, RetCode, Setting, Token, Volume};

/// Requests from the GUI/system layers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AudioRequest {
    StartPlayback {
        file_name: String,
        playback_type: PlaybackType,
    },
    StartRecorder {
        file_name: String,
    },
    StartRouting,
    /// Stop one session by token, a set of playback types, or everything
    /// when both fields are empty
    Stop {
        token: Option<Token>,
        #[serde(default)]
        playback_types: Vec<PlaybackType>,
    },
    Pause {
        token: Token,
    },
    Resume {
        token: Token,
    },
    SetVolume {
        playback_type: PlaybackType,
        value: Volume,
    },
    SetGain {
        value: Gain,
    },
    /// Volume key pressed; adjusts the active context by the given step
    KeyPressed {
        step: i32,
    },
    SendEvent {
        event: Event,
    },
    GetSetting {
        setting: Setting,
        playback_type: PlaybackType,
        profile_type: profile::Type,
    },
    SetSetting {
        setting: Setting,
        playback_type: PlaybackType,
        profile_type: profile::Type,
        value: String,
    },
}

/// Responses paired with the requests above
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AudioResponse {
    /// Start requests answer with a fresh token on success and a bad token
    /// on failure
    Start {
        ret_code: RetCode,
        token: Token,
    },
    /// Stop requests report every session that was actually stopped
    Stop {
        ret_code: RetCode,
        tokens: Vec<Token>,
    },
    Result {
        ret_code: RetCode,
    },
    Setting {
        ret_code: RetCode,
        value: Option<String>,
    },
}

/// Fire-and-forget notifications to the rest of the OS, asynchronous
/// relative to the API call that triggered them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServiceNotification {
    EndOfFile { token: Token },
    FileDeleted { token: Token },
    FileSystemNoSpace { token: Token },
    Stopped { token: Token },
    DeviceCreated {
        info: AudioDeviceInfo,
        device_type: DeviceType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_round_trip() {
        let request = AudioRequest::StartPlayback {
            file_name: "/music/track.mp3".to_string(),
            playback_type: PlaybackType::Multimedia,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"StartPlayback\""));

        let back: AudioRequest = serde_json::from_str(&json).unwrap();
        match back {
            AudioRequest::StartPlayback {
                file_name,
                playback_type,
            } => {
                assert_eq!(file_name, "/music/track.mp3");
                assert_eq!(playback_type, PlaybackType::Multimedia);
            }
            other => panic!("unexpected round trip: {:?}", other),
        }
    }

    #[test]
    fn test_stop_defaults_to_empty_type_list() {
        let json = r#"{"type":"Stop","data":{"token":null}}"#;
        let request: AudioRequest = serde_json::from_str(json).unwrap();
        match request {
            AudioRequest::Stop {
                token,
                playback_types,
            } => {
                assert!(token.is_none());
                assert!(playback_types.is_empty());
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }
}
