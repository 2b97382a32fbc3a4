// Core device types and enums for the audio path abstraction
//
// This module contains the fundamental data structures shared by the
// concrete audio path devices: path identity, run state, the binary
// success/failure contract of the hardware boundary, endpoint flag bits
// and the serializable device descriptor handed to the factory observer.

use serde::{Deserialize, Serialize};

use crate::audio::types::RetCode;

/// Identity of one physical audio path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Audiocodec,
    Cellular,
    BluetoothA2dp,
    BluetoothHsp,
    BluetoothHfp,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeviceType::Audiocodec => "Audiocodec",
            DeviceType::Cellular => "Cellular",
            DeviceType::BluetoothA2dp => "BluetoothA2DP",
            DeviceType::BluetoothHsp => "BluetoothHSP",
            DeviceType::BluetoothHfp => "BluetoothHFP",
        };
        f.write_str(name)
    }
}

/// Binary failure reported by the hardware boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("audio device failure")]
pub struct DeviceError;

/// Outcome of a device control call; the hardware boundary only reports
/// success or failure
pub type DeviceResult = Result<(), DeviceError>;

/// Translate a device outcome into the public result-code taxonomy
pub fn device_ret(result: DeviceResult) -> RetCode {
    match result {
        Ok(()) => RetCode::Success,
        Err(DeviceError) => RetCode::DeviceFailure,
    }
}

/// Run state of a device's streaming side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

/// Endpoint direction/channel flag bits carried by a profile
pub mod io_flags {
    pub const OUTPUT_MONO: u32 = 1 << 0;
    pub const OUTPUT_STEREO: u32 = 1 << 1;
    pub const INPUT_LEFT: u32 = 1 << 2;
    pub const INPUT_RIGHT: u32 = 1 << 3;
    pub const INPUT_STEREO: u32 = 1 << 4;

    pub const INPUT_ANY: u32 = INPUT_LEFT | INPUT_RIGHT | INPUT_STEREO;
    pub const OUTPUT_ANY: u32 = OUTPUT_MONO | OUTPUT_STEREO;
}

/// Audio device information handed to the factory observer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDeviceInfo {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub is_input: bool,
    pub is_output: bool,
    pub supported_sample_rates: Vec<u32>,
    pub supported_channels: Vec<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_ret_translation() {
        assert_eq!(device_ret(Ok(())), RetCode::Success);
        assert_eq!(device_ret(Err(DeviceError)), RetCode::DeviceFailure);
    }
}
