// Audio routing profiles
//
// A profile bundles everything one physical routing scenario needs: the
// device identity, the PCM format, endpoint flags and paths, equalizer
// preset and the live-tunable volume/gain. Profiles are built once through
// `Profile::create` and afterwards mutated only by the operation that owns
// them, e.g. when adapting the sample rate to a decoded file or rerouting
// a headset microphone.

use serde::{Deserialize, Serialize};

use super::devices::types::{io_flags, DeviceType};
use super::types::{AudioFormat, Gain, RetCode, Volume};

/// Physical routing scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Idle,
    PlaybackLoudspeaker,
    PlaybackHeadphones,
    PlaybackBluetoothA2DP,
    RecordingBuiltInMic,
    RecordingHeadphones,
    RecordingBluetoothHSP,
    RoutingEarspeaker,
    RoutingLoudspeaker,
    RoutingHeadphones,
    RoutingBluetoothHSP,
    RoutingBluetoothHFP,
}

impl Type {
    /// Settings path segment; `Idle` renders empty and is omitted
    pub fn db_str(self) -> &'static str {
        match self {
            Type::Idle => "",
            Type::PlaybackLoudspeaker => "PlaybackLoudspeaker",
            Type::PlaybackHeadphones => "PlaybackHeadphones",
            Type::PlaybackBluetoothA2DP => "PlaybackBluetoothA2DP",
            Type::RecordingBuiltInMic => "RecordingBuiltInMic",
            Type::RecordingHeadphones => "RecordingHeadphones",
            Type::RecordingBluetoothHSP => "RecordingBluetoothHSP",
            Type::RoutingEarspeaker => "RoutingEarspeaker",
            Type::RoutingLoudspeaker => "RoutingLoudspeaker",
            Type::RoutingHeadphones => "RoutingHeadphones",
            Type::RoutingBluetoothHSP => "RoutingBluetoothHSP",
            Type::RoutingBluetoothHFP => "RoutingBluetoothHFP",
        }
    }

    pub fn is_playback(self) -> bool {
        matches!(
            self,
            Type::PlaybackLoudspeaker | Type::PlaybackHeadphones | Type::PlaybackBluetoothA2DP
        )
    }

    pub fn is_recording(self) -> bool {
        matches!(
            self,
            Type::RecordingBuiltInMic | Type::RecordingHeadphones | Type::RecordingBluetoothHSP
        )
    }

    pub fn is_routing(self) -> bool {
        matches!(
            self,
            Type::RoutingEarspeaker
                | Type::RoutingLoudspeaker
                | Type::RoutingHeadphones
                | Type::RoutingBluetoothHSP
                | Type::RoutingBluetoothHFP
        )
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if *self == Type::Idle { "Idle" } else { self.db_str() })
    }
}

/// Source feeding a profile's input endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputPath {
    None,
    Microphone,
    HeadsetMicrophone,
    BluetoothMicrophone,
}

/// Sink fed by a profile's output endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputPath {
    None,
    Loudspeaker,
    Earspeaker,
    Headphones,
    BluetoothA2dp,
    BluetoothHeadset,
}

/// Equalizer preset applied on the codec for this routing scenario.
/// Gains in dB per band; the DSP math itself lives below the device boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqPreset {
    pub low_gain_db: f32,
    pub mid_gain_db: f32,
    pub high_gain_db: f32,
}

impl EqPreset {
    pub fn flat() -> Self {
        Self {
            low_gain_db: 0.0,
            mid_gain_db: 0.0,
            high_gain_db: 0.0,
        }
    }
}

/// One physical audio routing scenario, immutable once built except for the
/// live-tunable fields mutated by the owning operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    profile_type: Type,
    device_type: DeviceType,
    sample_rate: u32,
    bit_width: u32,
    io_flags: u32,
    input_path: InputPath,
    output_path: OutputPath,
    eq: EqPreset,
    output_volume: Volume,
    input_gain: Gain,
}

impl Profile {
    /// Build the profile for a routing scenario. Playback types require a
    /// volume, recording types a gain, routing types both; a missing
    /// required parameter fails with `Failed`.
    pub fn create(
        profile_type: Type,
        volume: Option<Volume>,
        gain: Option<Gain>,
    ) -> Result<Profile, RetCode> {
        if profile_type.is_playback() && volume.is_none() {
            return Err(RetCode::Failed);
        }
        if profile_type.is_recording() && gain.is_none() {
            return Err(RetCode::Failed);
        }
        if profile_type.is_routing() && (volume.is_none() || gain.is_none()) {
            return Err(RetCode::Failed);
        }

        let output_volume = volume.unwrap_or(0.0);
        let input_gain = gain.unwrap_or(0.0);

        let profile = match profile_type {
            Type::Idle => Self::with_layout(
                profile_type,
                DeviceType::Audiocodec,
                44_100,
                0,
                InputPath::None,
                OutputPath::None,
                EqPreset::flat(),
                output_volume,
                input_gain,
            ),
            Type::PlaybackLoudspeaker => Self::with_layout(
                profile_type,
                DeviceType::Audiocodec,
                44_100,
                io_flags::OUTPUT_STEREO,
                InputPath::None,
                OutputPath::Loudspeaker,
                EqPreset {
                    low_gain_db: 3.0,
                    mid_gain_db: 0.0,
                    high_gain_db: 1.5,
                },
                output_volume,
                input_gain,
            ),
            Type::PlaybackHeadphones => Self::with_layout(
                profile_type,
                DeviceType::Audiocodec,
                44_100,
                io_flags::OUTPUT_STEREO,
                InputPath::None,
                OutputPath::Headphones,
                EqPreset::flat(),
                output_volume,
                input_gain,
            ),
            Type::PlaybackBluetoothA2DP => Self::with_layout(
                profile_type,
                DeviceType::BluetoothA2dp,
                44_100,
                io_flags::OUTPUT_STEREO,
                InputPath::None,
                OutputPath::BluetoothA2dp,
                EqPreset::flat(),
                output_volume,
                input_gain,
            ),
            Type::RecordingBuiltInMic => Self::with_layout(
                profile_type,
                DeviceType::Audiocodec,
                44_100,
                io_flags::INPUT_LEFT,
                InputPath::Microphone,
                OutputPath::None,
                EqPreset::flat(),
                output_volume,
                input_gain,
            ),
            Type::RecordingHeadphones => Self::with_layout(
                profile_type,
                DeviceType::Audiocodec,
                44_100,
                io_flags::INPUT_LEFT,
                InputPath::HeadsetMicrophone,
                OutputPath::None,
                EqPreset::flat(),
                output_volume,
                input_gain,
            ),
            Type::RecordingBluetoothHSP => Self::with_layout(
                profile_type,
                DeviceType::BluetoothHsp,
                8_000,
                io_flags::INPUT_LEFT,
                InputPath::BluetoothMicrophone,
                OutputPath::None,
                EqPreset::flat(),
                output_volume,
                input_gain,
            ),
            Type::RoutingEarspeaker => Self::with_layout(
                profile_type,
                DeviceType::Audiocodec,
                16_000,
                io_flags::INPUT_LEFT | io_flags::OUTPUT_MONO,
                InputPath::Microphone,
                OutputPath::Earspeaker,
                EqPreset {
                    low_gain_db: 0.0,
                    mid_gain_db: 2.0,
                    high_gain_db: 0.0,
                },
                output_volume,
                input_gain,
            ),
            Type::RoutingLoudspeaker => Self::with_layout(
                profile_type,
                DeviceType::Audiocodec,
                16_000,
                io_flags::INPUT_LEFT | io_flags::OUTPUT_MONO,
                InputPath::Microphone,
                OutputPath::Loudspeaker,
                EqPreset {
                    low_gain_db: 3.0,
                    mid_gain_db: 0.0,
                    high_gain_db: 1.5,
                },
                output_volume,
                input_gain,
            ),
            Type::RoutingHeadphones => Self::with_layout(
                profile_type,
                DeviceType::Audiocodec,
                16_000,
                io_flags::INPUT_LEFT | io_flags::OUTPUT_MONO,
                InputPath::HeadsetMicrophone,
                OutputPath::Headphones,
                EqPreset::flat(),
                output_volume,
                input_gain,
            ),
            Type::RoutingBluetoothHSP => Self::with_layout(
                profile_type,
                DeviceType::BluetoothHsp,
                8_000,
                io_flags::INPUT_LEFT | io_flags::OUTPUT_MONO,
                InputPath::BluetoothMicrophone,
                OutputPath::BluetoothHeadset,
                EqPreset::flat(),
                output_volume,
                input_gain,
            ),
            Type::RoutingBluetoothHFP => Self::with_layout(
                profile_type,
                DeviceType::BluetoothHfp,
                16_000,
                io_flags::INPUT_LEFT | io_flags::OUTPUT_MONO,
                InputPath::BluetoothMicrophone,
                OutputPath::BluetoothHeadset,
                EqPreset::flat(),
                output_volume,
                input_gain,
            ),
        };

        Ok(profile)
    }

    #[allow(clippy::too_many_arguments)]
    fn with_layout(
        profile_type: Type,
        device_type: DeviceType,
        sample_rate: u32,
        io_flags: u32,
        input_path: InputPath,
        output_path: OutputPath,
        eq: EqPreset,
        output_volume: Volume,
        input_gain: Gain,
    ) -> Self {
        Self {
            profile_type,
            device_type,
            sample_rate,
            bit_width: 16,
            io_flags,
            input_path,
            output_path,
            eq,
            output_volume,
            input_gain,
        }
    }

    /// Default output volume applied when no persisted value exists yet
    pub fn default_volume(profile_type: Type) -> Volume {
        match profile_type {
            t if t.is_routing() => 10.0,
            _ => 5.0,
        }
    }

    /// Default input gain applied when no persisted value exists yet
    pub fn default_gain(profile_type: Type) -> Gain {
        match profile_type {
            Type::RoutingHeadphones => 50.0,
            t if t.is_routing() => 20.0,
            _ => 50.0,
        }
    }

    pub fn profile_type(&self) -> Type {
        self.profile_type
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn io_flags(&self) -> u32 {
        self.io_flags
    }

    pub fn input_path(&self) -> InputPath {
        self.input_path
    }

    pub fn output_path(&self) -> OutputPath {
        self.output_path
    }

    pub fn eq_preset(&self) -> EqPreset {
        self.eq
    }

    pub fn output_volume(&self) -> Volume {
        self.output_volume
    }

    pub fn input_gain(&self) -> Gain {
        self.input_gain
    }

    /// Channel count inferred from the endpoint flag bits
    pub fn channels(&self) -> u32 {
        if self.io_flags & (io_flags::INPUT_LEFT | io_flags::INPUT_RIGHT) != 0 {
            1
        } else if self.io_flags & io_flags::INPUT_STEREO != 0 {
            2
        } else if self.io_flags & io_flags::OUTPUT_STEREO != 0 {
            2
        } else {
            1
        }
    }

    /// PCM format this profile negotiates with its device
    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.bit_width, self.channels())
    }

    // Live-tunable fields, mutated in place by the owning operation only.

    pub fn set_output_volume(&mut self, volume: Volume) {
        self.output_volume = volume;
    }

    pub fn set_input_gain(&mut self, gain: Gain) {
        self.input_gain = gain;
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn set_io_flags(&mut self, flags: u32) {
        self.io_flags = flags;
    }

    pub fn set_input_path(&mut self, path: InputPath) {
        self.input_path = path;
    }

    pub fn set_output_path(&mut self, path: OutputPath) {
        self.output_path = path;
    }
}
