// Concrete audio path devices
//
// Each device is the in-subsystem face of one physical path: the codec DMA
// engine, the cellular radio voice channel or a Bluetooth link. The DMA/HAL
// detail lives below this boundary; up here a device validates formats,
// tracks its run state and applies volume/gain. Constructing or destroying
// a device may start/stop physical streaming, so callers serialize device
// replacement (stop old before start new).

use tracing::{debug, warn};

use crate::audio::types::{AudioFormat, Gain, Volume};

use super::types::{DeviceError, DeviceResult, DeviceType, RunState};

/// Contract every physical audio path satisfies
pub trait AudioDevice: Send {
    fn device_type(&self) -> DeviceType;
    fn run_state(&self) -> RunState;

    fn start(&mut self, format: AudioFormat) -> DeviceResult;
    fn stop(&mut self) -> DeviceResult;
    fn pause(&mut self) -> DeviceResult;
    fn resume(&mut self) -> DeviceResult;

    fn set_output_volume(&mut self, volume: Volume) -> DeviceResult;
    fn set_input_gain(&mut self, gain: Gain) -> DeviceResult;

    fn is_format_supported_by_source(&self, format: &AudioFormat) -> bool;
    fn is_format_supported_by_sink(&self, format: &AudioFormat) -> bool;

    // Endpoint hooks used by the stream-connection layer.
    fn enable_input(&mut self) -> DeviceResult {
        Ok(())
    }
    fn disable_input(&mut self) -> DeviceResult {
        Ok(())
    }
    fn enable_output(&mut self) -> DeviceResult {
        Ok(())
    }
    fn disable_output(&mut self) -> DeviceResult {
        Ok(())
    }
}

/// Capabilities of one path; channel count 0 means the direction is absent
#[derive(Debug, Clone, Copy)]
pub(crate) struct PathCaps {
    pub(crate) sample_rates: &'static [u32],
    pub(crate) input_channels: u32,
    pub(crate) output_channels: u32,
}

impl PathCaps {
    fn supports_rate(&self, rate: u32) -> bool {
        self.sample_rates.contains(&rate)
    }
}

const SUPPORTED_BIT_WIDTHS: [u32; 3] = [16, 24, 32];

/// Shared state machine behind every concrete path device
#[derive(Debug)]
struct PathCore {
    device_type: DeviceType,
    caps: PathCaps,
    state: RunState,
    format: Option<AudioFormat>,
}

impl PathCore {
    fn new(device_type: DeviceType, caps: PathCaps) -> Self {
        debug!("{} path device created", device_type);
        Self {
            device_type,
            caps,
            state: RunState::Stopped,
            format: None,
        }
    }

    fn format_in_caps(&self, format: &AudioFormat, channels_limit: u32) -> bool {
        channels_limit > 0
            && format.channels <= channels_limit
            && self.caps.supports_rate(format.sample_rate)
            && SUPPORTED_BIT_WIDTHS.contains(&format.bit_width)
    }

    fn source_supports(&self, format: &AudioFormat) -> bool {
        self.format_in_caps(format, self.caps.input_channels)
    }

    fn sink_supports(&self, format: &AudioFormat) -> bool {
        self.format_in_caps(format, self.caps.output_channels)
    }

    fn start(&mut self, format: AudioFormat) -> DeviceResult {
        if self.state == RunState::Running {
            warn!("{} start while already running", self.device_type);
            return Err(DeviceError);
        }
        if !self.source_supports(&format) && !self.sink_supports(&format) {
            warn!("{} rejected format {}", self.device_type, format);
            return Err(DeviceError);
        }
        self.format = Some(format);
        self.state = RunState::Running;
        debug!("{} started with {}", self.device_type, format);
        Ok(())
    }

    fn stop(&mut self) -> DeviceResult {
        self.state = RunState::Stopped;
        self.format = None;
        debug!("{} stopped", self.device_type);
        Ok(())
    }

    fn pause(&mut self) -> DeviceResult {
        if self.state != RunState::Running {
            return Err(DeviceError);
        }
        self.state = RunState::Paused;
        Ok(())
    }

    fn resume(&mut self) -> DeviceResult {
        if self.state != RunState::Paused {
            return Err(DeviceError);
        }
        self.state = RunState::Running;
        Ok(())
    }
}

macro_rules! path_device {
    ($name:ident, $device_type:expr, $caps:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug)]
        pub struct $name {
            core: PathCore,
            output_volume: Volume,
            input_gain: Gain,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    core: PathCore::new($device_type, $caps),
                    output_volume: 0.0,
                    input_gain: 0.0,
                }
            }

            pub(crate) fn caps() -> PathCaps {
                $caps
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AudioDevice for $name {
            fn device_type(&self) -> DeviceType {
                self.core.device_type
            }

            fn run_state(&self) -> RunState {
                self.core.state
            }

            fn start(&mut self, format: AudioFormat) -> DeviceResult {
                self.core.start(format)
            }

            fn stop(&mut self) -> DeviceResult {
                self.core.stop()
            }

            fn pause(&mut self) -> DeviceResult {
                self.core.pause()
            }

            fn resume(&mut self) -> DeviceResult {
                self.core.resume()
            }

            fn set_output_volume(&mut self, volume: Volume) -> DeviceResult {
                self.output_volume = volume;
                Ok(())
            }

            fn set_input_gain(&mut self, gain: Gain) -> DeviceResult {
                self.input_gain = gain;
                Ok(())
            }

            fn is_format_supported_by_source(&self, format: &AudioFormat) -> bool {
                self.core.source_supports(format)
            }

            fn is_format_supported_by_sink(&self, format: &AudioFormat) -> bool {
                self.core.sink_supports(format)
            }
        }
    };
}

path_device!(
    CodecDevice,
    DeviceType::Audiocodec,
    PathCaps {
        sample_rates: &[8_000, 16_000, 22_050, 44_100, 48_000, 96_000],
        input_channels: 2,
        output_channels: 2,
    },
    "On-board audio codec: loudspeaker, earspeaker, headphones and microphones"
);

path_device!(
    CellularDevice,
    DeviceType::Cellular,
    PathCaps {
        sample_rates: &[8_000, 16_000],
        input_channels: 1,
        output_channels: 1,
    },
    "Cellular radio voice channel (uplink and downlink)"
);

path_device!(
    BluetoothA2dpDevice,
    DeviceType::BluetoothA2dp,
    PathCaps {
        sample_rates: &[44_100, 48_000],
        input_channels: 0,
        output_channels: 2,
    },
    "Bluetooth A2DP media sink"
);

path_device!(
    BluetoothHspDevice,
    DeviceType::BluetoothHsp,
    PathCaps {
        sample_rates: &[8_000],
        input_channels: 1,
        output_channels: 1,
    },
    "Bluetooth HSP headset voice link"
);

path_device!(
    BluetoothHfpDevice,
    DeviceType::BluetoothHfp,
    PathCaps {
        sample_rates: &[8_000, 16_000],
        input_channels: 1,
        output_channels: 1,
    },
    "Bluetooth HFP hands-free voice link"
);

/// Supported sample rates for a path identity, used for device descriptors
pub(crate) fn supported_sample_rates(device_type: DeviceType) -> &'static [u32] {
    match device_type {
        DeviceType::Audiocodec => CodecDevice::caps().sample_rates,
        DeviceType::Cellular => CellularDevice::caps().sample_rates,
        DeviceType::BluetoothA2dp => BluetoothA2dpDevice::caps().sample_rates,
        DeviceType::BluetoothHsp => BluetoothHspDevice::caps().sample_rates,
        DeviceType::BluetoothHfp => BluetoothHfpDevice::caps().sample_rates,
    }
}

/// Channel capabilities (input, output) for a path identity
pub(crate) fn channel_caps(device_type: DeviceType) -> (u32, u32) {
    let caps = match device_type {
        DeviceType::Audiocodec => CodecDevice::caps(),
        DeviceType::Cellular => CellularDevice::caps(),
        DeviceType::BluetoothA2dp => BluetoothA2dpDevice::caps(),
        DeviceType::BluetoothHsp => BluetoothHspDevice::caps(),
        DeviceType::BluetoothHfp => BluetoothHfpDevice::caps(),
    };
    (caps.input_channels, caps.output_channels)
}
