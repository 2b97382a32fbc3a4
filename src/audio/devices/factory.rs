// Device factory and creation observer
//
// The factory turns a profile into the concrete device for its path and
// synchronously notifies a registered observer after every successful
// creation. The observer is how the owning service learns about new
// hardware handles, e.g. to forward a Bluetooth link to the stack.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use uuid::Uuid;

use crate::audio::profile::Profile;

use super::device::{
    channel_caps, supported_sample_rates, AudioDevice, BluetoothA2dpDevice, BluetoothHfpDevice,
    BluetoothHspDevice, CellularDevice, CodecDevice,
};
use super::types::{AudioDeviceInfo, DeviceType};

/// Receives a synchronous callback after every successful device creation
pub trait DeviceObserver: Send + Sync {
    fn on_device_created(&self, info: &AudioDeviceInfo, device_type: DeviceType);
}

/// Creates the concrete `AudioDevice` for a requested profile
#[derive(Default)]
pub struct AudioDeviceFactory {
    observer: Mutex<Option<Arc<dyn DeviceObserver>>>,
}

impl AudioDeviceFactory {
    pub fn new() -> Self {
        Self {
            observer: Mutex::new(None),
        }
    }

    pub fn set_observer(&self, observer: Arc<dyn DeviceObserver>) {
        if let Ok(mut slot) = self.observer.lock() {
            *slot = Some(observer);
        }
    }

    /// Create the device serving the given profile's path. Returns `None`
    /// when the path cannot be brought up; callers treat that as "profile
    /// unusable right now" and pick a different profile.
    pub fn create_device(&self, profile: &Profile) -> Option<Box<dyn AudioDevice>> {
        self.create_device_of_type(profile.device_type())
    }

    /// Create a device by path identity (the router needs the cellular path
    /// independently of its local profile)
    pub fn create_device_of_type(&self, device_type: DeviceType) -> Option<Box<dyn AudioDevice>> {
        let device: Box<dyn AudioDevice> = match device_type {
            DeviceType::Audiocodec => Box::new(CodecDevice::new()),
            DeviceType::Cellular => Box::new(CellularDevice::new()),
            DeviceType::BluetoothA2dp => Box::new(BluetoothA2dpDevice::new()),
            DeviceType::BluetoothHsp => Box::new(BluetoothHspDevice::new()),
            DeviceType::BluetoothHfp => Box::new(BluetoothHfpDevice::new()),
        };

        let info = device_info(device_type);
        info!("Created audio device {} ({})", info.name, info.id);
        self.notify_created(&info, device_type);
        Some(device)
    }

    fn notify_created(&self, info: &AudioDeviceInfo, device_type: DeviceType) {
        let observer = match self.observer.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => {
                warn!("Device observer lock poisoned; dropping creation notice");
                None
            }
        };
        if let Some(observer) = observer {
            observer.on_device_created(info, device_type);
        }
    }
}

fn device_info(device_type: DeviceType) -> AudioDeviceInfo {
    let (input_channels, output_channels) = channel_caps(device_type);
    let max_channels = input_channels.max(output_channels).max(1) as u16;

    AudioDeviceInfo {
        id: Uuid::new_v4().to_string(),
        name: device_type.to_string(),
        device_type,
        is_input: input_channels > 0,
        is_output: output_channels > 0,
        supported_sample_rates: supported_sample_rates(device_type).to_vec(),
        supported_channels: (1..=max_channels).collect(),
    }
}
