// Audio devices module - physical path abstraction
//
// This module provides the device layer the operations drive:
// - types: path identities, run state, endpoint flags, device descriptors
// - device: the AudioDevice contract and the concrete path devices
// - factory: profile -> device creation with observer notification

pub mod device;
pub mod factory;
pub mod types;

pub use device::{
    AudioDevice, BluetoothA2dpDevice, BluetoothHfpDevice, BluetoothHspDevice, CellularDevice,
    CodecDevice,
};
pub use factory::{AudioDeviceFactory, DeviceObserver};
pub use types::{device_ret, AudioDeviceInfo, DeviceError, DeviceResult, DeviceType, RunState};
