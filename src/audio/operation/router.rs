// Router operation - call audio
//
// Runs a live call: one local path (earspeaker, loudspeaker, headset or a
// Bluetooth voice link) plus the cellular radio path, wired by an uplink
// (microphone to radio) and a downlink (radio to speaker) connection.
// Mute disables the uplink without destroying it. Forcing the loudspeaker
// makes the earspeaker and headset unselectable until it is released.

use tracing::{error, warn};

use crate::audio::devices::{device_ret, AudioDevice, DeviceType};
use crate::audio::events::{Event, EventType};
use crate::audio::profile::{self, InputPath};
use crate::audio::stream::StreamConnection;
use crate::audio::types::{AudioFormat, AudioInitError, Gain, PlaybackType, RetCode, Token, Volume};

use super::{add_profile, OperationDeps, SharedState, State, SupportedProfile};

pub struct RouterOperation {
    state: SharedState,
    token: Token,
    supported: Vec<SupportedProfile>,
    current: usize,
    device: Option<Box<dyn AudioDevice>>,
    cellular: Option<Box<dyn AudioDevice>>,
    uplink: Option<StreamConnection>,
    downlink: Option<StreamConnection>,
    muted: bool,
    loudspeaker_forced: bool,
    deps: OperationDeps,
}

impl RouterOperation {
    pub fn create(token: Token, deps: OperationDeps) -> Result<Self, AudioInitError> {
        let mut supported = Vec::new();
        add_profile(
            &mut supported,
            deps.settings.as_ref(),
            profile::Type::RoutingHeadphones,
            PlaybackType::None,
            false,
        )?;
        add_profile(
            &mut supported,
            deps.settings.as_ref(),
            profile::Type::RoutingBluetoothHFP,
            PlaybackType::None,
            false,
        )?;
        add_profile(
            &mut supported,
            deps.settings.as_ref(),
            profile::Type::RoutingBluetoothHSP,
            PlaybackType::None,
            false,
        )?;
        add_profile(
            &mut supported,
            deps.settings.as_ref(),
            profile::Type::RoutingEarspeaker,
            PlaybackType::None,
            true,
        )?;
        add_profile(
            &mut supported,
            deps.settings.as_ref(),
            profile::Type::RoutingLoudspeaker,
            PlaybackType::None,
            true,
        )?;

        let mut operation = Self {
            state: SharedState::new(State::Idle),
            token,
            supported,
            current: 0,
            device: None,
            cellular: None,
            uplink: None,
            downlink: None,
            muted: false,
            loudspeaker_forced: false,
            deps,
        };

        let ret = operation.switch_to_priority_profile();
        if ret != RetCode::Success {
            return Err(AudioInitError { code: ret });
        }
        Ok(operation)
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn current_profile_type(&self) -> profile::Type {
        self.supported[self.current].profile.profile_type()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn cellular_format(&self) -> AudioFormat {
        AudioFormat::new(self.supported[self.current].profile.sample_rate(), 16, 1)
    }

    pub fn start(&mut self) -> RetCode {
        if self.state.get() != State::Idle {
            return RetCode::InvokedInIncorrectState;
        }
        self.start_call()
    }

    /// Bring up both devices and both stream connections. Any failure
    /// aborts the whole bring-up and leaves the call down.
    fn start_call(&mut self) -> RetCode {
        let local_format = self.supported[self.current].profile.audio_format();
        let cellular_format = self.cellular_format();
        let volume = self.supported[self.current].profile.output_volume();
        let gain = self.supported[self.current].profile.input_gain();

        let (Some(device), Some(cellular)) = (self.device.as_mut(), self.cellular.as_mut())
        else {
            return RetCode::DeviceFailure;
        };

        if !device.is_format_supported_by_source(&local_format)
            || !device.is_format_supported_by_sink(&local_format)
        {
            return RetCode::InvalidFormat;
        }
        if !cellular.is_format_supported_by_source(&cellular_format)
            || !cellular.is_format_supported_by_sink(&cellular_format)
        {
            return RetCode::InvalidFormat;
        }

        if device.start(local_format).is_err() {
            error!("Local call path failed to start");
            return RetCode::DeviceFailure;
        }
        if cellular.start(cellular_format).is_err() {
            error!("Cellular call path failed to start");
            let _ = device.stop();
            return RetCode::DeviceFailure;
        }

        let _ = device.set_output_volume(volume);
        let _ = device.set_input_gain(gain);
        let _ = device.enable_input();
        let _ = device.enable_output();

        let uplink = StreamConnection::new();
        let downlink = StreamConnection::new();
        downlink.enable();
        if !self.muted {
            uplink.enable();
        }

        self.uplink = Some(uplink);
        self.downlink = Some(downlink);
        self.state.set(State::Active);
        RetCode::Success
    }

    fn stop_call(&mut self) {
        self.uplink = None;
        self.downlink = None;
        if let Some(device) = self.device.as_mut() {
            let _ = device.stop();
        }
        if let Some(cellular) = self.cellular.as_mut() {
            let _ = cellular.stop();
        }
        self.state.set(State::Idle);
    }

    pub fn stop(&mut self) -> RetCode {
        if self.state.get() == State::Idle {
            return RetCode::InvokedInIncorrectState;
        }
        self.stop_call();
        RetCode::Success
    }

    pub fn pause(&mut self) -> RetCode {
        if self.state.get() != State::Active {
            return RetCode::InvokedInIncorrectState;
        }
        let (Some(device), Some(cellular)) = (self.device.as_mut(), self.cellular.as_mut())
        else {
            return RetCode::DeviceFailure;
        };

        let ret = device_ret(device.pause().and_then(|_| cellular.pause()));
        if ret == RetCode::Success {
            self.state.set(State::Paused);
        }
        ret
    }

    pub fn resume(&mut self) -> RetCode {
        if self.state.get() != State::Paused {
            return RetCode::InvokedInIncorrectState;
        }
        let (Some(device), Some(cellular)) = (self.device.as_mut(), self.cellular.as_mut())
        else {
            return RetCode::DeviceFailure;
        };

        let ret = device_ret(device.resume().and_then(|_| cellular.resume()));
        if ret == RetCode::Success {
            self.state.set(State::Active);
        }
        ret
    }

    /// Mute disables the uplink connection without destroying it; unmute
    /// re-enables it
    pub fn mute(&mut self, enable: bool) -> RetCode {
        self.muted = enable;
        if let Some(uplink) = &self.uplink {
            if enable {
                uplink.disable();
            } else {
                uplink.enable();
            }
        }
        RetCode::Success
    }

    pub fn send_event(&mut self, event: &Event) -> RetCode {
        match event.event_type {
            EventType::JackState => {
                self.set_availability(profile::Type::RoutingHeadphones, event.is_connected());
                self.switch_to_priority_profile()
            }
            EventType::BluetoothHfpDeviceState => {
                self.set_availability(profile::Type::RoutingBluetoothHFP, event.is_connected());
                self.switch_to_priority_profile()
            }
            EventType::BluetoothHspDeviceState => {
                self.set_availability(profile::Type::RoutingBluetoothHSP, event.is_connected());
                self.switch_to_priority_profile()
            }
            EventType::CallMute => self.mute(true),
            EventType::CallUnmute => self.mute(false),
            EventType::CallLoudspeakerOn => {
                self.loudspeaker_forced = true;
                self.switch_to_priority_profile()
            }
            EventType::CallLoudspeakerOff => {
                self.loudspeaker_forced = false;
                self.switch_to_priority_profile()
            }
            EventType::MicrophoneState => {
                self.set_input_path_for_headset(event.is_connected());
                RetCode::Success
            }
            EventType::BluetoothA2dpDeviceState => RetCode::Ignored,
        }
    }

    fn set_availability(&mut self, profile_type: profile::Type, available: bool) {
        if let Some(entry) = self
            .supported
            .iter_mut()
            .find(|entry| entry.profile.profile_type() == profile_type)
        {
            entry.available = available;
        }
    }

    /// The headset reported whether it carries a microphone. Reroute the
    /// headset profile's input between its own microphone and the built-in
    /// one, in place, without restarting the call.
    fn set_input_path_for_headset(&mut self, has_microphone: bool) {
        if let Some(entry) = self
            .supported
            .iter_mut()
            .find(|entry| entry.profile.profile_type() == profile::Type::RoutingHeadphones)
        {
            entry.profile.set_input_path(if has_microphone {
                InputPath::HeadsetMicrophone
            } else {
                InputPath::Microphone
            });
        }
    }

    /// Pick the highest-priority available profile. While the loudspeaker
    /// is forced on, the earspeaker and headset are unselectable.
    pub fn switch_to_priority_profile(&mut self) -> RetCode {
        for index in 0..self.supported.len() {
            let entry = &self.supported[index];
            if !entry.available {
                continue;
            }
            let profile_type = entry.profile.profile_type();
            if self.loudspeaker_forced
                && matches!(
                    profile_type,
                    profile::Type::RoutingEarspeaker | profile::Type::RoutingHeadphones
                )
            {
                continue;
            }
            if index == self.current && self.device.is_some() {
                return RetCode::Success;
            }
            return self.switch_profile(profile_type);
        }
        RetCode::ProfileNotSet
    }

    /// Recreate both call devices for the new profile. An in-progress call
    /// is stopped first and restarted afterwards - a brief interruption is
    /// the accepted cost of a hard path change mid-call.
    fn switch_profile(&mut self, target: profile::Type) -> RetCode {
        let Some(index) = self
            .supported
            .iter()
            .position(|entry| entry.profile.profile_type() == target)
        else {
            return RetCode::UnsupportedProfile;
        };

        let was_active = self.state.get() == State::Active;
        if was_active {
            self.stop_call();
        }

        let Some(device) = self
            .deps
            .factory
            .create_device(&self.supported[index].profile)
        else {
            warn!("Device creation failed for {}", target);
            return RetCode::Failed;
        };
        let Some(cellular) = self
            .deps
            .factory
            .create_device_of_type(DeviceType::Cellular)
        else {
            warn!("Cellular device creation failed");
            return RetCode::Failed;
        };

        self.device = Some(device);
        self.cellular = Some(cellular);
        self.current = index;

        if was_active {
            return self.start_call();
        }
        RetCode::Success
    }

    pub fn set_output_volume(&mut self, volume: Volume) -> RetCode {
        self.supported[self.current].profile.set_output_volume(volume);
        match self.device.as_mut() {
            Some(device) => device_ret(device.set_output_volume(volume)),
            None => RetCode::DeviceFailure,
        }
    }

    pub fn set_input_gain(&mut self, gain: Gain) -> RetCode {
        self.supported[self.current].profile.set_input_gain(gain);
        match self.device.as_mut() {
            Some(device) => device_ret(device.set_input_gain(gain)),
            None => RetCode::DeviceFailure,
        }
    }

    pub fn output_volume(&self) -> Volume {
        self.supported[self.current].profile.output_volume()
    }

    pub fn input_gain(&self) -> Gain {
        self.supported[self.current].profile.input_gain()
    }

    /// Whether the microphone-to-radio connection is currently carrying
    /// audio (false while muted or with no call up)
    pub fn uplink_enabled(&self) -> bool {
        self.uplink
            .as_ref()
            .map(|connection| connection.is_enabled())
            .unwrap_or(false)
    }
}
