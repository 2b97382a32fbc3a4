// Playback operation
//
// Streams a decoded file to the priority output path. Profile priority:
// headphones over Bluetooth A2DP over the loudspeaker; availability follows
// jack and A2DP connectivity events. The decoding worker owns the file
// stream; end-of-file and file-deleted conditions flip the operation to
// Idle and notify the owning service with the session token.

use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::audio::decoder::{Decoder, DecoderError, DecoderEvent, DecoderWorker};
use crate::audio::devices::{device_ret, AudioDevice};
use crate::audio::events::{Event, EventType};
use crate::audio::profile;
use crate::audio::stream::{audio_stream, StreamConnection, StreamReader, STREAM_CAPACITY_SAMPLES};
use crate::audio::types::{
    AudioFormat, AudioInitError, Gain, PlaybackType, RetCode, Token, Volume,
};

use super::{add_profile, AudioNotification, OperationDeps, SharedState, State, SupportedProfile};

pub struct PlaybackOperation {
    state: SharedState,
    token: Token,
    playback_type: PlaybackType,
    file_path: PathBuf,
    supported: Vec<SupportedProfile>,
    current: usize,
    source_format: AudioFormat,
    device: Option<Box<dyn AudioDevice>>,
    // Decoder parked here between construction/stop and the next start.
    decoder: Option<Decoder>,
    worker: Option<DecoderWorker>,
    connection: Option<StreamConnection>,
    // Device-side end of the stream, drained by the DMA path.
    sink: Option<StreamReader>,
    deps: OperationDeps,
}

impl PlaybackOperation {
    pub fn create(
        file_path: &Path,
        playback_type: PlaybackType,
        token: Token,
        deps: OperationDeps,
    ) -> Result<Self, AudioInitError> {
        let mut supported = Vec::new();
        add_profile(
            &mut supported,
            deps.settings.as_ref(),
            profile::Type::PlaybackHeadphones,
            playback_type,
            false,
        )?;
        add_profile(
            &mut supported,
            deps.settings.as_ref(),
            profile::Type::PlaybackBluetoothA2DP,
            playback_type,
            false,
        )?;
        add_profile(
            &mut supported,
            deps.settings.as_ref(),
            profile::Type::PlaybackLoudspeaker,
            playback_type,
            true,
        )?;

        let decoder = Decoder::open(file_path).map_err(|err| {
            error!("Cannot open {} for playback: {}", file_path.display(), err);
            AudioInitError {
                code: match err {
                    DecoderError::FileDoesntExist(_) => RetCode::FileDoesntExist,
                    DecoderError::InvalidFormat => RetCode::InvalidFormat,
                },
            }
        })?;
        let source_format = decoder.source_format();

        // Adapt the routing profiles to the file's sample rate; channel
        // layout downstream is always stereo after upmix.
        for entry in &mut supported {
            entry.profile.set_sample_rate(source_format.sample_rate);
        }

        let mut operation = Self {
            state: SharedState::new(State::Idle),
            token,
            playback_type,
            file_path: file_path.to_path_buf(),
            supported,
            current: 0,
            source_format,
            device: None,
            decoder: Some(decoder),
            worker: None,
            connection: None,
            sink: None,
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

    pub fn playback_type(&self) -> PlaybackType {
        self.playback_type
    }

    pub fn current_profile_type(&self) -> profile::Type {
        self.supported[self.current].profile.profile_type()
    }

    /// Stream format pushed to the device: source rate, stereo after upmix
    fn playback_format(&self) -> AudioFormat {
        AudioFormat::new(self.source_format.sample_rate, 16, 2)
    }

    pub fn start(&mut self) -> RetCode {
        match self.state.get() {
            State::Active => return RetCode::InvokedInIncorrectState,
            State::Paused if self.connection.is_some() => {
                return RetCode::InvokedInIncorrectState
            }
            _ => {}
        }

        let format = self.playback_format();
        let volume = self.supported[self.current].profile.output_volume();
        let Some(device) = self.device.as_mut() else {
            return RetCode::DeviceFailure;
        };
        if !device.is_format_supported_by_sink(&format) {
            return RetCode::InvalidFormat;
        }

        // Restarting after stop or end-of-file reopens the file.
        let decoder = match self.decoder.take() {
            Some(decoder) => decoder,
            None => match Decoder::open(&self.file_path) {
                Ok(decoder) => decoder,
                Err(err) => {
                    error!("Restart failed on {}: {}", self.file_path.display(), err);
                    return RetCode::FileDoesntExist;
                }
            },
        };

        let (writer, reader) = audio_stream(STREAM_CAPACITY_SAMPLES);
        let connection = StreamConnection::new();

        let state = self.state.clone();
        let notifications = self.deps.notifications.clone();
        let token = self.token;
        let worker = match DecoderWorker::spawn(
            decoder,
            writer,
            connection.gate(),
            Box::new(move |event| {
                state.set(State::Idle);
                let notification = match event {
                    DecoderEvent::EndOfFile => AudioNotification::EndOfFile { token },
                    DecoderEvent::FileDeleted => AudioNotification::FileDeleted { token },
                };
                let _ = notifications.send(notification);
            }),
        ) {
            Ok(worker) => worker,
            Err(code) => return code,
        };

        if device.start(format).is_err() {
            // Worker never got enabled; dropping it joins the thread.
            return RetCode::DeviceFailure;
        }
        let _ = device.set_output_volume(volume);

        worker.enable();
        connection.enable();

        self.worker = Some(worker);
        self.connection = Some(connection);
        self.sink = Some(reader);
        self.state.set(State::Active);
        RetCode::Success
    }

    /// Unconditional teardown; tolerates being called in any state
    pub fn stop(&mut self) -> RetCode {
        self.state.set(State::Idle);
        self.worker = None;
        self.connection = None;
        self.sink = None;

        match self.device.as_mut() {
            Some(device) => device_ret(device.stop()),
            None => RetCode::DeviceFailure,
        }
    }

    pub fn pause(&mut self) -> RetCode {
        if self.state.get() != State::Active {
            return RetCode::InvokedInIncorrectState;
        }
        let Some(device) = self.device.as_mut() else {
            return RetCode::DeviceFailure;
        };

        if let Some(connection) = &self.connection {
            connection.disable();
        }
        if let Some(worker) = &self.worker {
            worker.disable();
        }

        let ret = device_ret(device.pause());
        if ret == RetCode::Success {
            self.state.set(State::Paused);
        }
        ret
    }

    pub fn resume(&mut self) -> RetCode {
        if self.state.get() != State::Paused {
            return RetCode::InvokedInIncorrectState;
        }
        let Some(device) = self.device.as_mut() else {
            return RetCode::DeviceFailure;
        };

        let ret = device_ret(device.resume());
        if ret != RetCode::Success {
            return ret;
        }
        if let Some(worker) = &self.worker {
            worker.enable();
        }
        if let Some(connection) = &self.connection {
            connection.enable();
        }
        self.state.set(State::Active);
        RetCode::Success
    }

    pub fn send_event(&mut self, event: &Event) -> RetCode {
        match event.event_type {
            EventType::JackState => {
                self.set_availability(profile::Type::PlaybackHeadphones, event.is_connected());
                self.switch_to_priority_profile()
            }
            EventType::BluetoothA2dpDeviceState => {
                self.set_availability(profile::Type::PlaybackBluetoothA2DP, event.is_connected());
                self.switch_to_priority_profile()
            }
            _ => RetCode::Ignored,
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

    /// Pick the highest-priority available profile. Ringtones must not
    /// route to a Bluetooth call-audio path, so A2DP is suppressed for the
    /// call-ringtone playback type.
    pub fn switch_to_priority_profile(&mut self) -> RetCode {
        for index in 0..self.supported.len() {
            let entry = &self.supported[index];
            if !entry.available {
                continue;
            }
            if entry.profile.profile_type() == profile::Type::PlaybackBluetoothA2DP
                && self.playback_type == PlaybackType::CallRingtone
            {
                continue;
            }
            if index == self.current && self.device.is_some() {
                return RetCode::Success;
            }
            return self.switch_profile(entry.profile.profile_type());
        }
        RetCode::ProfileNotSet
    }

    /// Replace the output device with the one serving `target`. The switch
    /// is all-or-nothing: the current device is only stopped once the
    /// replacement is confirmed creatable.
    fn switch_profile(&mut self, target: profile::Type) -> RetCode {
        let Some(index) = self
            .supported
            .iter()
            .position(|entry| entry.profile.profile_type() == target)
        else {
            return RetCode::UnsupportedProfile;
        };

        let format = self.playback_format();
        let Some(mut replacement) = self
            .deps
            .factory
            .create_device(&self.supported[index].profile)
        else {
            warn!("Device creation failed for {}", target);
            return RetCode::Failed;
        };
        if !replacement.is_format_supported_by_sink(&format) {
            return RetCode::InvalidFormat;
        }

        let was_active = self.state.get() == State::Active;
        if let Some(worker) = &self.worker {
            if was_active {
                worker.disable();
            }
        }
        if let Some(old) = self.device.as_mut() {
            let _ = old.stop();
        }

        let _ = replacement.set_output_volume(self.supported[index].profile.output_volume());

        if was_active {
            if replacement.start(format).is_err() {
                error!("Restart on {} failed after profile switch", target);
                self.state.set(State::Idle);
                self.device = Some(replacement);
                self.current = index;
                return RetCode::DeviceFailure;
            }
            if let Some(worker) = &self.worker {
                worker.enable();
            }
        }

        self.device = Some(replacement);
        self.current = index;
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

    pub fn position_seconds(&self) -> f32 {
        self.worker
            .as_ref()
            .map(|worker| worker.position_seconds())
            .unwrap_or(0.0)
    }

    /// Seek the stream to a relative position, 0.0 (start) to 1.0 (end)
    pub fn set_position(&mut self, position: f32) -> RetCode {
        if let Some(worker) = &self.worker {
            worker.set_position(position);
            return RetCode::Success;
        }
        match self.decoder.as_mut() {
            Some(decoder) => {
                decoder.set_position(position);
                RetCode::Success
            }
            None => RetCode::InvokedInIncorrectState,
        }
    }
}
