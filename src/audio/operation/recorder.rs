// Recorder operation
//
// Captures the priority input path into a WAV file. Profile priority:
// headset microphone over Bluetooth HSP over the built-in microphone. The
// encoding worker drains the capture stream; when the encoder reports zero
// bytes written the file system is full, the operation flips to Idle and
// the owning service is notified with the session token.

use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::audio::devices::{device_ret, AudioDevice};
use crate::audio::encoder::{Encoder, EncoderFormat, EncoderWorker};
use crate::audio::events::{Event, EventType};
use crate::audio::profile;
use crate::audio::stream::{audio_stream, StreamConnection, StreamWriter, STREAM_CAPACITY_SAMPLES};
use crate::audio::types::{AudioInitError, Gain, PlaybackType, RetCode, Token, Volume};

use super::{add_profile, AudioNotification, OperationDeps, SharedState, State, SupportedProfile};

pub struct RecorderOperation {
    state: SharedState,
    token: Token,
    file_path: PathBuf,
    supported: Vec<SupportedProfile>,
    current: usize,
    device: Option<Box<dyn AudioDevice>>,
    // Encoder parked here between construction/stop and the next start.
    encoder: Option<Encoder>,
    worker: Option<EncoderWorker>,
    connection: Option<StreamConnection>,
    // Device-side end of the capture stream, fed by the microphone ISR.
    capture: Option<StreamWriter>,
    deps: OperationDeps,
}

impl std::fmt::Debug for RecorderOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderOperation")
            .field("token", &self.token)
            .field("file_path", &self.file_path)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl RecorderOperation {
    pub fn create(
        file_path: &Path,
        token: Token,
        deps: OperationDeps,
    ) -> Result<Self, AudioInitError> {
        let mut supported = Vec::new();
        add_profile(
            &mut supported,
            deps.settings.as_ref(),
            profile::Type::RecordingHeadphones,
            PlaybackType::None,
            false,
        )?;
        add_profile(
            &mut supported,
            deps.settings.as_ref(),
            profile::Type::RecordingBluetoothHSP,
            PlaybackType::None,
            false,
        )?;
        add_profile(
            &mut supported,
            deps.settings.as_ref(),
            profile::Type::RecordingBuiltInMic,
            PlaybackType::None,
            true,
        )?;

        // The priority profile decides the capture format before any device
        // is brought up.
        let Some(priority) = supported.iter().position(|entry| entry.available) else {
            return Err(AudioInitError {
                code: RetCode::ProfileNotSet,
            });
        };
        let capture_profile = &supported[priority].profile;
        let encoder_format = EncoderFormat {
            channels: capture_profile.channels(),
            sample_rate: capture_profile.sample_rate(),
            bit_depth: 16,
        };

        let encoder = Encoder::create(file_path, encoder_format).map_err(|code| {
            error!(
                "Cannot create encoder for {}: {}",
                file_path.display(),
                code
            );
            AudioInitError {
                code: RetCode::InvalidFormat,
            }
        })?;

        let mut operation = Self {
            state: SharedState::new(State::Idle),
            token,
            file_path: file_path.to_path_buf(),
            supported,
            current: priority,
            device: None,
            encoder: Some(encoder),
            worker: None,
            connection: None,
            capture: None,
            deps,
        };

        let ret = operation.switch_profile(operation.current_profile_type());
        if ret != RetCode::Success {
            return Err(AudioInitError {
                code: RetCode::ProfileNotSet,
            });
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

    pub fn start(&mut self) -> RetCode {
        match self.state.get() {
            State::Active => return RetCode::InvokedInIncorrectState,
            State::Paused if self.connection.is_some() => {
                return RetCode::InvokedInIncorrectState
            }
            _ => {}
        }

        let profile = &self.supported[self.current].profile;
        let format = profile.audio_format();
        let gain = profile.input_gain();
        let encoder_format = EncoderFormat {
            channels: profile.channels(),
            sample_rate: profile.sample_rate(),
            bit_depth: 16,
        };

        let Some(device) = self.device.as_mut() else {
            return RetCode::DeviceFailure;
        };
        if !device.is_format_supported_by_source(&format) {
            return RetCode::InvalidFormat;
        }

        // Restarting after a stop truncates and rewrites the target file.
        let encoder = match self.encoder.take() {
            Some(encoder) => encoder,
            None => match Encoder::create(&self.file_path, encoder_format) {
                Ok(encoder) => encoder,
                Err(code) => return code,
            },
        };

        let (writer, reader) = audio_stream(STREAM_CAPACITY_SAMPLES);
        let connection = StreamConnection::new();

        let state = self.state.clone();
        let notifications = self.deps.notifications.clone();
        let token = self.token;
        let worker = match EncoderWorker::spawn(
            encoder,
            reader,
            connection.gate(),
            Box::new(move || {
                state.set(State::Idle);
                let _ = notifications.send(AudioNotification::FileSystemNoSpace { token });
            }),
        ) {
            Ok(worker) => worker,
            Err(code) => return code,
        };

        if device.start(format).is_err() {
            return RetCode::DeviceFailure;
        }
        let _ = device.set_input_gain(gain);
        let _ = device.enable_input();

        worker.enable();
        connection.enable();

        self.worker = Some(worker);
        self.connection = Some(connection);
        self.capture = Some(writer);
        self.state.set(State::Active);
        RetCode::Success
    }

    /// Unconditional teardown; the worker finalizes the container on join
    pub fn stop(&mut self) -> RetCode {
        self.state.set(State::Idle);
        self.worker = None;
        self.connection = None;
        self.capture = None;

        match self.device.as_mut() {
            Some(device) => {
                let _ = device.disable_input();
                device_ret(device.stop())
            }
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
                self.set_availability(profile::Type::RecordingHeadphones, event.is_connected());
                self.switch_to_priority_profile()
            }
            EventType::BluetoothHspDeviceState => {
                self.set_availability(profile::Type::RecordingBluetoothHSP, event.is_connected());
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

    pub fn switch_to_priority_profile(&mut self) -> RetCode {
        for index in 0..self.supported.len() {
            let entry = &self.supported[index];
            if !entry.available {
                continue;
            }
            if index == self.current && self.device.is_some() {
                return RetCode::Success;
            }
            return self.switch_profile(entry.profile.profile_type());
        }
        RetCode::ProfileNotSet
    }

    /// Always (re)creates the hardware device for the selected profile and,
    /// if recording was in progress, restarts capture through it
    fn switch_profile(&mut self, target: profile::Type) -> RetCode {
        let Some(index) = self
            .supported
            .iter()
            .position(|entry| entry.profile.profile_type() == target)
        else {
            return RetCode::UnsupportedProfile;
        };

        let format = self.supported[index].profile.audio_format();
        let gain = self.supported[index].profile.input_gain();
        let Some(mut replacement) = self
            .deps
            .factory
            .create_device(&self.supported[index].profile)
        else {
            warn!("Device creation failed for {}", target);
            return RetCode::Failed;
        };
        if !replacement.is_format_supported_by_source(&format) {
            return RetCode::InvalidFormat;
        }

        let was_active = self.state.get() == State::Active;
        if let Some(worker) = &self.worker {
            if was_active {
                worker.disable();
            }
        }
        if let Some(old) = self.device.as_mut() {
            let _ = old.disable_input();
            let _ = old.stop();
        }

        let _ = replacement.set_input_gain(gain);

        if was_active {
            if replacement.start(format).is_err() {
                error!("Capture restart on {} failed after profile switch", target);
                self.state.set(State::Idle);
                self.device = Some(replacement);
                self.current = index;
                return RetCode::DeviceFailure;
            }
            let _ = replacement.enable_input();
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

    /// Feed captured PCM into the encoder stream; the microphone ISR calls
    /// this per DMA buffer
    pub fn push_capture(&mut self, samples: &[f32]) -> usize {
        match self.capture.as_mut() {
            Some(writer) => writer.write(samples),
            None => 0,
        }
    }
}
