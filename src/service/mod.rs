// Audio service - admission control over the mux
//
// The thin handler the message bus drives. It owns the `AudioMux`, applies
// the admission rules (playback priority, call-routing pre-emption, the
// recording/routing veto), fetches the vibration flag at admission, and
// turns worker notifications into outbound service notifications.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::audio::control::AudioState;
use crate::audio::devices::{AudioDeviceFactory, AudioDeviceInfo, DeviceObserver, DeviceType};
use crate::audio::mux::AudioMux;
use crate::audio::operation::{self, AudioNotification, OperationDeps};
use crate::audio::profile;
use crate::audio::types::{
    clamp_volume, db_path, PlaybackType, RetCode, Setting, Token,
};
use crate::db::SettingsStore;

pub mod messages;

pub use messages::{AudioRequest, AudioResponse, ServiceNotification};

/// Forwards device-creation callbacks onto the outbound notification channel
struct DeviceCreationForwarder {
    outbound: UnboundedSender<ServiceNotification>,
}

impl DeviceObserver for DeviceCreationForwarder {
    fn on_device_created(&self, info: &AudioDeviceInfo, device_type: DeviceType) {
        let _ = self.outbound.send(ServiceNotification::DeviceCreated {
            info: info.clone(),
            device_type,
        });
    }
}

pub struct AudioService {
    mux: AudioMux,
    settings: Arc<dyn SettingsStore>,
    worker_notifications: UnboundedReceiver<AudioNotification>,
    outbound: UnboundedSender<ServiceNotification>,
}

impl AudioService {
    /// Build the service with its input pool. Returns the receiver carrying
    /// outbound notifications for the bus to forward.
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        input_count: usize,
    ) -> (Self, UnboundedReceiver<ServiceNotification>) {
        let factory = Arc::new(AudioDeviceFactory::new());
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        factory.set_observer(Arc::new(DeviceCreationForwarder {
            outbound: outbound_tx.clone(),
        }));

        let deps = OperationDeps {
            factory,
            settings: settings.clone(),
            notifications: worker_tx,
        };

        let service = Self {
            mux: AudioMux::new(deps, input_count),
            settings,
            worker_notifications: worker_rx,
            outbound: outbound_tx,
        };
        (service, outbound_rx)
    }

    pub fn mux(&self) -> &AudioMux {
        &self.mux
    }

    /// Handle one inbound request synchronously
    pub fn handle(&mut self, request: AudioRequest) -> AudioResponse {
        match request {
            AudioRequest::StartPlayback {
                file_name,
                playback_type,
            } => self.start_playback(&file_name, playback_type),
            AudioRequest::StartRecorder { file_name } => self.start_recorder(&file_name),
            AudioRequest::StartRouting => self.start_routing(),
            AudioRequest::Stop {
                token,
                playback_types,
            } => self.stop(token, &playback_types),
            AudioRequest::Pause { token } => self.with_token(token, |audio| audio.pause()),
            AudioRequest::Resume { token } => self.with_token(token, |audio| audio.resume()),
            AudioRequest::SetVolume {
                playback_type,
                value,
            } => self.set_volume(playback_type, value),
            AudioRequest::SetGain { value } => self.set_gain(value),
            AudioRequest::KeyPressed { step } => self.key_pressed(step),
            AudioRequest::SendEvent { event } => {
                // Hardware events are broadcast to every input so all sink
                // states stay consistent.
                for index in 0..self.mux.input_count() {
                    let _ = self.mux.input_mut(index).audio_mut().send_event(&event);
                }
                AudioResponse::Result {
                    ret_code: RetCode::Success,
                }
            }
            AudioRequest::GetSetting {
                setting,
                playback_type,
                profile_type,
            } => {
                let path = db_path(setting, playback_type, profile_type);
                if path.is_empty() {
                    return AudioResponse::Setting {
                        ret_code: RetCode::Failed,
                        value: None,
                    };
                }
                AudioResponse::Setting {
                    ret_code: RetCode::Success,
                    value: self.settings.get(&path),
                }
            }
            AudioRequest::SetSetting {
                setting,
                playback_type,
                profile_type,
                value,
            } => {
                let path = db_path(setting, playback_type, profile_type);
                if path.is_empty() {
                    return AudioResponse::Result {
                        ret_code: RetCode::Failed,
                    };
                }
                self.settings.set(&path, &value);
                AudioResponse::Result {
                    ret_code: RetCode::Success,
                }
            }
        }
    }

    /// Drain worker notifications: stop the affected input, release it and
    /// forward the condition to the bus
    pub fn pump_notifications(&mut self) {
        while let Ok(notification) = self.worker_notifications.try_recv() {
            let (token, outbound) = match notification {
                AudioNotification::EndOfFile { token } => {
                    (token, ServiceNotification::EndOfFile { token })
                }
                AudioNotification::FileDeleted { token } => {
                    (token, ServiceNotification::FileDeleted { token })
                }
                AudioNotification::FileSystemNoSpace { token } => {
                    (token, ServiceNotification::FileSystemNoSpace { token })
                }
            };

            if let Some(index) = self.mux.find_input(token) {
                let _ = self.mux.input_mut(index).audio_mut().stop();
                self.mux.reset_input(Some(index));
            }
            let _ = self.outbound.send(outbound);
        }
    }

    fn start_playback(&mut self, file_name: &str, playback_type: PlaybackType) -> AudioResponse {
        let Some(index) = self.mux.playback_input(playback_type) else {
            info!("Playback {:?} not admitted", playback_type);
            return AudioResponse::Start {
                ret_code: RetCode::Failed,
                token: Token::bad(),
            };
        };

        self.preempt(index);
        let token = self.mux.reset_input(Some(index));

        if self.vibration_enabled(playback_type) {
            self.mux.input_mut(index).enable_vibration();
        }

        let ret_code = self.mux.input_mut(index).audio_mut().start(
            operation::Type::Playback,
            token,
            Some(Path::new(file_name)),
            playback_type,
        );
        self.respond_start(index, ret_code, token)
    }

    fn start_recorder(&mut self, file_name: &str) -> AudioResponse {
        // Recording never joins an ongoing call or another recording.
        if self
            .mux
            .find_input_by_state(&[AudioState::Routing, AudioState::Recording])
            .is_some()
        {
            return AudioResponse::Start {
                ret_code: RetCode::Failed,
                token: Token::bad(),
            };
        }
        let Some(index) = self.mux.idle_input() else {
            return AudioResponse::Start {
                ret_code: RetCode::Failed,
                token: Token::bad(),
            };
        };

        let token = self.mux.reset_input(Some(index));
        let ret_code = self.mux.input_mut(index).audio_mut().start(
            operation::Type::Recorder,
            token,
            Some(Path::new(file_name)),
            PlaybackType::None,
        );
        self.respond_start(index, ret_code, token)
    }

    fn start_routing(&mut self) -> AudioResponse {
        let Some(index) = self.mux.routing_input(true) else {
            return AudioResponse::Start {
                ret_code: RetCode::Failed,
                token: Token::bad(),
            };
        };

        // An input already carrying the call keeps its token.
        if self.mux.input(index).audio().state() == AudioState::Routing {
            return AudioResponse::Start {
                ret_code: RetCode::Success,
                token: self.mux.input(index).token(),
            };
        }

        self.preempt(index);
        let token = self.mux.reset_input(Some(index));
        let ret_code = self.mux.input_mut(index).audio_mut().start(
            operation::Type::Router,
            token,
            None,
            PlaybackType::None,
        );
        self.respond_start(index, ret_code, token)
    }

    fn stop(&mut self, token: Option<Token>, playback_types: &[PlaybackType]) -> AudioResponse {
        if let Some(token) = token {
            let Some(index) = self.mux.find_input(token) else {
                return AudioResponse::Stop {
                    ret_code: RetCode::TokenNotFound,
                    tokens: Vec::new(),
                };
            };
            let ret_code = self.mux.input_mut(index).audio_mut().stop();
            self.mux.reset_input(Some(index));
            let _ = self.outbound.send(ServiceNotification::Stopped { token });
            return AudioResponse::Stop {
                ret_code,
                tokens: vec![token],
            };
        }

        // Stop by type list; an empty list stops every active input.
        let mut tokens = Vec::new();
        for index in 0..self.mux.input_count() {
            let input = self.mux.input(index);
            if input.audio().state() == AudioState::Idle {
                continue;
            }
            let matches =
                playback_types.is_empty() || playback_types.contains(&input.audio().playback_type());
            if !matches {
                continue;
            }

            let token = input.token();
            let _ = self.mux.input_mut(index).audio_mut().stop();
            self.mux.reset_input(Some(index));
            let _ = self.outbound.send(ServiceNotification::Stopped { token });
            tokens.push(token);
        }
        AudioResponse::Stop {
            ret_code: RetCode::Success,
            tokens,
        }
    }

    fn set_volume(&mut self, playback_type: PlaybackType, value: f32) -> AudioResponse {
        let clamped = clamp_volume(value);
        let profile_type = self.mux.input(0).audio().priority_playback_profile();
        self.settings.set(
            &db_path(Setting::Volume, playback_type, profile_type),
            &format!("{}", clamped),
        );

        // Apply live to any input currently serving this purpose.
        for index in 0..self.mux.input_count() {
            if self.mux.input(index).audio().playback_type() == playback_type
                && self.mux.input(index).audio().state() == AudioState::Playback
            {
                let _ = self.mux.input_mut(index).audio_mut().set_output_volume(clamped);
            }
        }
        AudioResponse::Result {
            ret_code: RetCode::Success,
        }
    }

    fn set_gain(&mut self, value: f32) -> AudioResponse {
        let Some(index) = self
            .mux
            .find_input_by_state(&[AudioState::Recording, AudioState::Routing])
        else {
            return AudioResponse::Result {
                ret_code: RetCode::OperationNotSet,
            };
        };

        let ret_code = self.mux.input_mut(index).audio_mut().set_input_gain(value);
        let profile_type = self.mux.input(index).audio().operation().current_profile_type();
        let applied = self.mux.input(index).audio().input_gain();
        self.settings.set(
            &db_path(Setting::Gain, PlaybackType::None, profile_type),
            &format!("{}", applied),
        );
        AudioResponse::Result { ret_code }
    }

    fn key_pressed(&mut self, step: i32) -> AudioResponse {
        // Adjust the active playback context, or the default multimedia
        // context when nothing is playing.
        let (playback_type, current) = match self.mux.active_input() {
            Some(index) if self.mux.input(index).audio().state() == AudioState::Playback => {
                let audio = self.mux.input(index).audio();
                (audio.playback_type(), audio.output_volume())
            }
            _ => {
                let profile_type = self.mux.input(0).audio().priority_playback_profile();
                let current = self
                    .settings
                    .get(&db_path(Setting::Volume, PlaybackType::Multimedia, profile_type))
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(profile::Profile::default_volume(profile_type));
                (PlaybackType::Multimedia, current)
            }
        };

        self.set_volume(playback_type, current + step as f32)
    }

    /// Stop and announce whatever sound the chosen input is still serving
    fn preempt(&mut self, index: usize) {
        let input = self.mux.input(index);
        if input.audio().state() == AudioState::Idle {
            return;
        }
        let token = input.token();
        warn!("Pre-empting input {} (token {})", index, token);
        let _ = self.mux.input_mut(index).audio_mut().stop();
        let _ = self.outbound.send(ServiceNotification::Stopped { token });
    }

    fn respond_start(&mut self, index: usize, ret_code: RetCode, token: Token) -> AudioResponse {
        if ret_code != RetCode::Success {
            self.mux.reset_input(Some(index));
            return AudioResponse::Start {
                ret_code,
                token: Token::bad(),
            };
        }
        AudioResponse::Start { ret_code, token }
    }

    fn with_token<F>(&mut self, token: Token, call: F) -> AudioResponse
    where
        F: FnOnce(&mut crate::audio::control::Audio) -> RetCode,
    {
        match self.mux.find_input(token) {
            Some(index) => AudioResponse::Result {
                ret_code: call(self.mux.input_mut(index).audio_mut()),
            },
            None => AudioResponse::Result {
                ret_code: RetCode::TokenNotFound,
            },
        }
    }

    fn vibration_enabled(&self, playback_type: PlaybackType) -> bool {
        let path = db_path(Setting::EnableVibration, playback_type, profile::Type::Idle);
        if path.is_empty() {
            return false;
        }
        self.settings.get(&path).as_deref() == Some("1")
    }
}
