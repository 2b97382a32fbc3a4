// Audio - the single-operation owner higher layers address
//
// Owns exactly one operation at a time, never null: any construction
// failure falls back to the idle operation and surfaces only as a result
// code. Tracks hardware connectivity across operation switches and replays
// it into every freshly constructed operation, and clamps volume/gain
// before they reach the operation.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::db::SettingsStore;

use super::devices::AudioDeviceFactory;
use super::events::{Event, EventType};
use super::operation::{self, NotificationSender, Operation, OperationDeps};
use super::profile;
use super::types::{
    clamp_gain, clamp_volume, Gain, PlaybackType, RetCode, Token, Volume,
};
use super::AudioSinkState;

/// Coarse activity of one `Audio` instance, the unit the mux arbitrates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioState {
    Idle,
    Playback,
    Recording,
    Routing,
}

pub struct Audio {
    operation: Operation,
    state: AudioState,
    sink_state: AudioSinkState,
    deps: OperationDeps,
}

impl Audio {
    pub fn new(
        factory: Arc<AudioDeviceFactory>,
        settings: Arc<dyn SettingsStore>,
        notifications: NotificationSender,
    ) -> Self {
        Self::with_deps(OperationDeps {
            factory,
            settings,
            notifications,
        })
    }

    pub fn with_deps(deps: OperationDeps) -> Self {
        Self {
            operation: Operation::idle(),
            state: AudioState::Idle,
            sink_state: AudioSinkState::new(),
            deps,
        }
    }

    /// Construct and start the requested operation. Construction failures
    /// never propagate: the instance falls back to idle and the embedded
    /// code is returned.
    pub fn start(
        &mut self,
        op_type: operation::Type,
        token: Token,
        file_path: Option<&Path>,
        playback: PlaybackType,
    ) -> RetCode {
        let mut op = match Operation::create(op_type, file_path, playback, token, self.deps.clone())
        {
            Ok(op) => op,
            Err(err) => {
                error!("Operation create failed: {}", err);
                self.operation = Operation::idle();
                self.state = AudioState::Idle;
                return err.code;
            }
        };

        // Bring the new operation's availability flags up to date before it
        // touches any hardware decision.
        for event in self.sink_state.connection_events() {
            let _ = op.send_event(&event);
        }
        let _ = op.switch_to_priority_profile();

        let ret = op.start();
        if ret != RetCode::Success {
            error!("Operation start failed: {}", ret);
            let _ = op.stop();
            self.operation = Operation::idle();
            self.state = AudioState::Idle;
            return ret;
        }

        info!("Audio started {:?} with token {}", op_type, token);
        self.operation = op;
        self.state = Self::state_for(op_type);
        ret
    }

    /// Restart the current operation from the beginning
    pub fn restart(&mut self) -> RetCode {
        let ret = self.operation.start();
        if ret == RetCode::Success {
            self.state = Self::state_for(self.operation.op_type());
        }
        ret
    }

    /// Stop is the one cancellation primitive; calling it while idle is a
    /// harmless no-op
    pub fn stop(&mut self) -> RetCode {
        if self.state == AudioState::Idle {
            return RetCode::Success;
        }
        let ret = self.operation.stop();
        self.state = AudioState::Idle;
        ret
    }

    pub fn pause(&mut self) -> RetCode {
        self.operation.pause()
    }

    pub fn resume(&mut self) -> RetCode {
        self.operation.resume()
    }

    pub fn mute(&mut self) -> RetCode {
        self.send_event(&Event::control(EventType::CallMute))
    }

    /// Update connectivity state strictly before forwarding the event, then
    /// re-run priority selection so a changed device takes effect even on
    /// an operation that does not handle the event type itself
    pub fn send_event(&mut self, event: &Event) -> RetCode {
        self.sink_state.update(event);
        let ret = self.operation.send_event(event);
        let _ = self.operation.switch_to_priority_profile();
        ret
    }

    pub fn set_output_volume(&mut self, volume: Volume) -> RetCode {
        self.operation.set_output_volume(clamp_volume(volume))
    }

    pub fn set_input_gain(&mut self, gain: Gain) -> RetCode {
        self.operation.set_input_gain(clamp_gain(gain))
    }

    pub fn output_volume(&self) -> Volume {
        self.operation.output_volume()
    }

    pub fn input_gain(&self) -> Gain {
        self.operation.input_gain()
    }

    pub fn state(&self) -> AudioState {
        self.state
    }

    pub fn operation_state(&self) -> operation::State {
        self.operation.state()
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn operation_mut(&mut self) -> &mut Operation {
        &mut self.operation
    }

    pub fn playback_type(&self) -> PlaybackType {
        self.operation.playback_type()
    }

    pub fn position_seconds(&self) -> f32 {
        self.operation.position_seconds()
    }

    pub fn sink_state(&self) -> &AudioSinkState {
        &self.sink_state
    }

    /// The playback profile current connectivity would select, independent
    /// of what the live operation is doing: headphones over Bluetooth A2DP
    /// over the loudspeaker
    pub fn priority_playback_profile(&self) -> profile::Type {
        if self.sink_state.jack_connected() {
            profile::Type::PlaybackHeadphones
        } else if self.sink_state.bluetooth_a2dp_connected() {
            profile::Type::PlaybackBluetoothA2DP
        } else {
            profile::Type::PlaybackLoudspeaker
        }
    }

    fn state_for(op_type: operation::Type) -> AudioState {
        match op_type {
            operation::Type::Idle => AudioState::Idle,
            operation::Type::Playback => AudioState::Playback,
            operation::Type::Recorder => AudioState::Recording,
            operation::Type::Router => AudioState::Routing,
        }
    }
}
