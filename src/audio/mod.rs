// Audio module - the phone audio subsystem core
//
// This module provides the audio system broken down into logical components:
// - types: result codes, tokens, playback purposes, settings paths
// - events: hardware/call-control events and persistent sink state
// - profile: physical routing scenarios and their tunable bundles
// - devices: the AudioDevice contract, concrete paths and the factory
// - stream: bounded PCM transport and stream connections
// - decoder/encoder: file codecs and their worker threads
// - operation: the Idle/Playback/Recorder/Router state machines
// - control: Audio, the single-operation owner
// - mux: the fixed input pool and its arbitration rules

pub mod control;
pub mod decoder;
pub mod devices;
pub mod encoder;
pub mod events;
pub mod mux;
pub mod operation;
pub mod profile;
pub mod stream;
pub mod types;

// Re-export commonly used types for easier imports
pub use types::{
    clamp_gain, clamp_volume, db_path, AudioFormat, AudioInitError, Gain, PlaybackType, RetCode,
    Setting, Token, Volume, AUDIO_OPERATION_TIMEOUT, MAX_GAIN, MAX_VOLUME,
};

pub use control::{Audio, AudioState};
pub use events::{AudioSinkState, DeviceState, Event, EventType};
pub use mux::{AudioMux, Input};
pub use profile::{EqPreset, InputPath, OutputPath, Profile};

pub use devices::{
    device_ret, AudioDevice, AudioDeviceFactory, AudioDeviceInfo, DeviceError, DeviceObserver,
    DeviceResult, DeviceType, RunState,
};

pub use decoder::{DecodeOutcome, Decoder, DecoderError, DecoderEvent, DecoderWorker};
pub use encoder::{AudioEncoder, Encoder, EncoderFormat, EncoderWorker, WavEncoder};
pub use operation::{
    AudioNotification, IdleOperation, NotificationSender, Operation, OperationDeps,
    PlaybackOperation, RecorderOperation, RouterOperation, SupportedProfile,
};
pub use stream::{audio_stream, StreamConnection, StreamGate, StreamReader, StreamWriter};
