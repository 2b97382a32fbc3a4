pub mod audio;
pub mod db;
pub mod log;
pub mod service;

// Re-export the surfaces the owning service and tests address directly
pub use audio::{
    Audio, AudioMux, AudioState, DeviceState, Event, EventType, Operation, OperationDeps,
    PlaybackType, RetCode, Token,
};
pub use db::{MemorySettings, SettingsDatabase, SettingsStore};
pub use service::{AudioRequest, AudioResponse, AudioService, ServiceNotification};
