// Hardware and call-control events delivered to the audio subsystem
//
// Events arrive asynchronously from jack detection, the Bluetooth stack and
// the cellular call control path. `AudioSinkState` records the latest known
// state for each signal so that a freshly constructed operation can be
// brought up to date without waiting for the hardware to repeat itself.

use serde::{Deserialize, Serialize};

/// Kind of hardware or call-control signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    JackState,
    BluetoothHspDeviceState,
    BluetoothHfpDeviceState,
    BluetoothA2dpDeviceState,
    MicrophoneState,
    CallMute,
    CallUnmute,
    CallLoudspeakerOn,
    CallLoudspeakerOff,
}

/// Connectivity payload carried by device-state events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    Connected,
    Disconnected,
}

/// One asynchronous signal from the hardware or call-control layer.
///
/// Call-control events (`CallMute`, `CallLoudspeakerOn`, ...) ignore the
/// device state; constructors default it to `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub device_state: DeviceState,
}

impl Event {
    pub fn new(event_type: EventType, device_state: DeviceState) -> Self {
        Self {
            event_type,
            device_state,
        }
    }

    /// A call-control event with no meaningful device state
    pub fn control(event_type: EventType) -> Self {
        Self {
            event_type,
            device_state: DeviceState::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.device_state == DeviceState::Connected
    }
}

/// Signals tracked by `AudioSinkState`, in storage order.
///
/// The index mapping is written out by hand; no enum-range tricks.
const TRACKED_SIGNALS: usize = 7;

fn signal_index(event_type: EventType) -> usize {
    match event_type {
        EventType::JackState => 0,
        EventType::BluetoothHspDeviceState => 1,
        EventType::BluetoothHfpDeviceState => 2,
        EventType::BluetoothA2dpDeviceState => 3,
        EventType::MicrophoneState => 4,
        EventType::CallMute | EventType::CallUnmute => 5,
        EventType::CallLoudspeakerOn | EventType::CallLoudspeakerOff => 6,
    }
}

/// Latest known connectivity/state bit for every tracked hardware signal.
///
/// Lives inside `Audio` and survives operation switches; connectivity does
/// not reset just because playback stopped.
#[derive(Debug, Clone, Default)]
pub struct AudioSinkState {
    bits: [bool; TRACKED_SIGNALS],
}

impl AudioSinkState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the state carried by an incoming event. Must be called before
    /// the event is forwarded to the current operation.
    pub fn update(&mut self, event: &Event) {
        let index = signal_index(event.event_type);
        self.bits[index] = match event.event_type {
            EventType::CallMute => true,
            EventType::CallUnmute => false,
            EventType::CallLoudspeakerOn => true,
            EventType::CallLoudspeakerOff => false,
            _ => event.is_connected(),
        };
    }

    pub fn is_connected(&self, event_type: EventType) -> bool {
        self.bits[signal_index(event_type)]
    }

    pub fn jack_connected(&self) -> bool {
        self.is_connected(EventType::JackState)
    }

    pub fn bluetooth_a2dp_connected(&self) -> bool {
        self.is_connected(EventType::BluetoothA2dpDeviceState)
    }

    pub fn call_muted(&self) -> bool {
        self.is_connected(EventType::CallMute)
    }

    pub fn loudspeaker_forced(&self) -> bool {
        self.is_connected(EventType::CallLoudspeakerOn)
    }

    /// Events replaying the current state of every tracked signal, used to
    /// bring a freshly constructed operation up to date.
    pub fn connection_events(&self) -> Vec<Event> {
        let device_events = [
            EventType::JackState,
            EventType::BluetoothHspDeviceState,
            EventType::BluetoothHfpDeviceState,
            EventType::BluetoothA2dpDeviceState,
            EventType::MicrophoneState,
        ];

        let mut events: Vec<Event> = device_events
            .into_iter()
            .map(|event_type| {
                let state = if self.is_connected(event_type) {
                    DeviceState::Connected
                } else {
                    DeviceState::Disconnected
                };
                Event::new(event_type, state)
            })
            .collect();

        events.push(Event::control(if self.call_muted() {
            EventType::CallMute
        } else {
            EventType::CallUnmute
        }));
        events.push(Event::control(if self.loudspeaker_forced() {
            EventType::CallLoudspeakerOn
        } else {
            EventType::CallLoudspeakerOff
        }));
        events
    }
}
