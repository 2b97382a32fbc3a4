// Idle operation - the harmless terminal state
//
// Exists so `Audio` always owns a valid operation to delegate to. Every
// call succeeds without touching hardware.

use crate::audio::events::Event;
use crate::audio::types::{Gain, RetCode, Token, Volume};

use super::State;

/// No-op operation; all calls return `Success` immediately
#[derive(Debug, Default)]
pub struct IdleOperation {
    token: Token,
}

impl IdleOperation {
    pub fn new() -> Self {
        Self {
            token: Token::uninitialized(),
        }
    }

    pub fn state(&self) -> State {
        State::Idle
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn start(&mut self) -> RetCode {
        RetCode::Success
    }

    pub fn stop(&mut self) -> RetCode {
        RetCode::Success
    }

    pub fn pause(&mut self) -> RetCode {
        RetCode::Success
    }

    pub fn resume(&mut self) -> RetCode {
        RetCode::Success
    }

    pub fn send_event(&mut self, _event: &Event) -> RetCode {
        RetCode::Success
    }

    pub fn set_output_volume(&mut self, _volume: Volume) -> RetCode {
        RetCode::Success
    }

    pub fn set_input_gain(&mut self, _gain: Gain) -> RetCode {
        RetCode::Success
    }

    pub fn position_seconds(&self) -> f32 {
        0.0
    }
}
