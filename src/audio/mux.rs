// AudioMux - arbitration over a fixed pool of Audio inputs
//
// The mux owns N inputs for its whole lifetime and decides which one
// serves a new playback, recording or routing request: higher-priority
// sounds block lower-priority ones, mergeable repeats collapse into the
// already-active instance, and call routing pre-empts whatever holds the
// lowest-priority sound when forced. Tokens bind callers to inputs and are
// reissued from a shared counter on every reset.

use tracing::debug;

use super::control::{Audio, AudioState};
use super::operation::OperationDeps;
use super::types::{PlaybackType, Token};

/// One slot in the pool: an owned `Audio`, the token bound to it and the
/// vibration flag for the sound it is serving
pub struct Input {
    audio: Audio,
    token: Token,
    vibration_on: bool,
}

impl Input {
    pub fn new(audio: Audio) -> Self {
        Self {
            audio,
            token: Token::uninitialized(),
            vibration_on: false,
        }
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut Audio {
        &mut self.audio
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn enable_vibration(&mut self) {
        self.vibration_on = true;
    }

    pub fn disable_vibration(&mut self) {
        self.vibration_on = false;
    }

    pub fn is_vibration_on(&self) -> bool {
        self.vibration_on
    }

    fn rebind(&mut self, token: Token) {
        self.vibration_on = false;
        self.token = token;
    }
}

/// Priority-based arbitration over a fixed input pool
pub struct AudioMux {
    inputs: Vec<Input>,
    ref_token: Token,
}

impl AudioMux {
    /// Build the pool up front; it never grows or shrinks afterwards
    pub fn new(deps: OperationDeps, input_count: usize) -> Self {
        let input_count = input_count.max(1);
        let inputs = (0..input_count)
            .map(|_| Input::new(Audio::with_deps(deps.clone())))
            .collect();
        Self {
            inputs,
            ref_token: Token::uninitialized(),
        }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn input(&self, index: usize) -> &Input {
        &self.inputs[index]
    }

    pub fn input_mut(&mut self, index: usize) -> &mut Input {
        &mut self.inputs[index]
    }

    /// Find the input bound to a token; invalid and uninitialized tokens
    /// never match
    pub fn find_input(&self, token: Token) -> Option<usize> {
        if !token.is_valid() {
            return None;
        }
        self.inputs.iter().position(|input| input.token == token)
    }

    /// First input (in pool order) whose state is in the given set
    pub fn find_input_by_state(&self, states: &[AudioState]) -> Option<usize> {
        self.inputs
            .iter()
            .position(|input| states.contains(&input.audio.state()))
    }

    pub fn idle_input(&self) -> Option<usize> {
        self.find_input_by_state(&[AudioState::Idle])
    }

    /// A routing input always wins inspection priority; otherwise the first
    /// non-idle input in pool order
    pub fn active_input(&self) -> Option<usize> {
        self.find_input_by_state(&[AudioState::Routing])
            .or_else(|| {
                self.inputs
                    .iter()
                    .position(|input| input.audio.state() != AudioState::Idle)
            })
    }

    /// Playback admission. A busy higher-priority sound rejects the request
    /// outright; a busy mergeable sound of the same type absorbs it (even
    /// when an idle input exists); otherwise an idle input is preferred over
    /// taking over a busy lower-priority one.
    pub fn available_input(&self, playback: PlaybackType) -> Option<usize> {
        let mut idle: Option<usize> = None;
        let mut overridable: Option<usize> = None;

        for (index, input) in self.inputs.iter().enumerate() {
            if input.audio.state() == AudioState::Idle {
                if idle.is_none() {
                    idle = Some(index);
                }
                continue;
            }

            let busy = input.audio.playback_type();
            if playback.priority() > busy.priority() {
                debug!(
                    "Playback {:?} blocked by higher-priority {:?}",
                    playback, busy
                );
                return None;
            }
            if busy == playback && playback.is_mergeable() {
                // The running sound absorbs the request; this overrides any
                // idle input found in the same scan.
                debug!("Playback {:?} merged into the active instance", playback);
                return None;
            }
            overridable = Some(index);
        }

        idle.or(overridable)
    }

    /// Playback admission with the global precedence rule: call audio and
    /// recording always block new playback
    pub fn playback_input(&self, playback: PlaybackType) -> Option<usize> {
        if self
            .find_input_by_state(&[AudioState::Routing, AudioState::Recording])
            .is_some()
        {
            return None;
        }
        self.available_input(playback)
    }

    /// Input for call routing. Prefers an existing routing input; otherwise
    /// only a forced request gets one, pre-empting whichever input holds
    /// the lowest-priority active sound.
    pub fn routing_input(&self, force: bool) -> Option<usize> {
        if let Some(index) = self.find_input_by_state(&[AudioState::Routing]) {
            return Some(index);
        }
        if !force {
            return None;
        }

        let mut victim = 0;
        for (index, input) in self.inputs.iter().enumerate().skip(1) {
            if input.audio.playback_type().priority()
                > self.inputs[victim].audio.playback_type().priority()
            {
                victim = index;
            }
        }
        Some(victim)
    }

    /// Disable vibration on the given input (if any) and bind it to a fresh
    /// token from the shared counter. Without an input this still issues a
    /// fresh throwaway token.
    pub fn reset_input(&mut self, index: Option<usize>) -> Token {
        self.ref_token = self.ref_token.incremented();
        if let Some(index) = index {
            self.inputs[index].rebind(self.ref_token);
        }
        self.ref_token
    }
}
