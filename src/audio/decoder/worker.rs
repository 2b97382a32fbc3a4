// Decoding worker
//
// A dedicated thread pulls decoded PCM into the device stream so the owner
// thread never blocks on file IO. Enable/disable are synchronous handshakes:
// the caller blocks until the worker acknowledges the command, so it always
// observes the state change before proceeding. Termination joins the thread,
// guaranteeing no callback fires after teardown returns.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use colored::Colorize;
use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{info, warn};

use crate::audio::stream::{StreamGate, StreamWriter};
use crate::audio::types::RetCode;
use crate::audio_debug;

use super::{DecodeOutcome, Decoder};

/// Terminal stream conditions reported by the worker, each at most once per
/// playback run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderEvent {
    EndOfFile,
    FileDeleted,
}

/// Callback invoked from the worker thread on a terminal stream condition
pub type DecoderEventCallback = Box<dyn Fn(DecoderEvent) + Send>;

enum Command {
    Enable(Sender<()>),
    Disable(Sender<()>),
    SetPosition(f32),
    Terminate,
}

const DECODE_CHUNK_SAMPLES: usize = 1024;
const IDLE_POLL: Duration = Duration::from_millis(2);

/// Handle to the decoding thread
pub struct DecoderWorker {
    commands: Sender<Command>,
    handle: Option<JoinHandle<()>>,
    position_ms: Arc<AtomicU32>,
}

impl DecoderWorker {
    /// Spawn the worker over an opened decoder. Samples flow through
    /// `writer` only while `gate` is enabled; mono sources are upmixed to
    /// stereo by frame duplication before being pushed downstream.
    pub fn spawn(
        decoder: Decoder,
        writer: StreamWriter,
        gate: StreamGate,
        on_event: DecoderEventCallback,
    ) -> Result<Self, RetCode> {
        let (commands, command_rx) = unbounded();
        let position_ms = Arc::new(AtomicU32::new(0));
        let thread_position = Arc::clone(&position_ms);

        let handle = std::thread::Builder::new()
            .name("audio-decode".into())
            .spawn(move || run(decoder, writer, gate, command_rx, thread_position, on_event))
            .map_err(|err| {
                warn!("Failed to spawn decoding worker: {}", err);
                RetCode::FailedToAllocateMemory
            })?;

        Ok(Self {
            commands,
            handle: Some(handle),
            position_ms,
        })
    }

    /// Start pulling samples; blocks until the worker acknowledges
    pub fn enable(&self) -> bool {
        self.handshake(Command::Enable)
    }

    /// Stop pulling samples; blocks until the worker acknowledges
    pub fn disable(&self) -> bool {
        self.handshake(Command::Disable)
    }

    fn handshake(&self, make: fn(Sender<()>) -> Command) -> bool {
        let (ack_tx, ack_rx) = bounded(1);
        if self.commands.send(make(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv().is_ok()
    }

    /// Seek the underlying decoder to a relative position, 0.0 to 1.0
    pub fn set_position(&self, position: f32) {
        let _ = self.commands.send(Command::SetPosition(position));
    }

    /// Seconds of audio pushed downstream since the start of the file
    pub fn position_seconds(&self) -> f32 {
        self.position_ms.load(Ordering::Relaxed) as f32 / 1000.0
    }

    fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Terminate);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DecoderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    mut decoder: Decoder,
    mut writer: StreamWriter,
    gate: StreamGate,
    commands: Receiver<Command>,
    position_ms: Arc<AtomicU32>,
    on_event: DecoderEventCallback,
) {
    let source = decoder.source_format();
    let upmix = source.channels == 1;
    let out_channels = if upmix { 2 } else { source.channels.max(1) } as u64;
    let rate = source.sample_rate.max(1) as u64;

    let mut chunk = vec![0.0f32; DECODE_CHUNK_SAMPLES];
    // Upmixed samples waiting for stream space.
    let mut staged: Vec<f32> = Vec::new();
    let mut enabled = false;
    let mut finished = false;
    let mut frames_pushed: u64 = 0;
    let mut made_progress = false;

    info!(
        "{}: decoding worker up for {}",
        "AUDIO_DECODE".cyan(),
        decoder.path().display()
    );

    loop {
        let streaming = enabled && !finished;
        let command = if streaming && made_progress {
            match commands.try_recv() {
                Ok(command) => Some(command),
                Err(crossbeam::channel::TryRecvError::Empty) => None,
                Err(crossbeam::channel::TryRecvError::Disconnected) => return,
            }
        } else if streaming {
            // Ring full, gate closed or nothing decoded: pace the loop.
            match commands.recv_timeout(IDLE_POLL) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => return,
            }
        };

        if let Some(command) = command {
            match command {
                Command::Enable(ack) => {
                    enabled = true;
                    let _ = ack.send(());
                }
                Command::Disable(ack) => {
                    enabled = false;
                    let _ = ack.send(());
                }
                Command::SetPosition(position) => {
                    decoder.set_position(position);
                    staged.clear();
                    finished = false;
                    frames_pushed = (decoder.current_position() * rate as f32) as u64;
                    position_ms.store(
                        (frames_pushed * 1000 / rate) as u32,
                        Ordering::Relaxed,
                    );
                }
                Command::Terminate => return,
            }
            made_progress = true;
            continue;
        }

        if !(enabled && !finished) {
            continue;
        }

        if staged.is_empty() {
            match decoder.decode(&mut chunk) {
                DecodeOutcome::Samples(count) => {
                    if upmix {
                        staged.reserve(count * 2);
                        for &sample in &chunk[..count] {
                            staged.push(sample);
                            staged.push(sample);
                        }
                    } else {
                        staged.extend_from_slice(&chunk[..count]);
                    }
                }
                DecodeOutcome::EndOfFile => {
                    info!(
                        "{}: end of file after {} frames",
                        "AUDIO_DECODE".cyan(),
                        frames_pushed
                    );
                    finished = true;
                    on_event(DecoderEvent::EndOfFile);
                    continue;
                }
                DecodeOutcome::FileDeleted => {
                    warn!(
                        "{}: source file deleted mid-stream",
                        "AUDIO_DECODE".cyan()
                    );
                    finished = true;
                    on_event(DecoderEvent::FileDeleted);
                    continue;
                }
            }
        }

        if gate.is_enabled() && !staged.is_empty() {
            let written = writer.write(&staged);
            staged.drain(..written);
            frames_pushed += written as u64 / out_channels;
            position_ms.store((frames_pushed * 1000 / rate) as u32, Ordering::Relaxed);
            made_progress = written > 0;
            if made_progress {
                audio_debug!("decode worker pushed {} samples", written);
            }
        } else {
            made_progress = false;
        }
    }
}
