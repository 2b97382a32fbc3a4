// Encoding worker
//
// Mirror of the decoding worker for the capture direction: a dedicated
// thread drains PCM from the capture stream and feeds the file encoder.
// Zero bytes written by the encoder means the file system is full; the
// worker reports that upstream exactly once and stops consuming.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use colored::Colorize;
use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{info, warn};

use crate::audio::stream::{StreamGate, StreamReader};
use crate::audio::types::RetCode;
use crate::audio_debug;

use super::Encoder;

/// Callback invoked from the worker thread when the file system runs full
pub type StorageFullCallback = Box<dyn Fn() + Send>;

enum Command {
    Enable(Sender<()>),
    Disable(Sender<()>),
    Terminate,
}

const ENCODE_CHUNK_SAMPLES: usize = 1024;
const IDLE_POLL: Duration = Duration::from_millis(2);

/// Handle to the encoding thread
pub struct EncoderWorker {
    commands: Sender<Command>,
    handle: Option<JoinHandle<()>>,
    position_ms: Arc<AtomicU32>,
}

impl EncoderWorker {
    /// Spawn the worker over a created encoder. Samples are consumed from
    /// `reader` only while `gate` is enabled.
    pub fn spawn(
        encoder: Encoder,
        reader: StreamReader,
        gate: StreamGate,
        on_storage_full: StorageFullCallback,
    ) -> Result<Self, RetCode> {
        let (commands, command_rx) = unbounded();
        let position_ms = Arc::new(AtomicU32::new(0));
        let thread_position = Arc::clone(&position_ms);

        let handle = std::thread::Builder::new()
            .name("audio-encode".into())
            .spawn(move || run(encoder, reader, gate, command_rx, thread_position, on_storage_full))
            .map_err(|err| {
                warn!("Failed to spawn encoding worker: {}", err);
                RetCode::FailedToAllocateMemory
            })?;

        Ok(Self {
            commands,
            handle: Some(handle),
            position_ms,
        })
    }

    /// Start consuming samples; blocks until the worker acknowledges
    pub fn enable(&self) -> bool {
        self.handshake(Command::Enable)
    }

    /// Stop consuming samples; blocks until the worker acknowledges
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

    /// Seconds of audio encoded so far
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

impl Drop for EncoderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    mut encoder: Encoder,
    mut reader: StreamReader,
    gate: StreamGate,
    commands: Receiver<Command>,
    position_ms: Arc<AtomicU32>,
    on_storage_full: StorageFullCallback,
) {
    let mut chunk = vec![0.0f32; ENCODE_CHUNK_SAMPLES];
    let mut enabled = false;
    let mut failed = false;
    let mut made_progress = false;

    info!(
        "{}: encoding worker up for {}",
        "AUDIO_ENCODE".red(),
        encoder.path().display()
    );

    loop {
        let streaming = enabled && !failed;
        let command = if streaming && made_progress {
            match commands.try_recv() {
                Ok(command) => Some(command),
                Err(crossbeam::channel::TryRecvError::Empty) => None,
                Err(crossbeam::channel::TryRecvError::Disconnected) => break,
            }
        } else if streaming {
            match commands.recv_timeout(IDLE_POLL) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
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
                Command::Terminate => break,
            }
            made_progress = true;
            continue;
        }

        if !(enabled && !failed) {
            continue;
        }

        if !gate.is_enabled() {
            made_progress = false;
            continue;
        }

        let read = reader.read(&mut chunk);
        if read == 0 {
            made_progress = false;
            continue;
        }

        let bytes = encoder.encode(&chunk[..read]);
        if bytes == 0 {
            warn!("{}: file system full, recording stopped", "AUDIO_ENCODE".red());
            failed = true;
            on_storage_full();
            continue;
        }

        position_ms.store((encoder.position_seconds() * 1000.0) as u32, Ordering::Relaxed);
        made_progress = true;
        audio_debug!("encode worker wrote {} bytes", bytes);
    }

    // Drain loop exits only on terminate/disconnect; close the container.
    encoder.finalize();
}
