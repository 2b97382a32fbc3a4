// Bounded PCM stream and stream-connection control
//
// The ring buffer is the hand-off point between a decode/encode worker and
// the DMA/ISR side of a device. Connections gate whether samples flow; a
// disabled voice uplink keeps its cadence but carries silence, which is how
// call mute works without tearing the link down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

/// Default stream capacity in samples; several seconds of voice audio,
/// enough to decouple the worker from the consumer in tests.
pub const STREAM_CAPACITY_SAMPLES: usize = 256 * 1024;

/// Build a bounded sample stream, returning its two ends
pub fn audio_stream(capacity: usize) -> (StreamWriter, StreamReader) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (StreamWriter { producer }, StreamReader { consumer })
}

/// Producer end of a sample stream
pub struct StreamWriter {
    producer: Producer<f32>,
}

impl StreamWriter {
    /// Push as many samples as fit; returns how many were written
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let mut written = 0;
        for &sample in samples {
            if self.producer.push(sample).is_err() {
                break;
            }
            written += 1;
        }
        written
    }

    /// Free space in samples
    pub fn space(&self) -> usize {
        self.producer.slots()
    }
}

/// Consumer end of a sample stream
pub struct StreamReader {
    consumer: Consumer<f32>,
}

impl StreamReader {
    /// Pop up to `buf.len()` samples; returns how many were read
    pub fn read(&mut self, buf: &mut [f32]) -> usize {
        let mut read = 0;
        for slot in buf.iter_mut() {
            match self.consumer.pop() {
                Ok(sample) => {
                    *slot = sample;
                    read += 1;
                }
                Err(_) => break,
            }
        }
        read
    }

    /// Samples currently buffered
    pub fn available(&self) -> usize {
        self.consumer.slots()
    }
}

/// Shared enable flag between a connection and its pumping side
#[derive(Debug, Clone, Default)]
pub struct StreamGate(Arc<AtomicBool>);

impl StreamGate {
    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }
}

/// A source-to-sink wiring between two endpoints.
///
/// Created disabled; the owning operation enables it once both ends are
/// started. Disabling does not destroy the wiring.
#[derive(Debug)]
pub struct StreamConnection {
    gate: StreamGate,
}

impl StreamConnection {
    pub fn new() -> Self {
        Self {
            gate: StreamGate::default(),
        }
    }

    /// A clone of the gate for the pumping side
    pub fn gate(&self) -> StreamGate {
        self.gate.clone()
    }

    pub fn enable(&self) {
        self.gate.set(true);
    }

    pub fn disable(&self) {
        self.gate.set(false);
    }

    pub fn is_enabled(&self) -> bool {
        self.gate.is_enabled()
    }
}

impl Default for StreamConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_round_trip_and_backpressure() {
        let (mut writer, mut reader) = audio_stream(4);

        assert_eq!(writer.write(&[1.0, 2.0, 3.0, 4.0, 5.0]), 4);
        assert_eq!(writer.space(), 0);

        let mut buf = [0.0f32; 8];
        assert_eq!(reader.read(&mut buf), 4);
        assert_eq!(&buf[..4], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn test_connection_gate_is_shared() {
        let connection = StreamConnection::new();
        let gate = connection.gate();

        assert!(!gate.is_enabled());
        connection.enable();
        assert!(gate.is_enabled());
        connection.disable();
        assert!(!gate.is_enabled());
    }
}
