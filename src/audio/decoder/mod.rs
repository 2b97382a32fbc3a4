// Audio file decoder built on symphonia
//
// Streams PCM out of a backing file in any supported container (WAV, MP3,
// FLAC), tracking playback position and detecting end-of-stream as well as
// the file disappearing mid-stream (media removal, deletion by the user).

use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use tracing::{debug, warn};

use super::types::AudioFormat;

pub mod worker;

pub use worker::{DecoderEvent, DecoderWorker};

/// Failure to open a file for decoding
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("file does not exist or cannot be opened: {}", .0.display())]
    FileDoesntExist(PathBuf),
    #[error("unsupported or corrupt audio container")]
    InvalidFormat,
}

/// Outcome of one decode call
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Number of interleaved samples written into the caller's buffer
    Samples(usize),
    EndOfFile,
    FileDeleted,
}

/// Pull-based PCM decoder over one audio file
pub struct Decoder {
    path: PathBuf,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    source_format: AudioFormat,
    total_frames: Option<u64>,
    // Interleaved samples decoded past the caller's last buffer boundary.
    pending: Vec<f32>,
    samples_emitted: u64,
}

impl Decoder {
    /// Probe and open a file for decoding
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DecoderError> {
        let path = path.as_ref().to_path_buf();

        let file = std::fs::File::open(&path)
            .map_err(|_| DecoderError::FileDoesntExist(path.clone()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a probe hint using the file extension.
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|_| DecoderError::InvalidFormat)?;
        let reader = probed.format;

        // Find the first audio track with a known (decodeable) codec.
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecoderError::InvalidFormat)?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u32)
            .unwrap_or(2);
        let bit_width = track.codec_params.bits_per_sample.unwrap_or(16);
        let total_frames = track.codec_params.n_frames;

        let dec_opts: DecoderOptions = Default::default();
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &dec_opts)
            .map_err(|_| DecoderError::InvalidFormat)?;

        debug!(
            "Opened {} for decoding: {} Hz, {} ch",
            path.display(),
            sample_rate,
            channels
        );

        Ok(Self {
            path,
            reader,
            decoder,
            track_id,
            source_format: AudioFormat::new(sample_rate, bit_width, channels),
            total_frames,
            pending: Vec::new(),
            samples_emitted: 0,
        })
    }

    /// Format of the decoded stream before any downstream upmixing
    pub fn source_format(&self) -> AudioFormat {
        self.source_format
    }

    /// Fill `buf` with interleaved samples in the source channel layout
    pub fn decode(&mut self, buf: &mut [f32]) -> DecodeOutcome {
        if !self.path.exists() {
            return DecodeOutcome::FileDeleted;
        }

        let mut written = 0;

        while written < buf.len() && !self.pending.is_empty() {
            let take = (buf.len() - written).min(self.pending.len());
            buf[written..written + take].copy_from_slice(&self.pending[..take]);
            self.pending.drain(..take);
            written += take;
        }

        while written < buf.len() {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(err) => {
                    if !self.path.exists() {
                        return DecodeOutcome::FileDeleted;
                    }
                    warn!("Decode read error on {}: {}", self.path.display(), err);
                    break;
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut sample_buf =
                        SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    sample_buf.copy_interleaved_ref(decoded);
                    let samples = sample_buf.samples();

                    let take = (buf.len() - written).min(samples.len());
                    buf[written..written + take].copy_from_slice(&samples[..take]);
                    written += take;
                    self.pending.extend_from_slice(&samples[take..]);
                }
                // A malformed packet is skipped, not fatal.
                Err(SymphoniaError::DecodeError(err)) => {
                    warn!("Skipping bad packet in {}: {}", self.path.display(), err);
                    continue;
                }
                Err(_) => break,
            }
        }

        if written == 0 {
            DecodeOutcome::EndOfFile
        } else {
            self.samples_emitted += written as u64;
            DecodeOutcome::Samples(written)
        }
    }

    /// Seek to a relative position, 0.0 (start) to 1.0 (end)
    pub fn set_position(&mut self, position: f32) {
        let Some(total_frames) = self.total_frames else {
            warn!("Seek requested on a stream of unknown length");
            return;
        };

        let position = position.clamp(0.0, 1.0);
        let target_frame = (total_frames as f64 * position as f64) as u64;
        let seconds = target_frame as f64 / self.source_format.sample_rate.max(1) as f64;

        let seek = self.reader.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time: Time::from(seconds),
                track_id: Some(self.track_id),
            },
        );
        if let Err(err) = seek {
            warn!("Seek failed on {}: {}", self.path.display(), err);
            return;
        }

        self.decoder.reset();
        self.pending.clear();
        self.samples_emitted = target_frame * self.source_format.channels.max(1) as u64;
    }

    /// Current position in seconds of decoded output
    pub fn current_position(&self) -> f32 {
        let channels = self.source_format.channels.max(1) as u64;
        let rate = self.source_format.sample_rate.max(1) as u64;
        let frames = self.samples_emitted / channels;
        frames as f32 / rate as f32
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
