// Audio encoding for recordings
//
// Voice notes and call recordings are written as WAV containers. The
// `AudioEncoder` trait keeps the byte-level encoding behind a consistent
// interface; `Encoder` is the file-writing front the operations own,
// responsible for header finalization and for surfacing the
// file-system-full condition as a zero-bytes-written signal.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use super::types::RetCode;

pub mod worker;

pub use worker::EncoderWorker;

/// Stream parameters for an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderFormat {
    pub channels: u32,
    pub sample_rate: u32,
    pub bit_depth: u16,
}

/// Common interface for audio encoders
pub trait AudioEncoder: Send + std::fmt::Debug {
    /// Initialize the encoder with stream parameters
    fn initialize(&mut self, format: &EncoderFormat) -> Result<()>;

    /// Encode audio samples and return encoded data
    fn encode(&mut self, samples: &[f32]) -> Result<Vec<u8>>;

    /// Finalize encoding and return any remaining data
    fn finalize(&mut self) -> Result<Vec<u8>>;

    /// Get the file extension for this encoder
    fn file_extension(&self) -> &'static str;
}

/// WAV format encoder - uncompressed PCM
#[derive(Debug)]
pub struct WavEncoder {
    format: EncoderFormat,
    header_written: bool,
}

impl WavEncoder {
    pub fn new() -> Self {
        Self {
            format: EncoderFormat {
                channels: 0,
                sample_rate: 0,
                bit_depth: 0,
            },
            header_written: false,
        }
    }

    /// Generate a WAV header with placeholder sizes; the writer patches the
    /// RIFF and data chunk sizes at finalization
    fn generate_wav_header(&self) -> Vec<u8> {
        let sample_rate = self.format.sample_rate;
        let channels = self.format.channels as u16;
        let bit_depth = self.format.bit_depth;

        let byte_rate = sample_rate * channels as u32 * (bit_depth as u32 / 8);
        let block_align = channels * (bit_depth / 8);

        let mut header = Vec::with_capacity(44);

        // RIFF header
        header.extend_from_slice(b"RIFF");
        header.extend_from_slice(&[0, 0, 0, 0]); // File size placeholder
        header.extend_from_slice(b"WAVE");

        // fmt chunk
        header.extend_from_slice(b"fmt ");
        header.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
        header.extend_from_slice(&1u16.to_le_bytes()); // PCM format
        header.extend_from_slice(&channels.to_le_bytes());
        header.extend_from_slice(&sample_rate.to_le_bytes());
        header.extend_from_slice(&byte_rate.to_le_bytes());
        header.extend_from_slice(&block_align.to_le_bytes());
        header.extend_from_slice(&bit_depth.to_le_bytes());

        // data chunk header
        header.extend_from_slice(b"data");
        header.extend_from_slice(&[0, 0, 0, 0]); // Data size placeholder

        header
    }

    /// Convert f32 samples to 16-bit little-endian PCM
    fn convert_samples(&self, samples: &[f32]) -> Vec<u8> {
        let mut output = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            let sample_i16 = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
            output.extend_from_slice(&sample_i16.to_le_bytes());
        }
        output
    }
}

impl Default for WavEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEncoder for WavEncoder {
    fn initialize(&mut self, format: &EncoderFormat) -> Result<()> {
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(anyhow::anyhow!(
                "Invalid WAV stream parameters: {} ch, {} Hz",
                format.channels,
                format.sample_rate
            ));
        }

        self.format = EncoderFormat {
            bit_depth: 16,
            ..*format
        };
        self.header_written = false;

        info!(
            "WAV encoder initialized: {}Hz, {} channels, {} bit",
            self.format.sample_rate, self.format.channels, self.format.bit_depth
        );
        Ok(())
    }

    fn encode(&mut self, samples: &[f32]) -> Result<Vec<u8>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let mut output = Vec::new();

        // Write header on first encode call
        if !self.header_written {
            output.extend_from_slice(&self.generate_wav_header());
            self.header_written = true;
        }

        output.extend_from_slice(&self.convert_samples(samples));
        Ok(output)
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        // WAV needs no trailing data - the writer patches the header sizes.
        Ok(Vec::new())
    }

    fn file_extension(&self) -> &'static str {
        "wav"
    }
}

/// Encoder factory keyed on the target file extension
pub struct EncoderFactory;

impl EncoderFactory {
    /// Create an encoder for the target path
    pub fn create_encoder(path: &Path) -> Result<Box<dyn AudioEncoder>, RetCode> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "wav" => Ok(Box::new(WavEncoder::new())),
            _ => {
                warn!("No encoder for extension '{}'", extension);
                Err(RetCode::InvalidFormat)
            }
        }
    }

    /// Get list of supported recording formats
    pub fn supported_formats() -> Vec<&'static str> {
        vec!["wav"]
    }

    /// Check if a format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        Self::supported_formats().contains(&extension.to_lowercase().as_str())
    }
}

/// Default recording file name when the caller passes a directory
pub fn recording_file_name() -> String {
    format!("rec_{}.wav", Utc::now().format("%Y%m%d_%H%M%S"))
}

const WAV_HEADER_BYTES: u64 = 44;

/// File-writing encoder front owned by the recorder and router operations
pub struct Encoder {
    path: PathBuf,
    file: File,
    encoder: Box<dyn AudioEncoder>,
    format: EncoderFormat,
    samples_written: u64,
    bytes_written: u64,
}

impl Encoder {
    /// Create the target file and the encoder matching its extension.
    /// A directory target gets a timestamped default name.
    pub fn create<P: AsRef<Path>>(path: P, format: EncoderFormat) -> Result<Self, RetCode> {
        let mut path = path.as_ref().to_path_buf();
        if path.is_dir() {
            path = path.join(recording_file_name());
        }

        let mut encoder = EncoderFactory::create_encoder(&path)?;
        encoder.initialize(&format).map_err(|err| {
            warn!("Encoder init failed for {}: {}", path.display(), err);
            RetCode::InvalidFormat
        })?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|err| {
                warn!("Cannot create recording {}: {}", path.display(), err);
                RetCode::FileDoesntExist
            })?;

        info!("Recording to {}", path.display());

        Ok(Self {
            path,
            file,
            encoder,
            format,
            samples_written: 0,
            bytes_written: 0,
        })
    }

    /// Encode and write one buffer of samples. Returns the number of bytes
    /// written; zero signals the file system is full.
    pub fn encode(&mut self, samples: &[f32]) -> usize {
        let encoded = match self.encoder.encode(samples) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("Encode failed on {}: {}", self.path.display(), err);
                return 0;
            }
        };
        if encoded.is_empty() {
            return 0;
        }

        match self.file.write_all(&encoded) {
            Ok(()) => {
                self.samples_written += samples.len() as u64;
                self.bytes_written += encoded.len() as u64;
                encoded.len()
            }
            Err(err) => {
                warn!("Recording write failed on {}: {}", self.path.display(), err);
                0
            }
        }
    }

    /// Flush trailing encoder data and patch the WAV header sizes
    pub fn finalize(&mut self) {
        if let Ok(trailer) = self.encoder.finalize() {
            if !trailer.is_empty() && self.file.write_all(&trailer).is_ok() {
                self.bytes_written += trailer.len() as u64;
            }
        }

        let data_bytes = self.bytes_written.saturating_sub(WAV_HEADER_BYTES) as u32;
        let riff_bytes = data_bytes + (WAV_HEADER_BYTES as u32) - 8;

        let patch = self
            .file
            .seek(SeekFrom::Start(4))
            .and_then(|_| self.file.write_all(&riff_bytes.to_le_bytes()))
            .and_then(|_| self.file.seek(SeekFrom::Start(40)))
            .and_then(|_| self.file.write_all(&data_bytes.to_le_bytes()))
            .and_then(|_| self.file.flush());
        if let Err(err) = patch {
            warn!("Header finalize failed on {}: {}", self.path.display(), err);
        }
    }

    /// Seconds of audio written so far
    pub fn position_seconds(&self) -> f32 {
        let per_second = (self.format.sample_rate * self.format.channels).max(1) as f32;
        self.samples_written as f32 / per_second
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> EncoderFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_encoder_initialization() {
        let mut encoder = WavEncoder::new();
        let format = EncoderFormat {
            channels: 1,
            sample_rate: 16_000,
            bit_depth: 16,
        };

        assert!(encoder.initialize(&format).is_ok());
        assert_eq!(encoder.file_extension(), "wav");
    }

    #[test]
    fn test_wav_header_on_first_encode() {
        let mut encoder = WavEncoder::new();
        encoder
            .initialize(&EncoderFormat {
                channels: 2,
                sample_rate: 44_100,
                bit_depth: 16,
            })
            .unwrap();

        let first = encoder.encode(&[0.0, 0.5, -0.5, 1.0]).unwrap();
        assert_eq!(&first[..4], b"RIFF");
        assert_eq!(&first[8..12], b"WAVE");
        assert_eq!(first.len(), 44 + 4 * 2);

        let second = encoder.encode(&[0.0, 0.0]).unwrap();
        assert_eq!(second.len(), 2 * 2);
    }

    #[test]
    fn test_encoder_factory_by_extension() {
        assert!(EncoderFactory::create_encoder(Path::new("note.wav")).is_ok());
        assert_eq!(
            EncoderFactory::create_encoder(Path::new("note.ogg")).unwrap_err(),
            RetCode::InvalidFormat
        );
        assert!(EncoderFactory::is_format_supported("WAV"));
        assert!(!EncoderFactory::is_format_supported("mp3"));
    }

    #[test]
    fn test_encoder_writes_playable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        let format = EncoderFormat {
            channels: 1,
            sample_rate: 8_000,
            bit_depth: 16,
        };

        let mut encoder = Encoder::create(&path, format).unwrap();
        let written = encoder.encode(&vec![0.25f32; 800]);
        assert!(written > 0);
        encoder.finalize();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        let data_size = u32::from_le_bytes(bytes[40..44].try_into().unwrap());
        assert_eq!(data_size as usize, 800 * 2);
        assert!((encoder.position_seconds() - 0.1).abs() < 1e-6);
    }
}
