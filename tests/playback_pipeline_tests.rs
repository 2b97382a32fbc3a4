use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pocket_audio::audio::decoder::{DecodeOutcome, Decoder};
use pocket_audio::audio::devices::AudioDeviceFactory;
use pocket_audio::audio::encoder::{Encoder, EncoderFormat};
use pocket_audio::audio::operation::{
    self, AudioNotification, OperationDeps, RecorderOperation, State,
};
use pocket_audio::audio::{Audio, PlaybackType, Token};
use pocket_audio::db::MemorySettings;
use pocket_audio::RetCode;
use tokio::sync::mpsc::UnboundedReceiver;

const WAV_RATE: u32 = 8_000;
const WAV_SAMPLES: usize = 1_600; // 0.2 s of mono audio

fn test_deps() -> (OperationDeps, UnboundedReceiver<AudioNotification>) {
    pocket_audio::log::init_tracing();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let deps = OperationDeps {
        factory: Arc::new(AudioDeviceFactory::new()),
        settings: Arc::new(MemorySettings::new()),
        notifications: tx,
    };
    (deps, rx)
}

fn make_wav(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut encoder = Encoder::create(
        &path,
        EncoderFormat {
            channels: 1,
            sample_rate: WAV_RATE,
            bit_depth: 16,
        },
    )
    .unwrap();
    let samples: Vec<f32> = (0..WAV_SAMPLES)
        .map(|i| (i as f32 * 0.05).sin() * 0.5)
        .collect();
    assert!(encoder.encode(&samples) > 0);
    encoder.finalize();
    path
}

fn wait_for<F: FnMut() -> bool>(mut condition: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[cfg(test)]
mod decoder_tests {
    use super::*;

    #[test]
    fn test_decode_own_wav_to_end_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "decode.wav");

        let mut decoder = Decoder::open(&wav).unwrap();
        let format = decoder.source_format();
        assert_eq!(format.sample_rate, WAV_RATE);
        assert_eq!(format.channels, 1);

        let mut total = 0;
        let mut buf = vec![0.0f32; 512];
        loop {
            match decoder.decode(&mut buf) {
                DecodeOutcome::Samples(count) => total += count,
                DecodeOutcome::EndOfFile => break,
                DecodeOutcome::FileDeleted => panic!("file vanished during test"),
            }
        }
        assert_eq!(total, WAV_SAMPLES);
        assert!((decoder.current_position() - 0.2).abs() < 0.01);
    }

    #[test]
    fn test_seek_to_mid_stream() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "seek.wav");

        let mut decoder = Decoder::open(&wav).unwrap();
        decoder.set_position(0.5);
        assert!((decoder.current_position() - 0.1).abs() < 0.02);

        let mut remaining = 0;
        let mut buf = vec![0.0f32; 512];
        loop {
            match decoder.decode(&mut buf) {
                DecodeOutcome::Samples(count) => remaining += count,
                _ => break,
            }
        }
        // Roughly the second half of the file is left.
        assert!(remaining <= WAV_SAMPLES * 6 / 10, "remaining {}", remaining);
        assert!(remaining >= WAV_SAMPLES * 4 / 10, "remaining {}", remaining);
    }

    #[test]
    fn test_deleted_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "vanish.wav");

        let mut decoder = Decoder::open(&wav).unwrap();
        std::fs::remove_file(&wav).unwrap();

        let mut buf = vec![0.0f32; 64];
        assert_eq!(decoder.decode(&mut buf), DecodeOutcome::FileDeleted);
    }

    #[test]
    fn test_open_missing_and_garbage_files() {
        let dir = tempfile::tempdir().unwrap();

        assert!(Decoder::open(dir.path().join("missing.wav")).is_err());

        let garbage = dir.path().join("garbage.wav");
        std::fs::write(&garbage, b"definitely not audio").unwrap();
        assert!(Decoder::open(&garbage).is_err());
    }
}

#[cfg(test)]
mod playback_tests {
    use super::*;

    #[test]
    fn test_playback_reaches_end_of_file_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "eof.wav");
        let (deps, mut rx) = test_deps();
        let mut audio = Audio::with_deps(deps);

        let token = Token::uninitialized();
        let ret = audio.start(
            operation::Type::Playback,
            token,
            Some(wav.as_path()),
            PlaybackType::Multimedia,
        );
        assert_eq!(ret, RetCode::Success);

        let notified = wait_for(
            || matches!(rx.try_recv(), Ok(AudioNotification::EndOfFile { token: t }) if t == token),
            Duration::from_secs(5),
        );
        assert!(notified, "end-of-file notification never arrived");

        // The worker flipped the operation to idle with the full file
        // accounted for.
        assert_eq!(audio.operation_state(), State::Idle);
        assert!((audio.position_seconds() - 0.2).abs() < 0.05);

        assert_eq!(audio.stop(), RetCode::Success);
    }

    #[test]
    fn test_seek_on_parked_and_live_streams() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "seekable.wav");
        let (deps, _rx) = test_deps();
        let mut audio = Audio::with_deps(deps);

        let ret = audio.start(
            operation::Type::Playback,
            Token::uninitialized(),
            Some(wav.as_path()),
            PlaybackType::Multimedia,
        );
        assert_eq!(ret, RetCode::Success);

        // A live stream accepts seeks; non-seekable variants refuse them.
        assert_eq!(audio.operation_mut().set_position(0.5), RetCode::Success);

        audio.stop();
        assert_eq!(audio.operation_mut().set_position(0.0), RetCode::InvokedInIncorrectState);
    }

    #[test]
    fn test_stop_is_deterministic_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "teardown.wav");
        let (deps, mut rx) = test_deps();
        let mut audio = Audio::with_deps(deps);

        let ret = audio.start(
            operation::Type::Playback,
            Token::uninitialized(),
            Some(wav.as_path()),
            PlaybackType::Multimedia,
        );
        assert_eq!(ret, RetCode::Success);
        assert_eq!(audio.stop(), RetCode::Success);

        // Anything in the channel now was sent before stop returned (the
        // short file may have raced to its end). Nothing may arrive after.
        while rx.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err(), "notification after stop returned");
    }
}

#[cfg(test)]
mod recorder_tests {
    use super::*;

    #[test]
    fn test_recorder_encodes_pushed_capture() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("note.wav");
        let (deps, _rx) = test_deps();

        let mut recorder =
            RecorderOperation::create(&target, Token::uninitialized(), deps).unwrap();
        assert_eq!(recorder.start(), RetCode::Success);
        assert_eq!(recorder.state(), State::Active);

        let samples = vec![0.25f32; 4_000];
        assert_eq!(recorder.push_capture(&samples), samples.len());

        // 4000 mono samples at the built-in mic's 44.1 kHz rate land at the
        // 90 ms position mark once fully consumed.
        let encoded = wait_for(
            || recorder.position_seconds() >= 0.0899,
            Duration::from_secs(5),
        );
        assert!(encoded, "encoder never consumed the capture stream");

        assert_eq!(recorder.stop(), RetCode::Success);

        let bytes = std::fs::read(&target).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        let data_size = u32::from_le_bytes(bytes[40..44].try_into().unwrap()) as usize;
        assert_eq!(data_size, samples.len() * 2);
    }

    #[test]
    fn test_recorder_rejects_unsupported_container() {
        let dir = tempfile::tempdir().unwrap();
        let (deps, _rx) = test_deps();

        let err =
            RecorderOperation::create(&dir.path().join("note.ogg"), Token::uninitialized(), deps)
                .unwrap_err();
        assert_eq!(err.code, RetCode::InvalidFormat);
    }
}
