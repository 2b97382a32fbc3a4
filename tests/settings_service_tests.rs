use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pocket_audio::audio::encoder::{Encoder, EncoderFormat};
use pocket_audio::audio::profile;
use pocket_audio::audio::types::{db_path, PlaybackType, Setting, Token};
use pocket_audio::audio::AudioState;
use pocket_audio::db::{default_audio_settings, MemorySettings, SettingsDatabase, SettingsStore};
use pocket_audio::service::{AudioRequest, AudioResponse, AudioService, ServiceNotification};
use pocket_audio::RetCode;

/// A WAV long enough that playback stays live for the whole test; the
/// decoding worker saturates the stream well before end-of-file.
fn make_wav(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    make_wav_with_samples(dir, name, 200_000)
}

/// A WAV the decoding worker runs dry almost immediately
fn make_short_wav(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    make_wav_with_samples(dir, name, 1_600)
}

fn make_wav_with_samples(dir: &tempfile::TempDir, name: &str, samples: usize) -> PathBuf {
    let path = dir.path().join(name);
    let mut encoder = Encoder::create(
        &path,
        EncoderFormat {
            channels: 1,
            sample_rate: 8_000,
            bit_depth: 16,
        },
    )
    .unwrap();
    encoder.encode(&vec![0.1f32; samples]);
    encoder.finalize();
    path
}

fn seeded_service(input_count: usize) -> (
    AudioService,
    tokio::sync::mpsc::UnboundedReceiver<ServiceNotification>,
    Arc<MemorySettings>,
) {
    let settings = Arc::new(MemorySettings::with_entries(default_audio_settings()));
    let (service, outbound) = AudioService::new(settings.clone(), input_count);
    (service, outbound, settings)
}

fn start_token(response: AudioResponse) -> Token {
    match response {
        AudioResponse::Start { ret_code, token } => {
            assert_eq!(ret_code, RetCode::Success);
            assert!(token.is_valid());
            token
        }
        other => panic!("expected start response, got {:?}", other),
    }
}

#[cfg(test)]
mod db_path_tests {
    use super::*;

    #[test]
    fn test_idle_none_renders_empty() {
        assert_eq!(
            db_path(Setting::Volume, PlaybackType::None, profile::Type::Idle),
            ""
        );
    }

    #[test]
    fn test_full_and_partial_paths() {
        assert_eq!(
            db_path(
                Setting::Volume,
                PlaybackType::Multimedia,
                profile::Type::PlaybackLoudspeaker
            ),
            "audio/PlaybackLoudspeaker/Multimedia/Volume"
        );
        assert_eq!(
            db_path(
                Setting::Gain,
                PlaybackType::None,
                profile::Type::RecordingBuiltInMic
            ),
            "audio/RecordingBuiltInMic/Gain"
        );
        assert_eq!(
            db_path(
                Setting::EnableVibration,
                PlaybackType::CallRingtone,
                profile::Type::Idle
            ),
            "audio/CallRingtone/EnableVibration"
        );
    }
}

#[cfg(test)]
mod settings_db_tests {
    use super::*;

    #[test]
    fn test_sqlite_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db_file = dir.path().join("settings.db");

        tokio_test::block_on(async {
            let db = SettingsDatabase::new(&db_file).await.unwrap();
            db.seed_defaults().await.unwrap();

            let gain = db.get("audio/RecordingBuiltInMic/Gain").await.unwrap();
            assert_eq!(gain.as_deref(), Some("50"));

            db.set("audio/PlaybackLoudspeaker/Multimedia/Volume", "8")
                .await
                .unwrap();
            let volume = db
                .get("audio/PlaybackLoudspeaker/Multimedia/Volume")
                .await
                .unwrap();
            assert_eq!(volume.as_deref(), Some("8"));

            // Reseeding never clobbers user values.
            db.seed_defaults().await.unwrap();
            let volume = db
                .get("audio/PlaybackLoudspeaker/Multimedia/Volume")
                .await
                .unwrap();
            assert_eq!(volume.as_deref(), Some("8"));

            let snapshot = db.load_all().await.unwrap();
            assert_eq!(
                snapshot.get("audio/PlaybackLoudspeaker/Multimedia/Volume"),
                Some(&"8".to_string())
            );
            assert!(snapshot.len() >= default_audio_settings().len());
        });
    }
}

#[cfg(test)]
mod service_tests {
    use super::*;

    #[test]
    fn test_playback_admission_and_stop_by_token() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "music.wav");
        let (mut service, _outbound, _settings) = seeded_service(2);

        let token = start_token(service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::Multimedia,
        }));

        assert_eq!(service.mux().find_input(token), Some(0));
        assert_eq!(
            service.mux().input(0).audio().state(),
            AudioState::Playback
        );

        let response = service.handle(AudioRequest::Stop {
            token: Some(token),
            playback_types: vec![],
        });
        match response {
            AudioResponse::Stop { ret_code, tokens } => {
                assert_eq!(ret_code, RetCode::Success);
                assert_eq!(tokens, vec![token]);
            }
            other => panic!("unexpected response {:?}", other),
        }
        assert_eq!(service.mux().find_input(token), None);
        assert_eq!(service.mux().input(0).audio().state(), AudioState::Idle);
    }

    #[test]
    fn test_vibration_flag_fetched_at_admission() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "ring.wav");
        let (mut service, _outbound, _settings) = seeded_service(2);

        let token = start_token(service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::CallRingtone,
        }));
        let index = service.mux().find_input(token).unwrap();
        assert!(service.mux().input(index).is_vibration_on());

        service.handle(AudioRequest::Stop {
            token: Some(token),
            playback_types: vec![],
        });

        // Multimedia defaults to no vibration.
        let token = start_token(service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::Multimedia,
        }));
        let index = service.mux().find_input(token).unwrap();
        assert!(!service.mux().input(index).is_vibration_on());
    }

    #[test]
    fn test_merge_rejects_second_notification() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "notify.wav");
        let (mut service, _outbound, _settings) = seeded_service(2);

        start_token(service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::Notifications,
        }));

        let response = service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::Notifications,
        });
        match response {
            AudioResponse::Start { ret_code, token } => {
                assert_eq!(ret_code, RetCode::Failed);
                assert!(token.is_bad());
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_routing_preempts_and_announces_the_victim() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "music.wav");
        let (mut service, mut outbound, _settings) = seeded_service(2);

        let first = start_token(service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::Multimedia,
        }));
        let second = start_token(service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::Multimedia,
        }));
        assert_ne!(first, second);

        let routing = start_token(service.handle(AudioRequest::StartRouting));
        let routing_index = service.mux().find_input(routing).unwrap();
        assert_eq!(
            service.mux().input(routing_index).audio().state(),
            AudioState::Routing
        );

        // One of the two playbacks had to give way and was announced.
        let mut stopped = Vec::new();
        while let Ok(notification) = outbound.try_recv() {
            if let ServiceNotification::Stopped { token } = notification {
                stopped.push(token);
            }
        }
        assert_eq!(stopped.len(), 1);
        assert!(stopped[0] == first || stopped[0] == second);

        // A repeated routing request reuses the live call input.
        let again = start_token(service.handle(AudioRequest::StartRouting));
        assert_eq!(again, routing);
    }

    #[test]
    fn test_stop_by_playback_type_list() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "mixed.wav");
        let (mut service, _outbound, _settings) = seeded_service(2);

        // Keypad first: a lower-priority sound cannot be admitted past an
        // active higher-priority one.
        let keypad = start_token(service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::KeypadSound,
        }));
        let music = start_token(service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::Multimedia,
        }));

        let response = service.handle(AudioRequest::Stop {
            token: None,
            playback_types: vec![PlaybackType::KeypadSound],
        });
        match response {
            AudioResponse::Stop { tokens, .. } => assert_eq!(tokens, vec![keypad]),
            other => panic!("unexpected response {:?}", other),
        }
        assert!(service.mux().find_input(music).is_some());

        // An empty list stops everything still active.
        let response = service.handle(AudioRequest::Stop {
            token: None,
            playback_types: vec![],
        });
        match response {
            AudioResponse::Stop { tokens, .. } => assert_eq!(tokens, vec![music]),
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_pause_resume_by_token() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "pausable.wav");
        let (mut service, _outbound, _settings) = seeded_service(1);

        let token = start_token(service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::Multimedia,
        }));

        let response = service.handle(AudioRequest::Pause { token });
        assert!(matches!(
            response,
            AudioResponse::Result {
                ret_code: RetCode::Success
            }
        ));
        let response = service.handle(AudioRequest::Resume { token });
        assert!(matches!(
            response,
            AudioResponse::Result {
                ret_code: RetCode::Success
            }
        ));

        let response = service.handle(AudioRequest::Pause {
            token: Token::bad(),
        });
        assert!(matches!(
            response,
            AudioResponse::Result {
                ret_code: RetCode::TokenNotFound
            }
        ));
    }

    #[test]
    fn test_set_volume_persists_and_applies_live() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "volume.wav");
        let (mut service, _outbound, settings) = seeded_service(1);

        let token = start_token(service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::Multimedia,
        }));

        service.handle(AudioRequest::SetVolume {
            playback_type: PlaybackType::Multimedia,
            value: 42.0,
        });

        // Clamped before persisting and before reaching the device.
        assert_eq!(
            settings.get("audio/PlaybackLoudspeaker/Multimedia/Volume"),
            Some("10".to_string())
        );
        let index = service.mux().find_input(token).unwrap();
        assert_eq!(service.mux().input(index).audio().output_volume(), 10.0);
    }

    #[test]
    fn test_end_of_file_releases_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_short_wav(&dir, "short.wav");
        let (mut service, mut outbound, _settings) = seeded_service(1);

        let token = start_token(service.handle(AudioRequest::StartPlayback {
            file_name: wav.display().to_string(),
            playback_type: PlaybackType::Multimedia,
        }));

        // Wait for the decoding worker to run the short file dry, then let
        // the service react to the notification.
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut released = false;
        while Instant::now() < deadline {
            service.pump_notifications();
            if service.mux().find_input(token).is_none() {
                released = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(released, "input never released after end of file");

        // Outbound also carries device-creation notices; find the EOF.
        let mut eof_seen = false;
        while let Ok(notification) = outbound.try_recv() {
            if matches!(notification, ServiceNotification::EndOfFile { token: t } if t == token) {
                eof_seen = true;
            }
        }
        assert!(eof_seen, "end-of-file notification expected");
        assert_eq!(service.mux().input(0).audio().state(), AudioState::Idle);
    }

    #[test]
    fn test_settings_requests_round_trip() {
        let (mut service, _outbound, _settings) = seeded_service(1);

        let response = service.handle(AudioRequest::SetSetting {
            setting: Setting::Volume,
            playback_type: PlaybackType::Alarm,
            profile_type: profile::Type::PlaybackHeadphones,
            value: "9".to_string(),
        });
        assert!(matches!(
            response,
            AudioResponse::Result {
                ret_code: RetCode::Success
            }
        ));

        let response = service.handle(AudioRequest::GetSetting {
            setting: Setting::Volume,
            playback_type: PlaybackType::Alarm,
            profile_type: profile::Type::PlaybackHeadphones,
        });
        match response {
            AudioResponse::Setting { ret_code, value } => {
                assert_eq!(ret_code, RetCode::Success);
                assert_eq!(value.as_deref(), Some("9"));
            }
            other => panic!("unexpected response {:?}", other),
        }

        // The empty (Idle, None) path is not addressable.
        let response = service.handle(AudioRequest::GetSetting {
            setting: Setting::Volume,
            playback_type: PlaybackType::None,
            profile_type: profile::Type::Idle,
        });
        assert!(matches!(
            response,
            AudioResponse::Setting {
                ret_code: RetCode::Failed,
                value: None
            }
        ));
    }
}
