use std::path::{Path, PathBuf};
use std::sync::Arc;

use pocket_audio::audio::devices::AudioDeviceFactory;
use pocket_audio::audio::encoder::{Encoder, EncoderFormat};
use pocket_audio::audio::operation::{self, AudioNotification, Operation, OperationDeps, State};
use pocket_audio::audio::profile;
use pocket_audio::audio::{Audio, AudioState, DeviceState, Event, EventType, PlaybackType, Token};
use pocket_audio::db::MemorySettings;
use pocket_audio::RetCode;
use tokio::sync::mpsc::UnboundedReceiver;

fn test_audio() -> (Audio, UnboundedReceiver<AudioNotification>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let audio = Audio::with_deps(OperationDeps {
        factory: Arc::new(AudioDeviceFactory::new()),
        settings: Arc::new(MemorySettings::new()),
        notifications: tx,
    });
    (audio, rx)
}

/// A WAV long enough that the decoding worker saturates the stream and
/// never reaches end-of-file during the test; operation state therefore
/// stays where the test put it.
fn make_wav(dir: &tempfile::TempDir, name: &str) -> PathBuf {
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
    encoder.encode(&vec![0.1f32; 200_000]);
    encoder.finalize();
    path
}

fn jack(state: DeviceState) -> Event {
    Event::new(EventType::JackState, state)
}

fn a2dp(state: DeviceState) -> Event {
    Event::new(EventType::BluetoothA2dpDeviceState, state)
}

#[cfg(test)]
mod fallback_tests {
    use super::*;

    #[test]
    fn test_failed_start_falls_back_to_idle() {
        let (mut audio, _rx) = test_audio();

        let ret = audio.start(
            operation::Type::Playback,
            Token::uninitialized(),
            Some(Path::new("/no/such/file.wav")),
            PlaybackType::Multimedia,
        );

        assert_eq!(ret, RetCode::FileDoesntExist);
        assert_eq!(audio.state(), AudioState::Idle);
        assert!(matches!(audio.operation(), Operation::Idle(_)));

        // The fallback operation stays harmless.
        assert_eq!(audio.pause(), RetCode::Success);
        assert_eq!(audio.stop(), RetCode::Success);
        assert_eq!(audio.position_seconds(), 0.0);
    }

    #[test]
    fn test_missing_file_path_is_a_create_failure() {
        let (mut audio, _rx) = test_audio();

        let ret = audio.start(
            operation::Type::Playback,
            Token::uninitialized(),
            None,
            PlaybackType::Multimedia,
        );

        assert_eq!(ret, RetCode::OperationCreateFailed);
        assert_eq!(audio.state(), AudioState::Idle);
    }
}

#[cfg(test)]
mod clamp_tests {
    use super::*;

    #[test]
    fn test_volume_clamped_before_reaching_operation() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "clamp.wav");
        let (mut audio, _rx) = test_audio();

        let ret = audio.start(
            operation::Type::Playback,
            Token::uninitialized(),
            Some(wav.as_path()),
            PlaybackType::Multimedia,
        );
        assert_eq!(ret, RetCode::Success);

        assert_eq!(audio.set_output_volume(-5.0), RetCode::Success);
        assert_eq!(audio.output_volume(), 0.0);

        assert_eq!(audio.set_output_volume(50.0), RetCode::Success);
        assert_eq!(audio.output_volume(), 10.0);

        assert_eq!(audio.set_output_volume(7.0), RetCode::Success);
        assert_eq!(audio.output_volume(), 7.0);

        assert_eq!(audio.set_input_gain(150.0), RetCode::Success);
        assert_eq!(audio.input_gain(), 100.0);
        assert_eq!(audio.set_input_gain(-3.0), RetCode::Success);
        assert_eq!(audio.input_gain(), 0.0);
    }
}

#[cfg(test)]
mod connectivity_tests {
    use super::*;

    #[test]
    fn test_priority_playback_profile_follows_connectivity() {
        let (mut audio, _rx) = test_audio();

        // Nothing connected: the loudspeaker is the only option.
        assert_eq!(
            audio.priority_playback_profile(),
            profile::Type::PlaybackLoudspeaker
        );

        audio.send_event(&jack(DeviceState::Connected));
        assert_eq!(
            audio.priority_playback_profile(),
            profile::Type::PlaybackHeadphones
        );

        // Headphones outrank Bluetooth while both are present.
        audio.send_event(&a2dp(DeviceState::Connected));
        assert_eq!(
            audio.priority_playback_profile(),
            profile::Type::PlaybackHeadphones
        );

        audio.send_event(&jack(DeviceState::Disconnected));
        assert_eq!(
            audio.priority_playback_profile(),
            profile::Type::PlaybackBluetoothA2DP
        );
    }

    #[test]
    fn test_connectivity_survives_operation_switches() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "survive.wav");
        let (mut audio, _rx) = test_audio();

        audio.send_event(&jack(DeviceState::Connected));

        let ret = audio.start(
            operation::Type::Playback,
            Token::uninitialized(),
            Some(wav.as_path()),
            PlaybackType::Multimedia,
        );
        assert_eq!(ret, RetCode::Success);

        // The replayed jack state routed the new operation to headphones.
        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::PlaybackHeadphones
        );

        audio.stop();
        assert_eq!(
            audio.priority_playback_profile(),
            profile::Type::PlaybackHeadphones
        );
    }

    #[test]
    fn test_live_event_reroutes_playback() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "reroute.wav");
        let (mut audio, _rx) = test_audio();

        let ret = audio.start(
            operation::Type::Playback,
            Token::uninitialized(),
            Some(wav.as_path()),
            PlaybackType::Multimedia,
        );
        assert_eq!(ret, RetCode::Success);
        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::PlaybackLoudspeaker
        );

        audio.send_event(&jack(DeviceState::Connected));
        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::PlaybackHeadphones
        );
        assert_eq!(audio.operation_state(), State::Active);

        audio.send_event(&jack(DeviceState::Disconnected));
        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::PlaybackLoudspeaker
        );
    }

    #[test]
    fn test_ringtone_never_routes_to_a2dp() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "ringtone.wav");
        let (mut audio, _rx) = test_audio();

        audio.send_event(&a2dp(DeviceState::Connected));

        let ret = audio.start(
            operation::Type::Playback,
            Token::uninitialized(),
            Some(wav.as_path()),
            PlaybackType::CallRingtone,
        );
        assert_eq!(ret, RetCode::Success);
        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::PlaybackLoudspeaker
        );
    }
}

#[cfg(test)]
mod state_machine_tests {
    use super::*;

    #[test]
    fn test_pause_resume_guards() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "guards.wav");
        let (mut audio, _rx) = test_audio();

        let ret = audio.start(
            operation::Type::Playback,
            Token::uninitialized(),
            Some(wav.as_path()),
            PlaybackType::Multimedia,
        );
        assert_eq!(ret, RetCode::Success);
        assert_eq!(audio.operation_state(), State::Active);

        assert_eq!(audio.resume(), RetCode::InvokedInIncorrectState);

        assert_eq!(audio.pause(), RetCode::Success);
        assert_eq!(audio.operation_state(), State::Paused);
        assert_eq!(audio.pause(), RetCode::InvokedInIncorrectState);

        assert_eq!(audio.resume(), RetCode::Success);
        assert_eq!(audio.operation_state(), State::Active);

        assert_eq!(audio.stop(), RetCode::Success);
        assert_eq!(audio.state(), AudioState::Idle);
        // Stop from idle stays a harmless no-op.
        assert_eq!(audio.stop(), RetCode::Success);
    }

    #[test]
    fn test_restart_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let wav = make_wav(&dir, "restart.wav");
        let (mut audio, _rx) = test_audio();

        let ret = audio.start(
            operation::Type::Playback,
            Token::uninitialized(),
            Some(wav.as_path()),
            PlaybackType::Multimedia,
        );
        assert_eq!(ret, RetCode::Success);
        assert_eq!(audio.stop(), RetCode::Success);

        assert_eq!(audio.restart(), RetCode::Success);
        assert_eq!(audio.state(), AudioState::Playback);
        assert_eq!(audio.operation_state(), State::Active);
    }
}

#[cfg(test)]
mod router_tests {
    use super::*;

    fn start_router(audio: &mut Audio) {
        let ret = audio.start(
            operation::Type::Router,
            Token::uninitialized(),
            None,
            PlaybackType::None,
        );
        assert_eq!(ret, RetCode::Success);
        assert_eq!(audio.state(), AudioState::Routing);
    }

    #[test]
    fn test_call_defaults_to_earspeaker() {
        let (mut audio, _rx) = test_audio();
        start_router(&mut audio);

        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::RoutingEarspeaker
        );
        assert_eq!(audio.operation_state(), State::Active);
    }

    #[test]
    fn test_mute_disables_the_uplink_only() {
        let (mut audio, _rx) = test_audio();
        start_router(&mut audio);

        let uplink_enabled = |audio: &Audio| match audio.operation() {
            Operation::Router(router) => router.uplink_enabled(),
            _ => panic!("router operation expected"),
        };
        assert!(uplink_enabled(&audio));

        assert_eq!(audio.mute(), RetCode::Success);
        assert!(!uplink_enabled(&audio));
        assert_eq!(audio.operation_state(), State::Active);

        audio.send_event(&Event::control(EventType::CallUnmute));
        assert!(uplink_enabled(&audio));
    }

    #[test]
    fn test_forced_loudspeaker_overrides_earspeaker_and_headset() {
        let (mut audio, _rx) = test_audio();
        start_router(&mut audio);

        audio.send_event(&jack(DeviceState::Connected));
        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::RoutingHeadphones
        );

        audio.send_event(&Event::control(EventType::CallLoudspeakerOn));
        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::RoutingLoudspeaker
        );

        // Releasing the loudspeaker restores normal priority selection.
        audio.send_event(&Event::control(EventType::CallLoudspeakerOff));
        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::RoutingHeadphones
        );

        audio.send_event(&jack(DeviceState::Disconnected));
        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::RoutingEarspeaker
        );
    }

    #[test]
    fn test_bluetooth_headset_outranks_earspeaker() {
        let (mut audio, _rx) = test_audio();
        start_router(&mut audio);

        audio.send_event(&Event::new(
            EventType::BluetoothHfpDeviceState,
            DeviceState::Connected,
        ));
        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::RoutingBluetoothHFP
        );

        audio.send_event(&Event::new(
            EventType::BluetoothHfpDeviceState,
            DeviceState::Disconnected,
        ));
        assert_eq!(
            audio.operation().current_profile_type(),
            profile::Type::RoutingEarspeaker
        );
    }
}
