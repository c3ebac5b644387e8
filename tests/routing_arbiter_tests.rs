use codec_deck_lib::audio::platform::{DriverEvent, FakeDriver, PlatformConfig};
use codec_deck_lib::audio::routing::RoutingCore;
use codec_deck_lib::audio::*;
use std::sync::Arc;
use tokio_test;
use uuid::Uuid;

fn setup() -> (Arc<FakeDriver>, RoutingCore) {
    let driver = Arc::new(FakeDriver::new());
    let core = RoutingCore::new(Arc::new(PlatformConfig::default()), driver.clone());
    (driver, core)
}

fn usecase(id: UsecaseId, devices: DeviceMask) -> AudioUsecase {
    AudioUsecase::new(id, devices, Uuid::new_v4())
}

#[cfg(test)]
mod refcount_tests {
    use super::*;

    #[tokio::test]
    async fn test_shared_path_is_enabled_once_and_disabled_last() {
        let (driver, mut core) = setup();

        core.start_usecase(usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER))
            .await
            .expect("start deep buffer");
        core.start_usecase(usecase(UsecaseId::PlaybackLowLatency, DeviceMask::SPEAKER))
            .await
            .expect("start low latency");

        // Second user of the same path must not re-enable it
        assert_eq!(driver.enable_count(RoutePath::Speaker), 1);

        core.stop_usecase(UsecaseId::PlaybackDeepBuffer)
            .await
            .expect("stop deep buffer");
        assert_eq!(
            driver.enabled_paths(),
            vec![RoutePath::Speaker],
            "path must stay up while one user remains"
        );

        core.stop_usecase(UsecaseId::PlaybackLowLatency)
            .await
            .expect("stop low latency");
        assert!(driver.enabled_paths().is_empty());

        let disables = driver
            .events()
            .iter()
            .filter(|e| **e == DriverEvent::DisablePath(RoutePath::Speaker))
            .count();
        assert_eq!(disables, 1);
    }

    #[tokio::test]
    async fn test_rerouting_onto_the_current_route_touches_no_hardware() {
        let (driver, mut core) = setup();

        core.start_usecase(usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER))
            .await
            .expect("start playback");
        driver.clear_events();

        let changed = core
            .reroute_usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER)
            .await
            .expect("reroute");
        assert!(!changed);
        assert!(
            driver.events().is_empty(),
            "an unchanged route must not re-apply mixer controls"
        );
    }

    #[tokio::test]
    async fn test_stop_releases_only_the_stopped_usecases_paths() {
        let (driver, mut core) = setup();

        core.start_usecase(usecase(
            UsecaseId::PlaybackDeepBuffer,
            DeviceMask::WIRED_HEADPHONE,
        ))
        .await
        .expect("start playback");
        core.start_usecase(AudioUsecase::new_capture(
            UsecaseId::CaptureDefault,
            DeviceMask::BUILTIN_MIC,
            InputSource::Default,
            Uuid::new_v4(),
        ))
        .await
        .expect("start capture");

        core.stop_usecase(UsecaseId::PlaybackDeepBuffer)
            .await
            .expect("stop playback");

        assert_eq!(driver.enabled_paths(), vec![RoutePath::BuiltinMic]);
    }
}

#[cfg(test)]
mod conflict_sweep_tests {
    use super::*;

    #[tokio::test]
    async fn test_combo_arrival_moves_headphones_user_onto_the_shared_leg() {
        let (driver, mut core) = setup();

        core.start_usecase(usecase(
            UsecaseId::PlaybackDeepBuffer,
            DeviceMask::WIRED_HEADPHONE,
        ))
        .await
        .expect("start deep buffer");
        driver.clear_events();

        core.start_usecase(usecase(
            UsecaseId::PlaybackLowLatency,
            DeviceMask::SPEAKER | DeviceMask::WIRED_HEADPHONE,
        ))
        .await
        .expect("start combo playback");

        // Displaced user goes down before the combo comes up, then lands on
        // the combo's headphones leg
        assert_eq!(
            driver.events(),
            vec![
                DriverEvent::DisablePath(RoutePath::Headphones),
                DriverEvent::EnablePath(RoutePath::SpeakerAndHeadphones),
                DriverEvent::EnablePath(RoutePath::Headphones),
            ]
        );

        let (deep_out, _) = core
            .current_paths(UsecaseId::PlaybackDeepBuffer)
            .expect("deep buffer active");
        assert_eq!(deep_out, Some(RoutePath::Headphones));

        let (combo_out, _) = core
            .current_paths(UsecaseId::PlaybackLowLatency)
            .expect("low latency active");
        assert_eq!(combo_out, Some(RoutePath::SpeakerAndHeadphones));

        assert!(core.routes_consistent());
        assert_eq!(core.stats().forced_switches_total, 1);
    }

    #[tokio::test]
    async fn test_disjoint_backends_do_not_trigger_a_sweep() {
        let (driver, mut core) = setup();

        core.start_usecase(usecase(
            UsecaseId::PlaybackDeepBuffer,
            DeviceMask::WIRED_HEADPHONE,
        ))
        .await
        .expect("start headphones playback");
        driver.clear_events();

        core.start_usecase(usecase(UsecaseId::PlaybackLowLatency, DeviceMask::SPEAKER))
            .await
            .expect("start speaker playback");

        assert_eq!(
            driver.events(),
            vec![DriverEvent::EnablePath(RoutePath::Speaker)],
            "headphones and speaker live on different backends"
        );
        assert_eq!(core.stats().forced_switches_total, 0);
    }

    #[tokio::test]
    async fn test_displaced_move_failure_does_not_abort_the_arbitration() {
        let (driver, mut core) = setup();

        core.start_usecase(usecase(
            UsecaseId::PlaybackOffload,
            DeviceMask::WIRED_HEADPHONE,
        ))
        .await
        .expect("start offload playback");
        driver.fail_next_enable(
            RoutePath::Headphones,
            HalError::InvalidArgument("mixer rejected headphones".to_string()),
        );

        core.start_usecase(usecase(
            UsecaseId::PlaybackLowLatency,
            DeviceMask::SPEAKER | DeviceMask::WIRED_HEADPHONE,
        ))
        .await
        .expect("a failed displaced move must not abort the arriving usecase");

        let (combo_out, _) = core
            .current_paths(UsecaseId::PlaybackLowLatency)
            .expect("combo active");
        assert_eq!(combo_out, Some(RoutePath::SpeakerAndHeadphones));
        assert!(driver
            .enabled_paths()
            .contains(&RoutePath::SpeakerAndHeadphones));

        // The displaced usecase keeps its intended route; its stream learns
        // of the move on the next write and recovers through standby
        let (out, _) = core
            .current_paths(UsecaseId::PlaybackOffload)
            .expect("offload still registered");
        assert_eq!(out, Some(RoutePath::Headphones));
        assert_eq!(core.stats().forced_switches_total, 1);
    }

    #[tokio::test]
    async fn test_failed_enable_unwinds_the_registration() {
        let (driver, mut core) = setup();
        driver.fail_next_enable(
            RoutePath::Speaker,
            HalError::InvalidArgument("amp refused speaker".to_string()),
        );

        let err = core
            .start_usecase(usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER))
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());

        // The failed start leaves nothing behind
        assert!(core.active_usecases().is_empty());
        assert!(driver.enabled_paths().is_empty());
        assert!(core.stats().active_paths.is_empty());

        // and the same usecase can come up cleanly afterwards
        core.start_usecase(usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER))
            .await
            .expect("retry after a failed enable");
        assert!(driver.enabled_paths().contains(&RoutePath::Speaker));
    }
}

#[cfg(test)]
mod voice_tests {
    use super::*;

    fn call(devices: DeviceMask) -> AudioUsecase {
        usecase(UsecaseId::VoiceCall, devices)
    }

    #[tokio::test]
    async fn test_call_reroute_wraps_every_move_in_sidetone_toggles() {
        let (driver, mut core) = setup();
        core.set_call_mode(CallMode::InCall);
        core.start_usecase(call(DeviceMask::EARPIECE | DeviceMask::BUILTIN_MIC))
            .await
            .expect("start call");
        driver.clear_events();

        let changed = core
            .reroute_usecase(
                UsecaseId::VoiceCall,
                DeviceMask::WIRED_HEADSET | DeviceMask::HEADSET_MIC,
            )
            .await
            .expect("reroute call");
        assert!(changed);

        assert_eq!(
            driver.events(),
            vec![
                DriverEvent::Sidetone(false),
                DriverEvent::DisablePath(RoutePath::VoiceHandset),
                DriverEvent::EnablePath(RoutePath::VoiceHeadphones),
                DriverEvent::Sidetone(true),
                DriverEvent::Sidetone(false),
                DriverEvent::DisablePath(RoutePath::BuiltinMic),
                DriverEvent::EnablePath(RoutePath::HeadsetMic),
                DriverEvent::Sidetone(true),
            ]
        );
    }

    #[tokio::test]
    async fn test_call_to_bluetooth_drags_inherited_playback_off_its_route() {
        let (driver, mut core) = setup();
        core.set_call_mode(CallMode::InCall);
        core.start_usecase(call(DeviceMask::EARPIECE | DeviceMask::BUILTIN_MIC))
            .await
            .expect("start call");

        let playback = usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER);
        let playback_stream = playback.stream_id;
        core.start_usecase(playback).await.expect("start playback");

        let (out, _) = core
            .current_paths(UsecaseId::PlaybackDeepBuffer)
            .expect("playback active");
        assert_eq!(out, Some(RoutePath::VoiceHandset), "playback rides the call");
        assert_eq!(driver.enable_count(RoutePath::VoiceHandset), 1);

        core.reroute_usecase(
            UsecaseId::VoiceCall,
            DeviceMask::BLUETOOTH_SCO | DeviceMask::BLUETOOTH_SCO_MIC,
        )
        .await
        .expect("move call to bluetooth");

        let (call_out, call_in) = core
            .current_paths(UsecaseId::VoiceCall)
            .expect("call active");
        assert_eq!(call_out, Some(RoutePath::VoiceBtSco));
        assert_eq!(call_in, Some(RoutePath::BtScoMic));

        // The codec route the playback inherited is gone; it re-selects on
        // its own, landing on the voice speaker path while the call is up
        let (out, _) = core
            .current_paths(UsecaseId::PlaybackDeepBuffer)
            .expect("playback active");
        assert_eq!(out, Some(RoutePath::VoiceSpeaker));
        assert!(!driver
            .enabled_paths()
            .contains(&RoutePath::VoiceHandset));
        assert!(core.take_rerouted(playback_stream));
        assert!(core.routes_consistent());
    }

    #[tokio::test]
    async fn test_capture_during_call_shares_the_call_mic_route() {
        let (driver, mut core) = setup();
        core.set_call_mode(CallMode::InCall);
        core.start_usecase(call(DeviceMask::EARPIECE | DeviceMask::BUILTIN_MIC))
            .await
            .expect("start call");

        core.start_usecase(AudioUsecase::new_capture(
            UsecaseId::CaptureDefault,
            DeviceMask::BUILTIN_MIC,
            InputSource::Default,
            Uuid::new_v4(),
        ))
        .await
        .expect("start capture");

        let (_, cap_in) = core
            .current_paths(UsecaseId::CaptureDefault)
            .expect("capture active");
        let (_, call_in) = core.current_paths(UsecaseId::VoiceCall).expect("call");
        assert_eq!(cap_in, call_in);
        assert_eq!(driver.enable_count(RoutePath::BuiltinMic), 1);

        // Call teardown must not rip the mic from under the capture stream
        core.stop_usecase(UsecaseId::VoiceCall)
            .await
            .expect("stop call");
        assert!(driver.enabled_paths().contains(&RoutePath::BuiltinMic));
    }

    #[tokio::test]
    async fn test_bt_call_capture_keeps_its_own_mic() {
        let (_driver, mut core) = setup();
        core.set_call_mode(CallMode::InCall);
        core.start_usecase(call(
            DeviceMask::BLUETOOTH_SCO | DeviceMask::BLUETOOTH_SCO_MIC,
        ))
        .await
        .expect("start bt call");

        core.start_usecase(AudioUsecase::new_capture(
            UsecaseId::CaptureDefault,
            DeviceMask::BUILTIN_MIC,
            InputSource::Default,
            Uuid::new_v4(),
        ))
        .await
        .expect("start capture");

        // The call's mic lives on the headset; a builtin-mic capture has no
        // codec overlap with it and must not record from the headset
        let (_, cap_in) = core
            .current_paths(UsecaseId::CaptureDefault)
            .expect("capture active");
        assert_eq!(cap_in, Some(RoutePath::BuiltinMic));
        assert!(core.routes_consistent());
    }

    #[tokio::test]
    async fn test_media_on_bluetooth_joins_a_live_bt_call() {
        let (driver, mut core) = setup();
        core.set_call_mode(CallMode::InCall);
        core.start_usecase(call(
            DeviceMask::BLUETOOTH_SCO | DeviceMask::BLUETOOTH_SCO_MIC,
        ))
        .await
        .expect("start bt call");

        core.start_usecase(usecase(
            UsecaseId::PlaybackDeepBuffer,
            DeviceMask::BLUETOOTH_SCO,
        ))
        .await
        .expect("start bt playback");

        // The call keeps its voice path and the media stream joins it; no
        // forced switch and no second enable of the BT link
        let (call_out, _) = core.current_paths(UsecaseId::VoiceCall).expect("call");
        assert_eq!(call_out, Some(RoutePath::VoiceBtSco));
        let (media_out, _) = core
            .current_paths(UsecaseId::PlaybackDeepBuffer)
            .expect("playback active");
        assert_eq!(media_out, Some(RoutePath::VoiceBtSco));
        assert_eq!(core.stats().forced_switches_total, 0);
        assert_eq!(driver.enable_count(RoutePath::VoiceBtSco), 1);
    }

    #[tokio::test]
    async fn test_call_input_move_drags_the_capture_that_followed_it() {
        let (_driver, mut core) = setup();
        core.set_call_mode(CallMode::InCall);
        core.start_usecase(call(DeviceMask::WIRED_HEADSET | DeviceMask::HEADSET_MIC))
            .await
            .expect("start headset call");

        core.start_usecase(AudioUsecase::new_capture(
            UsecaseId::CaptureDefault,
            DeviceMask::BUILTIN_MIC,
            InputSource::Default,
            Uuid::new_v4(),
        ))
        .await
        .expect("start capture");

        let (_, cap_in) = core
            .current_paths(UsecaseId::CaptureDefault)
            .expect("capture active");
        assert_eq!(cap_in, Some(RoutePath::HeadsetMic), "capture rides the call mic");

        core.reroute_usecase(
            UsecaseId::VoiceCall,
            DeviceMask::BLUETOOTH_SCO | DeviceMask::BLUETOOTH_SCO_MIC,
        )
        .await
        .expect("move call to bluetooth");

        // The call mic is gone; the capture falls back to its own device
        let (_, cap_in) = core
            .current_paths(UsecaseId::CaptureDefault)
            .expect("capture active");
        assert_eq!(cap_in, Some(RoutePath::BuiltinMic));
        assert!(core.routes_consistent());
    }
}

#[cfg(test)]
mod mode_flip_tests {
    use super::*;

    #[tokio::test]
    async fn test_tty_mode_flip_rewires_a_live_call() {
        let (_driver, mut core) = setup();
        core.set_call_mode(CallMode::InCall);
        core.set_tty_mode(TtyMode::Full).await.expect("set tty");

        core.start_usecase(AudioUsecase::new(
            UsecaseId::VoiceCall,
            DeviceMask::WIRED_HEADSET | DeviceMask::HEADSET_MIC,
            Uuid::new_v4(),
        ))
        .await
        .expect("start tty call");

        let (out, _) = core.current_paths(UsecaseId::VoiceCall).expect("call");
        assert_eq!(out, Some(RoutePath::VoiceTtyFullHeadphones));

        core.set_tty_mode(TtyMode::Off).await.expect("clear tty");
        let (out, in_path) = core.current_paths(UsecaseId::VoiceCall).expect("call");
        assert_eq!(out, Some(RoutePath::VoiceHeadphones));
        assert_eq!(in_path, Some(RoutePath::HeadsetMic));
        assert!(core.routes_consistent());
    }

    #[tokio::test]
    async fn test_bt_wideband_flip_moves_call_and_mic_together() {
        let (_driver, mut core) = setup();
        core.set_call_mode(CallMode::InCall);
        core.start_usecase(AudioUsecase::new(
            UsecaseId::VoiceCall,
            DeviceMask::BLUETOOTH_SCO | DeviceMask::BLUETOOTH_SCO_MIC,
            Uuid::new_v4(),
        ))
        .await
        .expect("start bt call");

        core.set_bt_wideband(true).await.expect("enable wideband");

        let (out, in_path) = core.current_paths(UsecaseId::VoiceCall).expect("call");
        assert_eq!(out, Some(RoutePath::VoiceBtScoWb));
        assert_eq!(in_path, Some(RoutePath::BtScoMicWb));
    }

    #[tokio::test]
    async fn test_speaker_swap_reroutes_active_speaker_playback() {
        let (driver, mut core) = setup();
        core.start_usecase(usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER))
            .await
            .expect("start playback");

        core.set_speaker_swapped(true).await.expect("swap");

        assert_eq!(driver.enabled_paths(), vec![RoutePath::SpeakerReverse]);
        core.set_speaker_swapped(false).await.expect("unswap");
        assert_eq!(driver.enabled_paths(), vec![RoutePath::Speaker]);
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_device_set_leaves_no_trace() {
        let (driver, mut core) = setup();

        let err = core
            .start_usecase(AudioUsecase::new_capture(
                UsecaseId::CaptureDefault,
                DeviceMask::HDMI,
                InputSource::Default,
                Uuid::new_v4(),
            ))
            .await
            .expect_err("hdmi is not a capture device");
        assert!(err.is_invalid_argument());
        assert!(core.active_usecases().is_empty());
        assert!(driver.events().is_empty());
    }

    #[tokio::test]
    async fn test_over_full_device_mask_leaves_no_trace() {
        let (driver, mut core) = setup();

        let err = core
            .start_usecase(usecase(
                UsecaseId::PlaybackDeepBuffer,
                DeviceMask::SPEAKER | DeviceMask::WIRED_HEADPHONE | DeviceMask::HDMI,
            ))
            .await
            .expect_err("three output devices have no path");
        assert!(err.is_invalid_argument());
        assert!(core.active_usecases().is_empty());
        assert!(driver.events().is_empty());
    }

    #[tokio::test]
    async fn test_path_missing_from_config_is_rejected() {
        let driver = Arc::new(FakeDriver::new());
        let mut config = PlatformConfig::default();
        config.paths.retain(|p| p.path != RoutePath::Hdmi);
        let mut core = RoutingCore::new(Arc::new(config), driver.clone());

        let err = core
            .start_usecase(usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::HDMI))
            .await
            .expect_err("hdmi path was removed from the board config");
        assert!(matches!(err, HalError::UnconfiguredPath { .. }));
        assert!(core.active_usecases().is_empty());
        assert!(driver.events().is_empty());
    }

    #[tokio::test]
    async fn test_voice_volume_range_is_enforced() {
        let (_driver, mut core) = setup();
        assert!(core.set_voice_volume(0.7).await.is_ok());
        assert!(core.set_voice_volume(1.3).await.is_err());
        assert!(core.set_voice_volume(-0.1).await.is_err());
        assert!(core.set_voice_volume(f32::NAN).await.is_err());
    }
}
