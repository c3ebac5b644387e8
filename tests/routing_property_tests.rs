// Random command sequences against the routing core. Whatever order
// usecases start, stop, retarget or flip device modes in, two things must
// hold afterwards: no two active usecases sit on conflicting paths, and
// the physically enabled paths are exactly the ones the registry accounts
// for.

use codec_deck_lib::audio::platform::{FakeDriver, PlatformConfig};
use codec_deck_lib::audio::routing::RoutingCore;
use codec_deck_lib::audio::*;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_test;
use uuid::Uuid;

const USECASES: [UsecaseId; 6] = [
    UsecaseId::PlaybackDeepBuffer,
    UsecaseId::PlaybackLowLatency,
    UsecaseId::PlaybackOffload,
    UsecaseId::CaptureDefault,
    UsecaseId::CaptureLowLatency,
    UsecaseId::VoiceCall,
];

fn playback_devices(i: usize) -> DeviceMask {
    let pool = [
        DeviceMask::SPEAKER,
        DeviceMask::WIRED_HEADPHONE,
        DeviceMask::EARPIECE,
        DeviceMask::HDMI,
        DeviceMask::SPEAKER | DeviceMask::HDMI,
        DeviceMask::SPEAKER | DeviceMask::WIRED_HEADPHONE,
        DeviceMask::BLUETOOTH_SCO,
        DeviceMask::DOCK,
        DeviceMask::LINE,
        DeviceMask::SPEAKER | DeviceMask::LINE,
    ];
    pool[i % pool.len()]
}

fn capture_devices(i: usize) -> DeviceMask {
    let pool = [
        DeviceMask::BUILTIN_MIC,
        DeviceMask::HEADSET_MIC,
        DeviceMask::BLUETOOTH_SCO_MIC,
    ];
    pool[i % pool.len()]
}

fn call_devices(i: usize) -> DeviceMask {
    let pool = [
        DeviceMask::EARPIECE | DeviceMask::BUILTIN_MIC,
        DeviceMask::SPEAKER | DeviceMask::BUILTIN_MIC,
        DeviceMask::WIRED_HEADSET | DeviceMask::HEADSET_MIC,
        DeviceMask::BLUETOOTH_SCO | DeviceMask::BLUETOOTH_SCO_MIC,
        DeviceMask::LINE | DeviceMask::BUILTIN_MIC,
    ];
    pool[i % pool.len()]
}

fn devices_for(id: UsecaseId, i: usize) -> DeviceMask {
    if id.kind().is_call() {
        call_devices(i)
    } else if id.kind().uses_input() {
        capture_devices(i)
    } else {
        playback_devices(i)
    }
}

#[derive(Debug, Clone)]
enum Op {
    Start(usize),
    Stop(usize),
    Reroute(usize, usize),
    CallMode(u8),
    Tty(u8),
    Wideband(bool),
    Swap(bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..30).prop_map(Op::Start),
        2 => (0usize..USECASES.len()).prop_map(Op::Stop),
        2 => ((0usize..USECASES.len()), (0usize..30)).prop_map(|(u, d)| Op::Reroute(u, d)),
        1 => (0u8..4).prop_map(Op::CallMode),
        1 => (0u8..4).prop_map(Op::Tty),
        1 => any::<bool>().prop_map(Op::Wideband),
        1 => any::<bool>().prop_map(Op::Swap),
    ]
}

async fn apply(core: &mut RoutingCore, op: &Op) {
    match op {
        Op::Start(i) => {
            let id = USECASES[i % USECASES.len()];
            let devices = devices_for(id, *i);
            let usecase = if id.kind().uses_input() && !id.kind().is_call() {
                AudioUsecase::new_capture(id, devices, InputSource::Default, Uuid::new_v4())
            } else {
                AudioUsecase::new(id, devices, Uuid::new_v4())
            };
            let _ = core.start_usecase(usecase).await;
        }
        Op::Stop(i) => {
            let _ = core.stop_usecase(USECASES[*i]).await;
        }
        Op::Reroute(u, d) => {
            let id = USECASES[*u];
            let _ = core.reroute_usecase(id, devices_for(id, *d)).await;
        }
        Op::CallMode(m) => {
            let mode = match m {
                0 => CallMode::Normal,
                1 => CallMode::Ringtone,
                2 => CallMode::InCall,
                _ => CallMode::InCommunication,
            };
            core.set_call_mode(mode);
        }
        Op::Tty(m) => {
            let mode = match m {
                0 => TtyMode::Off,
                1 => TtyMode::Full,
                2 => TtyMode::Vco,
                _ => TtyMode::Hco,
            };
            let _ = core.set_tty_mode(mode).await;
        }
        Op::Wideband(on) => {
            let _ = core.set_bt_wideband(*on).await;
        }
        Op::Swap(on) => {
            let _ = core.set_speaker_swapped(*on).await;
        }
    }
}

/// Path usage implied by the registry contents
fn expected_counts(core: &RoutingCore) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for usecase in core.active_usecases() {
        for path in [usecase.out_path, usecase.in_path].into_iter().flatten() {
            *counts.entry(path.name().to_string()).or_insert(0u32) += 1;
        }
    }
    counts
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn routes_stay_consistent_under_random_traffic(
        ops in prop::collection::vec(op_strategy(), 1..40)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        rt.block_on(async {
            let driver = Arc::new(FakeDriver::new());
            let mut core =
                RoutingCore::new(Arc::new(PlatformConfig::default()), driver.clone());

            for op in &ops {
                apply(&mut core, op).await;

                prop_assert!(
                    core.routes_consistent(),
                    "conflicting active paths after {:?}",
                    op
                );

                let expected = expected_counts(&core);
                let actual: HashMap<String, u32> =
                    core.stats().active_paths.into_iter().collect();
                prop_assert_eq!(
                    &expected, &actual,
                    "refcounts diverged from the registry after {:?}", op
                );

                let live: HashSet<String> = driver
                    .enabled_paths()
                    .iter()
                    .map(|p| p.name().to_string())
                    .collect();
                let wanted: HashSet<String> = expected.keys().cloned().collect();
                prop_assert_eq!(
                    &live, &wanted,
                    "hardware paths diverged from the registry after {:?}", op
                );
            }
            Ok(())
        })?;
    }

    #[test]
    fn teardown_always_reaches_zero(
        ops in prop::collection::vec(op_strategy(), 1..40)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        rt.block_on(async {
            let driver = Arc::new(FakeDriver::new());
            let mut core =
                RoutingCore::new(Arc::new(PlatformConfig::default()), driver.clone());

            for op in &ops {
                apply(&mut core, op).await;
            }
            for id in USECASES {
                let _ = core.stop_usecase(id).await;
            }

            prop_assert!(core.active_usecases().is_empty());
            prop_assert!(
                driver.enabled_paths().is_empty(),
                "orphaned hardware paths after full teardown"
            );
            Ok(())
        })?;
    }
}
