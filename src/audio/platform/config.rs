// Platform configuration tables
//
// This module defines the static description of the codec the server routes
// on: which hardware interface(s) each routing path is carried over, which
// device combinations collapse into combo paths, and which logical devices
// ride the shared codec backend. The conflict map and the device selection
// function are both built from this table at server construction time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::audio::types::{DeviceMask, RoutePath};

/// One routing path and the hardware interface(s) it drives.
///
/// An empty backend list means the path rides the primary interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSpec {
    pub path: RoutePath,
    #[serde(default)]
    pub backends: Vec<String>,
}

/// A two-device combination served by a single combo path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboSpec {
    /// Exactly two output device bits
    pub devices: DeviceMask,
    /// The combo path selected for this pair
    pub path: RoutePath,
    /// The per-device legs the combo splits into
    pub split: (RoutePath, RoutePath),
}

/// Full platform description consumed at server construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Hardware card id reported in status events
    pub card: u32,
    /// Interface name assumed for paths with no explicit backend entry
    pub primary_backend: String,
    /// Routing paths this platform defines; paths absent from this table
    /// are rejected by the arbiter as invalid
    pub paths: Vec<PathSpec>,
    /// Known two-device combo paths, checked before any single-device table
    pub combos: Vec<ComboSpec>,
    /// Logical devices carried on the shared codec backend, both
    /// directions; voice-path inheritance applies per direction, only when
    /// the call and the rider both overlap this set
    pub codec_shared_devices: DeviceMask,
    /// Bounded endpoint-open retry budget
    pub open_retry_count: u32,
    /// Delay between endpoint-open retries
    pub open_retry_delay_ms: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        use RoutePath::*;

        let spec = |path: RoutePath, backends: &[&str]| PathSpec {
            path,
            backends: backends.iter().map(|s| s.to_string()).collect(),
        };

        Self {
            card: 0,
            primary_backend: "codec-rx".to_string(),
            paths: vec![
                // Media output: handset/speaker family shares the primary
                // codec interface, the jack family its own, HDMI and BT theirs
                spec(Handset, &["codec-rx"]),
                spec(Speaker, &["codec-rx"]),
                spec(SpeakerReverse, &["codec-rx"]),
                spec(Dock, &["codec-rx"]),
                spec(Headphones, &["headphones-rx"]),
                spec(Line, &["headphones-rx"]),
                spec(SpeakerAndHeadphones, &["codec-rx", "headphones-rx"]),
                spec(SpeakerAndHdmi, &["codec-rx", "hdmi-rx"]),
                spec(SpeakerAndLine, &["codec-rx", "headphones-rx"]),
                spec(Hdmi, &["hdmi-rx"]),
                spec(BtSco, &["bt-sco-rx"]),
                spec(BtScoWb, &["bt-sco-rx"]),
                // Voice output variants land on the same interfaces as their
                // media counterparts
                spec(VoiceHandset, &["codec-rx"]),
                spec(VoiceSpeaker, &["codec-rx"]),
                spec(VoiceHeadphones, &["headphones-rx"]),
                spec(VoiceLine, &["headphones-rx"]),
                spec(VoiceBtSco, &["bt-sco-rx"]),
                spec(VoiceBtScoWb, &["bt-sco-rx"]),
                spec(VoiceTtyFullHeadphones, &["headphones-rx"]),
                spec(VoiceTtyVcoHeadphones, &["headphones-rx"]),
                spec(VoiceTtyHcoHandset, &["codec-rx"]),
                // Capture
                spec(BuiltinMic, &["codec-tx"]),
                spec(HeadsetMic, &["codec-tx"]),
                spec(VoiceRecMic, &["codec-tx"]),
                spec(CamcorderMic, &["codec-tx"]),
                spec(VoiceCommMic, &["codec-tx"]),
                spec(BtScoMic, &["bt-sco-tx"]),
                spec(BtScoMicWb, &["bt-sco-tx"]),
            ],
            combos: vec![
                ComboSpec {
                    devices: DeviceMask::SPEAKER | DeviceMask::WIRED_HEADPHONE,
                    path: SpeakerAndHeadphones,
                    split: (Speaker, Headphones),
                },
                ComboSpec {
                    devices: DeviceMask::SPEAKER | DeviceMask::WIRED_HEADSET,
                    path: SpeakerAndHeadphones,
                    split: (Speaker, Headphones),
                },
                ComboSpec {
                    devices: DeviceMask::SPEAKER | DeviceMask::HDMI,
                    path: SpeakerAndHdmi,
                    split: (Speaker, Hdmi),
                },
                ComboSpec {
                    devices: DeviceMask::SPEAKER | DeviceMask::LINE,
                    path: SpeakerAndLine,
                    split: (Speaker, Line),
                },
            ],
            codec_shared_devices: DeviceMask::EARPIECE
                | DeviceMask::SPEAKER
                | DeviceMask::WIRED_HEADSET
                | DeviceMask::WIRED_HEADPHONE
                | DeviceMask::LINE
                | DeviceMask::DOCK
                | DeviceMask::BUILTIN_MIC
                | DeviceMask::HEADSET_MIC,
            open_retry_count: 3,
            open_retry_delay_ms: 20,
        }
    }
}

impl PlatformConfig {
    /// Load a platform configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read platform config: {}", path.display()))?;
        let config: PlatformConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse platform config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency of the tables
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashSet<RoutePath> = HashSet::new();
        for spec in &self.paths {
            if !seen.insert(spec.path) {
                anyhow::bail!("Duplicate path entry in platform config: {}", spec.path);
            }
        }

        for combo in &self.combos {
            if combo.devices.output_count() != 2 {
                anyhow::bail!(
                    "Combo for path {} must name exactly two output devices",
                    combo.path
                );
            }
            for leg in [combo.path, combo.split.0, combo.split.1] {
                if !seen.contains(&leg) {
                    anyhow::bail!(
                        "Combo references path {} missing from the path table",
                        leg
                    );
                }
            }
        }

        Ok(())
    }

    /// Look up the combo path for a two-device mask, if the platform has one
    pub fn combo_for_devices(&self, devices: DeviceMask) -> Option<RoutePath> {
        self.combos
            .iter()
            .find(|combo| combo.devices == devices.outputs())
            .map(|combo| combo.path)
    }

    /// True when the mask touches the shared codec backend
    pub fn uses_codec_backend(&self, devices: DeviceMask) -> bool {
        devices.intersects(self.codec_shared_devices)
    }
}
