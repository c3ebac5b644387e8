// Device selection
//
// Pure functions mapping a usecase's requested device mask to a physical
// routing path. Resolution order for outputs: exact combo match, then the
// voice precedence table while a call is up, then the generic priority
// table. Capture paths follow the voice output during calls and the
// client's source type otherwise. Every result is checked against the
// platform's path table before it is returned.

use crate::audio::error::{HalError, Result};
use crate::audio::platform::PlatformConfig;
use crate::audio::types::{AudioUsecase, DeviceMask, InputSource, RoutePath, TtyMode};

/// Global device state the selection tables depend on
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionContext {
    /// A voice or HFP call currently occupies the codec; the arbiter sets
    /// this from its registry. While it is up, every usecase consults the
    /// voice precedence table before the media one.
    pub call_active: bool,
    pub tty_mode: TtyMode,
    pub bt_wideband: bool,
    pub speaker_swapped: bool,
}

/// Reject paths the platform does not define
fn ensure_configured(config: &PlatformConfig, path: RoutePath) -> Result<RoutePath> {
    if config.paths.iter().any(|spec| spec.path == path) {
        Ok(path)
    } else {
        Err(HalError::UnconfiguredPath { path })
    }
}

/// Pick the output path for a usecase
pub fn select_output_path(
    config: &PlatformConfig,
    usecase: &AudioUsecase,
    ctx: &SelectionContext,
) -> Result<RoutePath> {
    let outputs = usecase.requested_devices.outputs();
    if outputs.is_empty() {
        return Err(HalError::InvalidArgument(format!(
            "usecase {} requested no output device",
            usecase.id
        )));
    }

    // Combos outrank everything, including voice
    if outputs.bits().count_ones() == 2 {
        if let Some(combo) = config.combo_for_devices(outputs) {
            return ensure_configured(config, combo);
        }
    }
    if outputs.bits().count_ones() > 2 {
        return Err(HalError::InvalidArgument(format!(
            "usecase {} requested {} output devices with no combo path",
            usecase.id,
            outputs.bits().count_ones()
        )));
    }

    // While a call is up, everyone checks the voice table first; devices
    // the table does not know fall through to the media table
    let voice = if usecase.kind.is_call() || ctx.call_active {
        voice_output_for(outputs, ctx)
    } else {
        None
    };
    let path = voice.unwrap_or_else(|| media_output_for(outputs, ctx));
    ensure_configured(config, path)
}

fn voice_output_for(outputs: DeviceMask, ctx: &SelectionContext) -> Option<RoutePath> {
    if outputs.contains(DeviceMask::BLUETOOTH_SCO) {
        return Some(if ctx.bt_wideband {
            RoutePath::VoiceBtScoWb
        } else {
            RoutePath::VoiceBtSco
        });
    }

    // TTY accessories plug into the headset jack
    if ctx.tty_mode != TtyMode::Off && outputs.has_wired() {
        return Some(match ctx.tty_mode {
            TtyMode::Full => RoutePath::VoiceTtyFullHeadphones,
            TtyMode::Vco => RoutePath::VoiceTtyVcoHeadphones,
            TtyMode::Hco => RoutePath::VoiceTtyHcoHandset,
            TtyMode::Off => unreachable!(),
        });
    }

    if outputs.has_wired() {
        Some(RoutePath::VoiceHeadphones)
    } else if outputs.contains(DeviceMask::LINE) {
        Some(RoutePath::VoiceLine)
    } else if outputs.contains(DeviceMask::SPEAKER) {
        Some(RoutePath::VoiceSpeaker)
    } else if outputs.contains(DeviceMask::EARPIECE) {
        Some(RoutePath::VoiceHandset)
    } else {
        None
    }
}

fn media_output_for(outputs: DeviceMask, ctx: &SelectionContext) -> RoutePath {
    if outputs.has_wired() {
        RoutePath::Headphones
    } else if outputs.contains(DeviceMask::LINE) {
        RoutePath::Line
    } else if outputs.contains(DeviceMask::BLUETOOTH_SCO) {
        if ctx.bt_wideband {
            RoutePath::BtScoWb
        } else {
            RoutePath::BtSco
        }
    } else if outputs.contains(DeviceMask::HDMI) {
        RoutePath::Hdmi
    } else if outputs.contains(DeviceMask::DOCK) {
        RoutePath::Dock
    } else if outputs.contains(DeviceMask::SPEAKER) {
        if ctx.speaker_swapped {
            RoutePath::SpeakerReverse
        } else {
            RoutePath::Speaker
        }
    } else {
        RoutePath::Handset
    }
}

/// Pick the capture path for a usecase.
///
/// `voice_out` is the output path of the same usecase when it is a call;
/// call capture always mirrors the output side of the path.
pub fn select_input_path(
    config: &PlatformConfig,
    usecase: &AudioUsecase,
    voice_out: Option<RoutePath>,
    ctx: &SelectionContext,
) -> Result<RoutePath> {
    if let Some(out) = voice_out {
        return ensure_configured(config, call_input_for(out));
    }

    let path = match usecase.input_source {
        InputSource::VoiceRecognition => RoutePath::VoiceRecMic,
        InputSource::Camcorder => RoutePath::CamcorderMic,
        InputSource::VoiceCommunication => RoutePath::VoiceCommMic,
        InputSource::Default | InputSource::Mic => {
            let inputs = usecase.requested_devices.inputs();
            if inputs.is_empty() {
                return Err(HalError::InvalidArgument(format!(
                    "usecase {} requested no capture device",
                    usecase.id
                )));
            }
            if inputs.contains(DeviceMask::BLUETOOTH_SCO_MIC) {
                if ctx.bt_wideband {
                    RoutePath::BtScoMicWb
                } else {
                    RoutePath::BtScoMic
                }
            } else if inputs.contains(DeviceMask::HEADSET_MIC) {
                RoutePath::HeadsetMic
            } else {
                RoutePath::BuiltinMic
            }
        }
    };
    ensure_configured(config, path)
}

fn call_input_for(voice_out: RoutePath) -> RoutePath {
    use RoutePath::*;
    match voice_out {
        VoiceBtSco | BtSco => BtScoMic,
        VoiceBtScoWb | BtScoWb => BtScoMicWb,
        VoiceHeadphones | VoiceLine | VoiceTtyFullHeadphones | VoiceTtyHcoHandset => HeadsetMic,
        // VCO keeps the user on the handset mic while text goes to the jack
        VoiceTtyVcoHeadphones => BuiltinMic,
        _ => BuiltinMic,
    }
}
