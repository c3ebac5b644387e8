// Core data types for the usecase routing server
//
// This module contains the shared vocabulary of the routing core: usecase
// identifiers, logical device masks, physical routing paths, call/TTY modes
// and the registry entry type mutated by the arbiter.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

bitflags! {
    /// Logical device targets requested by a stream or call.
    ///
    /// Output bits occupy the low word, capture bits the high word so a
    /// single mask can describe a voice call (one of each direction).
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    #[derive(Serialize, Deserialize)]
    pub struct DeviceMask: u32 {
        const EARPIECE          = 1 << 0;
        const SPEAKER           = 1 << 1;
        const WIRED_HEADSET     = 1 << 2;  // headphone jack with mic
        const WIRED_HEADPHONE   = 1 << 3;  // headphone jack without mic
        const LINE              = 1 << 4;
        const BLUETOOTH_SCO     = 1 << 5;
        const HDMI              = 1 << 6;
        const DOCK              = 1 << 7;

        const BUILTIN_MIC       = 1 << 16;
        const HEADSET_MIC       = 1 << 17;
        const BLUETOOTH_SCO_MIC = 1 << 18;
    }
}

impl DeviceMask {
    /// Mask covering every output device bit
    pub fn all_outputs() -> Self {
        Self::EARPIECE
            | Self::SPEAKER
            | Self::WIRED_HEADSET
            | Self::WIRED_HEADPHONE
            | Self::LINE
            | Self::BLUETOOTH_SCO
            | Self::HDMI
            | Self::DOCK
    }

    /// Mask covering every capture device bit
    pub fn all_inputs() -> Self {
        Self::BUILTIN_MIC | Self::HEADSET_MIC | Self::BLUETOOTH_SCO_MIC
    }

    /// Output portion of this mask
    pub fn outputs(self) -> Self {
        self & Self::all_outputs()
    }

    /// Capture portion of this mask
    pub fn inputs(self) -> Self {
        self & Self::all_inputs()
    }

    /// Number of output device bits set
    pub fn output_count(self) -> u32 {
        self.outputs().bits().count_ones()
    }

    /// Number of capture device bits set
    pub fn input_count(self) -> u32 {
        self.inputs().bits().count_ones()
    }

    /// True when either jack variant (with or without mic) is requested
    pub fn has_wired(self) -> bool {
        self.intersects(Self::WIRED_HEADSET | Self::WIRED_HEADPHONE)
    }
}

/// Direction of a stream or routing path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamDirection {
    Output,
    Input,
}

/// Physical routing path on the codec (snd-device in ALSA terms).
///
/// The enumeration is closed: only ids listed here are ever legal, and a
/// platform configuration may narrow the set further by omitting entries
/// from its path table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u16)]
pub enum RoutePath {
    // Media output paths
    Handset = 1,
    Speaker = 2,
    SpeakerReverse = 3,
    Headphones = 4,
    Line = 5,
    SpeakerAndHeadphones = 6,
    SpeakerAndHdmi = 7,
    SpeakerAndLine = 8,
    Hdmi = 9,
    Dock = 10,
    BtSco = 11,
    BtScoWb = 12,

    // Voice output paths
    VoiceHandset = 20,
    VoiceSpeaker = 21,
    VoiceHeadphones = 22,
    VoiceLine = 23,
    VoiceBtSco = 24,
    VoiceBtScoWb = 25,
    VoiceTtyFullHeadphones = 26,
    VoiceTtyVcoHeadphones = 27,
    VoiceTtyHcoHandset = 28,

    // Capture paths
    BuiltinMic = 40,
    HeadsetMic = 41,
    BtScoMic = 42,
    BtScoMicWb = 43,
    VoiceRecMic = 44,
    CamcorderMic = 45,
    VoiceCommMic = 46,
}

impl RoutePath {
    /// Numeric id of this path
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Direction this path carries audio in
    pub fn direction(self) -> StreamDirection {
        if self.id() >= RoutePath::BuiltinMic.id() {
            StreamDirection::Input
        } else {
            StreamDirection::Output
        }
    }

    /// Mixer-path style name, e.g. "speaker-and-headphones"
    pub fn name(self) -> &'static str {
        use RoutePath::*;
        match self {
            Handset => "handset",
            Speaker => "speaker",
            SpeakerReverse => "speaker-reverse",
            Headphones => "headphones",
            Line => "line",
            SpeakerAndHeadphones => "speaker-and-headphones",
            SpeakerAndHdmi => "speaker-and-hdmi",
            SpeakerAndLine => "speaker-and-line",
            Hdmi => "hdmi",
            Dock => "dock",
            BtSco => "bt-sco",
            BtScoWb => "bt-sco-wb",
            VoiceHandset => "voice-handset",
            VoiceSpeaker => "voice-speaker",
            VoiceHeadphones => "voice-headphones",
            VoiceLine => "voice-line",
            VoiceBtSco => "voice-bt-sco",
            VoiceBtScoWb => "voice-bt-sco-wb",
            VoiceTtyFullHeadphones => "voice-tty-full-headphones",
            VoiceTtyVcoHeadphones => "voice-tty-vco-headphones",
            VoiceTtyHcoHandset => "voice-tty-hco-handset",
            BuiltinMic => "builtin-mic",
            HeadsetMic => "headset-mic",
            BtScoMic => "bt-sco-mic",
            BtScoMicWb => "bt-sco-mic-wb",
            VoiceRecMic => "voice-rec-mic",
            CamcorderMic => "camcorder-mic",
            VoiceCommMic => "voice-comm-mic",
        }
    }
}

impl std::fmt::Display for RoutePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One active audio activity tracked by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsecaseId {
    PlaybackDeepBuffer,
    PlaybackLowLatency,
    PlaybackOffload,
    CaptureLowLatency,
    CaptureDefault,
    VoiceCall,
    HfpCall,
}

impl UsecaseId {
    /// The broad category this usecase belongs to
    pub fn kind(self) -> UsecaseKind {
        match self {
            UsecaseId::PlaybackDeepBuffer
            | UsecaseId::PlaybackLowLatency
            | UsecaseId::PlaybackOffload => UsecaseKind::Playback,
            UsecaseId::CaptureLowLatency | UsecaseId::CaptureDefault => UsecaseKind::Capture,
            UsecaseId::VoiceCall => UsecaseKind::VoiceCall,
            UsecaseId::HfpCall => UsecaseKind::HfpCall,
        }
    }

    /// Short name used in logs
    pub fn name(self) -> &'static str {
        match self {
            UsecaseId::PlaybackDeepBuffer => "playback-deep-buffer",
            UsecaseId::PlaybackLowLatency => "playback-low-latency",
            UsecaseId::PlaybackOffload => "playback-offload",
            UsecaseId::CaptureLowLatency => "capture-low-latency",
            UsecaseId::CaptureDefault => "capture-default",
            UsecaseId::VoiceCall => "voice-call",
            UsecaseId::HfpCall => "hfp-call",
        }
    }
}

impl std::fmt::Display for UsecaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Category of an active usecase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsecaseKind {
    Playback,
    Capture,
    VoiceCall,
    HfpCall,
}

impl UsecaseKind {
    /// True for voice-call and HFP usecases
    pub fn is_call(self) -> bool {
        matches!(self, UsecaseKind::VoiceCall | UsecaseKind::HfpCall)
    }

    /// True when the usecase owns an output routing path
    pub fn uses_output(self) -> bool {
        !matches!(self, UsecaseKind::Capture)
    }

    /// True when the usecase owns a capture routing path
    pub fn uses_input(self) -> bool {
        !matches!(self, UsecaseKind::Playback)
    }

    /// Only cellular voice runs the codec sidetone loop; HFP sidetone lives
    /// in the BT chip
    pub fn has_sidetone(self) -> bool {
        matches!(self, UsecaseKind::VoiceCall)
    }
}

/// Global telephony mode of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallMode {
    Normal,
    Ringtone,
    InCall,
    InCommunication,
}

impl Default for CallMode {
    fn default() -> Self {
        CallMode::Normal
    }
}

/// TTY accessory mode for voice calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TtyMode {
    Off,
    Full,
    Vco,
    Hco,
}

impl Default for TtyMode {
    fn default() -> Self {
        TtyMode::Off
    }
}

/// Capture source type reported by the client opening an input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    Default,
    Mic,
    VoiceRecognition,
    Camcorder,
    VoiceCommunication,
}

impl Default for InputSource {
    fn default() -> Self {
        InputSource::Default
    }
}

/// One entry of the usecase registry.
///
/// Created when a stream leaves standby (or a call starts), mutated in place
/// by the routing arbiter, removed when the stream returns to standby or the
/// call ends. The owning stream is referenced by id only; the registry never
/// owns stream objects.
#[derive(Debug, Clone)]
pub struct AudioUsecase {
    pub id: UsecaseId,
    pub kind: UsecaseKind,
    pub requested_devices: DeviceMask,
    pub out_path: Option<RoutePath>,
    pub in_path: Option<RoutePath>,
    pub input_source: InputSource,
    pub stream_id: Uuid,
}

impl AudioUsecase {
    /// New unrouted usecase for the given stream
    pub fn new(id: UsecaseId, requested_devices: DeviceMask, stream_id: Uuid) -> Self {
        Self {
            id,
            kind: id.kind(),
            requested_devices,
            out_path: None,
            in_path: None,
            input_source: InputSource::Default,
            stream_id,
        }
    }

    /// New unrouted capture usecase carrying its source type
    pub fn new_capture(
        id: UsecaseId,
        requested_devices: DeviceMask,
        source: InputSource,
        stream_id: Uuid,
    ) -> Self {
        let mut usecase = Self::new(id, requested_devices, stream_id);
        usecase.input_source = source;
        usecase
    }
}

/// Sample encoding carried by a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleFormat {
    S16Le,
    S24Le,
    S32Le,
    F32Le,
    Mp3,
    Aac,
    Flac,
}

impl SampleFormat {
    /// True for formats decoded by the DSP rather than the host
    pub fn is_compressed(self) -> bool {
        matches!(self, SampleFormat::Mp3 | SampleFormat::Aac | SampleFormat::Flac)
    }

    /// Bytes per sample for PCM formats; compressed formats report 1
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::S24Le => 3,
            SampleFormat::S32Le | SampleFormat::F32Le => 4,
            SampleFormat::Mp3 | SampleFormat::Aac | SampleFormat::Flac => 1,
        }
    }
}

/// Negotiated parameters of one stream endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
    /// Hardware buffer duration; also the pacing window for error returns
    pub buffer_ms: u64,
    pub offload: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            format: SampleFormat::S16Le,
            buffer_ms: 20,
            offload: false,
        }
    }
}

impl StreamSettings {
    /// Typical compressed-offload profile
    pub fn offload_default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            format: SampleFormat::Mp3,
            buffer_ms: 250,
            offload: true,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }

    /// Wall time the given write would cover if the hardware consumed it.
    ///
    /// Compressed streams cannot derive this from the byte count, so they
    /// pace by the hardware buffer duration instead.
    pub fn pacing_for_bytes(&self, bytes: usize) -> std::time::Duration {
        if self.offload || self.format.is_compressed() {
            return std::time::Duration::from_millis(self.buffer_ms);
        }
        let frames = bytes / self.bytes_per_frame().max(1);
        let micros = frames as u64 * 1_000_000 / self.sample_rate.max(1) as u64;
        std::time::Duration::from_micros(micros)
    }
}

/// Drain variants understood by the offload endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrainMode {
    /// Render everything queued, then report completion
    All,
    /// Report as soon as the final buffer of the current track is submitted,
    /// so the client can queue the next track gaplessly
    EarlyNotify,
}

/// Gapless trim counts handed to the DSP for the current offload track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OffloadMetadata {
    pub delay_samples: u32,
    pub padding_samples: u32,
}

/// Snapshot of routing activity for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct RoutingStats {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub arbitrations_total: u64,
    pub forced_switches_total: u64,
    pub usecases_active: usize,
    pub active_paths: Vec<(String, u32)>,
    pub last_arbitration_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for RoutingStats {
    fn default() -> Self {
        Self {
            started_at: chrono::Utc::now(),
            arbitrations_total: 0,
            forced_switches_total: 0,
            usecases_active: 0,
            active_paths: Vec::new(),
            last_arbitration_at: None,
        }
    }
}
