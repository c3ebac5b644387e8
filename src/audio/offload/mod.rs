// Offload module - Compressed playback state machine
//
// Compressed streams hand encoded frames straight to the DSP and block on
// hardware events instead of pacing by buffer size. The stream facade owns
// the state machine; the worker task executes the blocking verbs so the
// stream's data lock stays available for pause/flush/standby.
//
// - worker: the per-stream command loop

pub mod worker;

pub use worker::OffloadWorker;

use serde::Serialize;

/// Playback state of a compressed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OffloadState {
    /// No data committed to the DSP since open or the last flush
    Idle,
    Playing,
    Paused,
}

impl Default for OffloadState {
    fn default() -> Self {
        OffloadState::Idle
    }
}

/// Commands executed by the offload worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffloadCommand {
    /// The DSP buffer was full on the last write; park until space frees up
    /// and announce write readiness
    WaitForBuffer,
    /// Wait for the current track's tail to be submitted, then announce so
    /// the next track can be queued gaplessly
    PartialDrain,
    /// Wait for everything queued to be rendered
    Drain,
    /// Announce an asynchronous stream error
    Error,
    /// Terminate the worker loop
    Exit,
}

/// Notifications emitted by the worker after a blocking verb completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OffloadEvent {
    WriteReady,
    DrainReady,
    Error,
}
