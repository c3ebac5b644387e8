// Platform driver boundary
//
// Everything below the arbiter goes through this trait: mixer path
// enable/disable, endpoint open/close, PCM and compressed writes, and the
// offload control verbs. The server ships a NullDriver that accepts every
// call and logs it, which is enough for routing work on machines without
// the codec attached. Tests substitute a mock or the scripted FakeDriver.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

use crate::audio::error::Result;
use crate::audio::types::{DrainMode, OffloadMetadata, RoutePath, StreamSettings};

/// Opaque handle to an open hardware endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriverHandle(pub u64);

impl std::fmt::Display for DriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "h{}", self.0)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlatformDriver: Send + Sync {
    /// Apply the mixer controls that turn a routing path on
    async fn enable_path(&self, path: RoutePath) -> Result<()>;

    /// Tear down the mixer controls for a routing path
    async fn disable_path(&self, path: RoutePath) -> Result<()>;

    /// Toggle the hardware sidetone loop used during voice calls
    async fn set_sidetone(&self, enabled: bool) -> Result<()>;

    async fn set_voice_volume(&self, volume: f32) -> Result<()>;

    async fn set_mic_mute(&self, muted: bool) -> Result<()>;

    /// Open a playback endpoint; may fail with HardwareBusy while the DSP
    /// session from a previous close is still winding down
    async fn open_output(&self, stream_id: Uuid, settings: &StreamSettings) -> Result<DriverHandle>;

    /// Open a capture endpoint
    async fn open_input(&self, stream_id: Uuid, settings: &StreamSettings) -> Result<DriverHandle>;

    /// Release an endpoint handle
    async fn close(&self, handle: DriverHandle) -> Result<()>;

    /// Blocking PCM write; returns the byte count consumed
    async fn write(&self, handle: DriverHandle, data: &[u8]) -> Result<usize>;

    /// Blocking PCM read into a caller buffer; returns the byte count filled
    async fn read(&self, handle: DriverHandle, buf: &mut [u8]) -> Result<usize>;

    /// Non-blocking compressed write; a short count means the DSP buffer is
    /// full and the caller should wait for buffer space
    async fn offload_write(&self, handle: DriverHandle, data: &[u8]) -> Result<usize>;

    /// Park until the DSP frees buffer space for the next offload write
    async fn wait_for_buffer(&self, handle: DriverHandle) -> Result<()>;

    async fn offload_pause(&self, handle: DriverHandle) -> Result<()>;

    async fn offload_resume(&self, handle: DriverHandle) -> Result<()>;

    /// Discard queued compressed data without closing the endpoint
    async fn offload_flush(&self, handle: DriverHandle) -> Result<()>;

    /// Park until the DSP has rendered queued data; EarlyNotify returns when
    /// the final buffer is submitted rather than fully rendered
    async fn offload_drain(&self, handle: DriverHandle, mode: DrainMode) -> Result<()>;

    /// Hand the DSP the gapless trim counts for the current track
    async fn set_offload_metadata(
        &self,
        handle: DriverHandle,
        metadata: OffloadMetadata,
    ) -> Result<()>;
}

/// Driver that accepts everything and touches no hardware
pub struct NullDriver {
    next_handle: AtomicU64,
}

impl NullDriver {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
        }
    }
}

impl Default for NullDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformDriver for NullDriver {
    async fn enable_path(&self, path: RoutePath) -> Result<()> {
        debug!("NullDriver: enable path {}", path);
        Ok(())
    }

    async fn disable_path(&self, path: RoutePath) -> Result<()> {
        debug!("NullDriver: disable path {}", path);
        Ok(())
    }

    async fn set_sidetone(&self, enabled: bool) -> Result<()> {
        debug!("NullDriver: sidetone {}", enabled);
        Ok(())
    }

    async fn set_voice_volume(&self, volume: f32) -> Result<()> {
        debug!("NullDriver: voice volume {:.2}", volume);
        Ok(())
    }

    async fn set_mic_mute(&self, muted: bool) -> Result<()> {
        debug!("NullDriver: mic mute {}", muted);
        Ok(())
    }

    async fn open_output(
        &self,
        stream_id: Uuid,
        settings: &StreamSettings,
    ) -> Result<DriverHandle> {
        let handle = DriverHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        debug!(
            "NullDriver: open output {} for stream {} ({}Hz/{}ch)",
            handle, stream_id, settings.sample_rate, settings.channels
        );
        Ok(handle)
    }

    async fn open_input(
        &self,
        stream_id: Uuid,
        settings: &StreamSettings,
    ) -> Result<DriverHandle> {
        let handle = DriverHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        debug!(
            "NullDriver: open input {} for stream {} ({}Hz/{}ch)",
            handle, stream_id, settings.sample_rate, settings.channels
        );
        Ok(handle)
    }

    async fn close(&self, handle: DriverHandle) -> Result<()> {
        debug!("NullDriver: close {}", handle);
        Ok(())
    }

    async fn write(&self, _handle: DriverHandle, data: &[u8]) -> Result<usize> {
        Ok(data.len())
    }

    async fn read(&self, _handle: DriverHandle, buf: &mut [u8]) -> Result<usize> {
        buf.fill(0);
        Ok(buf.len())
    }

    async fn offload_write(&self, _handle: DriverHandle, data: &[u8]) -> Result<usize> {
        Ok(data.len())
    }

    async fn wait_for_buffer(&self, _handle: DriverHandle) -> Result<()> {
        Ok(())
    }

    async fn offload_pause(&self, handle: DriverHandle) -> Result<()> {
        debug!("NullDriver: offload pause {}", handle);
        Ok(())
    }

    async fn offload_resume(&self, handle: DriverHandle) -> Result<()> {
        debug!("NullDriver: offload resume {}", handle);
        Ok(())
    }

    async fn offload_flush(&self, handle: DriverHandle) -> Result<()> {
        debug!("NullDriver: offload flush {}", handle);
        Ok(())
    }

    async fn offload_drain(&self, handle: DriverHandle, mode: DrainMode) -> Result<()> {
        debug!("NullDriver: offload drain {} ({:?})", handle, mode);
        Ok(())
    }

    async fn set_offload_metadata(
        &self,
        handle: DriverHandle,
        metadata: OffloadMetadata,
    ) -> Result<()> {
        debug!(
            "NullDriver: metadata {} delay={} padding={}",
            handle, metadata.delay_samples, metadata.padding_samples
        );
        Ok(())
    }
}
