// Output stream
//
// One OutputStream per playback client. The stream starts in standby and
// activates on the first write: it registers its usecase with the routing
// core, arbitration runs, then the hardware endpoint opens with a bounded
// busy retry. Any later I/O failure returns the stream to standby and the
// write reports the full byte count after a pacing sleep, so real-time
// callers keep their cadence. Lock order is always pre-lock, then the data
// lock, then the routing core; the offload worker shares the data lock and
// drops it for every blocking hardware wait.

use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::error::{HalError, Result};
use crate::audio::offload::{OffloadCommand, OffloadEvent, OffloadState, OffloadWorker};
use crate::audio::platform::{DriverHandle, PlatformDriver};
use crate::audio::routing::RoutingCore;
use crate::audio::types::{
    AudioUsecase, DeviceMask, DrainMode, OffloadMetadata, StreamSettings, UsecaseId,
};
use crate::route_debug;

/// Lifecycle of a stream endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StreamLifecycle {
    Standby,
    Active,
}

/// Everything behind the stream's data lock; the offload worker shares it
pub(crate) struct OutputState {
    pub(crate) lifecycle: StreamLifecycle,
    pub(crate) handle: Option<DriverHandle>,
    pub(crate) offload_state: OffloadState,
    pub(crate) resend_metadata: bool,
    pub(crate) metadata: OffloadMetadata,
    pub(crate) devices: DeviceMask,
    pub(crate) frames_written: u64,
}

pub struct OutputStream {
    id: Uuid,
    usecase: UsecaseId,
    settings: StreamSettings,
    driver: Arc<dyn PlatformDriver>,
    core: Arc<Mutex<RoutingCore>>,
    online: Arc<AtomicBool>,
    /// Serializes writers against standby/close ahead of the data lock;
    /// held only until the data lock is taken, never across hardware I/O
    pre_lock: Mutex<()>,
    state: Arc<Mutex<OutputState>>,
    events: broadcast::Sender<OffloadEvent>,
    worker: Mutex<Option<OffloadWorker>>,
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("id", &self.id)
            .field("usecase", &self.usecase)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl OutputStream {
    pub fn new(
        usecase: UsecaseId,
        devices: DeviceMask,
        settings: StreamSettings,
        driver: Arc<dyn PlatformDriver>,
        core: Arc<Mutex<RoutingCore>>,
        online: Arc<AtomicBool>,
    ) -> Self {
        let id = Uuid::new_v4();
        let (events, _) = broadcast::channel(32);
        let state = Arc::new(Mutex::new(OutputState {
            lifecycle: StreamLifecycle::Standby,
            handle: None,
            offload_state: OffloadState::Idle,
            resend_metadata: true,
            metadata: OffloadMetadata::default(),
            devices,
            frames_written: 0,
        }));

        let worker = if settings.offload {
            Some(OffloadWorker::spawn(
                id,
                driver.clone(),
                state.clone(),
                events.clone(),
            ))
        } else {
            None
        };

        info!(
            "🔊 {}: Output stream {} created for {} (offload={})",
            "STREAM_OUT".on_cyan().white(),
            id,
            usecase,
            settings.offload
        );

        Self {
            id,
            usecase,
            settings,
            driver,
            core,
            online,
            pre_lock: Mutex::new(()),
            state,
            events,
            worker: Mutex::new(worker),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn usecase(&self) -> UsecaseId {
        self.usecase
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Offload notifications: write readiness, drain completion, errors
    pub fn subscribe_events(&self) -> broadcast::Receiver<OffloadEvent> {
        self.events.subscribe()
    }

    pub async fn lifecycle(&self) -> StreamLifecycle {
        self.state.lock().await.lifecycle
    }

    pub async fn offload_state(&self) -> OffloadState {
        self.state.lock().await.offload_state
    }

    pub async fn frames_written(&self) -> u64 {
        self.state.lock().await.frames_written
    }

    pub async fn current_devices(&self) -> DeviceMask {
        self.state.lock().await.devices
    }

    /// Write audio toward the hardware.
    ///
    /// Leaves standby on the first call. PCM writes block until consumed.
    /// Compressed writes may be cut short when the DSP ring fills; a buffer
    /// wait is queued and a WriteReady event follows. I/O failures after
    /// activation consume the buffer: the stream drops to standby and the
    /// full byte count is reported after a pacing sleep (immediately when
    /// the card is offline).
    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Err(HalError::InvalidArgument("empty write buffer".to_string()));
        }

        let pre = self.pre_lock.lock().await;
        let mut state = self.state.lock().await;
        // Entry is serialized; the data lock covers the rest of the write
        drop(pre);

        if !self.online.load(Ordering::SeqCst) {
            self.enter_standby(&mut state).await;
            return Ok(data.len());
        }

        if state.lifecycle == StreamLifecycle::Standby {
            self.activate(&mut state).await?;
        }

        // Another usecase's arbitration may have moved this stream; a
        // compressed session then needs its metadata re-sent
        {
            let mut core = self.core.lock().await;
            if core.take_rerouted(self.id) {
                route_debug!("Stream {} rerouted since last write", self.id);
                if self.settings.offload {
                    state.resend_metadata = true;
                }
            }
        }

        let result = if self.settings.offload {
            self.write_offload(&mut state, data).await
        } else {
            self.write_pcm(&mut state, data).await
        };

        match result {
            Ok(written) => Ok(written),
            Err(error) => {
                warn!("❌ Output stream {} write failed: {}", self.id, error);
                self.enter_standby(&mut state).await;
                let pace = !matches!(error, HalError::HardwareOffline { .. });
                drop(state);
                if pace {
                    tokio::time::sleep(self.settings.pacing_for_bytes(data.len())).await;
                }
                Ok(data.len())
            }
        }
    }

    async fn write_pcm(&self, state: &mut OutputState, data: &[u8]) -> Result<usize> {
        let Some(handle) = state.handle else {
            return Err(HalError::Protocol("write without open endpoint".to_string()));
        };
        let written = self.driver.write(handle, data).await?;
        state.frames_written += (written / self.settings.bytes_per_frame().max(1)) as u64;
        Ok(written)
    }

    async fn write_offload(&self, state: &mut OutputState, data: &[u8]) -> Result<usize> {
        let Some(handle) = state.handle else {
            return Err(HalError::Protocol("write without open endpoint".to_string()));
        };

        if state.resend_metadata {
            self.driver
                .set_offload_metadata(handle, state.metadata)
                .await?;
            state.resend_metadata = false;
        }

        let accepted = self.driver.offload_write(handle, data).await?;
        if accepted > 0 && state.offload_state == OffloadState::Idle {
            state.offload_state = OffloadState::Playing;
        }
        if accepted < data.len() {
            route_debug!(
                "Offload short write {}/{} on {}, queueing buffer wait",
                accepted,
                data.len(),
                self.id
            );
            if let Some(worker) = self.worker.lock().await.as_ref() {
                if !worker.send(OffloadCommand::WaitForBuffer) {
                    warn!("⚠️ Offload worker gone on stream {}", self.id);
                }
            }
        }
        Ok(accepted)
    }

    /// Register the usecase, run arbitration, then open the endpoint with a
    /// bounded busy retry
    async fn activate(&self, state: &mut OutputState) -> Result<()> {
        let usecase = AudioUsecase::new(self.usecase, state.devices, self.id);

        let (retries, delay_ms) = {
            let mut core = self.core.lock().await;
            core.start_usecase(usecase).await?;
            let config = core.config();
            (config.open_retry_count, config.open_retry_delay_ms)
        };

        let mut attempts = 0u32;
        let handle = loop {
            attempts += 1;
            match self.driver.open_output(self.id, &self.settings).await {
                Ok(handle) => break handle,
                Err(HalError::HardwareBusy { .. }) if attempts <= retries => {
                    debug!(
                        "⏳ Output endpoint busy for {} (attempt {}), retrying",
                        self.id, attempts
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                }
                Err(error) => {
                    let mut core = self.core.lock().await;
                    if let Err(cleanup) = core.stop_usecase(self.usecase).await {
                        warn!("⚠️ Route teardown after failed open: {}", cleanup);
                    }
                    return Err(match error {
                        HalError::HardwareBusy { .. } => HalError::HardwareBusy { attempts },
                        other => other,
                    });
                }
            }
        };

        state.handle = Some(handle);
        state.lifecycle = StreamLifecycle::Active;
        state.frames_written = 0;
        if self.settings.offload {
            state.offload_state = OffloadState::Idle;
            state.resend_metadata = true;
        }

        info!(
            "✅ {}: Output stream {} active after {} open attempt(s)",
            "STREAM_OUT".on_cyan().white(),
            self.id,
            attempts
        );
        Ok(())
    }

    /// Pause a compressed session; legal only while playing
    pub async fn pause(&self) -> Result<()> {
        self.require_offload("pause")?;
        let _pre = self.pre_lock.lock().await;
        let mut state = self.state.lock().await;

        if state.offload_state != OffloadState::Playing {
            return Err(HalError::Protocol(format!(
                "pause in {:?} state",
                state.offload_state
            )));
        }
        let Some(handle) = state.handle else {
            return Err(HalError::Protocol("pause without open endpoint".to_string()));
        };

        self.driver.offload_pause(handle).await?;
        state.offload_state = OffloadState::Paused;
        debug!("⏸️ Output stream {} paused", self.id);
        Ok(())
    }

    /// Resume a paused compressed session
    pub async fn resume(&self) -> Result<()> {
        self.require_offload("resume")?;
        let _pre = self.pre_lock.lock().await;
        let mut state = self.state.lock().await;

        if state.offload_state != OffloadState::Paused {
            return Err(HalError::Protocol(format!(
                "resume in {:?} state",
                state.offload_state
            )));
        }
        let Some(handle) = state.handle else {
            return Err(HalError::Protocol("resume without open endpoint".to_string()));
        };

        self.driver.offload_resume(handle).await?;
        state.offload_state = OffloadState::Playing;
        debug!("▶️ Output stream {} resumed", self.id);
        Ok(())
    }

    /// Block until the DSP drained what it holds. EarlyNotify returns at
    /// the track boundary so the next track can be queued gaplessly. The
    /// wait runs on the worker with the data lock released; pause, flush
    /// and standby stay usable meanwhile.
    pub async fn drain(&self, mode: DrainMode) -> Result<()> {
        self.require_offload("drain")?;
        let mut events = self.events.subscribe();

        {
            let _pre = self.pre_lock.lock().await;
            let state = self.state.lock().await;
            if state.handle.is_none() {
                return Err(HalError::Protocol("drain in standby".to_string()));
            }
            let command = match mode {
                DrainMode::EarlyNotify => OffloadCommand::PartialDrain,
                DrainMode::All => OffloadCommand::Drain,
            };
            match self.worker.lock().await.as_ref() {
                Some(worker) if worker.send(command) => {}
                _ => {
                    return Err(HalError::Protocol("offload worker unavailable".to_string()));
                }
            }
        }

        loop {
            match events.recv().await {
                Ok(OffloadEvent::DrainReady) => return Ok(()),
                Ok(OffloadEvent::Error) => {
                    return Err(HalError::Protocol("drain aborted by stream error".to_string()));
                }
                Ok(OffloadEvent::WriteReady) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(HalError::Protocol("offload worker exited".to_string()));
                }
            }
        }
    }

    /// Drop queued compressed data. Meaningful only while paused; a flush
    /// in any other state is accepted and ignored.
    pub async fn flush(&self) -> Result<()> {
        self.require_offload("flush")?;
        let _pre = self.pre_lock.lock().await;
        let mut state = self.state.lock().await;

        if state.offload_state != OffloadState::Paused {
            route_debug!("Flush ignored in {:?} state on {}", state.offload_state, self.id);
            return Ok(());
        }
        let Some(handle) = state.handle else {
            return Ok(());
        };

        self.driver.offload_flush(handle).await?;
        state.offload_state = OffloadState::Idle;
        state.resend_metadata = true;
        state.frames_written = 0;
        debug!("🧹 Output stream {} flushed", self.id);
        Ok(())
    }

    /// Point the stream at a new device set; applies immediately when
    /// active, otherwise at the next activation
    pub async fn set_devices(&self, devices: DeviceMask) -> Result<()> {
        let _pre = self.pre_lock.lock().await;
        let mut state = self.state.lock().await;

        if state.lifecycle == StreamLifecycle::Active {
            let changed = {
                let mut core = self.core.lock().await;
                core.reroute_usecase(self.usecase, devices).await?
            };
            if changed && self.settings.offload {
                state.resend_metadata = true;
            }
        }
        state.devices = devices;
        Ok(())
    }

    /// Stash gapless trim counts; they reach the DSP on the next write
    pub async fn set_gapless_metadata(&self, metadata: OffloadMetadata) -> Result<()> {
        self.require_offload("gapless metadata")?;
        let _pre = self.pre_lock.lock().await;
        let mut state = self.state.lock().await;
        state.metadata = metadata;
        state.resend_metadata = true;
        Ok(())
    }

    /// Return to standby: close the endpoint and release the usecase's
    /// routing. Idempotent.
    pub async fn standby(&self) -> Result<()> {
        let _pre = self.pre_lock.lock().await;
        let mut state = self.state.lock().await;
        self.enter_standby(&mut state).await;
        Ok(())
    }

    /// Standby plus worker teardown; the stream is done afterwards
    pub async fn close(&self) -> Result<()> {
        self.standby().await?;
        if let Some(mut worker) = self.worker.lock().await.take() {
            worker.shutdown().await;
        }
        info!(
            "🛑 {}: Output stream {} closed",
            "STREAM_OUT".on_cyan().white(),
            self.id
        );
        Ok(())
    }

    /// The one way down: close hardware, reset the state machine, release
    /// routing. Never fails; teardown problems are logged and absorbed.
    async fn enter_standby(&self, state: &mut OutputState) {
        if state.lifecycle == StreamLifecycle::Standby {
            return;
        }
        info!("😴 Output stream {} entering standby", self.id);

        if let Some(handle) = state.handle.take() {
            if let Err(e) = self.driver.close(handle).await {
                warn!("⚠️ Closing output endpoint failed: {}", e);
            }
        }
        state.lifecycle = StreamLifecycle::Standby;

        if self.settings.offload {
            state.offload_state = OffloadState::Idle;
            state.resend_metadata = true;
            // Wake anyone blocked in drain; their wait cannot complete now
            let _ = self.events.send(OffloadEvent::Error);
        }

        let mut core = self.core.lock().await;
        match core.stop_usecase(self.usecase).await {
            Ok(()) => {}
            Err(HalError::UsecaseNotFound { .. }) => {
                route_debug!("Usecase {} already stopped", self.usecase);
            }
            Err(e) => warn!("⚠️ Routing teardown failed for {}: {}", self.usecase, e),
        }
    }

    fn require_offload(&self, op: &str) -> Result<()> {
        if self.settings.offload {
            Ok(())
        } else {
            Err(HalError::InvalidArgument(format!(
                "{} requires an offload stream",
                op
            )))
        }
    }
}
