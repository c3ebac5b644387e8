// Input stream
//
// Capture counterpart to the output stream. Same lifecycle shape: standby
// until the first read, activation registers the capture usecase (which
// mirrors an active call's path when one exists), and read failures fall
// back to standby while handing the caller silence at real-time pace.

use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::error::{HalError, Result};
use crate::audio::platform::{DriverHandle, PlatformDriver};
use crate::audio::routing::RoutingCore;
use crate::audio::stream::output::StreamLifecycle;
use crate::audio::types::{AudioUsecase, DeviceMask, InputSource, StreamSettings, UsecaseId};
use crate::route_debug;

struct InputState {
    lifecycle: StreamLifecycle,
    handle: Option<DriverHandle>,
    devices: DeviceMask,
    frames_read: u64,
}

pub struct InputStream {
    id: Uuid,
    usecase: UsecaseId,
    source: InputSource,
    settings: StreamSettings,
    driver: Arc<dyn PlatformDriver>,
    core: Arc<Mutex<RoutingCore>>,
    online: Arc<AtomicBool>,
    pre_lock: Mutex<()>,
    state: Mutex<InputState>,
}

impl InputStream {
    pub fn new(
        usecase: UsecaseId,
        devices: DeviceMask,
        source: InputSource,
        settings: StreamSettings,
        driver: Arc<dyn PlatformDriver>,
        core: Arc<Mutex<RoutingCore>>,
        online: Arc<AtomicBool>,
    ) -> Self {
        let id = Uuid::new_v4();
        info!(
            "🎤 {}: Input stream {} created for {} (source {:?})",
            "STREAM_IN".on_magenta().white(),
            id,
            usecase,
            source
        );
        Self {
            id,
            usecase,
            source,
            settings,
            driver,
            core,
            online,
            pre_lock: Mutex::new(()),
            state: Mutex::new(InputState {
                lifecycle: StreamLifecycle::Standby,
                handle: None,
                devices,
                frames_read: 0,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn usecase(&self) -> UsecaseId {
        self.usecase
    }

    pub fn source(&self) -> InputSource {
        self.source
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub async fn lifecycle(&self) -> StreamLifecycle {
        self.state.lock().await.lifecycle
    }

    pub async fn frames_read(&self) -> u64 {
        self.state.lock().await.frames_read
    }

    pub async fn current_devices(&self) -> DeviceMask {
        self.state.lock().await.devices
    }

    /// Fill the buffer from the hardware.
    ///
    /// Leaves standby on the first call. Failures after activation never
    /// surface to the caller: the stream re-enters standby and the buffer
    /// is zero-filled, reported full after a pacing sleep so the capture
    /// cadence holds.
    pub async fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        if buffer.is_empty() {
            return Err(HalError::InvalidArgument("empty read buffer".to_string()));
        }

        let pre = self.pre_lock.lock().await;
        let mut state = self.state.lock().await;
        // Entry is serialized; the data lock covers the rest of the read
        drop(pre);

        if !self.online.load(Ordering::SeqCst) {
            self.enter_standby(&mut state).await;
            buffer.fill(0);
            return Ok(buffer.len());
        }

        if state.lifecycle == StreamLifecycle::Standby {
            self.activate(&mut state).await?;
        }

        let result = match state.handle {
            Some(handle) => self.driver.read(handle, buffer).await,
            None => Err(HalError::Protocol("read without open endpoint".to_string())),
        };

        match result {
            Ok(read) => {
                state.frames_read += (read / self.settings.bytes_per_frame().max(1)) as u64;
                Ok(read)
            }
            Err(error) => {
                warn!("❌ Input stream {} read failed: {}", self.id, error);
                self.enter_standby(&mut state).await;
                buffer.fill(0);
                let pace = !matches!(error, HalError::HardwareOffline { .. });
                drop(state);
                if pace {
                    tokio::time::sleep(self.settings.pacing_for_bytes(buffer.len())).await;
                }
                Ok(buffer.len())
            }
        }
    }

    async fn activate(&self, state: &mut InputState) -> Result<()> {
        let usecase =
            AudioUsecase::new_capture(self.usecase, state.devices, self.source, self.id);

        let (retries, delay_ms) = {
            let mut core = self.core.lock().await;
            core.start_usecase(usecase).await?;
            let config = core.config();
            (config.open_retry_count, config.open_retry_delay_ms)
        };

        let mut attempts = 0u32;
        let handle = loop {
            attempts += 1;
            match self.driver.open_input(self.id, &self.settings).await {
                Ok(handle) => break handle,
                Err(HalError::HardwareBusy { .. }) if attempts <= retries => {
                    debug!(
                        "⏳ Input endpoint busy for {} (attempt {}), retrying",
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
        state.frames_read = 0;

        info!(
            "✅ {}: Input stream {} active after {} open attempt(s)",
            "STREAM_IN".on_magenta().white(),
            self.id,
            attempts
        );
        Ok(())
    }

    /// Retarget capture devices; immediate when active, else remembered
    pub async fn set_devices(&self, devices: DeviceMask) -> Result<()> {
        let _pre = self.pre_lock.lock().await;
        let mut state = self.state.lock().await;

        if state.lifecycle == StreamLifecycle::Active {
            let mut core = self.core.lock().await;
            core.reroute_usecase(self.usecase, devices).await?;
        }
        state.devices = devices;
        Ok(())
    }

    /// Return to standby: close the endpoint and release routing. Idempotent.
    pub async fn standby(&self) -> Result<()> {
        let _pre = self.pre_lock.lock().await;
        let mut state = self.state.lock().await;
        self.enter_standby(&mut state).await;
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.standby().await?;
        info!(
            "🛑 {}: Input stream {} closed",
            "STREAM_IN".on_magenta().white(),
            self.id
        );
        Ok(())
    }

    async fn enter_standby(&self, state: &mut InputState) {
        if state.lifecycle == StreamLifecycle::Standby {
            return;
        }
        info!("😴 Input stream {} entering standby", self.id);

        if let Some(handle) = state.handle.take() {
            if let Err(e) = self.driver.close(handle).await {
                warn!("⚠️ Closing input endpoint failed: {}", e);
            }
        }
        state.lifecycle = StreamLifecycle::Standby;

        let mut core = self.core.lock().await;
        match core.stop_usecase(self.usecase).await {
            Ok(()) => {}
            Err(HalError::UsecaseNotFound { .. }) => {
                route_debug!("Usecase {} already stopped", self.usecase);
            }
            Err(e) => warn!("⚠️ Routing teardown failed for {}: {}", self.usecase, e),
        }
    }
}
