// Scripted in-memory driver
//
// FakeDriver records every call it receives and can be scripted to fail or
// stall on demand. The integration suites use it to assert exactly which
// mixer paths the arbiter touched and in what order, and to exercise the
// busy-retry and offline behavior of the stream layer without hardware.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::audio::error::{HalError, Result};
use crate::audio::platform::driver::{DriverHandle, PlatformDriver};
use crate::audio::types::{DrainMode, OffloadMetadata, RoutePath, StreamSettings};

/// One recorded driver call
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    EnablePath(RoutePath),
    DisablePath(RoutePath),
    Sidetone(bool),
    VoiceVolume(f32),
    MicMute(bool),
    OpenOutput,
    OpenInput,
    Close,
    Write(usize),
    Read(usize),
    OffloadWrite(usize),
    WaitForBuffer,
    Pause,
    Resume,
    Flush,
    Drain(DrainMode),
    Metadata(OffloadMetadata),
}

#[derive(Default)]
struct FakeState {
    next_handle: u64,
    events: Vec<DriverEvent>,
    open_failures: VecDeque<HalError>,
    write_failures: VecDeque<HalError>,
    /// Paths whose next physical enable fails, armed per path
    enable_failures: Vec<(RoutePath, HalError)>,
    open_handles: HashSet<DriverHandle>,
    enabled_paths: Vec<RoutePath>,
    /// Short-write size forced on the next offload_write, if any
    offload_accept: Option<usize>,
}

pub struct FakeDriver {
    state: Mutex<FakeState>,
    offline: AtomicBool,
    hold_buffer: AtomicBool,
    hold_drain: AtomicBool,
    buffer_gate: Arc<Notify>,
    drain_gate: Arc<Notify>,
    card: u32,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_handle: 1,
                ..Default::default()
            }),
            offline: AtomicBool::new(false),
            hold_buffer: AtomicBool::new(false),
            hold_drain: AtomicBool::new(false),
            buffer_gate: Arc::new(Notify::new()),
            drain_gate: Arc::new(Notify::new()),
            card: 0,
        }
    }

    /// All calls recorded so far, oldest first
    pub fn events(&self) -> Vec<DriverEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().unwrap().events.clear();
    }

    /// Paths currently enabled (enable minus disable)
    pub fn enabled_paths(&self) -> Vec<RoutePath> {
        self.state.lock().unwrap().enabled_paths.clone()
    }

    /// How many times a path was physically enabled over the whole run
    pub fn enable_count(&self, path: RoutePath) -> usize {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| **e == DriverEvent::EnablePath(path))
            .count()
    }

    pub fn open_handle_count(&self) -> usize {
        self.state.lock().unwrap().open_handles.len()
    }

    /// Queue a failure returned by the next endpoint open
    pub fn fail_next_open(&self, err: HalError) {
        self.state.lock().unwrap().open_failures.push_back(err);
    }

    /// Queue a failure returned by the next write or read
    pub fn fail_next_write(&self, err: HalError) {
        self.state.lock().unwrap().write_failures.push_back(err);
    }

    /// Queue a failure returned by the next enable of `path`
    pub fn fail_next_enable(&self, path: RoutePath, err: HalError) {
        self.state.lock().unwrap().enable_failures.push((path, err));
    }

    /// Force the next offload_write to accept only `bytes`
    pub fn accept_next_offload(&self, bytes: usize) {
        self.state.lock().unwrap().offload_accept = Some(bytes);
    }

    /// Drop the card; opens and writes fail fast until restored
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make wait_for_buffer park until release_buffer is called
    pub fn hold_buffer_waits(&self, hold: bool) {
        self.hold_buffer.store(hold, Ordering::SeqCst);
    }

    pub fn release_buffer(&self) {
        self.buffer_gate.notify_waiters();
    }

    /// Make drains park until release_drain is called
    pub fn hold_drain_waits(&self, hold: bool) {
        self.hold_drain.store(hold, Ordering::SeqCst);
    }

    pub fn release_drain(&self) {
        self.drain_gate.notify_waiters();
    }

    fn record(&self, event: DriverEvent) {
        self.state.lock().unwrap().events.push(event);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(HalError::HardwareOffline { card: self.card });
        }
        Ok(())
    }
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformDriver for FakeDriver {
    async fn enable_path(&self, path: RoutePath) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(DriverEvent::EnablePath(path));
        if let Some(pos) = state.enable_failures.iter().position(|(p, _)| *p == path) {
            let (_, err) = state.enable_failures.remove(pos);
            return Err(err);
        }
        state.enabled_paths.push(path);
        Ok(())
    }

    async fn disable_path(&self, path: RoutePath) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(DriverEvent::DisablePath(path));
        if let Some(pos) = state.enabled_paths.iter().position(|p| *p == path) {
            state.enabled_paths.remove(pos);
        }
        Ok(())
    }

    async fn set_sidetone(&self, enabled: bool) -> Result<()> {
        self.record(DriverEvent::Sidetone(enabled));
        Ok(())
    }

    async fn set_voice_volume(&self, volume: f32) -> Result<()> {
        self.record(DriverEvent::VoiceVolume(volume));
        Ok(())
    }

    async fn set_mic_mute(&self, muted: bool) -> Result<()> {
        self.record(DriverEvent::MicMute(muted));
        Ok(())
    }

    async fn open_output(
        &self,
        _stream_id: Uuid,
        _settings: &StreamSettings,
    ) -> Result<DriverHandle> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.events.push(DriverEvent::OpenOutput);
        if let Some(err) = state.open_failures.pop_front() {
            return Err(err);
        }
        let handle = DriverHandle(state.next_handle);
        state.next_handle += 1;
        state.open_handles.insert(handle);
        Ok(handle)
    }

    async fn open_input(
        &self,
        _stream_id: Uuid,
        _settings: &StreamSettings,
    ) -> Result<DriverHandle> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.events.push(DriverEvent::OpenInput);
        if let Some(err) = state.open_failures.pop_front() {
            return Err(err);
        }
        let handle = DriverHandle(state.next_handle);
        state.next_handle += 1;
        state.open_handles.insert(handle);
        Ok(handle)
    }

    async fn close(&self, handle: DriverHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(DriverEvent::Close);
        state.open_handles.remove(&handle);
        Ok(())
    }

    async fn write(&self, _handle: DriverHandle, data: &[u8]) -> Result<usize> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.events.push(DriverEvent::Write(data.len()));
        if let Some(err) = state.write_failures.pop_front() {
            return Err(err);
        }
        Ok(data.len())
    }

    async fn read(&self, _handle: DriverHandle, buf: &mut [u8]) -> Result<usize> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.events.push(DriverEvent::Read(buf.len()));
        if let Some(err) = state.write_failures.pop_front() {
            return Err(err);
        }
        buf.fill(0);
        Ok(buf.len())
    }

    async fn offload_write(&self, _handle: DriverHandle, data: &[u8]) -> Result<usize> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.events.push(DriverEvent::OffloadWrite(data.len()));
        if let Some(err) = state.write_failures.pop_front() {
            return Err(err);
        }
        let accepted = state.offload_accept.take().unwrap_or(data.len());
        Ok(accepted.min(data.len()))
    }

    async fn wait_for_buffer(&self, _handle: DriverHandle) -> Result<()> {
        self.record(DriverEvent::WaitForBuffer);
        if self.hold_buffer.load(Ordering::SeqCst) {
            let gate = Arc::clone(&self.buffer_gate);
            gate.notified().await;
        }
        Ok(())
    }

    async fn offload_pause(&self, _handle: DriverHandle) -> Result<()> {
        self.record(DriverEvent::Pause);
        Ok(())
    }

    async fn offload_resume(&self, _handle: DriverHandle) -> Result<()> {
        self.record(DriverEvent::Resume);
        Ok(())
    }

    async fn offload_flush(&self, _handle: DriverHandle) -> Result<()> {
        self.record(DriverEvent::Flush);
        Ok(())
    }

    async fn offload_drain(&self, _handle: DriverHandle, mode: DrainMode) -> Result<()> {
        self.record(DriverEvent::Drain(mode));
        if self.hold_drain.load(Ordering::SeqCst) {
            let gate = Arc::clone(&self.drain_gate);
            gate.notified().await;
        }
        Ok(())
    }

    async fn set_offload_metadata(
        &self,
        _handle: DriverHandle,
        metadata: OffloadMetadata,
    ) -> Result<()> {
        self.record(DriverEvent::Metadata(metadata));
        Ok(())
    }
}
