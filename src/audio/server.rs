// Audio HAL server - High-level orchestration and API
//
// This is the owning facade: it builds the routing core from platform
// config, runs the card status monitor, hands out stream objects, and
// turns telephony mode changes into voice usecase starts and stops.

use colored::*;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audio::error::{HalError, Result};
use crate::audio::platform::{
    CardStatusEvent, CardStatusMonitor, PlatformConfig, PlatformDriver,
};
use crate::audio::routing::{ActiveUsecase, RoutingCore};
use crate::audio::stream::{InputStream, OutputStream};
use crate::audio::types::{
    AudioUsecase, CallMode, DeviceMask, InputSource, RoutingStats, StreamSettings, TtyMode,
    UsecaseId,
};

/// Snapshot of the whole server for diagnostics
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServerStats {
    pub card: u32,
    pub online: bool,
    pub call_mode: CallMode,
    pub output_streams: usize,
    pub input_streams: usize,
    pub routing: RoutingStats,
}

pub struct AudioServer {
    config: Arc<PlatformConfig>,
    driver: Arc<dyn PlatformDriver>,
    core: Arc<Mutex<RoutingCore>>,
    monitor: CardStatusMonitor,
    online: Arc<AtomicBool>,
    outputs: Arc<RwLock<HashMap<Uuid, Arc<OutputStream>>>>,
    inputs: Arc<RwLock<HashMap<Uuid, Arc<InputStream>>>>,
    /// Device choice for the next/current voice call
    voice_devices: Mutex<DeviceMask>,
    offline_watcher: Option<JoinHandle<()>>,
}

impl AudioServer {
    pub fn new(config: PlatformConfig, driver: Arc<dyn PlatformDriver>) -> Self {
        let config = Arc::new(config);
        let core = Arc::new(Mutex::new(RoutingCore::new(config.clone(), driver.clone())));
        let monitor = CardStatusMonitor::new(config.card);
        let online = monitor.online_flag();

        let outputs: Arc<RwLock<HashMap<Uuid, Arc<OutputStream>>>> =
            Arc::new(RwLock::new(HashMap::new()));
        let inputs: Arc<RwLock<HashMap<Uuid, Arc<InputStream>>>> =
            Arc::new(RwLock::new(HashMap::new()));

        let offline_watcher = Self::spawn_offline_watcher(
            monitor.subscribe(),
            outputs.clone(),
            inputs.clone(),
        );

        info!(
            "🚀 {}: Audio server up (card {}, {} paths configured)",
            "AUDIO_SRV".on_green().white(),
            config.card,
            config.paths.len()
        );

        Self {
            config,
            driver,
            core,
            monitor,
            online,
            outputs,
            inputs,
            voice_devices: Mutex::new(DeviceMask::EARPIECE | DeviceMask::BUILTIN_MIC),
            offline_watcher: Some(offline_watcher),
        }
    }

    pub fn from_config_file(
        path: impl AsRef<std::path::Path>,
        driver: Arc<dyn PlatformDriver>,
    ) -> Result<Self> {
        let config = PlatformConfig::from_json_file(path)?;
        Ok(Self::new(config, driver))
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    /// Producer side of the card status channel, for the platform glue
    pub fn card_status_injector(&self) -> crossbeam::channel::Sender<CardStatusEvent> {
        self.monitor.injector()
    }

    pub fn subscribe_card_status(&self) -> broadcast::Receiver<CardStatusEvent> {
        self.monitor.subscribe()
    }

    /// Open a playback stream. The stream stays in standby until its first
    /// write; routing and hardware resources are only claimed then.
    pub async fn open_output_stream(
        &self,
        usecase: UsecaseId,
        devices: DeviceMask,
        settings: StreamSettings,
    ) -> Result<Arc<OutputStream>> {
        if !usecase.kind().uses_output() || usecase.kind().is_call() {
            return Err(HalError::InvalidArgument(format!(
                "{} is not a playback stream usecase",
                usecase
            )));
        }
        if devices.outputs().is_empty() {
            return Err(HalError::InvalidArgument(
                "playback needs at least one output device".to_string(),
            ));
        }
        if settings.sample_rate == 0 || settings.channels == 0 {
            return Err(HalError::InvalidArgument(
                "sample rate and channel count must be non-zero".to_string(),
            ));
        }
        if settings.offload != (usecase == UsecaseId::PlaybackOffload) {
            return Err(HalError::InvalidArgument(
                "offload settings require the offload playback usecase".to_string(),
            ));
        }
        if settings.format.is_compressed() != settings.offload {
            return Err(HalError::InvalidArgument(
                "compressed formats go through offload, PCM through the others".to_string(),
            ));
        }

        let mut outputs = self.outputs.write().await;
        if outputs.values().any(|s| s.usecase() == usecase) {
            return Err(HalError::DuplicateUsecase { id: usecase });
        }

        let stream = Arc::new(OutputStream::new(
            usecase,
            devices,
            settings,
            self.driver.clone(),
            self.core.clone(),
            self.online.clone(),
        ));
        outputs.insert(stream.id(), stream.clone());
        Ok(stream)
    }

    /// Open a capture stream; same lazy-activation contract as playback
    pub async fn open_input_stream(
        &self,
        usecase: UsecaseId,
        devices: DeviceMask,
        source: InputSource,
        settings: StreamSettings,
    ) -> Result<Arc<InputStream>> {
        if !usecase.kind().uses_input() || usecase.kind().is_call() {
            return Err(HalError::InvalidArgument(format!(
                "{} is not a capture stream usecase",
                usecase
            )));
        }
        if devices.inputs().is_empty() {
            return Err(HalError::InvalidArgument(
                "capture needs at least one input device".to_string(),
            ));
        }
        if settings.sample_rate == 0 || settings.channels == 0 {
            return Err(HalError::InvalidArgument(
                "sample rate and channel count must be non-zero".to_string(),
            ));
        }
        if settings.offload || settings.format.is_compressed() {
            return Err(HalError::InvalidArgument(
                "capture streams are PCM only".to_string(),
            ));
        }

        let mut inputs = self.inputs.write().await;
        if inputs.values().any(|s| s.usecase() == usecase) {
            return Err(HalError::DuplicateUsecase { id: usecase });
        }

        let stream = Arc::new(InputStream::new(
            usecase,
            devices,
            source,
            settings,
            self.driver.clone(),
            self.core.clone(),
            self.online.clone(),
        ));
        inputs.insert(stream.id(), stream.clone());
        Ok(stream)
    }

    pub async fn output_stream(&self, id: Uuid) -> Option<Arc<OutputStream>> {
        self.outputs.read().await.get(&id).cloned()
    }

    pub async fn input_stream(&self, id: Uuid) -> Option<Arc<InputStream>> {
        self.inputs.read().await.get(&id).cloned()
    }

    /// Tear a stream down and forget it
    pub async fn close_stream(&self, id: Uuid) -> Result<()> {
        if let Some(stream) = self.outputs.write().await.remove(&id) {
            stream.close().await?;
            return Ok(());
        }
        if let Some(stream) = self.inputs.write().await.remove(&id) {
            stream.close().await?;
            return Ok(());
        }
        Err(HalError::InvalidArgument(format!("unknown stream {}", id)))
    }

    /// Telephony mode changes. Entering a cellular call starts the voice
    /// usecase on the remembered call devices; leaving it stops the
    /// usecase. InCommunication is VoIP and rides on ordinary streams, so
    /// only the InCall edges touch routing.
    pub async fn set_call_mode(&self, mode: CallMode) -> Result<()> {
        let previous = {
            let mut core = self.core.lock().await;
            core.set_call_mode(mode)
        };
        if previous == mode {
            return Ok(());
        }
        info!(
            "📞 {}: Call mode {:?} -> {:?}",
            "AUDIO_SRV".on_green().white(),
            previous,
            mode
        );

        if mode == CallMode::InCall {
            let devices = *self.voice_devices.lock().await;
            let usecase = AudioUsecase::new(UsecaseId::VoiceCall, devices, Uuid::new_v4());
            let mut core = self.core.lock().await;
            core.start_usecase(usecase).await?;
        } else if previous == CallMode::InCall {
            let mut core = self.core.lock().await;
            match core.stop_usecase(UsecaseId::VoiceCall).await {
                Ok(()) => {}
                Err(HalError::UsecaseNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Pick the call's devices; reroutes a live call immediately
    pub async fn set_voice_call_devices(&self, devices: DeviceMask) -> Result<()> {
        if devices.outputs().is_empty() || devices.inputs().is_empty() {
            return Err(HalError::InvalidArgument(
                "voice call devices need an output and an input".to_string(),
            ));
        }
        *self.voice_devices.lock().await = devices;

        let mut core = self.core.lock().await;
        if core.current_paths(UsecaseId::VoiceCall).is_some() {
            core.reroute_usecase(UsecaseId::VoiceCall, devices).await?;
        }
        Ok(())
    }

    /// Route a BT HFP call through the codec. The SCO audio itself is mixed
    /// on the BT chip, so this claims paths without opening a local stream.
    pub async fn start_hfp_call(&self, devices: DeviceMask) -> Result<()> {
        if devices.outputs().is_empty() || devices.inputs().is_empty() {
            return Err(HalError::InvalidArgument(
                "HFP call devices need an output and an input".to_string(),
            ));
        }
        info!(
            "📞 {}: HFP call starting on {:?}",
            "AUDIO_SRV".on_green().white(),
            devices
        );
        let usecase = AudioUsecase::new(UsecaseId::HfpCall, devices, Uuid::new_v4());
        self.core.lock().await.start_usecase(usecase).await
    }

    pub async fn stop_hfp_call(&self) -> Result<()> {
        let mut core = self.core.lock().await;
        match core.stop_usecase(UsecaseId::HfpCall).await {
            Ok(()) => Ok(()),
            Err(HalError::UsecaseNotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn call_mode(&self) -> CallMode {
        self.core.lock().await.call_mode()
    }

    pub async fn set_tty_mode(&self, mode: TtyMode) -> Result<()> {
        self.core.lock().await.set_tty_mode(mode).await
    }

    pub async fn set_bt_wideband(&self, wideband: bool) -> Result<()> {
        self.core.lock().await.set_bt_wideband(wideband).await
    }

    pub async fn set_speaker_swapped(&self, swapped: bool) -> Result<()> {
        self.core.lock().await.set_speaker_swapped(swapped).await
    }

    pub async fn set_mic_mute(&self, muted: bool) -> Result<()> {
        self.core.lock().await.set_mic_mute(muted).await
    }

    pub async fn is_mic_muted(&self) -> bool {
        self.core.lock().await.is_mic_muted()
    }

    pub async fn set_voice_volume(&self, volume: f32) -> Result<()> {
        self.core.lock().await.set_voice_volume(volume).await
    }

    pub async fn active_usecases(&self) -> Vec<ActiveUsecase> {
        self.core.lock().await.active_usecases()
    }

    pub async fn stats(&self) -> ServerStats {
        let (routing, call_mode) = {
            let core = self.core.lock().await;
            (core.stats(), core.call_mode())
        };
        ServerStats {
            card: self.config.card,
            online: self.monitor.is_online(),
            call_mode,
            output_streams: self.outputs.read().await.len(),
            input_streams: self.inputs.read().await.len(),
            routing,
        }
    }

    fn spawn_offline_watcher(
        mut card_events: broadcast::Receiver<CardStatusEvent>,
        outputs: Arc<RwLock<HashMap<Uuid, Arc<OutputStream>>>>,
        inputs: Arc<RwLock<HashMap<Uuid, Arc<InputStream>>>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match card_events.recv().await {
                    Ok(event) if !event.online => {
                        warn!(
                            "⚠️ {}: Card {} offline, parking all streams in standby",
                            "AUDIO_SRV".on_green().white(),
                            event.card
                        );
                        for stream in outputs.read().await.values() {
                            let _ = stream.standby().await;
                        }
                        for stream in inputs.read().await.values() {
                            let _ = stream.standby().await;
                        }
                    }
                    Ok(event) => {
                        info!(
                            "🔌 {}: Card {} online again, streams reopen on next write",
                            "AUDIO_SRV".on_green().white(),
                            event.card
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Orderly teardown: close every stream, stop the watcher and monitor
    pub async fn shutdown(&mut self) {
        info!(
            "🛑 {}: Audio server shutting down",
            "AUDIO_SRV".on_green().white()
        );

        let outputs: Vec<_> = self.outputs.write().await.drain().collect();
        for (_, stream) in outputs {
            if let Err(e) = stream.close().await {
                warn!("⚠️ Closing output stream failed during shutdown: {}", e);
            }
        }
        let inputs: Vec<_> = self.inputs.write().await.drain().collect();
        for (_, stream) in inputs {
            if let Err(e) = stream.close().await {
                warn!("⚠️ Closing input stream failed during shutdown: {}", e);
            }
        }

        if let Some(watcher) = self.offline_watcher.take() {
            watcher.abort();
            let _ = watcher.await;
        }
        self.monitor.shutdown().await;

        info!("✅ {}: Audio server stopped", "AUDIO_SRV".on_green().white());
    }
}

impl Drop for AudioServer {
    fn drop(&mut self) {
        if let Some(watcher) = self.offline_watcher.take() {
            watcher.abort();
        }
    }
}
