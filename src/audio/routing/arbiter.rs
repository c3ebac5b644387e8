// Routing arbiter
//
// RoutingCore owns the usecase registry, the per-path reference counts and
// every routing decision. It is wrapped in a single device-wide mutex by
// the server; all state here is therefore mutated under one lock and the
// driver is only ever called on a refcount edge. Failed driver calls are
// propagated without rollback, the registry keeps the intended state and
// the owning stream cleans up through standby.

use chrono::Utc;
use colored::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::error::{HalError, Result};
use crate::audio::platform::{PlatformConfig, PlatformDriver};
use crate::audio::routing::conflict::{derive_displaced_path, BackendConflictMap};
use crate::audio::routing::registry::{PathRefCounts, UsecaseRegistry};
use crate::audio::routing::selection::{select_input_path, select_output_path, SelectionContext};
use crate::audio::types::{
    AudioUsecase, CallMode, DeviceMask, RoutePath, RoutingStats, StreamDirection, TtyMode,
    UsecaseId, UsecaseKind,
};
use crate::route_debug;

/// Serializable view of one registry entry, for diagnostics
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActiveUsecase {
    pub id: UsecaseId,
    pub kind: UsecaseKind,
    pub devices: DeviceMask,
    pub out_path: Option<RoutePath>,
    pub in_path: Option<RoutePath>,
}

/// A usecase the conflict sweep is about to move
struct Displaced {
    id: UsecaseId,
    stream_id: Uuid,
    sidetone: bool,
    old_path: RoutePath,
    derived: RoutePath,
}

pub struct RoutingCore {
    config: Arc<PlatformConfig>,
    driver: Arc<dyn PlatformDriver>,
    conflicts: BackendConflictMap,
    registry: UsecaseRegistry,
    refcounts: PathRefCounts,
    call_mode: CallMode,
    tty_mode: TtyMode,
    bt_wideband: bool,
    speaker_swapped: bool,
    mic_muted: bool,
    /// Streams whose usecase was moved by someone else's arbitration; they
    /// pick this up on their next operation
    rerouted: HashSet<Uuid>,
    stats: RoutingStats,
}

impl RoutingCore {
    pub fn new(config: Arc<PlatformConfig>, driver: Arc<dyn PlatformDriver>) -> Self {
        let conflicts = BackendConflictMap::from_config(&config);
        Self {
            config,
            driver,
            conflicts,
            registry: UsecaseRegistry::new(),
            refcounts: PathRefCounts::new(),
            call_mode: CallMode::default(),
            tty_mode: TtyMode::default(),
            bt_wideband: false,
            speaker_swapped: false,
            mic_muted: false,
            rerouted: HashSet::new(),
            stats: RoutingStats::default(),
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn call_mode(&self) -> CallMode {
        self.call_mode
    }

    pub fn is_mic_muted(&self) -> bool {
        self.mic_muted
    }

    fn selection_context(&self) -> SelectionContext {
        SelectionContext {
            call_active: self.registry.active_call().is_some(),
            tty_mode: self.tty_mode,
            bt_wideband: self.bt_wideband,
            speaker_swapped: self.speaker_swapped,
        }
    }

    /// Register a usecase and bring its paths up.
    ///
    /// Selection happens before the registry is touched, so an invalid
    /// request leaves no trace.
    pub async fn start_usecase(&mut self, mut usecase: AudioUsecase) -> Result<()> {
        if self.registry.contains(usecase.id) {
            return Err(HalError::DuplicateUsecase { id: usecase.id });
        }

        let (out_path, in_path) = self.resolve_paths(&usecase)?;
        usecase.out_path = out_path;
        usecase.in_path = in_path;

        info!(
            "{}: Starting usecase {} out={:?} in={:?}",
            "ROUTE_ARB".on_cyan().white(),
            usecase.id,
            out_path.map(|p| p.name()),
            in_path.map(|p| p.name()),
        );

        let id = usecase.id;
        let devices = usecase.requested_devices;
        let sidetone = usecase.kind.has_sidetone();
        self.registry.add(usecase)?;

        if let Err(e) = self.bring_up(id, devices, out_path, in_path, sidetone).await {
            self.unwind_failed_start(id);
            return Err(e);
        }

        self.note_arbitration();
        Ok(())
    }

    async fn bring_up(
        &mut self,
        id: UsecaseId,
        devices: DeviceMask,
        out_path: Option<RoutePath>,
        in_path: Option<RoutePath>,
        sidetone: bool,
    ) -> Result<()> {
        if let Some(path) = out_path {
            self.sweep_and_enable(id, devices, path).await?;
        }
        if let Some(path) = in_path {
            if let Err(e) = self.sweep_and_enable(id, devices, path).await {
                if let Some(path) = out_path {
                    if let Err(e2) = self.release_path(path).await {
                        warn!("⚠️ Releasing {} after failed start: {}", path, e2);
                    }
                }
                return Err(e);
            }
        }
        if sidetone {
            if let Err(e) = self.driver.set_sidetone(true).await {
                for path in [out_path, in_path].into_iter().flatten() {
                    if let Err(e2) = self.release_path(path).await {
                        warn!("⚠️ Releasing {} after failed start: {}", path, e2);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// A usecase whose bring-up failed must leave no trace, so the stream
    /// can retry from standby
    fn unwind_failed_start(&mut self, id: UsecaseId) {
        if let Ok(usecase) = self.registry.remove(id) {
            self.rerouted.remove(&usecase.stream_id);
        }
    }

    /// Remove a usecase and release its paths. Teardown never re-arbitrates
    /// the survivors.
    pub async fn stop_usecase(&mut self, id: UsecaseId) -> Result<()> {
        let usecase = self.registry.remove(id)?;

        info!(
            "{}: Stopping usecase {}",
            "ROUTE_ARB".on_cyan().white(),
            usecase.id
        );

        if usecase.kind.has_sidetone() {
            self.driver.set_sidetone(false).await?;
        }
        if let Some(path) = usecase.out_path {
            self.release_path(path).await?;
        }
        if let Some(path) = usecase.in_path {
            self.release_path(path).await?;
        }
        self.rerouted.remove(&usecase.stream_id);
        Ok(())
    }

    /// Point an active usecase at a new device set.
    ///
    /// Returns false when the selected paths are unchanged; that call is a
    /// pure no-op on the hardware.
    pub async fn reroute_usecase(&mut self, id: UsecaseId, devices: DeviceMask) -> Result<bool> {
        let entry = self
            .registry
            .get(id)
            .ok_or(HalError::UsecaseNotFound { id })?;

        let mut candidate = entry.clone();
        candidate.requested_devices = devices;
        let (new_out, new_in) = self.resolve_paths(&candidate)?;

        let old_out = entry.out_path;
        let old_in = entry.in_path;
        let is_call = entry.kind.is_call();

        if new_out == old_out && new_in == old_in {
            route_debug!("Route unchanged for {} ({:?})", id, devices);
            if let Some(entry) = self.registry.get_mut(id) {
                entry.requested_devices = devices;
            }
            return Ok(false);
        }

        info!(
            "{}: Rerouting {} out {:?} -> {:?}, in {:?} -> {:?}",
            "ROUTE_ARB".on_cyan().white(),
            id,
            old_out.map(|p| p.name()),
            new_out.map(|p| p.name()),
            old_in.map(|p| p.name()),
            new_in.map(|p| p.name()),
        );

        if let Some(entry) = self.registry.get_mut(id) {
            entry.requested_devices = devices;
        }

        if new_out != old_out {
            self.switch_path(id, StreamDirection::Output, old_out, new_out)
                .await?;
        }
        if new_in != old_in {
            self.switch_path(id, StreamDirection::Input, old_in, new_in)
                .await?;
        }

        // A moved call drags the streams that inherited its old routes
        if is_call {
            if let Some(old) = old_out {
                self.drag_inherited(StreamDirection::Output, old).await?;
            }
            if let Some(old) = old_in {
                self.drag_inherited(StreamDirection::Input, old).await?;
            }
        }

        self.note_arbitration();
        Ok(true)
    }

    /// Store the new telephony mode. Call usecase lifecycle is driven by the
    /// server on the mode edges.
    pub fn set_call_mode(&mut self, mode: CallMode) -> CallMode {
        let previous = self.call_mode;
        self.call_mode = mode;
        previous
    }

    pub async fn set_tty_mode(&mut self, mode: TtyMode) -> Result<()> {
        if self.tty_mode == mode {
            return Ok(());
        }
        info!("🎧 TTY mode -> {:?}", mode);
        self.tty_mode = mode;
        self.refresh_routes().await
    }

    pub async fn set_bt_wideband(&mut self, wideband: bool) -> Result<()> {
        if self.bt_wideband == wideband {
            return Ok(());
        }
        info!("📶 BT SCO wideband -> {}", wideband);
        self.bt_wideband = wideband;
        self.refresh_routes().await
    }

    pub async fn set_speaker_swapped(&mut self, swapped: bool) -> Result<()> {
        if self.speaker_swapped == swapped {
            return Ok(());
        }
        info!("🔊 Speaker channel swap -> {}", swapped);
        self.speaker_swapped = swapped;
        self.refresh_routes().await
    }

    pub async fn set_mic_mute(&mut self, muted: bool) -> Result<()> {
        self.mic_muted = muted;
        self.driver.set_mic_mute(muted).await
    }

    pub async fn set_voice_volume(&mut self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) || volume.is_nan() {
            return Err(HalError::InvalidArgument(format!(
                "voice volume {} outside [0.0, 1.0]",
                volume
            )));
        }
        self.driver.set_voice_volume(volume).await
    }

    /// True once if this stream's usecase was moved by another arbitration
    /// since the last check
    pub fn take_rerouted(&mut self, stream_id: Uuid) -> bool {
        self.rerouted.remove(&stream_id)
    }

    pub fn active_usecases(&self) -> Vec<ActiveUsecase> {
        self.registry
            .iter()
            .map(|u| ActiveUsecase {
                id: u.id,
                kind: u.kind,
                devices: u.requested_devices,
                out_path: u.out_path,
                in_path: u.in_path,
            })
            .collect()
    }

    pub fn stats(&self) -> RoutingStats {
        let mut stats = self.stats.clone();
        stats.usecases_active = self.registry.len();
        stats.active_paths = self
            .refcounts
            .active()
            .into_iter()
            .map(|(path, count)| (path.name().to_string(), count))
            .collect();
        stats
    }

    pub fn current_paths(&self, id: UsecaseId) -> Option<(Option<RoutePath>, Option<RoutePath>)> {
        self.registry.get(id).map(|u| (u.out_path, u.in_path))
    }

    fn note_arbitration(&mut self) {
        self.stats.arbitrations_total += 1;
        self.stats.last_arbitration_at = Some(Utc::now());
    }

    /// Resolve both directions for a usecase under the current device state,
    /// without mutating anything
    fn resolve_paths(
        &self,
        usecase: &AudioUsecase,
    ) -> Result<(Option<RoutePath>, Option<RoutePath>)> {
        let ctx = self.selection_context();

        let out_path = if usecase.kind.uses_output() {
            if let Some(inherited) = self.inherited_out_path(usecase) {
                route_debug!("Usecase {} inherits call route {}", usecase.id, inherited);
                Some(inherited)
            } else {
                Some(select_output_path(&self.config, usecase, &ctx)?)
            }
        } else {
            None
        };

        let in_path = if usecase.kind.uses_input() {
            if usecase.kind.is_call() {
                Some(select_input_path(&self.config, usecase, out_path, &ctx)?)
            } else if let Some(inherited) = self.inherited_in_path(usecase) {
                Some(inherited)
            } else {
                Some(select_input_path(&self.config, usecase, None, &ctx)?)
            }
        } else {
            None
        };

        Ok((out_path, in_path))
    }

    /// A non-call output usecase rides the call's route when both touch the
    /// shared codec backend; switching the codec away mid-call would mute
    /// the far end
    fn inherited_out_path(&self, usecase: &AudioUsecase) -> Option<RoutePath> {
        if usecase.kind.is_call() {
            return None;
        }
        let call = self.registry.active_call()?;
        if !self.config.uses_codec_backend(usecase.requested_devices.outputs())
            || !self.config.uses_codec_backend(call.requested_devices.outputs())
        {
            return None;
        }
        call.out_path
    }

    /// Capture opened during a call follows the call's capture route, under
    /// the same codec-sharing gate as the output side
    fn inherited_in_path(&self, usecase: &AudioUsecase) -> Option<RoutePath> {
        if usecase.kind.is_call() {
            return None;
        }
        let call = self.registry.active_call()?;
        if !self.config.uses_codec_backend(usecase.requested_devices.inputs())
            || !self.config.uses_codec_backend(call.requested_devices.inputs())
        {
            return None;
        }
        call.in_path
    }

    /// Usecases whose current path cannot coexist with `new_path`
    fn collect_displaced(
        &self,
        owner: UsecaseId,
        owner_devices: DeviceMask,
        new_path: RoutePath,
    ) -> Vec<Displaced> {
        self.registry
            .iter()
            .filter(|u| u.id != owner)
            .filter_map(|u| {
                let current = match new_path.direction() {
                    StreamDirection::Output => u.out_path,
                    StreamDirection::Input => u.in_path,
                }?;
                if !self.conflicts.needs_forced_switch(current, new_path) {
                    return None;
                }
                let derived = derive_displaced_path(
                    &self.conflicts,
                    u.requested_devices,
                    current,
                    owner_devices,
                    new_path,
                );
                Some(Displaced {
                    id: u.id,
                    stream_id: u.stream_id,
                    sidetone: u.kind.has_sidetone(),
                    old_path: current,
                    derived,
                })
            })
            .collect()
    }

    /// The arbitration engine: take everyone off the contested backend,
    /// bring up the new path, then re-enable the displaced usecases on
    /// their derived paths.
    ///
    /// Moving the displaced usecases is best effort: a driver failure there
    /// is logged and the sweep carries on, so the originating usecase still
    /// gets its route. Only the owner's own enable propagates.
    async fn sweep_and_enable(
        &mut self,
        owner: UsecaseId,
        owner_devices: DeviceMask,
        new_path: RoutePath,
    ) -> Result<()> {
        let displaced = self.collect_displaced(owner, owner_devices, new_path);

        for d in &displaced {
            info!(
                "{}: Forced switch of {}: {} -> {}",
                "ROUTE_ARB".on_cyan().white(),
                d.id,
                d.old_path,
                d.derived
            );
            if d.sidetone {
                if let Err(e) = self.driver.set_sidetone(false).await {
                    warn!("⚠️ Sidetone off before moving {} failed: {}", d.id, e);
                }
            }
            if let Err(e) = self.release_path(d.old_path).await {
                warn!("⚠️ Releasing {} from displaced {} failed: {}", d.old_path, d.id, e);
            }
        }

        if let Err(e) = self.acquire_path(new_path).await {
            // Put the displaced usecases back where they were before
            // reporting the owner's failure
            for d in &displaced {
                if let Err(e2) = self.acquire_path(d.old_path).await {
                    warn!("⚠️ Restoring {} on {} failed: {}", d.id, d.old_path, e2);
                }
                if d.sidetone {
                    if let Err(e2) = self.driver.set_sidetone(true).await {
                        warn!("⚠️ Sidetone back on for {} failed: {}", d.id, e2);
                    }
                }
            }
            return Err(e);
        }

        for d in &displaced {
            if let Err(e) = self.acquire_path(d.derived).await {
                warn!("⚠️ Re-enabling displaced {} on {} failed: {}", d.id, d.derived, e);
            }
            if let Some(entry) = self.registry.get_mut(d.id) {
                match d.old_path.direction() {
                    StreamDirection::Output => entry.out_path = Some(d.derived),
                    StreamDirection::Input => entry.in_path = Some(d.derived),
                }
            }
            if d.sidetone {
                if let Err(e) = self.driver.set_sidetone(true).await {
                    warn!("⚠️ Sidetone back on for {} failed: {}", d.id, e);
                }
            }
            self.rerouted.insert(d.stream_id);
            self.stats.forced_switches_total += 1;
        }

        Ok(())
    }

    /// Move one direction of a usecase to a new path, sweeping conflicts on
    /// the way in
    async fn switch_path(
        &mut self,
        id: UsecaseId,
        direction: StreamDirection,
        old: Option<RoutePath>,
        new: Option<RoutePath>,
    ) -> Result<()> {
        let (devices, sidetone, stream_id) = match self.registry.get(id) {
            Some(u) => (u.requested_devices, u.kind.has_sidetone(), u.stream_id),
            None => return Err(HalError::UsecaseNotFound { id }),
        };

        if sidetone {
            self.driver.set_sidetone(false).await?;
        }
        if let Some(old) = old {
            self.release_path(old).await?;
        }
        if let Some(new) = new {
            self.sweep_and_enable(id, devices, new).await?;
        }
        if let Some(entry) = self.registry.get_mut(id) {
            match direction {
                StreamDirection::Output => entry.out_path = new,
                StreamDirection::Input => entry.in_path = new,
            }
        }
        if sidetone {
            self.driver.set_sidetone(true).await?;
        }
        self.rerouted.insert(stream_id);
        Ok(())
    }

    /// After a call moved off `old_path` in `direction`, re-resolve the
    /// non-call usecases still sitting on it
    async fn drag_inherited(
        &mut self,
        direction: StreamDirection,
        old_path: RoutePath,
    ) -> Result<()> {
        let riders: Vec<UsecaseId> = self
            .registry
            .iter()
            .filter(|u| !u.kind.is_call())
            .filter(|u| match direction {
                StreamDirection::Output => u.out_path == Some(old_path),
                StreamDirection::Input => u.in_path == Some(old_path),
            })
            .map(|u| u.id)
            .collect();

        for id in riders {
            let entry = match self.registry.get(id) {
                Some(u) => u.clone(),
                None => continue,
            };
            let (new_out, new_in) = self.resolve_paths(&entry)?;
            let (current, new) = match direction {
                StreamDirection::Output => (entry.out_path, new_out),
                StreamDirection::Input => (entry.in_path, new_in),
            };
            if new != current {
                self.switch_path(id, direction, current, new).await?;
            }
        }
        Ok(())
    }

    /// Re-resolve every usecase after a global mode flip, calls first so
    /// their dependents inherit the fresh route
    async fn refresh_routes(&mut self) -> Result<()> {
        let mut ids = self.registry.ids();
        ids.sort_by_key(|id| if id.kind().is_call() { 0 } else { 1 });

        for id in ids {
            let entry = match self.registry.get(id) {
                Some(u) => u.clone(),
                None => continue,
            };
            let (new_out, new_in) = self.resolve_paths(&entry)?;
            if new_out != entry.out_path {
                self.switch_path(id, StreamDirection::Output, entry.out_path, new_out)
                    .await?;
            }
            if new_in != entry.in_path {
                self.switch_path(id, StreamDirection::Input, entry.in_path, new_in)
                    .await?;
            }
        }
        Ok(())
    }

    async fn acquire_path(&mut self, path: RoutePath) -> Result<()> {
        if self.refcounts.acquire(path) {
            debug!("🔧 Enabling path {} (id {})", path, path.id());
            if let Err(e) = self.driver.enable_path(path).await {
                // The count must not outlive a path the hardware refused
                self.refcounts.release(path);
                return Err(e);
            }
        } else {
            route_debug!(
                "Path {} already live (count {})",
                path,
                self.refcounts.count(path)
            );
        }
        Ok(())
    }

    async fn release_path(&mut self, path: RoutePath) -> Result<()> {
        if self.refcounts.release(path) {
            debug!("🔧 Disabling path {} (id {})", path, path.id());
            self.driver.disable_path(path).await?;
        }
        Ok(())
    }

    /// Test-support check: no two active usecases may hold conflicting paths
    pub fn routes_consistent(&self) -> bool {
        let entries: Vec<&AudioUsecase> = self.registry.iter().collect();
        for (i, a) in entries.iter().enumerate() {
            for b in entries.iter().skip(i + 1) {
                for (pa, pb) in [
                    (a.out_path, b.out_path),
                    (a.in_path, b.in_path),
                ] {
                    if let (Some(pa), Some(pb)) = (pa, pb) {
                        if !self.conflicts.paths_compatible(pa, pb) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::platform::driver::MockPlatformDriver;
    use crate::audio::platform::NullDriver;
    use mockall::predicate::eq;

    fn core() -> RoutingCore {
        RoutingCore::new(
            Arc::new(PlatformConfig::default()),
            Arc::new(NullDriver::new()),
        )
    }

    fn usecase(id: UsecaseId, devices: DeviceMask) -> AudioUsecase {
        AudioUsecase::new(id, devices, Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_duplicate_start_is_rejected() {
        let mut core = core();
        core.start_usecase(usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER))
            .await
            .unwrap();

        let err = core
            .start_usecase(usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER))
            .await
            .unwrap_err();
        assert!(matches!(err, HalError::DuplicateUsecase { .. }));
    }

    #[tokio::test]
    async fn test_reroute_to_same_devices_is_a_no_op() {
        let mut core = core();
        core.start_usecase(usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER))
            .await
            .unwrap();

        let changed = core
            .reroute_usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER)
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_playback_during_call_inherits_voice_route() {
        let mut core = core();
        core.set_call_mode(CallMode::InCall);
        core.start_usecase(usecase(
            UsecaseId::VoiceCall,
            DeviceMask::EARPIECE | DeviceMask::BUILTIN_MIC,
        ))
        .await
        .unwrap();

        core.start_usecase(usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER))
            .await
            .unwrap();

        let (out, _) = core.current_paths(UsecaseId::PlaybackDeepBuffer).unwrap();
        assert_eq!(out, Some(RoutePath::VoiceHandset));
        assert!(core.routes_consistent());
    }

    #[tokio::test]
    async fn test_bt_call_does_not_capture_codec_playback() {
        let mut core = core();
        core.set_call_mode(CallMode::InCall);
        core.start_usecase(usecase(
            UsecaseId::VoiceCall,
            DeviceMask::BLUETOOTH_SCO | DeviceMask::BLUETOOTH_SCO_MIC,
        ))
        .await
        .unwrap();

        core.start_usecase(usecase(UsecaseId::PlaybackDeepBuffer, DeviceMask::SPEAKER))
            .await
            .unwrap();

        // The speaker playback is not pulled onto the BT link; it picks its
        // own voice-mode speaker path on the codec instead
        let (out, _) = core.current_paths(UsecaseId::PlaybackDeepBuffer).unwrap();
        assert_eq!(out, Some(RoutePath::VoiceSpeaker));
        assert!(core.routes_consistent());
    }

    #[tokio::test]
    async fn test_mode_controls_reach_the_driver() {
        let mut mock = MockPlatformDriver::new();
        mock.expect_set_mic_mute()
            .with(eq(true))
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_set_voice_volume()
            .with(eq(0.5f32))
            .times(1)
            .returning(|_| Ok(()));

        let mut core =
            RoutingCore::new(Arc::new(PlatformConfig::default()), Arc::new(mock));
        core.set_mic_mute(true).await.unwrap();
        core.set_voice_volume(0.5).await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_range_volume_never_touches_the_driver() {
        let mut mock = MockPlatformDriver::new();
        mock.expect_set_voice_volume().times(0);

        let mut core =
            RoutingCore::new(Arc::new(PlatformConfig::default()), Arc::new(mock));
        assert!(core.set_voice_volume(1.5).await.is_err());
        assert!(core.set_voice_volume(-0.1).await.is_err());
        assert!(core.set_voice_volume(f32::NAN).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_usecase_reroute_fails() {
        let mut core = core();
        let err = core
            .reroute_usecase(UsecaseId::VoiceCall, DeviceMask::SPEAKER)
            .await
            .unwrap_err();
        assert!(matches!(err, HalError::UsecaseNotFound { .. }));
    }
}
