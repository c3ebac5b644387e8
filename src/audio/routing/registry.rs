// Usecase registry and path reference counts
//
// The registry is the arbiter's bookkeeping: every active usecase in the
// order it appeared, plus a reference count per physical routing path.
// Paths are shared, so mixer controls are only touched on the 0 to 1 and
// 1 to 0 edges of their counts.

use std::collections::HashMap;
use tracing::warn;

use crate::audio::error::{HalError, Result};
use crate::audio::types::{AudioUsecase, RoutePath, UsecaseId};

/// Active usecases in registration order
#[derive(Debug, Default)]
pub struct UsecaseRegistry {
    entries: Vec<AudioUsecase>,
}

impl UsecaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: UsecaseId) -> bool {
        self.entries.iter().any(|u| u.id == id)
    }

    /// Register a usecase; each id may be active at most once
    pub fn add(&mut self, usecase: AudioUsecase) -> Result<()> {
        if self.contains(usecase.id) {
            return Err(HalError::DuplicateUsecase { id: usecase.id });
        }
        self.entries.push(usecase);
        Ok(())
    }

    /// Remove and return a usecase
    pub fn remove(&mut self, id: UsecaseId) -> Result<AudioUsecase> {
        match self.entries.iter().position(|u| u.id == id) {
            Some(pos) => Ok(self.entries.remove(pos)),
            None => Err(HalError::UsecaseNotFound { id }),
        }
    }

    pub fn get(&self, id: UsecaseId) -> Option<&AudioUsecase> {
        self.entries.iter().find(|u| u.id == id)
    }

    pub fn get_mut(&mut self, id: UsecaseId) -> Option<&mut AudioUsecase> {
        self.entries.iter_mut().find(|u| u.id == id)
    }

    /// Iterate in registration order; the conflict sweep depends on this
    pub fn iter(&self) -> impl Iterator<Item = &AudioUsecase> {
        self.entries.iter()
    }

    pub fn ids(&self) -> Vec<UsecaseId> {
        self.entries.iter().map(|u| u.id).collect()
    }

    /// The active voice or HFP call, if one is up
    pub fn active_call(&self) -> Option<&AudioUsecase> {
        self.entries.iter().find(|u| u.kind.is_call())
    }
}

/// Reference counts over physical routing paths.
///
/// acquire and release report the edges: acquire returns true when the count
/// went 0 to 1 (the caller must enable the path), release returns true when
/// it went 1 to 0 (the caller must disable it).
#[derive(Debug, Default)]
pub struct PathRefCounts {
    counts: HashMap<RoutePath, u32>,
}

impl PathRefCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, path: RoutePath) -> u32 {
        self.counts.get(&path).copied().unwrap_or(0)
    }

    /// Bump a path's count; true means the path just became live
    pub fn acquire(&mut self, path: RoutePath) -> bool {
        let count = self.counts.entry(path).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drop a path's count; true means the path just went idle.
    ///
    /// Releasing a path that was never acquired is a bookkeeping bug in the
    /// caller; it is logged and ignored rather than underflowed.
    pub fn release(&mut self, path: RoutePath) -> bool {
        match self.counts.get_mut(&path) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&path);
                    true
                } else {
                    false
                }
            }
            _ => {
                warn!("⚠️ Release of path {} with zero reference count", path);
                false
            }
        }
    }

    /// Live paths and their counts, in path id order
    pub fn active(&self) -> Vec<(RoutePath, u32)> {
        let mut paths: Vec<(RoutePath, u32)> =
            self.counts.iter().map(|(p, c)| (*p, *c)).collect();
        paths.sort_by_key(|(p, _)| p.id());
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::DeviceMask;
    use uuid::Uuid;

    fn usecase(id: UsecaseId) -> AudioUsecase {
        AudioUsecase::new(id, DeviceMask::SPEAKER, Uuid::new_v4())
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = UsecaseRegistry::new();
        registry.add(usecase(UsecaseId::PlaybackDeepBuffer)).unwrap();

        let err = registry
            .add(usecase(UsecaseId::PlaybackDeepBuffer))
            .unwrap_err();
        assert!(matches!(err, HalError::DuplicateUsecase { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_missing_is_an_error() {
        let mut registry = UsecaseRegistry::new();
        let err = registry.remove(UsecaseId::VoiceCall).unwrap_err();
        assert!(matches!(err, HalError::UsecaseNotFound { .. }));
    }

    #[test]
    fn test_iteration_preserves_registration_order() {
        let mut registry = UsecaseRegistry::new();
        registry.add(usecase(UsecaseId::PlaybackOffload)).unwrap();
        registry.add(usecase(UsecaseId::VoiceCall)).unwrap();
        registry.add(usecase(UsecaseId::CaptureDefault)).unwrap();
        registry.remove(UsecaseId::VoiceCall).unwrap();
        registry.add(usecase(UsecaseId::PlaybackLowLatency)).unwrap();

        assert_eq!(
            registry.ids(),
            vec![
                UsecaseId::PlaybackOffload,
                UsecaseId::CaptureDefault,
                UsecaseId::PlaybackLowLatency,
            ]
        );
    }

    #[test]
    fn test_active_call_lookup() {
        let mut registry = UsecaseRegistry::new();
        registry.add(usecase(UsecaseId::PlaybackDeepBuffer)).unwrap();
        assert!(registry.active_call().is_none());

        registry.add(usecase(UsecaseId::HfpCall)).unwrap();
        assert_eq!(registry.active_call().map(|u| u.id), Some(UsecaseId::HfpCall));
    }

    #[test]
    fn test_refcount_edges() {
        let mut counts = PathRefCounts::new();

        assert!(counts.acquire(RoutePath::Speaker), "0 to 1 enables");
        assert!(!counts.acquire(RoutePath::Speaker), "1 to 2 does not");
        assert_eq!(counts.count(RoutePath::Speaker), 2);

        assert!(!counts.release(RoutePath::Speaker), "2 to 1 keeps it live");
        assert!(counts.release(RoutePath::Speaker), "1 to 0 disables");
        assert_eq!(counts.count(RoutePath::Speaker), 0);
    }

    #[test]
    fn test_release_underflow_is_ignored() {
        let mut counts = PathRefCounts::new();
        assert!(!counts.release(RoutePath::Headphones));
        assert_eq!(counts.count(RoutePath::Headphones), 0);
    }
}
