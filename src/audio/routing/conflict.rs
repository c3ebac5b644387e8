// Backend sharing and conflict resolution
//
// Two routing paths conflict when they differ but drive an overlapping set
// of hardware interfaces; the codec cannot hold both mixer configurations
// at once. This module answers two questions for the arbiter: does
// activating path B force everyone on path A to re-route, and if so, where
// does a displaced usecase land. The relation is built once from the
// platform tables, no name substring matching is involved.

use std::collections::HashMap;

use crate::audio::platform::PlatformConfig;
use crate::audio::types::{DeviceMask, RoutePath};

/// Explicit path-to-interface relation derived from the platform config
#[derive(Debug, Clone)]
pub struct BackendConflictMap {
    backends: HashMap<RoutePath, Vec<String>>,
    splits: HashMap<RoutePath, (RoutePath, RoutePath)>,
    primary: Vec<String>,
}

impl BackendConflictMap {
    pub fn from_config(config: &PlatformConfig) -> Self {
        let backends = config
            .paths
            .iter()
            .map(|spec| (spec.path, spec.backends.clone()))
            .collect();
        let splits = config
            .combos
            .iter()
            .map(|combo| (combo.path, combo.split))
            .collect();
        Self {
            backends,
            splits,
            primary: vec![config.primary_backend.clone()],
        }
    }

    /// Interfaces a path drives; unmapped paths ride the primary interface
    fn backend_set(&self, path: RoutePath) -> &[String] {
        match self.backends.get(&path) {
            Some(set) if !set.is_empty() => set,
            _ => &self.primary,
        }
    }

    pub fn backends_overlap(&self, a: RoutePath, b: RoutePath) -> bool {
        let set_b = self.backend_set(b);
        self.backend_set(a).iter().any(|name| set_b.contains(name))
    }

    pub fn split(&self, path: RoutePath) -> Option<(RoutePath, RoutePath)> {
        self.splits.get(&path).copied()
    }

    /// True when activating `activating` forces usecases on `current` to
    /// re-route: the paths differ, carry the same direction, and share at
    /// least one hardware interface
    pub fn needs_forced_switch(&self, current: RoutePath, activating: RoutePath) -> bool {
        current != activating
            && current.direction() == activating.direction()
            && self.backends_overlap(current, activating)
    }

    /// True when two active paths may coexist: equal, on disjoint
    /// interfaces, or one is a leg of the other's combo
    pub fn paths_compatible(&self, a: RoutePath, b: RoutePath) -> bool {
        if a == b || !self.backends_overlap(a, b) {
            return true;
        }
        if let Some((left, right)) = self.split(a) {
            if left == b || right == b {
                return true;
            }
        }
        if let Some((left, right)) = self.split(b) {
            if left == a || right == a {
                return true;
            }
        }
        false
    }
}

/// Pick the replacement path for a usecase displaced by a routing change.
///
/// `a1`/`d1` are the displaced usecase's device mask and current path,
/// `a2`/`d2` the activating usecase's mask and freshly selected path. The
/// rules are ordered; the first that applies wins. Two of them cover
/// request shapes the selector cannot currently produce, but every branch
/// is defined so the sweep never improvises.
pub fn derive_displaced_path(
    map: &BackendConflictMap,
    a1: DeviceMask,
    d1: RoutePath,
    a2: DeviceMask,
    d2: RoutePath,
) -> RoutePath {
    let a1 = a1.outputs();
    let a2 = a2.outputs();

    // Identical requests converge on the new path
    if a1 == a2 {
        return d2;
    }
    // Disjoint masks that still collided land on the new path
    if (a1 & a2).is_empty() {
        return d2;
    }

    // Overlapping masks: one side is a combo
    let existing_is_combo = a1.output_count() > 1;
    let combo_path = if existing_is_combo { d1 } else { d2 };

    let Some((first_leg, second_leg)) = map.split(combo_path) else {
        return d2;
    };

    // Legs on one shared interface cannot be pulled apart
    if map.backends_overlap(first_leg, second_leg) {
        return d2;
    }

    // An existing combo outranks a newcomer that lands on one of its own
    // legs; against any other path it surrenders the contested leg and
    // keeps the free one, or joins the new path when both legs collide
    if existing_is_combo {
        if first_leg == d2 || second_leg == d2 {
            return d1;
        }
        return match (
            map.backends_overlap(first_leg, d2),
            map.backends_overlap(second_leg, d2),
        ) {
            (false, true) => first_leg,
            (true, false) => second_leg,
            (true, true) => d2,
            (false, false) => d1,
        };
    }

    // Keep the displaced usecase audible on the leg that already carries
    // its interface
    if map.backends_overlap(first_leg, d1) {
        return first_leg;
    }
    if map.backends_overlap(second_leg, d1) {
        return second_leg;
    }
    second_leg
}
