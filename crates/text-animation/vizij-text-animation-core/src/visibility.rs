//! Per-character visibility states and timers.
//!
//! ```text
//! Hidden -> Showing -> Shown -> Hiding -> Hidden
//! ```
//!
//! Only the scheduler writes to the [`VisibilityTable`]; animations read it
//! through [`CharacterTimings`].

use serde::{Deserialize, Serialize};

/// Visibility of one character.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisibilityState {
    /// Not rendered. Initial state for characters that were never shown.
    #[default]
    Hidden,
    /// Running show animations.
    Showing,
    /// Steady state, running basic animations.
    Shown,
    /// Running hide animations.
    Hiding,
}

impl VisibilityState {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Showing => "showing",
            Self::Shown => "shown",
            Self::Hiding => "hiding",
        }
    }

    /// States the character settles in once requested visibility is reached.
    #[inline]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Hidden | Self::Shown)
    }

    /// State a character is heading to (or resting in).
    #[inline]
    pub fn target_visible(&self) -> bool {
        matches!(self, Self::Showing | Self::Shown)
    }
}

/// Record of one applied transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityChange {
    pub index: usize,
    pub from: VisibilityState,
    pub to: VisibilityState,
}

/// Visibility state, timer stamps and requested visibility, indexed by character.
#[derive(Clone, Debug, Default)]
pub struct VisibilityTable {
    states: Vec<VisibilityState>,
    state_since: Vec<f32>,
    visible_since: Vec<f32>,
    requested: Vec<bool>,
}

impl VisibilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize for a new text. Every character restarts `Hidden`.
    pub fn reset(&mut self, len: usize, now: f32, requested_visible: bool) {
        self.states.clear();
        self.states.resize(len, VisibilityState::Hidden);
        self.state_since.clear();
        self.state_since.resize(len, now);
        self.visible_since.clear();
        self.visible_since.resize(len, now);
        self.requested.clear();
        self.requested.resize(len, requested_visible);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[inline]
    pub fn state(&self, index: usize) -> VisibilityState {
        self.states.get(index).copied().unwrap_or_default()
    }

    #[inline]
    pub fn states(&self) -> &[VisibilityState] {
        &self.states
    }

    #[inline]
    pub fn requested_visible(&self, index: usize) -> bool {
        self.requested.get(index).copied().unwrap_or(false)
    }

    pub(crate) fn request(&mut self, index: usize, visible: bool) {
        if let Some(slot) = self.requested.get_mut(index) {
            *slot = visible;
        }
    }

    /// Apply a state change and stamp timers. `state_since` is reset on every
    /// change, `visible_since` only when entering or leaving `Hidden`.
    pub(crate) fn set_state(
        &mut self,
        index: usize,
        to: VisibilityState,
        now: f32,
    ) -> Option<VisibilityChange> {
        let from = *self.states.get(index)?;
        if from == to {
            return None;
        }
        self.states[index] = to;
        self.state_since[index] = now;
        if from == VisibilityState::Hidden || to == VisibilityState::Hidden {
            self.visible_since[index] = now;
        }
        Some(VisibilityChange { index, from, to })
    }

    /// Re-stamp every timer, used when the animator context is reset.
    pub(crate) fn restamp(&mut self, now: f32) {
        self.state_since.iter_mut().for_each(|t| *t = now);
        self.visible_since.iter_mut().for_each(|t| *t = now);
    }

    pub fn timings(&self, now: f32) -> CharacterTimings<'_> {
        CharacterTimings { table: self, now }
    }
}

/// Read-only view of per-character timers at the current tick time.
#[derive(Copy, Clone, Debug)]
pub struct CharacterTimings<'a> {
    table: &'a VisibilityTable,
    now: f32,
}

impl<'a> CharacterTimings<'a> {
    /// Seconds since the character's visibility state last changed.
    #[inline]
    pub fn state_time(&self, index: usize) -> f32 {
        self.table
            .state_since
            .get(index)
            .map_or(0.0, |since| (self.now - since).max(0.0))
    }

    /// Seconds since the character last entered or left `Hidden`.
    #[inline]
    pub fn visible_time(&self, index: usize) -> f32 {
        self.table
            .visible_since
            .get(index)
            .map_or(0.0, |since| (self.now - since).max(0.0))
    }

    #[inline]
    pub fn state(&self, index: usize) -> VisibilityState {
        self.table.state(index)
    }
}
