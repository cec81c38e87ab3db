//! Contexts handed to animations.

use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::character::CharacterRecord;
use crate::indices::IntervalIndices;
use crate::tag::{Tag, TagCategory};
use crate::visibility::CharacterTimings;

/// Named parameter values (e.g. `slow` -> `2.5`) shared by every animation of
/// an animator. Parameters that are not keywords resolve to themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordDatabase {
    keywords: HashMap<String, String>,
}

impl KeywordDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, keyword: impl Into<String>, value: impl Into<String>) {
        self.keywords.insert(keyword.into(), value.into());
    }

    #[inline]
    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.keywords.get(keyword).map(String::as_str)
    }

    /// Value of `raw` if it is a keyword, `raw` otherwise.
    #[inline]
    pub fn resolve<'a>(&'a self, raw: &'a str) -> &'a str {
        self.get(raw).unwrap_or(raw)
    }
}

/// Animator-wide time and scaling state. One per animator; reset on re-enable.
#[derive(Clone, Debug)]
pub struct AnimatorContext {
    /// Scaled seconds since the animator was (re-)enabled.
    pub passed_time: f32,
    /// Scaled seconds advanced by the current tick.
    pub delta_time: f32,
    pub time_scale: f32,
    /// Multiplier animations apply to spatial offsets.
    pub effect_scale: f32,
    pub keywords: Arc<KeywordDatabase>,
}

impl AnimatorContext {
    pub fn new(time_scale: f32) -> Self {
        Self {
            passed_time: 0.0,
            delta_time: 0.0,
            time_scale,
            effect_scale: 1.0,
            keywords: Arc::new(KeywordDatabase::new()),
        }
    }

    /// Advance by a raw host delta; the stored delta is scaled.
    pub(crate) fn advance(&mut self, dt: f32) {
        self.delta_time = dt.max(0.0) * self.time_scale;
        self.passed_time += self.delta_time;
    }

    /// Back to time zero, keeping scaling and keywords.
    pub(crate) fn reset(&mut self) {
        self.passed_time = 0.0;
        self.delta_time = 0.0;
    }
}

/// First/last visible and animatable character covered by one tag instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentData {
    pub first_index: usize,
    pub last_index: usize,
    /// Number of visible, animatable characters in the segment.
    pub count: usize,
}

impl SegmentData {
    /// Scan the interval over a per-character mask of visible, non-excluded
    /// characters; `None` if the interval covers none of them.
    pub fn compute(indices: &IntervalIndices, animatable: &[bool]) -> Option<Self> {
        let end = indices.end_or(animatable.len()).min(animatable.len());
        let range = animatable.get(indices.start..end)?;
        let first = range.iter().position(|a| *a)?;
        let last = range.iter().rposition(|a| *a)?;
        Some(SegmentData {
            first_index: indices.start + first,
            last_index: indices.start + last,
            count: range.iter().filter(|a| **a).count(),
        })
    }

    /// Mask of characters that take part in segments.
    pub fn animatable_mask(characters: &[CharacterRecord], excluded: &[bool]) -> Vec<bool> {
        characters
            .iter()
            .map(|ch| ch.is_visible && !excluded.get(ch.index).copied().unwrap_or(false))
            .collect()
    }

    /// Offset of `index` from the first character of the segment.
    #[inline]
    pub fn relative_index(&self, index: usize) -> usize {
        index.saturating_sub(self.first_index)
    }

    /// Position of `index` in the segment in `[0, 1]`.
    pub fn progress(&self, index: usize) -> f32 {
        let span = self.last_index.saturating_sub(self.first_index);
        if span == 0 {
            return 0.0;
        }
        (self.relative_index(index) as f32 / span as f32).clamp(0.0, 1.0)
    }
}

/// Per-tick state shared by every animation of one character.
#[derive(Copy, Clone, Debug)]
pub struct TickContext<'a> {
    pub animator: &'a AnimatorContext,
    pub timings: CharacterTimings<'a>,
}

/// Everything an animation may read while animating one character.
#[derive(Copy, Clone, Debug)]
pub struct AnimationContext<'a> {
    pub animator: &'a AnimatorContext,
    pub timings: CharacterTimings<'a>,
    pub tag: &'a Tag,
    pub indices: IntervalIndices,
    pub segment: Option<SegmentData>,
    pub category: TagCategory,
}

impl<'a> AnimationContext<'a> {
    #[inline]
    pub fn state_time(&self, index: usize) -> f32 {
        self.timings.state_time(index)
    }

    #[inline]
    pub fn visible_time(&self, index: usize) -> f32 {
        self.timings.visible_time(index)
    }

    #[inline]
    pub fn passed_time(&self) -> f32 {
        self.animator.passed_time
    }
}
