//! Output contracts of the animator.
//!
//! Meshes are written in place on the character records; outputs only carry
//! the semantic events of a tick and a few counters. Hosts transport events
//! to their own callbacks.

use serde::{Deserialize, Serialize};

use crate::tag::{TagCategory, TagParameters};
use crate::visibility::{VisibilityChange, VisibilityState};

/// Discrete signals emitted while ticking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AnimatorEvent {
    VisibilityChanged {
        index: usize,
        from: VisibilityState,
        to: VisibilityState,
    },
    /// Every character reached `Shown` during this tick.
    ShowCompleted,
    /// Every character reached `Hidden` during this tick.
    HideCompleted,
    /// Event tag reached by a character that started showing.
    Message {
        name: String,
        parameters: TagParameters,
        index: usize,
    },
    /// A tag was skipped because it could not be cached or routed.
    TagDropped {
        category: Option<TagCategory>,
        name: String,
        reason: String,
    },
}

impl From<VisibilityChange> for AnimatorEvent {
    fn from(change: VisibilityChange) -> Self {
        AnimatorEvent::VisibilityChanged {
            index: change.index,
            from: change.from,
            to: change.to,
        }
    }
}

/// Counters for one tick.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickStats {
    /// Characters that ran at least one category.
    pub characters_animated: usize,
    pub basic_applied: usize,
    pub show_applied: usize,
    pub hide_applied: usize,
    pub transitions: usize,
    /// Events beyond `max_events_per_tick`.
    pub dropped_events: usize,
    /// Deferred transitions discarded after `max_cascade_rounds`.
    pub dropped_transitions: usize,
}

impl TickStats {
    pub fn applied(&self, category: TagCategory) -> usize {
        match category {
            TagCategory::Basic => self.basic_applied,
            TagCategory::Show => self.show_applied,
            TagCategory::Hide => self.hide_applied,
            TagCategory::Event | TagCategory::Command => 0,
        }
    }

    pub(crate) fn add_applied(&mut self, category: TagCategory, count: usize) {
        match category {
            TagCategory::Basic => self.basic_applied += count,
            TagCategory::Show => self.show_applied += count,
            TagCategory::Hide => self.hide_applied += count,
            TagCategory::Event | TagCategory::Command => {}
        }
    }
}

/// Outputs returned by `TextAnimator::update()`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TickOutputs {
    #[serde(default)]
    pub events: Vec<AnimatorEvent>,
    #[serde(default)]
    pub stats: TickStats,
    #[serde(skip)]
    max_events: Option<usize>,
}

impl TickOutputs {
    /// Outputs that keep at most `max_events` events; the rest are counted.
    pub fn with_event_limit(max_events: usize) -> Self {
        Self {
            max_events: Some(max_events),
            ..Self::default()
        }
    }

    /// Clear for a new tick, keeping the event limit.
    pub fn clear(&mut self) {
        self.events.clear();
        self.stats = TickStats::default();
    }

    pub fn push_event(&mut self, event: AnimatorEvent) {
        if self
            .max_events
            .map_or(false, |max| self.events.len() >= max)
        {
            self.stats.dropped_events += 1;
            return;
        }
        self.events.push(event);
    }

    /// Move events and counters produced between ticks into these outputs.
    pub(crate) fn absorb(&mut self, other: &mut TickOutputs) {
        for event in other.events.drain(..) {
            self.push_event(event);
        }
        self.stats.transitions += other.stats.transitions;
        self.stats.dropped_events += other.stats.dropped_events;
        self.stats.dropped_transitions += other.stats.dropped_transitions;
        other.stats = TickStats::default();
    }

    pub fn visibility_changes(&self) -> impl Iterator<Item = VisibilityChange> + '_ {
        self.events.iter().filter_map(|e| match *e {
            AnimatorEvent::VisibilityChanged { index, from, to } => {
                Some(VisibilityChange { index, from, to })
            }
            _ => None,
        })
    }

    pub fn messages(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.events.iter().filter_map(|e| match e {
            AnimatorEvent::Message { name, index, .. } => Some((name.as_str(), *index)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_beyond_the_limit_are_counted() {
        let mut out = TickOutputs::with_event_limit(1);
        out.push_event(AnimatorEvent::ShowCompleted);
        out.push_event(AnimatorEvent::HideCompleted);
        assert_eq!(out.events, vec![AnimatorEvent::ShowCompleted]);
        assert_eq!(out.stats.dropped_events, 1);
        out.clear();
        assert!(out.events.is_empty());
        assert_eq!(out.stats.dropped_events, 0);
    }

    #[test]
    fn absorb_moves_pending_events() {
        let mut pending = TickOutputs::default();
        pending.push_event(
            VisibilityChange {
                index: 2,
                from: VisibilityState::Showing,
                to: VisibilityState::Shown,
            }
            .into(),
        );
        pending.stats.transitions = 1;

        let mut out = TickOutputs::with_event_limit(8);
        out.absorb(&mut pending);
        assert!(pending.events.is_empty());
        assert_eq!(out.stats.transitions, 1);
        let changes: Vec<_> = out.visibility_changes().collect();
        assert_eq!(changes[0].to, VisibilityState::Shown);
    }
}
