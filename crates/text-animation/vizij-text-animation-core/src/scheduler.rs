//! Tick driver: visibility transitions and per-character category dispatch.
//!
//! Per tick, after time has advanced:
//! 1. requested visibility is turned into `Showing`/`Hiding` transitions;
//! 2. every character runs the categories its state selects;
//! 3. transitions deferred by the listener are drained, bounded by
//!    `max_cascade_rounds`.
//!
//! Every transition holds a guard for its cascading effects (latch resets,
//! event messages, listener call). Listeners cannot transition characters
//! directly; they queue requests through [`DeferredTransitions`].

use std::collections::VecDeque;

use crate::category::{Categories, CategoryRun};
use crate::character::CharacterRecord;
use crate::collection::TagIntervalCollection;
use crate::context::{AnimatorContext, TickContext};
use crate::error::{Result, TextAnimError};
use crate::outputs::{AnimatorEvent, TickOutputs};
use crate::scratch::Scratch;
use crate::tag::TagCategory;
use crate::visibility::{CharacterTimings, VisibilityChange, VisibilityState, VisibilityTable};

/// Visibility request queued while a transition was cascading.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransitionRequest {
    pub index: usize,
    pub visible: bool,
}

/// Handle handed to listeners for queueing follow-up transitions.
#[derive(Debug)]
pub struct DeferredTransitions<'a> {
    queue: &'a mut VecDeque<TransitionRequest>,
}

impl DeferredTransitions<'_> {
    pub fn request(&mut self, index: usize, visible: bool) {
        self.queue.push_back(TransitionRequest { index, visible });
    }

    pub fn show(&mut self, index: usize) {
        self.request(index, true);
    }

    pub fn hide(&mut self, index: usize) {
        self.request(index, false);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Observer of applied visibility transitions.
pub trait VisibilityListener {
    fn on_transition(&mut self, change: &VisibilityChange, deferred: &mut DeferredTransitions<'_>);
}

impl<F> VisibilityListener for F
where
    F: FnMut(&VisibilityChange, &mut DeferredTransitions<'_>),
{
    fn on_transition(&mut self, change: &VisibilityChange, deferred: &mut DeferredTransitions<'_>) {
        self(change, deferred)
    }
}

/// Mutable state owned by one animator and passed into every tick.
#[derive(Debug)]
pub struct SchedulerState {
    pub(crate) context: AnimatorContext,
    pub(crate) visibility: VisibilityTable,
    in_transition: bool,
    deferred: VecDeque<TransitionRequest>,
}

impl SchedulerState {
    pub fn new(time_scale: f32) -> Self {
        Self {
            context: AnimatorContext::new(time_scale),
            visibility: VisibilityTable::new(),
            in_transition: false,
            deferred: VecDeque::new(),
        }
    }

    #[inline]
    pub fn context(&self) -> &AnimatorContext {
        &self.context
    }

    #[inline]
    pub fn visibility(&self) -> &VisibilityTable {
        &self.visibility
    }

    /// Current timer clock.
    #[inline]
    pub fn now(&self) -> f32 {
        self.context.passed_time
    }

    #[inline]
    pub fn timings(&self) -> CharacterTimings<'_> {
        self.visibility.timings(self.context.passed_time)
    }

    #[inline]
    pub fn is_in_transition(&self) -> bool {
        self.in_transition
    }

    #[inline]
    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    fn begin_transition(&mut self, index: usize) -> Result<()> {
        if self.in_transition {
            return Err(TextAnimError::ReentrantTransition { index });
        }
        self.in_transition = true;
        Ok(())
    }

    fn end_transition(&mut self) {
        self.in_transition = false;
    }
}

/// Target state for a visibility request, `None` if the character already
/// heads there.
fn transition_for(state: VisibilityState, visible: bool) -> Option<VisibilityState> {
    match (state, visible) {
        (VisibilityState::Hidden | VisibilityState::Hiding, true) => Some(VisibilityState::Showing),
        (VisibilityState::Shown | VisibilityState::Showing, false) => Some(VisibilityState::Hiding),
        _ => None,
    }
}

/// Borrowed view of everything one tick (or one snap operation) touches.
pub(crate) struct Tick<'a> {
    pub state: &'a mut SchedulerState,
    pub characters: &'a mut [CharacterRecord],
    pub categories: &'a mut Categories,
    pub events: &'a TagIntervalCollection,
    pub listener: Option<&'a mut (dyn VisibilityListener + 'static)>,
    pub scratch: &'a mut Scratch,
    pub out: &'a mut TickOutputs,
    pub max_cascade_rounds: usize,
}

impl Tick<'_> {
    /// Tick body; time has already been advanced.
    pub fn run(&mut self) -> Result<()> {
        let shown_before = self.all_in(VisibilityState::Shown);
        let hidden_before = self.all_in(VisibilityState::Hidden);

        self.apply_requests()?;
        for index in 0..self.characters.len() {
            self.step_character(index)?;
        }
        self.drain_deferred()?;

        self.emit_completion(shown_before, hidden_before);
        Ok(())
    }

    fn apply_requests(&mut self) -> Result<()> {
        for index in 0..self.characters.len() {
            let state = self.state.visibility.state(index);
            let visible = self.state.visibility.requested_visible(index);
            if let Some(to) = transition_for(state, visible) {
                self.transition(index, to)?;
            }
        }
        Ok(())
    }

    fn step_character(&mut self, index: usize) -> Result<()> {
        let state = self.state.visibility.state(index);
        if state != VisibilityState::Hidden
            && self.characters.get(index).map_or(false, |ch| ch.is_visible)
        {
            self.out.stats.characters_animated += 1;
        }
        match state {
            VisibilityState::Hidden => {
                if let Some(character) = self.characters.get_mut(index) {
                    character.reset_to_cleared();
                }
            }
            VisibilityState::Showing => {
                let run = self.run_category(TagCategory::Show, index, true);
                if run.finished {
                    self.transition(index, VisibilityState::Shown)?;
                    let basic = &self.categories.basic;
                    if basic.has_any_for(index) && !basic.is_excluded(index) {
                        // compose the first basic pass on top of the final show frame
                        self.run_category(TagCategory::Basic, index, false);
                    }
                }
            }
            VisibilityState::Shown => {
                self.run_category(TagCategory::Basic, index, true);
            }
            VisibilityState::Hiding => {
                let run = self.run_category(TagCategory::Hide, index, true);
                if run.finished {
                    self.transition(index, VisibilityState::Hidden)?;
                    if let Some(character) = self.characters.get_mut(index) {
                        character.reset_to_cleared();
                    }
                }
            }
        }
        Ok(())
    }

    /// Run one category on one character. Glyph-less characters have nothing
    /// to animate and finish at once.
    fn run_category(&mut self, category: TagCategory, index: usize, from_source: bool) -> CategoryRun {
        let Some(character) = self.characters.get_mut(index) else {
            return CategoryRun::default();
        };
        if from_source {
            character.reset_to_source();
        }
        if !character.is_visible {
            return CategoryRun {
                applied: 0,
                finished: true,
            };
        }
        let Some(animations) = self.categories.get_mut(category) else {
            return CategoryRun::default();
        };
        let tick = TickContext {
            animator: &self.state.context,
            timings: self.state.visibility.timings(self.state.context.passed_time),
        };
        let run = animations.run(character, tick, &mut self.scratch.stack);
        self.out.stats.add_applied(category, run.applied);
        run
    }

    /// Apply one state change with its cascading effects.
    pub fn transition(
        &mut self,
        index: usize,
        to: VisibilityState,
    ) -> Result<Option<VisibilityChange>> {
        self.state.begin_transition(index)?;
        let now = self.state.now();
        let change = self.state.visibility.set_state(index, to, now);
        if let Some(change) = change {
            log::trace!(
                "character {} {} -> {}",
                index,
                change.from.name(),
                change.to.name()
            );
            self.out.stats.transitions += 1;
            self.out.push_event(change.into());

            if !to.is_settled() {
                self.categories.reset_appearance_latches(index);
            }
            if to == VisibilityState::Showing {
                for entry in self.events.tags_at(index) {
                    self.out.push_event(AnimatorEvent::Message {
                        name: entry.tag.name.clone(),
                        parameters: entry.tag.parameters.clone(),
                        index,
                    });
                }
            }
            if let Some(listener) = self.listener.as_deref_mut() {
                let mut deferred = DeferredTransitions {
                    queue: &mut self.state.deferred,
                };
                listener.on_transition(&change, &mut deferred);
            }
        }
        self.state.end_transition();
        Ok(change)
    }

    pub fn drain_deferred(&mut self) -> Result<()> {
        let mut rounds = 0;
        while !self.state.deferred.is_empty() {
            if rounds >= self.max_cascade_rounds {
                let dropped = self.state.deferred.len();
                log::warn!(
                    "dropping {} deferred visibility transitions after {} cascade rounds",
                    dropped,
                    rounds
                );
                self.out.stats.dropped_transitions += dropped;
                self.state.deferred.clear();
                break;
            }
            rounds += 1;
            let batch = std::mem::take(&mut self.state.deferred);
            for request in batch {
                if request.index >= self.characters.len() {
                    continue;
                }
                self.state.visibility.request(request.index, request.visible);
                let state = self.state.visibility.state(request.index);
                if let Some(to) = transition_for(state, request.visible) {
                    self.transition(request.index, to)?;
                }
            }
        }
        Ok(())
    }

    /// Snap transient characters to their settled state, then reset meshes.
    pub fn stop_animating(&mut self) -> Result<()> {
        let shown_before = self.all_in(VisibilityState::Shown);
        let hidden_before = self.all_in(VisibilityState::Hidden);
        for index in 0..self.characters.len() {
            match self.state.visibility.state(index) {
                VisibilityState::Showing => {
                    self.transition(index, VisibilityState::Shown)?;
                }
                VisibilityState::Hiding => {
                    self.transition(index, VisibilityState::Hidden)?;
                }
                VisibilityState::Hidden | VisibilityState::Shown => {}
            }
        }
        self.reset_meshes();
        self.drain_deferred()?;
        self.emit_completion(shown_before, hidden_before);
        Ok(())
    }

    /// Request every character and jump straight to the settled state.
    pub fn snap_all(&mut self, visible: bool) -> Result<()> {
        let shown_before = self.all_in(VisibilityState::Shown);
        let hidden_before = self.all_in(VisibilityState::Hidden);
        let target = if visible {
            VisibilityState::Shown
        } else {
            VisibilityState::Hidden
        };
        for index in 0..self.characters.len() {
            self.state.visibility.request(index, visible);
            self.transition(index, target)?;
        }
        self.reset_meshes();
        self.drain_deferred()?;
        self.emit_completion(shown_before, hidden_before);
        Ok(())
    }

    fn reset_meshes(&mut self) {
        for character in self.characters.iter_mut() {
            match self.state.visibility.state(character.index) {
                VisibilityState::Hidden => character.reset_to_cleared(),
                _ => character.reset_to_source(),
            }
        }
    }

    fn all_in(&self, state: VisibilityState) -> bool {
        let states = self.state.visibility.states();
        !states.is_empty() && states.iter().all(|s| *s == state)
    }

    fn emit_completion(&mut self, shown_before: bool, hidden_before: bool) {
        if !shown_before && self.all_in(VisibilityState::Shown) {
            log::debug!("text fully shown");
            self.out.push_event(AnimatorEvent::ShowCompleted);
        }
        if !hidden_before && self.all_in(VisibilityState::Hidden) {
            log::debug!("text fully hidden");
            self.out.push_event(AnimatorEvent::HideCompleted);
        }
    }
}
