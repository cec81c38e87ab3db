//! TextAnimator: data ownership and public API.
//!
//! Methods:
//! - new, set_text (route raw tags, close open ends, reset visibility)
//! - add_tag / remove_tag / remove_all_tags_at (validated now, applied next tick)
//! - visibility requests and snaps, queries
//! - update (edits -> rebuild -> consistency check -> tick), frame / advance

use std::ops::Range;
use std::sync::Arc;

use crate::cache::{CacheReport, DropStage, DroppedTag};
use crate::category::{AnimationCategory, Categories, ExclusionPredicate};
use crate::character::CharacterRecord;
use crate::collection::{CategoryTags, TagEntry, TagIntervalCollection};
use crate::config::{AnimatorConfig, CategoryConfig, UpdateMode};
use crate::context::{AnimatorContext, KeywordDatabase};
use crate::effect::EffectSet;
use crate::error::{Result, TextAnimError};
use crate::indices::IntervalIndices;
use crate::inputs::{AnimatorCommand, Inputs, TagEdit};
use crate::outputs::{AnimatorEvent, TickOutputs};
use crate::scheduler::{SchedulerState, Tick, VisibilityListener};
use crate::scratch::Scratch;
use crate::tag::{Tag, TagCategory, TagSpan};
use crate::visibility::VisibilityState;

/// Drives tag animations over one text.
pub struct TextAnimator {
    config: AnimatorConfig,
    effects: EffectSet,
    tags: CategoryTags,
    characters: Vec<CharacterRecord>,
    categories: Categories,
    state: SchedulerState,
    staged: Vec<TagEdit>,
    listener: Option<Box<dyn VisibilityListener>>,
    report: CacheReport,
    scratch: Scratch,
    enabled: bool,

    // Per-tick outputs, and what happened between ticks
    outputs: TickOutputs,
    pending: TickOutputs,
}

impl TextAnimator {
    /// Create an animator with no text.
    pub fn new(config: AnimatorConfig, effects: EffectSet) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            categories: Categories::new(
                config.basic.clone(),
                config.show.clone(),
                config.hide.clone(),
            ),
            state: SchedulerState::new(config.time_scale),
            outputs: TickOutputs::with_event_limit(config.max_events_per_tick),
            pending: TickOutputs::with_event_limit(config.max_events_per_tick),
            config,
            effects,
            tags: CategoryTags::default(),
            characters: Vec::new(),
            staged: Vec::new(),
            listener: None,
            report: CacheReport::new(),
            scratch: Scratch::with_capacity(16),
            enabled: true,
        })
    }

    /// Animator over the built-in `wave` and `fade` animations.
    pub fn with_builtins(config: AnimatorConfig) -> Result<Self> {
        Self::new(config, EffectSet::builtins())
    }

    #[inline]
    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    #[inline]
    pub fn effects(&self) -> &EffectSet {
        &self.effects
    }

    /// Replace the text. Raw tags are routed by prefix in order; tags that
    /// cannot be routed or have invalid bounds are dropped and reported.
    /// Every character restarts `Hidden`, requested visible per
    /// `start_visible`.
    pub fn set_text(
        &mut self,
        mut characters: Vec<CharacterRecord>,
        spans: impl IntoIterator<Item = TagSpan>,
    ) {
        self.tags.clear();
        self.staged.clear();
        self.report.clear();

        for span in spans {
            let category = self.config.prefixes.category_for(span.prefix);
            if let Err(error) = self.tags.insert_span(span.clone(), &self.config.prefixes) {
                let (tag, _, _) = span.into_parts();
                self.drop_tag(category, tag, error);
            }
        }

        let len = characters.len();
        for character in &mut characters {
            character.reset_to_cleared();
        }
        self.characters = characters;
        self.tags.close_open_indices(len);
        let now = self.state.now();
        self.state
            .visibility
            .reset(len, now, self.config.start_visible);
        self.categories.mark_all_dirty();
        log::debug!(
            "text set: {} characters, {} basic / {} show / {} hide tags",
            len,
            self.tags.basic.len(),
            self.tags.show.len(),
            self.tags.hide.len()
        );
    }

    #[inline]
    pub fn characters(&self) -> &[CharacterRecord] {
        &self.characters
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    // --- tags ---

    /// Collection of one category, without staged edits.
    pub fn tags(&self, category: TagCategory) -> &TagIntervalCollection {
        self.tags.get(category)
    }

    pub fn tags_at(&self, category: TagCategory, index: usize) -> &[TagEntry] {
        self.tags.get(category).tags_at(index)
    }

    /// Typewriter commands starting at `index`. They are stored, never executed.
    pub fn commands_at(&self, index: usize) -> &[TagEntry] {
        self.tags.commands.tags_at(index)
    }

    /// Stage a tag insertion. Bounds are checked now; the tag joins its
    /// collection at the start of the next tick.
    pub fn add_tag(
        &mut self,
        category: TagCategory,
        tag: Tag,
        start: i32,
        end: i32,
        order: Option<u32>,
    ) -> Result<()> {
        IntervalIndices::validate_raw(start, end)?;
        self.staged.push(TagEdit::Add {
            category,
            tag,
            start,
            end,
            order,
        });
        Ok(())
    }

    /// Stage removal of an exact entry, as listed by [`tags_at`](Self::tags_at).
    pub fn remove_tag(&mut self, category: TagCategory, tag: Tag, indices: IntervalIndices) {
        self.staged.push(TagEdit::Remove {
            category,
            tag,
            indices,
        });
    }

    pub fn remove_all_tags_at(&mut self, category: TagCategory, index: usize) {
        self.staged
            .push(TagEdit::RemoveAllAt { category, index });
    }

    #[inline]
    pub fn has_staged_edits(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Tags dropped for the current text.
    #[inline]
    pub fn cache_report(&self) -> &CacheReport {
        &self.report
    }

    pub fn category(&self, category: TagCategory) -> Option<&AnimationCategory> {
        self.categories.get(category)
    }

    // --- visibility ---

    /// Request a character to appear or disappear from the next tick on.
    pub fn set_visibility(&mut self, index: usize, visible: bool) -> Result<()> {
        self.check_index(index)?;
        self.state.visibility.request(index, visible);
        Ok(())
    }

    pub fn set_visibility_range(&mut self, range: Range<usize>, visible: bool) -> Result<()> {
        if range.end > self.characters.len() {
            return Err(TextAnimError::CharacterOutOfRange {
                index: range.end - 1,
                len: self.characters.len(),
            });
        }
        for index in range {
            self.state.visibility.request(index, visible);
        }
        Ok(())
    }

    pub fn show_all(&mut self) {
        for index in 0..self.characters.len() {
            self.state.visibility.request(index, true);
        }
    }

    pub fn hide_all(&mut self) {
        for index in 0..self.characters.len() {
            self.state.visibility.request(index, false);
        }
    }

    /// Show every character without running show animations.
    pub fn show_all_immediately(&mut self) -> Result<()> {
        self.with_pending_tick(|tick| tick.snap_all(true))
    }

    /// Hide every character without running hide animations.
    pub fn hide_all_immediately(&mut self) -> Result<()> {
        self.with_pending_tick(|tick| tick.snap_all(false))
    }

    /// Snap `Showing` to `Shown` and `Hiding` to `Hidden`, then reset every mesh.
    pub fn stop_animating(&mut self) -> Result<()> {
        self.with_pending_tick(|tick| tick.stop_animating())
    }

    #[inline]
    pub fn visibility_state(&self, index: usize) -> VisibilityState {
        self.state.visibility.state(index)
    }

    pub fn visibility_states(&self) -> &[VisibilityState] {
        self.state.visibility.states()
    }

    /// Seconds since the character's state last changed.
    #[inline]
    pub fn state_time(&self, index: usize) -> f32 {
        self.state.timings().state_time(index)
    }

    /// Seconds since the character last entered or left `Hidden`.
    #[inline]
    pub fn visible_time(&self, index: usize) -> f32 {
        self.state.timings().visible_time(index)
    }

    pub fn is_fully_shown(&self) -> bool {
        self.visibility_states()
            .iter()
            .all(|s| *s == VisibilityState::Shown)
    }

    pub fn is_fully_hidden(&self) -> bool {
        self.visibility_states()
            .iter()
            .all(|s| *s == VisibilityState::Hidden)
    }

    // --- configuration ---

    /// Replace a category's exclusion predicate. Returns `false` for
    /// categories without animations.
    pub fn set_exclusion(&mut self, category: TagCategory, predicate: ExclusionPredicate) -> bool {
        match self.categories.get_mut(category) {
            Some(animations) => {
                animations.set_exclusion(predicate);
                true
            }
            None => false,
        }
    }

    /// Restore the configured exclusion rules after `set_exclusion`.
    pub fn clear_exclusion(&mut self, category: TagCategory) -> bool {
        match self.categories.get_mut(category) {
            Some(animations) => {
                animations.clear_custom_exclusion();
                true
            }
            None => false,
        }
    }

    /// Replace a category's settings. A predicate installed with
    /// `set_exclusion` stays in effect until `clear_exclusion`.
    pub fn set_category_config(&mut self, category: TagCategory, config: CategoryConfig) -> bool {
        if !category.is_animated() {
            return false;
        }
        *self.config.category_mut(category) = config.clone();
        if let Some(animations) = self.categories.get_mut(category) {
            animations.set_config(config);
        }
        true
    }

    pub fn set_listener(&mut self, listener: Option<Box<dyn VisibilityListener>>) {
        self.listener = listener;
    }

    /// Keywords are resolved while caching, so every category is rebuilt.
    pub fn set_keywords(&mut self, keywords: KeywordDatabase) {
        self.state.context.keywords = Arc::new(keywords);
        self.categories.mark_all_dirty();
    }

    pub fn set_time_scale(&mut self, scale: f32) -> Result<()> {
        validate_time_scale(scale)?;
        self.config.time_scale = scale;
        self.state.context.time_scale = scale;
        Ok(())
    }

    pub fn set_effect_scale(&mut self, scale: f32) {
        self.state.context.effect_scale = scale;
    }

    #[inline]
    pub fn update_mode(&self) -> UpdateMode {
        self.config.update_mode
    }

    pub fn set_update_mode(&mut self, mode: UpdateMode) {
        self.config.update_mode = mode;
    }

    /// Disabling suspends ticking. Re-enabling restarts the animator clock at
    /// zero and re-stamps every character timer.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.state.context.reset();
            let now = self.state.now();
            self.state.visibility.restamp(now);
        }
        self.enabled = enabled;
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn context(&self) -> &AnimatorContext {
        &self.state.context
    }

    #[inline]
    pub fn scheduler_state(&self) -> &SchedulerState {
        &self.state
    }

    /// Outputs of the last tick.
    #[inline]
    pub fn outputs(&self) -> &TickOutputs {
        &self.outputs
    }

    // --- ticking ---

    /// Host frame callback. Only valid in [`UpdateMode::Automatic`].
    pub fn frame(&mut self, dt: f32) -> Result<&TickOutputs> {
        self.update(UpdateMode::Automatic, dt, Inputs::default())
    }

    /// Caller-driven step. Only valid in [`UpdateMode::Manual`].
    pub fn advance(&mut self, dt: f32) -> Result<&TickOutputs> {
        self.update(UpdateMode::Manual, dt, Inputs::default())
    }

    /// Apply `inputs` and step by `dt` on behalf of `driver`. Rejected as a
    /// whole when disabled, when `driver` is not the configured mode, or when
    /// a command is invalid.
    pub fn update(&mut self, driver: UpdateMode, dt: f32, inputs: Inputs) -> Result<&TickOutputs> {
        if !self.enabled {
            return Err(TextAnimError::Disabled);
        }
        if driver != self.config.update_mode {
            return Err(TextAnimError::WrongUpdateMode {
                requested: match driver {
                    UpdateMode::Automatic => "tick from the frame callback",
                    UpdateMode::Manual => "advance manually",
                },
                current: self.config.update_mode,
            });
        }
        for command in &inputs.commands {
            self.validate_command(command)?;
        }

        self.outputs.clear();
        for edit in inputs.edits {
            self.stage_edit(edit);
        }
        for command in inputs.commands {
            self.apply_command(command)?;
        }
        self.outputs.absorb(&mut self.pending);

        self.apply_staged();
        self.rebuild_dirty();
        for category in TagCategory::ANIMATED {
            if let Some(animations) = self.categories.get(category) {
                animations.ensure_fresh(self.tags.get(category))?;
            }
        }

        self.state.context.advance(dt);
        self.scratch.begin_tick();
        let mut tick = Tick {
            state: &mut self.state,
            characters: &mut self.characters,
            categories: &mut self.categories,
            events: &self.tags.events,
            listener: self.listener.as_deref_mut(),
            scratch: &mut self.scratch,
            out: &mut self.outputs,
            max_cascade_rounds: self.config.max_cascade_rounds,
        };
        tick.run()?;
        Ok(&self.outputs)
    }

    fn with_pending_tick(&mut self, f: impl FnOnce(&mut Tick<'_>) -> Result<()>) -> Result<()> {
        let mut tick = Tick {
            state: &mut self.state,
            characters: &mut self.characters,
            categories: &mut self.categories,
            events: &self.tags.events,
            listener: self.listener.as_deref_mut(),
            scratch: &mut self.scratch,
            out: &mut self.pending,
            max_cascade_rounds: self.config.max_cascade_rounds,
        };
        f(&mut tick)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.characters.len() {
            return Err(TextAnimError::CharacterOutOfRange {
                index,
                len: self.characters.len(),
            });
        }
        Ok(())
    }

    fn validate_command(&self, command: &AnimatorCommand) -> Result<()> {
        match *command {
            AnimatorCommand::SetVisibility { index, .. } => self.check_index(index),
            AnimatorCommand::SetVisibilityRange { end, .. } if end > self.characters.len() => {
                Err(TextAnimError::CharacterOutOfRange {
                    index: end - 1,
                    len: self.characters.len(),
                })
            }
            AnimatorCommand::SetTimeScale { scale } => validate_time_scale(scale),
            _ => Ok(()),
        }
    }

    fn apply_command(&mut self, command: AnimatorCommand) -> Result<()> {
        match command {
            AnimatorCommand::SetVisibility { index, visible } => self.set_visibility(index, visible),
            AnimatorCommand::SetVisibilityRange {
                start,
                end,
                visible,
            } => self.set_visibility_range(start..end, visible),
            AnimatorCommand::ShowAll => {
                self.show_all();
                Ok(())
            }
            AnimatorCommand::HideAll => {
                self.hide_all();
                Ok(())
            }
            AnimatorCommand::ShowAllImmediately => self.show_all_immediately(),
            AnimatorCommand::HideAllImmediately => self.hide_all_immediately(),
            AnimatorCommand::StopAnimating => self.stop_animating(),
            AnimatorCommand::SetTimeScale { scale } => self.set_time_scale(scale),
            AnimatorCommand::SetEffectScale { scale } => {
                self.set_effect_scale(scale);
                Ok(())
            }
        }
    }

    /// Edits from inputs are validated like direct calls; invalid ones are dropped.
    fn stage_edit(&mut self, edit: TagEdit) {
        if let TagEdit::Add {
            category,
            ref tag,
            start,
            end,
            ..
        } = edit
        {
            if let Err(error) = IntervalIndices::validate_raw(start, end) {
                let tag = tag.clone();
                self.drop_tag(Some(category), tag, error);
                return;
            }
        }
        self.staged.push(edit);
    }

    fn apply_staged(&mut self) {
        if self.staged.is_empty() {
            return;
        }
        let len = self.characters.len();
        for edit in std::mem::take(&mut self.staged) {
            let category = edit.category();
            let collection = self.tags.get_mut(category);
            match edit {
                TagEdit::Add {
                    tag,
                    start,
                    end,
                    order,
                    ..
                } => {
                    if let Err(error) = collection.add(tag.clone(), start, end, order) {
                        self.drop_tag(Some(category), tag, error);
                        continue;
                    }
                }
                TagEdit::Remove { tag, indices, .. } => {
                    if !collection.remove(&tag, &indices) {
                        log::debug!("no {} tag '{}' at {:?} to remove", category, tag.name, indices);
                    }
                }
                TagEdit::RemoveAllAt { index, .. } => {
                    collection.remove_all_at(index);
                }
            }
            collection.close_open_indices(len);
            if let Some(animations) = self.categories.get_mut(category) {
                animations.mark_dirty();
            }
        }
    }

    fn rebuild_dirty(&mut self) {
        for category in TagCategory::ANIMATED {
            let (Some(animations), Some(effects)) =
                (self.categories.get_mut(category), self.effects.get(category))
            else {
                continue;
            };
            if !animations.is_dirty() {
                continue;
            }
            let reported = self.report.cache_drops(category);
            animations.rebuild(
                self.tags.get(category),
                &self.characters,
                effects,
                &self.state.context.keywords,
                &mut self.report,
            );
            // only drops this rebuild introduced
            for dropped in self.report.cache_drops(category) {
                if reported.contains(&dropped) {
                    continue;
                }
                self.outputs.push_event(AnimatorEvent::TagDropped {
                    category: dropped.category,
                    name: dropped.tag.name.clone(),
                    reason: dropped.error.to_string(),
                });
            }
        }
    }

    fn drop_tag(&mut self, category: Option<TagCategory>, tag: Tag, error: TextAnimError) {
        self.pending.push_event(AnimatorEvent::TagDropped {
            category,
            name: tag.name.clone(),
            reason: error.to_string(),
        });
        self.report.record(DroppedTag {
            category,
            tag,
            error,
            stage: DropStage::Ingestion,
        });
    }
}

fn validate_time_scale(scale: f32) -> Result<()> {
    if !scale.is_finite() || scale < 0.0 {
        return Err(TextAnimError::Config {
            reason: format!("time_scale must be finite and >= 0, got {scale}"),
        });
    }
    Ok(())
}

impl std::fmt::Debug for TextAnimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextAnimator")
            .field("characters", &self.characters.len())
            .field("categories", &self.categories)
            .field("state", &self.state)
            .field("staged", &self.staged.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}
