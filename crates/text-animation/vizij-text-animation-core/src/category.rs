//! Animation categories and per-character override/late resolution.
//!
//! Basic, show and hide animations share one implementation parameterized by
//! a [`CategoryPolicy`]. For one character a category applies, in two passes
//! (non-late, then late):
//!
//! 1. every default animation of the category;
//! 2. the covering tag animations from the resolution start to the top of the
//!    stack, where the resolution start is the last entry whose effective
//!    override flag is set (or the bottom of the stack if none is).

use std::fmt;
use std::sync::Arc;

use crate::builtin::DummyAnimation;
use crate::cache::{AnimationCacher, CacheReport, CachedAnimation, DropStage, DroppedTag};
use crate::cached_collection::CachedCollection;
use crate::character::CharacterRecord;
use crate::collection::TagIntervalCollection;
use crate::config::CategoryConfig;
use crate::context::{KeywordDatabase, SegmentData, TickContext};
use crate::effect::EffectDatabase;
use crate::error::Result;
use crate::indices::IntervalIndices;
use crate::tag::{Tag, TagCategory};

/// Replaceable per-category character filter.
pub type ExclusionPredicate = Arc<dyn Fn(&CharacterRecord) -> bool + Send + Sync>;

/// How a category decides that a character is done with it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CategoryPolicy {
    /// Done once every applied animation reports finished.
    pub all_must_finish: bool,
    /// Done as soon as one animation reports finished; later ones are skipped.
    pub short_circuit_on_first_finish: bool,
}

impl CategoryPolicy {
    /// Continuous animations never finish.
    pub const BASIC: Self = Self {
        all_must_finish: false,
        short_circuit_on_first_finish: false,
    };
    pub const SHOW: Self = Self {
        all_must_finish: true,
        short_circuit_on_first_finish: false,
    };
    pub const HIDE: Self = Self {
        all_must_finish: false,
        short_circuit_on_first_finish: true,
    };

    pub fn for_category(category: TagCategory) -> Self {
        match category {
            TagCategory::Show => Self::SHOW,
            TagCategory::Hide => Self::HIDE,
            _ => Self::BASIC,
        }
    }

    #[inline]
    fn tracks_finish(&self) -> bool {
        self.all_must_finish || self.short_circuit_on_first_finish
    }
}

/// Result of running one category on one character.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryRun {
    /// Animations that mutated the mesh (the exclusion dummy included).
    pub applied: usize,
    /// Whether the category is done with the character under its policy.
    pub finished: bool,
}

/// One animated category: settings, default animations and the cached tag lookup.
pub struct AnimationCategory {
    category: TagCategory,
    policy: CategoryPolicy,
    config: CategoryConfig,
    exclusion: ExclusionPredicate,
    /// Set by `set_exclusion`; config changes then leave the predicate alone.
    custom_exclusion: bool,
    excluded: Vec<bool>,
    animatable: Vec<bool>,
    defaults: Vec<CachedAnimation>,
    dummy: Option<CachedAnimation>,
    cached: CachedCollection,
    dirty: bool,
}

impl AnimationCategory {
    pub fn new(category: TagCategory, config: CategoryConfig) -> Self {
        Self {
            category,
            policy: CategoryPolicy::for_category(category),
            exclusion: Self::config_exclusion(&config),
            config,
            custom_exclusion: false,
            excluded: Vec::new(),
            animatable: Vec::new(),
            defaults: Vec::new(),
            dummy: None,
            cached: CachedCollection::empty(category),
            dirty: true,
        }
    }

    #[inline]
    pub fn category(&self) -> TagCategory {
        self.category
    }

    #[inline]
    pub fn policy(&self) -> CategoryPolicy {
        self.policy
    }

    #[inline]
    pub fn override_by_default(&self) -> bool {
        self.config.override_by_default
    }

    #[inline]
    pub fn cached(&self) -> &CachedCollection {
        &self.cached
    }

    #[inline]
    pub fn defaults(&self) -> &[CachedAnimation] {
        &self.defaults
    }

    #[inline]
    pub fn is_excluded(&self, index: usize) -> bool {
        self.excluded.get(index).copied().unwrap_or(false)
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_exclusion(&mut self, predicate: ExclusionPredicate) {
        self.exclusion = predicate;
        self.custom_exclusion = true;
        self.dirty = true;
    }

    /// Drop a custom predicate and go back to the configured exclusion rules.
    pub(crate) fn clear_custom_exclusion(&mut self) {
        self.custom_exclusion = false;
        self.exclusion = Self::config_exclusion(&self.config);
        self.dirty = true;
    }

    #[inline]
    pub fn has_custom_exclusion(&self) -> bool {
        self.custom_exclusion
    }

    pub(crate) fn set_config(&mut self, config: CategoryConfig) {
        if !self.custom_exclusion {
            self.exclusion = Self::config_exclusion(&config);
        }
        self.config = config;
        self.dirty = true;
    }

    fn config_exclusion(config: &CategoryConfig) -> ExclusionPredicate {
        let exclusion = config.exclusion.clone();
        Arc::new(move |ch: &CharacterRecord| exclusion.excludes(ch))
    }

    /// Whether a character has anything to run in this category.
    pub fn has_any_for(&self, index: usize) -> bool {
        !self.defaults.is_empty() || self.cached.has_any_containing(index)
    }

    /// Segment of a cached tag animation under this category's exclusion.
    pub fn segment_of(&self, animation: &CachedAnimation) -> Option<SegmentData> {
        animation.segment(&self.animatable)
    }

    /// Re-evaluate exclusion and re-cache defaults and tags.
    pub(crate) fn rebuild(
        &mut self,
        collection: &TagIntervalCollection,
        characters: &[CharacterRecord],
        effects: &EffectDatabase,
        keywords: &KeywordDatabase,
        report: &mut CacheReport,
    ) {
        let len = characters.len();
        self.excluded = characters.iter().map(|ch| (self.exclusion)(ch)).collect();
        self.animatable = SegmentData::animatable_mask(characters, &self.excluded);

        report.clear_category(self.category);
        let cacher = AnimationCacher::new(effects, keywords, self.category, len);

        self.defaults.clear();
        for (order, tag) in self.config.default_tags.iter().enumerate() {
            let indices = IntervalIndices::closed_range(0, len, order as u32);
            match cacher.cache_tag(tag, indices) {
                Ok(cached) => self.defaults.push(cached),
                Err(error) => report.record(DroppedTag {
                    category: Some(self.category),
                    tag: tag.clone(),
                    error,
                    stage: DropStage::Cache,
                }),
            }
        }

        let dummy_tag = Tag::new("dummy", '\0');
        self.dummy = cacher
            .cache_with(
                Arc::new(DummyAnimation),
                &dummy_tag,
                IntervalIndices::closed_range(0, len, 0),
            )
            .ok();

        self.cached = CachedCollection::build(collection, &cacher, report);
        self.dirty = false;
    }

    /// Consistency check run before every tick.
    pub(crate) fn ensure_fresh(&self, collection: &TagIntervalCollection) -> Result<()> {
        self.cached.ensure_fresh(collection)
    }

    /// Clear finished latches of every animation that may run on `index`.
    pub(crate) fn reset_finished(&mut self, index: usize) {
        for animation in &mut self.defaults {
            animation.reset_finished(index);
        }
        if let Some(mm) = self.cached.min_max_at(index) {
            for pos in mm.range() {
                if let Some(animation) = self.cached.get_mut(pos) {
                    animation.reset_finished(index);
                }
            }
        }
        if let Some(dummy) = self.dummy.as_mut() {
            dummy.reset_finished(index);
        }
    }

    /// Resolved tag stack for `index` into `out`, bottom to top.
    pub(crate) fn resolve_stack(&self, index: usize, out: &mut Vec<usize>) {
        out.clear();
        out.extend(self.cached.containing(index));
        let default = self.config.override_by_default;
        let start = out
            .iter()
            .rposition(|&pos| {
                self.cached
                    .get(pos)
                    .map_or(false, |a| a.overrides().unwrap_or(default))
            })
            .unwrap_or(0);
        out.drain(..start);
    }

    /// Names of the animations that would run on `index`, in application order.
    pub fn resolved_names(&self, index: usize) -> Vec<String> {
        if self.is_excluded(index) {
            return vec!["dummy".to_string()];
        }
        let mut stack = Vec::new();
        self.resolve_stack(index, &mut stack);
        let mut names = Vec::new();
        for late in [false, true] {
            for animation in self.defaults.iter().filter(|a| a.is_late() == late) {
                names.push(animation.tag().name.clone());
            }
            for animation in stack.iter().filter_map(|&pos| self.cached.get(pos)) {
                if animation.is_late() == late {
                    names.push(animation.tag().name.clone());
                }
            }
        }
        names
    }

    /// Apply the category to one character.
    pub(crate) fn run(
        &mut self,
        character: &mut CharacterRecord,
        tick: TickContext<'_>,
        stack: &mut Vec<usize>,
    ) -> CategoryRun {
        let index = character.index;
        let mut run = CategoryRun {
            applied: 0,
            finished: true,
        };

        if self.is_excluded(index) {
            if let Some(dummy) = self.dummy.as_mut() {
                dummy.animate(character, tick, &self.animatable);
                run.applied = 1;
                run.finished = dummy.is_finished(index, tick, &self.animatable);
            }
            return run;
        }

        self.resolve_stack(index, stack);
        let policy = self.policy;
        for late in [false, true] {
            for animation in self.defaults.iter_mut().filter(|a| a.is_late() == late) {
                if step(animation, character, tick, &self.animatable, policy, &mut run) {
                    return run;
                }
            }
            for &pos in stack.iter() {
                let Some(animation) = self.cached.get_mut(pos) else {
                    continue;
                };
                if animation.is_late() != late {
                    continue;
                }
                if step(animation, character, tick, &self.animatable, policy, &mut run) {
                    return run;
                }
            }
        }

        if policy.short_circuit_on_first_finish && run.applied > 0 {
            // nothing reported finished
            run.finished = false;
        }
        if !policy.tracks_finish() {
            run.finished = false;
        }
        run
    }
}

/// Animate one entry and fold its finished state into `run`. Returns `true`
/// when the policy short-circuits.
fn step(
    animation: &mut CachedAnimation,
    character: &mut CharacterRecord,
    tick: TickContext<'_>,
    animatable: &[bool],
    policy: CategoryPolicy,
    run: &mut CategoryRun,
) -> bool {
    animation.animate(character, tick, animatable);
    run.applied += 1;
    if policy.short_circuit_on_first_finish {
        if animation.is_finished(character.index, tick, animatable) {
            run.finished = true;
            return true;
        }
    } else if policy.all_must_finish && !animation.is_finished(character.index, tick, animatable) {
        run.finished = false;
    }
    false
}

impl fmt::Debug for AnimationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationCategory")
            .field("category", &self.category)
            .field("policy", &self.policy)
            .field("defaults", &self.defaults)
            .field("cached", &self.cached.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// The three animated categories of an animator.
#[derive(Debug)]
pub struct Categories {
    pub basic: AnimationCategory,
    pub show: AnimationCategory,
    pub hide: AnimationCategory,
}

impl Categories {
    pub fn new(basic: CategoryConfig, show: CategoryConfig, hide: CategoryConfig) -> Self {
        Self {
            basic: AnimationCategory::new(TagCategory::Basic, basic),
            show: AnimationCategory::new(TagCategory::Show, show),
            hide: AnimationCategory::new(TagCategory::Hide, hide),
        }
    }

    pub fn get(&self, category: TagCategory) -> Option<&AnimationCategory> {
        match category {
            TagCategory::Basic => Some(&self.basic),
            TagCategory::Show => Some(&self.show),
            TagCategory::Hide => Some(&self.hide),
            TagCategory::Event | TagCategory::Command => None,
        }
    }

    pub fn get_mut(&mut self, category: TagCategory) -> Option<&mut AnimationCategory> {
        match category {
            TagCategory::Basic => Some(&mut self.basic),
            TagCategory::Show => Some(&mut self.show),
            TagCategory::Hide => Some(&mut self.hide),
            TagCategory::Event | TagCategory::Command => None,
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AnimationCategory> {
        [&mut self.basic, &mut self.show, &mut self.hide].into_iter()
    }

    pub(crate) fn mark_all_dirty(&mut self) {
        self.iter_mut().for_each(AnimationCategory::mark_dirty);
    }

    /// Clear show and hide latches of a character entering a transient state.
    pub(crate) fn reset_appearance_latches(&mut self, index: usize) {
        self.show.reset_finished(index);
        self.hide.reset_finished(index);
    }
}
