//! Tag instances bound to their animation implementation.
//!
//! An [`AnimationCacher`] turns `(Tag, IntervalIndices)` entries into
//! [`CachedAnimation`]s. Tags that cannot be cached are reported, never fatal.

use std::cell::OnceCell;
use std::sync::Arc;

use hashbrown::HashSet;

use crate::character::CharacterRecord;
use crate::context::{AnimationContext, KeywordDatabase, SegmentData, TickContext};
use crate::effect::{CustomData, DynTextAnimation, EffectDatabase};
use crate::error::{Result, TextAnimError};
use crate::indices::IntervalIndices;
use crate::tag::{Tag, TagCategory};

/// Reserved parameter read by the cacher: `override`, `override=true|false`.
pub const OVERRIDE_MODIFIER: &str = "override";
/// Reserved parameter read by the cacher: `late`, `late=true|false`.
pub const LATE_MODIFIER: &str = "late";

/// A tag bound to its animation and per-instance runtime state.
pub struct CachedAnimation {
    tag: Tag,
    indices: IntervalIndices,
    category: TagCategory,
    late: bool,
    overrides: Option<bool>,
    animation: Arc<dyn DynTextAnimation>,
    data: CustomData,
    /// Character indices this instance reported finished for since their last reset.
    finished: HashSet<usize>,
    segment: OnceCell<Option<SegmentData>>,
}

impl CachedAnimation {
    #[inline]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Closed interval covered by this instance.
    #[inline]
    pub fn indices(&self) -> IntervalIndices {
        self.indices
    }

    #[inline]
    pub fn category(&self) -> TagCategory {
        self.category
    }

    #[inline]
    pub fn is_late(&self) -> bool {
        self.late
    }

    /// `None` inherits the category default.
    #[inline]
    pub fn overrides(&self) -> Option<bool> {
        self.overrides
    }

    #[inline]
    pub fn animation_name(&self) -> &str {
        self.animation.name()
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(index)
    }

    /// Segment of the interval, computed on first use.
    pub fn segment(&self, animatable: &[bool]) -> Option<SegmentData> {
        *self
            .segment
            .get_or_init(|| SegmentData::compute(&self.indices, animatable))
    }

    pub(crate) fn animate(
        &mut self,
        character: &mut CharacterRecord,
        tick: TickContext<'_>,
        animatable: &[bool],
    ) {
        let segment = self.segment(animatable);
        let ctx = AnimationContext {
            animator: tick.animator,
            timings: tick.timings,
            tag: &self.tag,
            indices: self.indices,
            segment,
            category: self.category,
        };
        self.animation.animate(&mut self.data, character, &ctx);
    }

    /// Ask the animation whether it is done with `index`. A `true` answer is
    /// latched until [`reset_finished`](Self::reset_finished).
    pub(crate) fn is_finished(
        &mut self,
        index: usize,
        tick: TickContext<'_>,
        animatable: &[bool],
    ) -> bool {
        if self.finished.contains(&index) {
            return true;
        }
        let segment = self.segment(animatable);
        let ctx = AnimationContext {
            animator: tick.animator,
            timings: tick.timings,
            tag: &self.tag,
            indices: self.indices,
            segment,
            category: self.category,
        };
        let done = self.animation.finished(&self.data, index, &ctx);
        if done {
            self.finished.insert(index);
        }
        done
    }

    #[inline]
    pub(crate) fn reset_finished(&mut self, index: usize) {
        self.finished.remove(&index);
    }

    #[inline]
    pub fn has_finished(&self, index: usize) -> bool {
        self.finished.contains(&index)
    }
}

impl std::fmt::Debug for CachedAnimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedAnimation")
            .field("tag", &self.tag.name)
            .field("indices", &self.indices)
            .field("category", &self.category)
            .field("late", &self.late)
            .field("overrides", &self.overrides)
            .finish()
    }
}

/// Where a tag was dropped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DropStage {
    /// Rejected while routing or staging: bad prefix or bounds. Lives until
    /// the next `set_text`.
    Ingestion,
    /// Rejected by the animation cacher. Recomputed on every rebuild.
    Cache,
}

/// A tag that could not be cached, kept for diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct DroppedTag {
    /// `None` when the tag could not even be routed to a category.
    pub category: Option<TagCategory>,
    pub tag: Tag,
    pub error: TextAnimError,
    pub stage: DropStage,
}

/// Dropped tags of the current text, across every category.
#[derive(Clone, Debug, Default)]
pub struct CacheReport {
    dropped: Vec<DroppedTag>,
}

impl CacheReport {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn dropped(&self) -> &[DroppedTag] {
        &self.dropped
    }

    #[inline]
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    pub fn dropped_in(&self, category: TagCategory) -> impl Iterator<Item = &DroppedTag> + '_ {
        self.dropped
            .iter()
            .filter(move |d| d.category == Some(category))
    }

    pub(crate) fn record(&mut self, dropped: DroppedTag) {
        log::warn!(
            "dropping {} tag '{}': {}",
            dropped.category.map_or("unrouted", |c| c.name()),
            dropped.tag.name,
            dropped.error
        );
        self.dropped.push(dropped);
    }

    /// Cache-stage drops of one category, in recording order.
    pub(crate) fn cache_drops(&self, category: TagCategory) -> Vec<DroppedTag> {
        self.dropped_in(category)
            .filter(|d| d.stage == DropStage::Cache)
            .cloned()
            .collect()
    }

    /// Forget the cache-stage drops of one category before it is rebuilt.
    pub(crate) fn clear_category(&mut self, category: TagCategory) {
        self.dropped
            .retain(|d| d.category != Some(category) || d.stage != DropStage::Cache);
    }

    pub(crate) fn clear(&mut self) {
        self.dropped.clear();
    }
}

/// Factory turning tag entries of one category into [`CachedAnimation`]s.
#[derive(Copy, Clone, Debug)]
pub struct AnimationCacher<'a> {
    effects: &'a EffectDatabase,
    keywords: &'a KeywordDatabase,
    category: TagCategory,
    char_count: usize,
}

impl<'a> AnimationCacher<'a> {
    pub fn new(
        effects: &'a EffectDatabase,
        keywords: &'a KeywordDatabase,
        category: TagCategory,
        char_count: usize,
    ) -> Self {
        Self {
            effects,
            keywords,
            category,
            char_count,
        }
    }

    #[inline]
    pub fn category(&self) -> TagCategory {
        self.category
    }

    #[inline]
    pub fn char_count(&self) -> usize {
        self.char_count
    }

    /// Resolve `tag` through the effect database and let the animation parse
    /// its parameters. Open indices are closed against the character count.
    pub fn cache_tag(&self, tag: &Tag, indices: IntervalIndices) -> Result<CachedAnimation> {
        let animation =
            self.effects
                .get_effect(&tag.name)
                .ok_or_else(|| TextAnimError::UnknownEffect {
                    category: self.category,
                    name: tag.name.clone(),
                })?;
        self.cache_with(animation, tag, indices)
    }

    /// Cache `tag` against an explicit animation, bypassing the database.
    pub fn cache_with(
        &self,
        animation: Arc<dyn DynTextAnimation>,
        tag: &Tag,
        indices: IntervalIndices,
    ) -> Result<CachedAnimation> {
        if !animation.validate_parameters(&tag.parameters) {
            return Err(TextAnimError::InvalidParameters {
                name: tag.name.clone(),
                reason: "rejected by parameter validation".into(),
            });
        }
        let overrides = modifier(tag, OVERRIDE_MODIFIER)?;
        let late = modifier(tag, LATE_MODIFIER)?.unwrap_or(false) || animation.is_late();

        let mut data = animation.new_custom_data();
        animation
            .set_parameters(&mut data, &tag.parameters, self.keywords)
            .map_err(|err| TextAnimError::InvalidParameters {
                name: tag.name.clone(),
                reason: err.to_string(),
            })?;

        Ok(CachedAnimation {
            tag: tag.clone(),
            indices: indices.closed(self.char_count),
            category: self.category,
            late,
            overrides,
            animation,
            data,
            finished: HashSet::new(),
            segment: OnceCell::new(),
        })
    }
}

fn modifier(tag: &Tag, key: &str) -> Result<Option<bool>> {
    match tag.param(key).map(str::trim) {
        None => Ok(None),
        Some("") | Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(other) => Err(TextAnimError::InvalidParameters {
            name: tag.name.clone(),
            reason: format!("modifier '{key}' expects true or false, got '{other}'"),
        }),
    }
}
