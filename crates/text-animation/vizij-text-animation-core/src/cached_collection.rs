//! Per-index lookup over the cached animations of one category.
//!
//! The cached list is sorted by `(start, order)`. While building, every
//! covered character index records the lowest and highest list position of an
//! entry containing it, so a lookup only touches that slice instead of the
//! whole list.

use crate::cache::{AnimationCacher, CacheReport, CachedAnimation, DropStage, DroppedTag};
use crate::collection::TagIntervalCollection;
use crate::error::{Result, TextAnimError};
use crate::tag::TagCategory;

/// Inclusive bounds into the sorted cached list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MinMax {
    pub min: usize,
    pub max: usize,
}

impl MinMax {
    #[inline]
    pub fn range(&self) -> std::ops::RangeInclusive<usize> {
        self.min..=self.max
    }
}

#[derive(Debug)]
pub struct CachedCollection {
    category: TagCategory,
    animations: Vec<CachedAnimation>,
    bounds: Vec<Option<MinMax>>,
    generation: u64,
}

impl CachedCollection {
    /// Lookup with no animations, matching an empty collection.
    pub fn empty(category: TagCategory) -> Self {
        Self {
            category,
            animations: Vec::new(),
            bounds: Vec::new(),
            generation: 0,
        }
    }

    /// Cache every entry of `collection`. Entries that fail are recorded in
    /// `report` and skipped.
    pub fn build(
        collection: &TagIntervalCollection,
        cacher: &AnimationCacher<'_>,
        report: &mut CacheReport,
    ) -> Self {
        let mut animations = Vec::with_capacity(collection.len());
        for entry in collection.iter() {
            match cacher.cache_tag(&entry.tag, entry.indices) {
                Ok(cached) => animations.push(cached),
                Err(error) => report.record(DroppedTag {
                    category: Some(cacher.category()),
                    tag: entry.tag.clone(),
                    error,
                    stage: DropStage::Cache,
                }),
            }
        }
        log::debug!(
            "cached {} {} animations ({} dropped)",
            animations.len(),
            cacher.category(),
            collection.len() - animations.len()
        );
        Self::from_animations(
            cacher.category(),
            animations,
            cacher.char_count(),
            collection.generation(),
        )
    }

    /// Build the lookup over already cached animations.
    pub fn from_animations(
        category: TagCategory,
        mut animations: Vec<CachedAnimation>,
        char_count: usize,
        generation: u64,
    ) -> Self {
        animations.sort_by_key(|a| a.indices().sort_key());
        let mut bounds: Vec<Option<MinMax>> = vec![None; char_count];
        for (pos, animation) in animations.iter().enumerate() {
            let indices = animation.indices();
            let end = indices.end_or(char_count).min(char_count);
            for slot in bounds.iter_mut().take(end).skip(indices.start) {
                *slot = Some(match *slot {
                    Some(mm) => MinMax {
                        min: mm.min.min(pos),
                        max: mm.max.max(pos),
                    },
                    None => MinMax { min: pos, max: pos },
                });
            }
        }
        Self {
            category,
            animations,
            bounds,
            generation,
        }
    }

    /// Slice of the sorted list that may contain `index`; `None` if no entry
    /// starts at or before it. The slice is a superset: callers filter with
    /// [`CachedAnimation::contains`].
    pub fn min_max_at(&self, index: usize) -> Option<MinMax> {
        let upto = self
            .animations
            .partition_point(|a| a.indices().start <= index);
        if upto == 0 {
            return None;
        }
        match self.bounds.get(index) {
            Some(Some(mm)) => Some(*mm),
            // nothing covers an in-range index: a single entry that is filtered out
            Some(None) => Some(MinMax {
                min: upto - 1,
                max: upto - 1,
            }),
            // past the recorded text: fall back to every candidate
            None => Some(MinMax {
                min: 0,
                max: upto - 1,
            }),
        }
    }

    pub fn has_any_containing(&self, index: usize) -> bool {
        self.containing(index).next().is_some()
    }

    /// List positions of the entries containing `index`, in stacking order.
    pub fn containing(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.min_max_at(index)
            .into_iter()
            .flat_map(|mm| mm.range())
            .filter(move |&pos| self.animations[pos].contains(index))
    }

    /// Fail if the backing collection changed since this lookup was built.
    pub fn ensure_fresh(&self, collection: &TagIntervalCollection) -> Result<()> {
        if collection.generation() != self.generation {
            return Err(TextAnimError::StaleCache {
                category: self.category,
                expected: collection.generation(),
                found: self.generation,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn category(&self) -> TagCategory {
        self.category
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn get(&self, pos: usize) -> Option<&CachedAnimation> {
        self.animations.get(pos)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, pos: usize) -> Option<&mut CachedAnimation> {
        self.animations.get_mut(pos)
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, CachedAnimation> {
        self.animations.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::WaveAnimation;
    use crate::context::KeywordDatabase;
    use crate::effect::EffectDatabase;
    use crate::tag::Tag;

    fn build(collection: &TagIntervalCollection, len: usize) -> (CachedCollection, CacheReport) {
        let effects = EffectDatabase::new().with(WaveAnimation);
        let keywords = KeywordDatabase::new();
        let cacher = AnimationCacher::new(&effects, &keywords, TagCategory::Basic, len);
        let mut report = CacheReport::new();
        let cached = CachedCollection::build(collection, &cacher, &mut report);
        (cached, report)
    }

    #[test]
    fn bounds_cover_overlapping_tags() {
        let mut c = TagIntervalCollection::new();
        c.add(Tag::new("wave", '<'), 0, 4, None).unwrap();
        c.add(Tag::new("wave", '<'), 1, 2, None).unwrap();
        c.add(Tag::new("wave", '<'), 5, 7, None).unwrap();
        let (cached, _) = build(&c, 8);

        assert_eq!(cached.min_max_at(1), Some(MinMax { min: 0, max: 1 }));
        assert_eq!(cached.containing(3).collect::<Vec<_>>(), vec![0]);
        // index 4 is past the first tags and before the third one
        assert!(cached.min_max_at(4).is_some());
        assert!(!cached.has_any_containing(4));
        assert_eq!(cached.containing(6).collect::<Vec<_>>(), vec![2]);
        assert!(!cached.has_any_containing(7));
    }

    #[test]
    fn nothing_before_first_start() {
        let mut c = TagIntervalCollection::new();
        c.add(Tag::new("wave", '<'), 3, 5, None).unwrap();
        let (cached, _) = build(&c, 6);
        assert_eq!(cached.min_max_at(2), None);
        assert!(cached.has_any_containing(3));
    }

    #[test]
    fn dropped_entries_are_reported() {
        let mut c = TagIntervalCollection::new();
        c.add(Tag::new("wave", '<'), 0, 2, None).unwrap();
        c.add(Tag::new("missing", '<'), 0, 2, None).unwrap();
        let (cached, report) = build(&c, 2);
        assert_eq!(cached.len(), 1);
        assert_eq!(report.dropped_count(), 1);
        assert_eq!(report.dropped()[0].tag.name, "missing");
    }

    #[test]
    fn empty_lookup_matches_fresh_collection() {
        let cached = CachedCollection::empty(TagCategory::Hide);
        assert!(cached.ensure_fresh(&TagIntervalCollection::new()).is_ok());
        assert_eq!(cached.min_max_at(0), None);
    }

    #[test]
    fn stale_lookup_is_detected() {
        let mut c = TagIntervalCollection::new();
        c.add(Tag::new("wave", '<'), 0, 2, None).unwrap();
        let (cached, _) = build(&c, 2);
        assert!(cached.ensure_fresh(&c).is_ok());

        c.add(Tag::new("wave", '<'), 1, 2, None).unwrap();
        let err = cached.ensure_fresh(&c).unwrap_err();
        assert!(matches!(err, TextAnimError::StaleCache { expected: 2, found: 1, .. }));
        assert!(!err.is_recoverable());
    }
}
