//! Ordered tag interval collections, one per [`TagCategory`].
//!
//! Entries are kept sorted by `(start, order)`. Within a shared start index the
//! order values are unique; removal may leave gaps since only relative order
//! matters. Every structural mutation bumps a generation counter so derived
//! caches can detect that they are stale.

use crate::config::TagPrefixes;
use crate::error::{Result, TextAnimError};
use crate::indices::IntervalIndices;
use crate::tag::{Tag, TagCategory, TagSpan};

/// One tag placed over an interval.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagEntry {
    pub tag: Tag,
    pub indices: IntervalIndices,
}

#[derive(Clone, Debug, Default)]
pub struct TagIntervalCollection {
    entries: Vec<TagEntry>,
    generation: u64,
}

impl TagIntervalCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tag` over `[start, end)` (`end == -1` for open).
    ///
    /// Without `order` the tag is stacked on top of every tag already starting
    /// at `start`. With an explicit `order`, siblings at `start` whose order is
    /// `>= order` are shifted up by one first. Bounds are validated before
    /// anything is touched.
    pub fn add(
        &mut self,
        tag: Tag,
        start: i32,
        end: i32,
        order: Option<u32>,
    ) -> Result<IntervalIndices> {
        let mut indices = IntervalIndices::from_raw(start, end, 0)?;
        let (lo, hi) = self.bounds_at(indices.start);

        indices.order = match order {
            Some(order) => {
                for entry in &mut self.entries[lo..hi] {
                    if entry.indices.order >= order {
                        entry.indices.order += 1;
                    }
                }
                order
            }
            None => self.entries[lo..hi]
                .iter()
                .map(|e| e.indices.order + 1)
                .max()
                .unwrap_or(0),
        };

        let pos = lo
            + self.entries[lo..hi].partition_point(|e| e.indices.order < indices.order);
        self.entries.insert(pos, TagEntry { tag, indices });
        self.generation += 1;
        Ok(indices)
    }

    /// Remove the exact `(tag, indices)` entry. Siblings keep their order values.
    pub fn remove(&mut self, tag: &Tag, indices: &IntervalIndices) -> bool {
        let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.indices == *indices && e.tag == *tag)
        else {
            return false;
        };
        self.entries.remove(pos);
        self.generation += 1;
        true
    }

    /// Remove every entry starting at `index`; returns how many were removed.
    pub fn remove_all_at(&mut self, index: usize) -> usize {
        let (lo, hi) = self.bounds_at(index);
        if lo == hi {
            return 0;
        }
        self.entries.drain(lo..hi);
        self.generation += 1;
        hi - lo
    }

    /// Entries starting exactly at `index`, in ascending order.
    pub fn tags_at(&self, index: usize) -> &[TagEntry] {
        let (lo, hi) = self.bounds_at(index);
        &self.entries[lo..hi]
    }

    /// Entries whose interval contains `index`, in stacking order.
    pub fn covering(&self, index: usize) -> impl Iterator<Item = &TagEntry> + '_ {
        let hi = self.entries.partition_point(|e| e.indices.start <= index);
        self.entries[..hi]
            .iter()
            .filter(move |e| e.indices.contains(index))
    }

    /// Resolve every open end to `total_len`.
    pub fn close_open_indices(&mut self, total_len: usize) {
        let mut changed = false;
        for entry in self.entries.iter_mut().filter(|e| e.indices.is_open()) {
            entry.indices = entry.indices.closed(total_len);
            changed = true;
        }
        if changed {
            self.generation += 1;
        }
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.generation += 1;
        }
    }

    #[inline]
    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, TagEntry> {
        self.entries.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Monotonic counter bumped by every structural change.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn bounds_at(&self, start: usize) -> (usize, usize) {
        let lo = self.entries.partition_point(|e| e.indices.start < start);
        let hi = lo + self.entries[lo..].partition_point(|e| e.indices.start == start);
        (lo, hi)
    }
}

/// The five per-category collections derived from one text.
#[derive(Clone, Debug, Default)]
pub struct CategoryTags {
    pub basic: TagIntervalCollection,
    pub show: TagIntervalCollection,
    pub hide: TagIntervalCollection,
    pub events: TagIntervalCollection,
    pub commands: TagIntervalCollection,
}

impl CategoryTags {
    pub fn get(&self, category: TagCategory) -> &TagIntervalCollection {
        match category {
            TagCategory::Basic => &self.basic,
            TagCategory::Show => &self.show,
            TagCategory::Hide => &self.hide,
            TagCategory::Event => &self.events,
            TagCategory::Command => &self.commands,
        }
    }

    pub fn get_mut(&mut self, category: TagCategory) -> &mut TagIntervalCollection {
        match category {
            TagCategory::Basic => &mut self.basic,
            TagCategory::Show => &mut self.show,
            TagCategory::Hide => &mut self.hide,
            TagCategory::Event => &mut self.events,
            TagCategory::Command => &mut self.commands,
        }
    }

    /// Route a raw span by prefix and append it at its start index.
    pub fn insert_span(
        &mut self,
        span: TagSpan,
        prefixes: &TagPrefixes,
    ) -> Result<(TagCategory, IntervalIndices)> {
        let category = prefixes
            .category_for(span.prefix)
            .ok_or(TextAnimError::UnknownPrefix {
                prefix: span.prefix,
                name: span.name.clone(),
            })?;
        let (tag, start, end) = span.into_parts();
        let indices = self.get_mut(category).add(tag, start, end, None)?;
        Ok((category, indices))
    }

    pub fn close_open_indices(&mut self, total_len: usize) {
        for category in ALL_CATEGORIES {
            self.get_mut(category).close_open_indices(total_len);
        }
    }

    pub fn clear(&mut self) {
        for category in ALL_CATEGORIES {
            self.get_mut(category).clear();
        }
    }
}

const ALL_CATEGORIES: [TagCategory; 5] = [
    TagCategory::Basic,
    TagCategory::Show,
    TagCategory::Hide,
    TagCategory::Event,
    TagCategory::Command,
];
