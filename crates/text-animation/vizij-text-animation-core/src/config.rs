//! Animator configuration.

use serde::{Deserialize, Serialize};

use crate::character::CharacterRecord;
use crate::error::{Result, TextAnimError};
use crate::tag::{Tag, TagCategory};

/// Who drives the tick.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    /// The host calls `TextAnimator::frame` from its frame callback.
    #[default]
    Automatic,
    /// The caller owns the timing loop and calls `TextAnimator::advance`.
    Manual,
}

/// Prefix characters routing raw tags into categories.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagPrefixes {
    pub basic: char,
    pub show: char,
    pub hide: char,
    pub event: char,
    pub command: char,
}

impl Default for TagPrefixes {
    fn default() -> Self {
        Self {
            basic: '<',
            show: '{',
            hide: '#',
            event: '?',
            command: '!',
        }
    }
}

impl TagPrefixes {
    pub fn category_for(&self, prefix: char) -> Option<TagCategory> {
        if prefix == self.basic {
            Some(TagCategory::Basic)
        } else if prefix == self.show {
            Some(TagCategory::Show)
        } else if prefix == self.hide {
            Some(TagCategory::Hide)
        } else if prefix == self.event {
            Some(TagCategory::Event)
        } else if prefix == self.command {
            Some(TagCategory::Command)
        } else {
            None
        }
    }

    pub fn prefix_for(&self, category: TagCategory) -> char {
        match category {
            TagCategory::Basic => self.basic,
            TagCategory::Show => self.show,
            TagCategory::Hide => self.hide,
            TagCategory::Event => self.event,
            TagCategory::Command => self.command,
        }
    }

    fn is_unambiguous(&self) -> bool {
        let all = [self.basic, self.show, self.hide, self.event, self.command];
        all.iter()
            .enumerate()
            .all(|(i, p)| !all[i + 1..].contains(p))
    }
}

/// Characters skipped by a category's animations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterExclusion {
    /// Exclude ASCII punctuation.
    pub punctuation: bool,
    /// Explicit list of excluded characters.
    pub characters: String,
}

impl CharacterExclusion {
    pub fn excludes(&self, record: &CharacterRecord) -> bool {
        (self.punctuation && record.character.is_ascii_punctuation())
            || self.characters.contains(record.character)
    }
}

/// Per-category settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    /// Effective override flag for tags that do not specify one.
    pub override_by_default: bool,
    pub exclusion: CharacterExclusion,
    /// Animations applied to the whole text before any tag.
    pub default_tags: Vec<Tag>,
}

/// Configuration for one animator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    pub update_mode: UpdateMode,
    /// Multiplier applied to every delta time.
    pub time_scale: f32,
    /// Whether characters of a new text are requested visible right away.
    pub start_visible: bool,
    pub basic: CategoryConfig,
    pub show: CategoryConfig,
    pub hide: CategoryConfig,
    pub prefixes: TagPrefixes,
    /// Upper bound on deferred-transition drain rounds per tick.
    pub max_cascade_rounds: usize,
    /// Maximum events to retain per tick; the rest are counted as dropped.
    pub max_events_per_tick: usize,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            update_mode: UpdateMode::Automatic,
            time_scale: 1.0,
            start_visible: true,
            basic: CategoryConfig::default(),
            show: CategoryConfig::default(),
            hide: CategoryConfig::default(),
            prefixes: TagPrefixes::default(),
            max_cascade_rounds: 8,
            max_events_per_tick: 1024,
        }
    }
}

impl AnimatorConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: AnimatorConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(TextAnimError::Config {
                reason: format!("time_scale must be finite and >= 0, got {}", self.time_scale),
            });
        }
        if !self.prefixes.is_unambiguous() {
            return Err(TextAnimError::Config {
                reason: "tag prefixes must be distinct".into(),
            });
        }
        Ok(())
    }

    /// Settings of an animated category. Event and command tags have none and
    /// fall back to the basic settings.
    pub fn category(&self, category: TagCategory) -> &CategoryConfig {
        match category {
            TagCategory::Show => &self.show,
            TagCategory::Hide => &self.hide,
            _ => &self.basic,
        }
    }

    pub fn category_mut(&mut self, category: TagCategory) -> &mut CategoryConfig {
        match category {
            TagCategory::Show => &mut self.show,
            TagCategory::Hide => &mut self.hide,
            _ => &mut self.basic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_route_categories() {
        let p = TagPrefixes::default();
        assert_eq!(p.category_for('<'), Some(TagCategory::Basic));
        assert_eq!(p.category_for('#'), Some(TagCategory::Hide));
        assert_eq!(p.category_for('%'), None);
        assert_eq!(p.prefix_for(TagCategory::Show), '{');
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = AnimatorConfig::from_json(
            r#"{
                "update_mode": "Manual",
                "basic": { "override_by_default": true, "exclusion": { "punctuation": true } },
                "show": { "default_tags": [ { "name": "fade", "prefix": "{" } ] }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.update_mode, UpdateMode::Manual);
        assert!(cfg.basic.override_by_default);
        assert!(cfg.basic.exclusion.punctuation);
        assert_eq!(cfg.show.default_tags[0].name, "fade");
        assert_eq!(cfg.time_scale, 1.0);
        assert_eq!(cfg.max_cascade_rounds, 8);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(AnimatorConfig::from_json(r#"{ "time_scale": -1.0 }"#).is_err());
        assert!(AnimatorConfig::from_json(r#"{ "prefixes": { "show": "<" } }"#).is_err());
        assert!(AnimatorConfig::from_json("not json").is_err());
    }

    #[test]
    fn exclusion_matches_punctuation_and_list() {
        let chars = CharacterRecord::from_text("a,b");
        let ex = CharacterExclusion {
            punctuation: true,
            characters: "b".into(),
        };
        assert!(!ex.excludes(&chars[0]));
        assert!(ex.excludes(&chars[1]));
        assert!(ex.excludes(&chars[2]));
    }
}
