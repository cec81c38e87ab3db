//! Tags as handed over by the external rich-text lexer.

use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::indices::OPEN_END;

/// Raw, unparsed parameter text keyed by parameter name.
pub type TagParameters = HashMap<String, String>;

/// A named, parameterized marker placed over a character range.
/// Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub prefix: char,
    #[serde(default)]
    pub parameters: TagParameters,
}

impl Tag {
    pub fn new(name: impl Into<String>, prefix: char) -> Self {
        Self {
            name: name.into(),
            prefix,
            parameters: TagParameters::new(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

/// Independent collections a tag can be routed into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    /// Continuous animations running while a character is shown.
    Basic,
    /// Animations running while a character appears.
    Show,
    /// Animations running while a character disappears.
    Hide,
    /// Messages emitted when a character starts showing.
    Event,
    /// Instructions for host typewriters; stored, never executed.
    Command,
}

impl TagCategory {
    /// Categories that own animations, in tick order.
    pub const ANIMATED: [TagCategory; 3] = [TagCategory::Basic, TagCategory::Show, TagCategory::Hide];

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Show => "show",
            Self::Hide => "hide",
            Self::Event => "event",
            Self::Command => "command",
        }
    }

    #[inline]
    pub fn is_animated(&self) -> bool {
        matches!(self, Self::Basic | Self::Show | Self::Hide)
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn open_end() -> i32 {
    OPEN_END
}

/// Raw `(name, prefix, parameters, start, end)` tuple produced by the tag parser.
/// `end == -1` marks a tag that was never closed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSpan {
    pub name: String,
    pub prefix: char,
    #[serde(default)]
    pub parameters: TagParameters,
    pub start: i32,
    #[serde(default = "open_end")]
    pub end: i32,
}

impl TagSpan {
    pub fn new(name: impl Into<String>, prefix: char, start: i32, end: i32) -> Self {
        Self {
            name: name.into(),
            prefix,
            parameters: TagParameters::new(),
            start,
            end,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Split into the immutable tag and its raw bounds.
    pub fn into_parts(self) -> (Tag, i32, i32) {
        (
            Tag {
                name: self.name,
                prefix: self.prefix,
                parameters: self.parameters,
            },
            self.start,
            self.end,
        )
    }
}
