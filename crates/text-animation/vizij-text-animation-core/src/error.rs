//! Error types for the text animation core.

use crate::config::UpdateMode;
use crate::tag::TagCategory;

/// Errors surfaced by the animator and its collections.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TextAnimError {
    /// No effect with this name is registered for the category.
    #[error("unknown {category} effect: {name}")]
    UnknownEffect { category: TagCategory, name: String },

    /// No category is configured for this tag prefix.
    #[error("no category routes prefix '{prefix}' (tag '{name}')")]
    UnknownPrefix { prefix: char, name: String },

    /// The effect rejected the tag's parameters.
    #[error("invalid parameters for '{name}': {reason}")]
    InvalidParameters { name: String, reason: String },

    /// Interval bounds are negative or reversed.
    #[error("invalid interval [{start}, {end})")]
    InvalidInterval { start: i32, end: i32 },

    /// A cached collection was used after its backing collection changed.
    #[error("stale {category} cache: built for generation {found}, collection is at {expected}")]
    StaleCache {
        category: TagCategory,
        expected: u64,
        found: u64,
    },

    /// A visibility transition was applied while another one was still cascading.
    #[error("re-entrant visibility transition on character {index}")]
    ReentrantTransition { index: usize },

    /// Tick API does not match the configured update mode.
    #[error("cannot {requested} while the animator runs in {current:?} mode")]
    WrongUpdateMode {
        requested: &'static str,
        current: UpdateMode,
    },

    /// Character index outside of the current text.
    #[error("character {index} out of range (len {len})")]
    CharacterOutOfRange { index: usize, len: usize },

    /// The animator is disabled.
    #[error("animator is disabled")]
    Disabled,

    /// Configuration could not be parsed or failed validation.
    #[error("config error: {reason}")]
    Config { reason: String },
}

impl TextAnimError {
    /// Configuration errors are skipped locally; everything else aborts the tick.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownEffect { .. }
                | Self::UnknownPrefix { .. }
                | Self::InvalidParameters { .. }
                | Self::InvalidInterval { .. }
        )
    }

    /// Get error category for logging/metrics
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownEffect { .. }
            | Self::UnknownPrefix { .. }
            | Self::InvalidParameters { .. }
            | Self::InvalidInterval { .. }
            | Self::Config { .. } => "configuration",
            Self::StaleCache { .. } | Self::ReentrantTransition { .. } => "consistency",
            Self::WrongUpdateMode { .. } | Self::Disabled => "misuse",
            Self::CharacterOutOfRange { .. } => "data",
        }
    }
}

impl From<serde_json::Error> for TextAnimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config {
            reason: err.to_string(),
        }
    }
}

/// Error returned by an effect when it cannot accept a tag's parameters.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("missing parameter '{key}'")]
    Missing { key: String },

    #[error("parameter '{key}' = '{value}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ParameterError {
    pub fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Text animation result type
pub type Result<T> = std::result::Result<T, TextAnimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_recoverable() {
        let err = TextAnimError::UnknownEffect {
            category: TagCategory::Basic,
            name: "wobble".into(),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.category(), "configuration");

        let err = TextAnimError::ReentrantTransition { index: 3 };
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "consistency");
    }

    #[test]
    fn mode_error_names_the_request() {
        let err = TextAnimError::WrongUpdateMode {
            requested: "advance manually",
            current: UpdateMode::Automatic,
        };
        assert_eq!(
            err.to_string(),
            "cannot advance manually while the animator runs in Automatic mode"
        );
        assert_eq!(err.category(), "misuse");
    }

    #[test]
    fn json_errors_become_config_errors() {
        let err: TextAnimError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, TextAnimError::Config { .. }));
    }
}
