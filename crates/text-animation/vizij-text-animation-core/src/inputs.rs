//! Input contracts for the animator.
//!
//! Adapters collect tag edits and visibility commands between ticks and hand
//! them to `TextAnimator::update()`. Edits are staged and applied at the start
//! of the tick, before any cache is consulted.

use serde::{Deserialize, Serialize};

use crate::indices::IntervalIndices;
use crate::tag::{Tag, TagCategory};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Inputs {
    /// Procedural tag edits.
    #[serde(default)]
    pub edits: Vec<TagEdit>,
    /// Visibility and scaling commands, applied after the edits.
    #[serde(default)]
    pub commands: Vec<AnimatorCommand>,
}

impl Inputs {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.commands.is_empty()
    }
}

/// Structural change to one tag collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TagEdit {
    Add {
        category: TagCategory,
        tag: Tag,
        start: i32,
        /// `-1` for an open end.
        end: i32,
        #[serde(default)]
        order: Option<u32>,
    },
    Remove {
        category: TagCategory,
        tag: Tag,
        indices: IntervalIndices,
    },
    RemoveAllAt {
        category: TagCategory,
        index: usize,
    },
}

impl TagEdit {
    pub fn category(&self) -> TagCategory {
        match self {
            TagEdit::Add { category, .. }
            | TagEdit::Remove { category, .. }
            | TagEdit::RemoveAllAt { category, .. } => *category,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AnimatorCommand {
    SetVisibility { index: usize, visible: bool },
    SetVisibilityRange { start: usize, end: usize, visible: bool },
    ShowAll,
    HideAll,
    ShowAllImmediately,
    HideAllImmediately,
    StopAnimating,
    SetTimeScale { scale: f32 },
    SetEffectScale { scale: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_deserialize_with_defaults() {
        let inputs: Inputs = serde_json::from_str(
            r#"{
                "edits": [
                    { "Add": { "category": "basic", "tag": { "name": "wave", "prefix": "<" }, "start": 0, "end": -1 } },
                    { "RemoveAllAt": { "category": "show", "index": 3 } }
                ],
                "commands": [ "ShowAll", { "SetVisibility": { "index": 1, "visible": false } } ]
            }"#,
        )
        .unwrap();
        assert_eq!(inputs.edits.len(), 2);
        assert_eq!(inputs.edits[1].category(), TagCategory::Show);
        assert!(matches!(
            inputs.edits[0],
            TagEdit::Add { order: None, end: -1, .. }
        ));
        assert_eq!(inputs.commands[0], AnimatorCommand::ShowAll);
        assert!(Inputs::default().is_empty());
    }
}
