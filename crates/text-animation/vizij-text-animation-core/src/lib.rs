//! Vizij Text Animation Core (engine-agnostic)
//!
//! Resolves which tag animations run on which character, and when. Hosts hand
//! in laid-out characters plus raw tags from their rich-text parser; the
//! animator keeps per-category interval collections, caches animation
//! instances per tag, drives the per-character visibility state machine and
//! writes meshes in place every tick.

pub mod animator;
pub mod builtin;
pub mod cache;
pub mod cached_collection;
pub mod category;
pub mod character;
pub mod collection;
pub mod config;
pub mod context;
pub mod effect;
pub mod error;
pub mod indices;
pub mod inputs;
pub mod outputs;
pub mod scheduler;
pub mod scratch;
pub mod tag;
pub mod visibility;

// Re-exports for consumers (adapters)
pub use animator::TextAnimator;
pub use builtin::{DummyAnimation, FadeAnimation, ParameterBundle, WaveAnimation};
pub use cache::{AnimationCacher, CacheReport, CachedAnimation, DropStage, DroppedTag};
pub use cached_collection::{CachedCollection, MinMax};
pub use category::{AnimationCategory, CategoryPolicy, CategoryRun, ExclusionPredicate};
pub use character::{CharacterRecord, MeshState};
pub use collection::{CategoryTags, TagEntry, TagIntervalCollection};
pub use config::{AnimatorConfig, CategoryConfig, CharacterExclusion, TagPrefixes, UpdateMode};
pub use context::{AnimationContext, AnimatorContext, KeywordDatabase, SegmentData, TickContext};
pub use effect::{CustomData, DynTextAnimation, EffectDatabase, EffectSet, TextAnimation};
pub use error::{ParameterError, Result, TextAnimError};
pub use indices::{IntervalIndices, OPEN_END};
pub use inputs::{AnimatorCommand, Inputs, TagEdit};
pub use outputs::{AnimatorEvent, TickOutputs, TickStats};
pub use scheduler::{DeferredTransitions, SchedulerState, TransitionRequest, VisibilityListener};
pub use tag::{Tag, TagCategory, TagParameters, TagSpan};
pub use visibility::{CharacterTimings, VisibilityChange, VisibilityState, VisibilityTable};
