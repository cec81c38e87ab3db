//! Animation implementation contract and effect databases.
//!
//! Animations are written against the typed [`TextAnimation`] trait. The core
//! only ever sees the object-safe [`DynTextAnimation`] view, with per-instance
//! custom data kept opaque.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::character::CharacterRecord;
use crate::context::{AnimationContext, KeywordDatabase};
use crate::error::ParameterError;
use crate::tag::{TagCategory, TagParameters};

/// Opaque per-instance state owned by a cached animation.
pub type CustomData = Box<dyn Any>;

/// Trait for text animation implementations
pub trait TextAnimation: Send + Sync + 'static {
    /// Per-instance state (parsed parameters, running values).
    type Data: 'static;

    /// Name tags refer to this animation by.
    fn name(&self) -> &str;

    /// Fresh custom data for a new tag instance.
    fn new_custom_data(&self) -> Self::Data;

    /// Side-effect free pre-check run before an instance is cached.
    fn validate_parameters(&self, _parameters: &TagParameters) -> bool {
        true
    }

    /// Parse raw parameters into `data`. An error drops the tag instance.
    fn set_parameters(
        &self,
        data: &mut Self::Data,
        parameters: &TagParameters,
        keywords: &KeywordDatabase,
    ) -> Result<(), ParameterError>;

    /// Mutate the character's current mesh.
    fn animate(&self, data: &mut Self::Data, character: &mut CharacterRecord, ctx: &AnimationContext<'_>);

    /// Whether the animation is done with `index`. Only asked of show and hide
    /// animations, which must eventually report `true`.
    fn finished(&self, _data: &Self::Data, _index: usize, _ctx: &AnimationContext<'_>) -> bool {
        true
    }

    /// Late animations run after every non-late animation has composed.
    fn is_late(&self) -> bool {
        false
    }
}

/// Object-safe view of [`TextAnimation`] used by databases and caches.
pub trait DynTextAnimation: Send + Sync {
    fn name(&self) -> &str;
    fn new_custom_data(&self) -> CustomData;
    fn validate_parameters(&self, parameters: &TagParameters) -> bool;
    fn set_parameters(
        &self,
        data: &mut CustomData,
        parameters: &TagParameters,
        keywords: &KeywordDatabase,
    ) -> Result<(), ParameterError>;
    fn animate(&self, data: &mut CustomData, character: &mut CharacterRecord, ctx: &AnimationContext<'_>);
    fn finished(&self, data: &CustomData, index: usize, ctx: &AnimationContext<'_>) -> bool;
    fn is_late(&self) -> bool;
}

impl<T: TextAnimation> DynTextAnimation for T {
    fn name(&self) -> &str {
        TextAnimation::name(self)
    }

    fn new_custom_data(&self) -> CustomData {
        Box::new(TextAnimation::new_custom_data(self))
    }

    fn validate_parameters(&self, parameters: &TagParameters) -> bool {
        TextAnimation::validate_parameters(self, parameters)
    }

    fn set_parameters(
        &self,
        data: &mut CustomData,
        parameters: &TagParameters,
        keywords: &KeywordDatabase,
    ) -> Result<(), ParameterError> {
        match data.downcast_mut::<T::Data>() {
            Some(data) => TextAnimation::set_parameters(self, data, parameters, keywords),
            None => Err(ParameterError::invalid(
                "",
                "",
                format!("custom data was not created by '{}'", TextAnimation::name(self)),
            )),
        }
    }

    fn animate(&self, data: &mut CustomData, character: &mut CharacterRecord, ctx: &AnimationContext<'_>) {
        if let Some(data) = data.downcast_mut::<T::Data>() {
            TextAnimation::animate(self, data, character, ctx);
        }
    }

    fn finished(&self, data: &CustomData, index: usize, ctx: &AnimationContext<'_>) -> bool {
        // foreign data cannot be animated either, so never wedge the character
        data.downcast_ref::<T::Data>()
            .map_or(true, |data| TextAnimation::finished(self, data, index, ctx))
    }

    fn is_late(&self) -> bool {
        TextAnimation::is_late(self)
    }
}

/// Name -> animation lookup for one category.
#[derive(Clone, Default)]
pub struct EffectDatabase {
    effects: HashMap<String, Arc<dyn DynTextAnimation>>,
}

impl EffectDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an animation under its own name, replacing any previous one.
    pub fn register<T: TextAnimation>(&mut self, animation: T) {
        self.register_shared(Arc::new(animation));
    }

    pub fn register_shared(&mut self, animation: Arc<dyn DynTextAnimation>) {
        self.effects
            .insert(animation.name().to_string(), animation);
    }

    /// Builder-style registration.
    pub fn with<T: TextAnimation>(mut self, animation: T) -> Self {
        self.register(animation);
        self
    }

    #[inline]
    pub fn contains_effect(&self, name: &str) -> bool {
        self.effects.contains_key(name)
    }

    /// Look up an animation by name; `None` if unknown.
    #[inline]
    pub fn get_effect(&self, name: &str) -> Option<Arc<dyn DynTextAnimation>> {
        self.effects.get(name).cloned()
    }

    /// List all registered effect names
    pub fn names(&self) -> Vec<&str> {
        self.effects.keys().map(|k| k.as_str()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

impl fmt::Debug for EffectDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("EffectDatabase").field("effects", &names).finish()
    }
}

/// One database per animated category.
#[derive(Clone, Debug, Default)]
pub struct EffectSet {
    pub basic: EffectDatabase,
    pub show: EffectDatabase,
    pub hide: EffectDatabase,
}

impl EffectSet {
    /// Separate basic animations; show and hide share the appearance database.
    pub fn new(basic: EffectDatabase, appearances: EffectDatabase) -> Self {
        Self {
            basic,
            show: appearances.clone(),
            hide: appearances,
        }
    }

    pub fn get(&self, category: TagCategory) -> Option<&EffectDatabase> {
        match category {
            TagCategory::Basic => Some(&self.basic),
            TagCategory::Show => Some(&self.show),
            TagCategory::Hide => Some(&self.hide),
            TagCategory::Event | TagCategory::Command => None,
        }
    }
}
