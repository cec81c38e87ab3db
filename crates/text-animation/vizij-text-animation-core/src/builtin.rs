//! Built-in animations.

use std::f32::consts::TAU;

use crate::character::CharacterRecord;
use crate::context::{AnimationContext, KeywordDatabase};
use crate::effect::{EffectDatabase, EffectSet, TextAnimation};
use crate::error::ParameterError;
use crate::tag::{TagCategory, TagParameters};

/// Typed reader over raw tag parameters with keyword resolution.
#[derive(Copy, Clone, Debug)]
pub struct ParameterBundle<'a> {
    parameters: &'a TagParameters,
    keywords: &'a KeywordDatabase,
}

impl<'a> ParameterBundle<'a> {
    pub fn new(parameters: &'a TagParameters, keywords: &'a KeywordDatabase) -> Self {
        Self {
            parameters,
            keywords,
        }
    }

    /// Raw value after keyword resolution.
    pub fn raw(&self, key: &str) -> Option<&'a str> {
        self.parameters
            .get(key)
            .map(|raw| self.keywords.resolve(raw.as_str()))
    }

    /// Finite float, or `default` when absent.
    pub fn f32_or(&self, key: &str, default: f32) -> Result<f32, ParameterError> {
        match self.raw(key) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ParameterError::invalid(key, value, "expected a number")),
        }
    }

    /// Float that must be strictly positive.
    pub fn positive_f32_or(&self, key: &str, default: f32) -> Result<f32, ParameterError> {
        let value = self.f32_or(key, default)?;
        if value <= 0.0 {
            return Err(ParameterError::invalid(key, &value.to_string(), "must be > 0"));
        }
        Ok(value)
    }
}

/// Identity animation run on excluded characters. Finishes immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyAnimation;

impl TextAnimation for DummyAnimation {
    type Data = ();

    fn name(&self) -> &str {
        "dummy"
    }

    fn new_custom_data(&self) -> Self::Data {}

    fn set_parameters(
        &self,
        _data: &mut (),
        _parameters: &TagParameters,
        _keywords: &KeywordDatabase,
    ) -> Result<(), ParameterError> {
        Ok(())
    }

    fn animate(&self, _data: &mut (), _character: &mut CharacterRecord, _ctx: &AnimationContext<'_>) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeData {
    pub duration: f32,
}

/// Alpha ramp: in while showing, out while hiding.
#[derive(Debug, Default, Clone, Copy)]
pub struct FadeAnimation;

impl FadeAnimation {
    pub const DEFAULT_DURATION: f32 = 0.5;
}

impl TextAnimation for FadeAnimation {
    type Data = FadeData;

    fn name(&self) -> &str {
        "fade"
    }

    fn new_custom_data(&self) -> FadeData {
        FadeData {
            duration: Self::DEFAULT_DURATION,
        }
    }

    fn validate_parameters(&self, parameters: &TagParameters) -> bool {
        parameters.keys().all(|k| k == "d" || k == "override" || k == "late")
    }

    fn set_parameters(
        &self,
        data: &mut FadeData,
        parameters: &TagParameters,
        keywords: &KeywordDatabase,
    ) -> Result<(), ParameterError> {
        let bundle = ParameterBundle::new(parameters, keywords);
        data.duration = bundle.positive_f32_or("d", Self::DEFAULT_DURATION)?;
        Ok(())
    }

    fn animate(&self, data: &mut FadeData, character: &mut CharacterRecord, ctx: &AnimationContext<'_>) {
        let t = (ctx.state_time(character.index) / data.duration).clamp(0.0, 1.0);
        let alpha = match ctx.category {
            TagCategory::Hide => 1.0 - t,
            _ => t,
        };
        character.mesh.multiply_alpha(alpha);
    }

    fn finished(&self, data: &FadeData, index: usize, ctx: &AnimationContext<'_>) -> bool {
        ctx.state_time(index) >= data.duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveData {
    pub amplitude: f32,
    pub frequency: f32,
    /// Phase offset between neighbouring characters of the segment.
    pub wave_size: f32,
}

/// Vertical sine offset travelling along the segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaveAnimation;

impl TextAnimation for WaveAnimation {
    type Data = WaveData;

    fn name(&self) -> &str {
        "wave"
    }

    fn new_custom_data(&self) -> WaveData {
        WaveData {
            amplitude: 0.2,
            frequency: 1.0,
            wave_size: 0.2,
        }
    }

    fn set_parameters(
        &self,
        data: &mut WaveData,
        parameters: &TagParameters,
        keywords: &KeywordDatabase,
    ) -> Result<(), ParameterError> {
        let bundle = ParameterBundle::new(parameters, keywords);
        data.amplitude = bundle.f32_or("a", data.amplitude)?;
        data.frequency = bundle.f32_or("f", data.frequency)?;
        data.wave_size = bundle.f32_or("w", data.wave_size)?;
        Ok(())
    }

    fn animate(&self, data: &mut WaveData, character: &mut CharacterRecord, ctx: &AnimationContext<'_>) {
        let offset = ctx
            .segment
            .map_or(0, |s| s.relative_index(character.index)) as f32;
        let phase = ctx.passed_time() * data.frequency * TAU + offset * data.wave_size;
        let dy = phase.sin() * data.amplitude * ctx.animator.effect_scale;
        character.mesh.translate(0.0, dy);
    }
}

impl EffectSet {
    /// `wave` for basic animations, `fade` for show and hide.
    pub fn builtins() -> Self {
        EffectSet::new(
            EffectDatabase::new().with(WaveAnimation),
            EffectDatabase::new().with(FadeAnimation),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AnimatorContext;
    use crate::effect::DynTextAnimation;
    use crate::indices::IntervalIndices;
    use crate::tag::Tag;
    use crate::visibility::{VisibilityState, VisibilityTable};

    fn params(pairs: &[(&str, &str)]) -> TagParameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn bundle_parses_and_rejects() {
        let p = params(&[("d", "slow"), ("x", "abc"), ("n", "-1")]);
        let mut kw = KeywordDatabase::new();
        kw.insert("slow", "2");
        let b = ParameterBundle::new(&p, &kw);
        assert_eq!(b.f32_or("d", 0.0), Ok(2.0));
        assert_eq!(b.f32_or("missing", 7.0), Ok(7.0));
        assert!(b.f32_or("x", 0.0).is_err());
        assert!(b.positive_f32_or("n", 1.0).is_err());
    }

    #[test]
    fn fade_ramps_alpha_and_finishes() {
        let fade = FadeAnimation;
        let mut data: Box<dyn std::any::Any> = DynTextAnimation::new_custom_data(&fade);
        DynTextAnimation::set_parameters(
            &fade,
            &mut data,
            &params(&[("d", "1")]),
            &KeywordDatabase::new(),
        )
        .unwrap();
        assert!(!DynTextAnimation::validate_parameters(&fade, &params(&[("speed", "1")])));

        let mut table = VisibilityTable::new();
        table.reset(1, 0.0, true);
        table.set_state(0, VisibilityState::Showing, 0.0);
        let animator = AnimatorContext::new(1.0);
        let tag = Tag::new("fade", '{');
        let mut ch = CharacterRecord::from_text("a").remove(0);

        let ctx = AnimationContext {
            animator: &animator,
            timings: table.timings(0.25),
            tag: &tag,
            indices: IntervalIndices::closed_range(0, 1, 0),
            segment: None,
            category: TagCategory::Show,
        };
        ch.reset_to_source();
        DynTextAnimation::animate(&fade, &mut data, &mut ch, &ctx);
        assert!((ch.mesh.alpha() - 0.25).abs() < 1e-6);
        assert!(!DynTextAnimation::finished(&fade, &data, 0, &ctx));

        let done = AnimationContext {
            timings: table.timings(1.0),
            category: TagCategory::Hide,
            ..ctx
        };
        ch.reset_to_source();
        DynTextAnimation::animate(&fade, &mut data, &mut ch, &done);
        assert_eq!(ch.mesh.alpha(), 0.0);
        assert!(DynTextAnimation::finished(&fade, &data, 0, &done));
    }

    #[test]
    fn builtins_are_registered() {
        let set = EffectSet::builtins();
        assert!(set.basic.contains_effect("wave"));
        assert!(set.show.contains_effect("fade"));
        assert!(set.hide.contains_effect("fade"));
        assert!(!set.basic.contains_effect("dummy"));
    }
}
