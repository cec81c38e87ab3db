use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vizij_text_animation_core::{
    AnimationContext, AnimatorConfig, AnimatorEvent, CharacterRecord, DeferredTransitions,
    EffectDatabase, EffectSet, KeywordDatabase, ParameterError, TagCategory, TagParameters,
    TagSpan, TextAnimation, TextAnimator, UpdateMode, VisibilityChange, VisibilityState,
};

use VisibilityState::{Hidden, Hiding, Showing, Shown};

/// Counts `animate` calls and reports a fixed finished state.
struct Probe {
    name: &'static str,
    finishes: bool,
    calls: Arc<AtomicUsize>,
}

impl Probe {
    fn new(name: &'static str, finishes: bool) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                finishes,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl TextAnimation for Probe {
    type Data = ();

    fn name(&self) -> &str {
        self.name
    }

    fn new_custom_data(&self) {}

    fn set_parameters(
        &self,
        _data: &mut (),
        _parameters: &TagParameters,
        _keywords: &KeywordDatabase,
    ) -> Result<(), ParameterError> {
        Ok(())
    }

    fn animate(&self, _data: &mut (), character: &mut CharacterRecord, _ctx: &AnimationContext<'_>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        character.mesh.translate(0.0, 1.0);
    }

    fn finished(&self, _data: &(), _index: usize, _ctx: &AnimationContext<'_>) -> bool {
        self.finishes
    }
}

fn manual(start_visible: bool) -> AnimatorConfig {
    AnimatorConfig {
        update_mode: UpdateMode::Manual,
        start_visible,
        ..AnimatorConfig::default()
    }
}

fn approx(a: f32, b: f32) {
    assert!((a - b).abs() <= 1e-4, "left={a} right={b}");
}

fn changes(animator: &TextAnimator) -> Vec<(usize, VisibilityState, VisibilityState)> {
    animator
        .outputs()
        .visibility_changes()
        .map(|c| (c.index, c.from, c.to))
        .collect()
}

fn has_event(animator: &TextAnimator, event: &AnimatorEvent) -> bool {
    animator.outputs().events.iter().any(|e| e == event)
}

#[test]
fn hide_short_circuits_on_first_finished_animation() {
    let (instant, instant_calls) = Probe::new("instant", true);
    let (never, never_calls) = Probe::new("never", false);
    let effects = EffectSet::new(
        EffectDatabase::new(),
        EffectDatabase::new().with(instant).with(never),
    );
    let mut animator = TextAnimator::new(manual(true), effects).unwrap();
    animator.set_text(
        CharacterRecord::from_text("a"),
        [
            TagSpan::new("instant", '#', 0, 1),
            TagSpan::new("never", '#', 0, 1),
        ],
    );

    animator.advance(0.1).unwrap();
    assert_eq!(animator.visibility_state(0), Shown);
    assert!(has_event(&animator, &AnimatorEvent::ShowCompleted));

    animator.hide_all();
    animator.advance(0.1).unwrap();
    assert_eq!(animator.visibility_state(0), Hidden);
    assert_eq!(changes(&animator), vec![(0, Shown, Hiding), (0, Hiding, Hidden)]);
    assert!(has_event(&animator, &AnimatorEvent::HideCompleted));
    assert_eq!(animator.outputs().stats.hide_applied, 1);
    assert_eq!(instant_calls.load(Ordering::SeqCst), 1);
    assert_eq!(never_calls.load(Ordering::SeqCst), 0);
    // hidden characters are cleared
    assert_eq!(animator.characters()[0].mesh.alpha(), 0.0);
}

#[test]
fn show_that_never_finishes_keeps_character_showing() {
    let (never, calls) = Probe::new("never", false);
    let effects = EffectSet::new(EffectDatabase::new(), EffectDatabase::new().with(never));
    let mut animator = TextAnimator::new(manual(true), effects).unwrap();
    animator.set_text(
        CharacterRecord::from_text("a"),
        [TagSpan::new("never", '{', 0, -1)],
    );

    let mut last = -1.0;
    for tick in 0..5 {
        animator.advance(0.1).unwrap();
        assert_eq!(animator.visibility_state(0), Showing);
        assert_eq!(animator.outputs().stats.show_applied, 1);
        let state_time = animator.state_time(0);
        approx(state_time, 0.1 * tick as f32);
        assert!(state_time > last);
        last = state_time;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    // Hidden -> Showing only once
    assert!(changes(&animator).is_empty());
    assert!(!animator.is_fully_shown());
}

#[test]
fn characters_without_animations_keep_timers() {
    let mut animator = TextAnimator::with_builtins(manual(true)).unwrap();
    animator.set_text(CharacterRecord::from_text("ab"), Vec::<TagSpan>::new());

    animator.advance(0.1).unwrap();
    assert_eq!(animator.visibility_states(), &[Shown, Shown]);
    assert_eq!(animator.outputs().stats.transitions, 4);
    for ch in animator.characters() {
        assert_eq!(ch.mesh, ch.source);
    }

    for _ in 0..3 {
        animator.advance(0.1).unwrap();
    }
    approx(animator.state_time(0), 0.3);
    approx(animator.visible_time(1), 0.3);

    animator.hide_all();
    animator.advance(0.1).unwrap();
    assert!(animator.is_fully_hidden());
    approx(animator.state_time(0), 0.0);
    approx(animator.visible_time(0), 0.0);
    animator.advance(0.1).unwrap();
    approx(animator.visible_time(0), 0.1);
}

#[test]
fn stop_animating_snaps_and_reports_on_next_update() {
    let (never, _) = Probe::new("never", false);
    let effects = EffectSet::new(EffectDatabase::new(), EffectDatabase::new().with(never));
    let mut animator = TextAnimator::new(manual(true), effects).unwrap();
    animator.set_text(
        CharacterRecord::from_text("ab"),
        [TagSpan::new("never", '{', 0, 2)],
    );
    animator.advance(0.1).unwrap();
    assert_eq!(animator.visibility_states(), &[Showing, Showing]);

    animator.stop_animating().unwrap();
    assert!(animator.is_fully_shown());
    for ch in animator.characters() {
        assert_eq!(ch.mesh, ch.source);
    }

    animator.advance(0.1).unwrap();
    assert_eq!(changes(&animator), vec![(0, Showing, Shown), (1, Showing, Shown)]);
    assert!(has_event(&animator, &AnimatorEvent::ShowCompleted));
    assert!(animator.is_fully_shown());
}

#[test]
fn immediate_snaps_skip_animations() {
    let (never, calls) = Probe::new("never", false);
    let effects = EffectSet::new(EffectDatabase::new(), EffectDatabase::new().with(never));
    let mut animator = TextAnimator::new(manual(false), effects).unwrap();
    animator.set_text(
        CharacterRecord::from_text("ab"),
        [TagSpan::new("never", '{', 0, -1), TagSpan::new("never", '#', 0, -1)],
    );

    animator.show_all_immediately().unwrap();
    assert!(animator.is_fully_shown());
    animator.advance(0.1).unwrap();
    assert!(animator.is_fully_shown());
    assert!(has_event(&animator, &AnimatorEvent::ShowCompleted));

    animator.hide_all_immediately().unwrap();
    animator.advance(0.1).unwrap();
    assert!(animator.is_fully_hidden());
    assert!(has_event(&animator, &AnimatorEvent::HideCompleted));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn excluded_characters_run_the_dummy_and_finish() {
    let (never, calls) = Probe::new("never", false);
    let effects = EffectSet::new(EffectDatabase::new(), EffectDatabase::new().with(never));
    let mut animator = TextAnimator::new(manual(true), effects).unwrap();
    animator.set_text(
        CharacterRecord::from_text("ab"),
        [TagSpan::new("never", '{', 0, 2)],
    );
    assert!(animator.set_exclusion(TagCategory::Show, Arc::new(|ch: &CharacterRecord| ch.character == 'b')));
    assert!(!animator.set_exclusion(TagCategory::Event, Arc::new(|_: &CharacterRecord| true)));

    animator.advance(0.1).unwrap();
    assert_eq!(animator.visibility_states(), &[Showing, Shown]);
    assert_eq!(animator.outputs().stats.show_applied, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let show = animator.category(TagCategory::Show).unwrap();
    assert!(show.is_excluded(1));
    assert_eq!(show.resolved_names(1), vec!["dummy".to_string()]);
    assert_eq!(show.resolved_names(0), vec!["never".to_string()]);
}

#[test]
fn basic_runs_on_the_tick_showing_completes() {
    let (wobble, calls) = Probe::new("wobble", false);
    let effects = EffectSet::new(EffectDatabase::new().with(wobble), EffectDatabase::new());
    let mut animator = TextAnimator::new(manual(true), effects).unwrap();
    animator.set_text(
        CharacterRecord::from_text("a "),
        [TagSpan::new("wobble", '<', 0, -1)],
    );

    animator.advance(0.1).unwrap();
    assert!(animator.is_fully_shown());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(animator.outputs().stats.basic_applied, 1);
    let ch = &animator.characters()[0];
    approx(ch.mesh.center()[1], ch.source.center()[1] + 1.0);

    animator.advance(0.1).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // basic output is recomposed from the source every tick
    let ch = &animator.characters()[0];
    approx(ch.mesh.center()[1], ch.source.center()[1] + 1.0);
    // the glyph-less space never reaches the animation
    assert_eq!(animator.characters()[1].mesh, animator.characters()[1].source);
}

#[test]
fn show_completed_fires_once() {
    let mut animator = TextAnimator::with_builtins(manual(true)).unwrap();
    animator.set_text(
        CharacterRecord::from_text("hi"),
        [TagSpan::new("fade", '{', 0, -1).with_param("d", "0.15")],
    );

    animator.advance(0.1).unwrap();
    assert!(!has_event(&animator, &AnimatorEvent::ShowCompleted));
    let mut completions = 0;
    for _ in 0..5 {
        animator.advance(0.1).unwrap();
        if has_event(&animator, &AnimatorEvent::ShowCompleted) {
            completions += 1;
        }
    }
    assert_eq!(completions, 1);
    assert!(animator.is_fully_shown());
}

#[test]
fn event_tags_fire_whenever_a_character_starts_showing() {
    let mut animator = TextAnimator::with_builtins(manual(false)).unwrap();
    animator.set_text(
        CharacterRecord::from_text("abc"),
        [
            TagSpan::new("beep", '?', 1, -1).with_param("pitch", "high"),
            TagSpan::new("wait", '!', 1, -1),
        ],
    );

    animator.set_visibility(1, true).unwrap();
    animator.advance(0.1).unwrap();
    let messages: Vec<_> = animator.outputs().messages().collect();
    assert_eq!(messages, vec![("beep", 1)]);
    match animator.outputs().events.iter().find(|e| matches!(e, AnimatorEvent::Message { .. })) {
        Some(AnimatorEvent::Message { parameters, .. }) => {
            assert_eq!(parameters.get("pitch").map(String::as_str), Some("high"));
        }
        other => panic!("expected a message, got {other:?}"),
    }
    assert_eq!(animator.visibility_states(), &[Hidden, Shown, Hidden]);

    animator.set_visibility(1, false).unwrap();
    animator.advance(0.1).unwrap();
    assert_eq!(animator.outputs().messages().count(), 0);

    animator.set_visibility(1, true).unwrap();
    animator.advance(0.1).unwrap();
    assert_eq!(animator.outputs().messages().count(), 1);
    // commands are stored, never executed
    assert_eq!(animator.commands_at(1).len(), 1);
}

#[test]
fn listener_requests_apply_after_the_character_loop() {
    let mut animator = TextAnimator::with_builtins(manual(false)).unwrap();
    animator.set_text(CharacterRecord::from_text("ab"), Vec::<TagSpan>::new());
    animator.set_listener(Some(Box::new(
        |change: &VisibilityChange, deferred: &mut DeferredTransitions<'_>| {
            if change.index == 0 && change.to == Shown {
                deferred.show(1);
            }
        },
    )));

    animator.set_visibility(0, true).unwrap();
    animator.advance(0.1).unwrap();
    assert_eq!(animator.visibility_states(), &[Shown, Showing]);
    assert_eq!(animator.outputs().stats.dropped_transitions, 0);

    animator.advance(0.1).unwrap();
    assert!(animator.is_fully_shown());
}

#[test]
fn out_of_range_visibility_is_rejected() {
    let mut animator = TextAnimator::with_builtins(manual(false)).unwrap();
    animator.set_text(CharacterRecord::from_text("ab"), Vec::<TagSpan>::new());
    assert!(animator.set_visibility(2, true).is_err());
    assert!(animator.set_visibility_range(0..3, true).is_err());
    animator.set_visibility_range(0..2, true).unwrap();
    animator.advance(0.1).unwrap();
    assert!(animator.is_fully_shown());
}
