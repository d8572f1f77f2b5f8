use std::time::Duration;

use bevy::prelude::*;
use bevy_anim_state::{load_gate::Deferred, prelude::*};

const FRAME: Duration = Duration::from_millis(250);

fn app() -> App {
    let mut app = App::new();
    app.init_resource::<Time>();
    app.add_plugins(AnimatorPlugin::<HeadlessRuntime>::default());
    app
}

fn tick(app: &mut App) {
    app.world_mut().resource_mut::<Time>().advance_by(FRAME);
    app.update();
}

fn runtime() -> HeadlessRuntime {
    HeadlessRuntime::new()
        .with_clip("idle", 1.0)
        .with_clip("walk", 1.0)
        .with_clip("run", 0.8)
        .with_clip("attack", 0.5)
}

fn locomotion(runtime: &mut HeadlessRuntime) -> Animator {
    let mut animator = Animator::new();
    animator.init_state_machine(StateMachineConfig::new("Idle"));
    animator.add_transition(
        "Idle",
        "Run",
        [TransitionCondition::parameter_above("speed", 0.0, 1)],
    );
    animator.add_animation_state(ClipState::new("Idle", "idle"), runtime);
    animator.add_animation_state(ClipState::new("Run", "run"), runtime);
    animator
}

#[test]
fn test_plugin_drives_transition() {
    let mut app = app();
    let mut runtime = runtime();
    let animator = locomotion(&mut runtime);
    let entity = app.world_mut().spawn((animator, runtime)).id();

    tick(&mut app);
    let world = app.world();
    assert_eq!(world.get::<Animator>(entity).unwrap().current_state(), Some("Idle"));

    app.world_mut()
        .get_mut::<Animator>(entity)
        .unwrap()
        .set_parameter("speed", 2.0);
    tick(&mut app);
    tick(&mut app);

    let world = app.world();
    let animator = world.get::<Animator>(entity).unwrap();
    assert_eq!(animator.current_state(), Some("Run"));
    assert_eq!(animator.previous_state(), Some("Idle"));

    let runtime = world.get::<HeadlessRuntime>(entity).unwrap();
    assert!(!runtime.is_playing("idle"));
    assert!(runtime.is_playing("run"));
    assert_eq!(runtime.clip("run").unwrap().starts, 1);
    // Run started during the second tick and advanced twice since.
    assert_eq!(runtime.clip("run").unwrap().time, 0.5);
}

#[test]
fn test_first_satisfied_edge_wins() {
    let mut runtime = runtime();
    let mut animator = Animator::new();
    animator.init_state_machine(StateMachineConfig::new("Idle"));
    animator.add_transition("Idle", "Walk", [TransitionCondition::new(|_| true, 1)]);
    animator.add_transition("Idle", "Run", [TransitionCondition::new(|_| true, 100)]);
    animator.add_animation_state(ClipState::new("Idle", "idle"), &mut runtime);
    animator.add_animation_state(ClipState::new("Walk", "walk"), &mut runtime);
    animator.add_animation_state(ClipState::new("Run", "run"), &mut runtime);

    assert!(animator.update(0.1, &mut runtime));
    assert_eq!(animator.current_state(), Some("Walk"));
}

#[test]
fn test_remove_condition_by_identity() {
    let mut runtime = runtime();
    let mut animator = Animator::new();
    animator.init_state_machine(StateMachineConfig::new("Idle"));
    let always = predicate(|_| true);
    animator.add_transition(
        "Idle",
        "Run",
        [TransitionCondition::from_predicate(always.clone(), 1)],
    );
    animator.add_animation_state(ClipState::new("Idle", "idle"), &mut runtime);
    animator.add_animation_state(ClipState::new("Run", "run"), &mut runtime);

    let lookalike = predicate(|_| true);
    assert!(!animator.remove_transition("Idle", "Run", &lookalike));
    assert!(animator.remove_transition("Idle", "Run", &always));
    assert!(!animator.remove_transition("Idle", "Run", &always));

    assert!(!animator.update(0.1, &mut runtime));
    assert_eq!(animator.current_state(), Some("Idle"));
    // The edge itself survives, so an explicit switch is still allowed.
    let machine = animator.state_machine().unwrap();
    assert!(machine.transitions().has_edge("Idle", "Run"));
    assert!(machine.possible_transitions().is_empty());
}

#[test]
fn test_exit_time_returns_to_idle() {
    let mut app = app();
    let mut runtime = runtime();
    let mut animator = Animator::new();
    animator.init_state_machine(StateMachineConfig::new("Idle"));
    animator.add_transition("Attack", "Idle", [TransitionCondition::exit_time(0.5, 0)]);
    animator.add_animation_state(ClipState::new("Idle", "idle"), &mut runtime);
    animator.add_animation_state(
        ClipState::new("Attack", "attack")
            .with_loop(false)
            .with_exit_time(true),
        &mut runtime,
    );
    assert!(animator.set_state("Attack", &mut runtime));
    let entity = app.world_mut().spawn((animator, runtime)).id();

    tick(&mut app);
    assert_eq!(
        app.world().get::<Animator>(entity).unwrap().current_state(),
        Some("Attack")
    );
    tick(&mut app);
    let world = app.world();
    assert_eq!(world.get::<Animator>(entity).unwrap().current_state(), Some("Idle"));
    let runtime = world.get::<HeadlessRuntime>(entity).unwrap();
    assert!(runtime.is_playing("idle"));
    assert!(!runtime.is_playing("attack"));
    assert_eq!(runtime.clip("idle").unwrap().starts, 2);
}

#[test]
fn test_playback_waits_for_asset() {
    let mut app = app();
    let mut runtime = runtime().unloaded();
    let mut animator = locomotion(&mut runtime);
    animator.add_blend_tree_state(
        BlendTreeState::one_d(
            "Move",
            BlendTree1D::new(0.0, 1.0)
                .with_node(BlendNode::at("Walk", "walk", 0.0))
                .with_node(BlendNode::at("Run", "run", 1.0)),
        ),
        &mut runtime,
    );
    let entity = app.world_mut().spawn((animator, runtime)).id();

    tick(&mut app);
    let world = app.world();
    assert_eq!(world.get::<HeadlessRuntime>(entity).unwrap().playing().count(), 0);
    assert_eq!(
        world.get::<Animator>(entity).unwrap().load_gate().pending(),
        &[
            Deferred {
                state: "Idle".to_string(),
                op: DeferredOp::StartClip
            },
            Deferred {
                state: "Move".to_string(),
                op: DeferredOp::InitBlendTree
            },
        ]
    );

    app.world_mut()
        .get_mut::<HeadlessRuntime>(entity)
        .unwrap()
        .set_loaded(true);
    tick(&mut app);

    let world = app.world();
    let runtime = world.get::<HeadlessRuntime>(entity).unwrap();
    assert!(runtime.is_playing("idle"));
    assert_eq!(runtime.clip("idle").unwrap().starts, 1);
    // Blend clips run silently until their state is entered.
    assert_eq!(runtime.weight("walk"), Some(0.0));
    assert_eq!(runtime.weight("run"), Some(0.0));
    assert!(world.get::<Animator>(entity).unwrap().load_gate().is_ready());
}

#[test]
fn test_parameter_binding_drives_blend_tree() {
    let mut app = app();
    let mut runtime = runtime();
    let mut animator = Animator::new();
    animator.init_state_machine(StateMachineConfig::new("Move"));
    animator.add_blend_tree_state(
        BlendTreeState::one_d(
            "Move",
            BlendTree1D::new(0.0, 4.0)
                .with_node(BlendNode::at("Run", "run", 1.0))
                .with_node(BlendNode::at("Walk", "walk", 0.0)),
        )
        .with_parameter("speed"),
        &mut runtime,
    );
    animator.set_parameter("speed", 1.0);
    let entity = app.world_mut().spawn((animator, runtime)).id();

    tick(&mut app);
    let runtime = app.world().get::<HeadlessRuntime>(entity).unwrap();
    assert_eq!(runtime.weight("walk"), Some(0.75));
    assert_eq!(runtime.weight("run"), Some(0.25));

    app.world_mut()
        .get_mut::<Animator>(entity)
        .unwrap()
        .set_parameter("speed", 9.0);
    tick(&mut app);
    let runtime = app.world().get::<HeadlessRuntime>(entity).unwrap();
    assert_eq!(runtime.weight("walk"), Some(0.0));
    assert_eq!(runtime.weight("run"), Some(1.0));
}

#[test]
fn test_blend_tree_2d_strafe() {
    let mut runtime = runtime();
    let mut animator = Animator::new();
    animator.init_state_machine(StateMachineConfig::new("Strafe"));
    animator.add_blend_tree_state(
        BlendTreeState::two_d(
            "Strafe",
            BlendTree2D::new(Vec2::splat(-1.0), Vec2::splat(1.0))
                .with_node(BlendNode::at_2d("Idle", "idle", Vec2::ZERO))
                .with_node(BlendNode::at_2d("Forward", "run", Vec2::Y)),
        ),
        &mut runtime,
    );

    assert!(animator.set_blend_parameter_2d("Strafe", Vec2::ZERO));
    animator.update(0.1, &mut runtime);
    assert_eq!(runtime.weight("idle"), Some(1.0));
    assert_eq!(runtime.weight("run"), Some(0.0));

    assert!(animator.set_blend_parameter_2d("Strafe", Vec2::new(0.0, 0.5)));
    animator.update(0.1, &mut runtime);
    let idle = runtime.weight("idle").unwrap();
    let run = runtime.weight("run").unwrap();
    assert!((idle - 0.5).abs() < 1e-5);
    assert!((run - 0.5).abs() < 1e-5);
}

#[test]
fn test_dispose_detaches_animator() {
    let mut app = app();
    let mut runtime = runtime();
    let animator = locomotion(&mut runtime);
    let entity = app.world_mut().spawn((animator, runtime)).id();
    tick(&mut app);

    {
        let world = app.world_mut();
        let mut query = world.query::<(&mut Animator, &mut HeadlessRuntime)>();
        let (mut animator, mut runtime) = query.get_mut(world, entity).unwrap();
        animator.dispose(&mut *runtime);
    }
    tick(&mut app);

    let world = app.world();
    let animator = world.get::<Animator>(entity).unwrap();
    assert!(animator.is_disposed());
    assert_eq!(animator.current_state(), None);
    assert_eq!(world.get::<HeadlessRuntime>(entity).unwrap().playing().count(), 0);
}
