use std::time::Duration;

use bevy::{app::ScheduleRunnerPlugin, log::LogPlugin, prelude::*};
use bevy_anim_state::prelude::*;

/// 模拟输入的速度曲线
#[derive(Component, Default)]
struct Throttle {
    frame: u32,
}

fn startup(mut commands: Commands) {
    let mut runtime = HeadlessRuntime::new()
        .with_clip("idle", 2.0)
        .with_clip("walk", 1.2)
        .with_clip("run", 0.8)
        .with_clip("jump", 0.6);

    let mut animator = Animator::new();
    animator.init_state_machine(StateMachineConfig::new("Idle"));
    animator.add_transition(
        "Idle",
        "Move",
        [TransitionCondition::parameter_above("speed", 0.1, 0)],
    );
    animator.add_transition(
        "Move",
        "Idle",
        [TransitionCondition::parameter_below("speed", 0.1, 0)],
    );
    animator.add_transition(
        "Move",
        "Jump",
        [TransitionCondition::parameter_above("jump", 0.5, 10)],
    );
    animator.add_transition("Jump", "Move", [TransitionCondition::exit_time(0.6, 0)]);

    animator.add_animation_state(ClipState::new("Idle", "idle"), &mut runtime);
    animator.add_blend_tree_state(
        BlendTreeState::one_d(
            "Move",
            BlendTree1D::new(0.0, 6.0)
                .with_node(BlendNode::at("Walk", "walk", 0.0))
                .with_node(BlendNode::at("Run", "run", 1.0)),
        )
        .with_parameter("speed"),
        &mut runtime,
    );
    animator.add_animation_state(
        ClipState::new("Jump", "jump")
            .with_loop(false)
            .with_exit_time(true),
        &mut runtime,
    );

    commands.spawn((Name::new("角色"), animator, runtime, Throttle::default()));
}

fn drive_input(mut query: Query<(&mut Animator, &mut Throttle)>) {
    for (mut animator, mut throttle) in query.iter_mut() {
        throttle.frame += 1;
        let speed = match throttle.frame {
            0..=10 => 0.0,
            11..=40 => (throttle.frame - 10) as f32 * 0.2,
            41..=60 => 6.0,
            _ => 0.0,
        };
        animator.set_parameter("speed", speed);
        animator.set_parameter("jump", if throttle.frame == 45 { 1.0 } else { 0.0 });
    }
}

fn report(
    query: Query<(&Name, &Animator, &HeadlessRuntime, &Throttle)>,
    mut exit: MessageWriter<AppExit>,
) {
    for (name, animator, runtime, throttle) in query.iter() {
        let weights = runtime
            .playing()
            .map(|clip| format!("{}={:.2}", clip.name, clip.weight))
            .collect::<Vec<_>>();
        println!(
            "[{:>3}] {}: {:?} speed={:.1} {}",
            throttle.frame,
            name,
            animator.current_state(),
            animator.get_parameter("speed"),
            weights.join(" ")
        );
        if throttle.frame >= 80 {
            exit.write(AppExit::Success);
        }
    }
}

fn main() {
    App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / 30.0,
            ))),
            LogPlugin::default(),
        ))
        .add_plugins(AnimatorPlugin::<HeadlessRuntime>::default())
        .add_systems(Startup, startup)
        .add_systems(PreUpdate, drive_input)
        .add_systems(PostUpdate, report)
        .run();
}
