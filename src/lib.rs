//! # Bevy Anim State
//!
//! 一个基于 Bevy 引擎的动画状态机，支持单片段状态和混合树状态。
//!
//! ## 功能特性
//!
//! - 单片段状态与一维、二维混合树状态
//! - 带优先级的过渡条件，以及可选的退出时间
//! - 骨骼资源加载完成前推迟播放
//! - 通过 [`AnimationRuntime`](runtime::AnimationRuntime) 接入任意播放后端
//! -------------------------------------------------------
//! # Bevy Anim State
//!
//! An animation state machine for the Bevy engine with single-clip states and
//! blend-tree states.
//!
//! ## Features
//!
//! - Single-clip states plus 1D and 2D blend-tree states
//! - Prioritised transition conditions and optional exit time
//! - Playback deferred until the skeletal asset is loaded
//! - Any playback backend through [`AnimationRuntime`](runtime::AnimationRuntime)

pub mod animator;
pub mod blend_tree;
pub mod blend_tree_state;
pub mod clip_state;
#[cfg(feature = "history")]
pub mod history;
pub mod load_gate;
pub mod parameters;
#[cfg(feature = "animation_player")]
pub mod player;
pub mod runtime;
pub mod state;
pub mod state_machine;
pub mod transition;

use std::marker::PhantomData;

use bevy::{
    ecs::{component::Mutable, schedule::ScheduleLabel},
    prelude::*,
};

use crate::{animator::Animator, runtime::AnimationRuntime};

/// 驱动所有 [`Animator`] 的插件
///
/// Ticks every entity carrying an [`Animator`] together with the runtime
/// component `R` in schedule `S`.
///
/// # 示例\Example
/// ```no_run
/// # use bevy::prelude::*;
/// # use bevy_anim_state::prelude::*;
/// App::new()
///     .add_plugins(MinimalPlugins)
///     .add_plugins(AnimatorPlugin::<HeadlessRuntime>::default())
///     .run();
/// ```
pub struct AnimatorPlugin<R, S: ScheduleLabel + Clone = Update> {
    schedule: S,
    _runtime: PhantomData<fn() -> R>,
}

impl<R> Default for AnimatorPlugin<R, Update> {
    fn default() -> Self {
        Self::new(Update)
    }
}

impl<R, S: ScheduleLabel + Clone> AnimatorPlugin<R, S> {
    pub fn new(schedule: S) -> Self {
        Self {
            schedule,
            _runtime: PhantomData,
        }
    }
}

impl<R, S> Plugin for AnimatorPlugin<R, S>
where
    R: AnimationRuntime + Component<Mutability = Mutable>,
    S: ScheduleLabel + Clone,
{
    fn build(&self, app: &mut App) {
        app.add_systems(self.schedule.clone(), drive_animators::<R>);
    }
}

/// 先更新状态机，再推进播放时间
///
/// Updates each animator, then advances its runtime by the same delta.
pub fn drive_animators<R>(time: Res<Time>, mut query: Query<(&mut Animator, &mut R)>)
where
    R: AnimationRuntime + Component<Mutability = Mutable>,
{
    let dt = time.delta_secs();
    for (mut animator, mut runtime) in query.iter_mut() {
        animator.update(dt, &mut *runtime);
        runtime.advance(dt);
    }
}

pub mod prelude {
    #[cfg(feature = "history")]
    pub use crate::history::StateHistory;
    #[cfg(feature = "animation_player")]
    pub use crate::player::{AnimationClipIndex, AnimationPlayerBridgePlugin, PlayerRuntime};
    pub use crate::{
        AnimatorPlugin,
        animator::Animator,
        blend_tree::{BlendNode, BlendTree, BlendTree1D, BlendTree2D},
        blend_tree_state::{BlendTreeState, ParameterBinding},
        clip_state::ClipState,
        load_gate::{DeferredOp, LoadGate},
        parameters::Parameters,
        runtime::{AnimationRuntime, ClipId, HeadlessRuntime},
        state::{AnimState, AnimationState},
        state_machine::{StateMachine, StateMachineConfig},
        transition::{
            Predicate, TransitionCondition, TransitionContext, TransitionEdge, TransitionTable,
            predicate,
        },
    };
}
