use bevy::{math::Vec2, prelude::*};

use crate::{
    blend_tree_state::BlendTreeState,
    clip_state::ClipState,
    load_gate::{LoadGate, PlaybackContext},
    parameters::Parameters,
    runtime::AnimationRuntime,
    state::AnimState,
    state_machine::{StateMachine, StateMachineConfig},
    transition::{Predicate, TransitionCondition},
};

/// 动画控制器组件
///
/// Per-entity animator. Owns one [`StateMachine`], the parameter store and
/// the load gate of the entity's skeletal asset.
///
/// 状态机需要显式调用 [`init_state_machine`](Self::init_state_machine) 创建。
///
/// The state machine is created explicitly through
/// [`init_state_machine`](Self::init_state_machine); until then every state
/// and transition call is a logged no-op.
///
/// # 示例\Example
/// ```
/// # use bevy_anim_state::prelude::*;
/// let mut runtime = HeadlessRuntime::new()
///     .with_clip("idle", 1.0)
///     .with_clip("run", 0.8);
/// let mut animator = Animator::new();
/// animator.init_state_machine(StateMachineConfig::new("Idle"));
/// animator.add_transition(
///     "Idle",
///     "Run",
///     [TransitionCondition::parameter_above("speed", 0.1, 1)],
/// );
/// animator.add_animation_state(ClipState::new("Idle", "idle"), &mut runtime);
/// animator.add_animation_state(ClipState::new("Run", "run"), &mut runtime);
///
/// animator.set_parameter("speed", 1.0);
/// animator.update(1.0 / 60.0, &mut runtime);
/// assert_eq!(animator.current_state(), Some("Run"));
/// ```
#[derive(Component, Debug, Default)]
pub struct Animator {
    state_machine: Option<StateMachine>,
    parameters: Parameters,
    gate: LoadGate,
    disposed: bool,
}

impl Animator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建状态机，只能调用一次
    ///
    /// Creates the state machine. Returns `false` if one already exists or the
    /// animator was disposed.
    pub fn init_state_machine(&mut self, config: StateMachineConfig) -> bool {
        if self.disposed {
            warn!("Animator: init_state_machine after dispose");
            return false;
        }
        if self.state_machine.is_some() {
            warn!("Animator: state machine already initialized");
            return false;
        }
        self.state_machine = Some(StateMachine::new(config));
        true
    }

    pub fn state_machine(&self) -> Option<&StateMachine> {
        self.state_machine.as_ref()
    }

    pub fn state_machine_mut(&mut self) -> Option<&mut StateMachine> {
        self.state_machine.as_mut()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn load_gate(&self) -> &LoadGate {
        &self.gate
    }

    fn machine_mut(&mut self, action: &str) -> Option<&mut StateMachine> {
        if self.disposed {
            warn!("Animator: {} on a disposed animator", action);
            return None;
        }
        if self.state_machine.is_none() {
            warn!("Animator: {} before init_state_machine", action);
        }
        self.state_machine.as_mut()
    }

    /// 资源就绪时执行推迟的操作
    ///
    /// Polls the runtime's load state and flushes deferred work once it is ready.
    fn poll_load(&mut self, runtime: &mut dyn AnimationRuntime) {
        let deferred = self.gate.poll(runtime.is_loaded());
        if deferred.is_empty() {
            return;
        }
        if let Some(machine) = self.state_machine.as_mut() {
            let mut ctx = PlaybackContext::new(runtime, &mut self.gate);
            machine.flush_deferred(deferred, &mut ctx);
        }
    }

    fn add_state(&mut self, state: AnimState, runtime: &mut dyn AnimationRuntime) -> bool {
        if self.machine_mut("add state").is_none() {
            return false;
        }
        self.poll_load(runtime);
        let Some(machine) = self.state_machine.as_mut() else {
            return false;
        };
        let mut ctx = PlaybackContext::new(runtime, &mut self.gate);
        machine.add_state_with_parameters(state, Some(&self.parameters), &mut ctx)
    }

    /// Registers a single-clip state.
    pub fn add_animation_state(
        &mut self,
        state: ClipState,
        runtime: &mut dyn AnimationRuntime,
    ) -> bool {
        self.add_state(state.into(), runtime)
    }

    /// Registers a blend-tree state, its clips start at weight 0 right away
    /// (or once the skeletal asset is loaded).
    pub fn add_blend_tree_state(
        &mut self,
        state: BlendTreeState,
        runtime: &mut dyn AnimationRuntime,
    ) -> bool {
        self.add_state(state.into(), runtime)
    }

    /// 添加过渡边及其条件
    ///
    /// Adds the edge `from -> to` with its conditions. With no conditions the
    /// edge only permits explicit transitions.
    pub fn add_transition(
        &mut self,
        from: &str,
        to: &str,
        conditions: impl IntoIterator<Item = TransitionCondition>,
    ) -> bool {
        let Some(machine) = self.machine_mut("add_transition") else {
            return false;
        };
        machine.add_transition(from, to);
        for condition in conditions {
            machine.add_transition_condition(from, to, condition);
        }
        true
    }

    /// Removes a condition by predicate identity.
    pub fn remove_transition(&mut self, from: &str, to: &str, predicate: &Predicate) -> bool {
        self.machine_mut("remove_transition")
            .is_some_and(|machine| machine.remove_transition_condition(from, to, predicate))
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: f32) {
        self.parameters.set(name, value);
    }

    pub fn get_parameter(&self, name: &str) -> f32 {
        self.parameters.get(name)
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn blend_state_mut(&mut self, state: &str) -> Option<&mut BlendTreeState> {
        let found = self
            .machine_mut("set blend parameter")?
            .state_mut(state)
            .and_then(AnimState::as_blend_tree_mut);
        if found.is_none() {
            warn!("Animator: state<{}> is not a blend-tree state", state);
        }
        found
    }

    /// Writes the 1D blend parameter of a blend-tree state.
    pub fn set_blend_parameter(&mut self, state: &str, value: f32) -> bool {
        self.blend_state_mut(state)
            .map(|blend_tree| blend_tree.set_blend_parameter(value))
            .is_some()
    }

    /// Writes the 2D blend parameter of a blend-tree state.
    pub fn set_blend_parameter_2d(&mut self, state: &str, value: Vec2) -> bool {
        self.blend_state_mut(state)
            .map(|blend_tree| blend_tree.set_blend_parameter_2d(value))
            .is_some()
    }

    /// 强制切换状态，不检查过渡条件
    ///
    /// Forces a switch to `name`, bypassing the transition table.
    pub fn set_state(&mut self, name: &str, runtime: &mut dyn AnimationRuntime) -> bool {
        if self.machine_mut("set_state").is_none() {
            return false;
        }
        self.poll_load(runtime);
        let Some(machine) = self.state_machine.as_mut() else {
            return false;
        };
        let mut ctx = PlaybackContext::new(runtime, &mut self.gate);
        machine.transition_to_with_parameters(name, true, Some(&self.parameters), &mut ctx)
    }

    pub fn current_state(&self) -> Option<&str> {
        self.state_machine
            .as_ref()
            .and_then(StateMachine::current_state)
    }

    #[cfg(feature = "history")]
    pub fn previous_state(&self) -> Option<&str> {
        self.state_machine
            .as_ref()
            .and_then(StateMachine::previous_state)
    }

    /// 每帧更新
    ///
    /// Per-frame tick: flushes deferred playback if the asset just finished
    /// loading, then updates the state machine. Returns whether a transition
    /// happened.
    pub fn update(&mut self, dt: f32, runtime: &mut dyn AnimationRuntime) -> bool {
        if self.disposed || self.state_machine.is_none() {
            return false;
        }
        self.poll_load(runtime);
        let Some(machine) = self.state_machine.as_mut() else {
            return false;
        };
        let mut ctx = PlaybackContext::new(runtime, &mut self.gate);
        machine.update(dt, &self.parameters, &mut ctx)
    }

    /// Pauses the clips of the current state without stopping them.
    pub fn pause(&mut self, runtime: &mut dyn AnimationRuntime) {
        if self.machine_mut("pause").is_none() {
            return;
        }
        let Some(machine) = self.state_machine.as_mut() else {
            return;
        };
        let mut ctx = PlaybackContext::new(runtime, &mut self.gate);
        machine.pause(&mut ctx);
    }

    /// 释放所有资源
    ///
    /// Stops every clip, clears parameters and drops the state machine.
    pub fn dispose(&mut self, runtime: &mut dyn AnimationRuntime) {
        if self.disposed {
            return;
        }
        if let Some(mut machine) = self.state_machine.take() {
            let mut ctx = PlaybackContext::new(runtime, &mut self.gate);
            machine.shutdown(&mut ctx);
        }
        self.parameters.clear();
        self.gate = LoadGate::default();
        self.disposed = true;
    }
}
