use bevy::{platform::collections::HashMap, prelude::*};

#[cfg(feature = "history")]
use crate::history::StateHistory;
use crate::{
    load_gate::{Deferred, PlaybackContext},
    parameters::Parameters,
    state::{AnimState, AnimationState},
    transition::{Predicate, TransitionCondition, TransitionContext, TransitionEdge, TransitionTable},
};

/// 状态机配置
///
/// State machine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachineConfig {
    /// 初始状态名称，添加同名状态时立即进入
    ///
    /// Entered as soon as a state with this name is added
    pub initial_state: String,
    /// Number of entered states kept by the history.
    pub history_len: usize,
}

impl StateMachineConfig {
    pub fn new(initial_state: impl Into<String>) -> Self {
        Self {
            initial_state: initial_state.into(),
            history_len: 10,
        }
    }

    pub fn with_history_len(mut self, history_len: usize) -> Self {
        self.history_len = history_len;
        self
    }
}

/// 动画状态机
///
/// Owns the states, the current state and the transition table.
///
/// 每次 [`update`](Self::update) 只运行当前状态的更新，并至多发生一次过渡。
///
/// Each [`update`](Self::update) runs the current state's `on_update` once and
/// then takes at most one transition; transitions never chain within a tick.
#[derive(Debug, Clone)]
pub struct StateMachine {
    states: HashMap<String, AnimState>,
    current: Option<String>,
    transitions: TransitionTable,
    /// 当前状态的候选过渡，进入状态时重新计算
    possible: Vec<TransitionEdge>,
    initial_state: String,
    #[cfg(feature = "history")]
    history: StateHistory,
}

impl StateMachine {
    pub fn new(config: StateMachineConfig) -> Self {
        Self {
            states: HashMap::new(),
            current: None,
            transitions: TransitionTable::new(),
            possible: Vec::new(),
            initial_state: config.initial_state,
            #[cfg(feature = "history")]
            history: StateHistory::new(config.history_len),
        }
    }

    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    /// 注册状态，同名状态已存在时忽略
    ///
    /// Registers a state. A duplicate name is logged and ignored.
    ///
    /// If nothing is current yet and the name matches the initial state, the
    /// state is entered right away with an empty previous name.
    pub fn add_state(&mut self, state: impl Into<AnimState>, ctx: &mut PlaybackContext) -> bool {
        self.add_state_with_parameters(state, None, ctx)
    }

    /// Like [`add_state`](Self::add_state), a bound blend tree entered as the
    /// initial state reads `parameters` before its first weights are pushed.
    pub fn add_state_with_parameters(
        &mut self,
        state: impl Into<AnimState>,
        parameters: Option<&Parameters>,
        ctx: &mut PlaybackContext,
    ) -> bool {
        let mut state = state.into();
        let name = state.name().to_string();
        if self.states.contains_key(&name) {
            warn!("State<{}> already exists, ignoring", name);
            return false;
        }
        if let AnimState::BlendTree(blend_tree) = &mut state {
            blend_tree.initialize(ctx);
        }
        self.states.insert(name.clone(), state);

        if self.current.is_none() && name == self.initial_state {
            self.enter(&name, "", parameters, ctx);
        }
        true
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    pub fn state(&self, name: &str) -> Option<&AnimState> {
        self.states.get(name)
    }

    pub fn state_mut(&mut self, name: &str) -> Option<&mut AnimState> {
        self.states.get_mut(name)
    }

    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    pub fn current_state(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&AnimState> {
        self.current.as_ref().and_then(|name| self.states.get(name))
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    /// Cached candidate edges leaving the current state.
    pub fn possible_transitions(&self) -> &[TransitionEdge] {
        &self.possible
    }

    #[cfg(feature = "history")]
    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    #[cfg(feature = "history")]
    pub fn previous_state(&self) -> Option<&str> {
        self.history.previous()
    }

    fn enter(
        &mut self,
        name: &str,
        prev: &str,
        parameters: Option<&Parameters>,
        ctx: &mut PlaybackContext,
    ) {
        self.current = Some(name.to_string());
        #[cfg(feature = "history")]
        self.history.record(name);
        if let Some(state) = self.states.get_mut(name) {
            if let Some(parameters) = parameters
                && let Some(blend_tree) = state.as_blend_tree_mut()
            {
                blend_tree.sync_parameters(parameters);
            }
            state.on_enter(prev, ctx);
        }
        self.possible = self.transitions.candidates(name);
    }

    /// 过渡到指定状态
    ///
    /// Leaves the current state for `name`. Fails without side effects when
    /// `name` is not registered, or when `skip_check` is off and the table has
    /// no edge from the current state to `name`.
    pub fn transition_to(&mut self, name: &str, skip_check: bool, ctx: &mut PlaybackContext) -> bool {
        self.transition_to_with_parameters(name, skip_check, None, ctx)
    }

    /// Like [`transition_to`](Self::transition_to), the entered state reads its
    /// bound parameters before `on_enter`.
    pub fn transition_to_with_parameters(
        &mut self,
        name: &str,
        skip_check: bool,
        parameters: Option<&Parameters>,
        ctx: &mut PlaybackContext,
    ) -> bool {
        if !self.states.contains_key(name) {
            warn!("Cannot transition to unknown state<{}>", name);
            return false;
        }
        let prev = self.current.clone();
        if !skip_check {
            let allowed = prev
                .as_deref()
                .is_some_and(|from| self.transitions.has_edge(from, name));
            if !allowed {
                warn!(
                    "No transition from state<{}> to state<{}>",
                    prev.as_deref().unwrap_or_default(),
                    name
                );
                return false;
            }
        }

        if let Some(state) = prev.as_deref().and_then(|from| self.states.get_mut(from)) {
            state.on_exit(name, ctx);
        }
        let prev = prev.unwrap_or_default();
        self.enter(name, &prev, parameters, ctx);
        debug!("State transition: {} -> {}", prev, name);
        true
    }

    /// 更新当前状态，然后检查过渡
    ///
    /// Updates the current state, then checks transitions. Returns whether a
    /// transition happened.
    pub fn update(&mut self, dt: f32, parameters: &Parameters, ctx: &mut PlaybackContext) -> bool {
        let Some(current) = self.current.as_deref() else {
            return false;
        };
        if let Some(state) = self.states.get_mut(current) {
            if let Some(blend_tree) = state.as_blend_tree_mut() {
                blend_tree.sync_parameters(parameters);
            }
            state.on_update(dt, ctx);
        }
        self.check_transitions(parameters, ctx)
    }

    /// 按缓存顺序检查候选过渡
    ///
    /// Takes the first cached edge whose conditions all hold. Edges are tried
    /// in table order; priority only orders conditions inside an edge.
    pub fn check_transitions(&mut self, parameters: &Parameters, ctx: &mut PlaybackContext) -> bool {
        let Some(current) = self.current.as_deref() else {
            return false;
        };
        let context = TransitionContext {
            state: current,
            elapsed: self
                .states
                .get(current)
                .map(AnimState::exit_time_elapsed)
                .unwrap_or_default(),
            parameters,
        };
        let Some(target) = self
            .possible
            .iter()
            .find(|edge| edge.is_satisfied(&context))
            .map(|edge| edge.to.clone())
        else {
            return false;
        };
        self.transition_to_with_parameters(&target, false, Some(parameters), ctx)
    }

    fn refresh_candidates(&mut self, from: &str) {
        if self.current.as_deref() == Some(from) {
            self.possible = self.transitions.candidates(from);
        }
    }

    /// Declares the edge `from -> to`, the states may be registered later.
    pub fn add_transition(&mut self, from: &str, to: &str) {
        self.transitions.add_edge(from, to);
    }

    pub fn add_transition_condition(&mut self, from: &str, to: &str, condition: TransitionCondition) {
        self.transitions.add_condition(from, to, condition);
        self.refresh_candidates(from);
    }

    /// Removes conditions by predicate identity, see [`TransitionTable::remove_condition`].
    pub fn remove_transition_condition(&mut self, from: &str, to: &str, predicate: &Predicate) -> bool {
        let removed = self.transitions.remove_condition(from, to, predicate);
        if removed {
            self.refresh_candidates(from);
        }
        removed
    }

    /// 找出引用了未注册状态的过渡
    ///
    /// Edges whose endpoints are not registered (yet).
    pub fn unresolved_transitions(&self) -> Vec<(String, String)> {
        self.transitions
            .edges()
            .filter(|(from, to)| !self.has_state(from) || !self.has_state(to))
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    }

    /// Hands deferred work back to the states that queued it.
    pub fn flush_deferred(&mut self, deferred: Vec<Deferred>, ctx: &mut PlaybackContext) {
        for Deferred { state, op } in deferred {
            let active = self.current.as_deref() == Some(state.as_str());
            let Some(target) = self.states.get_mut(&state) else {
                warn!("Deferred {:?} for unknown state<{}> dropped", op, state);
                continue;
            };
            target.resume(op, active, ctx);
        }
    }

    pub fn pause(&mut self, ctx: &mut PlaybackContext) {
        if let Some(state) = self.current.as_deref().and_then(|name| self.states.get_mut(name)) {
            state.pause(ctx);
        }
    }

    /// 停止所有片段并清空状态机
    ///
    /// Exits the current state, releases the clips of every other state and
    /// empties the machine.
    pub fn shutdown(&mut self, ctx: &mut PlaybackContext) {
        if let Some(current) = self.current.take()
            && let Some(state) = self.states.get_mut(&current)
        {
            state.on_exit("", ctx);
        }
        for state in self.states.values_mut() {
            state.on_exit("", ctx);
        }
        self.states.clear();
        self.transitions.clear();
        self.possible.clear();
        #[cfg(feature = "history")]
        self.history.clear();
    }
}
