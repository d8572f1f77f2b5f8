use bevy::{math::Vec2, platform::collections::HashMap, prelude::*};

use crate::{
    blend_tree::{BlendTree, BlendTree1D, BlendTree2D},
    load_gate::{DeferredOp, PlaybackContext},
    parameters::Parameters,
    runtime::ClipId,
    state::{AnimationState, StateCore},
};

/// 混合参数与动画参数的绑定
///
/// Animator parameters copied into the blend parameter on every update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterBinding {
    OneD(String),
    TwoD { x: String, y: String },
}

/// 混合树状态
///
/// A state that plays every node clip of its blend tree at once and
/// re-weighs them each update from the live blend parameter.
#[derive(Debug, Clone)]
pub struct BlendTreeState {
    core: StateCore,
    tree: BlendTree,
    pub blend_parameter: f32,
    pub blend_parameter_2d: Vec2,
    binding: Option<ParameterBinding>,
    /// 节点名 -> 正在播放的片段
    active_animations: HashMap<String, ClipId>,
    awaiting_load: bool,
}

impl BlendTreeState {
    pub fn new(name: impl Into<String>, tree: impl Into<BlendTree>) -> Self {
        Self {
            core: StateCore::new(name),
            tree: tree.into(),
            blend_parameter: 0.0,
            blend_parameter_2d: Vec2::ZERO,
            binding: None,
            active_animations: HashMap::new(),
            awaiting_load: false,
        }
    }

    pub fn one_d(name: impl Into<String>, tree: BlendTree1D) -> Self {
        Self::new(name, tree)
    }

    pub fn two_d(name: impl Into<String>, tree: BlendTree2D) -> Self {
        Self::new(name, tree)
    }

    /// Drives the 1D blend parameter from the animator parameter `name`.
    pub fn with_parameter(mut self, name: impl Into<String>) -> Self {
        self.binding = Some(ParameterBinding::OneD(name.into()));
        self
    }

    /// Drives the 2D blend parameter from the animator parameters `x` and `y`.
    pub fn with_parameters_2d(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.binding = Some(ParameterBinding::TwoD {
            x: x.into(),
            y: y.into(),
        });
        self
    }

    pub fn with_exit_time(mut self, has_exit_time: bool) -> Self {
        self.core.has_exit_time = has_exit_time;
        self
    }

    pub fn tree(&self) -> &BlendTree {
        &self.tree
    }

    pub fn is_1d(&self) -> bool {
        self.tree.is_1d()
    }

    pub fn binding(&self) -> Option<&ParameterBinding> {
        self.binding.as_ref()
    }

    pub fn set_blend_parameter(&mut self, value: f32) {
        self.blend_parameter = value;
    }

    pub fn set_blend_parameter_2d(&mut self, value: Vec2) {
        self.blend_parameter_2d = value;
    }

    pub fn active_clip(&self, node: &str) -> Option<ClipId> {
        self.active_animations.get(node).copied()
    }

    pub fn active_count(&self) -> usize {
        self.active_animations.len()
    }

    pub fn is_awaiting_load(&self) -> bool {
        self.awaiting_load
    }

    /// Copies bound animator parameters into the blend parameter.
    pub fn sync_parameters(&mut self, parameters: &Parameters) {
        match &self.binding {
            Some(ParameterBinding::OneD(name)) => {
                self.blend_parameter = parameters.get(name);
            }
            Some(ParameterBinding::TwoD { x, y }) => {
                self.blend_parameter_2d = Vec2::new(parameters.get(x), parameters.get(y));
            }
            None => {}
        }
    }

    /// 启动所有节点片段（权重为 0），资源未就绪时推迟
    ///
    /// Starts every node clip looping at weight 0, or queues the work until
    /// the skeletal asset is loaded.
    pub fn initialize(&mut self, ctx: &mut PlaybackContext) {
        if ctx.when_ready(&self.core.name, DeferredOp::InitBlendTree) {
            self.start_clips(ctx);
        } else {
            self.awaiting_load = true;
        }
    }

    fn start_clips(&mut self, ctx: &mut PlaybackContext) {
        self.release_clips(ctx);
        for node in self.tree.nodes() {
            let Some(clip) = ctx.runtime.find_clip(&node.clip_name) else {
                debug!(
                    "State<{}>: skipping node '{}', clip '{}' not found",
                    self.core.name, node.name, node.clip_name
                );
                continue;
            };
            ctx.runtime.start(clip, true, 1.0);
            ctx.runtime.set_weight(clip, 0.0);
            self.active_animations.insert(node.name.clone(), clip);
        }
    }

    fn release_clips(&mut self, ctx: &mut PlaybackContext) {
        for (_, clip) in self.active_animations.drain() {
            ctx.runtime.stop(clip);
        }
    }

    /// 重新计算权重并推送到运行时
    ///
    /// Recomputes node weights from the blend parameter and pushes them.
    pub fn update_blend_weights(&mut self, ctx: &mut PlaybackContext) {
        match &mut self.tree {
            BlendTree::OneD(tree) => {
                if tree.nodes.is_empty() {
                    return;
                }
                tree.compute_weights(self.blend_parameter);
            }
            BlendTree::TwoD(tree) => tree.compute_weights(self.blend_parameter_2d),
        }
        self.update_active_clips(ctx);
    }

    /// Weight 0 silences a clip without stopping it, so it keeps its phase.
    pub fn update_active_clips(&self, ctx: &mut PlaybackContext) {
        for node in self.tree.nodes() {
            if let Some(clip) = self.active_animations.get(&node.name) {
                ctx.runtime.set_weight(*clip, node.weight);
            }
        }
        trace!(
            "State<{}> weights: {:?}",
            self.core.name,
            self.tree
                .nodes()
                .iter()
                .map(|n| (n.name.as_str(), n.weight))
                .collect::<Vec<_>>()
        );
    }
}

impl AnimationState for BlendTreeState {
    fn core(&self) -> &StateCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StateCore {
        &mut self.core
    }

    /// Clips released by a previous exit are started again from the beginning.
    fn on_enter(&mut self, _prev: &str, ctx: &mut PlaybackContext) {
        self.core.enter();
        if self.active_animations.is_empty() {
            self.initialize(ctx);
        }
        self.update_blend_weights(ctx);
    }

    fn on_update(&mut self, dt: f32, ctx: &mut PlaybackContext) {
        self.core.tick(dt);
        self.update_blend_weights(ctx);
    }

    fn on_exit(&mut self, _next: &str, ctx: &mut PlaybackContext) {
        self.release_clips(ctx);
    }

    fn resume(&mut self, op: DeferredOp, active: bool, ctx: &mut PlaybackContext) {
        if op != DeferredOp::InitBlendTree {
            return;
        }
        self.awaiting_load = false;
        self.start_clips(ctx);
        if active {
            self.update_blend_weights(ctx);
        }
    }

    fn pause(&mut self, ctx: &mut PlaybackContext) {
        for clip in self.active_animations.values() {
            ctx.runtime.pause(*clip);
        }
    }
}
