use crate::{
    blend_tree_state::BlendTreeState,
    clip_state::ClipState,
    load_gate::{DeferredOp, PlaybackContext},
};

/// 所有状态共有的数据与退出时间计时
///
/// Data shared by every state, including the exit-time counter.
///
/// 计时器只供过渡条件读取，状态本身不会因此发起过渡。
///
/// The counter is only read by transition conditions; a state never leaves
/// on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct StateCore {
    pub name: String,
    pub has_exit_time: bool,
    pub exit_time_elapsed: f32,
}

impl StateCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            has_exit_time: false,
            exit_time_elapsed: 0.0,
        }
    }

    pub fn enter(&mut self) {
        if self.has_exit_time {
            self.exit_time_elapsed = 0.0;
        }
    }

    pub fn tick(&mut self, dt: f32) {
        if self.has_exit_time {
            self.exit_time_elapsed += dt;
        }
    }
}

/// 状态生命周期接口
///
/// Lifecycle shared by every state variant
pub trait AnimationState {
    fn core(&self) -> &StateCore;

    fn core_mut(&mut self) -> &mut StateCore;

    fn name(&self) -> &str {
        &self.core().name
    }

    /// `prev` is empty when the state machine enters its first state.
    fn on_enter(&mut self, prev: &str, ctx: &mut PlaybackContext);

    fn on_update(&mut self, dt: f32, ctx: &mut PlaybackContext);

    fn on_exit(&mut self, next: &str, ctx: &mut PlaybackContext);

    /// 资源就绪后执行之前推迟的操作
    ///
    /// Runs work deferred while the skeletal asset was loading. `active` tells
    /// whether the state is the current one at flush time.
    fn resume(&mut self, op: DeferredOp, active: bool, ctx: &mut PlaybackContext);

    /// Pauses every clip the state currently owns.
    fn pause(&mut self, ctx: &mut PlaybackContext);
}

/// 状态变体
///
/// The closed set of state behaviours
#[derive(Debug, Clone)]
pub enum AnimState {
    Clip(ClipState),
    BlendTree(BlendTreeState),
}

impl AnimState {
    pub fn as_clip(&self) -> Option<&ClipState> {
        match self {
            Self::Clip(state) => Some(state),
            Self::BlendTree(_) => None,
        }
    }

    pub fn as_blend_tree(&self) -> Option<&BlendTreeState> {
        match self {
            Self::BlendTree(state) => Some(state),
            Self::Clip(_) => None,
        }
    }

    pub fn as_blend_tree_mut(&mut self) -> Option<&mut BlendTreeState> {
        match self {
            Self::BlendTree(state) => Some(state),
            Self::Clip(_) => None,
        }
    }

    pub fn exit_time_elapsed(&self) -> f32 {
        self.core().exit_time_elapsed
    }
}

impl AnimationState for AnimState {
    fn core(&self) -> &StateCore {
        match self {
            Self::Clip(state) => state.core(),
            Self::BlendTree(state) => state.core(),
        }
    }

    fn core_mut(&mut self) -> &mut StateCore {
        match self {
            Self::Clip(state) => state.core_mut(),
            Self::BlendTree(state) => state.core_mut(),
        }
    }

    fn on_enter(&mut self, prev: &str, ctx: &mut PlaybackContext) {
        match self {
            Self::Clip(state) => state.on_enter(prev, ctx),
            Self::BlendTree(state) => state.on_enter(prev, ctx),
        }
    }

    fn on_update(&mut self, dt: f32, ctx: &mut PlaybackContext) {
        match self {
            Self::Clip(state) => state.on_update(dt, ctx),
            Self::BlendTree(state) => state.on_update(dt, ctx),
        }
    }

    fn on_exit(&mut self, next: &str, ctx: &mut PlaybackContext) {
        match self {
            Self::Clip(state) => state.on_exit(next, ctx),
            Self::BlendTree(state) => state.on_exit(next, ctx),
        }
    }

    fn resume(&mut self, op: DeferredOp, active: bool, ctx: &mut PlaybackContext) {
        match self {
            Self::Clip(state) => state.resume(op, active, ctx),
            Self::BlendTree(state) => state.resume(op, active, ctx),
        }
    }

    fn pause(&mut self, ctx: &mut PlaybackContext) {
        match self {
            Self::Clip(state) => state.pause(ctx),
            Self::BlendTree(state) => state.pause(ctx),
        }
    }
}

impl From<ClipState> for AnimState {
    fn from(state: ClipState) -> Self {
        Self::Clip(state)
    }
}

impl From<BlendTreeState> for AnimState {
    fn from(state: BlendTreeState) -> Self {
        Self::BlendTree(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_time_only_when_enabled() {
        let mut core = StateCore::new("Attack");
        core.tick(0.5);
        assert_eq!(core.exit_time_elapsed, 0.0);

        core.has_exit_time = true;
        core.tick(0.25);
        core.tick(0.25);
        assert_eq!(core.exit_time_elapsed, 0.5);
        core.enter();
        assert_eq!(core.exit_time_elapsed, 0.0);
    }
}
