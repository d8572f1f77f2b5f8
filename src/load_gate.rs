use std::mem;

use bevy::prelude::*;

use crate::runtime::AnimationRuntime;

/// 资源加载完成前被推迟的操作
///
/// Work postponed until the backing skeletal asset is ready
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum DeferredOp {
    /// Start the clip of a clip state.
    StartClip,
    /// Start every node clip of a blend-tree state at weight 0.
    InitBlendTree,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferred {
    pub state: String,
    pub op: DeferredOp,
}

/// 骨骼资源的加载闸门
///
/// Pending/ready lifecycle of the backing skeletal asset.
///
/// 待定期间排队的操作在资源就绪时按顺序执行一次。
///
/// Work queued while pending is handed back exactly once, in queue order, the
/// first time the runtime reports the asset as loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadGate {
    Pending(Vec<Deferred>),
    Ready,
}

impl Default for LoadGate {
    fn default() -> Self {
        Self::Pending(Vec::new())
    }
}

impl LoadGate {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// 排队一个操作，重复的操作会被忽略
    ///
    /// Queues an operation, identical pending entries are kept once.
    /// Returns `false` when the gate is already ready and nothing was queued.
    pub fn defer(&mut self, state: &str, op: DeferredOp) -> bool {
        match self {
            Self::Ready => false,
            Self::Pending(queue) => {
                if !queue.iter().any(|d| d.state == state && d.op == op) {
                    queue.push(Deferred {
                        state: state.to_string(),
                        op,
                    });
                }
                true
            }
        }
    }

    /// Flips to ready when `loaded` is set and returns the queued work.
    pub fn poll(&mut self, loaded: bool) -> Vec<Deferred> {
        if !loaded {
            return Vec::new();
        }
        match mem::replace(self, Self::Ready) {
            Self::Pending(queue) => {
                if !queue.is_empty() {
                    debug!("Skeletal asset ready, flushing {} deferred op(s)", queue.len());
                }
                queue
            }
            Self::Ready => Vec::new(),
        }
    }

    pub fn pending(&self) -> &[Deferred] {
        match self {
            Self::Pending(queue) => queue,
            Self::Ready => &[],
        }
    }
}

/// 状态钩子的播放上下文
///
/// Everything a state hook needs to issue playback commands
pub struct PlaybackContext<'a> {
    pub runtime: &'a mut dyn AnimationRuntime,
    pub gate: &'a mut LoadGate,
}

impl<'a> PlaybackContext<'a> {
    pub fn new(runtime: &'a mut dyn AnimationRuntime, gate: &'a mut LoadGate) -> Self {
        Self { runtime, gate }
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    /// Runs `op` now if the asset is ready, otherwise queues it for `state`.
    pub fn when_ready(&mut self, state: &str, op: DeferredOp) -> bool {
        if self.gate.is_ready() {
            return true;
        }
        trace!("State<{}> waiting for skeletal asset: {:?}", state, op);
        self.gate.defer(state, op);
        false
    }
}
