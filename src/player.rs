use bevy::{
    animation::{
        AnimationPlayer, RepeatAnimation,
        graph::{AnimationGraph, AnimationGraphHandle, AnimationNodeIndex},
    },
    ecs::schedule::ScheduleLabel,
    platform::collections::HashMap,
    prelude::*,
};

use crate::{
    animator::Animator,
    runtime::{AnimationRuntime, ClipId},
};

/// 片段名到动画图节点的映射
///
/// Maps clip names to nodes of the entity's animation graph.
///
/// `loaded` 为 `false` 时，所有播放操作都会被推迟。
///
/// While `loaded` is `false` every playback command is deferred by the animator.
/// Entities carrying an [`AnimationGraphHandle`] are flagged automatically
/// once the graph asset exists.
#[derive(Component, Debug, Clone, Default)]
pub struct AnimationClipIndex {
    nodes: Vec<AnimationNodeIndex>,
    by_name: HashMap<String, ClipId>,
    loaded: bool,
}

impl AnimationClipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clip(mut self, name: impl Into<String>, node: AnimationNodeIndex) -> Self {
        self.insert(name, node);
        self
    }

    /// 同名片段会被替换
    ///
    /// Registers a clip, a clip with the same name is pointed at the new node.
    pub fn insert(&mut self, name: impl Into<String>, node: AnimationNodeIndex) -> ClipId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            self.nodes[id.0] = node;
            return id;
        }
        let id = ClipId(self.nodes.len());
        self.nodes.push(node);
        self.by_name.insert(name, id);
        id
    }

    pub fn node(&self, clip: ClipId) -> Option<AnimationNodeIndex> {
        self.nodes.get(clip.0).copied()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }
}

/// 基于 [`AnimationPlayer`] 的运行时
///
/// [`AnimationRuntime`] over a Bevy [`AnimationPlayer`]. Time advances in
/// Bevy's own animation systems.
pub struct PlayerRuntime<'a> {
    player: &'a mut AnimationPlayer,
    index: &'a AnimationClipIndex,
}

impl<'a> PlayerRuntime<'a> {
    pub fn new(player: &'a mut AnimationPlayer, index: &'a AnimationClipIndex) -> Self {
        Self { player, index }
    }

    fn node(&self, clip: ClipId) -> Option<AnimationNodeIndex> {
        let node = self.index.node(clip);
        if node.is_none() {
            warn!("PlayerRuntime: unknown clip handle {:?}", clip);
        }
        node
    }
}

impl AnimationRuntime for PlayerRuntime<'_> {
    fn is_loaded(&self) -> bool {
        self.index.loaded
    }

    fn find_clip(&self, name: &str) -> Option<ClipId> {
        self.index.by_name.get(name).copied()
    }

    fn start(&mut self, clip: ClipId, looping: bool, speed: f32) {
        let Some(node) = self.node(clip) else {
            return;
        };
        let repeat = if looping {
            RepeatAnimation::Forever
        } else {
            RepeatAnimation::Never
        };
        self.player.start(node).set_repeat(repeat).set_speed(speed);
    }

    fn stop(&mut self, clip: ClipId) {
        if let Some(node) = self.node(clip) {
            self.player.stop(node);
        }
    }

    fn pause(&mut self, clip: ClipId) {
        if let Some(node) = self.node(clip)
            && let Some(active) = self.player.animation_mut(node)
        {
            active.pause();
        }
    }

    fn set_weight(&mut self, clip: ClipId, weight: f32) {
        if let Some(node) = self.node(clip)
            && let Some(active) = self.player.animation_mut(node)
        {
            active.set_weight(weight);
        }
    }
}

/// 以 [`AnimationPlayer`] 驱动 [`Animator`] 的插件
///
/// Drives every `(Animator, AnimationPlayer, AnimationClipIndex)` entity.
#[derive(Debug, Clone)]
pub struct AnimationPlayerBridgePlugin<S: ScheduleLabel + Clone = Update> {
    schedule: S,
}

impl Default for AnimationPlayerBridgePlugin {
    fn default() -> Self {
        Self { schedule: Update }
    }
}

impl<S: ScheduleLabel + Clone> AnimationPlayerBridgePlugin<S> {
    pub fn new(schedule: S) -> Self {
        Self { schedule }
    }
}

impl<S: ScheduleLabel + Clone> Plugin for AnimationPlayerBridgePlugin<S> {
    fn build(&self, app: &mut App) {
        app.add_systems(
            self.schedule.clone(),
            (mark_loaded_graphs, drive_player_animators).chain(),
        );
    }
}

fn mark_loaded_graphs(
    graphs: Res<Assets<AnimationGraph>>,
    mut query: Query<(&mut AnimationClipIndex, &AnimationGraphHandle)>,
) {
    for (mut index, handle) in query.iter_mut() {
        if !index.loaded && graphs.contains(handle.id()) {
            debug!("Animation graph {:?} ready", handle.id());
            index.loaded = true;
        }
    }
}

fn drive_player_animators(
    time: Res<Time>,
    mut query: Query<(&mut Animator, &mut AnimationPlayer, &AnimationClipIndex)>,
) {
    let dt = time.delta_secs();
    for (mut animator, mut player, index) in query.iter_mut() {
        let mut runtime = PlayerRuntime::new(&mut player, index);
        animator.update(dt, &mut runtime);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_index_replaces_by_name() {
        let mut index = AnimationClipIndex::new()
            .with_clip("idle", AnimationNodeIndex::new(1))
            .with_clip("run", AnimationNodeIndex::new(2));
        let idle = index.insert("idle", AnimationNodeIndex::new(3));
        assert_eq!(idle, ClipId(0));
        assert_eq!(index.node(idle), Some(AnimationNodeIndex::new(3)));
        assert_eq!(index.node(ClipId(9)), None);
        assert!(!index.is_loaded());
    }

    #[test]
    fn test_player_runtime_plays_nodes() {
        let index = AnimationClipIndex::new().with_clip("idle", AnimationNodeIndex::new(1));
        let mut player = AnimationPlayer::default();
        let mut runtime = PlayerRuntime::new(&mut player, &index);
        let idle = runtime.find_clip("idle").unwrap();
        runtime.start(idle, true, 1.0);
        runtime.set_weight(idle, 0.25);
        assert!(runtime.find_clip("run").is_none());

        let node = AnimationNodeIndex::new(1);
        assert!(player.is_playing_animation(node));
        assert_eq!(player.animation(node).map(|a| a.weight()), Some(0.25));
        let mut runtime = PlayerRuntime::new(&mut player, &index);
        runtime.stop(idle);
        assert!(!player.is_playing_animation(node));
    }
}
