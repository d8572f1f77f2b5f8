use bevy::prelude::*;

use crate::{
    load_gate::{DeferredOp, PlaybackContext},
    runtime::ClipId,
    state::{AnimationState, StateCore},
};

/// 单片段状态
///
/// Plays one named clip while active, the runtime owns the weight model
#[derive(Debug, Clone, PartialEq)]
pub struct ClipState {
    core: StateCore,
    pub clip_name: String,
    pub speed: f32,
    pub looping: bool,
    playing: Option<ClipId>,
    awaiting_load: bool,
}

impl ClipState {
    pub fn new(name: impl Into<String>, clip_name: impl Into<String>) -> Self {
        Self {
            core: StateCore::new(name),
            clip_name: clip_name.into(),
            speed: 1.0,
            looping: true,
            playing: None,
            awaiting_load: false,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_exit_time(mut self, has_exit_time: bool) -> Self {
        self.core.has_exit_time = has_exit_time;
        self
    }

    /// The clip this state started, if it is still playing.
    pub fn playing(&self) -> Option<ClipId> {
        self.playing
    }

    pub fn is_awaiting_load(&self) -> bool {
        self.awaiting_load
    }

    fn play(&mut self, ctx: &mut PlaybackContext) {
        if let Some(previous) = self.playing.take() {
            ctx.runtime.stop(previous);
        }
        let Some(clip) = ctx.runtime.find_clip(&self.clip_name) else {
            warn!(
                "State<{}>: clip '{}' not found, nothing will play",
                self.core.name, self.clip_name
            );
            return;
        };
        ctx.runtime.start(clip, self.looping, self.speed);
        self.playing = Some(clip);
    }
}

impl AnimationState for ClipState {
    fn core(&self) -> &StateCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StateCore {
        &mut self.core
    }

    fn on_enter(&mut self, _prev: &str, ctx: &mut PlaybackContext) {
        self.core.enter();
        if ctx.when_ready(&self.core.name, DeferredOp::StartClip) {
            self.play(ctx);
        } else {
            self.awaiting_load = true;
        }
    }

    fn on_update(&mut self, dt: f32, _ctx: &mut PlaybackContext) {
        self.core.tick(dt);
    }

    fn on_exit(&mut self, _next: &str, ctx: &mut PlaybackContext) {
        self.awaiting_load = false;
        if let Some(clip) = self.playing.take() {
            ctx.runtime.stop(clip);
        }
    }

    fn resume(&mut self, op: DeferredOp, active: bool, ctx: &mut PlaybackContext) {
        if op != DeferredOp::StartClip || !self.awaiting_load {
            return;
        }
        self.awaiting_load = false;
        if active {
            self.play(ctx);
        }
    }

    fn pause(&mut self, ctx: &mut PlaybackContext) {
        if let Some(clip) = self.playing {
            ctx.runtime.pause(clip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{load_gate::LoadGate, runtime::HeadlessRuntime};

    fn ready_gate() -> LoadGate {
        LoadGate::Ready
    }

    #[test]
    fn test_enter_starts_and_exit_stops() {
        let mut runtime = HeadlessRuntime::new().with_clip("idle_anim", 1.0);
        let mut gate = ready_gate();
        let mut ctx = PlaybackContext::new(&mut runtime, &mut gate);

        let mut state = ClipState::new("Idle", "idle_anim")
            .with_speed(1.5)
            .with_loop(false);
        state.on_enter("", &mut ctx);
        assert!(state.playing().is_some());
        state.on_exit("Run", &mut ctx);
        assert!(state.playing().is_none());

        let clip = runtime.clip("idle_anim").unwrap();
        assert!(!clip.playing);
        assert_eq!(clip.starts, 1);
        assert_eq!(clip.speed, 1.5);
        assert!(!clip.looping);
    }

    #[test]
    fn test_reenter_restarts_clip() {
        let mut runtime = HeadlessRuntime::new().with_clip("idle_anim", 1.0);
        let mut gate = ready_gate();
        let mut ctx = PlaybackContext::new(&mut runtime, &mut gate);

        let mut state = ClipState::new("Idle", "idle_anim");
        state.on_enter("", &mut ctx);
        state.on_enter("Idle", &mut ctx);
        assert_eq!(runtime.clip("idle_anim").unwrap().starts, 2);
        assert!(runtime.is_playing("idle_anim"));
    }

    #[test]
    fn test_missing_clip_plays_nothing() {
        let mut runtime = HeadlessRuntime::new();
        let mut gate = ready_gate();
        let mut ctx = PlaybackContext::new(&mut runtime, &mut gate);

        let mut state = ClipState::new("Idle", "missing");
        state.on_enter("", &mut ctx);
        assert!(state.playing().is_none());
        state.on_exit("", &mut ctx);
    }

    #[test]
    fn test_deferred_start_until_loaded() {
        let mut runtime = HeadlessRuntime::new().with_clip("idle_anim", 1.0).unloaded();
        let mut gate = LoadGate::default();

        let mut state = ClipState::new("Idle", "idle_anim");
        {
            let mut ctx = PlaybackContext::new(&mut runtime, &mut gate);
            state.on_enter("", &mut ctx);
        }
        assert!(state.is_awaiting_load());
        assert!(!runtime.is_playing("idle_anim"));
        assert_eq!(gate.pending().len(), 1);

        runtime.set_loaded(true);
        let flushed = gate.poll(true);
        let mut ctx = PlaybackContext::new(&mut runtime, &mut gate);
        for deferred in flushed {
            state.resume(deferred.op, true, &mut ctx);
        }
        assert!(!state.is_awaiting_load());
        assert!(runtime.is_playing("idle_anim"));
    }

    #[test]
    fn test_exit_before_load_drops_deferred_start() {
        let mut runtime = HeadlessRuntime::new().with_clip("idle_anim", 1.0).unloaded();
        let mut gate = LoadGate::default();
        let mut state = ClipState::new("Idle", "idle_anim");
        {
            let mut ctx = PlaybackContext::new(&mut runtime, &mut gate);
            state.on_enter("", &mut ctx);
            state.on_exit("Run", &mut ctx);
        }
        let flushed = gate.poll(true);
        let mut ctx = PlaybackContext::new(&mut runtime, &mut gate);
        for deferred in flushed {
            state.resume(deferred.op, false, &mut ctx);
        }
        assert!(!runtime.is_playing("idle_anim"));
    }
}
