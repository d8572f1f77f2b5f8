use bevy::{platform::collections::HashMap, prelude::*};

/// 动画运行时中的片段句柄
///
/// Opaque handle of a clip inside an [`AnimationRuntime`]
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClipId(pub usize);

/// 动画运行时
///
/// The animation runtime that owns clip playback.
///
/// 状态机只通过该接口播放、停止和加权片段，自身不做采样。
///
/// States only start, stop and weigh clips through this seam; sampling and
/// skinning stay on the runtime side.
pub trait AnimationRuntime {
    /// Whether the backing skeletal asset has finished loading.
    fn is_loaded(&self) -> bool {
        true
    }

    fn find_clip(&self, name: &str) -> Option<ClipId>;

    fn start(&mut self, clip: ClipId, looping: bool, speed: f32);

    fn stop(&mut self, clip: ClipId);

    fn pause(&mut self, clip: ClipId);

    /// Sets the blend weight on every active instance of `clip`.
    fn set_weight(&mut self, clip: ClipId, weight: f32);

    /// Advances playback time, called once per frame after the animator update.
    fn advance(&mut self, _dt: f32) {}
}

/// 无渲染的内存动画运行时
///
/// In-memory runtime, used for simulation without a renderer and in tests.
#[derive(Component, Debug, Clone)]
pub struct HeadlessRuntime {
    clips: Vec<HeadlessClip>,
    by_name: HashMap<String, ClipId>,
    loaded: bool,
}

/// Playback state of one clip in a [`HeadlessRuntime`].
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessClip {
    pub name: String,
    pub duration: f32,
    pub playing: bool,
    pub paused: bool,
    pub looping: bool,
    pub speed: f32,
    pub weight: f32,
    pub time: f32,
    /// Number of times the clip was (re)started.
    pub starts: u32,
}

impl HeadlessClip {
    fn new(name: String, duration: f32) -> Self {
        Self {
            name,
            duration,
            playing: false,
            paused: false,
            looping: false,
            speed: 1.0,
            weight: 1.0,
            time: 0.0,
            starts: 0,
        }
    }
}

impl Default for HeadlessRuntime {
    fn default() -> Self {
        Self {
            clips: Vec::new(),
            by_name: HashMap::new(),
            loaded: true,
        }
    }
}

impl HeadlessRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clip(mut self, name: impl Into<String>, duration: f32) -> Self {
        self.add_clip(name, duration);
        self
    }

    /// 注册一个片段，同名片段会被替换
    ///
    /// Registers a clip. A clip with the same name is replaced in place.
    pub fn add_clip(&mut self, name: impl Into<String>, duration: f32) -> ClipId {
        let name = name.into();
        if let Some(id) = self.by_name.get(&name).copied() {
            self.clips[id.0] = HeadlessClip::new(name, duration);
            return id;
        }
        let id = ClipId(self.clips.len());
        self.by_name.insert(name.clone(), id);
        self.clips.push(HeadlessClip::new(name, duration));
        id
    }

    /// Starts the runtime in the pending state, as if its asset were still loading.
    pub fn unloaded(mut self) -> Self {
        self.loaded = false;
        self
    }

    pub fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    pub fn clip(&self, name: &str) -> Option<&HeadlessClip> {
        self.by_name.get(name).map(|id| &self.clips[id.0])
    }

    pub fn is_playing(&self, name: &str) -> bool {
        self.clip(name).is_some_and(|clip| clip.playing)
    }

    /// Weight of a playing clip, `None` when it is stopped or unknown.
    pub fn weight(&self, name: &str) -> Option<f32> {
        self.clip(name)
            .filter(|clip| clip.playing)
            .map(|clip| clip.weight)
    }

    pub fn playing(&self) -> impl Iterator<Item = &HeadlessClip> {
        self.clips.iter().filter(|clip| clip.playing)
    }

    fn clip_mut(&mut self, clip: ClipId) -> Option<&mut HeadlessClip> {
        let found = self.clips.get_mut(clip.0);
        if found.is_none() {
            warn!("HeadlessRuntime: unknown clip handle {:?}", clip);
        }
        found
    }
}

impl AnimationRuntime for HeadlessRuntime {
    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn find_clip(&self, name: &str) -> Option<ClipId> {
        self.by_name.get(name).copied()
    }

    fn start(&mut self, clip: ClipId, looping: bool, speed: f32) {
        let Some(clip) = self.clip_mut(clip) else {
            return;
        };
        clip.playing = true;
        clip.paused = false;
        clip.looping = looping;
        clip.speed = speed;
        clip.time = 0.0;
        clip.starts += 1;
    }

    fn stop(&mut self, clip: ClipId) {
        let Some(clip) = self.clip_mut(clip) else {
            return;
        };
        clip.playing = false;
        clip.paused = false;
        clip.time = 0.0;
    }

    fn pause(&mut self, clip: ClipId) {
        if let Some(clip) = self.clip_mut(clip) {
            clip.paused = true;
        }
    }

    fn set_weight(&mut self, clip: ClipId, weight: f32) {
        if let Some(clip) = self.clip_mut(clip) {
            clip.weight = weight;
        }
    }

    fn advance(&mut self, dt: f32) {
        for clip in self.clips.iter_mut().filter(|c| c.playing && !c.paused) {
            clip.time += dt * clip.speed;
            if clip.duration <= 0.0 {
                continue;
            }
            if clip.looping {
                clip.time = clip.time.rem_euclid(clip.duration);
            } else if clip.time >= clip.duration || clip.time < 0.0 {
                clip.time = clip.time.clamp(0.0, clip.duration);
                clip.playing = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_clip_replaces_same_name() {
        let mut runtime = HeadlessRuntime::new();
        let a = runtime.add_clip("Idle", 1.0);
        let b = runtime.add_clip("Idle", 2.0);
        assert_eq!(a, b);
        assert_eq!(runtime.clip("Idle").map(|c| c.duration), Some(2.0));
        assert_eq!(runtime.find_clip("Walk"), None);
    }

    #[test]
    fn test_advance_loops_and_finishes() {
        let mut runtime = HeadlessRuntime::new()
            .with_clip("Loop", 1.0)
            .with_clip("Once", 1.0);
        let looped = runtime.find_clip("Loop").unwrap();
        let once = runtime.find_clip("Once").unwrap();
        runtime.start(looped, true, 1.0);
        runtime.start(once, false, 2.0);

        runtime.advance(0.75);
        assert!((runtime.clip("Loop").unwrap().time - 0.75).abs() < 1e-5);
        assert!(!runtime.is_playing("Once"));
        assert_eq!(runtime.clip("Once").unwrap().time, 1.0);

        runtime.advance(0.5);
        assert!((runtime.clip("Loop").unwrap().time - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut runtime = HeadlessRuntime::new().with_clip("Idle", 2.0);
        let idle = runtime.find_clip("Idle").unwrap();
        runtime.start(idle, true, 1.0);
        runtime.advance(0.5);
        runtime.pause(idle);
        runtime.advance(0.5);
        let clip = runtime.clip("Idle").unwrap();
        assert!(clip.playing && clip.paused);
        assert!((clip.time - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_weight_only_for_playing_clips() {
        let mut runtime = HeadlessRuntime::new().with_clip("Idle", 1.0);
        let idle = runtime.find_clip("Idle").unwrap();
        assert_eq!(runtime.weight("Idle"), None);
        runtime.start(idle, true, 1.0);
        runtime.set_weight(idle, 0.3);
        assert_eq!(runtime.weight("Idle"), Some(0.3));
        runtime.stop(idle);
        assert_eq!(runtime.weight("Idle"), None);
    }
}
