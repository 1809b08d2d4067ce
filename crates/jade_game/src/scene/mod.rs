//! Scenes own per-frame behavior and the GPU resources it draws with.
//!
//! Exactly one scene is active. Switching releases the outgoing scene before
//! the incoming one is initialised, so two scenes never hold resources at once.

mod level;
mod level_editor;

use jade_core::input::InputState;
use jade_render::{Camera, ClearColor, GpuContext, ShaderError, TextureError};
use thiserror::Error;

pub use level::LevelScene;
pub use level_editor::LevelEditorScene;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unknown scene '{0}'")]
    UnknownScene(i32),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Texture(#[from] TextureError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneId {
    LevelEditor,
    Level,
}

impl SceneId {
    pub fn index(self) -> i32 {
        match self {
            Self::LevelEditor => 0,
            Self::Level => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::LevelEditor => "level editor",
            Self::Level => "level",
        }
    }

    /// Builds the scene in its uninitialised state.
    pub fn create(self) -> Box<dyn Scene> {
        match self {
            Self::LevelEditor => Box::new(LevelEditorScene::new()),
            Self::Level => Box::new(LevelScene::new()),
        }
    }
}

impl TryFrom<i32> for SceneId {
    type Error = SceneError;

    fn try_from(index: i32) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Self::LevelEditor),
            1 => Ok(Self::Level),
            other => Err(SceneError::UnknownScene(other)),
        }
    }
}

/// What a scene may touch while initialising.
pub struct SceneSetup<'a> {
    pub gpu: &'a GpuContext,
    pub clear_color: &'a mut ClearColor,
}

/// What a scene may touch during one frame's update.
pub struct SceneContext<'a, 'pass> {
    pub queue: &'a wgpu::Queue,
    pub pass: &'a mut wgpu::RenderPass<'pass>,
    pub input: &'a InputState,
    pub clear_color: &'a mut ClearColor,
    /// Seconds since the engine started.
    pub time: f32,
    requested: Option<SceneId>,
}

impl<'a, 'pass> SceneContext<'a, 'pass> {
    pub fn new(
        queue: &'a wgpu::Queue,
        pass: &'a mut wgpu::RenderPass<'pass>,
        input: &'a InputState,
        clear_color: &'a mut ClearColor,
        time: f32,
    ) -> Self {
        Self {
            queue,
            pass,
            input,
            clear_color,
            time,
            requested: None,
        }
    }

    /// Asks the engine to switch scenes once the current frame is submitted.
    pub fn request_scene(&mut self, id: SceneId) {
        self.requested = Some(id);
    }

    pub fn requested_scene(&self) -> Option<SceneId> {
        self.requested
    }
}

pub trait Scene {
    /// One-time setup, run after construction and before the first update.
    fn init(&mut self, setup: &mut SceneSetup<'_>) -> Result<(), SceneError>;

    /// Advances the scene by `dt` seconds and records its draws into the pass.
    fn update(&mut self, dt: f32, ctx: &mut SceneContext<'_, '_>);

    /// Frees GPU resources. Called once, before the scene is replaced.
    fn release(&mut self);

    fn camera(&self) -> &Camera;
}
