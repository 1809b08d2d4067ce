use glam::Vec2;
use jade_core::input::Key;
use jade_render::{Camera, ClearColor};

use super::{Scene, SceneContext, SceneError, SceneId, SceneSetup};

/// Empty play scene. Restores the white background; Escape returns to the editor.
pub struct LevelScene {
    camera: Camera,
}

impl LevelScene {
    pub fn new() -> Self {
        Self {
            camera: Camera::new(Vec2::ZERO),
        }
    }
}

impl Default for LevelScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for LevelScene {
    fn init(&mut self, setup: &mut SceneSetup<'_>) -> Result<(), SceneError> {
        *setup.clear_color = ClearColor::WHITE;
        log::info!("Inside level scene");
        Ok(())
    }

    fn update(&mut self, _dt: f32, ctx: &mut SceneContext<'_, '_>) {
        if ctx.input.is_just_pressed(Key::Escape) {
            ctx.request_scene(SceneId::LevelEditor);
        }
    }

    fn release(&mut self) {}

    fn camera(&self) -> &Camera {
        &self.camera
    }
}
