//! Per-window engine state and the frame loop.
//!
//! Each redraw:
//!
//!   1. acquire the surface texture (skip the frame without one)
//!   2. tick the frame timer (the first frame has no delta) and clear to the
//!      current clear color
//!   3. let the active scene update and record its draws (skipped without a delta)
//!   4. submit, present, then close the input frame
//!   5. switch scenes if the update asked for it

use std::sync::Arc;

use jade_core::input::InputState;
use jade_core::time::FrameTimer;
use jade_render::{ClearColor, GpuContext, GpuError};
use thiserror::Error;
use winit::window::Window;

use crate::config::EngineConfig;
use crate::scene::{Scene, SceneContext, SceneError, SceneId, SceneSetup};

/// Logs the smoothed frame rate every this many frames.
const FPS_LOG_INTERVAL: u64 = 600;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

pub struct Engine {
    pub window: Arc<Window>,
    pub gpu: GpuContext,
    pub timer: FrameTimer,
    pub input: InputState,
    pub clear_color: ClearColor,
    scene: Option<Box<dyn Scene>>,
}

impl Engine {
    /// Brings up the GPU and enters the level editor scene.
    pub fn new(window: Arc<Window>, config: &EngineConfig) -> Result<Self, EngineError> {
        let gpu = GpuContext::new(window.clone(), config.window.vsync)?;
        let mut engine = Self {
            window,
            gpu,
            timer: FrameTimer::new(),
            input: InputState::new(),
            clear_color: config.clear_color(),
            scene: None,
        };
        engine.change_scene(SceneId::LevelEditor.index())?;
        Ok(engine)
    }

    /// Switches to the scene with the given index. The current scene is
    /// released first; an unknown index leaves it untouched.
    pub fn change_scene(&mut self, index: i32) -> Result<(), SceneError> {
        let id = SceneId::try_from(index)?;
        self.enter_scene(id)
    }

    fn enter_scene(&mut self, id: SceneId) -> Result<(), SceneError> {
        if let Some(mut old) = self.scene.take() {
            old.release();
        }
        let mut scene = id.create();
        scene.init(&mut SceneSetup {
            gpu: &self.gpu,
            clear_color: &mut self.clear_color,
        })?;
        log::info!("Entered {} scene", id.name());
        self.scene = Some(scene);
        Ok(())
    }

    pub fn redraw(&mut self) -> Result<(), SceneError> {
        let Some((output, view)) = self.gpu.begin_frame() else {
            return Ok(());
        };
        // A frame without a surface texture does not tick, so its time
        // carries into the next delta.
        let dt = self.timer.tick();

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let mut requested = None;
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color.into()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let (Some(dt), Some(scene)) = (dt, self.scene.as_mut()) {
                let mut ctx = SceneContext::new(
                    &self.gpu.queue,
                    &mut pass,
                    &self.input,
                    &mut self.clear_color,
                    self.timer.total_time,
                );
                scene.update(dt, &mut ctx);
                requested = ctx.requested_scene();
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.input.end_frame();

        if self.timer.frame_count % FPS_LOG_INTERVAL == 0 {
            if let Some(scene) = &self.scene {
                log::debug!(
                    "{:.1} fps ({:.2} ms), camera at {}",
                    self.timer.smoothed_fps,
                    self.timer.smoothed_frame_time_ms,
                    scene.camera().position
                );
            }
        }

        if let Some(id) = requested {
            self.enter_scene(id)?;
        }
        Ok(())
    }

    /// Releases the active scene's resources ahead of shutdown.
    pub fn shutdown(&mut self) {
        if let Some(mut scene) = self.scene.take() {
            scene.release();
        }
    }
}
