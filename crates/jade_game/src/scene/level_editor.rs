use glam::Vec2;
use jade_core::input::Key;
use jade_render::{Camera, ClearColor, QuadVertex, ShaderProgram, Texture};
use wgpu::util::DeviceExt;

use super::{Scene, SceneContext, SceneError, SceneId, SceneSetup};

const SHADER_PATH: &str = "assets/shaders/default.wgsl";
const TEXTURE_PATH: &str = "assets/images/testImage.png";
const TEXTURE_UNIFORM: &str = "TEX_SAMPLER";
const TEXTURE_SLOT: u32 = 0;
/// World units per second, toward -x.
const CAMERA_PAN_SPEED: f32 = 50.0;
const FADE_SECONDS: f32 = 2.0;
/// Clear color drop per second while fading.
const FADE_RATE: f32 = 5.0;

const QUAD_VERTICES: [QuadVertex; 4] = [
    // top left
    QuadVertex {
        position: [0.0, 100.0, 0.0],
        color: [0.0, 1.0, 0.0, 1.0],
        tex_coords: [0.0, 0.0],
    },
    // top right
    QuadVertex {
        position: [100.0, 100.0, 0.0],
        color: [0.0, 0.0, 1.0, 1.0],
        tex_coords: [1.0, 0.0],
    },
    // bottom right
    QuadVertex {
        position: [100.0, 0.0, 0.0],
        color: [1.0, 0.0, 0.0, 1.0],
        tex_coords: [1.0, 1.0],
    },
    // bottom left
    QuadVertex {
        position: [0.0, 0.0, 0.0],
        color: [0.0, 1.0, 1.0, 1.0],
        tex_coords: [0.0, 1.0],
    },
];

// Counter-clockwise.
const QUAD_INDICES: [u32; 6] = [2, 1, 0, 2, 0, 3];

/// Timed fade to black that ends in a scene switch.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneFade {
    remaining: f32,
    rate: f32,
    active: bool,
}

impl SceneFade {
    pub fn new(seconds: f32, rate: f32) -> Self {
        Self {
            remaining: seconds,
            rate,
            active: false,
        }
    }

    pub fn start(&mut self) {
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Darkens `color` while time remains. Returns true once the fade has run
    /// out; keeps returning true on later calls.
    pub fn step(&mut self, dt: f32, color: &mut ClearColor) -> bool {
        if !self.active {
            return false;
        }
        if self.remaining > 0.0 {
            self.remaining -= dt;
            color.darken(dt * self.rate);
            return false;
        }
        true
    }
}

struct QuadResources {
    shader: ShaderProgram,
    texture: Texture,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

/// Draws one textured quad while the camera pans. Holding Space fades the
/// clear color to black and then switches to the level scene.
pub struct LevelEditorScene {
    camera: Camera,
    fade: SceneFade,
    resources: Option<QuadResources>,
}

impl LevelEditorScene {
    pub fn new() -> Self {
        Self {
            camera: Camera::new(Vec2::ZERO),
            fade: SceneFade::new(FADE_SECONDS, FADE_RATE),
            resources: None,
        }
    }
}

impl Default for LevelEditorScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for LevelEditorScene {
    fn init(&mut self, setup: &mut SceneSetup<'_>) -> Result<(), SceneError> {
        let gpu = setup.gpu;
        self.camera = Camera::new(Vec2::ZERO);

        let shader = ShaderProgram::load(gpu, SHADER_PATH, &[QuadVertex::layout()])?;
        let texture = Texture::from_path(gpu, TEXTURE_PATH)?;

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Level Editor Vertex Buffer"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Level Editor Index Buffer"),
                contents: bytemuck::cast_slice(&QUAD_INDICES),
                usage: wgpu::BufferUsages::INDEX,
            });

        self.resources = Some(QuadResources {
            shader,
            texture,
            vertex_buffer,
            index_buffer,
        });
        log::info!("Level editor scene ready");
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut SceneContext<'_, '_>) {
        if !self.fade.is_active() && ctx.input.is_held(Key::Space) {
            self.fade.start();
        }
        if self.fade.step(dt, ctx.clear_color) {
            ctx.request_scene(SceneId::Level);
        }

        self.camera.position.x -= dt * CAMERA_PAN_SPEED;

        let Some(res) = self.resources.as_mut() else {
            return;
        };

        res.shader.use_program(ctx.pass);
        res.shader
            .upload_mat4(ctx.queue, "u_projection", self.camera.projection_matrix());
        res.shader
            .upload_mat4(ctx.queue, "u_view", self.camera.view_matrix());
        res.shader.upload_float(ctx.queue, "u_time", ctx.time);
        res.shader.upload_texture(TEXTURE_UNIFORM, TEXTURE_SLOT);

        match res.shader.texture_group(TEXTURE_SLOT) {
            Some(group) => {
                res.texture.bind(ctx.pass, group);
                ctx.pass.set_vertex_buffer(0, res.vertex_buffer.slice(..));
                ctx.pass
                    .set_index_buffer(res.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                debug_assert!(res.shader.is_in_use() && res.texture.is_bound());
                ctx.pass
                    .draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
                res.texture.unbind();
            }
            None => log::trace!(
                "'{}' has no sampler '{}', quad skipped",
                res.shader.label(),
                TEXTURE_UNIFORM
            ),
        }

        res.shader.detach();
    }

    fn release(&mut self) {
        let Some(res) = self.resources.take() else {
            return;
        };
        res.shader.release();
        res.texture.release();
        res.vertex_buffer.destroy();
        res.index_buffer.destroy();
        log::info!("Level editor scene released");
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f32 = 0.25;

    #[test]
    fn idle_fade_leaves_color_alone() {
        let mut fade = SceneFade::new(FADE_SECONDS, FADE_RATE);
        let mut color = ClearColor::WHITE;
        assert!(!fade.step(FRAME, &mut color));
        assert_eq!(color, ClearColor::WHITE);
    }

    #[test]
    fn fade_darkens_then_finishes() {
        let mut fade = SceneFade::new(1.0, 0.5);
        let mut color = ClearColor::WHITE;
        fade.start();

        for _ in 0..4 {
            assert!(!fade.step(FRAME, &mut color));
        }
        assert!((color.r - 0.5).abs() < 1e-6);
        assert_eq!(color.a, 1.0);

        assert!(fade.step(FRAME, &mut color));
        assert!(fade.step(FRAME, &mut color));
        assert!((color.r - 0.5).abs() < 1e-6);
    }

    #[test]
    fn editor_fade_reaches_black_well_before_switching() {
        let mut fade = SceneFade::new(FADE_SECONDS, FADE_RATE);
        let mut color = ClearColor::WHITE;
        fade.start();
        let mut frames = 0;
        while !fade.step(FRAME, &mut color) {
            frames += 1;
        }
        assert_eq!(frames, 8);
        assert_eq!(color, ClearColor::BLACK);
    }

    #[test]
    fn quad_corners_are_green_blue_red_cyan() {
        let colors = QUAD_VERTICES.map(|v| v.color);
        assert_eq!(
            colors,
            [
                [0.0, 1.0, 0.0, 1.0],
                [0.0, 0.0, 1.0, 1.0],
                [1.0, 0.0, 0.0, 1.0],
                [0.0, 1.0, 1.0, 1.0],
            ]
        );
    }

    #[test]
    fn quad_winds_counter_clockwise() {
        for tri in QUAD_INDICES.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| QUAD_VERTICES[tri[i] as usize].position);
            let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
            assert!(cross > 0.0, "triangle {:?} is clockwise", tri);
        }
    }
}
