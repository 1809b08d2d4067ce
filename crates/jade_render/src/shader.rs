//! Linked shader programs.
//!
//! `ShaderSources` is the unlinked state; `ShaderSources::compile` consumes it
//! and yields a `ShaderProgram`, so a program can never be relinked. Compile
//! and link failures carry the diagnostic text and are meant to be fatal for
//! the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use thiserror::Error;

use crate::gpu_context::GpuContext;
use crate::shader_source::{ShaderSources, ShaderStage};
use crate::texture::Texture;
use crate::uniform::{
    compile_stage, CompiledStage, ProgramLayout, UniformKind, UNIFORM_BINDING, UNIFORM_GROUP,
};

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("couldn't open shader file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected shader section tag '{0}'")]
    UnknownTag(String),
    #[error("'#type' marker without a tag on line {line}")]
    MissingTag { line: usize },
    #[error("shader source has no '#type {0}' section")]
    MissingSection(ShaderStage),
    #[error("shader source has more than one '#type {0}' section")]
    DuplicateSection(ShaderStage),
    #[error("'{label}': {stage} shader compilation failed\n{log}")]
    Compile {
        label: String,
        stage: ShaderStage,
        log: String,
    },
    #[error("'{label}': shader program linking failed\n{log}")]
    Link { label: String, log: String },
}

impl ShaderSources {
    /// Compiles both stages and links them into a render pipeline drawing
    /// into the surface format with the given vertex buffer layouts.
    pub fn compile(
        self,
        gpu: &GpuContext,
        vertex_layouts: &[wgpu::VertexBufferLayout<'_>],
    ) -> Result<ShaderProgram, ShaderError> {
        let vertex = self.check_stage(ShaderStage::Vertex)?;
        let fragment = self.check_stage(ShaderStage::Fragment)?;
        let layout =
            ProgramLayout::link(&vertex, &fragment).map_err(|log| self.link_error(log))?;

        let vertex_module = self.create_module(gpu, ShaderStage::Vertex)?;
        let fragment_module = self.create_module(gpu, ShaderStage::Fragment)?;

        let label = self.label.as_str();
        // All device calls share one error scope; anything it captures is a
        // link failure.
        let ((pipeline, uniform_buffer, bind_groups), error) = gpu.validation_scope(|device| {
            let texture_layout = Texture::bind_group_layout(device);
            let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Uniform Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: UNIFORM_BINDING,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
            let empty_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Empty Bind Group Layout"),
                entries: &[],
            });

            let uniform_buffer = layout.uniforms.as_ref().map(|block| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size: u64::from(block.size),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            });

            // Groups the program binds itself: the uniform block plus empty
            // fillers for holes. Texture groups are bound by their textures.
            let mut group_layouts: Vec<&wgpu::BindGroupLayout> = Vec::new();
            let mut bind_groups = Vec::new();
            for group in 0..layout.group_count() {
                if layout.has_texture_at(group) {
                    group_layouts.push(&texture_layout);
                    continue;
                }
                let bind_group = match (&uniform_buffer, group == UNIFORM_GROUP) {
                    (Some(buffer), true) => {
                        group_layouts.push(&uniform_layout);
                        device.create_bind_group(&wgpu::BindGroupDescriptor {
                            label: Some(label),
                            layout: &uniform_layout,
                            entries: &[wgpu::BindGroupEntry {
                                binding: UNIFORM_BINDING,
                                resource: buffer.as_entire_binding(),
                            }],
                        })
                    }
                    _ => {
                        group_layouts.push(&empty_layout);
                        device.create_bind_group(&wgpu::BindGroupDescriptor {
                            label: Some(label),
                            layout: &empty_layout,
                            entries: &[],
                        })
                    }
                };
                bind_groups.push((group, bind_group));
            }

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &group_layouts,
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some(layout.vertex_entry.as_str()),
                    buffers: vertex_layouts,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some(layout.fragment_entry.as_str()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: gpu.surface_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
            (pipeline, uniform_buffer, bind_groups)
        });
        if let Some(err) = error {
            return Err(self.link_error(err.to_string()));
        }

        log::info!(
            "Shader program linked: '{}' ({} uniforms, {} textures)",
            self.label,
            layout.uniforms.as_ref().map_or(0, |b| b.members.len()),
            layout.textures.len()
        );

        Ok(ShaderProgram {
            label: self.label,
            layout,
            pipeline,
            uniform_buffer,
            bind_groups,
            texture_slots: HashMap::new(),
            in_use: false,
        })
    }

    fn check_stage(&self, stage: ShaderStage) -> Result<CompiledStage, ShaderError> {
        compile_stage(stage, self.stage(stage)).map_err(|log| self.compile_error(stage, log))
    }

    fn create_module(
        &self,
        gpu: &GpuContext,
        stage: ShaderStage,
    ) -> Result<wgpu::ShaderModule, ShaderError> {
        let (module, error) = gpu.validation_scope(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&self.label),
                source: wgpu::ShaderSource::Wgsl(self.stage(stage).into()),
            })
        });
        match error {
            Some(err) => Err(self.compile_error(stage, err.to_string())),
            None => Ok(module),
        }
    }

    fn compile_error(&self, stage: ShaderStage, log: String) -> ShaderError {
        log::error!("'{}': {} shader compilation failed", self.label, stage);
        log::error!("{log}");
        ShaderError::Compile {
            label: self.label.clone(),
            stage,
            log,
        }
    }

    fn link_error(&self, log: String) -> ShaderError {
        log::error!("'{}': shader program linking failed", self.label);
        log::error!("{log}");
        ShaderError::Link {
            label: self.label.clone(),
            log,
        }
    }
}

pub struct ShaderProgram {
    label: String,
    layout: ProgramLayout,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: Option<wgpu::Buffer>,
    bind_groups: Vec<(u32, wgpu::BindGroup)>,
    /// Texture slot -> bind group index, set by `upload_texture`.
    texture_slots: HashMap<u32, u32>,
    in_use: bool,
}

impl ShaderProgram {
    pub fn load(
        gpu: &GpuContext,
        path: impl AsRef<Path>,
        vertex_layouts: &[wgpu::VertexBufferLayout<'_>],
    ) -> Result<Self, ShaderError> {
        ShaderSources::from_file(path)?.compile(gpu, vertex_layouts)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Activates the program on `pass`. No-op while already in use.
    pub fn use_program(&mut self, pass: &mut wgpu::RenderPass<'_>) {
        if self.in_use {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        for (group, bind_group) in &self.bind_groups {
            pass.set_bind_group(*group, bind_group, &[]);
        }
        self.in_use = true;
    }

    pub fn detach(&mut self) {
        self.in_use = false;
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    pub fn upload_mat4(&self, queue: &wgpu::Queue, name: &str, value: Mat4) {
        self.write_uniform(
            queue,
            name,
            UniformKind::Mat4,
            bytemuck::cast_slice(&value.to_cols_array()),
        );
    }

    pub fn upload_mat3(&self, queue: &wgpu::Queue, name: &str, value: Mat3) {
        // Columns of a uniform mat3x3 are padded to 16 bytes.
        let [c0, c1, c2] = value.to_cols_array_2d();
        let padded = [
            c0[0], c0[1], c0[2], 0.0, c1[0], c1[1], c1[2], 0.0, c2[0], c2[1], c2[2], 0.0,
        ];
        self.write_uniform(queue, name, UniformKind::Mat3, bytemuck::cast_slice(&padded));
    }

    pub fn upload_vec4(&self, queue: &wgpu::Queue, name: &str, value: Vec4) {
        self.write_uniform(
            queue,
            name,
            UniformKind::Vec4,
            bytemuck::cast_slice(&value.to_array()),
        );
    }

    pub fn upload_vec3(&self, queue: &wgpu::Queue, name: &str, value: Vec3) {
        self.write_uniform(
            queue,
            name,
            UniformKind::Vec3,
            bytemuck::cast_slice(&value.to_array()),
        );
    }

    pub fn upload_vec2(&self, queue: &wgpu::Queue, name: &str, value: Vec2) {
        self.write_uniform(
            queue,
            name,
            UniformKind::Vec2,
            bytemuck::cast_slice(&value.to_array()),
        );
    }

    pub fn upload_float(&self, queue: &wgpu::Queue, name: &str, value: f32) {
        self.write_uniform(queue, name, UniformKind::Float, bytemuck::bytes_of(&value));
    }

    pub fn upload_int(&self, queue: &wgpu::Queue, name: &str, value: i32) {
        self.write_uniform(queue, name, UniformKind::Int, bytemuck::bytes_of(&value));
    }

    /// Routes texture slot `slot` to the bind group of the texture variable
    /// `name`. Unknown names are ignored.
    pub fn upload_texture(&mut self, name: &str, slot: u32) {
        match self.layout.texture_group(name) {
            Some(group) => {
                self.texture_slots.insert(slot, group);
            }
            None => log::trace!("Texture '{}' not found in '{}'", name, self.label),
        }
    }

    /// Bind group a texture in `slot` should be bound to.
    pub fn texture_group(&self, slot: u32) -> Option<u32> {
        self.texture_slots.get(&slot).copied()
    }

    fn write_uniform(&self, queue: &wgpu::Queue, name: &str, kind: UniformKind, bytes: &[u8]) {
        let location = self
            .layout
            .uniforms
            .as_ref()
            .and_then(|block| block.location(name, kind));
        let (Some(buffer), Some(offset)) = (&self.uniform_buffer, location) else {
            log::trace!("Uniform '{}' not found in '{}'", name, self.label);
            return;
        };
        queue.write_buffer(buffer, offset, bytes);
    }

    /// Frees the uniform buffer now instead of waiting for drop.
    pub fn release(&self) {
        if let Some(buffer) = &self.uniform_buffer {
            buffer.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_SHADER: &str = include_str!("../../../assets/shaders/default.wgsl");

    #[test]
    fn default_asset_splits_into_both_stages() {
        let sources = ShaderSources::parse("default.wgsl", DEFAULT_SHADER).expect("asset parses");
        assert!(sources.vertex.contains("@vertex"));
        assert!(sources.fragment.contains("@fragment"));
        assert!(!sources.vertex.contains("#type"));
    }

    #[test]
    fn default_asset_compiles_and_links() {
        let sources = ShaderSources::parse("default.wgsl", DEFAULT_SHADER).expect("asset parses");
        let vertex = sources
            .check_stage(ShaderStage::Vertex)
            .expect("vertex stage compiles");
        let fragment = sources
            .check_stage(ShaderStage::Fragment)
            .expect("fragment stage compiles");
        let layout = ProgramLayout::link(&vertex, &fragment).expect("program links");

        let block = layout.uniforms.as_ref().expect("default shader has uniforms");
        assert!(block.location("u_projection", UniformKind::Mat4).is_some());
        assert!(block.location("u_view", UniformKind::Mat4).is_some());
        assert!(block.location("u_time", UniformKind::Float).is_some());
        assert_eq!(layout.texture_group("TEX_SAMPLER"), Some(1));
    }

    #[test]
    fn compile_error_names_failing_stage() {
        let text = "#type vertex\nthis is not wgsl\n#type fragment\n@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    return vec4<f32>(1.0);\n}\n";
        let sources = ShaderSources::parse("broken", text).expect("splits fine");
        let err = sources
            .check_stage(ShaderStage::Vertex)
            .expect_err("vertex stage is garbage");
        match err {
            ShaderError::Compile { label, stage, log } => {
                assert_eq!(label, "broken");
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
        assert!(sources.check_stage(ShaderStage::Fragment).is_ok());
    }

    #[test]
    fn error_messages_read_like_diagnostics() {
        let err = ShaderError::Compile {
            label: "assets/shaders/default.wgsl".to_string(),
            stage: ShaderStage::Fragment,
            log: "error: expected ';'".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("fragment shader compilation failed"));
        assert!(message.contains("expected ';'"));
    }
}
