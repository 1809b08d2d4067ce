//! Stage compilation and program reflection on top of naga.
//!
//! Every stage is parsed and validated on the CPU before anything reaches the
//! device. That yields a per-stage compile status with the compiler's own
//! diagnostic text, and the resulting IR tells the program where each named
//! uniform lives, so uploads can resolve names the way `glGetUniformLocation`
//! does.
//!
//! Binding conventions a program must follow:
//! - all uniforms sit in one struct at `@group(0) @binding(0)`
//! - each texture lives in its own group (1 and up) as a `texture_2d` at
//!   binding 0, with its sampler at binding 1
//! - groups and the uniform block stay within the default device limits

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Handle, ImageDimension, Module, Scalar, Type, TypeInner, VectorSize};

use crate::shader_source::ShaderStage;

pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
pub const TEXTURE_BINDING: u32 = 0;
pub const SAMPLER_BINDING: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Mat4,
    Mat3,
    Vec4,
    Vec3,
    Vec2,
    Float,
    Int,
    /// Anything the upload API has no writer for (arrays, nested structs...).
    Other,
}

impl UniformKind {
    fn of(module: &Module, ty: Handle<Type>) -> Self {
        match module.types[ty].inner {
            TypeInner::Matrix {
                columns,
                rows,
                scalar,
            } if scalar == Scalar::F32 => match (columns, rows) {
                (VectorSize::Quad, VectorSize::Quad) => Self::Mat4,
                (VectorSize::Tri, VectorSize::Tri) => Self::Mat3,
                _ => Self::Other,
            },
            TypeInner::Vector { size, scalar } if scalar == Scalar::F32 => match size {
                VectorSize::Quad => Self::Vec4,
                VectorSize::Tri => Self::Vec3,
                VectorSize::Bi => Self::Vec2,
            },
            TypeInner::Scalar(scalar) if scalar == Scalar::F32 => Self::Float,
            TypeInner::Scalar(scalar) if scalar == Scalar::I32 => Self::Int,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub kind: UniformKind,
    pub offset: u32,
}

/// The program's uniform struct, laid out as the shader sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub size: u32,
    pub members: Vec<UniformMember>,
}

impl UniformBlock {
    /// Byte offset of `name` if it exists and holds a `kind` value.
    /// `None` is the "no location" sentinel; writes through it are dropped.
    pub fn location(&self, name: &str, kind: UniformKind) -> Option<u64> {
        let member = self.members.iter().find(|m| m.name == name)?;
        if member.kind != kind {
            log::warn!(
                "Uniform '{}' is {:?}, upload of {:?} discarded",
                name,
                member.kind,
                kind
            );
            return None;
        }
        Some(member.offset as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    pub name: String,
    pub group: u32,
}

/// A stage that parsed and validated.
#[derive(Debug)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub module: Module,
    pub entry_point: String,
}

/// Parses and validates one stage. The error string is the compiler log.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;

    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == wanted)
        .map(|ep| ep.name.clone())
        .ok_or_else(|| format!("no @{stage} entry point"))?;

    Ok(CompiledStage {
        stage,
        module,
        entry_point,
    })
}

/// Everything the device side needs to build a program out of two stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLayout {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub uniforms: Option<UniformBlock>,
    /// Sorted by group.
    pub textures: Vec<TextureBinding>,
}

impl ProgramLayout {
    /// Cross-stage checks. The error string is the link log.
    pub fn link(vertex: &CompiledStage, fragment: &CompiledStage) -> Result<Self, String> {
        let uniforms = match (
            uniform_block(&vertex.module)?,
            uniform_block(&fragment.module)?,
        ) {
            (Some(v), Some(f)) if v != f => {
                return Err(format!(
                    "uniform block at @group({UNIFORM_GROUP}) @binding({UNIFORM_BINDING}) differs between vertex and fragment stages"
                ));
            }
            (v, f) => v.or(f),
        };

        let mut textures = texture_bindings(&vertex.module)?;
        for binding in texture_bindings(&fragment.module)? {
            match textures.iter().find(|t| t.name == binding.name) {
                Some(existing) if existing.group != binding.group => {
                    return Err(format!(
                        "texture '{}' is bound to group {} in one stage and {} in the other",
                        binding.name, existing.group, binding.group
                    ));
                }
                Some(_) => {}
                None => textures.push(binding),
            }
        }
        textures.sort_by_key(|t| t.group);
        if let Some(pair) = textures.windows(2).find(|w| w[0].group == w[1].group) {
            return Err(format!(
                "textures '{}' and '{}' share group {}",
                pair[0].name, pair[1].name, pair[0].group
            ));
        }

        let limits = wgpu::Limits::default();
        if let Some(texture) = textures.iter().find(|t| t.group >= limits.max_bind_groups) {
            return Err(format!(
                "texture '{}' is in group {}, but only {} bind groups are available",
                texture.name, texture.group, limits.max_bind_groups
            ));
        }
        if let Some(block) = uniforms
            .as_ref()
            .filter(|b| b.size > limits.max_uniform_buffer_binding_size)
        {
            return Err(format!(
                "uniform block is {} bytes, above the {} byte limit",
                block.size, limits.max_uniform_buffer_binding_size
            ));
        }

        Ok(Self {
            vertex_entry: vertex.entry_point.clone(),
            fragment_entry: fragment.entry_point.clone(),
            uniforms,
            textures,
        })
    }

    /// Number of bind groups in the pipeline layout.
    pub fn group_count(&self) -> u32 {
        let texture_groups = self.textures.iter().map(|t| t.group + 1).max().unwrap_or(0);
        let uniform_groups = u32::from(self.uniforms.is_some());
        texture_groups.max(uniform_groups)
    }

    pub fn texture_group(&self, name: &str) -> Option<u32> {
        self.textures.iter().find(|t| t.name == name).map(|t| t.group)
    }

    pub fn has_texture_at(&self, group: u32) -> bool {
        self.textures.iter().any(|t| t.group == group)
    }
}

fn uniform_block(module: &Module) -> Result<Option<UniformBlock>, String> {
    let mut block = None;
    for (_, var) in module.global_variables.iter() {
        if var.space != AddressSpace::Uniform {
            continue;
        }
        let name = var.name.as_deref().unwrap_or("<unnamed>");
        match var.binding.as_ref() {
            Some(rb) if rb.group == UNIFORM_GROUP && rb.binding == UNIFORM_BINDING => {}
            _ => {
                return Err(format!(
                    "uniform '{name}' must be declared at @group({UNIFORM_GROUP}) @binding({UNIFORM_BINDING})"
                ));
            }
        }
        let TypeInner::Struct { members, span } = &module.types[var.ty].inner else {
            return Err(format!("uniform '{name}' must be a struct"));
        };
        block = Some(UniformBlock {
            size: *span,
            members: members
                .iter()
                .map(|m| UniformMember {
                    name: m.name.clone().unwrap_or_default(),
                    kind: UniformKind::of(module, m.ty),
                    offset: m.offset,
                })
                .collect(),
        });
    }
    Ok(block)
}

fn texture_bindings(module: &Module) -> Result<Vec<TextureBinding>, String> {
    let mut bindings = Vec::new();
    for (_, var) in module.global_variables.iter() {
        let TypeInner::Image {
            dim: ImageDimension::D2,
            arrayed: false,
            ..
        } = module.types[var.ty].inner
        else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();
        let Some(rb) = var.binding.as_ref() else {
            continue;
        };
        if rb.group == UNIFORM_GROUP || rb.binding != TEXTURE_BINDING {
            return Err(format!(
                "texture '{name}' must be at @binding({TEXTURE_BINDING}) of a group above {UNIFORM_GROUP}"
            ));
        }
        bindings.push(TextureBinding {
            name,
            group: rb.group,
        });
    }
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIFORMS: &str = "
struct Uniforms {
    u_projection: mat4x4<f32>,
    u_view: mat4x4<f32>,
    u_tint: vec4<f32>,
    u_basis: mat3x3<f32>,
    u_time: f32,
    u_frame: i32,
}

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;
";

    fn vertex_source() -> String {
        format!(
            "{UNIFORMS}
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {{
    return uniforms.u_projection * uniforms.u_view * vec4<f32>(position, 1.0);
}}
"
        )
    }

    const FRAGMENT: &str = "
@group(1) @binding(0)
var TEX_SAMPLER: texture_2d<f32>;
@group(1) @binding(1)
var tex_sampler_state: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(TEX_SAMPLER, tex_sampler_state, uv);
}
";

    fn compile(stage: ShaderStage, source: &str) -> CompiledStage {
        compile_stage(stage, source).expect("stage should compile")
    }

    #[test]
    fn compiles_valid_stages_and_finds_entry_points() {
        let vertex = compile(ShaderStage::Vertex, &vertex_source());
        let fragment = compile(ShaderStage::Fragment, FRAGMENT);
        assert_eq!(vertex.entry_point, "vs_main");
        assert_eq!(fragment.entry_point, "fs_main");
    }

    #[test]
    fn syntax_error_fails_compilation_with_diagnostic() {
        let log = compile_stage(ShaderStage::Vertex, "@vertex fn vs_main( {")
            .expect_err("syntax error");
        assert!(!log.is_empty());
    }

    #[test]
    fn type_error_fails_validation() {
        let source = "
@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    let x: f32 = 1.0;
    return x;
}
";
        assert!(compile_stage(ShaderStage::Vertex, source).is_err());
    }

    #[test]
    fn stage_without_matching_entry_point_fails() {
        let log = compile_stage(ShaderStage::Vertex, FRAGMENT).expect_err("no vertex entry");
        assert!(log.contains("@vertex"));
    }

    #[test]
    fn link_reflects_uniform_offsets_and_kinds() {
        let vertex = compile(ShaderStage::Vertex, &vertex_source());
        let fragment = compile(ShaderStage::Fragment, FRAGMENT);
        let layout = ProgramLayout::link(&vertex, &fragment).expect("program should link");

        let block = layout.uniforms.as_ref().expect("uniform block");
        assert_eq!(block.location("u_projection", UniformKind::Mat4), Some(0));
        assert_eq!(block.location("u_view", UniformKind::Mat4), Some(64));
        assert_eq!(block.location("u_tint", UniformKind::Vec4), Some(128));
        assert_eq!(block.location("u_basis", UniformKind::Mat3), Some(144));
        assert_eq!(block.location("u_time", UniformKind::Float), Some(192));
        assert_eq!(block.location("u_frame", UniformKind::Int), Some(196));
        assert_eq!(block.size, 208);
    }

    #[test]
    fn missing_uniform_has_no_location() {
        let vertex = compile(ShaderStage::Vertex, &vertex_source());
        let fragment = compile(ShaderStage::Fragment, FRAGMENT);
        let layout = ProgramLayout::link(&vertex, &fragment).expect("program should link");
        let block = layout.uniforms.expect("uniform block");
        assert_eq!(block.location("uProjection", UniformKind::Mat4), None);
    }

    #[test]
    fn mismatched_upload_kind_has_no_location() {
        let vertex = compile(ShaderStage::Vertex, &vertex_source());
        let fragment = compile(ShaderStage::Fragment, FRAGMENT);
        let layout = ProgramLayout::link(&vertex, &fragment).expect("program should link");
        let block = layout.uniforms.expect("uniform block");
        assert_eq!(block.location("u_time", UniformKind::Int), None);
        assert_eq!(block.location("u_view", UniformKind::Mat3), None);
    }

    #[test]
    fn link_reflects_texture_groups() {
        let vertex = compile(ShaderStage::Vertex, &vertex_source());
        let fragment = compile(ShaderStage::Fragment, FRAGMENT);
        let layout = ProgramLayout::link(&vertex, &fragment).expect("program should link");
        assert_eq!(layout.texture_group("TEX_SAMPLER"), Some(1));
        assert_eq!(layout.texture_group("tex_sampler_state"), None);
        assert!(layout.has_texture_at(1));
        assert_eq!(layout.group_count(), 2);
    }

    #[test]
    fn link_rejects_diverging_uniform_blocks() {
        let vertex = compile(ShaderStage::Vertex, &vertex_source());
        let fragment_source = "
struct Uniforms {
    u_time: f32,
}
@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(uniforms.u_time);
}
";
        let fragment = compile(ShaderStage::Fragment, fragment_source);
        let log = ProgramLayout::link(&vertex, &fragment).expect_err("blocks differ");
        assert!(log.contains("differs"));
    }

    #[test]
    fn link_rejects_texture_in_uniform_group() {
        let vertex = compile(ShaderStage::Vertex, &vertex_source());
        let fragment_source = "
@group(0) @binding(1)
var tex: texture_2d<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return textureLoad(tex, vec2<i32>(0, 0), 0);
}
";
        let fragment = compile(ShaderStage::Fragment, fragment_source);
        assert!(ProgramLayout::link(&vertex, &fragment).is_err());
    }

    #[test]
    fn link_rejects_texture_beyond_bind_group_limit() {
        let vertex = compile(ShaderStage::Vertex, &vertex_source());
        let fragment_source = "
@group(4) @binding(0)
var far_texture: texture_2d<f32>;
@group(4) @binding(1)
var far_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(far_texture, far_sampler, uv);
}
";
        let fragment = compile(ShaderStage::Fragment, fragment_source);
        let log = ProgramLayout::link(&vertex, &fragment).expect_err("group 4 is out of range");
        assert!(log.contains("group 4"));
    }

    #[test]
    fn link_rejects_oversized_uniform_block() {
        let source = "
struct Uniforms {
    u_values: array<vec4<f32>, 4097>,
}
@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    return uniforms.u_values[0];
}
";
        let vertex = compile(ShaderStage::Vertex, source);
        let fragment = compile(ShaderStage::Fragment, FRAGMENT);
        let log = ProgramLayout::link(&vertex, &fragment).expect_err("65552 bytes is too big");
        assert!(log.contains("65552"));
    }

    #[test]
    fn program_without_resources_needs_no_groups() {
        let vertex = compile(
            ShaderStage::Vertex,
            "@vertex\nfn vs_main() -> @builtin(position) vec4<f32> {\n    return vec4<f32>(0.0);\n}\n",
        );
        let fragment = compile(
            ShaderStage::Fragment,
            "@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    return vec4<f32>(1.0);\n}\n",
        );
        let layout = ProgramLayout::link(&vertex, &fragment).expect("program should link");
        assert!(layout.uniforms.is_none());
        assert!(layout.textures.is_empty());
        assert_eq!(layout.group_count(), 0);
    }
}
