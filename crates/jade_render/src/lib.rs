pub mod camera;
pub mod color;
pub mod gpu_context;
pub mod shader;
pub mod shader_source;
pub mod texture;
pub mod uniform;
pub mod vertex;

pub use camera::Camera;
pub use color::ClearColor;
pub use gpu_context::{GpuContext, GpuError};
pub use shader::{ShaderError, ShaderProgram};
pub use shader_source::{ShaderSources, ShaderStage};
pub use texture::{Texture, TextureError};
pub use vertex::QuadVertex;
