//! Demo scenes: geometry, shader files and per-frame behavior.

use bytemuck::{Pod, Zeroable};
use clap::ValueEnum;

use glint_engine::device::GraphicsDevice;
use glint_engine::render::{LoopControl, RenderLoop};
use glint_engine::vertex::{
    PrimitiveTopology, VertexAttribute, VertexError, VertexFormat, VertexLayout,
    VertexLayoutBinding,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Scene {
    /// One orange triangle.
    Triangle,
    /// Indexed rectangle built from two triangles.
    Quad,
    /// Per-vertex colors with a time-driven uniform.
    Colors,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ColorVertex {
    position: [f32; 3],
    color: [f32; 3],
}

const TRIANGLE: [[f32; 3]; 3] = [[-0.5, -0.5, 0.0], [0.5, -0.5, 0.0], [0.0, 0.5, 0.0]];

const QUAD: [[f32; 3]; 4] = [
    [0.5, 0.5, 0.0],
    [0.5, -0.5, 0.0],
    [-0.5, -0.5, 0.0],
    [-0.5, 0.5, 0.0],
];
const QUAD_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

const COLORED: [ColorVertex; 3] = [
    ColorVertex {
        position: [0.5, -0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    ColorVertex {
        position: [-0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    ColorVertex {
        position: [0.0, 0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

impl Scene {
    /// Vertex and fragment shader files, relative to the shader directory.
    pub fn shader_files(self, glsl: bool) -> (&'static str, &'static str) {
        match (self, glsl) {
            (Scene::Triangle | Scene::Quad, true) => ("triangle.vert", "triangle.frag"),
            (Scene::Triangle | Scene::Quad, false) => ("triangle.wgsl", "triangle.wgsl"),
            (Scene::Colors, true) => ("colors.vert", "colors.frag"),
            (Scene::Colors, false) => ("colors.wgsl", "colors.wgsl"),
        }
    }

    pub fn upload(self, device: &mut dyn GraphicsDevice) -> Result<VertexLayoutBinding, VertexError> {
        match self {
            Scene::Triangle => VertexLayoutBinding::from_vertices(
                device,
                VertexLayout::packed(&[VertexFormat::Float32x3])?,
                &TRIANGLE,
                None,
                PrimitiveTopology::TriangleList,
            ),
            Scene::Quad => VertexLayoutBinding::from_vertices(
                device,
                VertexLayout::packed(&[VertexFormat::Float32x3])?,
                &QUAD,
                Some(&QUAD_INDICES),
                PrimitiveTopology::TriangleList,
            ),
            Scene::Colors => {
                let stride = size_of::<ColorVertex>() as u32;
                let layout = VertexLayout::new(
                    stride,
                    [
                        VertexAttribute::new(0, VertexFormat::Float32x3, 0),
                        VertexAttribute::new(1, VertexFormat::Float32x3, 12),
                    ],
                )?;
                VertexLayoutBinding::from_vertices(
                    device,
                    layout,
                    &COLORED,
                    None,
                    PrimitiveTopology::TriangleList,
                )
            }
        }
    }

    /// Installs the scene's per-frame hooks.
    pub fn configure(self, looper: RenderLoop) -> RenderLoop {
        match self {
            Scene::Triangle | Scene::Quad => looper,
            Scene::Colors => looper.on_frame(|ctx| {
                let green = ctx.time.elapsed.sin() / 2.0 + 0.5;
                match ctx.set_uniform("ourColor", [0.0, green, 0.0, 1.0]) {
                    Ok(()) => LoopControl::Continue,
                    Err(e) => {
                        log::error!("{e}");
                        LoopControl::Exit
                    }
                }
            }),
        }
    }
}
