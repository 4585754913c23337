//! CPU implementation of `GraphicsDevice`.
//!
//! Shader stages go through the same compile/link path as the GPU backend and
//! are then executed by a small naga IR interpreter. The framebuffer is linear
//! RGBA `f32`; `present` copies the back buffer into the readable front buffer.

mod interp;
mod raster;
mod shade;

use std::collections::HashMap;

use super::objects::ObjectTable;
use super::{
    BoundProgram, BoundVertices, BufferHandle, BufferUsage, BuildStatus, DeviceError,
    DeviceResult, FrameStats, GraphicsDevice, PresentStatus, ProgramHandle, StageHandle,
    UniformLocation,
};
use crate::coords::{Color, Viewport};
use crate::shader::{ShaderStage, UniformValue, VertexInput};
use crate::vertex::VertexLayoutBinding;

use shade::{FragmentInput, ShadedVertex};

/// Linear RGBA image, row-major from the top-left pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::TRANSPARENT; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    fn set(&mut self, x: u32, y: u32, color: Color) {
        if x < self.width && y < self.height {
            self.pixels[y as usize * self.width as usize + x as usize] = color;
        }
    }

    fn fill(&mut self, color: Color) {
        self.pixels.fill(color);
    }

    /// Number of pixels within `eps` of `color`.
    pub fn count(&self, color: Color, eps: f32) -> usize {
        self.pixels.iter().filter(|p| p.approx_eq(color, eps)).count()
    }

    /// 8-bit RGBA bytes, suitable for image encoders.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| p.to_rgba8()).collect()
    }
}

struct SoftBuffer {
    usage: BufferUsage,
    data: Vec<u8>,
}

/// Headless device rendering into CPU memory.
pub struct SoftwareDevice {
    objects: ObjectTable,
    buffers: HashMap<u32, SoftBuffer>,
    next_buffer: u32,
    viewport: Viewport,
    back: Framebuffer,
    front: Framebuffer,
    frame: FrameStats,
    last_frame: FrameStats,
    frames_presented: u64,
}

impl SoftwareDevice {
    /// Creates a device with a `width` x `height` render target and a full viewport.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            objects: ObjectTable::default(),
            buffers: HashMap::new(),
            next_buffer: 1,
            viewport: Viewport::full(width, height),
            back: Framebuffer::new(width, height),
            front: Framebuffer::new(width, height),
            frame: FrameStats::default(),
            last_frame: FrameStats::default(),
            frames_presented: 0,
        }
    }

    /// The most recently presented frame.
    pub fn presented(&self) -> &Framebuffer {
        &self.front
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn live_stages(&self) -> usize {
        self.objects.live_stages()
    }

    pub fn live_programs(&self) -> usize {
        self.objects.live_programs()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    fn buffer(&self, h: BufferHandle, usage: BufferUsage) -> DeviceResult<&[u8]> {
        match self.buffers.get(&h.0) {
            Some(b) if b.usage == usage => Ok(&b.data),
            Some(_) => Err(DeviceError::Buffer(format!(
                "buffer {} is not a {usage:?} buffer",
                h.0
            ))),
            None => Err(DeviceError::InvalidHandle {
                kind: "buffer",
                id: h.0,
            }),
        }
    }
}

fn shading_error(e: String) -> DeviceError {
    DeviceError::Unsupported(format!("software shading: {e}"))
}

impl GraphicsDevice for SoftwareDevice {
    fn backend_name(&self) -> &'static str {
        "software"
    }

    fn create_stage(&mut self, stage: ShaderStage) -> DeviceResult<StageHandle> {
        Ok(self.objects.create_stage(stage))
    }

    fn compile_stage(&mut self, stage: StageHandle, source: &str) -> DeviceResult<BuildStatus> {
        self.objects.compile_stage(stage, source)
    }

    fn delete_stage(&mut self, stage: StageHandle) {
        self.objects.delete_stage(stage);
    }

    fn create_program(&mut self) -> DeviceResult<ProgramHandle> {
        Ok(self.objects.create_program())
    }

    fn attach_stage(&mut self, program: ProgramHandle, stage: StageHandle) -> DeviceResult<()> {
        self.objects.attach_stage(program, stage)
    }

    fn detach_stage(&mut self, program: ProgramHandle, stage: StageHandle) -> DeviceResult<()> {
        self.objects.detach_stage(program, stage)
    }

    fn link_program(&mut self, program: ProgramHandle) -> DeviceResult<BuildStatus> {
        self.objects.link_program(program)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.objects.delete_program(program);
    }

    fn use_program(&mut self, program: ProgramHandle) -> DeviceResult<BoundProgram> {
        self.objects.use_program(program)
    }

    fn vertex_inputs(&self, program: ProgramHandle) -> DeviceResult<Vec<VertexInput>> {
        self.objects.vertex_inputs(program)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.objects.uniform_location(program, name)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) -> DeviceResult<()> {
        self.objects.set_uniform(location, value)?;
        self.frame.uniform_uploads += 1;
        Ok(())
    }

    fn create_buffer(&mut self, usage: BufferUsage, data: &[u8]) -> DeviceResult<BufferHandle> {
        if data.is_empty() {
            return Err(DeviceError::Buffer("buffer data is empty".into()));
        }
        if usage == BufferUsage::Index && data.len() % 4 != 0 {
            return Err(DeviceError::Buffer(
                "index data is not a whole number of u32 values".into(),
            ));
        }
        let id = self.next_buffer;
        self.next_buffer += 1;
        self.buffers.insert(
            id,
            SoftBuffer {
                usage,
                data: data.to_vec(),
            },
        );
        Ok(BufferHandle(id))
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer.0).is_none() {
            log::debug!("delete of unknown buffer {}", buffer.0);
        }
    }

    fn bind_vertices<'a>(
        &mut self,
        binding: &'a VertexLayoutBinding,
    ) -> DeviceResult<BoundVertices<'a>> {
        self.buffer(binding.vertex_buffer(), BufferUsage::Vertex)?;
        if let Some(index) = binding.index_buffer() {
            self.buffer(index, BufferUsage::Index)?;
        }
        Ok(BoundVertices { binding })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.back.width, self.back.height) {
            return;
        }
        log::debug!("software target resized to {width}x{height}");
        self.back = Framebuffer::new(width, height);
        self.front = Framebuffer::new(width, height);
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.back.width, self.back.height)
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn clear(&mut self, color: Color) {
        self.back.fill(color);
    }

    fn draw(&mut self, program: &BoundProgram, vertices: &BoundVertices<'_>) -> DeviceResult<()> {
        if self.objects.active() != Some(program.program) {
            return Err(DeviceError::InvalidOperation(format!(
                "program {} is not the active program",
                program.program.0
            )));
        }

        let binding = vertices.binding;
        let linked = self.objects.linked(program.program)?;
        let vertex_data = self.buffer(binding.vertex_buffer(), BufferUsage::Vertex)?;
        let indices: Vec<u32> = match binding.index_buffer() {
            Some(h) => self
                .buffer(h, BufferUsage::Index)?
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            None => (0..binding.vertex_count()).collect(),
        };

        let stride = binding.layout().stride() as usize;
        let mut shaded: Vec<Option<ShadedVertex>> = vec![None; binding.vertex_count() as usize];
        for &i in &indices {
            let slot = shaded.get_mut(i as usize).ok_or_else(|| {
                DeviceError::Buffer(format!("index {i} is past the end of the vertex buffer"))
            })?;
            if slot.is_none() {
                let start = i as usize * stride;
                let bytes = vertex_data
                    .get(start..start + stride)
                    .ok_or_else(|| DeviceError::Buffer(format!("vertex {i} is out of bounds")))?;
                *slot = Some(
                    shade::shade_vertex(linked, binding.layout(), bytes, i)
                        .map_err(shading_error)?,
                );
            }
        }

        let constant = if shade::fragment_is_constant(linked) {
            Some(shade::shade_fragment(linked, None).map_err(shading_error)?)
        } else {
            None
        };

        let viewport = self
            .viewport
            .clamped_to(self.back.width, self.back.height);
        let triangles = raster::assemble(binding.topology(), &indices);
        let target = &mut self.back;

        for tri in &triangles {
            let vertices = [
                shaded[tri[0] as usize].as_ref(),
                shaded[tri[1] as usize].as_ref(),
                shaded[tri[2] as usize].as_ref(),
            ];
            let [Some(a), Some(b), Some(c)] = vertices else {
                continue;
            };
            let corners = [a, b, c];

            raster::rasterize(viewport, [a.clip, b.clip, c.clip], |cov| {
                let color = match constant {
                    Some(color) => color,
                    None => {
                        let input = FragmentInput {
                            vertices: corners,
                            weights: cov.weights,
                            coord: cov.coord,
                        };
                        shade::shade_fragment(linked, Some(&input))?
                    }
                };
                if let Some(color) = color {
                    target.set(cov.x, cov.y, color);
                }
                Ok::<(), String>(())
            })
            .map_err(shading_error)?;
        }

        self.frame.draw_calls += 1;
        self.frame.triangles += triangles.len() as u32;
        Ok(())
    }

    fn present(&mut self) -> DeviceResult<PresentStatus> {
        if self.back.width == 0 || self.back.height == 0 {
            self.last_frame = std::mem::take(&mut self.frame);
            return Ok(PresentStatus::Skipped);
        }
        self.front.clone_from(&self.back);
        self.last_frame = std::mem::take(&mut self.frame);
        self.frames_presented += 1;
        Ok(PresentStatus::Presented)
    }

    fn frame_stats(&self) -> FrameStats {
        self.last_frame
    }
}
