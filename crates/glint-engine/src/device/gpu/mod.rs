//! wgpu implementation of `GraphicsDevice`.
//!
//! Draws are recorded during the frame and encoded into a single render pass
//! by `present`. The first recorded `clear` becomes the pass load operation.

mod context;
mod init;
mod program;
mod surface;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

pub use init::GpuInit;

use context::GpuContext;
use program::{GpuProgram, PipelineKey};
use surface::SurfaceErrorAction;

use super::objects::ObjectTable;
use super::{
    BoundProgram, BoundVertices, BufferHandle, BufferUsage, BuildStatus, DeviceError,
    DeviceResult, FrameStats, GraphicsDevice, PresentStatus, ProgramHandle, StageHandle,
    UniformLocation,
};
use crate::coords::{Color, Viewport};
use crate::shader::{ShaderStage, UniformValue, VertexInput};
use crate::vertex::VertexLayoutBinding;

struct GpuBuffer {
    usage: BufferUsage,
    buffer: wgpu::Buffer,
}

struct DrawCommand {
    program: ProgramHandle,
    key: PipelineKey,
    vertex_buffer: BufferHandle,
    index_buffer: Option<BufferHandle>,
    count: u32,
    viewport: Viewport,
}

/// Window-backed device.
pub struct WgpuDevice {
    ctx: GpuContext,
    objects: ObjectTable<GpuProgram>,
    buffers: HashMap<u32, GpuBuffer>,
    next_buffer: u32,
    viewport: Viewport,
    clear: Option<Color>,
    commands: Vec<DrawCommand>,
    frame: FrameStats,
    last_frame: FrameStats,
}

impl WgpuDevice {
    /// Creates a device rendering into `window`.
    pub async fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let ctx = GpuContext::new(window, init).await?;
        let size = ctx.size();
        Ok(Self {
            ctx,
            objects: ObjectTable::default(),
            buffers: HashMap::new(),
            next_buffer: 1,
            viewport: Viewport::full(size.width, size.height),
            clear: None,
            commands: Vec::new(),
            frame: FrameStats::default(),
            last_frame: FrameStats::default(),
        })
    }

    /// Blocking variant of `new`.
    pub fn create(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new(window, init))
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.ctx.surface_format()
    }

    fn buffer(&self, h: BufferHandle, usage: BufferUsage) -> DeviceResult<&wgpu::Buffer> {
        match self.buffers.get(&h.0) {
            Some(b) if b.usage == usage => Ok(&b.buffer),
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

    fn encode(&self, pass: &mut wgpu::RenderPass<'_>, cmd: &DrawCommand) {
        let (width, height) = self.surface_size();
        let viewport = cmd.viewport.clamped_to(width, height);
        if viewport.is_empty() {
            return;
        }

        let Ok(program) = self.objects.program(cmd.program) else {
            log::debug!("skipping draw of deleted program {}", cmd.program.0);
            return;
        };
        let Some(gpu) = program.backend.as_ref() else {
            return;
        };
        let Some(pipeline) = gpu.pipelines.get(&cmd.key) else {
            return;
        };
        let Ok(vertices) = self.buffer(cmd.vertex_buffer, BufferUsage::Vertex) else {
            log::debug!("skipping draw of deleted vertex buffer {}", cmd.vertex_buffer.0);
            return;
        };

        pass.set_viewport(
            viewport.x as f32,
            viewport.y as f32,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(pipeline);
        for (group, bind_group) in gpu.bind_groups.iter().enumerate() {
            pass.set_bind_group(group as u32, bind_group, &[]);
        }
        pass.set_vertex_buffer(0, vertices.slice(..));

        match cmd.index_buffer {
            Some(h) => {
                let Ok(indices) = self.buffer(h, BufferUsage::Index) else {
                    return;
                };
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..cmd.count, 0, 0..1);
            }
            None => pass.draw(0..cmd.count, 0..1),
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    fn backend_name(&self) -> &'static str {
        "wgpu"
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
        let status = self.objects.link_program(program)?;
        if status.is_success() {
            let gpu = GpuProgram::new(&self.ctx.device, self.objects.linked(program)?);
            self.objects.program_mut(program)?.backend = Some(gpu);
        }
        Ok(status)
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
        self.objects.set_uniform(location, value)
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

        let buffer = self
            .ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(match usage {
                    BufferUsage::Vertex => "glint vertex buffer",
                    BufferUsage::Index => "glint index buffer",
                }),
                contents: data,
                usage: match usage {
                    BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
                    BufferUsage::Index => wgpu::BufferUsages::INDEX,
                },
            });

        let id = self.next_buffer;
        self.next_buffer += 1;
        self.buffers.insert(id, GpuBuffer { usage, buffer });
        Ok(BufferHandle(id))
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.remove(&buffer.0) {
            Some(b) => b.buffer.destroy(),
            None => log::debug!("delete of unknown buffer {}", buffer.0),
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
        let size = self.ctx.size();
        if (size.width, size.height) == (width, height) {
            return;
        }
        log::debug!("surface resized to {width}x{height}");
        self.ctx.resize(PhysicalSize::new(width, height));
    }

    fn surface_size(&self) -> (u32, u32) {
        let size = self.ctx.size();
        (size.width, size.height)
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn clear(&mut self, color: Color) {
        // Draws recorded before a clear would be overwritten by it.
        self.commands.clear();
        self.clear = Some(color);
    }

    fn draw(&mut self, program: &BoundProgram, vertices: &BoundVertices<'_>) -> DeviceResult<()> {
        let handle = program.program;
        if self.objects.active() != Some(handle) {
            return Err(DeviceError::InvalidOperation(format!(
                "program {} is not the active program",
                handle.0
            )));
        }

        let binding = vertices.binding;
        let key = PipelineKey {
            layout: binding.layout().clone(),
            topology: binding.topology(),
        };
        let format = self.ctx.surface_format();

        let object = self.objects.program_mut(handle)?;
        let (Some(linked), Some(gpu)) = (object.linked.as_mut(), object.backend.as_mut()) else {
            return Err(DeviceError::InvalidOperation(format!(
                "program {} is not linked",
                handle.0
            )));
        };

        self.frame.uniform_uploads += gpu.upload_uniforms(&self.ctx.queue, linked);
        gpu.ensure_pipeline(&self.ctx.device, format, linked, &key);

        self.commands.push(DrawCommand {
            program: handle,
            key,
            vertex_buffer: binding.vertex_buffer(),
            index_buffer: binding.index_buffer(),
            count: binding.draw_count(),
            viewport: self.viewport,
        });
        self.frame.draw_calls += 1;
        self.frame.triangles += binding.topology().triangle_count(binding.draw_count());
        Ok(())
    }

    fn present(&mut self) -> DeviceResult<PresentStatus> {
        let commands = std::mem::take(&mut self.commands);
        let clear = self.clear.take();
        self.last_frame = std::mem::take(&mut self.frame);

        let size = self.ctx.size();
        if size.width == 0 || size.height == 0 {
            return Ok(PresentStatus::Skipped);
        }

        let surface_texture = match self.ctx.acquire() {
            Ok(texture) => texture,
            Err(err) => {
                log::warn!("surface error: {err}");
                return Ok(match self.ctx.handle_surface_error(err) {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        PresentStatus::Skipped
                    }
                    SurfaceErrorAction::Fatal => PresentStatus::Lost,
                });
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glint frame encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("glint frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match clear {
                            Some(color) => wgpu::LoadOp::Clear(color.into()),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for cmd in &commands {
                self.encode(&mut pass, cmd);
            }
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(PresentStatus::Presented)
    }

    fn frame_stats(&self) -> FrameStats {
        self.last_frame
    }
}
