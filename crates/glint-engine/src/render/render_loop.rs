use crate::coords::{Color, Viewport};
use crate::device::{GraphicsDevice, PresentStatus};
use crate::input::Key;
use crate::platform::Platform;
use crate::shader::ShaderProgram;
use crate::time::FrameClock;
use crate::vertex::VertexLayoutBinding;

use super::{FrameCtx, LoopControl, RenderError, ViewportTracker};

/// Callback run once per frame, or once per frame while a key is held.
pub type FrameHook = Box<dyn FnMut(&mut FrameCtx<'_>) -> LoopControl>;

/// Why the loop stopped.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StopReason {
    /// The platform reported a close request.
    CloseRequested,
    ExitKey,
    /// A hook returned `LoopControl::Exit`.
    HookExit,
    FrameLimit,
    /// The presentation surface was lost.
    DeviceLost,
}

/// Outcome of `RenderLoop::run`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LoopSummary {
    /// Iterations run to completion.
    pub frames: u64,
    /// Frames the device actually presented.
    pub presented: u64,
    pub reason: StopReason,
}

/// Frame loop configuration and hooks.
///
/// ```ignore
/// let summary = RenderLoop::new()
///     .clear_color(Color::new(0.2, 0.3, 0.3, 1.0))
///     .run(&mut platform, &mut device, &mut program, &binding)?;
/// ```
pub struct RenderLoop {
    clear_color: Color,
    exit_key: Option<Key>,
    max_frames: Option<u64>,
    key_hooks: Vec<(Key, FrameHook)>,
    frame_hooks: Vec<FrameHook>,
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            clear_color: Color::BLACK,
            exit_key: Some(Key::Escape),
            max_frames: None,
            key_hooks: Vec::new(),
            frame_hooks: Vec::new(),
        }
    }

    pub fn clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    /// Key that closes the loop while held. `None` disables it.
    pub fn exit_key(mut self, key: Option<Key>) -> Self {
        self.exit_key = key;
        self
    }

    /// Stops after `frames` iterations.
    pub fn max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Runs `hook` every frame while `key` is held.
    pub fn on_key<F>(mut self, key: Key, hook: F) -> Self
    where
        F: FnMut(&mut FrameCtx<'_>) -> LoopControl + 'static,
    {
        self.key_hooks.push((key, Box::new(hook)));
        self
    }

    /// Runs `hook` every frame after the clear and before the draw.
    pub fn on_frame<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut FrameCtx<'_>) -> LoopControl + 'static,
    {
        self.frame_hooks.push(Box::new(hook));
        self
    }

    /// Runs frames until the platform's close flag is set at the top of an
    /// iteration, the frame limit is reached, or the surface is lost.
    ///
    /// Program, binding and device outlive the loop; tearing them down is up
    /// to the caller.
    pub fn run(
        &mut self,
        platform: &mut dyn Platform,
        device: &mut dyn GraphicsDevice,
        program: &mut ShaderProgram,
        binding: &VertexLayoutBinding,
    ) -> Result<LoopSummary, RenderError> {
        if program.is_linked() {
            let inputs = program.vertex_inputs(&*device)?;
            binding.check_inputs(&inputs)?;
        } else {
            log::warn!("shader program is not linked; frames will only be cleared");
        }

        let tracker = ViewportTracker::new();
        let sink = tracker.clone();
        platform.set_resize_handler(Box::new(move |w, h| sink.notify(w, h)));

        let (width, height) = platform.drawable_size();
        let mut viewport = apply_size(device, width, height);

        let mut clock = FrameClock::new();
        let mut frames = 0u64;
        let mut presented = 0u64;
        let mut pending_reason = None;

        log::info!(
            "render loop started on {} ({}x{})",
            device.backend_name(),
            viewport.width,
            viewport.height
        );

        let reason = loop {
            if platform.should_close() {
                break pending_reason.unwrap_or(StopReason::CloseRequested);
            }
            if self.max_frames.is_some_and(|max| frames >= max) {
                break StopReason::FrameLimit;
            }

            // 1. input
            let exit_held = self
                .exit_key
                .is_some_and(|key| platform.poll_input().key_down(key));
            if exit_held {
                platform.set_should_close(true);
                pending_reason.get_or_insert(StopReason::ExitKey);
            }

            // 2. resize + clear
            if let Some((w, h)) = tracker.take() {
                viewport = apply_size(device, w, h);
            }
            device.clear(self.clear_color);

            // 3. hooks
            let time = clock.tick();
            let mut exit_requested = false;
            {
                let input = platform.poll_input();
                let mut ctx = FrameCtx {
                    device: &mut *device,
                    program: &mut *program,
                    input,
                    time,
                    viewport,
                };

                for (key, hook) in &mut self.key_hooks {
                    if ctx.input.key_down(*key) && hook(&mut ctx) == LoopControl::Exit {
                        exit_requested = true;
                    }
                }
                for hook in &mut self.frame_hooks {
                    if hook(&mut ctx) == LoopControl::Exit {
                        exit_requested = true;
                    }
                }
            }
            if exit_requested {
                platform.set_should_close(true);
                pending_reason.get_or_insert(StopReason::HookExit);
            }

            // 4. draw
            if program.is_linked() {
                if let Err(e) = draw(device, program, binding) {
                    log::error!("frame {} skipped: {e}", time.frame_index);
                }
            }

            // 5. present + events
            platform.pre_present();
            frames += 1;
            match device.present() {
                Ok(PresentStatus::Presented) => presented += 1,
                Ok(PresentStatus::Skipped) => {
                    log::trace!("frame {} not presented", time.frame_index);
                }
                Ok(PresentStatus::Lost) => {
                    log::error!("presentation surface lost; stopping");
                    break StopReason::DeviceLost;
                }
                Err(e) => log::error!("present failed: {e}"),
            }

            platform.pump_events();
        };

        log::info!("render loop stopped after {frames} frames ({reason:?})");
        Ok(LoopSummary {
            frames,
            presented,
            reason,
        })
    }
}

fn apply_size(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Viewport {
    if device.surface_size() != (width, height) {
        device.resize(width, height);
    }
    let viewport = Viewport::full(width, height);
    device.set_viewport(viewport);
    log::debug!("viewport set to {width}x{height}");
    viewport
}

fn draw(
    device: &mut dyn GraphicsDevice,
    program: &ShaderProgram,
    binding: &VertexLayoutBinding,
) -> Result<(), RenderError> {
    let bound = program.use_program(device)?;
    let vertices = device.bind_vertices(binding)?;
    device.draw(&bound, &vertices)?;
    Ok(())
}
