//! Introductory scenes on top of glint-engine, in a window or headless.

mod scenes;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use glint_engine::coords::Color;
use glint_engine::device::{GpuInit, GraphicsDevice, SoftwareDevice};
use glint_engine::logging::{LoggingConfig, init_logging};
use glint_engine::platform::{HeadlessPlatform, Platform};
use glint_engine::render::{LoopSummary, RenderLoop};
use glint_engine::shader::{ShaderProgram, ShaderSources, UniformPolicy};
use glint_engine::window::{self, WindowConfig};

use scenes::Scene;

const CLEAR: Color = Color::new(0.2, 0.3, 0.3, 1.0);

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// winit window + wgpu.
    Window,
    /// No window; CPU rasterizer.
    Headless,
}

#[derive(Debug, Parser)]
#[command(name = "glint-demo")]
#[command(about = "Shader program + render loop demo scenes")]
struct Args {
    #[arg(long, value_enum, default_value = "window")]
    backend: Backend,

    #[arg(long, value_enum, default_value = "triangle")]
    scene: Scene,

    /// Stop after N frames (headless runs default to 1).
    #[arg(long)]
    frames: Option<u64>,

    /// Directory holding the scene shader files.
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders"))]
    shader_dir: PathBuf,

    /// Load the GLSL 450 sources instead of WGSL.
    #[arg(long)]
    glsl: bool,

    /// Treat unknown uniforms and type mismatches as errors.
    #[arg(long)]
    strict_uniforms: bool,

    /// Headless only: write the last presented frame to this PNG file.
    #[arg(long)]
    screenshot: Option<PathBuf>,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Log filter (env_logger syntax); falls back to RUST_LOG.
    #[arg(long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig {
        env_filter: args.log.clone(),
        ..LoggingConfig::default()
    });

    if args.screenshot.is_some() && args.backend != Backend::Headless {
        anyhow::bail!("--screenshot needs --backend headless");
    }
    let sources = load_sources(&args)?;

    match args.backend {
        Backend::Window => {
            let config = WindowConfig::new(
                format!("glint - {:?}", args.scene),
                args.width as f64,
                args.height as f64,
            );
            let (mut platform, mut device) =
                window::open(config, GpuInit::default()).context("failed to open window")?;
            let summary = run_scene(&args, &sources, &mut platform, &mut device)?;
            log::info!("presented {} of {} frames", summary.presented, summary.frames);
        }

        Backend::Headless => {
            let mut platform = HeadlessPlatform::new(args.width, args.height);
            let mut device = SoftwareDevice::new(args.width, args.height);
            let summary = run_scene(&args, &sources, &mut platform, &mut device)?;
            log::info!("rendered {} frames ({:?})", summary.frames, summary.reason);

            if let Some(path) = &args.screenshot {
                write_png(&device, path)?;
                log::info!("wrote {}", path.display());
            }
        }
    }

    Ok(())
}

fn load_sources(args: &Args) -> Result<ShaderSources> {
    let (vertex, fragment) = args.scene.shader_files(args.glsl);
    ShaderSources::load(&args.shader_dir, vertex, fragment)
        .with_context(|| format!("failed to load shaders for scene {:?}", args.scene))
}

// ── scene run ───────────────────────────────────────────────────────────

fn run_scene(
    args: &Args,
    sources: &ShaderSources,
    platform: &mut dyn Platform,
    device: &mut dyn GraphicsDevice,
) -> Result<LoopSummary> {
    let policy = if args.strict_uniforms {
        UniformPolicy::Strict
    } else {
        UniformPolicy::Permissive
    };

    let mut program = ShaderProgram::build(device, &sources.vertex, &sources.fragment)
        .context("failed to build shader program")?
        .with_policy(policy);

    let binding = match args.scene.upload(device) {
        Ok(binding) => binding,
        Err(e) => {
            program.release(device);
            return Err(e).context("failed to upload vertex data");
        }
    };

    let mut looper = args.scene.configure(RenderLoop::new().clear_color(CLEAR));
    let frames = match args.backend {
        Backend::Headless => Some(args.frames.unwrap_or(1)),
        Backend::Window => args.frames,
    };
    if let Some(frames) = frames {
        looper = looper.max_frames(frames);
    }

    let result = looper.run(platform, device, &mut program, &binding);

    program.release(device);
    binding.release(device);

    result.context("render loop failed")
}

fn write_png(device: &SoftwareDevice, path: &Path) -> Result<()> {
    let frame = device.presented();
    let image = image::RgbaImage::from_raw(frame.width(), frame.height(), frame.to_rgba8())
        .context("framebuffer size does not match its pixel data")?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}
