//! End-to-end runs of the render loop on the headless platform and the
//! software device.

use glint_engine::coords::Color;
use glint_engine::device::{GraphicsDevice, SoftwareDevice};
use glint_engine::input::Key;
use glint_engine::platform::HeadlessPlatform;
use glint_engine::render::{LoopControl, RenderLoop, StopReason};
use glint_engine::shader::{ProgramStatus, ShaderError, ShaderProgram, UniformPolicy};
use glint_engine::vertex::{PrimitiveTopology, VertexFormat, VertexLayout, VertexLayoutBinding};

const CLEAR: Color = Color::new(0.2, 0.3, 0.3, 1.0);
const ORANGE: Color = Color::new(1.0, 0.5, 0.2, 1.0);

const POSITION_VS: &str = "
@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos, 1.0);
}
";

const ORANGE_FS: &str = "
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.5, 0.2, 1.0);
}
";

const COLOR_VS: &str = "
struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec3<f32>,
}

@vertex
fn vs_main(@location(0) pos: vec3<f32>, @location(1) color: vec3<f32>) -> VsOut {
    var out: VsOut;
    out.position = vec4<f32>(pos, 1.0);
    out.color = color;
    return out;
}
";

const TINT_FS: &str = "
@group(0) @binding(0) var<uniform> ourColor: vec4<f32>;

@fragment
fn fs_main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
    return 0.5 * (vec4<f32>(color, 1.0) + ourColor);
}
";

const GLSL_VS: &str = "#version 450
layout(location = 0) in vec3 aPos;

void main() {
    gl_Position = vec4(aPos, 1.0);
}
";

const GLSL_FS: &str = "#version 450
layout(location = 0) out vec4 FragColor;

void main() {
    FragColor = vec4(1.0, 0.5, 0.2, 1.0);
}
";

fn triangle(device: &mut dyn GraphicsDevice) -> VertexLayoutBinding {
    let layout = VertexLayout::packed(&[VertexFormat::Float32x3]).unwrap();
    let vertices: [[f32; 3]; 3] = [[-0.5, -0.5, 0.0], [0.5, -0.5, 0.0], [0.0, 0.5, 0.0]];
    VertexLayoutBinding::from_vertices(device, layout, &vertices, None, PrimitiveTopology::TriangleList)
        .unwrap()
}

fn approx(a: Color, b: Color) -> bool {
    a.approx_eq(b, 1e-3)
}

#[test]
fn triangle_covers_center_and_leaves_corners_clear() {
    let mut device = SoftwareDevice::new(64, 48);
    let mut program = ShaderProgram::build(&mut device, POSITION_VS, ORANGE_FS).unwrap();
    let binding = triangle(&mut device);
    let mut platform = HeadlessPlatform::new(64, 48);

    let summary = RenderLoop::new()
        .clear_color(CLEAR)
        .max_frames(1)
        .run(&mut platform, &mut device, &mut program, &binding)
        .unwrap();
    assert_eq!(summary.frames, 1);

    let frame = device.presented();
    assert!(approx(frame.pixel(32, 24).unwrap(), ORANGE));
    for (x, y) in [(0, 0), (63, 0), (0, 47), (63, 47)] {
        assert!(approx(frame.pixel(x, y).unwrap(), CLEAR), "corner ({x}, {y})");
    }
    let covered = frame.count(ORANGE, 1e-3);
    let cleared = frame.count(CLEAR, 1e-3);
    assert_eq!(covered + cleared, 64 * 48);

    program.release(&mut device);
    binding.release(&mut device);
    assert_eq!(device.live_programs(), 0);
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn indexed_quad_fills_its_rectangle() {
    let mut device = SoftwareDevice::new(40, 40);
    let mut program = ShaderProgram::build(&mut device, POSITION_VS, ORANGE_FS).unwrap();

    let layout = VertexLayout::packed(&[VertexFormat::Float32x3]).unwrap();
    let vertices: [[f32; 3]; 4] = [
        [0.5, 0.5, 0.0],
        [0.5, -0.5, 0.0],
        [-0.5, -0.5, 0.0],
        [-0.5, 0.5, 0.0],
    ];
    let indices = [0u32, 1, 3, 1, 2, 3];
    let binding = VertexLayoutBinding::from_vertices(
        &mut device,
        layout,
        &vertices,
        Some(&indices),
        PrimitiveTopology::TriangleList,
    )
    .unwrap();
    assert_eq!(binding.draw_count(), 6);

    let mut platform = HeadlessPlatform::new(40, 40);
    RenderLoop::new()
        .clear_color(CLEAR)
        .max_frames(1)
        .run(&mut platform, &mut device, &mut program, &binding)
        .unwrap();

    // The quad spans pixels 10..30 on both axes.
    let frame = device.presented();
    assert_eq!(frame.count(ORANGE, 1e-3), 20 * 20);
    assert!(approx(frame.pixel(5, 5).unwrap(), CLEAR));
    assert!(approx(frame.pixel(20, 20).unwrap(), ORANGE));
    assert_eq!(device.frame_stats().triangles, 2);

    program.release(&mut device);
}

#[test]
fn time_uniform_is_applied_in_the_same_frame() {
    let mut device = SoftwareDevice::new(32, 32);
    let mut program = ShaderProgram::build(&mut device, COLOR_VS, TINT_FS)
        .unwrap()
        .with_policy(UniformPolicy::Strict);

    let layout =
        VertexLayout::packed(&[VertexFormat::Float32x3, VertexFormat::Float32x3]).unwrap();
    let vertices: [[f32; 6]; 3] = [
        [-1.0, -1.0, 0.0, 1.0, 0.0, 0.0],
        [3.0, -1.0, 0.0, 1.0, 0.0, 0.0],
        [-1.0, 3.0, 0.0, 1.0, 0.0, 0.0],
    ];
    let binding = VertexLayoutBinding::from_vertices(
        &mut device,
        layout,
        &vertices,
        None,
        PrimitiveTopology::TriangleList,
    )
    .unwrap();

    let mut platform = HeadlessPlatform::new(32, 32);
    RenderLoop::new()
        .max_frames(1)
        .on_frame(|ctx| {
            ctx.set_uniform("ourColor", [0.0f32, 1.0, 0.0, 1.0]).unwrap();
            LoopControl::Continue
        })
        .run(&mut platform, &mut device, &mut program, &binding)
        .unwrap();

    let expected = Color::new(0.5, 0.5, 0.0, 1.0);
    assert_eq!(device.presented().count(expected, 1e-3), 32 * 32);

    program.release(&mut device);
}

#[test]
fn unknown_uniform_changes_nothing() {
    let mut device = SoftwareDevice::new(24, 24);
    let mut program = ShaderProgram::build(&mut device, POSITION_VS, ORANGE_FS).unwrap();
    let binding = triangle(&mut device);

    let mut platform = HeadlessPlatform::new(24, 24);
    RenderLoop::new()
        .clear_color(CLEAR)
        .max_frames(1)
        .run(&mut platform, &mut device, &mut program, &binding)
        .unwrap();
    let before = device.presented().to_rgba8();

    program
        .set_uniform(&mut device, "doesNotExist", 4.0f32)
        .unwrap();

    let mut platform = HeadlessPlatform::new(24, 24);
    RenderLoop::new()
        .clear_color(CLEAR)
        .max_frames(1)
        .run(&mut platform, &mut device, &mut program, &binding)
        .unwrap();
    assert_eq!(device.presented().to_rgba8(), before);

    program.release(&mut device);
}

#[test]
fn resize_renders_into_new_dimensions() {
    let mut device = SoftwareDevice::new(20, 20);
    let mut program = ShaderProgram::build(&mut device, POSITION_VS, ORANGE_FS).unwrap();
    let binding = triangle(&mut device);

    let mut platform = HeadlessPlatform::new(20, 20).resize_after(1, 50, 30);
    RenderLoop::new()
        .clear_color(CLEAR)
        .max_frames(2)
        .run(&mut platform, &mut device, &mut program, &binding)
        .unwrap();

    let frame = device.presented();
    assert_eq!((frame.width(), frame.height()), (50, 30));
    assert_eq!(device.surface_size(), (50, 30));
    assert!(approx(frame.pixel(25, 15).unwrap(), ORANGE));
    assert!(approx(frame.pixel(49, 29).unwrap(), CLEAR));

    program.release(&mut device);
}

#[test]
fn escape_stops_within_one_iteration() {
    let mut device = SoftwareDevice::new(8, 8);
    let mut program = ShaderProgram::build(&mut device, POSITION_VS, ORANGE_FS).unwrap();
    let binding = triangle(&mut device);

    let mut platform = HeadlessPlatform::new(8, 8).press_after(4, Key::Escape);
    let summary = RenderLoop::new()
        .max_frames(100)
        .run(&mut platform, &mut device, &mut program, &binding)
        .unwrap();

    assert_eq!(summary.reason, StopReason::ExitKey);
    assert_eq!(summary.frames, 5);
    assert_eq!(device.frames_presented(), 5);

    program.release(&mut device);
}

#[test]
fn failed_link_leaves_no_device_objects() {
    let mut device = SoftwareDevice::new(8, 8);
    let fs = "
@fragment
fn fs_main(@location(3) missing: vec4<f32>) -> @location(0) vec4<f32> {
    return missing;
}
";
    let program = ShaderProgram::new(&mut device, POSITION_VS, fs);

    assert_eq!(program.status(), ProgramStatus::Failed);
    assert!(!program.link_log().is_empty());
    assert!(matches!(program.errors(), [ShaderError::Link { .. }]));
    assert_eq!(device.live_programs(), 0);
    assert_eq!(device.live_stages(), 0);
}

#[test]
fn compile_failures_release_stages_and_name_the_stage() {
    let mut device = SoftwareDevice::new(8, 8);
    let program = ShaderProgram::new(&mut device, POSITION_VS, "@fragment fn fs_main() -> {");

    assert_eq!(program.status(), ProgramStatus::Failed);
    assert!(program.vertex_log().is_empty());
    assert!(!program.fragment_log().is_empty());
    let message = program.errors()[0].to_string();
    assert!(message.starts_with("fragment shader failed to compile"));
    assert_eq!(device.live_stages(), 0);
    assert_eq!(device.live_programs(), 0);
}

#[test]
fn strict_policy_reports_unknown_uniforms() {
    let mut device = SoftwareDevice::new(8, 8);
    let mut program = ShaderProgram::build(&mut device, POSITION_VS, ORANGE_FS)
        .unwrap()
        .with_policy(UniformPolicy::Strict);

    let err = program.set_uniform(&mut device, "ourColor", 1.0f32).unwrap_err();
    assert_eq!(
        err,
        ShaderError::UnknownUniform {
            name: "ourColor".to_string()
        }
    );

    program.release(&mut device);
}

#[test]
fn glsl_sources_link() {
    let mut device = SoftwareDevice::new(8, 8);
    let mut program = ShaderProgram::new(&mut device, GLSL_VS, GLSL_FS);

    assert_eq!(program.status(), ProgramStatus::Linked, "{:?}", program.errors());
    let inputs = program.vertex_inputs(&device).unwrap();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].location, 0);

    program.release(&mut device);
}

#[test]
fn integer_uniform_arithmetic_truncates() {
    let fs = "
struct Params {
    n: i32,
}
@group(0) @binding(0) var<uniform> u: Params;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    let q = u.n / 2;
    return vec4<f32>(f32(q) / 4.0, 0.0, 0.0, 1.0);
}
";
    let mut device = SoftwareDevice::new(16, 16);
    let mut program = ShaderProgram::build(&mut device, POSITION_VS, fs)
        .unwrap()
        .with_policy(UniformPolicy::Strict);
    program.set_uniform(&mut device, "n", 7).unwrap();
    let binding = triangle(&mut device);

    let mut platform = HeadlessPlatform::new(16, 16);
    RenderLoop::new()
        .clear_color(CLEAR)
        .max_frames(1)
        .run(&mut platform, &mut device, &mut program, &binding)
        .unwrap();

    let expected = Color::new(0.75, 0.0, 0.0, 1.0);
    assert!(approx(device.presented().pixel(8, 8).unwrap(), expected));

    program.release(&mut device);
}

const GLSL_COLOR_VS: &str = "#version 450
layout(location = 0) in vec3 aPos;
layout(location = 1) in vec3 aColor;
layout(location = 0) out vec3 vertexColor;

void main() {
    gl_Position = vec4(aPos, 1.0);
    vertexColor = aColor;
}
";

const GLSL_TINT_FS: &str = "#version 450
layout(location = 0) in vec3 vertexColor;
layout(location = 0) out vec4 FragColor;

layout(std140, binding = 0) uniform Colors {
    vec4 ourColor;
};

void main() {
    FragColor = 0.5 * (vec4(vertexColor, 1.0) + ourColor);
}
";

#[test]
fn glsl_uniform_block_is_set_by_member_name() {
    let mut device = SoftwareDevice::new(16, 16);
    let mut program = ShaderProgram::build(&mut device, GLSL_COLOR_VS, GLSL_TINT_FS)
        .unwrap()
        .with_policy(UniformPolicy::Strict);

    let layout =
        VertexLayout::packed(&[VertexFormat::Float32x3, VertexFormat::Float32x3]).unwrap();
    let vertices: [[f32; 6]; 3] = [
        [-1.0, -1.0, 0.0, 1.0, 0.0, 0.0],
        [3.0, -1.0, 0.0, 1.0, 0.0, 0.0],
        [-1.0, 3.0, 0.0, 1.0, 0.0, 0.0],
    ];
    let binding = VertexLayoutBinding::from_vertices(
        &mut device,
        layout,
        &vertices,
        None,
        PrimitiveTopology::TriangleList,
    )
    .unwrap();

    let mut platform = HeadlessPlatform::new(16, 16);
    RenderLoop::new()
        .max_frames(1)
        .on_frame(|ctx| {
            ctx.set_uniform("ourColor", [0.0f32, 1.0, 0.0, 1.0]).unwrap();
            LoopControl::Continue
        })
        .run(&mut platform, &mut device, &mut program, &binding)
        .unwrap();

    let expected = Color::new(0.5, 0.5, 0.0, 1.0);
    assert_eq!(device.presented().count(expected, 1e-3), 16 * 16);

    program.release(&mut device);
}

#[test]
fn texture_samplers_are_rejected_at_link() {
    let fs = "
@group(0) @binding(1) var texture1: texture_2d<f32>;
@group(0) @binding(2) var texture1_sampler: sampler;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return textureSample(texture1, texture1_sampler, vec2<f32>(0.5, 0.5));
}
";
    let mut device = SoftwareDevice::new(8, 8);
    let mut program =
        ShaderProgram::new(&mut device, POSITION_VS, fs).with_policy(UniformPolicy::Strict);

    assert_eq!(program.status(), ProgramStatus::Failed);
    assert!(program.link_log().contains("'texture1'"), "{}", program.link_log());
    assert_eq!(
        program.set_uniform(&mut device, "texture1", 0),
        Err(ShaderError::NotLinked)
    );
    assert_eq!(device.live_programs(), 0);
    assert_eq!(device.live_stages(), 0);
}
