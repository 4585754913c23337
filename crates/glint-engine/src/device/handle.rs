use crate::vertex::VertexLayoutBinding;

/// Device-side shader stage object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StageHandle(pub(crate) u32);

/// Device-side program object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProgramHandle(pub(crate) u32);

/// Device-side buffer object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferHandle(pub(crate) u32);

impl StageHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl ProgramHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl BufferHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Resolved uniform slot of one program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation {
    pub(crate) program: ProgramHandle,
    pub(crate) slot: u32,
}

impl UniformLocation {
    pub fn program(self) -> ProgramHandle {
        self.program
    }
}

/// Proof that a program was made active on the device.
#[derive(Debug)]
pub struct BoundProgram {
    pub(crate) program: ProgramHandle,
}

impl BoundProgram {
    pub fn handle(&self) -> ProgramHandle {
        self.program
    }
}

/// Proof that a vertex binding was made active on the device.
#[derive(Debug)]
pub struct BoundVertices<'a> {
    pub(crate) binding: &'a VertexLayoutBinding,
}

impl<'a> BoundVertices<'a> {
    pub fn binding(&self) -> &'a VertexLayoutBinding {
        self.binding
    }
}

/// What the device holds in a buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferUsage {
    Vertex,
    /// `u32` indices.
    Index,
}

/// Result of a completed compile or link step.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BuildStatus {
    Success,
    /// Diagnostic log of the failed step.
    Failed(String),
}

impl BuildStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success)
    }
}

/// Outcome of `present`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PresentStatus {
    Presented,
    /// Transient surface problem; the frame was dropped.
    Skipped,
    /// The surface cannot be recovered.
    Lost,
}

/// Per-frame counters, reset by `present`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub triangles: u32,
    pub uniform_uploads: u32,
}
