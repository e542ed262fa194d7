/// Fixed-function state, vertex input layout and shader module types

// ===== SHADER STAGES =====

/// Programmable stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    /// File-name suffix used by shader sources (`<name>_vs.wgsl`)
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "_vs",
            ShaderStage::Pixel => "_ps",
        }
    }

    /// Entry-point function name expected in the stage source
    pub fn entry_point(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Pixel => "ps_main",
        }
    }
}

/// Compiled stage program living on the device
pub trait ShaderModule: Send + Sync {
    fn stage(&self) -> ShaderStage;

    /// Size of the SPIR-V the module was created from, in 32-bit words
    fn word_count(&self) -> usize;

    fn as_any(&self) -> &dyn std::any::Any;
}

// ===== INPUT ASSEMBLY =====

/// Primitive topology
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrimitiveTopology {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices (max 65535 vertices)
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Vertex attribute data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn size_bytes(&self) -> u32 {
        self.components() * 4
    }

    /// Number of f32 components
    pub fn components(&self) -> u32 {
        match self {
            VertexFormat::Float32 => 1,
            VertexFormat::Float32x2 => 2,
            VertexFormat::Float32x3 => 3,
            VertexFormat::Float32x4 => 4,
        }
    }
}

/// One named vertex attribute, bound to the shader input at `location`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    pub semantic: String,
    pub format: VertexFormat,
    pub location: u32,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Interleaved vertex input layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub attributes: Vec<VertexAttribute>,
    /// Bytes between consecutive vertices
    pub stride: u32,
}

impl VertexLayout {
    /// Build a tightly packed layout; locations follow declaration order
    pub fn packed(semantics: &[(&str, VertexFormat)]) -> Self {
        let mut offset = 0;
        let attributes = semantics
            .iter()
            .enumerate()
            .map(|(location, (semantic, format))| {
                let attribute = VertexAttribute {
                    semantic: semantic.to_string(),
                    format: *format,
                    location: location as u32,
                    offset,
                };
                offset += format.size_bytes();
                attribute
            })
            .collect();
        Self { attributes, stride: offset }
    }

    /// POSITION / NORMAL / TANGENT / TEXCOORD, the layout of every built-in mesh
    pub fn standard() -> Self {
        Self::packed(&[
            ("POSITION", VertexFormat::Float32x3),
            ("NORMAL", VertexFormat::Float32x3),
            ("TANGENT", VertexFormat::Float32x3),
            ("TEXCOORD", VertexFormat::Float32x2),
        ])
    }
}

// ===== RASTERIZATION =====

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Polygon fill mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Solid,
    Wireframe,
}

/// Rasterizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterizerDesc {
    pub cull_mode: CullMode,
    pub fill_mode: FillMode,
    pub depth_clip: bool,
}

impl RasterizerDesc {
    pub fn new(cull_mode: CullMode, fill_mode: FillMode, depth_clip: bool) -> Self {
        Self { cull_mode, fill_mode, depth_clip }
    }
}

// ===== DEPTH/STENCIL =====

/// Comparison operator for depth tests and comparison samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Depth-stencil state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilDesc {
    pub depth_test: bool,
    pub depth_write: bool,
    pub compare: CompareOp,
    pub stencil_test: bool,
}

impl DepthStencilDesc {
    pub fn new(depth_test: bool, depth_write: bool, compare: CompareOp) -> Self {
        Self { depth_test, depth_write, compare, stencil_test: false }
    }
}
