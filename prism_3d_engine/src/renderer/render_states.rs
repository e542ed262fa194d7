/// Render states created once at start-up
///
/// The renderer registers each variant in its state tables in declaration
/// order, so a variant maps to a fixed handle for the renderer's lifetime.

use crate::graphics_device::{
    AddressMode, CompareOp, CullMode, DepthStencilDesc, FillMode, Filter, RasterizerDesc, SamplerDesc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultRasterizerState {
    CullNone,
    CullFront,
    CullBack,
    Wireframe,
}

impl DefaultRasterizerState {
    pub const ALL: [DefaultRasterizerState; 4] = [
        Self::CullNone,
        Self::CullFront,
        Self::CullBack,
        Self::Wireframe,
    ];

    pub fn desc(self) -> RasterizerDesc {
        match self {
            Self::CullNone => RasterizerDesc::new(CullMode::None, FillMode::Solid, true),
            Self::CullFront => RasterizerDesc::new(CullMode::Front, FillMode::Solid, true),
            Self::CullBack => RasterizerDesc::new(CullMode::Back, FillMode::Solid, true),
            Self::Wireframe => RasterizerDesc::new(CullMode::None, FillMode::Wireframe, true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultDepthStencilState {
    DepthDisabled,
    /// Test and write, less-or-equal
    DepthWrite,
    /// Test without writing (light markers, transparent passes)
    DepthTestOnly,
}

impl DefaultDepthStencilState {
    pub const ALL: [DefaultDepthStencilState; 3] = [
        Self::DepthDisabled,
        Self::DepthWrite,
        Self::DepthTestOnly,
    ];

    pub fn desc(self) -> DepthStencilDesc {
        match self {
            Self::DepthDisabled => DepthStencilDesc::new(false, false, CompareOp::Always),
            Self::DepthWrite => DepthStencilDesc::new(true, true, CompareOp::LessOrEqual),
            Self::DepthTestOnly => DepthStencilDesc::new(true, false, CompareOp::LessOrEqual),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultSampler {
    LinearWrap,
    LinearClamp,
    PointClamp,
    /// Depth comparison sampler for shadow maps
    ShadowCompare,
}

impl DefaultSampler {
    pub const ALL: [DefaultSampler; 4] = [
        Self::LinearWrap,
        Self::LinearClamp,
        Self::PointClamp,
        Self::ShadowCompare,
    ];

    pub fn desc(self) -> SamplerDesc {
        match self {
            Self::LinearWrap => SamplerDesc::new(Filter::Linear, AddressMode::Wrap),
            Self::LinearClamp => SamplerDesc::new(Filter::Linear, AddressMode::Clamp),
            Self::PointClamp => SamplerDesc::new(Filter::Point, AddressMode::Clamp),
            Self::ShadowCompare => SamplerDesc {
                compare: Some(CompareOp::LessOrEqual),
                ..SamplerDesc::new(Filter::Linear, AddressMode::Border)
            },
        }
    }
}
