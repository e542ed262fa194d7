//! SPIR-V reflection
//!
//! Reads a compiled stage with spirq and extracts what the engine binds
//! by name: uniform blocks (constant buffers), sampled textures, samplers
//! and the stage's interface signature.
//!
//! Slot convention: the descriptor `binding` is the slot number; each
//! kind (constant buffer, texture, sampler) has its own slot space per
//! stage, the way constant, resource and sampler registers are separate.

use crate::error::Result;
use crate::engine_err;
use crate::graphics_device::ShaderStage;

const SOURCE: &str = "prism3d::Reflection";

/// Constant buffer size granularity in bytes
pub const CBUFFER_ALIGNMENT: u32 = 16;

const SPIRV_MAGIC: u32 = 0x0723_0203;
const SPIRV_HEADER_WORDS: usize = 5;

// ============================================================================
// TYPES
// ============================================================================

/// Scalar kind of a signature element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Float,
    Int,
    UInt,
    Bool,
}

/// Type of one interface element (scalar or vector)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureType {
    pub scalar: ScalarKind,
    pub components: u32,
}

/// One user-defined stage input or output (builtins are not reported)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParam {
    pub name: String,
    pub location: u32,
    /// `None` for interface types other than scalars and vectors
    pub ty: Option<SignatureType>,
}

/// One named field of a constant buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CBufferField {
    pub name: String,
    pub offset: u32,
    /// Bytes up to the next field (or the end of the buffer)
    pub size: u32,
}

/// Layout of one constant buffer of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CBufferLayout {
    pub name: String,
    pub stage: ShaderStage,
    pub slot: u32,
    /// Total byte size, a multiple of `CBUFFER_ALIGNMENT`
    pub size: u32,
    /// Fields in declaration (offset) order
    pub fields: Vec<CBufferField>,
}

/// A named texture or sampler slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    pub name: String,
    pub stage: ShaderStage,
    pub slot: u32,
}

/// Everything reflected from one compiled stage
#[derive(Debug, Clone)]
pub struct StageReflection {
    pub stage: ShaderStage,
    /// Sorted by location
    pub inputs: Vec<SignatureParam>,
    /// Sorted by location
    pub outputs: Vec<SignatureParam>,
    pub cbuffers: Vec<CBufferLayout>,
    pub textures: Vec<ResourceSlot>,
    pub samplers: Vec<ResourceSlot>,
}

// ============================================================================
// REFLECTION
// ============================================================================

/// Reflect the stage entry point (`vs_main` / `ps_main`) of a SPIR-V module
pub fn reflect_stage(spirv: &[u32], stage: ShaderStage) -> Result<StageReflection> {
    check_module_words(spirv)?;
    let entry_points = spirq::ReflectConfig::new()
        .spv(spirv)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!(SOURCE, "SPIR-V reflection failed: {:?}", e))?;

    let entry_name = stage.entry_point();
    let entry_point = entry_points
        .iter()
        .find(|ep| ep.name == entry_name)
        .ok_or_else(|| engine_err!(SOURCE, "Entry point '{}' missing from SPIR-V", entry_name))?;

    let mut reflection = StageReflection {
        stage,
        inputs: Vec::new(),
        outputs: Vec::new(),
        cbuffers: Vec::new(),
        textures: Vec::new(),
        samplers: Vec::new(),
    };

    for var in entry_point.vars.iter() {
        match var {
            spirq::var::Variable::Input { name, location, ty } => {
                reflection.inputs.push(SignatureParam {
                    name: name.clone().unwrap_or_default(),
                    location: location.loc(),
                    ty: signature_type(ty),
                });
            }
            spirq::var::Variable::Output { name, location, ty } => {
                reflection.outputs.push(SignatureParam {
                    name: name.clone().unwrap_or_default(),
                    location: location.loc(),
                    ty: signature_type(ty),
                });
            }
            spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, ty, .. } => {
                use spirq::ty::DescriptorType;
                let name = name.clone().unwrap_or_default();
                let slot = desc_bind.bind();
                match desc_ty {
                    DescriptorType::UniformBuffer() => {
                        reflection.cbuffers.push(cbuffer_layout(&name, stage, slot, ty));
                    }
                    DescriptorType::SampledImage() => {
                        reflection.textures.push(ResourceSlot { name, stage, slot });
                    }
                    DescriptorType::Sampler() => {
                        reflection.samplers.push(ResourceSlot { name, stage, slot });
                    }
                    DescriptorType::CombinedImageSampler() => {
                        reflection.textures.push(ResourceSlot { name: name.clone(), stage, slot });
                        reflection.samplers.push(ResourceSlot { name, stage, slot });
                    }
                    other => {
                        return Err(engine_err!(SOURCE,
                            "Unsupported descriptor type {:?} for '{}'", other, name));
                    }
                }
            }
            _ => {}
        }
    }

    reflection.inputs.sort_by_key(|p| p.location);
    reflection.outputs.sort_by_key(|p| p.location);
    reflection.cbuffers.sort_by_key(|cb| cb.slot);
    Ok(reflection)
}

/// Reject streams the reflector would index out of bounds
///
/// Checks the magic number, the five-word header and that every
/// instruction's word count stays inside the stream.
fn check_module_words(spirv: &[u32]) -> Result<()> {
    if spirv.len() < SPIRV_HEADER_WORDS {
        return Err(engine_err!(SOURCE, "SPIR-V stream too short: {} words", spirv.len()));
    }
    if spirv[0] != SPIRV_MAGIC {
        return Err(engine_err!(SOURCE, "Bad SPIR-V magic number {:#010x}", spirv[0]));
    }
    let mut cursor = SPIRV_HEADER_WORDS;
    while cursor < spirv.len() {
        let word_count = (spirv[cursor] >> 16) as usize;
        if word_count == 0 || cursor + word_count > spirv.len() {
            return Err(engine_err!(SOURCE,
                "Truncated SPIR-V instruction at word {} (count {})", cursor, word_count));
        }
        cursor += word_count;
    }
    Ok(())
}

fn scalar_kind(scalar_ty: &spirq::ty::ScalarType) -> Option<ScalarKind> {
    use spirq::ty::ScalarType;
    match scalar_ty {
        ScalarType::Float { .. } => Some(ScalarKind::Float),
        ScalarType::Integer { is_signed: true, .. } => Some(ScalarKind::Int),
        ScalarType::Integer { is_signed: false, .. } => Some(ScalarKind::UInt),
        ScalarType::Boolean => Some(ScalarKind::Bool),
        ScalarType::Void => None,
    }
}

fn signature_type(ty: &spirq::ty::Type) -> Option<SignatureType> {
    use spirq::ty::Type;
    match ty {
        Type::Scalar(s) => Some(SignatureType { scalar: scalar_kind(s)?, components: 1 }),
        Type::Vector(v) => Some(SignatureType {
            scalar: scalar_kind(&v.scalar_ty)?,
            components: v.nscalar,
        }),
        _ => None,
    }
}

fn align_up(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

/// Named members of a uniform block, with offsets relative to the block
///
/// The SPIR-V writer wraps every uniform struct in a block holding one
/// unnamed member; that wrapper is looked through so fields keep their
/// source names.
fn block_members(name: &str, ty: &spirq::ty::Type, base: u32) -> Vec<(String, u32, u32)> {
    match ty {
        spirq::ty::Type::Struct(st) => {
            if let [only] = st.members.as_slice() {
                let wrapper = only.name.as_deref().map_or(true, |member| member == name);
                if wrapper && matches!(only.ty, spirq::ty::Type::Struct(_)) {
                    return block_members(name, &only.ty, base + only.offset.unwrap_or(0) as u32);
                }
            }
            st.members
                .iter()
                .map(|m| {
                    (
                        m.name.clone().unwrap_or_else(|| name.to_string()),
                        base + m.offset.unwrap_or(0) as u32,
                        m.ty.nbyte().unwrap_or(0) as u32,
                    )
                })
                .collect()
        }
        // A non-struct block is a single field named after the variable
        other => vec![(name.to_string(), base, other.nbyte().unwrap_or(0) as u32)],
    }
}

/// Field list of a uniform block; each field spans up to the next offset
fn cbuffer_layout(name: &str, stage: ShaderStage, slot: u32, ty: &spirq::ty::Type) -> CBufferLayout {
    let mut members = block_members(name, ty, 0);
    members.sort_by_key(|(_, offset, _)| *offset);

    let natural_end = members
        .iter()
        .map(|(_, offset, size)| offset + size)
        .max()
        .unwrap_or(0);
    let declared = ty.nbyte().map(|n| n as u32).unwrap_or(0).max(natural_end);
    let size = align_up(declared.max(1), CBUFFER_ALIGNMENT);

    let fields = members
        .iter()
        .enumerate()
        .map(|(i, (field_name, offset, _))| {
            let end = members.get(i + 1).map(|(_, next, _)| *next).unwrap_or(size);
            CBufferField { name: field_name.clone(), offset: *offset, size: end - offset }
        })
        .collect();

    CBufferLayout { name: name.to_string(), stage, slot, size, fields }
}

#[cfg(test)]
#[path = "reflection_tests.rs"]
mod tests;
