/// Shader modules and the binding remap
///
/// Engine shaders select the resource kind with the WGSL group (0 constant
/// buffers, 1 textures, 2 samplers) and use the binding number as the
/// per-stage slot. Vulkan sees one descriptor set for the whole pipeline,
/// so each `DescriptorSet` / `Binding` decoration pair is rewritten to set
/// 0 and a binding unique to (stage, kind, slot) before the module is
/// created.

use ash::vk;
use prism_3d_engine::prism3d::device::{ShaderModule, ShaderStage};
use prism_3d_engine::prism3d::Result;
use prism_3d_engine::{engine_bail, engine_err};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};

/// Slots available per stage and resource kind
pub(crate) const SLOTS_PER_KIND: u32 = 16;

const SPIRV_MAGIC: u32 = 0x0723_0203;
const SPIRV_HEADER_WORDS: usize = 5;
const OP_DECORATE: u32 = 71;
const DECORATION_BINDING: u32 = 33;
const DECORATION_DESCRIPTOR_SET: u32 = 34;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ResourceKind {
    Constant,
    Texture,
    Sampler,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Constant, ResourceKind::Texture, ResourceKind::Sampler];

    /// WGSL group a resource kind is declared in
    pub fn from_group(group: u32) -> Option<Self> {
        match group {
            0 => Some(ResourceKind::Constant),
            1 => Some(ResourceKind::Texture),
            2 => Some(ResourceKind::Sampler),
            _ => None,
        }
    }

    fn index(self) -> u32 {
        match self {
            ResourceKind::Constant => 0,
            ResourceKind::Texture => 1,
            ResourceKind::Sampler => 2,
        }
    }

    pub fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            ResourceKind::Constant => vk::DescriptorType::UNIFORM_BUFFER,
            ResourceKind::Texture => vk::DescriptorType::SAMPLED_IMAGE,
            ResourceKind::Sampler => vk::DescriptorType::SAMPLER,
        }
    }
}

pub(crate) fn stage_index(stage: ShaderStage) -> usize {
    match stage {
        ShaderStage::Vertex => 0,
        ShaderStage::Pixel => 1,
    }
}

pub(crate) fn stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Pixel => vk::ShaderStageFlags::FRAGMENT,
    }
}

/// Binding number in the pipeline's single descriptor set
pub(crate) fn descriptor_binding(stage: ShaderStage, kind: ResourceKind, slot: u32) -> u32 {
    (stage_index(stage) as u32 * 3 + kind.index()) * SLOTS_PER_KIND + slot
}

/// One resource a module reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResourceBinding {
    pub kind: ResourceKind,
    pub slot: u32,
    pub binding: u32,
}

/// Rewrite the resource decorations of `words` for `stage`
///
/// Returns the patched SPIR-V and the resources it declares, sorted by
/// binding.
pub(crate) fn remap_bindings(words: &[u32], stage: ShaderStage) -> Result<(Vec<u32>, Vec<ResourceBinding>)> {
    if words.len() < SPIRV_HEADER_WORDS || words[0] != SPIRV_MAGIC {
        engine_bail!(SOURCE, "Not a SPIR-V module ({} words)", words.len());
    }

    // target id -> position of the decoration's literal
    let mut sets: FxHashMap<u32, usize> = FxHashMap::default();
    let mut bindings: FxHashMap<u32, usize> = FxHashMap::default();

    let mut index = SPIRV_HEADER_WORDS;
    while index < words.len() {
        let word_count = (words[index] >> 16) as usize;
        let opcode = words[index] & 0xffff;
        if word_count == 0 || index + word_count > words.len() {
            engine_bail!(SOURCE, "Truncated SPIR-V instruction at word {}", index);
        }
        if opcode == OP_DECORATE && word_count >= 4 {
            let target = words[index + 1];
            match words[index + 2] {
                DECORATION_DESCRIPTOR_SET => {
                    sets.insert(target, index + 3);
                }
                DECORATION_BINDING => {
                    bindings.insert(target, index + 3);
                }
                _ => {}
            }
        }
        index += word_count;
    }

    let mut patched = words.to_vec();
    let mut resources = Vec::with_capacity(sets.len());
    for (target, set_position) in sets {
        let binding_position = bindings
            .get(&target)
            .copied()
            .ok_or_else(|| engine_err!(SOURCE, "Resource %{} has a descriptor set but no binding", target))?;
        let group = words[set_position];
        let slot = words[binding_position];

        let kind = match ResourceKind::from_group(group) {
            Some(kind) => kind,
            None => engine_bail!(SOURCE, "Resource %{} uses group {}, expected 0, 1 or 2", target, group),
        };
        if slot >= SLOTS_PER_KIND {
            engine_bail!(SOURCE, "{:?} slot {} exceeds the {} slots per stage", kind, slot, SLOTS_PER_KIND);
        }

        let binding = descriptor_binding(stage, kind, slot);
        patched[set_position] = 0;
        patched[binding_position] = binding;
        resources.push(ResourceBinding { kind, slot, binding });
    }
    resources.sort_by_key(|resource| resource.binding);

    Ok((patched, resources))
}

// ============================================================================
// MODULE
// ============================================================================

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

pub struct VulkanShaderModule {
    ctx: Arc<GpuContext>,
    stage: ShaderStage,
    word_count: usize,
    pub(crate) module: vk::ShaderModule,
    pub(crate) resources: Vec<ResourceBinding>,
    /// Process-unique id; pipelines are cached by it, never by handle
    pub(crate) id: u64,
}

impl VulkanShaderModule {
    pub(crate) fn new(ctx: Arc<GpuContext>, stage: ShaderStage, spirv: &[u32]) -> Result<Self> {
        let (code, resources) = remap_bindings(spirv, stage)?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe {
            ctx.device.create_shader_module(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create {:?} shader module: {:?}", stage, e))?
        };
        Ok(Self {
            ctx,
            stage,
            word_count: spirv.len(),
            module,
            resources,
            id: NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed),
        })
    }
}

impl ShaderModule for VulkanShaderModule {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn word_count(&self) -> usize {
        self.word_count
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
