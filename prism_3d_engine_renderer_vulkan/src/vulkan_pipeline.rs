/// Graphics pipelines built on demand from the command list's state
///
/// The engine sets fixed-function state piecemeal, D3D11 style; Vulkan
/// bakes it into pipeline objects. Every distinct combination seen at draw
/// time is built once and cached under a `PipelineKey`. All pipelines
/// share one layout: a single descriptor set with a binding for every
/// (stage, kind, slot), as produced by the shader binding remap.

use ash::vk;
use prism_3d_engine::prism3d::device::{
    DepthStencilDesc, PrimitiveTopology, RasterizerDesc, ShaderStage, VertexLayout,
};
use prism_3d_engine::prism3d::{Error, Result};
use prism_3d_engine::{engine_debug, engine_err, engine_error};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::{
    compare_op_to_vk, cull_mode_to_vk, polygon_mode_to_vk, topology_to_vk, vertex_format_to_vk,
};
use crate::vulkan_shader::{descriptor_binding, stage_to_vk, ResourceKind, SLOTS_PER_KIND};

/// Everything a pipeline object depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub vertex_shader: u64,
    pub pixel_shader: Option<u64>,
    /// (location, format, offset)
    pub attributes: Vec<(u32, vk::Format, u32)>,
    pub stride: u32,
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub polygon_mode: vk::PolygonMode,
    pub depth_clamp: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: vk::CompareOp,
    pub stencil_test: bool,
    pub color_formats: Vec<vk::Format>,
    pub depth_format: vk::Format,
}

impl PipelineKey {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vertex_shader: u64,
        pixel_shader: Option<u64>,
        layout: &VertexLayout,
        topology: PrimitiveTopology,
        rasterizer: &RasterizerDesc,
        depth_stencil: &DepthStencilDesc,
        color_formats: Vec<vk::Format>,
        depth_format: vk::Format,
        depth_clamp_supported: bool,
    ) -> Self {
        Self {
            vertex_shader,
            pixel_shader,
            attributes: layout
                .attributes
                .iter()
                .map(|a| (a.location, vertex_format_to_vk(a.format), a.offset))
                .collect(),
            stride: layout.stride,
            topology: topology_to_vk(topology),
            cull_mode: cull_mode_to_vk(rasterizer.cull_mode),
            polygon_mode: polygon_mode_to_vk(rasterizer.fill_mode),
            depth_clamp: !rasterizer.depth_clip && depth_clamp_supported,
            depth_test: depth_stencil.depth_test,
            depth_write: depth_stencil.depth_write,
            depth_compare: compare_op_to_vk(depth_stencil.compare),
            stencil_test: depth_stencil.stencil_test,
            color_formats,
            depth_format,
        }
    }
}

/// Descriptor set layout bindings covering every remapped resource
pub(crate) fn set_layout_bindings() -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    let mut bindings = Vec::new();
    for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
        for kind in ResourceKind::ALL {
            for slot in 0..SLOTS_PER_KIND {
                bindings.push(
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(descriptor_binding(stage, kind, slot))
                        .descriptor_type(kind.descriptor_type())
                        .descriptor_count(1)
                        .stage_flags(stage_to_vk(stage)),
                );
            }
        }
    }
    bindings
}

fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D16_UNORM_S8_UINT
    )
}

pub(crate) struct PipelineCache {
    ctx: Arc<GpuContext>,
    pub set_layout: vk::DescriptorSetLayout,
    pub layout: vk::PipelineLayout,
    pipelines: FxHashMap<PipelineKey, vk::Pipeline>,
}

impl PipelineCache {
    pub fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let bindings = set_layout_bindings();
            let set_layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            let set_layout = ctx.device.create_descriptor_set_layout(&set_layout_info, None)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to create descriptor set layout: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create descriptor set layout: {:?}", e))
                })?;

            let set_layouts = [set_layout];
            let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
            let layout = match ctx.device.create_pipeline_layout(&layout_info, None) {
                Ok(layout) => layout,
                Err(e) => {
                    ctx.device.destroy_descriptor_set_layout(set_layout, None);
                    engine_error!(SOURCE, "Failed to create pipeline layout: {:?}", e);
                    return Err(Error::InitializationFailed(format!("Failed to create pipeline layout: {:?}", e)));
                }
            };

            Ok(Self { ctx, set_layout, layout, pipelines: FxHashMap::default() })
        }
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Cached pipeline for `key`, built from the given modules on a miss
    pub fn get_or_create(
        &mut self,
        key: &PipelineKey,
        vertex_module: vk::ShaderModule,
        pixel_module: Option<vk::ShaderModule>,
    ) -> Result<vk::Pipeline> {
        if let Some(&pipeline) = self.pipelines.get(key) {
            return Ok(pipeline);
        }
        let pipeline = self.create(key, vertex_module, pixel_module)?;
        self.pipelines.insert(key.clone(), pipeline);
        engine_debug!(SOURCE, "Built pipeline #{} ({:?}, {} color targets)",
            self.pipelines.len(), key.topology, key.color_formats.len());
        Ok(pipeline)
    }

    fn create(
        &self,
        key: &PipelineKey,
        vertex_module: vk::ShaderModule,
        pixel_module: Option<vk::ShaderModule>,
    ) -> Result<vk::Pipeline> {
        let mut stages = vec![
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(c"vs_main"),
        ];
        if let Some(module) = pixel_module {
            stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .module(module)
                    .name(c"ps_main"),
            );
        }

        let vertex_bindings = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: key.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = key
            .attributes
            .iter()
            .map(|&(location, format, offset)| vk::VertexInputAttributeDescription {
                location,
                binding: 0,
                format,
                offset,
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(key.topology)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        // Negative-height viewports keep the engine's y-up clip space,
        // so clockwise stays clockwise on screen
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(key.depth_clamp)
            .rasterizer_discard_enable(false)
            .polygon_mode(key.polygon_mode)
            .cull_mode(key.cull_mode)
            .front_face(vk::FrontFace::CLOCKWISE)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let stencil = vk::StencilOpState {
            fail_op: vk::StencilOp::KEEP,
            pass_op: vk::StencilOp::KEEP,
            depth_fail_op: vk::StencilOp::KEEP,
            compare_op: vk::CompareOp::ALWAYS,
            compare_mask: 0xff,
            write_mask: 0xff,
            reference: 0,
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(key.depth_test)
            .depth_write_enable(key.depth_write)
            .depth_compare_op(key.depth_compare)
            .stencil_test_enable(key.stencil_test && has_stencil(key.depth_format))
            .front(stencil)
            .back(stencil);

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = key
            .color_formats
            .iter()
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .blend_enable(false)
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
            })
            .collect();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let stencil_format = if has_stencil(key.depth_format) {
            key.depth_format
        } else {
            vk::Format::UNDEFINED
        };
        let mut rendering = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&key.color_formats)
            .depth_attachment_format(key.depth_format)
            .stencil_attachment_format(stencil_format);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .push_next(&mut rendering);

        unsafe {
            self.ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map(|pipelines| pipelines[0])
                .map_err(|(_, e)| engine_err!(SOURCE, "Failed to create graphics pipeline: {:?}", e))
        }
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        unsafe {
            for (_, pipeline) in self.pipelines.drain() {
                self.ctx.device.destroy_pipeline(pipeline, None);
            }
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
            self.ctx.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
