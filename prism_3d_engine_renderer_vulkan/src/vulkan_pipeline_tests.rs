//! Unit tests for pipeline keys and the shared set layout (no GPU required)

use super::*;
use prism_3d_engine::prism3d::device::{CompareOp, CullMode, FillMode};

fn key(rasterizer: RasterizerDesc, depth_clamp_supported: bool) -> PipelineKey {
    PipelineKey::new(
        1,
        Some(2),
        &VertexLayout::standard(),
        PrimitiveTopology::TriangleList,
        &rasterizer,
        &DepthStencilDesc::new(true, true, CompareOp::LessOrEqual),
        vec![vk::Format::R16G16B16A16_SFLOAT],
        vk::Format::D32_SFLOAT,
        depth_clamp_supported,
    )
}

#[test]
fn test_key_translates_engine_state() {
    let key = key(RasterizerDesc::new(CullMode::Back, FillMode::Wireframe, true), true);

    assert_eq!(key.cull_mode, vk::CullModeFlags::BACK);
    assert_eq!(key.polygon_mode, vk::PolygonMode::LINE);
    assert_eq!(key.depth_compare, vk::CompareOp::LESS_OR_EQUAL);
    assert_eq!(key.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
    assert!(!key.depth_clamp);

    // position, normal, tangent, uv
    assert_eq!(key.stride, 44);
    assert_eq!(key.attributes[3], (3, vk::Format::R32G32_SFLOAT, 36));
}

#[test]
fn test_depth_clamp_needs_device_support() {
    let no_clip = RasterizerDesc::new(CullMode::None, FillMode::Solid, false);
    assert!(key(no_clip, true).depth_clamp);
    assert!(!key(no_clip, false).depth_clamp);
}

#[test]
fn test_keys_differ_by_state() {
    let solid = key(RasterizerDesc::new(CullMode::Back, FillMode::Solid, true), true);
    let wire = key(RasterizerDesc::new(CullMode::Back, FillMode::Wireframe, true), true);
    assert_ne!(solid, wire);
    assert_eq!(solid, solid.clone());

    let mut lines = solid.clone();
    lines.topology = topology_to_vk(PrimitiveTopology::LineList);
    assert_ne!(solid, lines);
}

#[test]
fn test_set_layout_covers_every_slot() {
    let bindings = set_layout_bindings();
    assert_eq!(bindings.len(), (2 * 3 * SLOTS_PER_KIND) as usize);

    let texture = descriptor_binding(ShaderStage::Pixel, ResourceKind::Texture, 5);
    let entry = bindings.iter().find(|b| b.binding == texture).unwrap();
    assert_eq!(entry.descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);
    assert_eq!(entry.stage_flags, vk::ShaderStageFlags::FRAGMENT);

    let constant = descriptor_binding(ShaderStage::Vertex, ResourceKind::Constant, 0);
    let entry = bindings.iter().find(|b| b.binding == constant).unwrap();
    assert_eq!(entry.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(entry.stage_flags, vk::ShaderStageFlags::VERTEX);
}

#[test]
fn test_stencil_formats() {
    assert!(has_stencil(vk::Format::D24_UNORM_S8_UINT));
    assert!(!has_stencil(vk::Format::D32_SFLOAT));
    assert!(!has_stencil(vk::Format::UNDEFINED));
}
