/// Geometry / lighting pass
///
/// Forward: every visible object is lit directly into the world colour
/// target with the shader of the active lighting model.
///
/// Deferred: objects write a G-buffer (normal + model tag, diffuse +
/// roughness, specular + metalness) and the scene depth, optionally
/// followed by screen-space ambient occlusion, then a full-screen quad
/// lights every pixel into the world colour target.
///
/// Both paths then draw the scene's skybox behind the opaque objects and
/// finish with the overlays: light source markers and tangent frames,
/// drawn unlit and depth-tested against the scene.

use glam::{Mat4, Vec3};
use rdst::RadixSort;
use crate::error::{Error, Result};
use crate::engine_error;
use crate::graphics_device::TextureFormat;
use crate::material::MaterialId;
use crate::renderer::{DefaultDepthStencilState, DefaultRasterizerState, DefaultSampler, Renderer};
use crate::resource::{BuiltinMesh, DepthTargetId, RenderTargetId, TextureId};
use crate::scene::{DrawRequest, LightKind, RenderSettings};
use super::ambient_occlusion::AmbientOcclusionPass;
use super::shader_library::ShaderLibrary;
use super::{set_light_constants, FrameContext};

const SOURCE: &str = "prism3d::GeometryPass";

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const MARKER_SCALE: f32 = 0.5;
/// Object-space length of the tangent frame segments
const TBN_LINE_LENGTH: f32 = 0.2;
/// Tangent red, bitangent green, normal blue
const TBN_COLORS: [Vec3; 3] = [Vec3::X, Vec3::Y, Vec3::Z];

/// Deferred geometry targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBuffer {
    pub normal: RenderTargetId,
    pub diffuse_roughness: RenderTargetId,
    pub specular_metalness: RenderTargetId,
}

impl GBuffer {
    fn create(renderer: &mut Renderer, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            normal: create_color_target(renderer, width, height, TextureFormat::R32G32B32A32_FLOAT)?,
            diffuse_roughness: create_color_target(renderer, width, height, TextureFormat::R8G8B8A8_UNORM)?,
            specular_metalness: create_color_target(renderer, width, height, TextureFormat::R8G8B8A8_UNORM)?,
        })
    }

    fn targets(&self) -> [RenderTargetId; 3] {
        [self.normal, self.diffuse_roughness, self.specular_metalness]
    }

    fn destroy(&self, renderer: &mut Renderer) {
        for target in self.targets() {
            renderer.destroy_render_target(target);
        }
    }
}

pub struct GeometryPass {
    world_target: RenderTargetId,
    depth_target: DepthTargetId,
    gbuffer: GBuffer,
    ambient_occlusion: AmbientOcclusionPass,
    size: (u32, u32),
}

impl GeometryPass {
    pub fn new(renderer: &mut Renderer, width: u32, height: u32) -> Result<Self> {
        let world_target = create_color_target(renderer, width, height, TextureFormat::R16G16B16A16_FLOAT)?;
        let depth_target = renderer.create_depth_target(width, height);
        if !depth_target.is_valid() {
            let message = format!("cannot create the {}x{} scene depth target", width, height);
            engine_error!(SOURCE, "{}", message);
            return Err(Error::InitializationFailed(message));
        }
        let gbuffer = GBuffer::create(renderer, width, height)?;
        let ambient_occlusion = AmbientOcclusionPass::new(renderer, width, height)?;
        Ok(Self { world_target, depth_target, gbuffer, ambient_occlusion, size: (width, height) })
    }

    /// Recreate every size-dependent target
    pub fn resize(&mut self, renderer: &mut Renderer, width: u32, height: u32) -> Result<()> {
        if (width, height) == self.size {
            return Ok(());
        }
        let fresh = Self::new(renderer, width, height)?;
        self.destroy(renderer);
        *self = fresh;
        Ok(())
    }

    pub fn destroy(&self, renderer: &mut Renderer) {
        renderer.destroy_render_target(self.world_target);
        renderer.destroy_depth_target(self.depth_target);
        self.gbuffer.destroy(renderer);
        self.ambient_occlusion.destroy(renderer);
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn world_target(&self) -> RenderTargetId {
        self.world_target
    }

    /// Lit scene colour read by the post-process pass
    pub fn world_texture(&self, renderer: &Renderer) -> TextureId {
        renderer.render_target_texture(self.world_target)
    }

    pub fn depth_target(&self) -> DepthTargetId {
        self.depth_target
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    pub fn ambient_occlusion(&self) -> &AmbientOcclusionPass {
        &self.ambient_occlusion
    }

    /// Draw the visible objects, forward or deferred per the frame's view;
    /// returns the number of objects drawn
    pub fn render(
        &self,
        renderer: &mut Renderer,
        shaders: &ShaderLibrary,
        frame: &FrameContext,
        shadow_map: TextureId,
    ) -> Result<usize> {
        let draws = sort_by_material(frame.scene.render_list());
        let drawn = if frame.view.is_deferred {
            self.render_deferred(renderer, shaders, frame, shadow_map, &draws)?
        } else {
            self.render_forward(renderer, shaders, frame, shadow_map, &draws)?
        };
        self.render_skybox(renderer, shaders, frame)?;
        self.render_overlays(renderer, shaders, frame, &draws)?;
        Ok(drawn)
    }

    // ===== FORWARD =====

    fn render_forward(
        &self,
        renderer: &mut Renderer,
        shaders: &ShaderLibrary,
        frame: &FrameContext,
        shadow_map: TextureId,
        draws: &[DrawRequest],
    ) -> Result<usize> {
        renderer.begin_event("Forward");
        renderer.bind_render_targets(&[self.world_target], self.depth_target)?;
        renderer.begin(CLEAR_COLOR, 1.0)?;

        renderer.set_shader(shaders.forward(frame.settings.use_brdf_lighting))?;
        set_opaque_states(renderer)?;
        renderer.set_constant("view_proj", &frame.view.view_projection);
        renderer.set_constant("camera_position", &frame.view.camera_position);
        set_light_constants(renderer, frame.lighting);
        renderer.set_texture("shadow_map", shadow_map);
        let linear = renderer.default_sampler(DefaultSampler::LinearWrap);
        renderer.set_sampler("linear_sampler", linear);
        let shadow = renderer.default_sampler(DefaultSampler::ShadowCompare);
        renderer.set_sampler("shadow_sampler", shadow);

        let drawn = draw_objects(renderer, frame, draws, false)?;
        renderer.reset()?;
        renderer.end_event();
        Ok(drawn)
    }

    // ===== DEFERRED =====

    fn render_deferred(
        &self,
        renderer: &mut Renderer,
        shaders: &ShaderLibrary,
        frame: &FrameContext,
        shadow_map: TextureId,
        draws: &[DrawRequest],
    ) -> Result<usize> {
        renderer.begin_event("Deferred geometry");
        renderer.bind_render_targets(&self.gbuffer.targets(), self.depth_target)?;
        renderer.begin([0.0; 4], 1.0)?;

        renderer.set_shader(shaders.deferred_geometry)?;
        set_opaque_states(renderer)?;
        renderer.set_constant("view_proj", &frame.view.view_projection);
        let linear = renderer.default_sampler(DefaultSampler::LinearWrap);
        renderer.set_sampler("linear_sampler", linear);

        let drawn = draw_objects(renderer, frame, draws, true)?;
        renderer.reset()?;
        renderer.end_event();

        let occlusion = if frame.settings.ambient_occlusion {
            self.ambient_occlusion.render(renderer, shaders, frame.view, &self.gbuffer, self.depth_target)?
        } else {
            self.ambient_occlusion.white_texture()
        };

        renderer.begin_event("Deferred lighting");
        renderer.bind_render_targets(&[self.world_target], DepthTargetId::INVALID)?;
        renderer.begin(CLEAR_COLOR, 1.0)?;

        renderer.set_shader(shaders.deferred_lighting)?;
        let no_depth = renderer.default_depth_stencil_state(DefaultDepthStencilState::DepthDisabled);
        renderer.set_depth_stencil_state(no_depth)?;
        let quad = renderer.builtin_mesh(BuiltinMesh::FullscreenQuad);
        renderer.set_buffer_obj(quad)?;

        renderer.set_constant("inv_view_proj", &frame.view.inverse_view_projection);
        renderer.set_constant("camera_position", &frame.view.camera_position);
        set_light_constants(renderer, frame.lighting);

        let normal = renderer.render_target_texture(self.gbuffer.normal);
        renderer.set_texture("gbuffer_normal", normal);
        let diffuse = renderer.render_target_texture(self.gbuffer.diffuse_roughness);
        renderer.set_texture("gbuffer_diffuse", diffuse);
        let specular = renderer.render_target_texture(self.gbuffer.specular_metalness);
        renderer.set_texture("gbuffer_specular", specular);
        let depth = renderer.depth_target_texture(self.depth_target);
        renderer.set_texture("gbuffer_depth", depth);
        renderer.set_texture("shadow_map", shadow_map);
        renderer.set_texture("ambient_occlusion", occlusion);
        let point = renderer.default_sampler(DefaultSampler::PointClamp);
        renderer.set_sampler("point_sampler", point);
        let shadow = renderer.default_sampler(DefaultSampler::ShadowCompare);
        renderer.set_sampler("shadow_sampler", shadow);

        renderer.apply()?;
        renderer.draw_indexed()?;
        renderer.reset()?;
        renderer.end_event();
        Ok(drawn)
    }

    // ===== SKYBOX =====

    /// Environment behind the opaque objects, where the depth is still clear
    fn render_skybox(&self, renderer: &mut Renderer, shaders: &ShaderLibrary, frame: &FrameContext) -> Result<()> {
        let texture = frame.scene.skybox();
        if !texture.is_valid() {
            return Ok(());
        }
        renderer.begin_event("Skybox");
        renderer.bind_render_targets(&[self.world_target], self.depth_target)?;
        renderer.set_shader(shaders.skybox)?;
        // The camera sits inside the cube
        let cull_none = renderer.default_rasterizer_state(DefaultRasterizerState::CullNone);
        renderer.set_rasterizer_state(cull_none)?;
        let test_only = renderer.default_depth_stencil_state(DefaultDepthStencilState::DepthTestOnly);
        renderer.set_depth_stencil_state(test_only)?;
        let cube = renderer.builtin_mesh(BuiltinMesh::Cube);
        renderer.set_buffer_obj(cube)?;

        renderer.set_constant("view_proj", &frame.view.view_projection);
        renderer.set_constant("camera_position", &frame.view.camera_position);
        renderer.set_texture("skybox_texture", texture);
        let linear = renderer.default_sampler(DefaultSampler::LinearWrap);
        renderer.set_sampler("linear_sampler", linear);

        renderer.apply()?;
        renderer.draw_indexed()?;
        renderer.reset()?;
        renderer.end_event();
        Ok(())
    }

    // ===== OVERLAYS =====

    /// Light markers, then the tangent frames of the objects flagged `RENDER_TBN`
    fn render_overlays(
        &self,
        renderer: &mut Renderer,
        shaders: &ShaderLibrary,
        frame: &FrameContext,
        draws: &[DrawRequest],
    ) -> Result<()> {
        renderer.begin_event("Overlays");
        renderer.bind_render_targets(&[self.world_target], self.depth_target)?;
        renderer.set_shader(shaders.unlit)?;
        set_opaque_states(renderer)?;
        renderer.set_constant("view_proj", &frame.view.view_projection);

        for light in frame.scene.lights().iter().filter(|light| light.enabled) {
            if matches!(light.kind, LightKind::Directional { .. }) {
                continue;
            }
            let world = Mat4::from_scale_rotation_translation(
                Vec3::splat(MARKER_SCALE),
                light.transform.rotation,
                light.transform.position,
            );
            let mesh = renderer.builtin_mesh(light.marker_mesh());
            renderer.set_buffer_obj(mesh)?;
            renderer.set_constant("world", &world);
            renderer.set_constant("color", &light.color);
            renderer.apply()?;
            renderer.draw_indexed()?;
        }

        // Tangent frames of the objects flagged RENDER_TBN
        for request in draws.iter().filter(|request| request.render_settings.contains(RenderSettings::RENDER_TBN)) {
            let buffer = request.mesh.resolve(renderer);
            if !buffer.is_valid() {
                continue;
            }
            let lines = renderer.tangent_frame_lines(buffer, TBN_LINE_LENGTH)?;
            renderer.set_constant("world", &request.world);
            for (axis, color) in lines.into_iter().zip(TBN_COLORS) {
                renderer.set_buffer_obj(axis)?;
                renderer.set_constant("color", &color);
                renderer.apply()?;
                renderer.draw_indexed()?;
            }
        }

        renderer.reset()?;
        renderer.end_event();
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Order draws so that draws sharing a material are consecutive
///
/// The key is the material id (model tag in the high bits, then pool
/// slot) above the submission index, so the order is stable per material.
pub fn sort_by_material(draws: Vec<DrawRequest>) -> Vec<DrawRequest> {
    let mut keys: Vec<u64> = draws
        .iter()
        .enumerate()
        .map(|(index, request)| ((request.material.raw() as u32 as u64) << 32) | index as u64)
        .collect();
    keys.radix_sort_unstable();
    keys.into_iter()
        .map(|key| draws[(key & 0xFFFF_FFFF) as usize])
        .collect()
}

fn set_opaque_states(renderer: &mut Renderer) -> Result<()> {
    let cull_back = renderer.default_rasterizer_state(DefaultRasterizerState::CullBack);
    renderer.set_rasterizer_state(cull_back)?;
    let depth_write = renderer.default_depth_stencil_state(DefaultDepthStencilState::DepthWrite);
    renderer.set_depth_stencil_state(depth_write)
}

/// Per-object constants and material; the material is rebound only when
/// it differs from the previous draw's
fn draw_objects(renderer: &mut Renderer, frame: &FrameContext, draws: &[DrawRequest], deferred: bool) -> Result<usize> {
    let mut bound_material: Option<MaterialId> = None;
    let mut drawn = 0;
    for request in draws {
        let buffer = request.mesh.resolve(renderer);
        if !buffer.is_valid() {
            continue;
        }
        renderer.set_buffer_obj(buffer)?;
        renderer.set_constant("world", &request.world);
        renderer.set_constant("normal_matrix", &request.normal);
        if bound_material != Some(request.material) {
            frame.scene.material(request.material).bind(renderer, deferred);
            bound_material = Some(request.material);
        }
        renderer.apply()?;
        renderer.draw_indexed()?;
        drawn += 1;
    }
    Ok(drawn)
}

fn create_color_target(renderer: &mut Renderer, width: u32, height: u32, format: TextureFormat) -> Result<RenderTargetId> {
    let target = renderer.create_render_target(width, height, format);
    if !target.is_valid() {
        let message = format!("cannot create a {}x{} {:?} render target", width, height, format);
        engine_error!(SOURCE, "{}", message);
        return Err(Error::InitializationFailed(message));
    }
    Ok(target)
}

#[cfg(test)]
#[path = "geometry_pass_tests.rs"]
mod tests;
