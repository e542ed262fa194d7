/// Screen-space ambient occlusion over the deferred G-buffer
///
/// One full-screen draw estimates occlusion from the G-buffer normals and
/// the scene depth with a normal-oriented hemisphere kernel; a second draw
/// box-blurs it over the 4x4 tile of the rotation noise. The deferred
/// lighting pass scales its ambient term by the blurred result, or by a
/// white texture when occlusion is off.

use std::f32::consts::PI;
use glam::Vec3;
use crate::error::{Error, Result};
use crate::engine_error;
use crate::graphics_device::{TextureDesc, TextureFormat};
use crate::renderer::{DefaultDepthStencilState, DefaultSampler, Renderer};
use crate::resource::{BuiltinMesh, DepthTargetId, RenderTargetId, TextureId};
use crate::scene::SceneView;
use super::geometry_pass::GBuffer;
use super::shader_library::ShaderLibrary;

const SOURCE: &str = "prism3d::AmbientOcclusion";

pub const KERNEL_SIZE: usize = 64;
const NOISE_SIZE: u32 = 4;
/// World-space radius of the sampling hemisphere
const RADIUS: f32 = 6.5;
const INTENSITY: f32 = 1.0;

const GOLDEN_ANGLE: f32 = 2.399_963;
const AO_FORMAT: TextureFormat = TextureFormat::R8G8B8A8_UNORM;

pub struct AmbientOcclusionPass {
    occlusion: RenderTargetId,
    blurred: RenderTargetId,
    noise: TextureId,
    white: TextureId,
    kernel: [[f32; 4]; KERNEL_SIZE],
    size: (u32, u32),
}

impl AmbientOcclusionPass {
    pub fn new(renderer: &mut Renderer, width: u32, height: u32) -> Result<Self> {
        let occlusion = create_target(renderer, width, height)?;
        let blurred = create_target(renderer, width, height)?;

        let noise_data = noise_texels();
        let noise = renderer.create_texture_2d(
            TextureDesc::sampled(NOISE_SIZE, NOISE_SIZE, TextureFormat::R32G32B32A32_FLOAT),
            Some(bytemuck::cast_slice(&noise_data)),
        );
        let white = renderer.create_texture_2d(
            TextureDesc::sampled(1, 1, AO_FORMAT),
            Some(&[255u8; 4]),
        );
        if !noise.is_valid() || !white.is_valid() {
            let message = "cannot create the ambient occlusion textures".to_string();
            engine_error!(SOURCE, "{}", message);
            return Err(Error::InitializationFailed(message));
        }

        Ok(Self {
            occlusion,
            blurred,
            noise,
            white,
            kernel: sample_kernel(),
            size: (width, height),
        })
    }

    /// Recreate the size-dependent targets; the textures are kept
    pub fn resize(&mut self, renderer: &mut Renderer, width: u32, height: u32) -> Result<()> {
        if (width, height) == self.size {
            return Ok(());
        }
        let occlusion = create_target(renderer, width, height)?;
        let blurred = create_target(renderer, width, height)?;
        renderer.destroy_render_target(self.occlusion);
        renderer.destroy_render_target(self.blurred);
        self.occlusion = occlusion;
        self.blurred = blurred;
        self.size = (width, height);
        Ok(())
    }

    pub fn destroy(&self, renderer: &mut Renderer) {
        renderer.destroy_render_target(self.occlusion);
        renderer.destroy_render_target(self.blurred);
        renderer.destroy_texture(self.noise);
        renderer.destroy_texture(self.white);
    }

    /// Neutral occlusion for frames rendered without the pass
    pub fn white_texture(&self) -> TextureId {
        self.white
    }

    pub fn kernel(&self) -> &[[f32; 4]; KERNEL_SIZE] {
        &self.kernel
    }

    /// Estimate and blur the occlusion; returns the blurred texture
    pub fn render(
        &self,
        renderer: &mut Renderer,
        shaders: &ShaderLibrary,
        view: &SceneView,
        gbuffer: &GBuffer,
        depth: DepthTargetId,
    ) -> Result<TextureId> {
        renderer.begin_event("Ambient occlusion");
        renderer.bind_render_targets(&[self.occlusion], DepthTargetId::INVALID)?;
        renderer.set_shader(shaders.ssao)?;
        let no_depth = renderer.default_depth_stencil_state(DefaultDepthStencilState::DepthDisabled);
        renderer.set_depth_stencil_state(no_depth)?;
        let quad = renderer.builtin_mesh(BuiltinMesh::FullscreenQuad);
        renderer.set_buffer_obj(quad)?;

        renderer.set_constant("view_proj", &view.view_projection);
        renderer.set_constant("inv_view_proj", &view.inverse_view_projection);
        renderer.set_constant("radius", &RADIUS);
        renderer.set_constant("intensity", &INTENSITY);
        renderer.set_constant_bytes("kernel", bytemuck::cast_slice(&self.kernel));

        let normal = renderer.render_target_texture(gbuffer.normal);
        renderer.set_texture("gbuffer_normal", normal);
        let depth = renderer.depth_target_texture(depth);
        renderer.set_texture("gbuffer_depth", depth);
        renderer.set_texture("noise_texture", self.noise);
        let point = renderer.default_sampler(DefaultSampler::PointClamp);
        renderer.set_sampler("point_sampler", point);

        renderer.apply()?;
        renderer.draw_indexed()?;
        renderer.reset()?;

        renderer.bind_render_targets(&[self.blurred], DepthTargetId::INVALID)?;
        renderer.set_shader(shaders.ssao_blur)?;
        renderer.set_depth_stencil_state(no_depth)?;
        renderer.set_buffer_obj(quad)?;
        let occlusion = renderer.render_target_texture(self.occlusion);
        renderer.set_texture("occlusion", occlusion);
        renderer.apply()?;
        renderer.draw_indexed()?;
        renderer.reset()?;
        renderer.end_event();

        Ok(renderer.render_target_texture(self.blurred))
    }
}

/// Hemisphere samples around +Z, denser near the centre
///
/// A golden-angle spiral over the hemisphere keeps the kernel
/// deterministic; lengths grow quadratically from 0.1 to 1.
pub fn sample_kernel() -> [[f32; 4]; KERNEL_SIZE] {
    let mut kernel = [[0.0; 4]; KERNEL_SIZE];
    for (i, sample) in kernel.iter_mut().enumerate() {
        let t = (i as f32 + 0.5) / KERNEL_SIZE as f32;
        let z = 1.0 - t;
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = i as f32 * GOLDEN_ANGLE;
        let scale = i as f32 / KERNEL_SIZE as f32;
        let length = 0.1 + 0.9 * scale * scale;
        let direction = Vec3::new(r * phi.cos(), r * phi.sin(), z) * length;
        *sample = direction.extend(0.0).to_array();
    }
    kernel
}

/// Unit rotation vectors in the XY plane, one per texel of the tile
fn noise_texels() -> [[f32; 4]; (NOISE_SIZE * NOISE_SIZE) as usize] {
    let count = (NOISE_SIZE * NOISE_SIZE) as usize;
    let mut texels = [[0.0; 4]; (NOISE_SIZE * NOISE_SIZE) as usize];
    for (i, texel) in texels.iter_mut().enumerate() {
        // Interleave so neighbouring texels differ strongly
        let angle = 2.0 * PI * ((i * 7) % count) as f32 / count as f32;
        *texel = [angle.cos(), angle.sin(), 0.0, 0.0];
    }
    texels
}

fn create_target(renderer: &mut Renderer, width: u32, height: u32) -> Result<RenderTargetId> {
    let target = renderer.create_render_target(width, height, AO_FORMAT);
    if !target.is_valid() {
        let message = format!("cannot create a {}x{} ambient occlusion target", width, height);
        engine_error!(SOURCE, "{}", message);
        return Err(Error::InitializationFailed(message));
    }
    Ok(target)
}

#[cfg(test)]
#[path = "ambient_occlusion_tests.rs"]
mod tests;
