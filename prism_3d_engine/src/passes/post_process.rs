/// Post-process pass: bloom, then tonemapping to the back buffer
///
/// Bloom splits the lit scene into a bright target and a colour copy
/// (two targets in one draw), blurs the bright target with alternating
/// horizontal and vertical passes between two ping-pong targets, then adds
/// the blurred result back onto the colour copy. Tonemapping applies the
/// exposure and writes the back buffer. With bloom off the lit scene goes
/// straight to tonemapping.
///
/// Every sub-pass draws the renderer's shared full-screen quad.

use glam::Vec2;
use crate::error::{Error, Result};
use crate::engine_error;
use crate::graphics_device::TextureFormat;
use crate::renderer::{DefaultDepthStencilState, DefaultSampler, Renderer};
use crate::resource::{BuiltinMesh, DepthTargetId, RenderTargetId, ShaderId, TextureId};
use crate::settings::RenderingSettings;
use super::shader_library::ShaderLibrary;

const SOURCE: &str = "prism3d::PostProcess";

const HDR_FORMAT: TextureFormat = TextureFormat::R16G16B16A16_FLOAT;

pub struct PostProcessPass {
    bright: RenderTargetId,
    color: RenderTargetId,
    ping_pong: [RenderTargetId; 2],
    combined: RenderTargetId,
    size: (u32, u32),
}

impl PostProcessPass {
    pub fn new(renderer: &mut Renderer, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            bright: create_target(renderer, width, height)?,
            color: create_target(renderer, width, height)?,
            ping_pong: [create_target(renderer, width, height)?, create_target(renderer, width, height)?],
            combined: create_target(renderer, width, height)?,
            size: (width, height),
        })
    }

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
        for target in [self.bright, self.color, self.ping_pong[0], self.ping_pong[1], self.combined] {
            renderer.destroy_render_target(target);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Post-process `scene` into the back buffer
    pub fn render(
        &self,
        renderer: &mut Renderer,
        shaders: &ShaderLibrary,
        settings: &RenderingSettings,
        scene: TextureId,
    ) -> Result<()> {
        let hdr = if settings.bloom.enabled {
            self.bloom(renderer, shaders, settings, scene)?
        } else {
            scene
        };
        self.tonemap(renderer, shaders, settings, hdr)
    }

    /// Returns the texture holding scene + blurred highlights
    fn bloom(
        &self,
        renderer: &mut Renderer,
        shaders: &ShaderLibrary,
        settings: &RenderingSettings,
        scene: TextureId,
    ) -> Result<TextureId> {
        renderer.begin_event("Bloom");

        renderer.bind_render_targets(&[self.bright, self.color], DepthTargetId::INVALID)?;
        begin_fullscreen(renderer, shaders.bloom_bright)?;
        renderer.set_constant("bloom_threshold", &settings.bloom_threshold());
        renderer.set_texture("scene_texture", scene);
        renderer.apply()?;
        renderer.draw_indexed()?;

        let (width, height) = self.size;
        let texel_size = Vec2::new(1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32);
        let strength = settings.bloom.blur_strength as f32;
        let mut source = renderer.render_target_texture(self.bright);
        for pass in 0..settings.bloom.blur_pass_count as usize {
            let target = self.ping_pong[pass % 2];
            let direction = if pass % 2 == 0 { Vec2::X } else { Vec2::Y };
            renderer.bind_render_targets(&[target], DepthTargetId::INVALID)?;
            begin_fullscreen(renderer, shaders.blur)?;
            renderer.set_constant("blur_direction", &direction);
            renderer.set_constant("texel_size", &texel_size);
            renderer.set_constant("blur_strength", &strength);
            renderer.set_texture("source_texture", source);
            renderer.apply()?;
            renderer.draw_indexed()?;
            source = renderer.render_target_texture(target);
        }

        renderer.bind_render_targets(&[self.combined], DepthTargetId::INVALID)?;
        begin_fullscreen(renderer, shaders.bloom_combine)?;
        let color = renderer.render_target_texture(self.color);
        renderer.set_texture("color_texture", color);
        renderer.set_texture("bloom_texture", source);
        renderer.apply()?;
        renderer.draw_indexed()?;

        renderer.reset()?;
        renderer.end_event();
        Ok(renderer.render_target_texture(self.combined))
    }

    fn tonemap(
        &self,
        renderer: &mut Renderer,
        shaders: &ShaderLibrary,
        settings: &RenderingSettings,
        hdr: TextureId,
    ) -> Result<()> {
        renderer.begin_event("Tonemapping");
        let back_buffer = renderer.back_buffer();
        renderer.bind_render_targets(&[back_buffer], DepthTargetId::INVALID)?;
        renderer.begin([0.0, 0.0, 0.0, 1.0], 1.0)?;
        begin_fullscreen(renderer, shaders.tonemapping)?;
        renderer.set_constant("exposure", &settings.tonemapping.exposure);
        let hdr_flag: f32 = if settings.hdr { 1.0 } else { 0.0 };
        renderer.set_constant("hdr", &hdr_flag);
        renderer.set_texture("hdr_texture", hdr);
        renderer.apply()?;
        renderer.draw_indexed()?;
        renderer.reset()?;
        renderer.end_event();
        Ok(())
    }
}

/// Shader, depth off, full-screen quad and the clamped linear sampler
fn begin_fullscreen(renderer: &mut Renderer, shader: ShaderId) -> Result<()> {
    renderer.set_shader(shader)?;
    let no_depth = renderer.default_depth_stencil_state(DefaultDepthStencilState::DepthDisabled);
    renderer.set_depth_stencil_state(no_depth)?;
    let quad = renderer.builtin_mesh(BuiltinMesh::FullscreenQuad);
    renderer.set_buffer_obj(quad)?;
    let sampler = renderer.default_sampler(DefaultSampler::LinearClamp);
    renderer.set_sampler("linear_sampler", sampler);
    Ok(())
}

fn create_target(renderer: &mut Renderer, width: u32, height: u32) -> Result<RenderTargetId> {
    let target = renderer.create_render_target(width, height, HDR_FORMAT);
    if !target.is_valid() {
        let message = format!("cannot create a {}x{} post-process target", width, height);
        engine_error!(SOURCE, "{}", message);
        return Err(Error::InitializationFailed(message));
    }
    Ok(target)
}

#[cfg(test)]
#[path = "post_process_tests.rs"]
mod tests;
