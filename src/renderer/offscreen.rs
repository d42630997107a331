use image::RgbaImage;

use crate::renderer::{gl, GlContext, RenderError, Texture2D, TextureFormat};

/// A framebuffer with a color texture and an optional depth texture, which
/// can be rendered into and then sampled in a later pass.
///
/// Bound for rendering with [`GlContext::bind_target`].
pub struct OffscreenTarget {
    framebuffer: gl::types::GLuint,
    width: u32,
    height: u32,
    color: Texture2D,
    depth: Option<Texture2D>,
}

impl OffscreenTarget {
    pub fn new(
        ctx: &mut GlContext,
        width: u32,
        height: u32,
        format: TextureFormat,
        with_depth: bool,
    ) -> Result<OffscreenTarget, RenderError> {
        if format == TextureFormat::Depth24 {
            return Err(RenderError::UnsupportedColorFormat(format));
        }
        let color = Texture2D::new(ctx, width, height, format);
        let depth = with_depth.then(|| Texture2D::new(ctx, width, height, TextureFormat::Depth24));

        let mut framebuffer = 0;
        gl::call!(gl::GenFramebuffers(1, &mut framebuffer));
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer));
        gl::call!(gl::FramebufferTexture2D(
            gl::FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            gl::TEXTURE_2D,
            color.id(),
            0,
        ));
        if let Some(depth) = &depth {
            gl::call!(gl::FramebufferTexture2D(
                gl::FRAMEBUFFER,
                gl::DEPTH_ATTACHMENT,
                gl::TEXTURE_2D,
                depth.id(),
                0,
            ));
        }
        let draw_buffers = [gl::COLOR_ATTACHMENT0];
        gl::call!(gl::DrawBuffers(1, draw_buffers.as_ptr()));
        let status = gl::call!(gl::CheckFramebufferStatus(gl::FRAMEBUFFER));
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, 0));

        if status != gl::FRAMEBUFFER_COMPLETE {
            gl::call!(gl::DeleteFramebuffers(1, &framebuffer));
            return Err(RenderError::IncompleteFramebuffer {
                status: gl::framebuffer_status_name(status),
            });
        }

        log::debug!(
            "created {width}x{height} {format:?} offscreen target (depth: {with_depth})"
        );
        Ok(OffscreenTarget {
            framebuffer,
            width,
            height,
            color,
            depth,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color_texture(&self) -> &Texture2D {
        &self.color
    }

    pub fn depth_texture(&self) -> Option<&Texture2D> {
        self.depth.as_ref()
    }

    pub(crate) fn framebuffer(&self) -> gl::types::GLuint {
        self.framebuffer
    }

    /// Downloads the color attachment, top row first.
    pub fn read_back(&self, ctx: &mut GlContext) -> Result<RgbaImage, RenderError> {
        let pixels = ctx.read_pixels(self);
        let row_len = self.width as usize * 4;
        let mut flipped = Vec::with_capacity(pixels.len());
        for row in pixels.chunks_exact(row_len.max(1)).rev() {
            flipped.extend_from_slice(row);
        }
        RgbaImage::from_raw(self.width, self.height, flipped).ok_or(RenderError::ReadBack {
            width: self.width,
            height: self.height,
        })
    }
}

impl Drop for OffscreenTarget {
    fn drop(&mut self) {
        gl::call!(gl::DeleteFramebuffers(1, &self.framebuffer));
    }
}
