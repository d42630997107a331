//! Thin, owned wrappers around the OpenGL ES 3.0 objects the compositor
//! needs. All binding goes through [`GlContext`].

use thiserror::Error;

mod context;
pub(crate) mod gl;
mod mesh;
mod offscreen;
mod quad;
mod shader;
mod texture;

pub use context::{GlContext, ProgramPass, TargetPass};
pub use mesh::Mesh;
pub use offscreen::OffscreenTarget;
pub use quad::FullscreenQuad;
pub use shader::{ShaderError, ShaderProgram};
pub use texture::{Texture2D, TextureFormat};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("framebuffer is incomplete: {status}")]
    IncompleteFramebuffer { status: String },
    #[error("{0:?} can't be used as a color attachment")]
    UnsupportedColorFormat(TextureFormat),
    #[error("read back pixels don't fit a {width}x{height} image")]
    ReadBack { width: u32, height: u32 },
    #[error("{width}x{height} frame has {actual} bytes, expected {expected}")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
pub(crate) mod test_support {
    use sdl2::video::GLProfile;

    use super::GlContext;

    /// Runs `f` with a GLES 3.0 context of a hidden window.
    ///
    /// SDL may only be initialized from one thread per process, so every test
    /// that needs GL has to go through a single `#[test]` function.
    pub fn with_hidden_context(f: impl FnOnce(&mut GlContext)) {
        let sdl_context = sdl2::init().unwrap();
        let video_subsystem = sdl_context.video().unwrap();
        let gl_attr = video_subsystem.gl_attr();
        gl_attr.set_context_profile(GLProfile::GLES);
        gl_attr.set_context_version(3, 0);
        let window = video_subsystem
            .window("mesh-overlay test", 64, 64)
            .opengl()
            .hidden()
            .build()
            .unwrap();
        let _gl_context = window.gl_create_context().unwrap();
        let mut ctx = GlContext::load(&video_subsystem);
        f(&mut ctx);
    }
}
