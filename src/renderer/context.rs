use std::ffi::c_void;
use std::marker::PhantomData;

use glam::{Mat4, Vec3};
use sdl2::VideoSubsystem;

use crate::renderer::{gl, FullscreenQuad, Mesh, OffscreenTarget, ShaderProgram, Texture2D};

/// Handle to the current GL context's binding state.
///
/// Every operation that changes which framebuffer, program or texture is bound
/// goes through this type, and binding returns a guard that borrows it
/// mutably. This makes "exactly one target bound at a time" a compile-time
/// property: a second [`GlContext::bind_target`] can't be called while a
/// [`TargetPass`] is alive, and dropping the pass restores the default
/// framebuffer.
///
/// The context is tied to the thread which made it current, so it's neither
/// `Send` nor `Sync`.
pub struct GlContext {
    _not_send: PhantomData<*const ()>,
}

impl GlContext {
    /// Loads the GL function pointers of the context that is current on this
    /// thread.
    pub fn load(video: &VideoSubsystem) -> GlContext {
        gl::load_with(|s| video.gl_get_proc_address(s) as *const c_void);
        gl::call!(gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1));
        gl::call!(gl::PixelStorei(gl::PACK_ALIGNMENT, 1));
        GlContext {
            _not_send: PhantomData,
        }
    }

    /// Makes `target` the render destination and sets the viewport to its
    /// size, until the returned pass is dropped.
    pub fn bind_target<'a>(&'a mut self, target: &'a OffscreenTarget) -> TargetPass<'a> {
        let (width, height) = target.size();
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, target.framebuffer()));
        gl::call!(gl::Viewport(0, 0, width as i32, height as i32));
        TargetPass {
            _context: self,
            depth_test: false,
        }
    }

    /// Copies the color attachment of `target` onto the window's default
    /// framebuffer, scaled to `drawable_size`.
    pub fn present(&mut self, target: &OffscreenTarget, drawable_size: (u32, u32)) {
        let (width, height) = target.size();
        let (drawable_width, drawable_height) = drawable_size;
        gl::call!(gl::BindFramebuffer(gl::READ_FRAMEBUFFER, target.framebuffer()));
        gl::call!(gl::BindFramebuffer(gl::DRAW_FRAMEBUFFER, 0));
        gl::call!(gl::Viewport(
            0,
            0,
            drawable_width as i32,
            drawable_height as i32
        ));
        gl::call!(gl::ClearColor(0.0, 0.0, 0.0, 1.0));
        gl::call!(gl::Clear(gl::COLOR_BUFFER_BIT));
        gl::call!(gl::BlitFramebuffer(
            0,
            0,
            width as i32,
            height as i32,
            0,
            0,
            drawable_width as i32,
            drawable_height as i32,
            gl::COLOR_BUFFER_BIT,
            gl::LINEAR,
        ));
        gl::call!(gl::BindFramebuffer(gl::READ_FRAMEBUFFER, 0));
    }

    /// Reads the color attachment of `target` as tightly packed RGBA8 rows,
    /// bottom row first (GL's order).
    pub(crate) fn read_pixels(&mut self, target: &OffscreenTarget) -> Vec<u8> {
        let (width, height) = target.size();
        let mut pixels = vec![0u8; width as usize * height as usize * 4];
        gl::call!(gl::BindFramebuffer(gl::READ_FRAMEBUFFER, target.framebuffer()));
        gl::call!(gl::ReadBuffer(gl::COLOR_ATTACHMENT0));
        gl::call!(gl::ReadPixels(
            0,
            0,
            width as i32,
            height as i32,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            pixels.as_mut_ptr() as *mut c_void,
        ));
        gl::call!(gl::BindFramebuffer(gl::READ_FRAMEBUFFER, 0));
        pixels
    }
}

/// An offscreen target bound for rendering. Unbinds on drop.
pub struct TargetPass<'a> {
    _context: &'a mut GlContext,
    depth_test: bool,
}

impl TargetPass<'_> {
    /// Clears the color attachment to `color`, and the depth attachment too if
    /// `depth` is set.
    pub fn clear(&mut self, color: [f32; 4], depth: bool) {
        let [r, g, b, a] = color;
        gl::call!(gl::ClearColor(r, g, b, a));
        let mut mask = gl::COLOR_BUFFER_BIT;
        if depth {
            gl::call!(gl::ClearDepthf(1.0));
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        gl::call!(gl::Clear(mask));
    }

    pub fn set_depth_test(&mut self, enabled: bool) {
        if enabled {
            gl::call!(gl::Enable(gl::DEPTH_TEST));
            gl::call!(gl::DepthFunc(gl::LESS));
        } else {
            gl::call!(gl::Disable(gl::DEPTH_TEST));
        }
        self.depth_test = enabled;
    }

    /// Activates `program` for the draw calls issued through the returned
    /// pass.
    pub fn use_program<'p>(&'p mut self, program: &'p ShaderProgram) -> ProgramPass<'p> {
        gl::call!(gl::UseProgram(program.id()));
        ProgramPass {
            _target: PhantomData,
            program,
            bound_units: Vec::new(),
        }
    }
}

impl Drop for TargetPass<'_> {
    fn drop(&mut self) {
        if self.depth_test {
            gl::call!(gl::Disable(gl::DEPTH_TEST));
        }
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, 0));
    }
}

/// A shader program in use within a [`TargetPass`]. Uniforms the program
/// doesn't have (e.g. optimized out by the driver) are silently skipped.
pub struct ProgramPass<'a> {
    _target: PhantomData<&'a mut ()>,
    program: &'a ShaderProgram,
    bound_units: Vec<u32>,
}

impl ProgramPass<'_> {
    pub fn set_mat4(&mut self, name: &str, matrix: &Mat4) {
        if let Some(location) = self.program.uniform_location(name) {
            let columns = matrix.to_cols_array();
            gl::call!(gl::UniformMatrix4fv(
                location,
                1,
                gl::FALSE,
                columns.as_ptr()
            ));
        }
    }

    pub fn set_vec3(&mut self, name: &str, value: Vec3) {
        if let Some(location) = self.program.uniform_location(name) {
            gl::call!(gl::Uniform3f(location, value.x, value.y, value.z));
        }
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        if let Some(location) = self.program.uniform_location(name) {
            gl::call!(gl::Uniform1i(location, value as i32));
        }
    }

    /// Binds `texture` to texture unit `unit` and points the sampler uniform
    /// `name` at that unit.
    pub fn bind_texture(&mut self, name: &str, unit: u32, texture: &Texture2D) {
        gl::call!(gl::ActiveTexture(gl::TEXTURE0 + unit));
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, texture.id()));
        if !self.bound_units.contains(&unit) {
            self.bound_units.push(unit);
        }
        if let Some(location) = self.program.uniform_location(name) {
            gl::call!(gl::Uniform1i(location, unit as i32));
        }
    }

    pub fn draw_mesh(&mut self, mesh: &Mesh) {
        gl::call!(gl::BindVertexArray(mesh.vao()));
        gl::call!(gl::DrawArrays(
            gl::TRIANGLES,
            0,
            mesh.vertex_count() as i32
        ));
        gl::call!(gl::BindVertexArray(0));
    }

    pub fn draw_quad(&mut self, quad: &FullscreenQuad) {
        gl::call!(gl::BindVertexArray(quad.vao()));
        gl::call!(gl::DrawArrays(
            gl::TRIANGLE_FAN,
            0,
            FullscreenQuad::VERTEX_COUNT
        ));
        gl::call!(gl::BindVertexArray(0));
    }
}

impl Drop for ProgramPass<'_> {
    fn drop(&mut self) {
        for &unit in &self.bound_units {
            gl::call!(gl::ActiveTexture(gl::TEXTURE0 + unit));
            gl::call!(gl::BindTexture(gl::TEXTURE_2D, 0));
        }
        gl::call!(gl::ActiveTexture(gl::TEXTURE0));
        gl::call!(gl::UseProgram(0));
    }
}
