use std::ffi::c_void;
use std::mem;
use std::ptr;

use bytemuck::{Pod, Zeroable};

use crate::renderer::{gl, GlContext};

const ATTR_LOC_POSITION: gl::types::GLuint = 0;
const ATTR_LOC_TEXCOORD: gl::types::GLuint = 1;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 2],
    texcoord: [f32; 2],
}

/// Counter-clockwise from the bottom left, for a triangle fan.
const VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0],
        texcoord: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        texcoord: [1.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        texcoord: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        texcoord: [0.0, 1.0],
    },
];

/// A quad covering the whole viewport, with texture coordinates spanning
/// 0..1 in GL's bottom-up orientation.
pub struct FullscreenQuad {
    vao: gl::types::GLuint,
    vbo: gl::types::GLuint,
}

impl FullscreenQuad {
    pub const VERTEX_COUNT: gl::types::GLsizei = VERTICES.len() as gl::types::GLsizei;

    pub fn new(_ctx: &mut GlContext) -> FullscreenQuad {
        let mut vao = 0;
        let mut vbo = 0;
        gl::call!(gl::GenVertexArrays(1, &mut vao));
        gl::call!(gl::GenBuffers(1, &mut vbo));
        gl::call!(gl::BindVertexArray(vao));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, vbo));
        gl::buffer_data(gl::ARRAY_BUFFER, &VERTICES, gl::STATIC_DRAW);

        let stride = mem::size_of::<QuadVertex>() as gl::types::GLsizei;
        gl::call!(gl::EnableVertexAttribArray(ATTR_LOC_POSITION));
        gl::call!(gl::VertexAttribPointer(
            ATTR_LOC_POSITION,
            2,
            gl::FLOAT,
            gl::FALSE,
            stride,
            ptr::null::<c_void>(),
        ));
        gl::call!(gl::EnableVertexAttribArray(ATTR_LOC_TEXCOORD));
        gl::call!(gl::VertexAttribPointer(
            ATTR_LOC_TEXCOORD,
            2,
            gl::FLOAT,
            gl::FALSE,
            stride,
            mem::size_of::<[f32; 2]>() as *const c_void,
        ));

        gl::call!(gl::BindVertexArray(0));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, 0));
        FullscreenQuad { vao, vbo }
    }

    pub(crate) fn vao(&self) -> gl::types::GLuint {
        self.vao
    }
}

impl Drop for FullscreenQuad {
    fn drop(&mut self) {
        gl::call!(gl::DeleteVertexArrays(1, &self.vao));
        gl::call!(gl::DeleteBuffers(1, &self.vbo));
    }
}
