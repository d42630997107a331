use std::ffi::c_void;
use std::ptr;

use crate::mesh::MeshData;
use crate::renderer::{gl, GlContext};

/// The vertex attribute location of mesh positions.
pub const ATTR_LOC_POSITION: gl::types::GLuint = 0;
/// The vertex attribute location of mesh normals.
pub const ATTR_LOC_NORMAL: gl::types::GLuint = 1;
/// The vertex attribute location of mesh texture coordinates.
pub const ATTR_LOC_TEXCOORD: gl::types::GLuint = 2;

/// A mesh uploaded into GPU buffers, drawn as a non-indexed triangle list.
pub struct Mesh {
    vao: gl::types::GLuint,
    position_buffer: gl::types::GLuint,
    normal_buffer: Option<gl::types::GLuint>,
    texcoord_buffer: Option<gl::types::GLuint>,
    vertex_count: usize,
}

impl Mesh {
    pub fn upload(_ctx: &mut GlContext, data: &MeshData) -> Mesh {
        let mut vao = 0;
        gl::call!(gl::GenVertexArrays(1, &mut vao));
        gl::call!(gl::BindVertexArray(vao));

        let position_buffer = upload_attribute(ATTR_LOC_POSITION, 3, &data.positions);
        let normal_buffer = data
            .has_normals()
            .then(|| upload_attribute(ATTR_LOC_NORMAL, 3, &data.normals));
        let texcoord_buffer = data
            .has_texcoords()
            .then(|| upload_attribute(ATTR_LOC_TEXCOORD, 2, &data.texcoords));

        gl::call!(gl::BindVertexArray(0));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, 0));

        log::debug!(
            "uploaded mesh: {} vertices (normals: {}, texcoords: {})",
            data.vertex_count(),
            data.has_normals(),
            data.has_texcoords(),
        );
        Mesh {
            vao,
            position_buffer,
            normal_buffer,
            texcoord_buffer,
            vertex_count: data.vertex_count(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn has_normals(&self) -> bool {
        self.normal_buffer.is_some()
    }

    pub fn has_texcoords(&self) -> bool {
        self.texcoord_buffer.is_some()
    }

    pub(crate) fn vao(&self) -> gl::types::GLuint {
        self.vao
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        gl::call!(gl::DeleteVertexArrays(1, &self.vao));
        let buffers = [Some(self.position_buffer), self.normal_buffer, self.texcoord_buffer];
        for buffer in buffers.into_iter().flatten() {
            gl::call!(gl::DeleteBuffers(1, &buffer));
        }
    }
}

/// Creates a buffer with `data`, and points the attribute `location` of the
/// currently bound VAO at it.
fn upload_attribute<T: bytemuck::Pod>(
    location: gl::types::GLuint,
    components: gl::types::GLint,
    data: &[T],
) -> gl::types::GLuint {
    let mut buffer = 0;
    gl::call!(gl::GenBuffers(1, &mut buffer));
    gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, buffer));
    gl::buffer_data(gl::ARRAY_BUFFER, data, gl::STATIC_DRAW);
    gl::call!(gl::EnableVertexAttribArray(location));
    gl::call!(gl::VertexAttribPointer(
        location,
        components,
        gl::FLOAT,
        gl::FALSE,
        0,
        ptr::null::<c_void>(),
    ));
    buffer
}
