#![allow(dead_code, clippy::all)]

use std::ffi::{c_void, CString};

include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

/// Runs a GL call in an unsafe block, and in debug builds, panics if
/// `glGetError` reports anything afterwards.
macro_rules! call {
    ($expr:expr) => {{
        let result = unsafe { $expr };
        if cfg!(debug_assertions) {
            let error = unsafe { $crate::renderer::gl::GetError() };
            if error != $crate::renderer::gl::NO_ERROR {
                panic!(
                    "OpenGL error {} at {}:{}:{}",
                    $crate::renderer::gl::error_name(error),
                    file!(),
                    line!(),
                    column!(),
                );
            }
        }
        result
    }};
}
pub(crate) use call;

pub fn error_name(error: types::GLenum) -> String {
    match error {
        INVALID_ENUM => "INVALID_ENUM".to_string(),
        INVALID_VALUE => "INVALID_VALUE".to_string(),
        INVALID_OPERATION => "INVALID_OPERATION".to_string(),
        OUT_OF_MEMORY => "OUT_OF_MEMORY".to_string(),
        INVALID_FRAMEBUFFER_OPERATION => "INVALID_FRAMEBUFFER_OPERATION".to_string(),
        _ => format!("{error}"),
    }
}

pub fn framebuffer_status_name(status: types::GLenum) -> String {
    match status {
        FRAMEBUFFER_COMPLETE => "FRAMEBUFFER_COMPLETE".to_string(),
        FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "FRAMEBUFFER_INCOMPLETE_ATTACHMENT".to_string(),
        FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => {
            "FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT".to_string()
        }
        FRAMEBUFFER_INCOMPLETE_DIMENSIONS => "FRAMEBUFFER_INCOMPLETE_DIMENSIONS".to_string(),
        FRAMEBUFFER_UNSUPPORTED => "FRAMEBUFFER_UNSUPPORTED".to_string(),
        FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "FRAMEBUFFER_INCOMPLETE_MULTISAMPLE".to_string(),
        _ => format!("{status:#x}"),
    }
}

/// Uploads `data` into the buffer currently bound to `target`.
pub fn buffer_data<T: bytemuck::Pod>(target: types::GLenum, data: &[T], usage: types::GLenum) {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    call!(BufferData(
        target,
        bytes.len() as isize,
        bytes.as_ptr() as *const c_void,
        usage,
    ));
}

/// Compiles a shader of the given type. On failure, the shader object is
/// deleted and the info log is returned as the error.
pub fn create_shader(shader_type: types::GLenum, source: &str) -> Result<types::GLuint, String> {
    let shader = call!(CreateShader(shader_type));
    let sources = [source.as_bytes().as_ptr() as *const types::GLchar];
    let source_lens = [source.len() as types::GLint];
    call!(ShaderSource(
        shader,
        1,
        sources.as_ptr(),
        source_lens.as_ptr(),
    ));
    call!(CompileShader(shader));
    let mut compile_status = 0;
    call!(GetShaderiv(shader, COMPILE_STATUS, &mut compile_status));
    if compile_status == FALSE as i32 {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetShaderInfoLog(
            shader,
            info_log.len() as i32,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteShader(shader));
        let info_log = String::from_utf8_lossy(&info_log[..length.max(0) as usize]);
        return Err(info_log.trim_end().to_string());
    }
    Ok(shader)
}

/// Links the shaders into a program. The shaders are detached afterwards, but
/// not deleted.
pub fn create_program(shaders: &[types::GLuint]) -> Result<types::GLuint, String> {
    let program = call!(CreateProgram());
    for &shader in shaders {
        call!(AttachShader(program, shader));
    }
    call!(LinkProgram(program));
    for &shader in shaders {
        call!(DetachShader(program, shader));
    }
    let mut link_status = 0;
    call!(GetProgramiv(program, LINK_STATUS, &mut link_status));
    if link_status == FALSE as i32 {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetProgramInfoLog(
            program,
            info_log.len() as i32,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteProgram(program));
        let info_log = String::from_utf8_lossy(&info_log[..length.max(0) as usize]);
        return Err(info_log.trim_end().to_string());
    }
    Ok(program)
}

/// Returns the location of the uniform, or None if the program has no active
/// uniform with that name.
pub fn get_uniform_location(program: types::GLuint, name: &str) -> Option<types::GLint> {
    let name = CString::new(name).ok()?;
    let location = call!(GetUniformLocation(program, name.as_ptr()));
    (location != -1).then_some(location)
}
