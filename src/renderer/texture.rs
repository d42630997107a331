use std::ffi::c_void;
use std::ptr;

use crate::capture::{Frame, PixelFormat};
use crate::renderer::{gl, GlContext, RenderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgb8,
    Rgba8,
    Depth24,
}

impl TextureFormat {
    fn internal_format(self) -> gl::types::GLint {
        (match self {
            TextureFormat::Rgb8 => gl::RGB8,
            TextureFormat::Rgba8 => gl::RGBA8,
            TextureFormat::Depth24 => gl::DEPTH_COMPONENT24,
        }) as gl::types::GLint
    }

    fn pixel_format(self) -> gl::types::GLenum {
        match self {
            TextureFormat::Rgb8 => gl::RGB,
            TextureFormat::Rgba8 => gl::RGBA,
            TextureFormat::Depth24 => gl::DEPTH_COMPONENT,
        }
    }

    fn pixel_type(self) -> gl::types::GLenum {
        match self {
            TextureFormat::Rgb8 | TextureFormat::Rgba8 => gl::UNSIGNED_BYTE,
            TextureFormat::Depth24 => gl::UNSIGNED_INT,
        }
    }

    /// The format a frame's bytes are uploaded as. BGR frames are uploaded as
    /// RGB, the composite shader swaps the channels back.
    pub fn for_frame(format: PixelFormat) -> TextureFormat {
        match format {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => TextureFormat::Rgb8,
            PixelFormat::Rgba8 => TextureFormat::Rgba8,
        }
    }
}

/// A 2D texture with clamped, non-mipmapped sampling.
pub struct Texture2D {
    id: gl::types::GLuint,
    width: u32,
    height: u32,
    format: TextureFormat,
}

impl Texture2D {
    /// Allocates a texture with undefined contents.
    pub fn new(_ctx: &mut GlContext, width: u32, height: u32, format: TextureFormat) -> Texture2D {
        let mut id = 0;
        gl::call!(gl::GenTextures(1, &mut id));
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, id));
        // Depth textures aren't filterable in GLES 3.0.
        let filter = (match format {
            TextureFormat::Depth24 => gl::NEAREST,
            _ => gl::LINEAR,
        }) as gl::types::GLint;
        gl::call!(gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, filter));
        gl::call!(gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, filter));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_2D,
            gl::TEXTURE_WRAP_S,
            gl::CLAMP_TO_EDGE as gl::types::GLint
        ));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_2D,
            gl::TEXTURE_WRAP_T,
            gl::CLAMP_TO_EDGE as gl::types::GLint
        ));
        allocate(format, width, height, ptr::null());
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, 0));
        Texture2D {
            id,
            width,
            height,
            format,
        }
    }

    /// Replaces the texture contents with the frame. The storage is only
    /// reallocated when the frame's size or format differs from the current
    /// one. Frames with fewer bytes than their size implies are refused and
    /// leave the texture untouched.
    pub fn upload_frame(&mut self, _ctx: &mut GlContext, frame: &Frame) -> Result<(), RenderError> {
        check_frame_len(frame)?;
        let format = TextureFormat::for_frame(frame.format);
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, self.id));
        if format != self.format || frame.width != self.width || frame.height != self.height {
            allocate(format, frame.width, frame.height, frame.data.as_ptr() as *const c_void);
            self.format = format;
            self.width = frame.width;
            self.height = frame.height;
        } else {
            gl::call!(gl::TexSubImage2D(
                gl::TEXTURE_2D,
                0,
                0,
                0,
                frame.width as i32,
                frame.height as i32,
                format.pixel_format(),
                format.pixel_type(),
                frame.data.as_ptr() as *const c_void,
            ));
        }
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, 0));
        Ok(())
    }

    pub fn id(&self) -> gl::types::GLuint {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for Texture2D {
    fn drop(&mut self) {
        gl::call!(gl::DeleteTextures(1, &self.id));
    }
}

/// (Re)allocates the storage of the texture bound to TEXTURE_2D.
fn allocate(format: TextureFormat, width: u32, height: u32, data: *const c_void) {
    gl::call!(gl::TexImage2D(
        gl::TEXTURE_2D,
        0,
        format.internal_format(),
        width as i32,
        height as i32,
        0,
        format.pixel_format(),
        format.pixel_type(),
        data,
    ));
}

/// GL reads `row_len * height` bytes from the pointer given to it, with the
/// unpack alignment set to 1 by [`GlContext::load`].
fn check_frame_len(frame: &Frame) -> Result<(), RenderError> {
    let expected = frame.row_len() * frame.height as usize;
    if frame.data.len() < expected {
        return Err(RenderError::FrameSize {
            width: frame.width,
            height: frame.height,
            expected,
            actual: frame.data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_frames_are_refused() {
        let frame = Frame {
            width: 2,
            height: 2,
            format: PixelFormat::Rgb8,
            data: vec![0; 3],
        };
        let err = check_frame_len(&frame).unwrap_err();
        assert!(
            matches!(
                err,
                RenderError::FrameSize {
                    expected: 12,
                    actual: 3,
                    ..
                }
            ),
            "{err}"
        );
    }

    #[test]
    fn frame_length_depends_on_format() {
        let mut frame = Frame::solid(3, 2, [1, 2, 3]);
        assert!(check_frame_len(&frame).is_ok());
        frame.format = PixelFormat::Rgba8;
        assert!(check_frame_len(&frame).is_err());
        frame.data.resize(3 * 2 * 4, 255);
        assert!(check_frame_len(&frame).is_ok());
        assert!(check_frame_len(&Frame::solid(0, 0, [0, 0, 0])).is_ok());
    }
}
