use std::path::{Path, PathBuf};

use crate::capture::{decode_file, CaptureError, Frame, FrameSource};

/// Yields the same decoded image on every call.
pub struct StillImageSource {
    path: PathBuf,
    frame: Frame,
}

impl StillImageSource {
    pub fn open(path: &Path) -> Result<StillImageSource, CaptureError> {
        let frame = Frame::from_image(decode_file(path)?);
        Ok(StillImageSource {
            path: path.to_path_buf(),
            frame,
        })
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<&Frame, CaptureError> {
        Ok(&self.frame)
    }

    fn describe(&self) -> String {
        format!(
            "image {} ({}x{})",
            self.path.display(),
            self.frame.width,
            self.frame.height
        )
    }
}

/// Yields a single-colored frame on every call.
pub struct SolidColorSource {
    color: [u8; 3],
    frame: Frame,
}

impl SolidColorSource {
    pub fn new(width: u32, height: u32, color: [u8; 3]) -> SolidColorSource {
        SolidColorSource {
            color,
            frame: Frame::solid(width, height, color),
        }
    }
}

impl FrameSource for SolidColorSource {
    fn next_frame(&mut self) -> Result<&Frame, CaptureError> {
        Ok(&self.frame)
    }

    fn describe(&self) -> String {
        let [r, g, b] = self.color;
        format!(
            "solid color #{r:02x}{g:02x}{b:02x} ({}x{})",
            self.frame.width, self.frame.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_image_is_a_decode_error() {
        let result = StillImageSource::open(Path::new("no/such/lena.jpg"));
        assert!(matches!(result, Err(CaptureError::Decode { .. })));
    }

    #[test]
    fn describes_solid_color() {
        let source = SolidColorSource::new(4, 3, [255, 0, 16]);
        assert_eq!(source.describe(), "solid color #ff0010 (4x3)");
    }
}
