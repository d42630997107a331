//! Sources of camera frames: a V4L2 device, a still image, or a synthetic
//! solid color.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use thiserror::Error;

mod convert;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod device;
mod still;

pub use convert::yuyv_to_rgb;
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use device::DeviceSource;
pub use still::{SolidColorSource, StillImageSource};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("could not decode image {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not decode camera frame: {0}")]
    DecodeFrame(#[from] image::ImageError),
    #[error("camera i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("camera delivers unsupported pixel format {0}")]
    UnsupportedFormat(String),
    #[error("camera frame has {actual} bytes, expected at least {expected}")]
    ShortFrame { expected: usize, actual: usize },
    #[error("{0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    /// Like [`PixelFormat::Rgb8`] with the red and blue channels swapped.
    Bgr8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    pub fn is_bgr(self) -> bool {
        self == PixelFormat::Bgr8
    }
}

/// A CPU-side color image with tightly packed rows, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn solid(width: u32, height: u32, color: [u8; 3]) -> Frame {
        let pixel_count = width as usize * height as usize;
        Frame {
            width,
            height,
            format: PixelFormat::Rgb8,
            data: color.repeat(pixel_count),
        }
    }

    pub fn from_image(image: DynamicImage) -> Frame {
        let image = image.into_rgb8();
        Frame {
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Rgb8,
            data: image.into_raw(),
        }
    }

    pub fn row_len(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }
}

/// Something that yields camera frames on demand.
///
/// The returned frame is only valid until the next call; sources reuse their
/// buffers.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<&Frame, CaptureError>;

    fn describe(&self) -> String;
}

/// Where frames come from, as configured.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Device { index: usize, width: u32, height: u32 },
    Image { path: PathBuf },
    Solid { width: u32, height: u32, color: [u8; 3] },
}

impl Default for SourceConfig {
    fn default() -> Self {
        if cfg!(all(feature = "camera", target_os = "linux")) {
            SourceConfig::Device {
                index: 0,
                width: 640,
                height: 480,
            }
        } else {
            SourceConfig::Solid {
                width: 640,
                height: 480,
                color: [96, 96, 96],
            }
        }
    }
}

pub fn open(config: &SourceConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    let source: Box<dyn FrameSource> = match config {
        SourceConfig::Image { path } => Box::new(StillImageSource::open(path)?),
        &SourceConfig::Solid {
            width,
            height,
            color,
        } => Box::new(SolidColorSource::new(width, height, color)),
        &SourceConfig::Device {
            index,
            width,
            height,
        } => open_device(index, width, height)?,
    };
    log::info!("capturing frames from {}", source.describe());
    Ok(source)
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn open_device(index: usize, width: u32, height: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
    Ok(Box::new(DeviceSource::open(index, width, height)?))
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn open_device(index: usize, _: u32, _: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::Unsupported(format!(
        "capture device {index} requested, but this build has no camera support \
         (enable the \"camera\" feature)"
    )))
}

fn decode_file(path: &Path) -> Result<DynamicImage, CaptureError> {
    image::open(path).map_err(|source| CaptureError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_frame_is_tightly_packed() {
        let frame = Frame::solid(3, 2, [255, 128, 0]);
        assert_eq!(frame.row_len(), 9);
        assert_eq!(frame.data.len(), 18);
        assert_eq!(&frame.data[15..18], &[255, 128, 0]);
    }

    #[test]
    fn frames_from_images_are_rgb() {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 40]));
        let frame = Frame::from_image(DynamicImage::ImageRgba8(image));
        assert_eq!(frame.format, PixelFormat::Rgb8);
        assert_eq!(frame.data, [10, 20, 30].repeat(4));
    }

    #[test]
    fn opens_solid_source() {
        let mut source = open(&SourceConfig::Solid {
            width: 1,
            height: 1,
            color: [255, 255, 255],
        })
        .unwrap();
        let frame = source.next_frame().unwrap();
        assert_eq!(frame.data, vec![255, 255, 255]);
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn device_without_camera_support_is_an_error() {
        let result = open(&SourceConfig::Device {
            index: 0,
            width: 640,
            height: 480,
        });
        assert!(matches!(result, Err(CaptureError::Unsupported(_))));
    }
}
