use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

use crate::capture::{yuyv_to_rgb, CaptureError, Frame, FrameSource, PixelFormat};

const BUFFER_COUNT: u32 = 4;

/// Captures frames from `/dev/video<index>` through memory-mapped V4L2
/// buffers. MJPEG is preferred; YUYV is converted in software.
pub struct DeviceSource {
    index: usize,
    format: Format,
    stream: Stream<'static>,
    frame: Frame,
}

impl DeviceSource {
    pub fn open(index: usize, width: u32, height: u32) -> Result<DeviceSource, CaptureError> {
        let device = Device::new(index)?;
        let mut format = device.format()?;
        format.width = width;
        format.height = height;
        format.fourcc = FourCC::new(b"MJPG");
        let format = match device.set_format(&format) {
            Ok(actual) if is_supported(actual.fourcc) => actual,
            _ => {
                log::debug!("capture device {index} has no MJPEG mode, trying YUYV");
                format.fourcc = FourCC::new(b"YUYV");
                device.set_format(&format)?
            }
        };
        if !is_supported(format.fourcc) {
            return Err(CaptureError::UnsupportedFormat(format.fourcc.to_string()));
        }
        if format.width != width || format.height != height {
            log::warn!(
                "capture device {index} doesn't support {width}x{height}, using {}x{}",
                format.width,
                format.height
            );
        }
        let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;
        Ok(DeviceSource {
            index,
            frame: Frame::solid(format.width, format.height, [0, 0, 0]),
            format,
            stream,
        })
    }
}

fn is_supported(fourcc: FourCC) -> bool {
    fourcc == FourCC::new(b"MJPG") || fourcc == FourCC::new(b"YUYV")
}

impl FrameSource for DeviceSource {
    fn next_frame(&mut self) -> Result<&Frame, CaptureError> {
        let (buffer, meta) = self.stream.next()?;
        let used = (meta.bytesused as usize).min(buffer.len());
        let buffer = &buffer[..used];
        if self.format.fourcc == FourCC::new(b"MJPG") {
            let image = image::load_from_memory_with_format(buffer, image::ImageFormat::Jpeg)?;
            self.frame = Frame::from_image(image);
        } else {
            let expected = self.format.width as usize * self.format.height as usize * 2;
            if buffer.len() < expected {
                return Err(CaptureError::ShortFrame {
                    expected,
                    actual: buffer.len(),
                });
            }
            self.frame.width = self.format.width;
            self.frame.height = self.format.height;
            self.frame.format = PixelFormat::Rgb8;
            yuyv_to_rgb(
                buffer,
                self.format.width,
                self.format.height,
                &mut self.frame.data,
            );
        }
        Ok(&self.frame)
    }

    fn describe(&self) -> String {
        format!(
            "/dev/video{} ({}x{} {})",
            self.index, self.format.width, self.format.height, self.format.fourcc
        )
    }
}
