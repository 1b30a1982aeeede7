//! OpenCV video frame source and sink

use bgmotion::prelude::v1::{Result, *};
use log::*;
use opencv::core::{Scalar, Size, CV_8UC1, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::*;

/// Framerate used for the output when the input does not report one.
const DEFAULT_FRAMERATE: f64 = 30.0;

/// Video file or stream decoded with `VideoCapture`.
pub struct CvSource {
    capture: VideoCapture,
    frame: Mat,
    rgb: Mat,
}

impl CvSource {
    pub fn try_new(stream: &str) -> Result<Self> {
        let capture = VideoCapture::from_file(stream, CAP_ANY)?;

        ensure!(capture.is_opened()?, "Unable to open {stream}");

        Ok(Self {
            capture,
            frame: Default::default(),
            rgb: Default::default(),
        })
    }
}

impl FrameSource for CvSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if !self.capture.read(&mut self.frame)? {
            return Ok(None);
        }

        imgproc::cvt_color(&self.frame, &mut self.rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let layout = FrameLayout {
            width: self.rgb.cols() as _,
            height: self.rgb.rows() as _,
            channels: 3,
        };

        Frame::from_raw(layout, self.rgb.data_bytes()?.to_vec()).map(Some)
    }

    fn framerate(&self) -> Option<f64> {
        self.capture.get(CAP_PROP_FPS).ok().filter(|&fps| fps > 0.0)
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        let width = self.capture.get(CAP_PROP_FRAME_WIDTH).ok()?;
        let height = self.capture.get(CAP_PROP_FRAME_HEIGHT).ok()?;

        if width > 0.0 && height > 0.0 {
            Some((width as _, height as _))
        } else {
            None
        }
    }
}

/// Video file encoded with `VideoWriter`.
///
/// The writer is opened on the first frame, using its dimensions.
pub struct CvSink {
    path: String,
    framerate: f64,
    writer: Option<VideoWriter>,
    bgr: Mat,
}

impl CvSink {
    pub fn try_new(path: &str, framerate: Option<f64>) -> Result<Self> {
        Ok(Self {
            path: path.to_string(),
            framerate: framerate.unwrap_or(DEFAULT_FRAMERATE),
            writer: None,
            bgr: Default::default(),
        })
    }

    fn open_writer(&self, (width, height): (u32, u32)) -> Result<VideoWriter> {
        let fourcc = VideoWriter::fourcc('D', 'I', 'V', 'X')?;

        let writer = VideoWriter::new(
            &self.path,
            fourcc,
            self.framerate,
            Size::new(width as _, height as _),
            true,
        )?;

        ensure!(writer.is_opened()?, "Unable to open {} for writing", self.path);

        info!(
            "Writing {width}x{height} at {:.2} fps to {}",
            self.framerate, self.path
        );

        Ok(writer)
    }
}

impl FrameSink for CvSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let (width, height) = frame.dimensions();

        if self.writer.is_none() {
            self.writer = Some(self.open_writer((width, height))?);
        }

        let (typ, code) = match frame {
            Frame::Gray(_) => (CV_8UC1, imgproc::COLOR_GRAY2BGR),
            Frame::Rgb(_) => (CV_8UC3, imgproc::COLOR_RGB2BGR),
        };

        let mut mat =
            Mat::new_rows_cols_with_default(height as _, width as _, typ, Scalar::all(0.0))?;
        mat.data_bytes_mut()?.copy_from_slice(frame.as_raw());

        imgproc::cvt_color(&mat, &mut self.bgr, code, 0)?;

        if let Some(writer) = &mut self.writer {
            writer.write(&self.bgr)?;
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            writer.release()?;
        }

        Ok(())
    }
}
