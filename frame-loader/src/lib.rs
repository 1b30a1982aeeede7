//! Common frame source and sink loader.

use bgmotion::prelude::v1::*;
use image::ImageFormat;
use log::*;
use std::path::{Path, PathBuf};

/// Extensions that are written through a video encoder rather than as an image sequence.
const VIDEO_EXTENSIONS: &[&str] = &["avi", "mp4", "mkv", "mov"];

/// Create a frame source depending on the input.
///
/// If the input is a directory, its images are read in file name order. Anything else is opened
/// as a video, which requires the `opencv` feature.
pub fn create_source(input: &str) -> Result<Box<dyn FrameSource>> {
    if Path::new(input).is_dir() {
        let source = ImageSequenceSource::open(input)?;
        return Ok(Box::new(source));
    }

    open_video_source(input)
}

/// Create a frame sink depending on the output.
///
/// Outputs with a video container extension (`.avi`, `.mp4`, `.mkv`, `.mov`) are encoded as
/// video, which requires the `opencv` feature. Anything else is treated as a directory to write
/// numbered PNG files into.
pub fn create_sink(output: &str, framerate: Option<f64>) -> Result<Box<dyn FrameSink>> {
    if is_video_path(output) {
        open_video_sink(output, framerate)
    } else {
        let sink = ImageSequenceSink::create(output)?;
        Ok(Box::new(sink))
    }
}

fn is_video_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(feature = "opencv")]
fn open_video_source(input: &str) -> Result<Box<dyn FrameSource>> {
    cv_frames::CvSource::try_new(input).map(|s| Box::new(s) as _)
}

#[cfg(not(feature = "opencv"))]
fn open_video_source(input: &str) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "Cannot open {input}: not an image directory, and video input requires the `opencv` feature"
    ))
}

#[cfg(feature = "opencv")]
fn open_video_sink(output: &str, framerate: Option<f64>) -> Result<Box<dyn FrameSink>> {
    cv_frames::CvSink::try_new(output, framerate).map(|s| Box::new(s) as _)
}

#[cfg(not(feature = "opencv"))]
fn open_video_sink(output: &str, _framerate: Option<f64>) -> Result<Box<dyn FrameSink>> {
    Err(anyhow!(
        "Cannot write {output}: video output requires the `opencv` feature"
    ))
}

/// Directory of still images, read as consecutive frames.
pub struct ImageSequenceSource {
    paths: std::vec::IntoIter<PathBuf>,
    dimensions: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let mut paths = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .map(|e| e.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;

        paths.retain(|p| {
            p.is_file()
                && ImageFormat::from_path(p)
                    .map(|f| f.reading_enabled())
                    .unwrap_or(false)
        });
        paths.sort();

        ensure!(!paths.is_empty(), "No images found in {}", dir.display());

        let dimensions = image::image_dimensions(&paths[0]).ok();

        debug!("{} images in {}", paths.len(), dir.display());

        Ok(Self {
            paths: paths.into_iter(),
            dimensions,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        match self.paths.next() {
            Some(path) => {
                let image = image::open(&path)
                    .with_context(|| format!("Failed to decode {}", path.display()))?;
                Ok(Some(image.into()))
            }
            None => Ok(None),
        }
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }
}

/// Writes every frame as `NNNNNN.png` into a directory.
pub struct ImageSequenceSink {
    dir: PathBuf,
    count: usize,
}

impl ImageSequenceSink {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        Ok(Self { dir, count: 0 })
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let path = self.dir.join(format!("{:06}.png", self.count));

        let saved = match frame {
            Frame::Gray(img) => img.save(&path),
            Frame::Rgb(img) => img.save(&path),
        };

        saved.with_context(|| format!("Failed to write {}", path.display()))?;

        self.count += 1;

        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        debug!("Wrote {} frames to {}", self.count, self.dir.display());
        Ok(())
    }
}
