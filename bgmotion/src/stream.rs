//! # Frame sources and sinks

use crate::prelude::v1::*;
use std::collections::VecDeque;

/// Sequential frame producer, typically a video decoder.
pub trait FrameSource {
    /// Read the next frame in the stream.
    ///
    /// `Ok(None)` is returned once the stream is exhausted. Any `Err` is a decoding or I/O
    /// failure and should be treated as fatal, the stream is not expected to recover from it.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Get the framerate of the stream.
    ///
    /// This will return `Some(framerate)` if it is known. On realtime streams it may
    /// not always be known. In such cases, `None` is returned.
    fn framerate(&self) -> Option<f64> {
        None
    }

    /// Get the frame dimensions of the stream.
    ///
    /// This will return `Some((width, height))` if the dimensions are known before the first
    /// frame is read.
    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        (**self).read_frame()
    }

    fn framerate(&self) -> Option<f64> {
        (**self).framerate()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        (**self).dimensions()
    }
}

/// Sequential frame consumer, typically a video encoder.
pub trait FrameSink {
    /// Append a frame to the output.
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the output.
    ///
    /// Called once after the last frame has been written.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Lazy iterator over the frames of a source.
///
/// Yields `Ok` frames until the end of the stream. A read error is yielded once, after which the
/// iterator stays exhausted.
pub struct Frames<'a, S: ?Sized> {
    source: &'a mut S,
    done: bool,
}

impl<'a, S: FrameSource + ?Sized> Frames<'a, S> {
    pub fn new(source: &'a mut S) -> Self {
        Self {
            source,
            done: false,
        }
    }
}

impl<'a, S: FrameSource + ?Sized> Iterator for Frames<'a, S> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.source.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<'a, S: FrameSource + ?Sized> std::iter::FusedIterator for Frames<'a, S> {}

/// In-memory frame source.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<Frame>,
    framerate: Option<f64>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            framerate: None,
        }
    }

    pub fn with_framerate(mut self, framerate: f64) -> Self {
        self.framerate = Some(framerate);
        self
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }

    fn framerate(&self) -> Option<f64> {
        self.framerate
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.front().map(Frame::dimensions)
    }
}

/// In-memory frame sink.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub frames: Vec<Frame>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        ensure!(!self.finished, "Sink already finished");
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
