//! # Background Motion Detection Library
//!
//! This library detects motion in a video stream by comparing every frame against an
//! exponentially weighted moving average of the previous ones. Changed pixels are thresholded
//! into a binary mask, grouped into regions and reported as bounding rectangles.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use bgmotion::prelude::v1::*;
//! ```
//!
//! Frames are [`image`](https://crates.io/crates/image) buffers, so you may need that crate to
//! build them yourself.

pub mod background;
pub mod change;
pub mod config;
pub mod frame;
pub mod pipeline;
pub mod regions;
pub mod stream;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            background::BackgroundModel,
            change::{motion_percentage, ChangeDetector, ChangeMask},
            config::MotionConfig,
            frame::{FloatFrame, Frame, FrameLayout},
            pipeline::{FrameReport, MotionPipeline, RunStats},
            regions::{Contour, Rectangle, RegionExtractor},
            stream::{FrameSink, FrameSource, Frames, MemorySink, MemorySource},
        };
        pub use anyhow::{anyhow, bail, ensure, Context, Error, Result};
    }
}
