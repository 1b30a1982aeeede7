//! # Motion detection pipeline
//!
//! Drives the background model, change detector and region extractor over a stream of frames,
//! and decides which frames contain motion.

use crate::prelude::v1::*;
use log::*;
use std::time::{Duration, Instant};

/// Counters accumulated over a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Total number of processed frames.
    pub frames: usize,
    /// Number of frames classified as having motion.
    pub motion_frames: usize,
    /// Wall-clock time spent in [`MotionPipeline::run`].
    pub elapsed: Duration,
}

/// Outcome of processing a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    /// Zero-based position of the frame in the stream.
    pub index: usize,
    /// The frame was used to initialize the background, no detection was done.
    pub baseline: bool,
    pub motion_percentage: f64,
    /// The change was too large, and the background got replaced with the frame.
    pub background_reset: bool,
    /// The frame was classified as having motion.
    pub motion: bool,
    /// Bounding rectangles of the changed regions.
    pub regions: Vec<Rectangle>,
}

impl FrameReport {
    fn baseline(index: usize) -> Self {
        Self {
            index,
            baseline: true,
            motion_percentage: 0.0,
            background_reset: false,
            motion: false,
            regions: vec![],
        }
    }
}

/// Moving average motion detector.
///
/// Processing is strictly sequential, each frame depends on the background left behind by the
/// previous one.
pub struct MotionPipeline {
    config: MotionConfig,
    background: BackgroundModel,
    detector: ChangeDetector,
    extractor: RegionExtractor,
    stats: RunStats,
}

impl MotionPipeline {
    pub fn new(config: MotionConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            background: BackgroundModel::new(),
            detector: ChangeDetector::new(config.diff_threshold),
            extractor: RegionExtractor::new(config.dilate_passes, config.erode_passes),
            stats: Default::default(),
            config,
        })
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn background(&self) -> &BackgroundModel {
        &self.background
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Process a single frame in the stream.
    ///
    /// Returns the frame to be written out, with the changed regions outlined if it was
    /// classified as having motion, along with a report of what was found.
    ///
    /// The first frame only initializes the background. Afterwards every frame is blended into
    /// the background, compared against the resulting estimate, and the changed pixels are
    /// counted. If more than `reset_percentage` of the frame changed, the background is replaced
    /// with the frame outright, instead of waiting for the change to get averaged in.
    ///
    /// Zero-area frames, and frames whose layout differs from the first one, are errors.
    pub fn process_frame(&mut self, mut frame: Frame) -> Result<(Frame, FrameReport)> {
        let index = self.stats.frames;

        ensure!(
            frame.area() > 0,
            "Frame {index} has zero area ({:?})",
            frame.dimensions()
        );

        let smoothed = frame.smooth(self.config.blur_radius);

        if !self.background.is_initialized() {
            self.background.initialize(&smoothed);
            self.stats.frames += 1;
            debug!("Frame {index}: initialized background {:?}", smoothed.layout());
            return Ok((frame, FrameReport::baseline(index)));
        }

        self.background
            .update(&smoothed, self.config.alpha)
            .with_context(|| format!("Frame {index}"))?;

        let estimate = self.background.estimate()?;
        let mut mask = self.detector.detect(&smoothed, &estimate)?;
        let motion_percentage = mask.motion_percentage()?;

        // Likely the camera adjusting exposure, rather than something moving.
        let background_reset = motion_percentage > self.config.reset_percentage;

        if background_reset {
            debug!("Frame {index}: {motion_percentage:.2}% changed, resetting background");
            self.background.reset(&smoothed)?;
        }

        let regions = self.extractor.extract(&mut mask);

        let motion = motion_percentage > self.config.motion_percentage;

        if motion {
            self.stats.motion_frames += 1;

            for rect in &regions {
                frame.draw_rectangle(rect, self.config.rect_color, self.config.rect_thickness);
            }
        }

        self.stats.frames += 1;

        trace!(
            "Frame {index}: {motion_percentage:.3}% changed, {} regions, motion: {motion}",
            regions.len()
        );

        Ok((
            frame,
            FrameReport {
                index,
                baseline: false,
                motion_percentage,
                background_reset,
                motion,
                regions,
            },
        ))
    }

    /// Process every frame of `source`, writing them to `sink`.
    ///
    /// Each input frame produces exactly one output frame. The run ends at the end of the stream,
    /// or at the first error, which is returned after the statistics gathered so far are logged.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<RunStats>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        let start = Instant::now();
        let result = self.drive(source, sink, start);
        self.stats.elapsed = start.elapsed();

        match result {
            Ok(()) => Ok(self.stats),
            Err(e) => {
                warn!(
                    "Stopped after {} frames ({} with motion): {e}",
                    self.stats.frames, self.stats.motion_frames
                );
                Err(e)
            }
        }
    }

    fn drive<S, K>(&mut self, source: &mut S, sink: &mut K, start: Instant) -> Result<()>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        for frame in Frames::new(source) {
            let (frame, report) = self.process_frame(frame?)?;

            sink.write_frame(&frame)
                .with_context(|| format!("Failed to write frame {}", report.index))?;

            self.stats.elapsed = start.elapsed();

            if report.motion {
                debug!(
                    "Frame {}: motion in {} regions ({:.2}%)",
                    report.index,
                    report.regions.len(),
                    report.motion_percentage
                );
            }
        }

        sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    const SIZE: u32 = 100;

    fn black() -> Frame {
        GrayImage::new(SIZE, SIZE).into()
    }

    fn white() -> Frame {
        GrayImage::from_pixel(SIZE, SIZE, Luma([255])).into()
    }

    /// Black frame with a white `w`x`h` block at (10, 10), plus `extra` white pixels on the row
    /// below it.
    fn block(w: u32, h: u32, extra: u32) -> Frame {
        GrayImage::from_fn(SIZE, SIZE, |x, y| {
            let inside = (10..10 + w).contains(&x) && (10..10 + h).contains(&y);
            let below = y == 10 + h && (10..10 + extra).contains(&x);
            Luma([if inside || below { 255 } else { 0 }])
        })
        .into()
    }

    fn unblurred() -> MotionPipeline {
        MotionPipeline::new(MotionConfig {
            blur_radius: 0,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = MotionConfig {
            alpha: 2.0,
            ..Default::default()
        };
        assert!(MotionPipeline::new(config).is_err());
    }

    #[test]
    fn black_stream_then_white_frame() {
        let mut pipeline = MotionPipeline::new(Default::default()).unwrap();

        let reports = std::iter::repeat_with(black)
            .take(5)
            .chain(std::iter::once(white()))
            .map(|f| pipeline.process_frame(f).unwrap().1)
            .collect::<Vec<_>>();

        assert!(reports[0].baseline);
        assert!(reports[0].regions.is_empty());
        assert!(!reports[0].motion);

        for report in &reports[1..5] {
            assert!(!report.baseline);
            assert_eq!(report.motion_percentage, 0.0);
            assert!(!report.background_reset);
            assert!(!report.motion);
            assert!(report.regions.is_empty());
        }

        let last = &reports[5];
        assert_eq!(last.index, 5);
        assert_eq!(last.motion_percentage, 100.0);
        assert!(last.background_reset);
        assert!(last.motion);
        assert_eq!(
            last.regions,
            vec![Rectangle {
                x: 0,
                y: 0,
                width: SIZE,
                height: SIZE
            }]
        );

        assert_eq!(pipeline.stats().frames, 6);
        assert_eq!(pipeline.stats().motion_frames, 1);

        assert_eq!(
            pipeline.background().accumulator(),
            Some(&FloatFrame::from_frame(&white()))
        );
    }

    #[test]
    fn first_frame_is_baseline() {
        let mut pipeline = unblurred();
        let frame = block(40, 40, 0);
        let (out, report) = pipeline.process_frame(frame.clone()).unwrap();
        assert!(report.baseline);
        assert!(report.regions.is_empty());
        assert_eq!(out, frame);
        assert_eq!(pipeline.stats().motion_frames, 0);
        assert_eq!(pipeline.stats().frames, 1);
    }

    #[test]
    fn static_scene_has_no_motion() {
        let mut pipeline = MotionPipeline::new(Default::default()).unwrap();
        let scene: Frame = RgbImage::from_fn(SIZE, SIZE, |x, y| Rgb([x as u8, y as u8, 128])).into();

        for _ in 0..10 {
            let (out, report) = pipeline.process_frame(scene.clone()).unwrap();
            assert_eq!(report.motion_percentage, 0.0);
            assert!(report.regions.is_empty());
            assert_eq!(out, scene);
        }

        assert_eq!(pipeline.stats().motion_frames, 0);
    }

    #[test]
    fn moderate_motion_is_counted() {
        let mut pipeline = unblurred();
        pipeline.process_frame(black()).unwrap();

        let frame = block(20, 20, 0);
        let (out, report) = pipeline.process_frame(frame.clone()).unwrap();

        assert_eq!(report.motion_percentage, 4.0);
        assert!(report.motion);
        assert!(!report.background_reset);
        assert!(report.regions.iter().any(|r| r.area() > 0));
        assert_eq!(pipeline.stats().motion_frames, 1);
        assert_ne!(out, frame);

        // Blended, not replaced.
        let acc = pipeline.background().accumulator().unwrap();
        let inside = (15 * SIZE + 15) as usize;
        assert!((acc.as_slice()[inside] - 7.65).abs() < 1e-3);
    }

    #[test]
    fn small_motion_is_not_counted() {
        let mut pipeline = unblurred();
        pipeline.process_frame(black()).unwrap();

        let frame = block(5, 5, 0);
        let (out, report) = pipeline.process_frame(frame.clone()).unwrap();

        assert_eq!(report.motion_percentage, 0.25);
        assert!(!report.motion);
        assert!(!report.regions.is_empty());
        assert_eq!(out, frame);
        assert_eq!(pipeline.stats().motion_frames, 0);
    }

    #[test]
    fn motion_threshold_is_exclusive() {
        let mut pipeline = unblurred();
        pipeline.process_frame(black()).unwrap();

        let (_, report) = pipeline.process_frame(block(15, 5, 0)).unwrap();
        assert_eq!(report.motion_percentage, 0.75);
        assert!(!report.motion);

        let mut pipeline = unblurred();
        pipeline.process_frame(black()).unwrap();

        let (_, report) = pipeline.process_frame(block(15, 5, 1)).unwrap();
        assert!(report.motion_percentage > 0.75);
        assert!(report.motion);
        assert_eq!(pipeline.stats().motion_frames, 1);
    }

    #[test]
    fn reset_threshold_is_exclusive() {
        let mut pipeline = unblurred();
        pipeline.process_frame(black()).unwrap();

        let (_, report) = pipeline.process_frame(block(50, 50, 0)).unwrap();
        assert_eq!(report.motion_percentage, 25.0);
        assert!(!report.background_reset);
        assert!(report.motion);

        let mut pipeline = unblurred();
        pipeline.process_frame(black()).unwrap();

        let frame = block(50, 50, 1);
        let (_, report) = pipeline.process_frame(frame.clone()).unwrap();
        assert!(report.background_reset);
        assert_eq!(
            pipeline.background().accumulator(),
            Some(&FloatFrame::from_frame(&frame))
        );
    }

    #[test]
    fn reset_uses_smoothed_frame() {
        let mut pipeline = MotionPipeline::new(Default::default()).unwrap();
        pipeline.process_frame(black()).unwrap();

        let frame = block(60, 60, 0);
        let (_, report) = pipeline.process_frame(frame.clone()).unwrap();
        assert!(report.background_reset);

        let smoothed = frame.smooth(pipeline.config().blur_radius);
        assert_eq!(
            pipeline.background().accumulator(),
            Some(&FloatFrame::from_frame(&smoothed))
        );
    }

    #[test]
    fn motion_is_outlined() {
        let mut pipeline = MotionPipeline::new(MotionConfig {
            blur_radius: 0,
            dilate_passes: 0,
            erode_passes: 0,
            ..Default::default()
        })
        .unwrap();

        let background: Frame = RgbImage::new(SIZE, SIZE).into();
        pipeline.process_frame(background).unwrap();

        let frame: Frame = RgbImage::from_fn(SIZE, SIZE, |x, y| {
            if (30..50).contains(&x) && (30..50).contains(&y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
        .into();

        let (out, report) = pipeline.process_frame(frame).unwrap();

        assert_eq!(
            report.regions,
            vec![Rectangle {
                x: 30,
                y: 30,
                width: 20,
                height: 20
            }]
        );

        let Frame::Rgb(out) = out else {
            panic!("Expected a color frame");
        };

        let green = Rgb([0, 255, 0]);

        for x in [29, 30, 50, 51] {
            assert_eq!(*out.get_pixel(x, 40), green);
            assert_eq!(*out.get_pixel(40, x), green);
        }

        assert_eq!(*out.get_pixel(31, 40), Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(49, 40), Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(40, 40), Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(10, 10), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(52, 40), Rgb([0, 0, 0]));
    }

    #[test]
    fn single_pixel_motion_in_small_frame() {
        let mut pipeline = unblurred();

        pipeline.process_frame(GrayImage::new(10, 10).into()).unwrap();

        let mut frame = GrayImage::new(10, 10);
        frame.put_pixel(5, 5, Luma([255]));
        let (_, report) = pipeline.process_frame(frame.into()).unwrap();

        assert_approx_eq!(report.motion_percentage, 1.0);
        assert!(report.motion);
        assert!(!report.background_reset);
        assert_eq!(
            report.regions,
            vec![Rectangle {
                x: 0,
                y: 0,
                width: 10,
                height: 10
            }]
        );
        assert_eq!(pipeline.stats().motion_frames, 1);
    }

    #[test]
    fn resolution_change_is_fatal() {
        let mut pipeline = MotionPipeline::new(Default::default()).unwrap();
        pipeline.process_frame(black()).unwrap();
        assert!(pipeline.process_frame(GrayImage::new(50, 50).into()).is_err());
        assert!(pipeline.process_frame(RgbImage::new(SIZE, SIZE).into()).is_err());
    }

    #[test]
    fn zero_area_is_fatal() {
        let mut pipeline = MotionPipeline::new(Default::default()).unwrap();
        assert!(pipeline.process_frame(GrayImage::new(0, 10).into()).is_err());
        assert!(!pipeline.background().is_initialized());
        assert_eq!(pipeline.stats().frames, 0);
    }

    #[test]
    fn run_emits_every_frame() {
        let frames = std::iter::repeat_with(black)
            .take(5)
            .chain(std::iter::once(white()))
            .collect::<Vec<_>>();

        let mut source = MemorySource::new(frames);
        let mut sink = MemorySink::new();

        let mut pipeline = MotionPipeline::new(Default::default()).unwrap();
        let stats = pipeline.run(&mut source, &mut sink).unwrap();

        assert_eq!(stats.frames, 6);
        assert_eq!(stats.motion_frames, 1);
        assert_eq!(sink.frames.len(), 6);
        assert!(sink.finished);
        assert_eq!(sink.frames[4], black());
        assert_ne!(sink.frames[5], white());

        let Frame::Gray(last) = &sink.frames[5] else {
            panic!("Expected a gray frame");
        };
        assert_eq!(last.get_pixel(0, 50)[0], 150);
        assert_eq!(last.get_pixel(50, 0)[0], 150);
        assert_eq!(last.get_pixel(50, 50)[0], 255);
    }

    #[test]
    fn run_stops_on_decode_error() {
        struct Truncated(usize);

        impl FrameSource for Truncated {
            fn read_frame(&mut self) -> Result<Option<Frame>> {
                if self.0 == 0 {
                    bail!("Truncated stream");
                }
                self.0 -= 1;
                Ok(Some(black()))
            }
        }

        let mut source = Truncated(3);
        let mut sink = MemorySink::new();

        let mut pipeline = MotionPipeline::new(Default::default()).unwrap();
        assert!(pipeline.run(&mut source, &mut sink).is_err());

        assert_eq!(pipeline.stats().frames, 3);
        assert_eq!(sink.frames.len(), 3);
        assert!(!sink.finished);
    }
}
