//! # Background model

use crate::prelude::v1::*;

/// Exponential moving average of the scene.
///
/// The model keeps a single floating point image. It is lazily initialized from the first frame,
/// and from then on every frame is blended in with a fixed weight. There is no history beyond the
/// running average itself.
#[derive(Clone, Debug, Default)]
pub struct BackgroundModel {
    accumulator: Option<FloatFrame>,
}

impl BackgroundModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.accumulator.is_some()
    }

    /// Layout of the frames the model was built from.
    pub fn layout(&self) -> Option<FrameLayout> {
        self.accumulator.as_ref().map(FloatFrame::layout)
    }

    /// Get the underlying accumulator.
    pub fn accumulator(&self) -> Option<&FloatFrame> {
        self.accumulator.as_ref()
    }

    /// Start the model from `frame`, discarding any previous state.
    pub fn initialize(&mut self, frame: &Frame) {
        self.accumulator = Some(FloatFrame::from_frame(frame));
    }

    /// Blend `frame` into the model.
    ///
    /// Every sample becomes `alpha * frame + (1 - alpha) * background`. Smaller `alpha` adapts to
    /// scene changes slower, but is less sensitive to transient motion. An uninitialized model is
    /// initialized from `frame` instead.
    ///
    /// Fails if the frame layout differs from the one the model was built from.
    pub fn update(&mut self, frame: &Frame, alpha: f32) -> Result<()> {
        match &mut self.accumulator {
            Some(acc) => acc.blend(frame, alpha),
            None => {
                self.initialize(frame);
                Ok(())
            }
        }
    }

    /// Overwrite the model with `frame`.
    ///
    /// Unlike [`initialize`](Self::initialize), this refuses to change the layout of an existing
    /// model.
    pub fn reset(&mut self, frame: &Frame) -> Result<()> {
        match &mut self.accumulator {
            Some(acc) => acc.assign(frame),
            None => {
                self.initialize(frame);
                Ok(())
            }
        }
    }

    /// Get the current background estimate as an 8-bit frame.
    pub fn estimate(&self) -> Result<Frame> {
        self.accumulator
            .as_ref()
            .ok_or_else(|| anyhow!("Background model is not initialized"))?
            .to_frame()
    }
}
