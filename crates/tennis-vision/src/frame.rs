//! Decoded frame stream contract.

use async_trait::async_trait;
use image::RgbImage;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::DecodeError;

/// One decoded video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based position in the stream
    pub index: u64,
    /// Seconds from the start of the video
    pub timestamp: f64,
    pub image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(index: u64, timestamp: f64, image: Arc<RgbImage>) -> Self {
        Self {
            index,
            timestamp,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Sequential frame source with a known frame rate.
///
/// Implemented by the external decoding layer. `close` releases the decode
/// handle and must be safe to call more than once.
#[async_trait]
pub trait FrameSource: Send {
    fn fps(&self) -> f64;

    /// Next frame, `Ok(None)` at end of stream.
    async fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError>;

    async fn close(&mut self);
}

/// In-memory frame source.
pub struct VecFrameSource {
    fps: f64,
    frames: VecDeque<Frame>,
    fail_at: Option<u64>,
    closed: Arc<AtomicBool>,
}

impl VecFrameSource {
    pub fn new(fps: f64, frames: Vec<Frame>) -> Self {
        Self {
            fps,
            frames: frames.into(),
            fail_at: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `count` frames sharing one image.
    pub fn repeat(fps: f64, image: RgbImage, count: u64) -> Self {
        let image = Arc::new(image);
        let frames = (0..count)
            .map(|i| Frame::new(i, i as f64 / fps, Arc::clone(&image)))
            .collect();
        Self::new(fps, frames)
    }

    /// Fail with a stream error when frame `index` is requested.
    pub fn with_failure_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Flag set once `close` has been called.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl FrameSource for VecFrameSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let next = self.frames.pop_front();
        if let (Some(frame), Some(fail_at)) = (&next, self.fail_at) {
            if frame.index == fail_at {
                return Err(DecodeError::stream(fail_at, "corrupt packet"));
            }
        }
        Ok(next)
    }

    async fn close(&mut self) {
        self.frames.clear();
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_repeat_source_yields_ordered_frames() {
        let mut source = VecFrameSource::repeat(25.0, RgbImage::new(4, 4), 3);
        let mut indices = Vec::new();
        while let Some(frame) = source.next_frame().await.unwrap() {
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_failure_and_close() {
        let mut source = VecFrameSource::repeat(25.0, RgbImage::new(4, 4), 5).with_failure_at(1);
        let closed = source.closed_flag();
        assert!(source.next_frame().await.unwrap().is_some());
        assert!(matches!(
            source.next_frame().await,
            Err(DecodeError::Stream { frame_index: 1, .. })
        ));
        source.close().await;
        assert!(closed.load(Ordering::SeqCst));
        assert!(source.next_frame().await.unwrap().is_none());
    }
}
