use crate::{DetectedObject, Frame, Result};

pub trait CameraSource {
    /// Open a camera source by device index, path or stream URL.
    fn open(spec: &str) -> Result<Self>
    where
        Self: Sized;

    /// Read a single frame.
    fn read(&mut self) -> Result<Frame>;
}

/// Turns one frame into zero or more candidate objects, synchronously.
pub trait ObjectDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedObject>>;
}
