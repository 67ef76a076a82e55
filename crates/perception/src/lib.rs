//! perception: camera abstraction, heuristic object detection and the shared
//! latest-detections snapshot used for steering decisions.

mod types;
pub use types::{
    direction, BoundingBox, DetectedObject, Detections, Direction, Frame, PixelFormat, Point,
    DEAD_ZONE_FRACTION, DEFAULT_FRAME_WIDTH,
};

mod error;
pub use error::{Error, Result};

mod traits;
pub use traits::{CameraSource, ObjectDetector};

mod detect;
pub use detect::{
    default_palette, rgb_to_hsv, ColorBlobDetector, ColorRange, DetectorChain, BALL_ASPECT_RANGE,
    BLOB_CONFIDENCE, MIN_BLOB_AREA,
};

mod snapshot;
pub use snapshot::{Perception, PerceptionSnapshot};

mod capture;
pub use capture::{spawn_capture_loop, READ_BACKOFF};

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::MockCamera;

#[cfg(feature = "opencv")]
mod opencv_backend;
#[cfg(feature = "opencv")]
pub use opencv_backend::{
    CascadePersonDetector, OpenCvCamera, OpenCvColorDetector, DEFAULT_FACE_CASCADE,
    PERSON_CONFIDENCE,
};

/// Initialize the perception system
pub fn init() -> Result<()> {
    tracing::info!("Initializing perception system");
    Ok(())
}

/// Detector used when no person detector is available: colour blobs only.
pub fn default_detector() -> DetectorChain {
    DetectorChain::new().push(ColorBlobDetector::default())
}
