//! Latest-detections store shared between the capture thread and decision code

use crate::{DetectedObject, Detections, Frame, ObjectDetector, Result};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Holds the most recent [`Detections`].
///
/// Writers build a complete new set and swap the `Arc` under the lock, so a
/// reader always sees every object of exactly one frame.
#[derive(Debug, Default)]
pub struct PerceptionSnapshot {
    latest: RwLock<Arc<Detections>>,
}

impl PerceptionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot. Cheap; holds no lock after returning.
    pub fn latest(&self) -> Arc<Detections> {
        match self.latest.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the whole set of detections with those of a newer frame
    pub fn publish(&self, objects: Vec<DetectedObject>, frame: &Frame) {
        let mut guard = match self.latest.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = Detections {
            objects,
            frame_width: frame.width,
            frame_height: frame.height,
            sequence: guard.sequence + 1,
            captured_at: frame.ts,
        };
        debug!(
            "snapshot #{} published with {} objects",
            next.sequence,
            next.objects.len()
        );
        *guard = Arc::new(next);
    }

    /// Objects of the latest snapshot, in detection order
    pub fn current_objects(&self) -> Vec<DetectedObject> {
        self.latest().objects.clone()
    }

    pub fn find(&self, name: &str) -> Option<DetectedObject> {
        self.latest().find(name).cloned()
    }

    pub fn largest(&self, type_filter: Option<&str>) -> Option<DetectedObject> {
        self.latest().largest(type_filter).cloned()
    }
}

/// The frame-processing path: owns a detector and writes into a shared snapshot.
pub struct Perception {
    detector: Box<dyn ObjectDetector + Send>,
    snapshot: Arc<PerceptionSnapshot>,
}

impl Perception {
    pub fn new(detector: impl ObjectDetector + Send + 'static) -> Self {
        Self {
            detector: Box::new(detector),
            snapshot: Arc::new(PerceptionSnapshot::new()),
        }
    }

    /// Handle for readers
    pub fn snapshot(&self) -> Arc<PerceptionSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Detect objects in `frame` and publish them. On detector failure the
    /// previous snapshot stays in place.
    pub fn update(&mut self, frame: &Frame) -> Result<usize> {
        let objects = self.detector.detect(frame)?;
        let count = objects.len();
        self.snapshot.publish(objects, frame);
        Ok(count)
    }
}
