//! Dedicated capture thread feeding a [`Perception`]

use crate::{CameraSource, Error, Perception, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Pause after a failed read or detection
pub const READ_BACKOFF: Duration = Duration::from_millis(100);

/// Spawn the capture loop on its own OS thread.
///
/// The loop runs until `running` is cleared. Each iteration reads one frame
/// and publishes its detections; `frame_interval` caps the rate for sources
/// that return instantly.
pub fn spawn_capture_loop<C>(
    mut camera: C,
    mut perception: Perception,
    running: Arc<AtomicBool>,
    frame_interval: Duration,
) -> Result<JoinHandle<()>>
where
    C: CameraSource + Send + 'static,
{
    thread::Builder::new()
        .name("capture".to_string())
        .spawn(move || {
            info!("Camera capture loop started");
            while running.load(Ordering::Relaxed) {
                let started = Instant::now();
                let outcome = camera.read().and_then(|frame| perception.update(&frame));
                match outcome {
                    Ok(count) => debug!("frame processed, {} objects", count),
                    Err(e) => {
                        warn!("Failed to process camera frame: {}", e);
                        thread::sleep(READ_BACKOFF);
                        continue;
                    }
                }
                if let Some(rest) = frame_interval.checked_sub(started.elapsed()) {
                    thread::sleep(rest);
                }
            }
            info!("Camera capture loop stopped");
        })
        .map_err(|e| Error::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColorBlobDetector, Frame};

    struct Broken;
    impl CameraSource for Broken {
        fn open(_spec: &str) -> Result<Self> {
            Ok(Broken)
        }
        fn read(&mut self) -> Result<Frame> {
            Err(Error::Io("no signal".into()))
        }
    }

    #[cfg(feature = "mock")]
    #[test]
    fn test_loop_publishes_and_stops() {
        use crate::MockCamera;

        let perception = Perception::new(ColorBlobDetector::default());
        let snapshot = perception.snapshot();
        let running = Arc::new(AtomicBool::new(true));
        let camera = MockCamera::open("mock").unwrap();

        let handle = spawn_capture_loop(
            camera,
            perception,
            Arc::clone(&running),
            Duration::from_millis(5),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while snapshot.latest().sequence < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        let latest = snapshot.latest();
        assert!(latest.sequence >= 2);
        assert!(latest.find("red_ball").is_some());
    }

    #[test]
    fn test_read_failures_leave_snapshot_empty() {
        let perception = Perception::new(ColorBlobDetector::default());
        let snapshot = perception.snapshot();
        let running = Arc::new(AtomicBool::new(true));

        let handle =
            spawn_capture_loop(Broken, perception, Arc::clone(&running), Duration::ZERO).unwrap();
        thread::sleep(Duration::from_millis(250));
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        assert_eq!(snapshot.latest().sequence, 0);
    }
}
