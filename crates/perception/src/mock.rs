use crate::{CameraSource, Frame, PixelFormat, Result};
use time::OffsetDateTime;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const BALL_SIZE: u32 = 60;
const STEP_PX: u32 = 16;

/// Synthetic camera: a red square sweeping left to right over a dark
/// background, plus a static green bar near the bottom edge.
pub struct MockCamera {
    counter: u64,
}

impl MockCamera {
    /// Left edge of the red square for the frame about to be produced
    pub fn ball_x(&self) -> u32 {
        let travel = u64::from(WIDTH - BALL_SIZE);
        ((self.counter * u64::from(STEP_PX)) % travel) as u32
    }
}

impl CameraSource for MockCamera {
    fn open(_spec: &str) -> Result<Self> {
        Ok(Self { counter: 0 })
    }

    fn read(&mut self) -> Result<Frame> {
        let ball_x = self.ball_x();
        let ball_y = (HEIGHT - BALL_SIZE) / 2;
        self.counter += 1;

        let mut data = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let rgb = if (ball_x..ball_x + BALL_SIZE).contains(&x)
                    && (ball_y..ball_y + BALL_SIZE).contains(&y)
                {
                    [220, 30, 30]
                } else if (40..200).contains(&x) && (420..450).contains(&y) {
                    [30, 200, 30]
                } else {
                    [35, 35, 35]
                };
                let idx = ((y * WIDTH + x) * 3) as usize;
                data[idx..idx + 3].copy_from_slice(&rgb);
            }
        }
        Ok(Frame {
            width: WIDTH,
            height: HEIGHT,
            pixel_format: PixelFormat::Rgb8,
            data,
            ts: Some(OffsetDateTime::now_utc()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColorBlobDetector, ObjectDetector};

    #[test]
    fn test_mock_frame_contains_ball_and_bar() {
        let mut camera = MockCamera::open("mock").unwrap();
        let frame = camera.read().unwrap();
        assert_eq!(frame.data.len(), (WIDTH * HEIGHT * 3) as usize);

        let found = ColorBlobDetector::default().detect(&frame).unwrap();
        let names: Vec<_> = found.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["red_ball", "green_object"]);
        assert_eq!(found[0].area, u64::from(BALL_SIZE * BALL_SIZE));
    }

    #[test]
    fn test_ball_sweeps() {
        let mut camera = MockCamera::open("mock").unwrap();
        let first = camera.ball_x();
        camera.read().unwrap();
        assert_eq!(camera.ball_x(), first + STEP_PX);
    }
}
