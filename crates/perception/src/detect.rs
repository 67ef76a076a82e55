//! Colour-blob segmentation and detector composition

use crate::{BoundingBox, DetectedObject, Frame, ObjectDetector, PixelFormat, Result};
use tracing::debug;

/// Blobs smaller than this many pixels are dropped
pub const MIN_BLOB_AREA: u64 = 500;
/// Aspect ratio band (width / height) labelled as a ball
pub const BALL_ASPECT_RANGE: (f64, f64) = (0.8, 1.2);
/// Confidence reported for colour blobs
pub const BLOB_CONFIDENCE: f32 = 0.7;

/// A named hue band on the 0..=180 hue scale used by 8-bit HSV images.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorRange {
    pub name: String,
    pub hue: (u8, u8),
    pub min_saturation: u8,
    pub min_value: u8,
}

impl ColorRange {
    pub fn new(name: &str, hue_lo: u8, hue_hi: u8) -> Self {
        Self {
            name: name.to_string(),
            hue: (hue_lo, hue_hi),
            min_saturation: 50,
            min_value: 50,
        }
    }

    fn contains(&self, (h, s, v): (u8, u8, u8)) -> bool {
        h >= self.hue.0 && h <= self.hue.1 && s >= self.min_saturation && v >= self.min_value
    }
}

/// The stock palette, in reporting order
pub fn default_palette() -> Vec<ColorRange> {
    vec![
        ColorRange::new("red", 0, 10),
        ColorRange::new("green", 40, 80),
        ColorRange::new("blue", 100, 130),
        ColorRange::new("yellow", 20, 40),
        ColorRange::new("orange", 10, 20),
    ]
}

/// RGB to 8-bit HSV (H in 0..=180, S and V in 0..=255)
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = max - min;

    let s = if max > 0.0 { 255.0 * diff / max } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / diff
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    ((h / 2.0).round() as u8, s.round() as u8, max as u8)
}

/// Name a colour region `<color>_ball` when roughly square, else `<color>_object`
pub(crate) fn blob_object(color: &str, bbox: BoundingBox, area: u64) -> DetectedObject {
    let ratio = bbox.aspect_ratio();
    let kind = if ratio >= BALL_ASPECT_RANGE.0 && ratio <= BALL_ASPECT_RANGE.1 {
        "ball"
    } else {
        "object"
    };
    DetectedObject::new(format!("{color}_{kind}"), BLOB_CONFIDENCE, bbox, area)
}

/// Heuristic colour segmentation: each 4-connected region inside a palette band
/// becomes one `<color>_ball` or `<color>_object` detection.
#[derive(Clone, Debug)]
pub struct ColorBlobDetector {
    palette: Vec<ColorRange>,
    min_area: u64,
}

impl Default for ColorBlobDetector {
    fn default() -> Self {
        Self::new(default_palette())
    }
}

impl ColorBlobDetector {
    pub fn new(palette: Vec<ColorRange>) -> Self {
        Self {
            palette,
            min_area: MIN_BLOB_AREA,
        }
    }

    pub fn with_min_area(mut self, min_area: u64) -> Self {
        self.min_area = min_area;
        self
    }

    fn hsv_image(frame: &Frame) -> Option<Vec<(u8, u8, u8)>> {
        if frame.pixel_format == PixelFormat::Gray8 {
            return None;
        }
        let mut out = Vec::with_capacity(frame.width as usize * frame.height as usize);
        for y in 0..frame.height {
            for x in 0..frame.width {
                let (r, g, b) = frame.rgb_at(x, y)?;
                out.push(rgb_to_hsv(r, g, b));
            }
        }
        Some(out)
    }

    fn blobs(&self, mask: &[bool], width: usize, height: usize) -> Vec<(BoundingBox, u64)> {
        let mut seen = vec![false; mask.len()];
        let mut blobs = Vec::new();
        let mut stack = Vec::new();

        for start in 0..mask.len() {
            if !mask[start] || seen[start] {
                continue;
            }
            seen[start] = true;
            stack.push(start);

            let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
            let (mut max_x, mut max_y) = (0usize, 0usize);
            let mut area = 0u64;

            while let Some(idx) = stack.pop() {
                let (x, y) = (idx % width, idx / width);
                area += 1;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);

                let mut visit = |n: usize| {
                    if mask[n] && !seen[n] {
                        seen[n] = true;
                        stack.push(n);
                    }
                };
                if x > 0 {
                    visit(idx - 1);
                }
                if x + 1 < width {
                    visit(idx + 1);
                }
                if y > 0 {
                    visit(idx - width);
                }
                if y + 1 < height {
                    visit(idx + width);
                }
            }

            let bbox = BoundingBox {
                x: min_x as u32,
                y: min_y as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            };
            blobs.push((bbox, area));
        }
        blobs
    }
}

impl ObjectDetector for ColorBlobDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedObject>> {
        let Some(hsv) = Self::hsv_image(frame) else {
            debug!("colour detector skipped {:?} frame", frame.pixel_format);
            return Ok(Vec::new());
        };
        let (width, height) = (frame.width as usize, frame.height as usize);

        let mut found = Vec::new();
        for color in &self.palette {
            let mask: Vec<bool> = hsv.iter().map(|px| color.contains(*px)).collect();
            for (bbox, area) in self.blobs(&mask, width, height) {
                if area < self.min_area {
                    continue;
                }
                found.push(blob_object(&color.name, bbox, area));
            }
        }
        debug!("colour detector found {} blobs", found.len());
        Ok(found)
    }
}

/// Runs several detectors in order and concatenates their results.
#[derive(Default)]
pub struct DetectorChain {
    detectors: Vec<Box<dyn ObjectDetector + Send>>,
}

impl DetectorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, detector: impl ObjectDetector + Send + 'static) -> Self {
        self.detectors.push(Box::new(detector));
        self
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl ObjectDetector for DetectorChain {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedObject>> {
        let mut all = Vec::new();
        for detector in &mut self.detectors {
            all.extend(detector.detect(frame)?);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKGROUND: (u8, u8, u8) = (40, 40, 40);

    fn frame_with(width: u32, height: u32, rects: &[(u32, u32, u32, u32, (u8, u8, u8))]) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let mut px = BACKGROUND;
                for (rx, ry, rw, rh, color) in rects {
                    if x >= *rx && x < rx + rw && y >= *ry && y < ry + rh {
                        px = *color;
                    }
                }
                data.extend_from_slice(&[px.0, px.1, px.2]);
            }
        }
        Frame {
            width,
            height,
            pixel_format: PixelFormat::Rgb8,
            data,
            ts: None,
        }
    }

    #[test]
    fn test_hsv_conversion() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), (60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), (120, 255, 255));
        assert_eq!(rgb_to_hsv(40, 40, 40), (0, 0, 40));
    }

    #[test]
    fn test_square_blob_is_ball() {
        let frame = frame_with(200, 100, &[(20, 20, 30, 30, (220, 20, 20))]);
        let found = ColorBlobDetector::default().detect(&frame).unwrap();
        assert_eq!(found.len(), 1);
        let ball = &found[0];
        assert_eq!(ball.name, "red_ball");
        assert_eq!(ball.area, 900);
        assert_eq!(ball.bbox.width, 30);
        assert_eq!(ball.center.x, 35);
        assert_eq!(ball.confidence, BLOB_CONFIDENCE);
    }

    #[test]
    fn test_elongated_blob_is_object() {
        let frame = frame_with(200, 100, &[(10, 10, 100, 20, (20, 20, 220))]);
        let found = ColorBlobDetector::default().detect(&frame).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "blue_object");
        assert_eq!(found[0].area, 2000);
    }

    #[test]
    fn test_small_blobs_are_discarded() {
        // 22x22 = 484 px, under the threshold; 25x20 = 500 px, kept
        let frame = frame_with(
            200,
            100,
            &[(5, 5, 22, 22, (20, 220, 20)), (100, 5, 25, 20, (20, 220, 20))],
        );
        let found = ColorBlobDetector::default().detect(&frame).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].area, 500);
        assert_eq!(found[0].name, "green_object");
    }

    #[test]
    fn test_palette_order_is_reporting_order() {
        let frame = frame_with(
            200,
            100,
            &[(5, 5, 30, 30, (20, 20, 220)), (100, 5, 30, 30, (220, 20, 20))],
        );
        let names: Vec<_> = ColorBlobDetector::default()
            .detect(&frame)
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, vec!["red_ball", "blue_ball"]);
    }

    #[test]
    fn test_gray_frames_yield_nothing() {
        let frame = Frame {
            width: 10,
            height: 10,
            pixel_format: PixelFormat::Gray8,
            data: vec![255; 100],
            ts: None,
        };
        assert!(ColorBlobDetector::default().detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_chain_concatenates_in_order() {
        struct Fixed(&'static str);
        impl ObjectDetector for Fixed {
            fn detect(&mut self, _frame: &Frame) -> Result<Vec<DetectedObject>> {
                let bbox = BoundingBox {
                    x: 0,
                    y: 0,
                    width: 10,
                    height: 10,
                };
                Ok(vec![DetectedObject::new(self.0, 0.8, bbox, 100)])
            }
        }

        let frame = frame_with(200, 100, &[(20, 20, 30, 30, (220, 20, 20))]);
        let mut chain = DetectorChain::new()
            .push(Fixed("person"))
            .push(ColorBlobDetector::default());
        let names: Vec<_> = chain.detect(&frame).unwrap().into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["person", "red_ball"]);
    }
}
