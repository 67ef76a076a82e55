use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Frame width assumed when a snapshot carries no frame geometry
pub const DEFAULT_FRAME_WIDTH: u32 = 640;

/// Half-width of the "center" band, as a fraction of the frame width
pub const DEAD_ZONE_FRACTION: f64 = 0.1;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    Bgr8,
    Rgb8,
    Gray8,
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
    pub ts: Option<OffsetDateTime>,
}

impl Frame {
    /// RGB triple at (x, y); `None` out of bounds, on short buffers, or for gray frames
    pub fn rgb_at(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        let px = self.data.get(idx..idx + 3)?;
        match self.pixel_format {
            PixelFormat::Rgb8 => Some((px[0], px[1], px[2])),
            PixelFormat::Bgr8 => Some((px[2], px[1], px[0])),
            PixelFormat::Gray8 => None,
        }
    }
}

/// Axis-aligned box in pixels, (x, y) is the top-left corner
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2,
            y: self.y + self.height / 2,
        }
    }

    /// width / height; 0.0 for a degenerate box
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub center: Point,
    /// Pixel count
    pub area: u64,
}

impl DetectedObject {
    pub fn new(name: impl Into<String>, confidence: f32, bbox: BoundingBox, area: u64) -> Self {
        Self {
            name: name.into(),
            confidence,
            center: bbox.center(),
            bbox,
            area,
        }
    }

    fn name_contains(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
    }
}

/// Horizontal position of an object relative to the camera axis
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Center,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Center => "center",
            Direction::Right => "right",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify `object` against the frame midpoint.
///
/// The dead-zone is closed: a center exactly `DEAD_ZONE_FRACTION * frame_width`
/// away from the midpoint is still `Center`.
pub fn direction(object: &DetectedObject, frame_width: u32) -> Direction {
    let center_x = f64::from(object.center.x);
    let midpoint = f64::from(frame_width / 2);
    let threshold = f64::from(frame_width) * DEAD_ZONE_FRACTION;

    if center_x < midpoint - threshold {
        Direction::Left
    } else if center_x > midpoint + threshold {
        Direction::Right
    } else {
        Direction::Center
    }
}

/// One complete set of detections from a single frame. Never mutated once published.
#[derive(Clone, Debug, Default)]
pub struct Detections {
    pub objects: Vec<DetectedObject>,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Increases by one per published frame; 0 means nothing published yet
    pub sequence: u64,
    pub captured_at: Option<OffsetDateTime>,
}

impl Detections {
    /// Snapshot with the given objects and the default frame geometry
    pub fn from_objects(objects: Vec<DetectedObject>) -> Self {
        Self {
            objects,
            frame_width: DEFAULT_FRAME_WIDTH,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// First object whose name contains `name` (case-insensitive), in snapshot order
    pub fn find(&self, name: &str) -> Option<&DetectedObject> {
        let needle = name.to_lowercase();
        self.objects.iter().find(|o| o.name_contains(&needle))
    }

    /// Object with the largest area, optionally restricted by a name substring.
    /// Ties go to the earliest object in snapshot order.
    pub fn largest(&self, type_filter: Option<&str>) -> Option<&DetectedObject> {
        let needle = type_filter.map(str::to_lowercase);
        self.objects
            .iter()
            .filter(|o| needle.as_deref().map_or(true, |n| o.name_contains(n)))
            .fold(None, |best: Option<&DetectedObject>, o| match best {
                Some(b) if b.area >= o.area => Some(b),
                _ => Some(o),
            })
    }

    /// Frame width used for direction decisions
    pub fn effective_frame_width(&self) -> u32 {
        if self.frame_width == 0 {
            DEFAULT_FRAME_WIDTH
        } else {
            self.frame_width
        }
    }

    pub fn direction_of(&self, object: &DetectedObject) -> Direction {
        direction(object, self.effective_frame_width())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_at(name: &str, center_x: u32, area: u64) -> DetectedObject {
        DetectedObject {
            name: name.to_string(),
            confidence: 0.7,
            bbox: BoundingBox {
                x: center_x.saturating_sub(10),
                y: 0,
                width: 20,
                height: 20,
            },
            center: Point { x: center_x, y: 10 },
            area,
        }
    }

    #[test]
    fn test_direction_dead_zone() {
        let d = |x| direction(&object_at("ball", x, 100), 640);
        assert_eq!(d(320), Direction::Center);
        assert_eq!(d(639), Direction::Right);
        assert_eq!(d(1), Direction::Left);
        assert_eq!(d(288), Direction::Center);
    }

    #[test]
    fn test_direction_boundary_is_closed() {
        let d = |x| direction(&object_at("ball", x, 100), 640);
        // midpoint 320, threshold 64
        assert_eq!(d(256), Direction::Center);
        assert_eq!(d(255), Direction::Left);
        assert_eq!(d(384), Direction::Center);
        assert_eq!(d(385), Direction::Right);
    }

    #[test]
    fn test_largest_ignores_input_order() {
        let orders = [[400, 1600, 900], [1600, 900, 400], [900, 400, 1600]];
        for areas in orders {
            let snap = Detections::from_objects(
                areas
                    .iter()
                    .enumerate()
                    .map(|(i, a)| object_at(&format!("obj{i}"), 100, *a))
                    .collect(),
            );
            assert_eq!(snap.largest(None).map(|o| o.area), Some(1600));
        }
    }

    #[test]
    fn test_largest_tie_prefers_first() {
        let snap = Detections::from_objects(vec![
            object_at("red_ball", 100, 900),
            object_at("blue_ball", 200, 900),
        ]);
        assert_eq!(snap.largest(None).map(|o| o.name.as_str()), Some("red_ball"));
    }

    #[test]
    fn test_largest_with_filter() {
        let snap = Detections::from_objects(vec![
            object_at("person", 100, 5000),
            object_at("red_ball", 200, 900),
            object_at("blue_ball", 300, 1200),
        ]);
        assert_eq!(
            snap.largest(Some("BALL")).map(|o| o.name.as_str()),
            Some("blue_ball")
        );
        assert!(snap.largest(Some("chair")).is_none());
        assert!(Detections::default().largest(None).is_none());
    }

    #[test]
    fn test_find_is_case_insensitive_and_ordered() {
        let snap = Detections::from_objects(vec![
            object_at("green_object", 100, 900),
            object_at("Red_Ball", 200, 100),
            object_at("blue_ball", 300, 5000),
        ]);
        assert_eq!(snap.find("ball").map(|o| o.name.as_str()), Some("Red_Ball"));
        assert_eq!(snap.find("RED").map(|o| o.name.as_str()), Some("Red_Ball"));
        assert!(snap.find("person").is_none());
    }

    #[test]
    fn test_bbox_center_and_aspect() {
        let bbox = BoundingBox {
            x: 10,
            y: 20,
            width: 31,
            height: 30,
        };
        assert_eq!(bbox.center(), Point { x: 25, y: 35 });
        assert!((bbox.aspect_ratio() - 31.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_rgb_at_swaps_bgr() {
        let frame = Frame {
            width: 1,
            height: 1,
            pixel_format: PixelFormat::Bgr8,
            data: vec![1, 2, 3],
            ts: None,
        };
        assert_eq!(frame.rgb_at(0, 0), Some((3, 2, 1)));
        assert_eq!(frame.rgb_at(1, 0), None);
    }
}
