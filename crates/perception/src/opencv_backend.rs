use crate::detect::blob_object;
use crate::{
    default_palette, BoundingBox, CameraSource, ColorRange, DetectedObject, Error, Frame,
    ObjectDetector, PixelFormat, Result, MIN_BLOB_AREA,
};
use opencv::prelude::*;
use opencv::{core, imgproc, objdetect, videoio};
use time::OffsetDateTime;
use tracing::{debug, info};

/// Haar cascade shipped with OpenCV, used as a person proxy
pub const DEFAULT_FACE_CASCADE: &str = "haarcascades/haarcascade_frontalface_default.xml";
/// Confidence reported for cascade hits
pub const PERSON_CONFIDENCE: f32 = 0.8;

fn backend(e: opencv::Error) -> Error {
    Error::Backend(e.to_string())
}

/// Wrap an interleaved frame buffer as a Mat and convert it with `code`.
/// `None` means the frame is already in the target layout.
fn convert(frame: &Frame, code: Option<i32>) -> Result<core::Mat> {
    let channels = match frame.pixel_format {
        PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
        PixelFormat::Gray8 => 1,
    };
    let flat = core::Mat::from_slice(&frame.data).map_err(backend)?;
    let shaped = flat.reshape(channels, frame.height as i32).map_err(backend)?;
    let mut out = core::Mat::default();
    match code {
        Some(code) => imgproc::cvt_color(&shaped, &mut out, code, 0).map_err(backend)?,
        None => shaped.copy_to(&mut out).map_err(backend)?,
    }
    Ok(out)
}

/// Camera on the rover: a local device index, a video file or the robot's
/// MJPEG stream URL.
pub struct OpenCvCamera {
    spec: String,
    cap: videoio::VideoCapture,
}

impl OpenCvCamera {
    pub fn spec(&self) -> &str {
        &self.spec
    }
}

impl CameraSource for OpenCvCamera {
    fn open(spec: &str) -> Result<Self> {
        let cap = match spec.parse::<i32>() {
            Ok(index) => videoio::VideoCapture::new(index, videoio::CAP_ANY),
            Err(_) => videoio::VideoCapture::from_file(spec, videoio::CAP_ANY),
        }
        .map_err(|e| Error::Backend(format!("{spec}: {e}")))?;

        if !cap.is_opened().map_err(backend)? {
            return Err(Error::NotFound(format!("no video from {spec}")));
        }
        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
        info!("Camera {} opened ({}x{})", spec, width, height);
        Ok(Self {
            spec: spec.to_string(),
            cap,
        })
    }

    fn read(&mut self) -> Result<Frame> {
        let mut bgr = core::Mat::default();
        let grabbed = self.cap.read(&mut bgr).map_err(backend)?;
        if !grabbed || bgr.empty() {
            return Err(Error::Io(format!("no frame from {}", self.spec)));
        }

        // Keep the native BGR layout; the detectors convert as they need
        let data = bgr.data_bytes().map_err(backend)?.to_vec();
        Ok(Frame {
            width: bgr.cols() as u32,
            height: bgr.rows() as u32,
            pixel_format: PixelFormat::Bgr8,
            data,
            ts: Some(OffsetDateTime::now_utc()),
        })
    }
}

/// Colour segmentation on OpenCV: HSV threshold per palette band, then the
/// bounding box of every external contour.
pub struct OpenCvColorDetector {
    palette: Vec<ColorRange>,
    min_area: u64,
}

impl Default for OpenCvColorDetector {
    fn default() -> Self {
        Self::new(default_palette())
    }
}

impl OpenCvColorDetector {
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

    fn regions(&self, hsv: &core::Mat, color: &ColorRange) -> Result<Vec<DetectedObject>> {
        let lower = core::Scalar::new(
            f64::from(color.hue.0),
            f64::from(color.min_saturation),
            f64::from(color.min_value),
            0.0,
        );
        let upper = core::Scalar::new(f64::from(color.hue.1), 255.0, 255.0, 0.0);
        let mut mask = core::Mat::default();
        core::in_range(hsv, &lower, &upper, &mut mask).map_err(backend)?;

        let mut contours = core::Vector::<core::Vector<core::Point>>::new();
        imgproc::find_contours(
            &mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            core::Point::new(0, 0),
        )
        .map_err(|e| Error::Detector(e.to_string()))?;

        let mut found = Vec::new();
        for contour in contours.iter() {
            let area = imgproc::contour_area(&contour, false).map_err(backend)?;
            let area = area.round() as u64;
            if area < self.min_area {
                continue;
            }
            let r = imgproc::bounding_rect(&contour).map_err(backend)?;
            let bbox = BoundingBox {
                x: r.x.max(0) as u32,
                y: r.y.max(0) as u32,
                width: r.width.max(0) as u32,
                height: r.height.max(0) as u32,
            };
            found.push(blob_object(&color.name, bbox, area));
        }
        Ok(found)
    }
}

impl ObjectDetector for OpenCvColorDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedObject>> {
        let code = match frame.pixel_format {
            PixelFormat::Rgb8 => imgproc::COLOR_RGB2HSV,
            PixelFormat::Bgr8 => imgproc::COLOR_BGR2HSV,
            PixelFormat::Gray8 => {
                debug!("colour detector skipped {:?} frame", frame.pixel_format);
                return Ok(Vec::new());
            }
        };
        let hsv = convert(frame, Some(code))?;

        let mut found = Vec::new();
        for color in &self.palette {
            found.extend(self.regions(&hsv, color)?);
        }
        debug!("opencv colour detector found {} regions", found.len());
        Ok(found)
    }
}

/// Face detector standing in for a person detector.
pub struct CascadePersonDetector {
    cascade: objdetect::CascadeClassifier,
}

impl CascadePersonDetector {
    /// Load a cascade from `path`, or from OpenCV's data directory when relative.
    pub fn new(path: &str) -> Result<Self> {
        let resolved =
            core::find_file(path, true, false).map_err(|e| Error::NotFound(e.to_string()))?;
        let cascade = objdetect::CascadeClassifier::new(&resolved).map_err(backend)?;
        if cascade.empty().map_err(backend)? {
            return Err(Error::NotFound(resolved));
        }
        Ok(Self { cascade })
    }
}

impl ObjectDetector for CascadePersonDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedObject>> {
        let code = match frame.pixel_format {
            PixelFormat::Rgb8 => Some(imgproc::COLOR_RGB2GRAY),
            PixelFormat::Bgr8 => Some(imgproc::COLOR_BGR2GRAY),
            PixelFormat::Gray8 => None,
        };
        let gray = convert(frame, code)?;
        let mut faces = core::Vector::<core::Rect>::new();
        self.cascade
            .detect_multi_scale(
                &gray,
                &mut faces,
                1.1,
                4,
                0,
                core::Size::new(0, 0),
                core::Size::new(0, 0),
            )
            .map_err(|e| Error::Detector(e.to_string()))?;

        Ok(faces
            .iter()
            .map(|r| {
                let bbox = BoundingBox {
                    x: r.x.max(0) as u32,
                    y: r.y.max(0) as u32,
                    width: r.width.max(0) as u32,
                    height: r.height.max(0) as u32,
                };
                // Box area, not contour area
                let area = u64::from(bbox.width) * u64::from(bbox.height);
                DetectedObject::new("person", PERSON_CONFIDENCE, bbox, area)
            })
            .collect())
    }
}
