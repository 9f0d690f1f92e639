use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::{debug, info, warn};
use rustface::{Detector, ImageData};

use crate::error::{AnchorError, Result};

/// Region coordinates in whatever unit the detector reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionBox {
    /// Center and extent as fractions of the image size.
    Normalized {
        center_x: f64,
        center_y: f64,
        width: f64,
        height: f64,
    },
    /// Top-left corner and extent in pixels.
    Pixels {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
}

impl RegionBox {
    /// Region center as a fraction of the image size, clamped to `[0, 1]`.
    pub fn normalized_center(&self, image_width: u32, image_height: u32) -> (f64, f64) {
        let (cx, cy) = match *self {
            RegionBox::Normalized {
                center_x, center_y, ..
            } => (center_x, center_y),
            RegionBox::Pixels {
                x,
                y,
                width,
                height,
            } => (
                (f64::from(x) + f64::from(width) / 2.0) / f64::from(image_width.max(1)),
                (f64::from(y) + f64::from(height) / 2.0) / f64::from(image_height.max(1)),
            ),
        };
        (clamp_unit(cx), clamp_unit(cy))
    }

    /// Region as `(left, top, width, height)` in pixels.
    pub fn pixel_rect(&self, image_width: u32, image_height: u32) -> (i32, i32, u32, u32) {
        match *self {
            RegionBox::Pixels {
                x,
                y,
                width,
                height,
            } => (x, y, width, height),
            RegionBox::Normalized {
                center_x,
                center_y,
                width,
                height,
            } => {
                let w = width * f64::from(image_width);
                let h = height * f64::from(image_height);
                let left = center_x * f64::from(image_width) - w / 2.0;
                let top = center_y * f64::from(image_height) - h / 2.0;
                (
                    left.round() as i32,
                    top.round() as i32,
                    w.round().max(1.0) as u32,
                    h.round().max(1.0) as u32,
                )
            }
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// One scored region returned by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub score: f32,
    pub region: RegionBox,
    pub label: String,
}

/// What to look for and how strict to be.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionQuery {
    /// Textual target concept, e.g. "face".
    pub concept: String,
    /// Minimum box confidence (0.0-1.0).
    pub box_threshold: f32,
    /// Minimum text-match confidence (0.0-1.0).
    pub text_threshold: f32,
}

/// Trait for region detector implementations.
///
/// Candidates are returned in the detector's own ranking; callers must not
/// assume any other order.
pub trait RegionDetector {
    fn name(&self) -> &str;

    /// Detect regions matching `query` in an image
    fn detect(&mut self, image: &DynamicImage, query: &DetectionQuery) -> Result<Vec<Candidate>>;
}

/// RustFace (SeetaFace) detector implementation
pub struct RustFaceDetector {
    detector: Box<dyn Detector>,
}

impl RustFaceDetector {
    /// Load the SeetaFace model, downloading it first when missing.
    pub fn new(model_path: &Path, model_urls: &[String]) -> Result<Self> {
        if !model_path.exists() {
            download_model(model_path, model_urls)?;
        } else {
            debug!("Model already exists at: {}", model_path.display());
        }

        let path = model_path.to_str().ok_or_else(|| {
            AnchorError::Detector(format!(
                "model path is not valid UTF-8: {}",
                model_path.display()
            ))
        })?;
        let detector = rustface::create_detector(path)
            .map_err(|err| AnchorError::Detector(format!("failed to create face detector: {err}")))?;

        Ok(Self { detector })
    }
}

impl RegionDetector for RustFaceDetector {
    fn name(&self) -> &str {
        "rustface"
    }

    fn detect(&mut self, image: &DynamicImage, query: &DetectionQuery) -> Result<Vec<Candidate>> {
        if query.concept != "face" {
            debug!(
                "rustface only finds faces; ignoring concept '{}'",
                query.concept
            );
        }

        let gray_image = image.to_luma8();
        let (width, height) = gray_image.dimensions();
        let mut image_data = ImageData::new(gray_image.as_raw(), width, height);

        let faces = self.detector.detect(&mut image_data);

        // SeetaFace has no text branch, so only the box threshold applies.
        let mut result = Vec::new();
        for face in faces {
            if face.score() >= f64::from(query.box_threshold) {
                let bbox = face.bbox();
                result.push(Candidate {
                    score: face.score() as f32,
                    region: RegionBox::Pixels {
                        x: bbox.x() as i32,
                        y: bbox.y() as i32,
                        width: bbox.width() as u32,
                        height: bbox.height() as u32,
                    },
                    label: "face".to_string(),
                });
            }
        }

        Ok(result)
    }
}

fn download_model(model_path: &Path, model_urls: &[String]) -> Result<()> {
    info!("Downloading face detection model to {}", model_path.display());

    let model_dir = model_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(model_dir)?;

    let mut last_error = None;
    for url in model_urls {
        debug!("Trying to download from: {url}");

        match ureq::get(url).call() {
            Ok(response) => {
                let mut reader = response.into_reader();
                let mut file = tempfile::NamedTempFile::new_in(model_dir)?;
                std::io::copy(&mut reader, &mut file)?;
                file.persist(model_path).map_err(|err| err.error)?;
                info!("Model downloaded successfully from {url}");
                return Ok(());
            }
            Err(err) => {
                warn!("Failed to download from {url}: {err}");
                last_error = Some(err.to_string());
            }
        }
    }

    Err(AnchorError::Detector(format!(
        "failed to download model from all sources (last error: {}); \
         place the SeetaFace model at {}",
        last_error.unwrap_or_else(|| "no URLs configured".to_string()),
        model_path.display()
    )))
}

/// Factory function to create detectors by name
pub fn create_detector(
    name: &str,
    model_path: &Path,
    model_urls: &[String],
) -> Result<Box<dyn RegionDetector>> {
    match name.to_lowercase().as_str() {
        "rustface" => Ok(Box::new(RustFaceDetector::new(model_path, model_urls)?)),
        // Add other detectors here as needed
        _ => Err(AnchorError::Detector(format!("unknown detector: {name}"))),
    }
}

/// Default location of the SeetaFace model.
pub fn default_model_path() -> PathBuf {
    PathBuf::from("model/seeta_fd_frontal_v1.0.bin")
}

pub fn default_model_urls() -> Vec<String> {
    vec![
        "https://github.com/atomashpolskiy/rustface/raw/master/model/seeta_fd_frontal_v1.0.bin"
            .to_string(),
        "https://raw.githubusercontent.com/atomashpolskiy/rustface/master/model/seeta_fd_frontal_v1.0.bin"
            .to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_box_center_is_normalized() {
        let region = RegionBox::Pixels {
            x: 500,
            y: 560,
            width: 200,
            height: 160,
        };
        let (cx, cy) = region.normalized_center(1200, 1600);
        assert!((cx - 0.5).abs() < 1e-9);
        assert!((cy - 0.4).abs() < 1e-9);
    }

    #[test]
    fn centers_outside_the_image_are_clamped() {
        let region = RegionBox::Pixels {
            x: -100,
            y: 900,
            width: 20,
            height: 400,
        };
        assert_eq!(region.normalized_center(100, 1000), (0.0, 1.0));

        let region = RegionBox::Normalized {
            center_x: 1.3,
            center_y: -0.2,
            width: 0.1,
            height: 0.1,
        };
        assert_eq!(region.normalized_center(100, 100), (1.0, 0.0));
    }

    #[test]
    fn normalized_box_converts_to_pixels() {
        let region = RegionBox::Normalized {
            center_x: 0.5,
            center_y: 0.25,
            width: 0.2,
            height: 0.1,
        };
        assert_eq!(region.pixel_rect(1000, 2000), (400, 400, 200, 200));
    }

    #[test]
    fn unknown_detector_name_is_rejected() {
        let result = create_detector("yolo", &default_model_path(), &[]);
        assert!(matches!(result, Err(AnchorError::Detector(_))));
    }
}
