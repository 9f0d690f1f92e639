//! Shared helpers for integration tests.
use std::path::Path;

use image::{DynamicImage, GenericImageView, RgbImage};
use sprite_anchor::{Candidate, DetectionQuery, RegionBox, RegionDetector, Result};

/// Finds a "face" centered at 50% width / 40% height, except in images whose
/// width is listed in `blind_widths`.
pub struct ScriptedDetector {
    pub blind_widths: Vec<u32>,
}

impl RegionDetector for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect(&mut self, image: &DynamicImage, _: &DetectionQuery) -> Result<Vec<Candidate>> {
        let (width, height) = image.dimensions();
        if self.blind_widths.contains(&width) {
            return Ok(Vec::new());
        }
        let face = (width / 5, height / 5);
        Ok(vec![Candidate {
            score: 0.8,
            region: RegionBox::Pixels {
                x: (width / 2 - face.0 / 2) as i32,
                y: (height * 2 / 5 - face.1 / 2) as i32,
                width: face.0,
                height: face.1,
            },
            label: "face".to_string(),
        }])
    }
}

pub fn query() -> DetectionQuery {
    DetectionQuery {
        concept: "face".to_string(),
        box_threshold: 0.25,
        text_threshold: 0.2,
    }
}

pub fn write_sprite(dir: &Path, name: &str, width: u32, height: u32) {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 180, 160])))
        .save(dir.join(name))
        .expect("save sprite");
}
