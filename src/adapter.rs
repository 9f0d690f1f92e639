//! Turns raw detector output into one [`AnchorRecord`] per image.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use image::{DynamicImage, GenericImageView, Rgba};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_hollow_rect_mut},
    rect::Rect,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::detector::{Candidate, DetectionQuery, RegionDetector};
use crate::error::{AnchorError, Result};
use crate::record::AnchorRecord;

/// Picks the primary region out of a detector's candidates.
pub trait SelectionPolicy {
    fn select<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate>;
}

/// Built-in selection policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Selection {
    /// Trust the detector's ranking and take its first candidate.
    #[default]
    First,
    /// Take the highest-scoring candidate; ties keep detector order.
    HighestScore,
}

impl SelectionPolicy for Selection {
    fn select<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        match self {
            Selection::First => candidates.first(),
            Selection::HighestScore => candidates
                .iter()
                .reduce(|best, c| if c.score > best.score { c } else { best }),
        }
    }
}

/// Wraps a [`RegionDetector`] with a fixed query and selection policy.
pub struct AnchorAdapter {
    detector: Box<dyn RegionDetector>,
    query: DetectionQuery,
    policy: Box<dyn SelectionPolicy>,
    overlay_dir: Option<PathBuf>,
}

impl AnchorAdapter {
    pub fn new(detector: Box<dyn RegionDetector>, query: DetectionQuery) -> Self {
        Self {
            detector,
            query,
            policy: Box::new(Selection::First),
            overlay_dir: None,
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn SelectionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Write an annotated copy of every processed image into `dir`.
    pub fn with_overlay_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.overlay_dir = Some(dir.into());
        self
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Anchor for an in-memory image, or `NoDetection` when nothing was found.
    pub fn detect_primary_anchor(
        &mut self,
        image: &DynamicImage,
        image_name: &str,
    ) -> Result<AnchorRecord> {
        self.primary_candidate(image, image_name)
            .and_then(|candidate| anchor_from_candidate(&candidate, image))
    }

    /// Open, detect and optionally annotate one image file.
    ///
    /// A failed overlay write is logged and otherwise ignored.
    pub fn process_image(&mut self, path: &Path) -> Result<AnchorRecord> {
        let image_name = display_name(path);
        let image = image::open(path)?;
        let candidate = self.primary_candidate(&image, &image_name)?;
        let record = anchor_from_candidate(&candidate, &image)?;

        if let Some(dir) = &self.overlay_dir
            && let Err(err) = write_overlay(&image, &candidate, dir, path)
        {
            warn!("Failed to write debug overlay for {image_name}: {err}");
        }

        Ok(record)
    }

    fn primary_candidate(&mut self, image: &DynamicImage, image_name: &str) -> Result<Candidate> {
        let candidates = self.detector.detect(image, &self.query)?;
        debug!(
            "{} returned {} candidate(s) for {image_name}",
            self.detector.name(),
            candidates.len()
        );
        self.policy
            .select(&candidates)
            .cloned()
            .ok_or_else(|| AnchorError::NoDetection {
                image: image_name.to_string(),
            })
    }
}

/// Convert a candidate's native box into the store's fractional shape.
pub fn anchor_from_candidate(candidate: &Candidate, image: &DynamicImage) -> Result<AnchorRecord> {
    let (width, height) = image.dimensions();
    let (center_x, center_y) = candidate.region.normalized_center(width, height);
    AnchorRecord::new(width, height, center_x, center_y)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_overlay(
    image: &DynamicImage,
    candidate: &Candidate,
    dir: &Path,
    source: &Path,
) -> Result<PathBuf> {
    let mut canvas = image.to_rgba8();
    let (img_w, img_h) = canvas.dimensions();

    let (x, y, w, h) = candidate.region.pixel_rect(img_w, img_h);
    draw_hollow_rect_mut(
        &mut canvas,
        Rect::at(x, y).of_size(w.max(1), h.max(1)),
        Rgba([255, 0, 0, 255]),
    );

    let (cx, cy) = candidate.region.normalized_center(img_w, img_h);
    let center = (
        (cx * f64::from(img_w)).round() as i32,
        (cy * f64::from(img_h)).round() as i32,
    );
    draw_filled_circle_mut(&mut canvas, center, 4, Rgba([0, 255, 0, 255]));

    fs::create_dir_all(dir)?;
    let file_name = source
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("overlay.png"));
    let output_path = dir.join(file_name);
    canvas.save(&output_path)?;
    debug!("Saved overlay {}", output_path.display());
    Ok(output_path)
}
