use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AnchorError, Result};

/// Canonical identifier for one logical subject, independent of the file
/// variant it was detected in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectKey(String);

impl SubjectKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(AnchorError::InvalidRecord {
                reason: "subject key cannot be empty".to_string(),
            });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubjectKey {
    type Error = AnchorError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SubjectKey> for String {
    fn from(key: SubjectKey) -> Self {
        key.0
    }
}

impl Borrow<str> for SubjectKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Positional on-disk shape: `[width, height, centerX, centerY]`.
type RecordFields = (u32, u32, f64, f64);

/// The anchor chosen for one subject.
///
/// `width`/`height` describe the original detected image and the center is a
/// fraction of those dimensions, so a record stays valid at any display scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordFields", into = "RecordFields")]
pub struct AnchorRecord {
    width: u32,
    height: u32,
    center_x: f64,
    center_y: f64,
}

impl AnchorRecord {
    /// Build a record, rejecting zero dimensions and centers outside `[0, 1]`.
    pub fn new(width: u32, height: u32, center_x: f64, center_y: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AnchorError::InvalidRecord {
                reason: format!("dimensions must be positive, got {width}x{height}"),
            });
        }
        for (axis, value) in [("centerX", center_x), ("centerY", center_y)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(AnchorError::InvalidRecord {
                    reason: format!("{axis} must lie in [0, 1], got {value}"),
                });
            }
        }
        Ok(Self {
            width,
            height,
            center_x,
            center_y,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn center_x(&self) -> f64 {
        self.center_x
    }

    pub fn center_y(&self) -> f64 {
        self.center_y
    }

    /// Anchor position in pixels of the original image.
    pub fn absolute_center(&self) -> (f64, f64) {
        (
            f64::from(self.width) * self.center_x,
            f64::from(self.height) * self.center_y,
        )
    }
}

impl TryFrom<RecordFields> for AnchorRecord {
    type Error = AnchorError;

    fn try_from((width, height, center_x, center_y): RecordFields) -> Result<Self> {
        Self::new(width, height, center_x, center_y)
    }
}

impl From<AnchorRecord> for RecordFields {
    fn from(record: AnchorRecord) -> Self {
        (
            record.width,
            record.height,
            record.center_x,
            record.center_y,
        )
    }
}

/// Subject key to anchor. Iteration is always in key order.
pub type AnchorMap = BTreeMap<SubjectKey, AnchorRecord>;
