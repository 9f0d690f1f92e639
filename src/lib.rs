pub mod adapter;
pub mod config;
pub mod detector;
pub mod emit;
pub mod error;
pub mod fetch;
pub mod geometry;
pub mod naming;
pub mod pipeline;
pub mod provider;
pub mod record;
pub mod store;

// Re-export commonly used items
pub use adapter::{AnchorAdapter, Selection, SelectionPolicy};
pub use detector::{Candidate, DetectionQuery, RegionBox, RegionDetector, create_detector};
pub use error::{AnchorError, Result};
pub use geometry::{CropRect, CssOffset, CssParams, PortraitSize, crop_rect, css_offset};
pub use naming::{NamingRule, normalize};
pub use record::{AnchorMap, AnchorRecord, SubjectKey};
pub use store::{AnchorStore, load_merged, merge_overrides};
