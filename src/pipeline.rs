//! Detect-and-register batch run.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::adapter::AnchorAdapter;
use crate::error::{AnchorError, Result};
use crate::naming::NamingRule;
use crate::record::AnchorMap;
use crate::store::AnchorStore;

/// Counts reported after a detection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSummary {
    pub scanned: usize,
    pub registered: usize,
    pub no_detection: usize,
    pub failed: usize,
}

/// Image files directly inside `dir` with one of `extensions`, sorted by path.
pub fn collect_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AnchorError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("image directory not found: {}", dir.display()),
        )));
    }

    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            if let Some(ext) = e.path().extension() {
                let ext_str = ext.to_string_lossy().to_lowercase();
                return extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(&ext_str));
            }
            false
        })
        .map(|e| e.path().to_owned())
        .collect();
    images.sort();
    Ok(images)
}

/// Run the adapter over `images` one at a time.
///
/// Images that cannot be named, decoded or detected are logged and left out;
/// the returned map holds only the successes. When two captures of the same
/// subject both succeed the later path wins.
pub fn detect_all(
    adapter: &mut AnchorAdapter,
    naming: &NamingRule,
    images: &[PathBuf],
) -> (AnchorMap, RegisterSummary) {
    let mut anchors = AnchorMap::new();
    let mut summary = RegisterSummary {
        scanned: images.len(),
        ..RegisterSummary::default()
    };
    let start_time = Instant::now();

    for (processed, path) in images.iter().enumerate() {
        let name = path.display();

        let key = match naming.normalize(&path.to_string_lossy()) {
            Ok(key) => key,
            Err(err) => {
                warn!("Skipping {name}: {err}");
                summary.failed += 1;
                continue;
            }
        };

        match adapter.process_image(path) {
            Ok(record) => {
                debug!("{name} -> {key} {record:?}");
                if anchors.insert(key.clone(), record).is_some() {
                    warn!("{key} was detected in more than one capture; keeping {name}");
                } else {
                    summary.registered += 1;
                }
            }
            Err(AnchorError::NoDetection { .. }) => {
                warn!("Cannot segment {name}");
                summary.no_detection += 1;
            }
            Err(err) => {
                error!("Failed to process {name}: {err}");
                summary.failed += 1;
            }
        }

        let done = processed + 1;
        if done % 10 == 0 {
            let elapsed = start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                info!(
                    "Processed {}/{} images ({:.2} images/sec), {} anchors",
                    done,
                    images.len(),
                    done as f64 / elapsed,
                    anchors.len()
                );
            }
        }
    }

    (anchors, summary)
}

/// Detect every image in `images_dir` and overwrite `store` with the result.
pub fn register(
    adapter: &mut AnchorAdapter,
    naming: &NamingRule,
    images_dir: &Path,
    extensions: &[String],
    store: &AnchorStore,
) -> Result<RegisterSummary> {
    info!("Scanning {} for images", images_dir.display());
    let images = collect_images(images_dir, extensions)?;
    info!("Found {} images", images.len());
    if images.is_empty() {
        warn!("No images found in {}", images_dir.display());
    }

    let start_time = Instant::now();
    let (anchors, summary) = detect_all(adapter, naming, &images);
    store.save_all(&anchors)?;

    info!(
        "Finished in {:.1}s: {} registered, {} without detection, {} failed",
        start_time.elapsed().as_secs_f64(),
        summary.registered,
        summary.no_detection,
        summary.failed
    );
    Ok(summary)
}
