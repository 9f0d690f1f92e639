//! Idempotent download of sprite images into the working folder.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use tempfile::NamedTempFile;

use crate::error::Result;
use crate::naming::NamingRule;
use crate::provider::{AssetProvider, RemoteAsset};

/// Counts reported after a fetch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub downloaded: usize,
    pub cached: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Downloaded,
    Cached,
    Failed,
}

/// Download every accepted asset into `target_dir` under its canonical name.
///
/// Listing errors are fatal. Per-file failures are logged and counted; the
/// rest of the batch continues. Files already present are left alone.
pub fn fetch_all(
    provider: &dyn AssetProvider,
    naming: &NamingRule,
    target_dir: &Path,
) -> Result<FetchSummary> {
    fs::create_dir_all(target_dir)?;

    let listed = provider.list()?;
    info!("Provider listed {} file(s)", listed.len());

    let (plan, skipped) = plan_downloads(listed, naming, target_dir);

    let outcomes: Vec<Outcome> = plan
        .par_iter()
        .map(|(local_path, asset)| download_one(provider, asset, local_path))
        .collect();

    let mut summary = FetchSummary {
        skipped,
        ..FetchSummary::default()
    };
    for outcome in outcomes {
        match outcome {
            Outcome::Downloaded => summary.downloaded += 1,
            Outcome::Cached => summary.cached += 1,
            Outcome::Failed => summary.failed += 1,
        }
    }

    info!(
        "Fetch finished: {} downloaded, {} cached, {} skipped, {} failed",
        summary.downloaded, summary.cached, summary.skipped, summary.failed
    );
    Ok(summary)
}

/// Map each accepted asset to its local path. When several variants share a
/// canonical path the canonical variant wins, otherwise the first listed one.
fn plan_downloads(
    listed: Vec<RemoteAsset>,
    naming: &NamingRule,
    target_dir: &Path,
) -> (Vec<(PathBuf, RemoteAsset)>, usize) {
    let mut skipped = 0;
    let mut plan: BTreeMap<PathBuf, (bool, RemoteAsset)> = BTreeMap::new();

    for asset in listed {
        let parsed = match naming.parse(&asset.file_name) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Skipping {}: {err}", asset.file_name);
                skipped += 1;
                continue;
            }
        };
        if !naming.accepts(&parsed) {
            debug!("Skipping {}: variant not requested", asset.file_name);
            skipped += 1;
            continue;
        }

        let is_canonical = parsed.variant.as_deref() == Some(naming.canonical_variant.as_str());
        let local_path =
            target_dir.join(naming.canonical_file_name(&parsed.key, &parsed.extension));

        let keep_existing = match plan.get(&local_path) {
            Some((existing_canonical, existing)) if *existing_canonical || !is_canonical => {
                debug!(
                    "Skipping {}: {} already covers {}",
                    asset.file_name,
                    existing.file_name,
                    local_path.display()
                );
                true
            }
            _ => false,
        };
        if keep_existing {
            skipped += 1;
            continue;
        }
        if plan.insert(local_path, (is_canonical, asset)).is_some() {
            skipped += 1;
        }
    }

    let plan = plan
        .into_iter()
        .map(|(path, (_, asset))| (path, asset))
        .collect();
    (plan, skipped)
}

fn download_one(provider: &dyn AssetProvider, asset: &RemoteAsset, local_path: &Path) -> Outcome {
    if local_path.exists() {
        debug!("{} already cached", local_path.display());
        return Outcome::Cached;
    }

    match provider
        .fetch(asset)
        .and_then(|bytes| write_atomically(local_path, &bytes))
    {
        Ok(()) => {
            info!("{} downloaded", local_path.display());
            Outcome::Downloaded
        }
        Err(err) => {
            warn!("Failed to download {}: {err}", asset.file_name);
            Outcome::Failed
        }
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
