//! On-disk anchor layers.
//!
//! The automatic layer is rewritten in full on every detection run. The manual
//! layer has the same JSON shape and is only ever read; the two are combined
//! in memory with [`merge_overrides`] and the result is never written back.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;

use crate::error::{AnchorError, Result};
use crate::record::AnchorMap;

/// A JSON file mapping subject keys to `[width, height, centerX, centerY]`.
#[derive(Debug, Clone)]
pub struct AnchorStore {
    path: PathBuf,
}

impl AnchorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record. A missing file is an empty store.
    pub fn load_all(&self) -> Result<AnchorMap> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{} does not exist yet, starting empty", self.path.display());
                return Ok(AnchorMap::new());
            }
            Err(err) => return Err(err.into()),
        };

        serde_json::from_str(&contents).map_err(|err| AnchorError::CorruptStore {
            path: self.path.clone(),
            reason: err.to_string(),
        })
    }

    /// Replace the file with `records`.
    ///
    /// The payload goes to a temporary file in the same directory which is
    /// then renamed over the target, so readers never see a partial store.
    pub fn save_all(&self, records: &AnchorMap) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        {
            let mut ser = serde_json::Serializer::with_formatter(
                &mut file,
                PrettyFormatter::with_indent(b"    "),
            );
            records
                .serialize(&mut ser)
                .map_err(io::Error::other)?;
        }
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|err| err.error)?;

        info!(
            "Saved {} anchor(s) to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Overlay `manual` on `base`. Every manual entry wins; base entries without a
/// manual counterpart pass through untouched.
pub fn merge_overrides(base: &AnchorMap, manual: &AnchorMap) -> AnchorMap {
    let mut merged = base.clone();
    merged.extend(manual.iter().map(|(key, record)| (key.clone(), *record)));
    merged
}

/// Load both layers and merge them.
pub fn load_merged(base: &AnchorStore, manual: &AnchorStore) -> Result<AnchorMap> {
    let automatic = base.load_all()?;
    let overrides = manual.load_all()?;
    if !overrides.is_empty() {
        info!(
            "Applying {} manual override(s) from {}",
            overrides.len(),
            manual.path().display()
        );
    }
    Ok(merge_overrides(&automatic, &overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AnchorRecord, SubjectKey};

    fn key(name: &str) -> SubjectKey {
        SubjectKey::new(name).unwrap()
    }

    fn record(width: u32, center: f64) -> AnchorRecord {
        AnchorRecord::new(width, 1280, center, center).unwrap()
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnchorStore::new(dir.path().join("absent.json"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnchorStore::new(dir.path().join("nested/seg-result.json"));

        let mut records = AnchorMap::new();
        records.insert(key("Alice"), AnchorRecord::new(1200, 1600, 0.5, 0.4).unwrap());
        records.insert(
            key("Bob_(Winter)"),
            AnchorRecord::new(1024, 1280, 0.4737281, 0.2119).unwrap(),
        );
        records.insert(key("Ümlaut"), record(800, 0.0));

        store.save_all(&records).unwrap();
        assert_eq!(store.load_all().unwrap(), records);

        store.save_all(&store.load_all().unwrap()).unwrap();
        assert_eq!(store.load_all().unwrap(), records);
    }

    #[test]
    fn saved_file_is_human_editable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = AnchorStore::new(&path);

        let mut records = AnchorMap::new();
        records.insert(key("Ümlaut"), AnchorRecord::new(10, 20, 0.5, 0.25).unwrap());
        store.save_all(&records).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"Ümlaut\""));
        assert!(text.contains("\n    \"Ümlaut\": [\n        10,"));
    }

    #[test]
    fn save_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnchorStore::new(dir.path().join("store.json"));

        let mut first = AnchorMap::new();
        first.insert(key("Old"), record(100, 0.5));
        store.save_all(&first).unwrap();

        let mut second = AnchorMap::new();
        second.insert(key("New"), record(200, 0.5));
        store.save_all(&second).unwrap();

        assert_eq!(store.load_all().unwrap(), second);
    }

    #[test]
    fn malformed_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = AnchorStore::new(&path);

        for payload in [
            "{ not json",
            "",
            r#"{"Alice": [1200, 1600, 0.5]}"#,
            r#"{"Alice": [1200, 1600, 1.5, 0.4]}"#,
            r#"{"Alice": [0, 1600, 0.5, 0.4]}"#,
            r#"{"": [1200, 1600, 0.5, 0.4]}"#,
            r#"["Alice"]"#,
        ] {
            fs::write(&path, payload).unwrap();
            assert!(
                matches!(store.load_all(), Err(AnchorError::CorruptStore { .. })),
                "{payload:?} should be corrupt"
            );
        }
    }

    #[test]
    fn manual_entries_override_and_extend() {
        let mut base = AnchorMap::new();
        base.insert(key("Alice"), record(100, 0.1));
        base.insert(key("Bob"), record(100, 0.2));

        let mut manual = AnchorMap::new();
        manual.insert(key("Bob"), record(300, 0.9));
        manual.insert(key("Carol"), record(400, 0.3));

        let merged = merge_overrides(&base, &manual);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged["Alice"], base["Alice"]);
        assert_eq!(merged["Bob"], manual["Bob"]);
        assert_eq!(merged["Carol"], manual["Carol"]);

        // Inputs are untouched and re-merging changes nothing.
        assert_eq!(base["Bob"], record(100, 0.2));
        assert_eq!(merge_overrides(&merged, &manual), merged);
    }

    #[test]
    fn load_merged_reads_both_layers() {
        let dir = tempfile::tempdir().unwrap();
        let base = AnchorStore::new(dir.path().join("seg-result.json"));
        let manual = AnchorStore::new(dir.path().join("seg-result-manual.json"));

        let mut automatic = AnchorMap::new();
        automatic.insert(key("Alice"), record(100, 0.1));
        base.save_all(&automatic).unwrap();
        assert_eq!(load_merged(&base, &manual).unwrap(), automatic);

        fs::write(manual.path(), r#"{"Alice": [640, 1280, 0.5, 0.3]}"#).unwrap();
        let merged = load_merged(&base, &manual).unwrap();
        assert_eq!(merged["Alice"], AnchorRecord::new(640, 1280, 0.5, 0.3).unwrap());

        // The automatic layer is never rewritten by a merge.
        assert_eq!(base.load_all().unwrap(), automatic);
    }
}
