//! Sources of raw sprite images.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::error::{AnchorError, Result};

/// Upper bound for a single downloaded file.
const MAX_ASSET_BYTES: u64 = 64 * 1024 * 1024;

/// One downloadable file as listed by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    /// File name as it should appear on disk, before normalization.
    pub file_name: String,
    /// Provider-specific location (URL, archive entry, ...).
    pub location: String,
}

/// Lists and fetches the files of one batch (a wiki category, an archive).
///
/// Fetches are independent of each other and may run concurrently.
pub trait AssetProvider: Sync {
    fn list(&self) -> Result<Vec<RemoteAsset>>;

    fn fetch(&self, asset: &RemoteAsset) -> Result<Vec<u8>>;
}

/// Files of a MediaWiki category, resolved through the action API.
pub struct MediaWikiProvider {
    agent: ureq::Agent,
    api_url: String,
    category: String,
}

impl MediaWikiProvider {
    pub fn new(api_url: &str, category: &str, user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(60))
            .build();
        Self {
            agent,
            api_url: api_url.to_string(),
            category: category.to_string(),
        }
    }

    fn category_title(&self) -> String {
        if self.category.starts_with("Category:") {
            self.category.clone()
        } else {
            format!("Category:{}", self.category)
        }
    }
}

impl AssetProvider for MediaWikiProvider {
    fn list(&self) -> Result<Vec<RemoteAsset>> {
        let title = self.category_title();
        let mut assets = Vec::new();
        let mut continuation: BTreeMap<String, String> = BTreeMap::new();

        loop {
            let mut request = self
                .agent
                .get(&self.api_url)
                .query("action", "query")
                .query("format", "json")
                .query("formatversion", "2")
                .query("generator", "categorymembers")
                .query("gcmtitle", &title)
                .query("gcmnamespace", "6")
                .query("gcmlimit", "max")
                .query("prop", "imageinfo")
                .query("iiprop", "url");
            for (name, value) in &continuation {
                request = request.query(name, value);
            }

            let body = request
                .call()
                .map_err(|err| fetch_error(&title, err))?
                .into_string()
                .map_err(|err| fetch_error(&title, err))?;
            let page = parse_category_page(&body).map_err(|err| fetch_error(&title, err))?;
            debug!("{title}: {} file(s) in this batch", page.assets.len());
            assets.extend(page.assets);

            match page.continuation {
                Some(next) => continuation = next,
                None => break,
            }
        }

        Ok(assets)
    }

    fn fetch(&self, asset: &RemoteAsset) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(&asset.location)
            .call()
            .map_err(|err| fetch_error(&asset.file_name, err))?;
        read_capped(response.into_reader(), MAX_ASSET_BYTES, &asset.file_name)
    }
}

/// Read a whole body, failing instead of truncating when it exceeds `limit`.
fn read_capped(reader: impl Read, limit: u64, asset: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut bytes)
        .map_err(|err| fetch_error(asset, err))?;
    if bytes.len() as u64 > limit {
        return Err(fetch_error(
            asset,
            format!("body exceeds size limit of {limit} bytes"),
        ));
    }
    Ok(bytes)
}

fn fetch_error(asset: &str, err: impl std::fmt::Display) -> AnchorError {
    AnchorError::Fetch {
        asset: asset.to_string(),
        reason: err.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(rename = "continue")]
    continuation: Option<BTreeMap<String, String>>,
    query: Option<ApiQuery>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    #[serde(default)]
    imageinfo: Vec<ApiImageInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiImageInfo {
    url: String,
}

/// One page of a category listing.
#[derive(Debug)]
pub(crate) struct CategoryPage {
    pub assets: Vec<RemoteAsset>,
    pub continuation: Option<BTreeMap<String, String>>,
}

pub(crate) fn parse_category_page(body: &str) -> serde_json::Result<CategoryPage> {
    let response: ApiResponse = serde_json::from_str(body)?;
    let assets = response
        .query
        .map(|q| q.pages)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|page| {
            let url = page.imageinfo.into_iter().next()?.url;
            Some(RemoteAsset {
                file_name: file_name_from_title(&page.title),
                location: url,
            })
        })
        .collect();
    Ok(CategoryPage {
        assets,
        continuation: response.continuation,
    })
}

/// `File:Alice (Summer) 00.png` becomes `Alice_(Summer)_00.png`.
pub fn file_name_from_title(title: &str) -> String {
    let name = title
        .split_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or(title);
    name.trim().replace(' ', "_")
}

/// Image entries of a local zip archive.
pub struct ArchiveProvider {
    path: PathBuf,
    extensions: Vec<String>,
}

impl ArchiveProvider {
    pub fn new(path: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            path: path.into(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    fn open(&self) -> Result<zip::ZipArchive<File>> {
        let file = File::open(&self.path)?;
        zip::ZipArchive::new(file).map_err(|err| fetch_error(&self.path.display().to_string(), err))
    }

    fn wanted(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}

impl AssetProvider for ArchiveProvider {
    fn list(&self) -> Result<Vec<RemoteAsset>> {
        let mut archive = self.open()?;
        let mut assets = Vec::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .map_err(|err| fetch_error(&self.path.display().to_string(), err))?;
            if !entry.is_file() {
                continue;
            }
            let location = entry.name().to_string();
            let file_name = location.rsplit('/').next().unwrap_or_default().to_string();
            if self.wanted(&file_name) {
                assets.push(RemoteAsset {
                    file_name,
                    location,
                });
            }
        }
        Ok(assets)
    }

    fn fetch(&self, asset: &RemoteAsset) -> Result<Vec<u8>> {
        let mut archive = self.open()?;
        let mut entry = archive
            .by_name(&asset.location)
            .map_err(|err| fetch_error(&asset.file_name, err))?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
