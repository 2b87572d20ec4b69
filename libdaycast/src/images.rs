//! Image acquisition with provider fallback and a bounded local cache
//!
//! Sources are tried in priority order; the first verified download wins.
//! When every source fails, a random cached image is reused, and when the
//! cache is empty the caller simply posts text-only. Nothing in here ever
//! propagates an error past `acquire`.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::config::ImagesConfig;
use crate::error::{ConfigError, Result};
use crate::types::ImageMimeType;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Errors internal to image acquisition; absorbed at the `acquire` boundary
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("source not available: {0}")]
    Unavailable(String),

    #[error("download failed with status {0}")]
    Status(u16),

    #[error("download failed: {0}")]
    Http(String),

    #[error("downloaded file too small: {0} bytes")]
    TooSmall(u64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One remote place images can come from
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Short identifier, used as the cached file's name prefix
    fn name(&self) -> &str;

    /// Fetch one candidate image as raw bytes
    async fn fetch(&self, client: &reqwest::Client) -> std::result::Result<Vec<u8>, ImageError>;
}

async fn download(
    client: &reqwest::Client,
    url: &str,
) -> std::result::Result<Vec<u8>, ImageError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ImageError::Http(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ImageError::Status(response.status().as_u16()));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ImageError::Http(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Fixed list of direct image URLs; one is picked uniformly at random
pub struct CuratedSource {
    name: String,
    urls: Vec<String>,
}

impl CuratedSource {
    pub fn new(name: String, urls: Vec<String>) -> Self {
        Self { name, urls }
    }
}

#[async_trait]
impl ImageSource for CuratedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, client: &reqwest::Client) -> std::result::Result<Vec<u8>, ImageError> {
        if self.urls.is_empty() {
            return Err(ImageError::Unavailable(format!("{} has no urls", self.name)));
        }
        let url = &self.urls[rand::thread_rng().gen_range(0..self.urls.len())];
        debug!("Downloading from {}: {}", self.name, url);
        download(client, url).await
    }
}

/// Placeholder-image service addressed by dimensions and a random id
pub struct PlaceholderSource {
    base_url: String,
    width: u32,
    height: u32,
}

impl PlaceholderSource {
    pub fn new(base_url: String, width: u32, height: u32) -> Self {
        Self {
            base_url,
            width,
            height,
        }
    }
}

#[async_trait]
impl ImageSource for PlaceholderSource {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn fetch(&self, client: &reqwest::Client) -> std::result::Result<Vec<u8>, ImageError> {
        let id: u32 = rand::thread_rng().gen_range(0..1000);
        let url = format!("{}/{}/{}?random={}", self.base_url, self.width, self.height, id);
        debug!("Downloading placeholder image {}", id);
        download(client, &url).await
    }
}

/// Keyword-query image search; the term is picked uniformly at random
pub struct SearchSource {
    base_url: String,
    terms: Vec<String>,
    width: u32,
    height: u32,
}

impl SearchSource {
    pub fn new(base_url: String, terms: Vec<String>, width: u32, height: u32) -> Self {
        Self {
            base_url,
            terms,
            width,
            height,
        }
    }
}

#[async_trait]
impl ImageSource for SearchSource {
    fn name(&self) -> &str {
        "search"
    }

    async fn fetch(&self, client: &reqwest::Client) -> std::result::Result<Vec<u8>, ImageError> {
        if self.terms.is_empty() {
            return Err(ImageError::Unavailable("no search terms configured".to_string()));
        }
        let term = &self.terms[rand::thread_rng().gen_range(0..self.terms.len())];
        let sig: u64 = rand::thread_rng().gen();
        let url = format!(
            "{}/{}x{}/?{}&sig={:016x}",
            self.base_url,
            self.width,
            self.height,
            urlencode(term),
            sig
        );
        debug!("Searching images for: {}", term);
        download(client, &url).await
    }
}

/// Minimal query-component encoding for search terms
fn urlencode(term: &str) -> String {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
    utf8_percent_encode(term, NON_ALPHANUMERIC).to_string()
}

/// Seam between the scheduler and the image cache
#[async_trait]
pub trait ImageSupplier: Send + Sync {
    /// Produce a local image path, or `None` when no image can be had
    async fn acquire(&self) -> Option<PathBuf>;

    /// Number of image files currently cached
    fn cached_count(&self) -> usize;
}

/// Downloads images into a bounded local cache directory
pub struct ImageLibrary {
    client: reqwest::Client,
    dir: PathBuf,
    max_cached: usize,
    min_file_size: u64,
    sources: Vec<Box<dyn ImageSource>>,
}

impl ImageLibrary {
    /// Build the standard source chain from configuration
    pub fn new(config: &ImagesConfig) -> Result<Self> {
        let mut sources: Vec<Box<dyn ImageSource>> = Vec::new();
        for list in &config.curated {
            sources.push(Box::new(CuratedSource::new(
                list.name.clone(),
                list.urls.clone(),
            )));
        }
        sources.push(Box::new(PlaceholderSource::new(
            config.placeholder_url.clone(),
            config.width,
            config.height,
        )));
        sources.push(Box::new(SearchSource::new(
            config.search_url.clone(),
            config.search_terms.clone(),
            config.width,
            config.height,
        )));

        let dir = PathBuf::from(shellexpand::tilde(&config.cache_dir).to_string());
        Self::with_sources(dir, config.max_cached, config.min_file_size, sources)
    }

    /// Build a library over an explicit source chain
    pub fn with_sources(
        dir: PathBuf,
        max_cached: usize,
        min_file_size: u64,
        sources: Vec<Box<dyn ImageSource>>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| ConfigError::Invalid(format!("cannot create cache dir: {}", e)))?;

        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("cannot build http client: {}", e)))?;

        Ok(Self {
            client,
            dir,
            max_cached,
            min_file_size,
            sources,
        })
    }

    /// Cached image files with their modification times
    fn cached_files(&self) -> Vec<(PathBuf, SystemTime)> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read image cache {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if !is_image_file(&path) {
                    return None;
                }
                let mtime = entry.metadata().and_then(|m| m.modified()).ok()?;
                Some((path, mtime))
            })
            .collect()
    }

    /// Delete the oldest cached images beyond the configured cap
    pub fn cleanup_old_images(&self) {
        let mut files = self.cached_files();
        if files.len() <= self.max_cached {
            return;
        }

        files.sort_by(|a, b| b.1.cmp(&a.1));
        for (path, _) in files.split_off(self.max_cached) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Evicted cached image {}", path.display()),
                Err(e) => warn!("Failed to evict {}: {}", path.display(), e),
            }
        }
    }

    /// A uniform-random file already in the cache, if any
    fn random_cached(&self) -> Option<PathBuf> {
        let files = self.cached_files();
        if files.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..files.len());
        Some(files[idx].0.clone())
    }

    /// Download from one source and verify the file size
    async fn try_source(
        &self,
        source: &dyn ImageSource,
    ) -> std::result::Result<PathBuf, ImageError> {
        let bytes = source.fetch(&self.client).await?;

        let suffix: u32 = rand::thread_rng().gen();
        let filename = format!(
            "{}_{}_{:08x}.jpg",
            source.name(),
            Utc::now().timestamp_millis(),
            suffix
        );
        let path = self.dir.join(filename);
        std::fs::write(&path, &bytes)?;

        let size = std::fs::metadata(&path)?.len();
        if size < self.min_file_size {
            let _ = std::fs::remove_file(&path);
            return Err(ImageError::TooSmall(size));
        }

        Ok(path)
    }
}

#[async_trait]
impl ImageSupplier for ImageLibrary {
    async fn acquire(&self) -> Option<PathBuf> {
        self.cleanup_old_images();

        for source in &self.sources {
            match self.try_source(source.as_ref()).await {
                Ok(path) => {
                    info!("Fetched image from {}: {}", source.name(), path.display());
                    return Some(path);
                }
                Err(e) => warn!("Image source {} failed: {}", source.name(), e),
            }
        }

        match self.random_cached() {
            Some(path) => {
                info!("Falling back to cached image {}", path.display());
                Some(path)
            }
            None => {
                info!("No image available, posting text-only");
                None
            }
        }
    }

    fn cached_count(&self) -> usize {
        self.cached_files().len()
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageMimeType::from_extension)
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FailingSource {
        name: String,
    }

    #[async_trait]
    impl ImageSource for FailingSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(
            &self,
            _client: &reqwest::Client,
        ) -> std::result::Result<Vec<u8>, ImageError> {
            Err(ImageError::Status(503))
        }
    }

    struct FixedSource {
        name: String,
        bytes: Vec<u8>,
        calls: Arc<AtomicUsize>,
    }

    impl FixedSource {
        fn new(name: &str, size: usize) -> Self {
            Self {
                name: name.to_string(),
                bytes: vec![0xAB; size],
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ImageSource for FixedSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(
            &self,
            _client: &reqwest::Client,
        ) -> std::result::Result<Vec<u8>, ImageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.bytes.clone())
        }
    }

    fn library(dir: &TempDir, sources: Vec<Box<dyn ImageSource>>) -> ImageLibrary {
        ImageLibrary::with_sources(dir.path().to_path_buf(), 20, 100, sources).unwrap()
    }

    fn touch(path: &PathBuf, age_secs: u64) {
        File::create(path).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[test]
    fn test_cleanup_keeps_newest_files() {
        let dir = TempDir::new().unwrap();
        let lib = ImageLibrary::with_sources(dir.path().to_path_buf(), 3, 100, vec![]).unwrap();

        // Five images, oldest first by increasing age
        for i in 0..5u64 {
            touch(&dir.path().join(format!("img_{}.jpg", i)), i * 60);
        }

        lib.cleanup_old_images();

        let remaining: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(remaining.len(), 3);
        // The most recently modified files survive
        assert!(remaining.contains(&"img_0.jpg".to_string()));
        assert!(remaining.contains(&"img_1.jpg".to_string()));
        assert!(remaining.contains(&"img_2.jpg".to_string()));
    }

    #[test]
    fn test_cleanup_ignores_non_image_files() {
        let dir = TempDir::new().unwrap();
        let lib = ImageLibrary::with_sources(dir.path().to_path_buf(), 1, 100, vec![]).unwrap();

        touch(&dir.path().join("a.jpg"), 10);
        touch(&dir.path().join("b.png"), 20);
        touch(&dir.path().join("notes.txt"), 30);

        lib.cleanup_old_images();

        assert!(dir.path().join("a.jpg").exists());
        assert!(!dir.path().join("b.png").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(lib.cached_count(), 1);
    }

    #[tokio::test]
    async fn test_first_successful_source_wins() {
        let dir = TempDir::new().unwrap();
        let winner = FixedSource::new("c", 500);
        let untouched = FixedSource::new("d", 500);
        let untouched_calls = untouched.calls.clone();

        let lib = library(
            &dir,
            vec![
                Box::new(FailingSource { name: "a".to_string() }),
                Box::new(FailingSource { name: "b".to_string() }),
                Box::new(winner),
                Box::new(untouched),
            ],
        );

        let path = lib.acquire().await.expect("expected an image path");
        let filename = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(filename.starts_with("c_"), "got {}", filename);
        assert_eq!(untouched_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_undersized_download_is_deleted_and_skipped() {
        let dir = TempDir::new().unwrap();
        // 10 bytes is below the 100-byte minimum
        let tiny = FixedSource::new("tiny", 10);
        let lib = library(&dir, vec![Box::new(tiny)]);

        let result = lib.acquire().await;
        assert!(result.is_none());
        assert_eq!(lib.cached_count(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_cached_image() {
        let dir = TempDir::new().unwrap();
        let cached = dir.path().join("earlier.jpg");
        touch(&cached, 60);

        let lib = library(&dir, vec![Box::new(FailingSource { name: "a".to_string() })]);

        let path = lib.acquire().await.expect("expected the cached image");
        assert_eq!(path, cached);
    }

    #[tokio::test]
    async fn test_empty_cache_and_failing_sources_yield_none() {
        let dir = TempDir::new().unwrap();
        let lib = library(&dir, vec![Box::new(FailingSource { name: "a".to_string() })]);

        assert!(lib.acquire().await.is_none());
    }

    #[tokio::test]
    async fn test_acquire_writes_uniquely_named_file() {
        let dir = TempDir::new().unwrap();
        let lib = library(&dir, vec![Box::new(FixedSource::new("stock", 500))]);

        let first = lib.acquire().await.unwrap();
        let second = lib.acquire().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(lib.cached_count(), 2);
    }

    #[test]
    fn test_cached_count_empty_dir() {
        let dir = TempDir::new().unwrap();
        let lib = library(&dir, vec![]);
        assert_eq!(lib.cached_count(), 0);
    }
}
