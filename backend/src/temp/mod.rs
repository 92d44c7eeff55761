//! Temporary resources - CSV input materialized on disk
//!
//! The validation engine reads files, so every request's input is written
//! under one shared per-process directory before validation:
//!
//! ```text
//! /tmp/bbl-validatorXXXXXX/
//! ├── 0b8f3c1e-....csv   fetched from a URL
//! └── 5d21a7c0-....csv   written from inline content
//! ```
//!
//! File names are random UUID v4 tokens, so concurrent requests never
//! collide and file creation needs no locking. Each file is handed out as a
//! [`TempResource`] guard that deletes it when dropped.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, StatusCode, Url};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{TempError, TempResult};

/// Prefix of the shared temp directory
const TEMP_DIR_PREFIX: &str = "bbl-validator";

/// Extension of materialized input files
const TEMP_FILE_EXTENSION: &str = "csv";

/// Extension used while a download is in flight
const PARTIAL_EXTENSION: &str = "part";

/// Default connect timeout for URL fetches
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read timeout for URL fetches
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

const POOL_MAX_IDLE_PER_HOST: usize = 15;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Guard
// =============================================================================

/// A materialized input file, deleted when the guard goes out of scope.
#[derive(Debug)]
pub struct TempResource {
    path: PathBuf,
    released: bool,
}

impl TempResource {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now, reporting any failure.
    pub async fn release(mut self) -> io::Result<()> {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                trace!(path = %self.path.display(), "Deleted temp file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Keep the file; the guard no longer owns it.
    fn disarm(mut self) {
        self.released = true;
    }
}

impl Drop for TempResource {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_if_present(&self.path) {
            warn!(path = %self.path.display(), "Failed to delete temp file: {}", e);
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            trace!(path = %path.display(), "Deleted temp file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

// =============================================================================
// Manager
// =============================================================================

/// Creates input files under the shared temp directory.
///
/// The directory itself is removed when the manager is dropped.
#[derive(Debug)]
pub struct TempResourceManager {
    root: TempDir,
    client: Client,
}

impl TempResourceManager {
    /// Create the temp directory and an HTTP client with the given timeouts
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> TempResult<Self> {
        let root = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()
            .map_err(TempError::Root)?;

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()
            .map_err(|e| TempError::Client(e.to_string()))?;

        debug!(root = %root.path().display(), "Created temp directory");
        Ok(Self { root, client })
    }

    /// Manager with the default 10s connect and read timeouts
    pub fn with_defaults() -> TempResult<Self> {
        Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    /// The shared temp directory
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Download `url` into a new temp file.
    ///
    /// Only a 200 response is accepted. The body is streamed to disk and the
    /// file only appears at its final path once the download is complete.
    pub async fn fetch_to_temp(&self, url: &str) -> TempResult<TempResource> {
        let parsed = Url::parse(url).map_err(|e| TempError::not_resolvable(url, e))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| TempError::not_resolvable(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TempError::not_resolvable(url, format!("HTTP {}", status)));
        }

        let path = self.next_path();
        // Deleted on error or when this future is dropped mid-download
        let partial = TempResource::new(
            path.with_extension(format!("{}.{}", TEMP_FILE_EXTENSION, PARTIAL_EXTENSION)),
        );

        stream_to_file(response, partial.path())
            .await
            .map_err(|e| TempError::not_resolvable(url, e))?;

        let resource = TempResource::new(path);
        tokio::fs::rename(partial.path(), resource.path())
            .await
            .map_err(|e| TempError::not_resolvable(url, e))?;
        partial.disarm();

        debug!(url, path = %resource.path().display(), "Downloaded file");
        Ok(resource)
    }

    /// Write `content` verbatim into a new temp file
    pub async fn write_to_temp(&self, content: &[u8]) -> TempResult<TempResource> {
        let resource = TempResource::new(self.next_path());
        tokio::fs::write(resource.path(), content).await?;

        debug!(path = %resource.path().display(), bytes = content.len(), "Saved content to temp file");
        Ok(resource)
    }

    /// Fresh `<uuid>.csv` path under the temp root
    fn next_path(&self) -> PathBuf {
        self.root
            .path()
            .join(format!("{}.{}", Uuid::new_v4(), TEMP_FILE_EXTENSION))
    }
}

/// Copy a response body to `path` chunk by chunk
async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<(), String> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| e.to_string())?;

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        file.write_all(&chunk).await.map_err(|e| e.to_string())?;
    }
    file.flush().await.map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, Bytes},
        http::StatusCode as AxumStatus,
        routing::get,
        Router,
    };
    use std::time::Instant;
    use std::collections::HashSet;
    use std::net::SocketAddr;

    const PAYLOAD: &[u8] = b"c1,c2,c3\na,b,ab\n\xc3\xa9,x,\xc3\xa9x\n";

    /// Serve a couple of fixed routes on an ephemeral port.
    async fn spawn_source() -> SocketAddr {
        let app = Router::new()
            .route("/data.csv", get(|| async { PAYLOAD.to_vec() }))
            .route("/missing.csv", get(|| async { (AxumStatus::NOT_FOUND, "gone") }))
            .route("/moved.csv", get(|| async { (AxumStatus::NO_CONTENT, "") }))
            .route("/stalled.csv", get(stalled))
            .route("/trickle.csv", get(trickle));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Answers only after 30 s
    async fn stalled() -> &'static str {
        tokio::time::sleep(Duration::from_secs(30)).await;
        "c1\n"
    }

    /// Sends the header row, then one more row every 5 s
    async fn trickle() -> Body {
        let rows = futures::stream::iter(0..10).then(|i| async move {
            if i > 0 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok::<_, io::Error>(Bytes::from_static(b"c1,c2,c3\n"))
        });
        Body::from_stream(rows)
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_fetch_round_trip() {
        let addr = spawn_source().await;
        let manager = TempResourceManager::with_defaults().unwrap();

        let resource = manager
            .fetch_to_temp(&format!("http://{}/data.csv", addr))
            .await
            .unwrap();

        assert!(resource.path().starts_with(manager.root()));
        assert_eq!(resource.path().extension().unwrap(), "csv");
        assert_eq!(std::fs::read(resource.path()).unwrap(), PAYLOAD);
    }

    #[tokio::test]
    async fn test_fetch_non_ok_status() {
        let addr = spawn_source().await;
        let manager = TempResourceManager::with_defaults().unwrap();

        for route in ["missing.csv", "moved.csv"] {
            let url = format!("http://{}/{}", addr, route);
            let err = manager.fetch_to_temp(&url).await.unwrap_err();
            match err {
                TempError::NotResolvable { url: reported, .. } => assert_eq!(reported, url),
                other => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(file_count(manager.root()), 0);
    }

    #[tokio::test]
    async fn test_fetch_malformed_url() {
        let manager = TempResourceManager::with_defaults().unwrap();
        let err = manager.fetch_to_temp("not-a-url").await.unwrap_err();
        assert!(err.to_string().contains("not-a-url"));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        let manager =
            TempResourceManager::new(Duration::from_millis(500), Duration::from_millis(500)).unwrap();
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = manager
            .fetch_to_temp(&format!("http://127.0.0.1:{}/x.csv", port))
            .await
            .unwrap_err();
        assert!(matches!(err, TempError::NotResolvable { .. }));
        assert_eq!(file_count(manager.root()), 0);
    }

    #[tokio::test]
    async fn test_fetch_read_timeout() {
        let addr = spawn_source().await;
        let manager =
            TempResourceManager::new(Duration::from_millis(500), Duration::from_millis(500)).unwrap();

        let started = Instant::now();
        let err = manager
            .fetch_to_temp(&format!("http://{}/stalled.csv", addr))
            .await
            .unwrap_err();

        assert!(matches!(err, TempError::NotResolvable { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(file_count(manager.root()), 0);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_leaves_no_file() {
        let addr = spawn_source().await;
        let manager = TempResourceManager::with_defaults().unwrap();

        let url = format!("http://{}/trickle.csv", addr);
        let fetch = manager.fetch_to_temp(&url);
        let result = tokio::time::timeout(Duration::from_millis(500), fetch).await;

        assert!(result.is_err(), "download should still be in flight");
        assert_eq!(file_count(manager.root()), 0);
    }

    #[tokio::test]
    async fn test_write_keeps_raw_bytes() {
        let manager = TempResourceManager::with_defaults().unwrap();
        let bytes = b"name\n\xff\xfe broken\n";

        let resource = manager.write_to_temp(bytes).await.unwrap();
        assert_eq!(std::fs::read(resource.path()).unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_drop_deletes_file() {
        let manager = TempResourceManager::with_defaults().unwrap();
        let resource = manager.write_to_temp(b"a,b\n").await.unwrap();
        let path = resource.path().to_path_buf();
        assert!(path.exists());

        drop(resource);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_release_after_external_delete() {
        let manager = TempResourceManager::with_defaults().unwrap();
        let resource = manager.write_to_temp(b"a,b\n").await.unwrap();
        std::fs::remove_file(resource.path()).unwrap();

        assert!(resource.release().await.is_ok());
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let manager = TempResourceManager::with_defaults().unwrap();
        let mut resources = Vec::new();
        for _ in 0..50 {
            resources.push(manager.write_to_temp(b"x\n").await.unwrap());
        }

        let names: HashSet<PathBuf> = resources.iter().map(|r| r.path().to_path_buf()).collect();
        assert_eq!(names.len(), 50);
        assert_eq!(file_count(manager.root()), 50);

        resources.clear();
        assert_eq!(file_count(manager.root()), 0);
    }

    #[test]
    fn test_root_removed_with_manager() {
        let manager = TempResourceManager::with_defaults().unwrap();
        let root = manager.root().to_path_buf();
        assert!(root.is_dir());

        drop(manager);
        assert!(!root.exists());
    }
}
