//! Image sources: resolve a card to its raw image bytes.
//!
//! [`WebSource`] downloads from the card image service, [`LocalSource`] reads
//! from a directory of pre-downloaded scans. Both sit behind the
//! [`ImageSource`] trait so the fetch stage (and tests) never care which one
//! is in use.

use crate::config::PipelineConfig;
use crate::error::{CardError, MgProxyError};
use crate::model::WorkItem;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Content types the decoder can handle.
const IMAGE_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

/// File extensions tried, in order, by [`LocalSource`].
pub const LOCAL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Something that can produce the raw image bytes for a card.
///
/// Implementations are shared by every fetch worker and must be safe to call
/// concurrently.
pub trait ImageSource: Send + Sync {
    /// Fetch the undecoded image for `item`.
    fn fetch(&self, item: &WorkItem) -> Result<Vec<u8>, CardError>;

    /// Human-readable description for log lines.
    fn describe(&self) -> String;
}

/// Build the image address for a card below `base`.
///
/// With a set code the address is `<base>/set/<SET>/<name>.hq.jpg`, without
/// one `<base>/card/<name>.hq.jpg`. Segments are percent-encoded, so names
/// such as `Fire // Ice` stay inside one path segment.
pub fn card_url(base: &Url, name: &str, set_code: Option<&str>) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty();
        match set_code {
            Some(set) => {
                segments.push("set").push(set);
            }
            None => {
                segments.push("card");
            }
        }
        segments.push(&format!("{name}.hq.jpg"));
    }
    url
}

fn is_image_content_type(value: &str) -> bool {
    let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    IMAGE_CONTENT_TYPES.contains(&mime.as_str())
}

// ── Web ──────────────────────────────────────────────────────────────────

/// Downloads card images over HTTP with a blocking client.
///
/// Fetch workers are plain OS threads, so the blocking client is the natural
/// fit; one client (and its connection pool) is shared by all workers.
#[derive(Debug, Clone)]
pub struct WebSource {
    client: reqwest::blocking::Client,
    base: Url,
    timeout_secs: u64,
}

impl WebSource {
    /// Create a source rooted at `base_url`.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, MgProxyError> {
        let base = Url::parse(base_url).map_err(|e| MgProxyError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(MgProxyError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot carry a path".into(),
            });
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("mgproxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MgProxyError::HttpClient(e.to_string()))?;

        info!("Fetching card images from {}", base);
        Ok(Self {
            client,
            base,
            timeout_secs,
        })
    }

    /// Create a source from the run configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, MgProxyError> {
        Self::new(&config.base_url, config.fetch_timeout_secs)
    }

    /// Address for a specific card.
    pub fn url_for(&self, item: &WorkItem) -> Url {
        card_url(&self.base, &item.name, item.set_code.as_deref())
    }

    fn transport_error(&self, item: &WorkItem, url: &Url, e: reqwest::Error) -> CardError {
        if e.is_timeout() {
            CardError::Timeout {
                card: item.name.clone(),
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            CardError::Network {
                card: item.name.clone(),
                url: url.to_string(),
                detail: e.to_string(),
            }
        }
    }
}

impl ImageSource for WebSource {
    fn fetch(&self, item: &WorkItem) -> Result<Vec<u8>, CardError> {
        let url = self.url_for(item);
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| self.transport_error(item, &url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CardError::HttpStatus {
                card: item.name.clone(),
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<missing>")
            .to_string();
        if !is_image_content_type(&content_type) {
            return Err(CardError::ContentType {
                card: item.name.clone(),
                url: url.to_string(),
                content_type,
            });
        }

        let bytes = response
            .bytes()
            .map_err(|e| self.transport_error(item, &url, e))?;
        debug!("{}: {} bytes", item.name, bytes.len());
        Ok(bytes.to_vec())
    }

    fn describe(&self) -> String {
        format!("web ({})", self.base)
    }
}

// ── Local ────────────────────────────────────────────────────────────────

/// Reads card images named `<card name>.<ext>` from one directory.
#[derive(Debug, Clone)]
pub struct LocalSource {
    directory: PathBuf,
}

impl LocalSource {
    /// Create a source over `directory`, which must already exist.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, MgProxyError> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.is_dir() {
            return Err(MgProxyError::SourceDirNotFound { path: directory });
        }
        info!("Reading card images from {}", directory.display());
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn not_found(&self, item: &WorkItem) -> CardError {
        CardError::NotFound {
            card: item.name.clone(),
            location: self.directory.display().to_string(),
        }
    }
}

impl ImageSource for LocalSource {
    fn fetch(&self, item: &WorkItem) -> Result<Vec<u8>, CardError> {
        // A name must map to a file directly inside the directory.
        if item.name.contains(['/', '\\']) || item.name == ".." || item.name == "." {
            return Err(self.not_found(item));
        }

        for ext in LOCAL_EXTENSIONS {
            let path = self.directory.join(format!("{}.{ext}", item.name));
            match std::fs::read(&path) {
                Ok(bytes) => {
                    debug!("{}: read {} bytes from {}", item.name, bytes.len(), path.display());
                    return Ok(bytes);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(CardError::Unreadable {
                        card: item.name.clone(),
                        path,
                        detail: e.to_string(),
                    })
                }
            }
        }

        Err(self.not_found(item))
    }

    fn describe(&self) -> String {
        format!("local ({})", self.directory.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://mtgimage.com/").unwrap()
    }

    #[test]
    fn card_url_without_set() {
        let url = card_url(&base(), "Swamp", None);
        assert_eq!(url.as_str(), "http://mtgimage.com/card/Swamp.hq.jpg");
    }

    #[test]
    fn card_url_with_set() {
        let url = card_url(&base(), "Forest", Some("M10"));
        assert_eq!(url.as_str(), "http://mtgimage.com/set/M10/Forest.hq.jpg");
    }

    #[test]
    fn card_url_encodes_names() {
        let url = card_url(&base(), "Fire // Ice", None);
        assert_eq!(
            url.as_str(),
            "http://mtgimage.com/card/Fire%20%2F%2F%20Ice.hq.jpg"
        );
    }

    #[test]
    fn card_url_keeps_base_path() {
        let base = Url::parse("http://localhost:8080/images").unwrap();
        let url = card_url(&base, "Swamp", None);
        assert_eq!(url.as_str(), "http://localhost:8080/images/card/Swamp.hq.jpg");
    }

    #[test]
    fn content_type_check() {
        assert!(is_image_content_type("image/jpeg"));
        assert!(is_image_content_type("IMAGE/PNG; charset=binary"));
        assert!(!is_image_content_type("text/html; charset=utf-8"));
        assert!(!is_image_content_type("<missing>"));
    }

    #[test]
    fn web_source_rejects_bad_base_url() {
        assert!(matches!(
            WebSource::new("not a url", 5),
            Err(MgProxyError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            WebSource::new("mailto:someone@example.com", 5),
            Err(MgProxyError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn local_source_requires_directory() {
        let err = LocalSource::new("/definitely/not/a/dir").unwrap_err();
        assert!(matches!(err, MgProxyError::SourceDirNotFound { .. }));
    }

    #[test]
    fn local_source_reads_first_matching_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Swamp.png"), b"png-bytes").unwrap();
        std::fs::write(dir.path().join("Swamp.jpg"), b"jpg-bytes").unwrap();
        let source = LocalSource::new(dir.path()).unwrap();

        let bytes = source.fetch(&WorkItem::new(1, "Swamp")).unwrap();
        assert_eq!(bytes, b"jpg-bytes");
    }

    #[test]
    fn local_source_missing_card() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalSource::new(dir.path()).unwrap();
        let err = source.fetch(&WorkItem::new(1, "Island")).unwrap_err();
        assert_eq!(err.kind(), "not-found");
    }

    #[test]
    fn local_source_rejects_path_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalSource::new(dir.path()).unwrap();
        for name in ["../secret", "..", "a/b", "a\\b"] {
            let err = source.fetch(&WorkItem::new(1, name)).unwrap_err();
            assert_eq!(err.kind(), "not-found", "name {name:?}");
        }
    }
}
