//! The image downloader (spec §4.G): fetches a remote image (or decodes a
//! local `data:` URL), validates its MIME type, and caches the result
//! through `omnigate-state`'s byte-cache. Grounded on the
//! `perform_request`/`check_response` shape used by `gateway-endpoint`'s
//! `HttpEndpoint`, generalised from a JSON chat call to a raw byte GET.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use omnigate_core::{GatewayError, Result};
use omnigate_state::StateStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Spec §4.G: `Content-Type ∈ {image/jpeg,png,gif,webp}`.
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Spec §4.G: "10-30s timeout".
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Spec §4.G: "default TTL (~1h)".
pub const DEFAULT_IMAGE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct StoredImage {
    mime: String,
    /// Base64 rather than a raw byte array, so the serialised cache entry
    /// doesn't blow up to one JSON number per byte.
    bytes_b64: String,
}

fn is_allowed_mime(mime: &str) -> bool {
    let base = mime.split(';').next().unwrap_or(mime).trim();
    ALLOWED_MIME_TYPES.contains(&base)
}

fn cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("imgcache:{}", hex::encode(hasher.finalize()))
}

/// Decodes a `data:` URL locally, with no network call. Only the
/// `;base64` form is supported (the near-universal encoding for inline
/// image data); anything else is reported as unsupported rather than
/// guessed at.
fn parse_data_url(url: &str) -> Result<Option<DownloadedImage>> {
    let Some(rest) = url.strip_prefix("data:") else {
        return Ok(None);
    };
    let comma = rest
        .find(',')
        .ok_or_else(|| GatewayError::Config("malformed data URL: missing comma".into()))?;
    let (meta, data) = rest.split_at(comma);
    let data = &data[1..];

    if !meta.ends_with(";base64") {
        return Err(GatewayError::unsupported("data-url", "non-base64 data URL"));
    }
    let mime = meta.trim_end_matches(";base64");
    let mime = if mime.is_empty() { "application/octet-stream" } else { mime };
    if !is_allowed_mime(mime) {
        return Err(GatewayError::unsupported("data-url", format!("mime type {mime}")));
    }

    let bytes = BASE64
        .decode(data)
        .map_err(|e| GatewayError::Config(format!("malformed data URL: invalid base64: {e}")))?;
    Ok(Some(DownloadedImage { mime: mime.to_string(), bytes }))
}

pub struct Downloader {
    client: reqwest::Client,
    store: Arc<dyn StateStore>,
    ttl: Duration,
}

impl Downloader {
    pub fn new(store: Arc<dyn StateStore>) -> Result<Self> {
        Self::with_timeout(store, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(store: Arc<dyn StateStore>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("building http client: {e}")))?;
        Ok(Self { client, store, ttl: DEFAULT_IMAGE_TTL })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn fetch_image(&self, url: &str) -> Result<DownloadedImage> {
        if let Some(image) = parse_data_url(url)? {
            return Ok(image);
        }

        let key = cache_key(url);
        if let Some(raw) = self.store.load_cache(&key).await? {
            let stored: StoredImage = serde_json::from_slice(&raw)
                .map_err(|e| GatewayError::Config(format!("corrupt image cache entry: {e}")))?;
            let bytes = BASE64
                .decode(&stored.bytes_b64)
                .map_err(|e| GatewayError::Config(format!("corrupt image cache entry: {e}")))?;
            return Ok(DownloadedImage { mime: stored.mime, bytes });
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::upstream_protocol("downloader", url, format!("fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GatewayError::upstream_protocol(
                "downloader",
                url,
                format!("HTTP {}", response.status()),
            ));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_allowed_mime(&mime) {
            return Err(GatewayError::unsupported("downloader", format!("mime type {mime}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::upstream_protocol("downloader", url, format!("reading body: {e}")))?
            .to_vec();

        let stored = StoredImage { mime: mime.clone(), bytes_b64: BASE64.encode(&bytes) };
        let raw = serde_json::to_vec(&stored)
            .map_err(|e| GatewayError::Config(format!("cannot serialize image cache entry: {e}")))?;
        self.store.save_cache(&key, raw, self.ttl).await?;

        Ok(DownloadedImage { mime, bytes })
    }
}
