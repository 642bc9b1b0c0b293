// Backend HTTP client
//
// Wraps `reqwest::Client` with URL construction against the configured API
// base (e.g. `http://host:3001/api`) and `{ success, message, data }`
// envelope unwrapping. Cheap to clone: the inner client is reference counted.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{ApiResponse, Asset, ReferenceData, TagReading, TagRecord};
use crate::transport::TransportConfig;

const BODY_PREVIEW_LEN: usize = 200;

/// Async client for the tag inventory backend.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Build a client for the API rooted at `base_url` (usually ending in `/api`).
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The configured API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/{path}`, tolerant of a trailing slash on the base.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// The health endpoint lives beside the API root: `/api` → `/health`.
    pub(crate) fn health_url(&self) -> Url {
        let mut url = self.base_url.clone();
        let trimmed = url.path().trim_end_matches('/');
        let root = trimmed.strip_suffix("/api").unwrap_or(trimmed);
        let health = format!("{root}/health");
        url.set_path(&health);
        url.set_query(None);
        url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Forward one tag reading. Returns the backend's confirmation message.
    pub async fn send_tag_reading(&self, reading: &TagReading) -> Result<String, Error> {
        let url = self.api_url("tags/reading")?;
        let envelope: ApiResponse<serde_json::Value> = self.post(url, reading).await?;
        Ok(envelope
            .message
            .unwrap_or_else(|| "Tag reading recorded".into()))
    }

    /// Attach asset metadata to a tag.
    pub async fn assign_asset(&self, epc: &str, asset: &Asset) -> Result<String, Error> {
        let url = self.api_url(&format!("tags/{epc}/asset"))?;
        let envelope: ApiResponse<serde_json::Value> = self.post(url, asset).await?;
        Ok(envelope.message.unwrap_or_else(|| "Asset assigned".into()))
    }

    /// List the backend's per-tag aggregates.
    pub async fn list_tags(&self) -> Result<Vec<TagRecord>, Error> {
        let url = self.api_url("tags")?;
        let envelope: ApiResponse<Vec<TagRecord>> = self.get(url).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Department and room reference lists.
    pub async fn fetch_references(&self) -> Result<ReferenceData, Error> {
        let url = self.api_url("references")?;
        let envelope: ApiResponse<ReferenceData> = self.get(url).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Connectivity check. Any 2xx counts as healthy; the body is not parsed.
    pub async fn health(&self) -> Result<(), Error> {
        let url = self.health_url();
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Status {
            status: status.as_u16(),
            message: preview(&body).to_owned(),
        })
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<ApiResponse<T>, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        parse_envelope(resp).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<ApiResponse<T>, Error> {
        debug!("POST {}", url);
        let resp = self.http.post(url).json(body).send().await?;
        parse_envelope(resp).await
    }
}

/// Unwrap the envelope, mapping non-2xx statuses and `success: false`
/// bodies to errors.
async fn parse_envelope<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<ApiResponse<T>, Error> {
    let status = resp.status();
    let body = resp.text().await?;
    trace!(status = status.as_u16(), body = preview(&body), "backend response");

    if !status.is_success() {
        // Error bodies usually still carry the envelope; fall back to raw text.
        let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
            .ok()
            .and_then(|env| env.reason().map(str::to_owned))
            .unwrap_or_else(|| preview(&body).to_owned());
        return Err(Error::Status {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: ApiResponse<T> =
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })?;

    if !envelope.success {
        return Err(Error::Rejected {
            message: envelope
                .reason()
                .map_or_else(|| "Unknown error".to_owned(), str::to_owned),
        });
    }

    Ok(envelope)
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
