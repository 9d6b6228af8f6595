//! Google Cloud Storage backend over the JSON API.

use async_trait::async_trait;
use base64::Engine as _;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::StoreError;
use crate::store::{ObjectBody, ObjectPage, ObjectStore};
use crate::types::ObjectDescriptor;

/// Only the listing fields the sync engine reads.
const LIST_FIELDS: &str = "items(name,size),nextPageToken";

/// Header carrying the project billed for requests.
const USER_PROJECT_HEADER: &str = "x-goog-user-project";

/// Header carrying object checksums on media downloads.
const HASH_HEADER: &str = "x-goog-hash";

/// Header carrying the `Content-Encoding` the object was stored with.
const STORED_ENCODING_HEADER: &str = "x-goog-stored-content-encoding";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListedObject>,
    next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ListedObject {
    name: String,
    size: SizeField,
}

/// The JSON API encodes 64-bit sizes as strings; emulators sometimes send numbers.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum SizeField {
    Text(String),
    Number(u64),
}

impl SizeField {
    fn bytes(&self) -> Result<u64, StoreError> {
        match self {
            SizeField::Number(n) => Ok(*n),
            SizeField::Text(s) => s.parse().map_err(|_| {
                StoreError::Decode(serde::de::Error::custom(format!(
                    "invalid object size '{}'",
                    s
                )))
            }),
        }
    }
}

/// Google Cloud Storage client.
#[derive(Debug, Clone)]
pub struct GcsStore {
    client: Client,
    endpoint: Url,
}

impl GcsStore {
    /// Creates a client for the endpoint, project and credentials in `config`.
    pub fn new(config: &SyncConfig) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_PROJECT_HEADER,
            HeaderValue::from_str(config.project())
                .map_err(|e| StoreError::InvalidEndpoint(format!("project header: {}", e)))?,
        );
        if let Some(token) = config.access_token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| StoreError::InvalidEndpoint(format!("access token header: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint().clone(),
        })
    }

    /// Builds `{endpoint}/{segments...}`, percent-encoding each segment.
    ///
    /// Object keys go in as a single segment, so their `/` become `%2F`.
    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(request: RequestBuilder, what: &str) -> Result<Response, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, what, body))
    }
}

/// Maps a non-success status to a [`StoreError`].
fn classify_status(status: StatusCode, what: &str, body: String) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(what.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::PermissionDenied(format!("{}: {}", what, body.trim()))
        }
        StatusCode::PRECONDITION_FAILED => StoreError::AlreadyExists(what.to_string()),
        _ => StoreError::Http {
            status: status.as_u16(),
            message: format!("{}: {}", what, body.trim()),
        },
    }
}

/// Extracts the MD5 from an `x-goog-hash` header as lowercase hex.
///
/// The header looks like `crc32c=n03x6A==,md5=Ojk9c3dhfxgoKVVHYwFbHQ==`.
/// Composite objects carry no md5 entry.
fn md5_from_hash_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(HASH_HEADER)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|entry| entry.trim().strip_prefix("md5="))
        .and_then(|encoded| base64::engine::general_purpose::STANDARD.decode(encoded).ok())
        .filter(|digest| digest.len() == 16)
        .map(|digest| digest.iter().map(|b| format!("{:02x}", b)).collect())
}

/// Whether the server decompressed a gzip-stored object on the way out.
///
/// The `x-goog-hash` MD5 then describes the stored bytes, not the body.
fn is_decompressed(headers: &HeaderMap) -> bool {
    let is_gzip = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("gzip"))
    };
    is_gzip(STORED_ENCODING_HEADER) && !is_gzip(reqwest::header::CONTENT_ENCODING.as_str())
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ObjectPage, StoreError> {
        let url = self.url(&["storage", "v1", "b", bucket, "o"])?;
        let mut query = vec![("prefix", prefix), ("fields", LIST_FIELDS)];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        debug!(bucket, prefix, page_token, "Listing objects");
        let request = self.client.get(url).query(&query);
        let response = Self::send(request, &format!("bucket {}", bucket)).await?;
        let body = response.bytes().await?;
        let listing: ListResponse = serde_json::from_slice(&body)?;

        let objects = listing
            .items
            .into_iter()
            .map(|item| Ok(ObjectDescriptor::new(item.name, item.size.bytes()?)))
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(ObjectPage {
            objects,
            next_page_token: listing.next_page_token,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StoreError> {
        let url = self.url(&["storage", "v1", "b", bucket, "o", key])?;
        let request = self.client.get(url).query(&[("alt", "media")]);
        let response = Self::send(request, &format!("gs://{}/{}", bucket, key)).await?;

        let content_length = response.content_length();
        let md5 = if is_decompressed(response.headers()) {
            debug!(bucket, key, "Served decompressed, skipping MD5 check");
            None
        } else {
            md5_from_hash_header(response.headers())
        };
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(StoreError::from))
            .boxed();

        Ok(ObjectBody {
            stream,
            content_length,
            md5,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        create_only: bool,
    ) -> Result<(), StoreError> {
        let url = self.url(&["upload", "storage", "v1", "b", bucket, "o"])?;
        let mut query = vec![("uploadType", "media"), ("name", key)];
        if create_only {
            // Generation 0 only matches when no live object exists.
            query.push(("ifGenerationMatch", "0"));
        }

        let request = self
            .client
            .post(url)
            .query(&query)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data);
        Self::send(request, &format!("gs://{}/{}", bucket, key)).await?;
        Ok(())
    }
}
