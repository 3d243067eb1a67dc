use crate::drive::folder::{FolderReference, FolderResolver};
use crate::error::{CourierError, Result};
use crate::google_oauth::AuthorizationManager;
use crate::utils::content_hash;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// MIME type every exported document is created with.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    /// Browser link as reported by Drive, when it sends one.
    pub web_view_link: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata<'a> {
    name: &'a str,
    parents: [&'a str; 1],
    mime_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedFile {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

/// Pushes in-memory documents into a Drive folder given by its URL.
pub struct Uploader {
    auth: Arc<AuthorizationManager>,
    resolver: FolderResolver,
    http: reqwest::Client,
    upload_url: Url,
}

impl Uploader {
    pub fn new(auth: Arc<AuthorizationManager>, http: reqwest::Client, upload_url: Url) -> Self {
        Self {
            auth,
            resolver: FolderResolver,
            http,
            upload_url,
        }
    }

    /// Authorize, resolve the folder, then create `filename` in it.
    ///
    /// A bad `location_url` fails before any request is made. A `401` with a
    /// refreshable credential gets one refresh and one more attempt; nothing
    /// else is retried.
    pub async fn upload(
        &self,
        filename: &str,
        content: &[u8],
        location_url: &str,
    ) -> Result<UploadedFile> {
        let cred = self.auth.authorize().await?;
        let folder = self.resolver.resolve(location_url)?;

        let mut resp = self
            .create(&cred.access_token, filename, content, &folder)
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED && cred.has_refresh_token() {
            warn!(file = %filename, "upload unauthorized; refreshing access token");
            let cred = self.auth.refresh().await?;
            resp = self
                .create(&cred.access_token, filename, content, &folder)
                .await?;
        }

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(file = %filename, %status, error = %e, "failed to read rejection body");
                    format!("<unreadable response body: {e}>")
                }
            };
            return Err(CourierError::UploadRejected { status, body });
        }

        let created: CreatedFile = resp.json().await?;
        info!(file = %filename, folder = %folder, id = %created.id, "document uploaded");
        Ok(UploadedFile {
            id: created.id,
            name: filename.to_string(),
            web_view_link: created.web_view_link,
        })
    }

    async fn create(
        &self,
        access_token: &str,
        filename: &str,
        content: &[u8],
        folder: &FolderReference,
    ) -> Result<reqwest::Response> {
        let metadata = FileMetadata {
            name: filename,
            parents: [folder.as_str()],
            mime_type: DOCX_MIME_TYPE,
        };
        let boundary = format!("courier-{}", &content_hash(content)[..32]);
        let body = multipart_related(&boundary, &serde_json::to_vec(&metadata)?, content);

        let resp = self
            .http
            .post(self.upload_url.clone())
            .query(&[("uploadType", "multipart"), ("fields", "id,webViewLink")])
            .bearer_auth(access_token)
            .header(CONTENT_TYPE, format!("multipart/related; boundary={boundary}"))
            .body(body)
            .send()
            .await?;
        Ok(resp)
    }
}

/// Two-part `multipart/related` body: JSON metadata, then the media.
fn multipart_related(boundary: &str, metadata: &[u8], media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + media.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {DOCX_MIME_TYPE}\r\n\r\n").as_bytes());
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
