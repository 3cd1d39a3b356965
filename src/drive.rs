//! Google Drive media uploads
//!
//! Speaks the Drive v3 REST API directly over `reqwest`, authenticating with
//! an authorized-user OAuth bundle stored on disk. Each upload creates a new
//! destination folder unconditionally; Drive allows duplicate folder names,
//! so two uploads with the same name produce two folders.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Errors that can occur during Drive operations
#[derive(Error, Debug)]
pub enum DriveError {
    /// Credential bundle missing or unreadable
    #[error("Credential file error: {0}")]
    Credentials(String),
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Drive or OAuth endpoint returned a non-success status
    #[error("Drive API error ({status}): {body}")]
    Api {
        /// HTTP status returned by the endpoint
        status: reqwest::StatusCode,
        /// Response body, for diagnostics
        body: String,
    },
    /// Error parsing the credential bundle
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// OAuth authorized-user credential bundle, as stored on disk
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthorizedUser {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Long-lived refresh token
    pub refresh_token: String,
    /// Last issued access token; stale by the time we run, never used directly
    #[serde(default)]
    pub token: Option<String>,
    /// Token endpoint; Google's unless the bundle says otherwise
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct CreatedFile {
    id: String,
}

/// Drive-backed media uploader
pub struct DriveUploader {
    http: reqwest::Client,
    credentials: AuthorizedUser,
}

impl DriveUploader {
    /// Create an uploader from an authorized-user credential file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not a valid bundle.
    pub fn from_authorized_user_file(path: impl AsRef<Path>) -> Result<Self, DriveError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DriveError::Credentials(format!("{}: {e}", path.display())))?;
        let credentials: AuthorizedUser = serde_json::from_str(&raw)?;

        Ok(Self {
            http: reqwest::Client::new(),
            credentials,
        })
    }

    /// Exchange the refresh token for a fresh access token
    async fn access_token(&self) -> Result<String, DriveError> {
        let request = RefreshRequest {
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
            refresh_token: &self.credentials.refresh_token,
            grant_type: "refresh_token",
        };

        let response = self
            .http
            .post(&self.credentials.token_uri)
            .form(&request)
            .send()
            .await?;
        let response = error_for_api(response).await?;

        Ok(response.json::<RefreshResponse>().await?.access_token)
    }

    /// Create a new remote folder and return its id
    ///
    /// No dedup: an existing folder with the same name is not reused.
    async fn create_folder(&self, access_token: &str, name: &str) -> Result<String, DriveError> {
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });

        let response = self
            .http
            .post(DRIVE_FILES_URL)
            .bearer_auth(access_token)
            .query(&[("fields", "id")])
            .json(&metadata)
            .send()
            .await?;
        let response = error_for_api(response).await?;

        Ok(response.json::<CreatedFile>().await?.id)
    }

    /// Upload a local file into a freshly created remote folder
    ///
    /// Uses the resumable upload protocol: initiate a session with the file
    /// metadata, then send the bytes to the returned session URL.
    ///
    /// # Errors
    ///
    /// Auth, quota and network failures propagate; there is no retry.
    pub async fn upload(&self, local_path: &Path, folder_name: &str) -> Result<(), DriveError> {
        let access_token = self.access_token().await?;
        let folder_id = self.create_folder(&access_token, folder_name).await?;

        let file_name = local_path
            .file_name()
            .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned());
        let metadata = serde_json::json!({
            "name": file_name,
            "parents": [folder_id],
        });

        let response = self
            .http
            .post(DRIVE_UPLOAD_URL)
            .bearer_auth(&access_token)
            .query(&[("uploadType", "resumable")])
            .json(&metadata)
            .send()
            .await?;
        let response = error_for_api(response).await?;

        let session_url = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DriveError::Api {
                status: response.status(),
                body: "resumable session URI missing from response".to_string(),
            })?
            .to_string();

        let bytes = tokio::fs::read(local_path).await?;
        let response = self.http.put(&session_url).body(bytes).send().await?;
        error_for_api(response).await?;

        info!(
            "Uploaded file {} to Google Drive in folder {}.",
            local_path.display(),
            folder_name
        );
        Ok(())
    }
}

/// Turn a non-success response into `DriveError::Api`
async fn error_for_api(response: reqwest::Response) -> Result<reqwest::Response, DriveError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(DriveError::Api { status, body })
}
