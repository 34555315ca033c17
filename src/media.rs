use async_trait::async_trait;
use serde::Deserialize;

use crate::configuration::MediaSettings;
use crate::error::MediaError;

/// A file received from a client, ready to hand to the media service
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Where an uploaded asset can be fetched from
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MediaAsset {
    pub url: String,
}

/// Seam to the third-party media storage provider
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, upload: MediaUpload) -> Result<MediaAsset, MediaError>;
}

#[derive(Clone)]
pub struct HttpMediaStore {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpMediaStore {
    pub fn new(base_url: String, api_key: String, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
        }
    }

    pub fn from_settings(settings: &MediaSettings) -> Result<Self, MediaError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| MediaError::ServiceUnavailable(e.to_string()))?;
        Ok(Self::new(
            settings.base_url.clone(),
            settings.api_key.clone(),
            http_client,
        ))
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn upload(&self, upload: MediaUpload) -> Result<MediaAsset, MediaError> {
        let url = format!("{}/upload", self.base_url.trim_end_matches('/'));
        let size = upload.bytes.len();

        let asset = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, upload.content_type)
            .header("x-file-name", upload.file_name)
            .body(upload.bytes)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach media service: {}", e);
                MediaError::ServiceUnavailable(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("Media service returned error: {}", e);
                MediaError::UploadFailed(e.to_string())
            })?
            .json::<MediaAsset>()
            .await
            .map_err(|e| MediaError::UploadFailed(format!("invalid upload response: {}", e)))?;

        tracing::info!(bytes = size, url = %asset.url, "Media uploaded");
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = MediaSettings {
            base_url: "http://127.0.0.1:9000/".to_string(),
            api_key: "key".to_string(),
            timeout_milliseconds: 500,
        };
        let store = HttpMediaStore::from_settings(&settings).expect("client should build");
        assert_eq!(store.base_url, "http://127.0.0.1:9000/");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_reported() {
        // Port 9 (discard) is not expected to host an HTTP server
        let store = HttpMediaStore::new(
            "http://127.0.0.1:9".to_string(),
            "key".to_string(),
            reqwest::Client::new(),
        );
        let result = store
            .upload(MediaUpload {
                file_name: "avatar.png".to_string(),
                content_type: "image/png".to_string(),
                bytes: vec![1, 2, 3],
            })
            .await;

        assert!(result.is_err());
    }
}
