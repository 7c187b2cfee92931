//! Cloudinary upload and admin API client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha1::{Digest, Sha1};

use super::{BatchDeletion, DestroyOutcome, MediaError, MediaHost, ResourceType};
use crate::config::CloudinaryConfig;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

pub struct Cloudinary {
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Deserialize)]
struct DeleteResourcesResponse {
    #[serde(default)]
    deleted: BTreeMap<String, String>,
}

impl Cloudinary {
    pub fn new(config: &CloudinaryConfig) -> Self {
        Self {
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            http: reqwest::Client::new(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MediaError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default().chars().take(300).collect();
        Err(MediaError::Api { status: status.as_u16(), message })
    }
}

/// Upload-API signature: SHA-1 over `k=v` pairs sorted by key and joined
/// with `&`, followed by the API secret.
pub fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let payload = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
    let mut hasher = Sha1::new();
    hasher.update(payload.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaHost for Cloudinary {
    async fn destroy(&self, public_id: &str, kind: ResourceType) -> Result<DestroyOutcome, MediaError> {
        let mut params = vec![
            ("invalidate", "true".to_string()),
            ("public_id", public_id.to_string()),
            ("timestamp", Utc::now().timestamp().to_string()),
        ];
        let signature = sign(&params, self.api_secret.expose_secret());
        params.push(("api_key", self.api_key.clone()));
        params.push(("signature", signature));

        let url = format!("{API_BASE}/{}/{}/destroy", self.cloud_name, kind.as_str());
        let response = Self::check(self.http.post(url).form(&params).send().await?).await?;
        let body: DestroyResponse = response.json().await?;
        tracing::debug!(public_id, kind = kind.as_str(), result = %body.result, "media destroy");
        Ok(DestroyOutcome::from_result(&body.result))
    }

    async fn delete_images(&self, public_ids: &[String]) -> Result<BatchDeletion, MediaError> {
        let mut query: Vec<(&str, &str)> = public_ids.iter().map(|id| ("public_ids[]", id.as_str())).collect();
        query.push(("invalidate", "true"));

        let url = format!("{API_BASE}/{}/resources/image/upload", self.cloud_name);
        let request = self
            .http
            .delete(url)
            .basic_auth(&self.api_key, Some(self.api_secret.expose_secret()))
            .query(&query);
        let response = Self::check(request.send().await?).await?;
        let body: DeleteResourcesResponse = response.json().await?;
        tracing::debug!(requested = public_ids.len(), reported = body.deleted.len(), "media batch delete");
        Ok(BatchDeletion { deleted: body.deleted })
    }
}
