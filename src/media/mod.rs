//! Media host used to clean up product images and videos.

pub mod cloudinary;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

pub use cloudinary::Cloudinary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Video,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// Result of a single destroy call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyOutcome {
    Ok,
    /// Already gone; callers treat this as success.
    NotFound,
    Other(String),
}

impl DestroyOutcome {
    pub fn from_result(result: &str) -> Self {
        match result {
            "ok" => Self::Ok,
            "not found" => Self::NotFound,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "ok",
            Self::NotFound => "not found",
            Self::Other(other) => other,
        }
    }
}

/// Per-id status reported by a batch delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDeletion {
    pub deleted: BTreeMap<String, String>,
}

impl BatchDeletion {
    /// Every id the host reported on, whatever its status.
    pub fn deleted_count(&self) -> usize { self.deleted.len() }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media host request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Media host returned {status}: {message}")]
    Api { status: u16, message: String },
}

#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn destroy(&self, public_id: &str, kind: ResourceType) -> Result<DestroyOutcome, MediaError>;

    async fn delete_images(&self, public_ids: &[String]) -> Result<BatchDeletion, MediaError>;
}
