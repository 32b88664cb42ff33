use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{fmt, io::ErrorKind, path::PathBuf, str::FromStr};
use thiserror::Error;

use super::file_utils::{create_folder, is_safe_file_name};

/// Logical buckets proof images are grouped into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    AchievementProofs,
    BingoProofs,
    TradeProofs,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [
        Bucket::AchievementProofs,
        Bucket::BingoProofs,
        Bucket::TradeProofs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AchievementProofs => "achievement-proofs",
            Self::BingoProofs => "bingo-proofs",
            Self::TradeProofs => "trade-proofs",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == s)
            .ok_or_else(|| Error::NotFound(format!("bucket {}", s)))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid object name: {0}")]
    InvalidName(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("blob storage io: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name`, returning the object's public url
    async fn upload(&self, bucket: Bucket, name: &str, bytes: Vec<u8>) -> Result<String, Error>;
    async fn download(&self, bucket: Bucket, name: &str) -> Result<Vec<u8>, Error>;
    /// Deleting a missing object is not an error
    async fn delete(&self, bucket: Bucket, name: &str) -> Result<(), Error>;
    fn public_url(&self, bucket: Bucket, name: &str) -> String;
}

/// Blob store backed by a folder on local disk, one sub folder per bucket
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(media_folder: &str, public_base_url: &str) -> Self {
        for bucket in Bucket::ALL {
            create_folder(&format!("{}/{}", media_folder, bucket));
        }
        Self {
            root: PathBuf::from(media_folder),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, bucket: Bucket, name: &str) -> Result<PathBuf, Error> {
        if !is_safe_file_name(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        Ok(self.root.join(bucket.as_str()).join(name))
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, bucket: Bucket, name: &str, bytes: Vec<u8>) -> Result<String, Error> {
        let path = self.object_path(bucket, name)?;
        debug!("writing {} bytes to {:?}", bytes.len(), path);
        tokio::fs::write(&path, bytes).await?;
        info!("stored object {}/{}", bucket, name);
        Ok(self.public_url(bucket, name))
    }

    async fn download(&self, bucket: Bucket, name: &str) -> Result<Vec<u8>, Error> {
        let path = self.object_path(bucket, name)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(format!("{}/{}", bucket, name)),
            _ => Error::Io(e),
        })
    }

    async fn delete(&self, bucket: Bucket, name: &str) -> Result<(), Error> {
        let path = self.object_path(bucket, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn public_url(&self, bucket: Bucket, name: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, name)
    }
}
