use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::config::{S3Config, StorageBackend, StorageConfig};

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    /// Deleting a key that does not exist succeeds.
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    async fn object_url(&self, key: &str) -> anyhow::Result<String>;
}

pub async fn build_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageClient>> {
    match (config.backend, config.s3.as_ref()) {
        (StorageBackend::S3, Some(s3)) => Ok(Arc::new(S3Storage::new(s3).await?)),
        (StorageBackend::S3, None) => anyhow::bail!("S3 storage selected without S3 settings"),
        (StorageBackend::Local, _) => Ok(Arc::new(LocalStorage::new(
            config.upload_dir.clone(),
            config.public_prefix.clone(),
        ))),
    }
}

/// Images on the local filesystem, served by the app under `public_prefix`.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_prefix: String,
}

impl LocalStorage {
    pub fn new(root: PathBuf, public_prefix: String) -> Self {
        Self {
            root,
            public_prefix,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(
            !key.is_empty() && !key.contains(['/', '\\']) && !key.contains(".."),
            "invalid storage key {key:?}"
        );
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create upload dir {}", self.root.display()))?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        debug!(key, bytes = body.len(), "stored image");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key, "image already gone");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }

    async fn object_url(&self, key: &str) -> anyhow::Result<String> {
        Ok(format!("{}/{}", self.public_prefix.trim_end_matches('/'), key))
    }
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    presign_ttl_secs: u64,
}

impl S3Storage {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            presign_ttl_secs: cfg.presign_ttl_secs,
        })
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    // S3 answers 204 for missing keys, so no NotFound special case.
    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    async fn object_url(&self, key: &str) -> anyhow::Result<String> {
        let req = self.client.get_object().bucket(&self.bucket).key(key);
        let presigned = req
            .presigned(PresigningConfig::expires_in(std::time::Duration::from_secs(
                self.presign_ttl_secs,
            ))?)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}
