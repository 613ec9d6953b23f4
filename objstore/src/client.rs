//! Object store configuration and the S3 client built from it
//!
//! The client is created on first use and then reused for as long as the
//! [`ObjectStoreConfig`] it belongs to lives. Distinct configs never share a client.

use anyhow::Context;
use aws_sdk_s3::error::DisplayErrorContext;
use std::sync::Arc;

use crate::api::{ListPage, ListRequest, ObjectApi, ObjectEntry};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Where the S3 client gets its credentials from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialSource<'a> {
    Profile(&'a str),
    Static {
        access_key_id: &'a str,
        secret_access_key: &'a str,
        session_token: Option<&'a str>,
    },
    DefaultChain,
}

pub struct ObjectStoreConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, Ceph, ...)
    pub endpoint_url: Option<String>,
    /// Named credential profile
    pub profile: Option<String>,
    handle: tokio::sync::OnceCell<Arc<dyn ObjectApi>>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            profile: None,
            handle: tokio::sync::OnceCell::new(),
        }
    }
}

// a clone is a distinct config and gets its own client
impl Clone for ObjectStoreConfig {
    fn clone(&self) -> Self {
        Self {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone(),
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            profile: self.profile.clone(),
            handle: tokio::sync::OnceCell::new(),
        }
    }
}

impl std::fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("profile", &self.profile)
            .field("connected", &self.handle.initialized())
            .finish()
    }
}

impl ObjectStoreConfig {
    /// Uses `api` instead of building an S3 client on first use.
    pub fn with_api(mut self, api: Arc<dyn ObjectApi>) -> Self {
        self.handle = tokio::sync::OnceCell::new_with(Some(api));
        self
    }

    /// Named profile wins over an explicit key pair, which wins over the default chain.
    pub fn credential_source(&self) -> CredentialSource<'_> {
        if let Some(profile) = self.profile.as_deref() {
            return CredentialSource::Profile(profile);
        }
        match (
            self.access_key_id.as_deref(),
            self.secret_access_key.as_deref(),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => CredentialSource::Static {
                access_key_id,
                secret_access_key,
                session_token: self.session_token.as_deref(),
            },
            _ => CredentialSource::DefaultChain,
        }
    }

    /// True once the client handle has been created.
    pub fn is_connected(&self) -> bool {
        self.handle.initialized()
    }

    /// Returns the client for this config, creating it on first use.
    ///
    /// Concurrent first calls race safely: exactly one client is built.
    pub async fn api(&self) -> anyhow::Result<Arc<dyn ObjectApi>> {
        let api = self
            .handle
            .get_or_try_init(|| async {
                let client = build_client(self).await;
                Ok::<_, anyhow::Error>(Arc::new(S3Api::new(client)) as Arc<dyn ObjectApi>)
            })
            .await?;
        Ok(api.clone())
    }
}

async fn build_client(config: &ObjectStoreConfig) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new(config.region.clone()));
    match config.credential_source() {
        CredentialSource::Profile(profile) => {
            tracing::info!("S3 client created with profile {}", profile);
            loader = loader.profile_name(profile);
        }
        CredentialSource::Static {
            access_key_id,
            secret_access_key,
            session_token,
        } => {
            tracing::info!("S3 client created with explicit credentials");
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                access_key_id,
                secret_access_key,
                session_token.map(str::to_string),
                None,
                "storprobe",
            ));
        }
        CredentialSource::DefaultChain => {
            tracing::info!("S3 client created with default credential chain");
        }
    }
    if let Some(endpoint_url) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }
    let sdk_config = loader.load().await;
    let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
    if config.endpoint_url.is_some() {
        // S3-compatible servers rarely support virtual-hosted buckets
        builder = builder.force_path_style(true);
    }
    aws_sdk_s3::Client::from_conf(builder.build())
}

/// [`ObjectApi`] backed by the AWS SDK
pub struct S3Api {
    client: aws_sdk_s3::Client,
}

impl S3Api {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ObjectApi for S3Api {
    async fn list_page(&self, request: &ListRequest<'_>) -> anyhow::Result<ListPage> {
        let mut req = self
            .client
            .list_objects_v2()
            .bucket(request.bucket)
            .prefix(request.prefix);
        if let Some(delimiter) = request.delimiter {
            req = req.delimiter(delimiter);
        }
        if let Some(max_keys) = request.max_keys {
            req = req.max_keys(max_keys);
        }
        if let Some(token) = &request.continuation_token {
            req = req.continuation_token(token);
        }
        let resp = req.send().await.map_err(|error| {
            anyhow::anyhow!(
                "ListObjectsV2 on bucket '{}' failed: {}",
                request.bucket,
                DisplayErrorContext(&error)
            )
        })?;
        let mut objects = Vec::with_capacity(resp.contents().len());
        for obj in resp.contents() {
            let key = obj.key().context("Missing S3 object key")?;
            objects.push(ObjectEntry {
                key: key.to_string(),
                size: obj.size().unwrap_or(0).max(0) as u64,
            });
        }
        let common_prefixes = resp
            .common_prefixes()
            .iter()
            .filter_map(|prefix| prefix.prefix().map(str::to_string))
            .collect();
        Ok(ListPage {
            objects,
            common_prefixes,
            next_continuation_token: resp.next_continuation_token().map(str::to_string),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> anyhow::Result<()> {
        self.client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| {
                anyhow::anyhow!(
                    "HeadObject on 's3://{}/{}' failed: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&error)
                )
            })?;
        Ok(())
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| {
                anyhow::anyhow!(
                    "CreateMultipartUpload on 's3://{}/{}' failed: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&error)
                )
            })?;
        resp.upload_id()
            .map(str::to_string)
            .context("CreateMultipartUpload returned no upload id")
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> anyhow::Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|error| {
                anyhow::anyhow!(
                    "AbortMultipartUpload on 's3://{}/{}' failed: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&error)
                )
            })?;
        Ok(())
    }
}
