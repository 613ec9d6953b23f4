//! Low-level object store calls
//!
//! [`ObjectApi`] is the narrow set of requests the higher-level operations need. The
//! S3 implementation lives in [`crate::client`], an in-memory one in [`crate::memory`].

/// One `ListObjectsV2`-style request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListRequest<'a> {
    pub bucket: &'a str,
    pub prefix: &'a str,
    pub delimiter: Option<&'a str>,
    pub max_keys: Option<i32>,
    pub continuation_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

/// One page of listing results
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectEntry>,
    pub common_prefixes: Vec<String>,
    /// Set when more results are available
    pub next_continuation_token: Option<String>,
}

#[async_trait::async_trait]
pub trait ObjectApi: Send + Sync {
    async fn list_page(&self, request: &ListRequest<'_>) -> anyhow::Result<ListPage>;

    /// Metadata-only fetch; succeeds when the object exists and is readable.
    async fn head_object(&self, bucket: &str, key: &str) -> anyhow::Result<()>;

    /// Starts a multipart upload and returns its upload id.
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> anyhow::Result<String>;

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> anyhow::Result<()>;
}
