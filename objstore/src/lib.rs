//! S3-compatible object store access for storprobe
//!
//! The functions here work against any [`ObjectApi`]; in production that is the
//! [`S3Api`] created lazily by an [`ObjectStoreConfig`], in tests it is the in-memory
//! bucket from the `memory` module (enabled by the `testing` feature).

use common::AccessOperation;
use tracing::instrument;

pub mod api;
pub mod client;
#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use api::{ListPage, ListRequest, ObjectApi, ObjectEntry};
pub use client::{CredentialSource, ObjectStoreConfig, S3Api, DEFAULT_REGION};

/// Name of the key the write probe starts (and aborts) a multipart upload on
pub const PROBE_OBJECT_NAME: &str = ".storprobe-access-test";

/// Result of a non-destructive permission probe
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Allowed,
    /// The probe failed; carries the cause
    Denied(String),
}

impl ProbeOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ProbeOutcome::Allowed)
    }
}

/// Key used by the write probe under `prefix`.
pub fn probe_key(prefix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        PROBE_OBJECT_NAME.to_string()
    } else {
        format!("{prefix}/{PROBE_OBJECT_NAME}")
    }
}

/// Counts every object under `prefix` and sums their sizes, following pagination to the end.
#[instrument(skip(api))]
pub async fn count_objects_and_bytes(
    api: &dyn ObjectApi,
    bucket: &str,
    prefix: &str,
) -> anyhow::Result<(u64, u64)> {
    let mut count = 0u64;
    let mut bytes = 0u64;
    let mut continuation_token = None;
    loop {
        let page = api
            .list_page(&ListRequest {
                bucket,
                prefix,
                continuation_token,
                ..Default::default()
            })
            .await?;
        for object in &page.objects {
            count += 1;
            bytes += object.size;
        }
        match page.next_continuation_token {
            Some(token) => continuation_token = Some(token),
            None => break,
        }
    }
    tracing::debug!(
        "s3://{}/{}: {} objects, {} bytes",
        bucket,
        prefix,
        count,
        bytes
    );
    Ok((count, bytes))
}

/// Lists the common prefixes one level below `prefix`, using `/` as the delimiter.
///
/// A non-empty prefix without a trailing slash gets one, so `data` and `data/` list the
/// same level.
#[instrument(skip(api))]
pub async fn list_common_prefixes(
    api: &dyn ObjectApi,
    bucket: &str,
    prefix: &str,
) -> anyhow::Result<Vec<String>> {
    let prefix = if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    };
    let mut prefixes = Vec::new();
    let mut continuation_token = None;
    loop {
        let page = api
            .list_page(&ListRequest {
                bucket,
                prefix: &prefix,
                delimiter: Some("/"),
                continuation_token,
                ..Default::default()
            })
            .await?;
        prefixes.extend(page.common_prefixes);
        match page.next_continuation_token {
            Some(token) => continuation_token = Some(token),
            None => break,
        }
    }
    Ok(prefixes)
}

/// Lists at most `limit` object keys under `prefix`.
#[instrument(skip(api))]
pub async fn list_objects(
    api: &dyn ObjectApi,
    bucket: &str,
    prefix: &str,
    limit: usize,
) -> anyhow::Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut continuation_token = None;
    while keys.len() < limit {
        let remaining = i32::try_from(limit - keys.len()).unwrap_or(i32::MAX);
        let page = api
            .list_page(&ListRequest {
                bucket,
                prefix,
                max_keys: Some(remaining),
                continuation_token,
                ..Default::default()
            })
            .await?;
        keys.extend(
            page.objects
                .into_iter()
                .take(limit - keys.len())
                .map(|object| object.key),
        );
        match page.next_continuation_token {
            Some(token) => continuation_token = Some(token),
            None => break,
        }
    }
    Ok(keys)
}

async fn probe(
    api: &dyn ObjectApi,
    bucket: &str,
    prefix: &str,
    operation: AccessOperation,
) -> anyhow::Result<()> {
    match operation {
        AccessOperation::List => {
            api.list_page(&ListRequest {
                bucket,
                prefix,
                max_keys: Some(1),
                ..Default::default()
            })
            .await?;
        }
        AccessOperation::Read => {
            let page = api
                .list_page(&ListRequest {
                    bucket,
                    prefix,
                    max_keys: Some(1),
                    ..Default::default()
                })
                .await?;
            // nothing to read under an accessible prefix still counts as read access
            if let Some(object) = page.objects.first() {
                api.head_object(bucket, &object.key).await?;
            }
        }
        AccessOperation::Write => {
            let key = probe_key(prefix);
            let upload_id = api.create_multipart_upload(bucket, &key).await?;
            api.abort_multipart_upload(bucket, &key, &upload_id).await?;
        }
    }
    Ok(())
}

/// Checks whether `operation` is permitted under `prefix` without modifying the bucket.
///
/// The write probe never leaves an object behind: a multipart upload is created and
/// aborted, and the abort is attempted whenever the create succeeded.
#[instrument(skip(api))]
pub async fn check_operation_allowed(
    api: &dyn ObjectApi,
    bucket: &str,
    prefix: &str,
    operation: AccessOperation,
) -> ProbeOutcome {
    match probe(api, bucket, prefix, operation).await {
        Ok(()) => {
            tracing::info!("{} access allowed on s3://{}/{}", operation, bucket, prefix);
            ProbeOutcome::Allowed
        }
        Err(error) => {
            tracing::warn!(
                "{} access denied on s3://{}/{}: {:#}",
                operation,
                bucket,
                prefix,
                error
            );
            ProbeOutcome::Denied(format!("{error:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::{Call, MemoryBucket};
    use tracing_test::traced_test;

    fn data_bucket() -> MemoryBucket {
        MemoryBucket::new("bucket")
            .with_object("data/a", 8)
            .with_object("data/b", 16)
            .with_object("data/c", 8)
            .with_object("other/d", 100)
    }

    #[tokio::test]
    async fn count_sums_every_page() {
        let bucket = data_bucket().with_page_size(1);
        let (count, bytes) = count_objects_and_bytes(&bucket, "bucket", "data")
            .await
            .unwrap();
        assert_eq!((count, bytes), (3, 32));
        // three single-object pages
        assert_eq!(bucket.calls().len(), 3);
    }

    #[tokio::test]
    async fn count_of_empty_prefix_is_zero() {
        let bucket = data_bucket();
        let metrics = count_objects_and_bytes(&bucket, "bucket", "nothing-here/")
            .await
            .unwrap();
        assert_eq!(metrics, (0, 0));
    }

    #[tokio::test]
    async fn count_of_missing_bucket_fails() {
        let bucket = data_bucket();
        assert!(
            count_objects_and_bytes(&bucket, "other-bucket", "")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn common_prefixes_one_level_down() {
        let bucket = MemoryBucket::new("bucket")
            .with_object("data/2023/a", 1)
            .with_object("data/2024/b", 1)
            .with_object("data/x", 1)
            .with_page_size(1);
        for prefix in ["data", "data/"] {
            let prefixes = list_common_prefixes(&bucket, "bucket", prefix)
                .await
                .unwrap();
            assert_eq!(prefixes, ["data/2023/", "data/2024/"]);
        }
        let top = list_common_prefixes(&bucket, "bucket", "").await.unwrap();
        assert_eq!(top, ["data/"]);
    }

    #[tokio::test]
    async fn object_listing_honours_limit_across_pages() {
        let bucket = data_bucket().with_page_size(2);
        let keys = list_objects(&bucket, "bucket", "data/", 3).await.unwrap();
        assert_eq!(keys, ["data/a", "data/b", "data/c"]);
        let keys = list_objects(&bucket, "bucket", "data/", 2).await.unwrap();
        assert_eq!(keys, ["data/a", "data/b"]);
        let keys = list_objects(&bucket, "bucket", "", 100).await.unwrap();
        assert_eq!(keys.len(), 4);
    }

    #[tokio::test]
    async fn zero_limit_makes_no_call() {
        let bucket = data_bucket();
        let keys = list_objects(&bucket, "bucket", "data/", 0).await.unwrap();
        assert!(keys.is_empty());
        assert!(bucket.calls().is_empty());
    }

    #[test]
    fn probe_key_placement() {
        assert_eq!(probe_key(""), ".storprobe-access-test");
        assert_eq!(probe_key("data"), "data/.storprobe-access-test");
        assert_eq!(probe_key("data/"), "data/.storprobe-access-test");
    }

    #[tokio::test]
    async fn read_probe_heads_first_object() {
        let bucket = data_bucket();
        let outcome = check_operation_allowed(&bucket, "bucket", "data/", AccessOperation::Read).await;
        assert_eq!(outcome, ProbeOutcome::Allowed);
        assert_eq!(bucket.calls(), [Call::List, Call::Head]);
    }

    #[tokio::test]
    async fn read_probe_on_empty_prefix_is_allowed() {
        let bucket = data_bucket().deny(Call::Head);
        let outcome =
            check_operation_allowed(&bucket, "bucket", "empty/", AccessOperation::Read).await;
        assert!(outcome.is_allowed());
        assert_eq!(bucket.calls(), [Call::List]);
    }

    #[tokio::test]
    async fn denied_list_is_reported() {
        let bucket = data_bucket().deny(Call::List);
        let outcome = check_operation_allowed(&bucket, "bucket", "", AccessOperation::List).await;
        match outcome {
            ProbeOutcome::Denied(cause) => assert!(cause.contains("AccessDenied")),
            ProbeOutcome::Allowed => panic!("list should be denied"),
        }
    }

    #[tokio::test]
    async fn write_probe_leaves_nothing_behind() {
        let bucket = data_bucket();
        let outcome = check_operation_allowed(&bucket, "bucket", "data", AccessOperation::Write).await;
        assert!(outcome.is_allowed());
        assert_eq!(
            bucket.calls(),
            [Call::CreateMultipartUpload, Call::AbortMultipartUpload]
        );
        assert_eq!(bucket.pending_uploads(), 0);
        assert_eq!(bucket.object_count(), 4);
    }

    #[tokio::test]
    #[traced_test]
    async fn write_probe_attempts_abort_after_create() {
        let bucket = data_bucket().deny(Call::AbortMultipartUpload);
        let outcome = check_operation_allowed(&bucket, "bucket", "data", AccessOperation::Write).await;
        assert!(!outcome.is_allowed());
        assert_eq!(
            bucket.calls(),
            [Call::CreateMultipartUpload, Call::AbortMultipartUpload]
        );
        assert_eq!(bucket.object_count(), 4);
        assert!(logs_contain("write access denied on s3://bucket/data"));
    }

    #[tokio::test]
    async fn write_probe_denied_at_create_skips_abort() {
        let bucket = data_bucket().deny(Call::CreateMultipartUpload);
        let outcome = check_operation_allowed(&bucket, "bucket", "", AccessOperation::Write).await;
        assert!(!outcome.is_allowed());
        assert_eq!(bucket.calls(), [Call::CreateMultipartUpload]);
    }
}
