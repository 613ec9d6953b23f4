//! In-memory bucket implementing [`ObjectApi`]
//!
//! Follows S3 listing semantics closely enough to exercise pagination, delimiters
//! and multipart-upload bookkeeping without a network round trip.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::api::{ListPage, ListRequest, ObjectApi, ObjectEntry};

/// Request kinds, used to record calls and to inject failures
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Call {
    List,
    Head,
    CreateMultipartUpload,
    AbortMultipartUpload,
}

#[derive(Debug, Default)]
struct State {
    uploads: HashMap<String, String>,
    next_upload: u64,
    calls: Vec<Call>,
}

#[derive(Debug)]
pub struct MemoryBucket {
    bucket: String,
    objects: BTreeMap<String, u64>,
    page_size: usize,
    denied: HashSet<Call>,
    state: Mutex<State>,
}

enum Entry<'a> {
    Object(&'a str, u64),
    Prefix(String),
}

impl MemoryBucket {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: BTreeMap::new(),
            page_size: 1000,
            denied: HashSet::new(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_object(mut self, key: impl Into<String>, size: u64) -> Self {
        self.objects.insert(key.into(), size);
        self
    }

    /// Caps every listing page, regardless of the requested max keys.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Makes every request of this kind fail with an access-denied error.
    pub fn deny(mut self, call: Call) -> Self {
        self.denied.insert(call);
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Requests received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Multipart uploads created and not yet aborted.
    pub fn pending_uploads(&self) -> usize {
        self.state().uploads.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn enter(&self, call: Call, bucket: &str) -> anyhow::Result<()> {
        self.state().calls.push(call);
        if bucket != self.bucket {
            anyhow::bail!("NoSuchBucket: the bucket '{}' does not exist", bucket);
        }
        if self.denied.contains(&call) {
            anyhow::bail!("AccessDenied: {:?} is not allowed", call);
        }
        Ok(())
    }

    fn entries<'a>(&'a self, prefix: &str, delimiter: Option<&str>) -> Vec<Entry<'a>> {
        let mut entries = Vec::new();
        let mut seen_prefixes = HashSet::new();
        for (key, size) in self.objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            let rest = &key[prefix.len()..];
            let folded = delimiter
                .filter(|delimiter| !delimiter.is_empty())
                .and_then(|delimiter| {
                    rest.find(delimiter)
                        .map(|pos| format!("{}{}", prefix, &rest[..pos + delimiter.len()]))
                });
            match folded {
                Some(common) => {
                    if seen_prefixes.insert(common.clone()) {
                        entries.push(Entry::Prefix(common));
                    }
                }
                None => entries.push(Entry::Object(key, *size)),
            }
        }
        entries
    }
}

#[async_trait::async_trait]
impl ObjectApi for MemoryBucket {
    async fn list_page(&self, request: &ListRequest<'_>) -> anyhow::Result<ListPage> {
        self.enter(Call::List, request.bucket)?;
        let entries = self.entries(request.prefix, request.delimiter);
        let start = match &request.continuation_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("InvalidArgument: bad continuation token"))?,
            None => 0,
        };
        let requested = request
            .max_keys
            .map_or(self.page_size, |max_keys| max_keys.max(0) as usize);
        let end = entries.len().min(start + requested.min(self.page_size));
        let mut page = ListPage::default();
        for entry in entries.iter().take(end).skip(start) {
            match entry {
                Entry::Object(key, size) => page.objects.push(ObjectEntry {
                    key: key.to_string(),
                    size: *size,
                }),
                Entry::Prefix(prefix) => page.common_prefixes.push(prefix.clone()),
            }
        }
        if end < entries.len() && end > start {
            page.next_continuation_token = Some(end.to_string());
        }
        Ok(page)
    }

    async fn head_object(&self, bucket: &str, key: &str) -> anyhow::Result<()> {
        self.enter(Call::Head, bucket)?;
        if !self.objects.contains_key(key) {
            anyhow::bail!("NotFound: no object at key '{}'", key);
        }
        Ok(())
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> anyhow::Result<String> {
        self.enter(Call::CreateMultipartUpload, bucket)?;
        let mut state = self.state();
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(upload_id.clone(), key.to_string());
        Ok(upload_id)
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> anyhow::Result<()> {
        self.enter(Call::AbortMultipartUpload, bucket)?;
        let mut state = self.state();
        match state.uploads.get(upload_id) {
            Some(upload_key) if upload_key == key => {
                state.uploads.remove(upload_id);
                Ok(())
            }
            _ => anyhow::bail!("NoSuchUpload: upload '{}' for key '{}'", upload_id, key),
        }
    }
}
