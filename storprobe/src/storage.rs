//! Unified storage operations
//!
//! [`Storage`] answers the same three questions for every backend: how big a location
//! is ([`Storage::analyze`]), what it contains ([`Storage::list_contents`]) and whether
//! it can be used ([`Storage::verify_access`]). Each verb resolves the location, matches
//! on the backend and classifies adapter failures into [`common::Error`]; adapter error
//! types never reach the caller.

use std::sync::Arc;

use tracing::instrument::WithSubscriber;

use common::{AccessOperation, BackendKind, ContentType, Error, Result, StorageMetrics};
use objstore::{ObjectApi, ObjectStoreConfig, ProbeOutcome};
use remote::{SshSession, Target};

use crate::acl::{AclAdapter, GetfaclAcl};
use crate::fs::{FilesystemAdapter, ShellFilesystem};
use crate::locator::{self, AclFlavor, BackendConfig, ResolvedLocation};

/// Outcome of probing an SSH location
#[derive(Debug, PartialEq, Eq)]
pub enum SshAccess {
    Granted,
    /// The probe ran and failed; carries the cause
    Denied(String),
    /// The request itself was rejected before anything ran remotely
    Invalid(Error),
}

/// Entry point for every storage operation
pub struct Storage {
    filesystem: Arc<dyn FilesystemAdapter>,
    acl: Arc<dyn AclAdapter>,
    /// Used for object store locations inferred from an `s3://` path without a config
    default_object_store: ObjectStoreConfig,
    dispatch: Option<tracing::Dispatch>,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            filesystem: Arc::new(ShellFilesystem::default()),
            acl: Arc::new(GetfaclAcl),
            default_object_store: ObjectStoreConfig::default(),
            dispatch: None,
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("default_object_store", &self.default_object_store)
            .field("dispatch", &self.dispatch.is_some())
            .finish_non_exhaustive()
    }
}

fn not_supported_file_listing(kind: BackendKind) -> Error {
    let backend = match kind {
        BackendKind::RemoteSsh => "SSH",
        _ => kind.as_str(),
    };
    Error::not_supported(format!("File listing not implemented for {backend} storage"))
}

/// Checks the key file, if any, before anything runs on the host.
async fn ssh_target(session: &SshSession) -> Result<Target> {
    if let Some(key_file) = &session.key_file {
        remote::validate_key_file(key_file)
            .await
            .map_err(|error| Error::validation(format!("{error:#}")))?;
    }
    Ok(Target::Ssh(session.clone()))
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filesystem(mut self, filesystem: Arc<dyn FilesystemAdapter>) -> Self {
        self.filesystem = filesystem;
        self
    }

    pub fn with_acl(mut self, acl: Arc<dyn AclAdapter>) -> Self {
        self.acl = acl;
        self
    }

    /// Object store settings for `s3://` locations given without an explicit config.
    pub fn with_default_object_store(mut self, config: ObjectStoreConfig) -> Self {
        self.default_object_store = config;
        self
    }

    /// Runs every operation under `dispatch` instead of the ambient subscriber.
    pub fn with_dispatch(mut self, dispatch: tracing::Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    async fn traced<F: std::future::Future>(&self, future: F) -> F::Output {
        match &self.dispatch {
            Some(dispatch) => future.with_subscriber(dispatch.clone()).await,
            None => future.await,
        }
    }

    async fn object_api(&self, config: Option<&BackendConfig>) -> anyhow::Result<Arc<dyn ObjectApi>> {
        match config {
            Some(BackendConfig::ObjectStore(config)) => config.api().await,
            _ => self.default_object_store.api().await,
        }
    }

    /// Counts items and bytes stored at `location`.
    ///
    /// An existing but empty location yields zero items and zero bytes.
    pub async fn analyze(
        &self,
        location: &str,
        config: Option<&BackendConfig>,
        timeout: std::time::Duration,
    ) -> Result<StorageMetrics> {
        self.traced(self.analyze_impl(location, config, timeout))
            .await
    }

    async fn analyze_impl(
        &self,
        location: &str,
        config: Option<&BackendConfig>,
        timeout: std::time::Duration,
    ) -> Result<StorageMetrics> {
        let resolved = locator::resolve(location, config)?;
        tracing::info!("Analyzing {} storage at {}", resolved.kind(), location);
        let counted = match &resolved {
            ResolvedLocation::ObjectStore { bucket, prefix } => match self.object_api(config).await {
                Ok(api) => objstore::count_objects_and_bytes(api.as_ref(), bucket, prefix).await,
                Err(error) => Err(error),
            },
            ResolvedLocation::RemoteSsh { session, path } => {
                let target = ssh_target(session).await?;
                self.filesystem
                    .count_files_and_bytes(&target, path, timeout)
                    .await
            }
            ResolvedLocation::Local { path } => {
                self.filesystem
                    .count_files_and_bytes(&Target::Local, path, timeout)
                    .await
            }
        };
        let (item_count, total_bytes) = counted.map_err(|error| {
            let error = Error::storage(format!("Failed to analyze storage '{location}'"), &error);
            tracing::debug!("{}", error);
            error
        })?;
        Ok(StorageMetrics::new(
            item_count,
            total_bytes,
            resolved.kind(),
            location,
        ))
    }

    /// Lists subdirectories (common prefixes) or files (object keys) at `location`.
    ///
    /// Object store entries are full `s3://bucket/...` paths; `max_items` caps object key
    /// listings. File listings on filesystems are not supported.
    pub async fn list_contents(
        &self,
        location: &str,
        config: Option<&BackendConfig>,
        content_type: ContentType,
        max_items: usize,
        timeout: std::time::Duration,
    ) -> Result<Vec<String>> {
        self.traced(self.list_contents_impl(location, config, content_type, max_items, timeout))
            .await
    }

    async fn list_contents_impl(
        &self,
        location: &str,
        config: Option<&BackendConfig>,
        content_type: ContentType,
        max_items: usize,
        timeout: std::time::Duration,
    ) -> Result<Vec<String>> {
        let resolved = locator::resolve(location, config)?;
        tracing::info!(
            "Listing {} in {} storage at {}",
            content_type,
            resolved.kind(),
            location
        );
        let listed = match (&resolved, content_type) {
            (ResolvedLocation::ObjectStore { bucket, prefix }, content_type) => {
                match self.object_api(config).await {
                    Ok(api) => {
                        let keys = match content_type {
                            ContentType::Subdirectories => {
                                objstore::list_common_prefixes(api.as_ref(), bucket, prefix).await
                            }
                            ContentType::Files => {
                                objstore::list_objects(api.as_ref(), bucket, prefix, max_items).await
                            }
                        };
                        keys.map(|keys| {
                            keys.into_iter()
                                .map(|key| format!("s3://{bucket}/{key}"))
                                .collect()
                        })
                    }
                    Err(error) => Err(error),
                }
            }
            (_, ContentType::Files) => return Err(not_supported_file_listing(resolved.kind())),
            (ResolvedLocation::RemoteSsh { session, path }, ContentType::Subdirectories) => {
                let target = ssh_target(session).await?;
                self.filesystem
                    .list_immediate_subdirectories(&target, path, None, timeout)
                    .await
            }
            (ResolvedLocation::Local { path }, ContentType::Subdirectories) => {
                self.filesystem
                    .list_immediate_subdirectories(&Target::Local, path, None, timeout)
                    .await
            }
        };
        listed.map_err(|error| {
            let error = Error::storage(
                format!("Failed to list storage contents '{location}'"),
                &error,
            );
            tracing::debug!("{}", error);
            error
        })
    }

    /// Checks whether `operation` is permitted at `location`.
    ///
    /// * object store: a non-destructive probe; a denied probe is a validation error
    ///   carrying the cause.
    /// * SSH: a one-entry subdirectory listing. A failed probe is `Ok(false)`; only
    ///   request validation errors are returned as errors. Write access is not probed
    ///   separately, a successful listing stands in for it.
    /// * local: ACL inspection for `username`, which is required. Write checks are not
    ///   supported.
    pub async fn verify_access(
        &self,
        location: &str,
        config: Option<&BackendConfig>,
        operation: AccessOperation,
        username: Option<&str>,
        timeout: std::time::Duration,
    ) -> Result<bool> {
        self.traced(self.verify_access_impl(location, config, operation, username, timeout))
            .await
    }

    async fn verify_access_impl(
        &self,
        location: &str,
        config: Option<&BackendConfig>,
        operation: AccessOperation,
        username: Option<&str>,
        timeout: std::time::Duration,
    ) -> Result<bool> {
        let resolved = locator::resolve(location, config)?;
        tracing::info!(
            "Verifying {} access to {} storage at {}",
            operation,
            resolved.kind(),
            location
        );
        match &resolved {
            ResolvedLocation::ObjectStore { bucket, prefix } => {
                let api = self.object_api(config).await.map_err(|error| {
                    Error::storage(format!("Failed to verify storage access '{location}'"), &error)
                })?;
                match objstore::check_operation_allowed(api.as_ref(), bucket, prefix, operation)
                    .await
                {
                    ProbeOutcome::Allowed => Ok(true),
                    ProbeOutcome::Denied(cause) => Err(Error::validation(format!(
                        "Access denied for {operation} on '{location}': {cause}"
                    ))),
                }
            }
            ResolvedLocation::RemoteSsh { session, path } => {
                match self.probe_ssh(session, path, timeout).await {
                    SshAccess::Granted => {
                        if operation == AccessOperation::Write {
                            tracing::warn!(
                                "write access to {} is not probed separately; a successful listing is taken as granted",
                                location
                            );
                        }
                        Ok(true)
                    }
                    SshAccess::Denied(cause) => {
                        tracing::warn!("{} access to {} denied: {}", operation, location, cause);
                        Ok(false)
                    }
                    SshAccess::Invalid(error) => Err(error),
                }
            }
            ResolvedLocation::Local { path } => {
                let flavor = match config {
                    Some(BackendConfig::Local(local)) => local.acl,
                    _ => AclFlavor::default(),
                };
                self.verify_local(location, path, flavor, operation, username, timeout)
                    .await
            }
        }
    }

    /// Probes an SSH location with a one-entry subdirectory listing.
    pub async fn probe_ssh(
        &self,
        session: &SshSession,
        path: &str,
        timeout: std::time::Duration,
    ) -> SshAccess {
        let target = match ssh_target(session).await {
            Ok(target) => target,
            Err(error) => return SshAccess::Invalid(error),
        };
        match self
            .filesystem
            .list_immediate_subdirectories(&target, path, Some(1), timeout)
            .await
        {
            Ok(_) => SshAccess::Granted,
            Err(error) => SshAccess::Denied(format!("{error:#}")),
        }
    }

    async fn verify_local(
        &self,
        location: &str,
        path: &str,
        flavor: AclFlavor,
        operation: AccessOperation,
        username: Option<&str>,
        timeout: std::time::Duration,
    ) -> Result<bool> {
        let Some(username) = username.filter(|username| !username.is_empty()) else {
            return Err(Error::validation(
                "Username required for local filesystem access verification",
            ));
        };
        if operation == AccessOperation::Write {
            return Err(Error::not_supported(
                "Write permission verification is not implemented for local filesystem",
            ));
        }
        let is_dir = tokio::fs::metadata(path)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(Error::validation(format!(
                "Path {path} does not exist or is not a directory"
            )));
        }
        self.acl
            .has_read_execute(flavor, path, username, timeout)
            .await
            .map_err(|error| {
                let error = Error::storage(
                    format!("Failed to verify storage access '{location}'"),
                    &error,
                );
                tracing::debug!("{}", error);
                error
            })
    }

    /// Runs the list, read and write probes against an object store location and returns
    /// the operations that succeeded, in that order.
    pub async fn accessible_operations(
        &self,
        location: &str,
        config: Option<&BackendConfig>,
    ) -> Result<Vec<AccessOperation>> {
        self.traced(self.accessible_operations_impl(location, config))
            .await
    }

    async fn accessible_operations_impl(
        &self,
        location: &str,
        config: Option<&BackendConfig>,
    ) -> Result<Vec<AccessOperation>> {
        let resolved = locator::resolve(location, config)?;
        let ResolvedLocation::ObjectStore { bucket, prefix } = &resolved else {
            return Err(Error::not_supported(format!(
                "Accessible operation discovery is not implemented for {} storage",
                resolved.kind()
            )));
        };
        let api = self.object_api(config).await.map_err(|error| {
            Error::storage(format!("Failed to check accessible operations '{location}'"), &error)
        })?;
        let mut allowed = Vec::new();
        for operation in AccessOperation::ALL {
            if objstore::check_operation_allowed(api.as_ref(), bucket, prefix, operation)
                .await
                .is_allowed()
            {
                allowed.push(operation);
            }
        }
        tracing::info!("Accessible operations on {}: {:?}", location, allowed);
        Ok(allowed)
    }
}
