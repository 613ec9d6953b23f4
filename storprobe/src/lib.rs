//! Measure, list and verify access to storage locations - local filesystems, SSH hosts and
//! S3-compatible object stores - through a single interface.
//!
//! # Locations
//!
//! The backend is picked from the location text unless an explicit [`BackendConfig`]
//! says otherwise:
//!
//! ```text
//! /data/projects                 local filesystem
//! alice@server:/data/projects    SSH, scp-style
//! ssh://alice@server:2222/data   SSH, URI
//! s3://bucket/prefix             object store
//! ```
//!
//! # Operations
//!
//! ```bash
//! # item count and total size
//! storprobe analyze s3://bucket/data --aws-profile analytics
//!
//! # immediate subdirectories (or common prefixes)
//! storprobe list alice@server:/data --ssh-key ~/.ssh/id_ed25519
//!
//! # object keys, at most 100 of them
//! storprobe list s3://bucket/logs/ --type files --max-items 100
//!
//! # permission checks
//! storprobe verify-access /mnt/shared --storage-type nfs4 --username alice
//! storprobe verify-access s3://bucket/data --operation write
//! ```
//!
//! Library callers use [`Storage`]; every failure is a classified [`common::Error`].
//!
//! Filesystem sizes are computed with `find` and `awk` run through `sh`, locally or on
//! the SSH host. Local access checks rely on `getfacl` or `nfs4_getfacl`.

pub mod acl;
pub mod fs;
pub mod locator;
pub mod storage;

pub use locator::{
    AclFlavor, BackendConfig, LocalConfig, ResolvedLocation, SshConfig, StorageType,
};
pub use storage::{SshAccess, Storage};
