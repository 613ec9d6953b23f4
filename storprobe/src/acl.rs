//! ACL inspection for local access checks

use tracing::instrument;

use crate::locator::AclFlavor;

#[async_trait::async_trait]
pub trait AclAdapter: Send + Sync {
    /// Whether `user` holds both read and execute permission on the directory `path`.
    ///
    /// No ACL entry for the user means `false`, not an error.
    async fn has_read_execute(
        &self,
        flavor: AclFlavor,
        path: &str,
        user: &str,
        timeout: std::time::Duration,
    ) -> anyhow::Result<bool>;
}

fn grants_read_execute(permissions: &str) -> bool {
    permissions.contains('r') && permissions.contains('x')
}

/// Looks for a `user:<name>:<perms>` entry granting read and execute in `getfacl` output.
pub fn posix_acl_grants(output: &str, user: &str) -> bool {
    let entry = format!("user:{user}:");
    output
        .lines()
        .filter(|line| line.starts_with(&entry))
        .filter_map(|line| line.rsplit(':').next())
        .any(grants_read_execute)
}

/// Looks for an `A::<name>@domain:...` or `A::<name>:...` allow entry granting read and
/// execute in `nfs4_getfacl` output.
pub fn nfs4_acl_grants(output: &str, user: &str) -> bool {
    let with_domain = format!("A::{user}@");
    let plain = format!("A::{user}:");
    output
        .lines()
        .filter(|line| line.starts_with(&with_domain) || line.starts_with(&plain))
        .filter_map(|line| line.split(':').nth(3))
        .any(grants_read_execute)
}

/// [`AclAdapter`] running `getfacl` or `nfs4_getfacl` on the local machine
#[derive(Clone, Debug, Default)]
pub struct GetfaclAcl;

impl GetfaclAcl {
    fn command(flavor: AclFlavor, path: &str) -> String {
        let tool = match flavor {
            AclFlavor::Posix => "getfacl",
            AclFlavor::Nfs4 => "nfs4_getfacl",
        };
        format!("{tool} {}", remote::shell_escape(path))
    }
}

#[async_trait::async_trait]
impl AclAdapter for GetfaclAcl {
    #[instrument(skip(self))]
    async fn has_read_execute(
        &self,
        flavor: AclFlavor,
        path: &str,
        user: &str,
        timeout: std::time::Duration,
    ) -> anyhow::Result<bool> {
        let output = remote::exec::run_local(&Self::command(flavor, path), timeout).await?;
        if !output.status.success() {
            anyhow::bail!(
                "Failed to check {} permissions: {}",
                match flavor {
                    AclFlavor::Posix => "POSIX ACL",
                    AclFlavor::Nfs4 => "NFSv4 ACL",
                },
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let granted = match flavor {
            AclFlavor::Posix => posix_acl_grants(&stdout, user),
            AclFlavor::Nfs4 => nfs4_acl_grants(&stdout, user),
        };
        if granted {
            tracing::info!("{} has read/execute access to {}", user, path);
        } else {
            tracing::warn!("{} does not have read/execute access to {}", user, path);
        }
        Ok(granted)
    }
}
