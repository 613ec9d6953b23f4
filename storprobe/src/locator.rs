//! Storage location resolution
//!
//! Turns a location string plus an optional explicit [`BackendConfig`] into a
//! [`ResolvedLocation`]. The first matching rule wins:
//!
//! 1. an explicit SSH or object store config decides the backend,
//! 2. `s3://bucket/prefix` selects the object store,
//! 3. `ssh://[user@]host[:port]/path` selects SSH,
//! 4. anything containing both `:` and `/` is read as scp-style `[user@]host:path`,
//! 5. everything else is a local path, used unchanged.
//!
//! Rule 4 also matches local paths that happen to contain a colon; that ambiguity is
//! kept as-is.

use common::{BackendKind, Error, Result};
use objstore::ObjectStoreConfig;

/// ACL inspection tool used for local access checks
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AclFlavor {
    /// POSIX ACLs via `getfacl`
    #[default]
    Posix,
    /// NFSv4 ACLs via `nfs4_getfacl`
    Nfs4,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalConfig {
    /// Informational only; locations are never rewritten against it
    pub base_path: Option<std::path::PathBuf>,
    pub acl: AclFlavor,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SshConfig {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub key_file: Option<std::path::PathBuf>,
    pub port: Option<u16>,
}

/// Storage type named explicitly by the user
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StorageType {
    Local,
    /// Local or NFS mount checked with POSIX ACLs
    Nfs,
    /// NFSv4 mount checked with NFSv4 ACLs
    Nfs4,
    Ssh,
    S3,
}

impl std::str::FromStr for StorageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageType::Local),
            "nfs" => Ok(StorageType::Nfs),
            "nfs4" => Ok(StorageType::Nfs4),
            "ssh" => Ok(StorageType::Ssh),
            "s3" => Ok(StorageType::S3),
            _ => Err(Error::validation(format!(
                "storage type must be one of local, nfs, nfs4, ssh, s3, got: {s}"
            ))),
        }
    }
}

/// Explicit backend selection and parameters supplied by the caller
#[derive(Clone, Debug)]
pub enum BackendConfig {
    Local(LocalConfig),
    RemoteSsh(SshConfig),
    ObjectStore(ObjectStoreConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Local(_) => BackendKind::Local,
            BackendConfig::RemoteSsh(_) => BackendKind::RemoteSsh,
            BackendConfig::ObjectStore(_) => BackendKind::ObjectStore,
        }
    }
}

/// A location with its backend decided and its parts extracted
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedLocation {
    Local {
        path: String,
    },
    RemoteSsh {
        /// Host and user are always set; the key file and port are optional
        session: remote::SshSession,
        path: String,
    },
    ObjectStore {
        /// Never empty
        bucket: String,
        prefix: String,
    },
}

impl ResolvedLocation {
    pub fn kind(&self) -> BackendKind {
        match self {
            ResolvedLocation::Local { .. } => BackendKind::Local,
            ResolvedLocation::RemoteSsh { .. } => BackendKind::RemoteSsh,
            ResolvedLocation::ObjectStore { .. } => BackendKind::ObjectStore,
        }
    }

    /// Path on the target filesystem, or the key prefix for an object store
    pub fn effective_path(&self) -> &str {
        match self {
            ResolvedLocation::Local { path } | ResolvedLocation::RemoteSsh { path, .. } => path,
            ResolvedLocation::ObjectStore { prefix, .. } => prefix,
        }
    }
}

/// Host, user, port and path parsed from SSH location text; any part may be missing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SshLocation {
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub path: String,
}

/// Splits `s3://bucket/prefix` at the first `/` after the bucket.
pub fn parse_s3_location(location: &str) -> Result<(String, String)> {
    let Some(rest) = location.strip_prefix("s3://") else {
        return Err(Error::validation(format!(
            "Invalid S3 location '{location}': expected s3://bucket/prefix"
        )));
    };
    let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(Error::validation(format!(
            "Invalid S3 location '{location}': bucket name is empty"
        )));
    }
    Ok((bucket.to_string(), prefix.to_string()))
}

fn percent_decoded(location: &str, text: &str) -> Result<String> {
    percent_encoding::percent_decode_str(text)
        .decode_utf8()
        .map(|text| text.into_owned())
        .map_err(|error| Error::validation(format!("Invalid SSH URI '{location}': {error}")))
}

/// Parses `ssh://[user@]host[:port]/path`.
///
/// The user and path come back decoded, `ssh://host/my dir` names the directory `/my dir`.
pub fn parse_ssh_uri(location: &str) -> Result<SshLocation> {
    let url = url::Url::parse(location)
        .map_err(|error| Error::validation(format!("Invalid SSH URI '{location}': {error}")))?;
    if url.scheme() != "ssh" {
        return Err(Error::validation(format!(
            "Invalid SSH URI '{location}': expected the ssh:// scheme"
        )));
    }
    let user = match url.username() {
        "" => None,
        user => Some(percent_decoded(location, user)?),
    };
    Ok(SshLocation {
        host: url.host_str().map(str::to_string),
        user,
        port: url.port(),
        path: percent_decoded(location, url.path())?,
    })
}

/// Parses scp-style `[user@]host:path`, splitting on the first `:` and then on `@`.
pub fn parse_scp_location(location: &str) -> Option<SshLocation> {
    let (user_host, path) = location.split_once(':')?;
    let (user, host) = match user_host.split_once('@') {
        Some((user, host)) => (Some(user.to_string()), host.to_string()),
        None => (None, user_host.to_string()),
    };
    Some(SshLocation {
        host: Some(host),
        user,
        port: None,
        path: path.to_string(),
    })
}

fn looks_like_scp(location: &str) -> bool {
    location.contains(':') && location.contains('/')
}

/// Backend the location text alone points at, without parsing or validating it.
pub fn infer_kind(location: &str) -> BackendKind {
    if location.starts_with("s3://") {
        BackendKind::ObjectStore
    } else if location.starts_with("ssh://") || looks_like_scp(location) {
        BackendKind::RemoteSsh
    } else {
        BackendKind::Local
    }
}

fn parse_ssh_text(location: &str) -> Result<Option<SshLocation>> {
    if location.starts_with("ssh://") {
        parse_ssh_uri(location).map(Some)
    } else if looks_like_scp(location) && !location.starts_with("s3://") {
        Ok(parse_scp_location(location))
    } else {
        Ok(None)
    }
}

fn resolve_ssh(
    parsed: Option<SshLocation>,
    location: &str,
    config: &SshConfig,
) -> Result<ResolvedLocation> {
    let parsed = parsed.unwrap_or_else(|| SshLocation {
        path: location.to_string(),
        ..Default::default()
    });
    let host = config
        .hostname
        .clone()
        .or(parsed.host)
        .filter(|host| !host.is_empty());
    let user = config
        .username
        .clone()
        .or(parsed.user)
        .filter(|user| !user.is_empty());
    let (Some(host), Some(user)) = (host, user) else {
        return Err(Error::validation(format!(
            "SSH location '{location}' requires both a hostname and a username"
        )));
    };
    let mut session = remote::SshSession::new(host);
    session.user = Some(user);
    session.port = config.port.or(parsed.port);
    session.key_file = config.key_file.clone();
    Ok(ResolvedLocation::RemoteSsh {
        session,
        path: parsed.path,
    })
}

/// Decides the backend for `location` and extracts its parts.
///
/// Explicit SSH host and user values override the ones parsed from the location text.
/// The key file is not checked here; that happens right before the first remote command.
pub fn resolve(location: &str, config: Option<&BackendConfig>) -> Result<ResolvedLocation> {
    let resolved = match config {
        Some(BackendConfig::ObjectStore(_)) => {
            let (bucket, prefix) = parse_s3_location(location)?;
            ResolvedLocation::ObjectStore { bucket, prefix }
        }
        Some(BackendConfig::RemoteSsh(ssh)) => {
            resolve_ssh(parse_ssh_text(location)?, location, ssh)?
        }
        Some(BackendConfig::Local(_)) | None => {
            if location.starts_with("s3://") {
                let (bucket, prefix) = parse_s3_location(location)?;
                ResolvedLocation::ObjectStore { bucket, prefix }
            } else if let Some(parsed) = parse_ssh_text(location)? {
                resolve_ssh(Some(parsed), location, &SshConfig::default())?
            } else {
                ResolvedLocation::Local {
                    path: location.to_string(),
                }
            }
        }
    };
    tracing::debug!("resolved '{}' as {}", location, resolved.kind());
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh_parts(resolved: &ResolvedLocation) -> (String, Option<String>, Option<u16>, String) {
        match resolved {
            ResolvedLocation::RemoteSsh { session, path } => (
                session.host.clone(),
                session.user.clone(),
                session.port,
                path.clone(),
            ),
            other => panic!("expected an SSH location, got {other:?}"),
        }
    }

    #[test]
    fn s3_bucket_and_prefix() {
        for (location, bucket, prefix) in [
            ("s3://bucket/data", "bucket", "data"),
            ("s3://bucket/data/2023/", "bucket", "data/2023/"),
            ("s3://bucket", "bucket", ""),
            ("s3://bucket/", "bucket", ""),
            ("s3://my.bucket/a:b/c", "my.bucket", "a:b/c"),
        ] {
            assert_eq!(
                resolve(location, None).unwrap(),
                ResolvedLocation::ObjectStore {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string()
                },
                "{location}"
            );
        }
    }

    #[test]
    fn s3_empty_bucket_is_invalid() {
        for location in ["s3://", "s3:///prefix"] {
            let error = resolve(location, None).unwrap_err();
            assert!(error.is_validation(), "{location}");
            assert!(error.to_string().contains("bucket name is empty"));
        }
    }

    #[test]
    fn scp_style() {
        let resolved = resolve("alice@server.com:/data/set", None).unwrap();
        assert_eq!(
            ssh_parts(&resolved),
            (
                "server.com".to_string(),
                Some("alice".to_string()),
                None,
                "/data/set".to_string()
            )
        );
        assert_eq!(resolved.effective_path(), "/data/set");
    }

    #[test]
    fn scp_style_without_user_needs_config() {
        let error = resolve("server.com:/data", None).unwrap_err();
        assert!(error.is_validation());
        let config = BackendConfig::Local(LocalConfig::default());
        assert!(resolve("server.com:/data", Some(&config)).is_err());
        // the parsed parts before the user requirement kicks in
        assert_eq!(
            parse_scp_location("server.com:/data"),
            Some(SshLocation {
                host: Some("server.com".to_string()),
                user: None,
                port: None,
                path: "/data".to_string(),
            })
        );
    }

    #[test]
    fn ssh_uri() {
        let resolved = resolve("ssh://bob@host.example:2222/srv/data", None).unwrap();
        assert_eq!(
            ssh_parts(&resolved),
            (
                "host.example".to_string(),
                Some("bob".to_string()),
                Some(2222),
                "/srv/data".to_string()
            )
        );
        let parsed = parse_ssh_uri("ssh://host.example/srv").unwrap();
        assert_eq!(parsed.user, None);
        assert_eq!(parsed.port, None);
        assert_eq!(parsed.path, "/srv");
    }

    #[test]
    fn ssh_uri_path_and_user_are_decoded() {
        let resolved = resolve("ssh://alice@host/data/my dir", None).unwrap();
        assert_eq!(resolved.effective_path(), "/data/my dir");
        let resolved = resolve("ssh://alice@host/données/été", None).unwrap();
        assert_eq!(resolved.effective_path(), "/données/été");
        let parsed = parse_ssh_uri("ssh://j%2Edoe@host/srv%2Fa").unwrap();
        assert_eq!(parsed.user.as_deref(), Some("j.doe"));
        assert_eq!(parsed.path, "/srv/a");
    }

    #[test]
    fn config_overrides_parsed_values() {
        let config = BackendConfig::RemoteSsh(SshConfig {
            hostname: Some("override.example".to_string()),
            username: Some("carol".to_string()),
            key_file: Some("/keys/id_ed25519".into()),
            port: None,
        });
        let resolved = resolve("alice@server.com:/data", Some(&config)).unwrap();
        assert_eq!(
            ssh_parts(&resolved),
            (
                "override.example".to_string(),
                Some("carol".to_string()),
                None,
                "/data".to_string()
            )
        );
        let ResolvedLocation::RemoteSsh { session, .. } = resolved else {
            unreachable!()
        };
        assert_eq!(session.key_file, Some("/keys/id_ed25519".into()));
    }

    #[test]
    fn explicit_ssh_config_is_authoritative() {
        let config = BackendConfig::RemoteSsh(SshConfig {
            hostname: Some("server.com".to_string()),
            username: Some("alice".to_string()),
            ..Default::default()
        });
        let resolved = resolve("/plain/path", Some(&config)).unwrap();
        assert_eq!(resolved.kind(), BackendKind::RemoteSsh);
        assert_eq!(resolved.effective_path(), "/plain/path");
    }

    #[test]
    fn missing_host_or_user() {
        let config = BackendConfig::RemoteSsh(SshConfig {
            username: Some("alice".to_string()),
            ..Default::default()
        });
        let error = resolve("/data", Some(&config)).unwrap_err();
        assert!(error.is_validation());
        assert!(error.to_string().contains("hostname and a username"));
    }

    #[test]
    fn explicit_object_store_config_is_authoritative() {
        let config = BackendConfig::ObjectStore(ObjectStoreConfig::default());
        assert!(resolve("s3://bucket/x", Some(&config)).is_ok());
        // a non-s3 location cannot name a bucket
        assert!(resolve("/data", Some(&config)).unwrap_err().is_validation());
    }

    #[test]
    fn local_paths_are_unchanged() {
        for location in ["/data/set", "relative/dir", "plain", "C:weird", ""] {
            assert_eq!(
                resolve(location, None).unwrap(),
                ResolvedLocation::Local {
                    path: location.to_string()
                }
            );
        }
        // a local config does not stop path inference
        let config = BackendConfig::Local(LocalConfig::default());
        assert_eq!(
            resolve("s3://bucket", Some(&config)).unwrap().kind(),
            BackendKind::ObjectStore
        );
    }

    #[test]
    fn kind_inference() {
        assert_eq!(infer_kind("s3://bucket"), BackendKind::ObjectStore);
        assert_eq!(infer_kind("ssh://host/data"), BackendKind::RemoteSsh);
        assert_eq!(infer_kind("host:/data"), BackendKind::RemoteSsh);
        assert_eq!(infer_kind("/data"), BackendKind::Local);
        assert_eq!(infer_kind("host:data"), BackendKind::Local);
    }

    #[test]
    fn storage_type_names() {
        assert_eq!("NFS4".parse::<StorageType>(), Ok(StorageType::Nfs4));
        assert_eq!("s3".parse::<StorageType>(), Ok(StorageType::S3));
        assert!("gcs".parse::<StorageType>().unwrap_err().is_validation());
    }

    #[test]
    fn colon_and_slash_is_remote_even_for_odd_hosts() {
        // documented ambiguity: no special-casing of drive letters or empty hosts
        let resolved = resolve("u@C:/Users/data", None).unwrap();
        assert_eq!(resolved.kind(), BackendKind::RemoteSsh);
        assert!(resolve(":/data", None).unwrap_err().is_validation());
    }
}
