use clap::Parser;
use tracing::instrument;

use common::{AccessOperation, BackendKind, ContentType};
use storprobe::{AclFlavor, BackendConfig, LocalConfig, SshConfig, Storage, StorageType};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "storprobe",
    version,
    about = "Measure, list and verify access to local, SSH and S3-compatible storage",
    long_about = "`storprobe` answers the same three questions for any storage location: how big is it, what is inside it and can I use it.

The backend is picked from the location text: `s3://bucket/prefix` is an object store, `ssh://[user@]host[:port]/path` and `[user@]host:/path` are reached over SSH, anything else is a local path. `--storage-type ssh` or `--storage-type s3` overrides the inference.

EXAMPLES:
    # Item count and total size of an S3 prefix
    storprobe analyze s3://bucket/data --aws-profile analytics

    # Subdirectories of a remote directory
    storprobe list alice@server:/data --ssh-key ~/.ssh/id_ed25519

    # First 100 object keys under a prefix
    storprobe list s3://bucket/logs/ --type files --max-items 100

    # Can alice read an NFSv4 share?
    storprobe verify-access /mnt/shared --storage-type nfs4 --username alice"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    // Progress & output
    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", global = true, help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads (0 = number of CPU cores)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        global = true,
        help_heading = "Advanced settings"
    )]
    max_workers: usize,
}

#[derive(clap::Subcommand, Debug, Clone)]
enum Command {
    /// Count items and total size at a location
    Analyze {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List subdirectories (common prefixes) or files (object keys) at a location
    List {
        #[command(flatten)]
        target: TargetArgs,

        /// What to list: subdirectories or files
        ///
        /// File listing is only available for object stores.
        #[arg(long = "type", default_value = "subdirectories", value_name = "TYPE")]
        content_type: String,

        /// Maximum number of object keys returned by a file listing
        #[arg(long, default_value_t = common::config::DEFAULT_MAX_ITEMS, value_name = "N")]
        max_items: usize,
    },
    /// Check whether an operation is permitted at a location
    VerifyAccess {
        #[command(flatten)]
        target: TargetArgs,

        /// Operation to check: read, write or list
        #[arg(long, default_value = "read", value_name = "OPERATION")]
        operation: String,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct TargetArgs {
    /// Storage location: a local path, [user@]host:/path, ssh://[user@]host[:port]/path or s3://bucket/prefix
    location: String,

    /// Storage type: local, nfs, nfs4, ssh or s3 (inferred from the location when omitted)
    ///
    /// `ssh` and `s3` take precedence over the location text. `nfs4` selects NFSv4 ACLs for
    /// local access checks.
    #[arg(long, value_name = "TYPE")]
    storage_type: Option<StorageType>,

    /// Timeout in seconds for filesystem and SSH commands
    #[arg(long, default_value_t = common::config::DEFAULT_TIMEOUT.as_secs(), value_name = "SECONDS")]
    timeout: u64,

    // SSH options
    /// SSH hostname (overrides the host in the location)
    #[arg(long, value_name = "HOST", help_heading = "SSH options")]
    hostname: Option<String>,

    /// SSH username; for local access checks, the user whose access is verified
    #[arg(
        long,
        visible_alias = "fs-username",
        value_name = "USER",
        help_heading = "SSH options"
    )]
    username: Option<String>,

    /// SSH private key file
    #[arg(long, value_name = "PATH", help_heading = "SSH options")]
    ssh_key: Option<std::path::PathBuf>,

    // Object store options
    /// Access key id
    #[arg(long, value_name = "ID", help_heading = "Object store options")]
    access_key_id: Option<String>,

    /// Secret access key
    #[arg(long, value_name = "KEY", help_heading = "Object store options")]
    secret_access_key: Option<String>,

    /// Session token for temporary credentials
    #[arg(long, value_name = "TOKEN", help_heading = "Object store options")]
    session_token: Option<String>,

    /// Region
    #[arg(
        long,
        default_value = objstore::DEFAULT_REGION,
        value_name = "REGION",
        help_heading = "Object store options"
    )]
    region: String,

    /// Custom endpoint for S3-compatible services
    #[arg(long, value_name = "URL", help_heading = "Object store options")]
    endpoint_url: Option<String>,

    /// Named credential profile (takes precedence over the key pair)
    #[arg(long, value_name = "PROFILE", help_heading = "Object store options")]
    aws_profile: Option<String>,

    // Local options
    /// Base path of the local or NFS mount (informational)
    #[arg(long, value_name = "PATH", help_heading = "Local options")]
    base_path: Option<std::path::PathBuf>,
}

impl TargetArgs {
    fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout)
    }

    fn has_object_store_flags(&self) -> bool {
        self.access_key_id.is_some()
            || self.secret_access_key.is_some()
            || self.session_token.is_some()
            || self.endpoint_url.is_some()
            || self.aws_profile.is_some()
    }

    fn ssh_config(&self) -> BackendConfig {
        BackendConfig::RemoteSsh(SshConfig {
            hostname: self.hostname.clone(),
            username: self.username.clone(),
            key_file: self.ssh_key.clone(),
            port: None,
        })
    }

    fn object_store_config(&self) -> BackendConfig {
        let mut config = objstore::ObjectStoreConfig::default();
        config.access_key_id = self.access_key_id.clone();
        config.secret_access_key = self.secret_access_key.clone();
        config.session_token = self.session_token.clone();
        config.region = self.region.clone();
        config.endpoint_url = self.endpoint_url.clone();
        config.profile = self.aws_profile.clone();
        BackendConfig::ObjectStore(config)
    }

    fn local_config(&self, acl: AclFlavor) -> BackendConfig {
        BackendConfig::Local(LocalConfig {
            base_path: self.base_path.clone(),
            acl,
        })
    }

    fn backend_config(&self) -> BackendConfig {
        match self.storage_type {
            Some(StorageType::Ssh) => self.ssh_config(),
            Some(StorageType::S3) => self.object_store_config(),
            Some(StorageType::Nfs4) => self.local_config(AclFlavor::Nfs4),
            Some(StorageType::Local | StorageType::Nfs) => self.local_config(AclFlavor::Posix),
            None => match storprobe::locator::infer_kind(&self.location) {
                BackendKind::ObjectStore => self.object_store_config(),
                BackendKind::RemoteSsh => self.ssh_config(),
                BackendKind::Local if self.hostname.is_some() || self.ssh_key.is_some() => {
                    self.ssh_config()
                }
                BackendKind::Local if self.has_object_store_flags() => {
                    self.object_store_config()
                }
                BackendKind::Local => self.local_config(AclFlavor::Posix),
            },
        }
    }
}

#[instrument(skip(storage, target), fields(location = %target.location))]
async fn analyze(storage: &Storage, target: &TargetArgs) -> anyhow::Result<()> {
    let config = target.backend_config();
    let metrics = storage
        .analyze(&target.location, Some(&config), target.timeout())
        .await?;
    println!("{metrics}");
    Ok(())
}

#[instrument(skip(storage, target), fields(location = %target.location))]
async fn list(
    storage: &Storage,
    target: &TargetArgs,
    content_type: &str,
    max_items: usize,
) -> anyhow::Result<()> {
    let content_type = content_type.parse::<ContentType>()?;
    let config = target.backend_config();
    let entries = storage
        .list_contents(
            &target.location,
            Some(&config),
            content_type,
            max_items,
            target.timeout(),
        )
        .await?;
    if entries.is_empty() {
        println!("No {content_type} found.");
    } else {
        println!("Found {} {}:", entries.len(), content_type);
        for entry in &entries {
            println!("  {entry}");
        }
    }
    Ok(())
}

/// Returns whether access was granted; a denial is reported here, not as an error.
#[instrument(skip(storage, target), fields(location = %target.location))]
async fn verify_access(
    storage: &Storage,
    target: &TargetArgs,
    operation: &str,
) -> anyhow::Result<bool> {
    let operation = operation.parse::<AccessOperation>()?;
    let config = target.backend_config();
    let granted = storage
        .verify_access(
            &target.location,
            Some(&config),
            operation,
            target.username.as_deref(),
            target.timeout(),
        )
        .await?;
    if granted {
        println!(
            "✓ Access verified: {} permission granted for {}",
            operation, target.location
        );
    } else {
        eprintln!(
            "✗ Access denied: {} permission denied for {}",
            operation, target.location
        );
    }
    Ok(granted)
}

async fn async_main(args: Args) -> anyhow::Result<bool> {
    let storage = Storage::new();
    match &args.command {
        Command::Analyze { target } => {
            analyze(&storage, target).await?;
            Ok(true)
        }
        Command::List {
            target,
            content_type,
            max_items,
        } => {
            list(&storage, target, content_type, *max_items).await?;
            Ok(true)
        }
        Command::VerifyAccess { target, operation } => {
            verify_access(&storage, target, operation).await
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
    };
    let res = common::run(output, runtime, func);
    if res != Some(true) {
        std::process::exit(1);
    }
    Ok(())
}
