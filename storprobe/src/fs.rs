//! Filesystem adapter: file counts, byte totals and subdirectory listings
//!
//! The shell implementation runs the same `find`-based pipelines on the local machine
//! and on SSH hosts, so both backends report identical results for identical trees.

use anyhow::Context;
use tracing::instrument;

use remote::{shell_escape, Target};

#[async_trait::async_trait]
pub trait FilesystemAdapter: Send + Sync {
    /// Number of regular files under `root` (recursively) and the sum of their sizes
    async fn count_files_and_bytes(
        &self,
        target: &Target,
        root: &str,
        timeout: std::time::Duration,
    ) -> anyhow::Result<(u64, u64)>;

    /// Immediate child directories of `root`, at most `limit` of them when set
    async fn list_immediate_subdirectories(
        &self,
        target: &Target,
        root: &str,
        limit: Option<usize>,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Vec<String>>;
}

/// Builds the pipeline printing `count,bytes` for the files under `root`.
///
/// The exit status is the one of `awk`, so a root `find` cannot read reports `0,0`.
pub fn metrics_command(root: &str) -> String {
    format!(
        "find {} -type f -printf '%s\\n' | \
         awk '{{sum += $1 + 0.0; count++}} END {{printf \"%d,%.0f\\n\", count, sum}}'",
        shell_escape(root)
    )
}

/// Lists the immediate child directories of `root`.
///
/// Not piped through `head`: the exit status of `find` must reach the caller.
pub fn subdirectories_command(root: &str) -> String {
    format!("find {} -mindepth 1 -maxdepth 1 -type d", shell_escape(root))
}

fn check_status(output: &std::process::Output) -> anyhow::Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim());
    }
    Ok(())
}

/// Parses the `count,bytes` line printed by [`metrics_command`].
pub fn parse_metrics_output(stdout: &str) -> anyhow::Result<(u64, u64)> {
    let line = stdout.trim();
    let (count, bytes) = line
        .split_once(',')
        .with_context(|| format!("Unexpected output format: {line:?}"))?;
    let count = count
        .trim()
        .parse::<u64>()
        .with_context(|| format!("Unexpected output format: {line:?}"))?;
    let bytes = bytes
        .trim()
        .parse::<u64>()
        .with_context(|| format!("Unexpected output format: {line:?}"))?;
    Ok((count, bytes))
}

/// One path per line; blank lines are dropped.
pub fn parse_listing_output(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// [`FilesystemAdapter`] running `find` pipelines through `sh`
#[derive(Clone, Debug)]
pub struct ShellFilesystem {
    connect_timeout: std::time::Duration,
}

impl Default for ShellFilesystem {
    fn default() -> Self {
        Self {
            connect_timeout: common::config::SSH_CONNECT_TIMEOUT,
        }
    }
}

#[async_trait::async_trait]
impl FilesystemAdapter for ShellFilesystem {
    #[instrument(skip(self))]
    async fn count_files_and_bytes(
        &self,
        target: &Target,
        root: &str,
        timeout: std::time::Duration,
    ) -> anyhow::Result<(u64, u64)> {
        let output = target
            .run(&metrics_command(root), timeout, self.connect_timeout)
            .await?;
        check_status(&output)?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::warn!("find reported errors under {} on {}: {}", root, target, stderr.trim());
        }
        let metrics = parse_metrics_output(&String::from_utf8_lossy(&output.stdout))?;
        tracing::debug!("{} on {}: {} files, {} bytes", root, target, metrics.0, metrics.1);
        Ok(metrics)
    }

    #[instrument(skip(self))]
    async fn list_immediate_subdirectories(
        &self,
        target: &Target,
        root: &str,
        limit: Option<usize>,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Vec<String>> {
        let output = target
            .run(&subdirectories_command(root), timeout, self.connect_timeout)
            .await?;
        check_status(&output)?;
        let mut paths = parse_listing_output(&String::from_utf8_lossy(&output.stdout));
        if let Some(limit) = limit {
            paths.truncate(limit);
        }
        Ok(paths)
    }
}
