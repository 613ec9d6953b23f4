//! Shell command execution on the local machine or on an SSH host
//!
//! Both targets run the command through `sh -c` and report the raw process output;
//! interpreting exit codes and stdout is left to the caller.

use anyhow::Context;
use tracing::instrument;

use crate::SshSession;

/// Where a shell command runs
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Local,
    Ssh(SshSession),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Target::Local => f.write_str("local"),
            Target::Ssh(session) => write!(f, "{session}"),
        }
    }
}

impl Target {
    /// Runs `command` with `sh -c`, failing if it does not finish within `timeout`.
    ///
    /// For SSH targets `connect_timeout` bounds session establishment only; `timeout`
    /// covers the whole call.
    pub async fn run(
        &self,
        command: &str,
        timeout: std::time::Duration,
        connect_timeout: std::time::Duration,
    ) -> anyhow::Result<std::process::Output> {
        match self {
            Target::Local => run_local(command, timeout).await,
            Target::Ssh(session) => run_remote(session, command, timeout, connect_timeout).await,
        }
    }
}

fn timed_out(timeout: std::time::Duration) -> anyhow::Error {
    anyhow::anyhow!("Command timed out after {} seconds", timeout.as_secs())
}

#[instrument]
pub async fn run_local(
    command: &str,
    timeout: std::time::Duration,
) -> anyhow::Result<std::process::Output> {
    tracing::debug!("Running local command: {}", command);
    let child = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        // dropping the output future on timeout kills the child
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn local shell")?;
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output.context("failed to wait for local command completion"),
        Err(_) => Err(timed_out(timeout)),
    }
}

#[instrument]
pub async fn run_remote(
    session: &SshSession,
    command: &str,
    timeout: std::time::Duration,
    connect_timeout: std::time::Duration,
) -> anyhow::Result<std::process::Output> {
    let call = async {
        let ssh = crate::setup_ssh_session(session, connect_timeout).await?;
        tracing::debug!("Running remote command on {}: {}", session, command);
        let output = ssh
            .command("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .with_context(|| format!("failed to run remote command on {session}"));
        if let Err(error) = ssh.close().await {
            tracing::warn!("failed to close SSH session to {}: {:#}", session, error);
        }
        output
    };
    match tokio::time::timeout(timeout, call).await {
        Ok(output) => output,
        Err(_) => Err(timed_out(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: std::time::Duration = std::time::Duration::from_secs(10);

    #[tokio::test]
    async fn local_command_output() {
        let output = Target::Local
            .run("echo hello; echo oops >&2", SHORT, SHORT)
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "oops\n");
    }

    #[tokio::test]
    async fn local_command_failure_is_reported_in_status() {
        let output = run_local("exit 3", SHORT).await.unwrap();
        assert_eq!(output.status.code(), Some(3));
    }

    #[tokio::test]
    async fn local_command_timeout() {
        let error = run_local("sleep 5", std::time::Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(error.to_string().contains("timed out"));
    }

    #[test]
    fn target_display() {
        let mut session = SshSession::new("host");
        session.user = Some("bob".to_string());
        assert_eq!(Target::Ssh(session).to_string(), "bob@host");
        assert_eq!(Target::Local.to_string(), "local");
    }
}
