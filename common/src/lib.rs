//! Shared pieces of the storprobe tools: the error taxonomy, the metrics type and the
//! process bootstrap used by the binary.

pub mod config;
pub mod error;
pub mod metrics;
pub mod request;

pub use config::{OutputConfig, RuntimeConfig};
pub use error::{Error, Result};
pub use metrics::{human_size, BackendKind, StorageMetrics};
pub use request::{AccessOperation, ContentType};

fn init_tracing(output: &OutputConfig) {
    if output.quiet {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(output.log_level()));
    // a subscriber may already be installed (e.g. in tests), keep it
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_runtime(runtime: &RuntimeConfig) -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    builder.build()
}

/// Sets up logging and the tokio runtime, then drives `func` to completion.
///
/// Returns `None` when `func` failed; the error has already been reported on stderr
/// as `Error: <message>` unless `quiet` was requested. Callers exit with code 1 in
/// that case.
pub fn run<Fut, Summary>(
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce() -> Fut,
) -> Option<Summary>
where
    Fut: std::future::Future<Output = anyhow::Result<Summary>>,
{
    init_tracing(&output);
    let runtime = match build_runtime(&runtime) {
        Ok(runtime) => runtime,
        Err(error) => {
            if !output.quiet {
                eprintln!("Error: failed to start tokio runtime: {error}");
            }
            return None;
        }
    };
    match runtime.block_on(func()) {
        Ok(summary) => Some(summary),
        Err(error) => {
            tracing::debug!("operation failed: {:?}", &error);
            if !output.quiet {
                eprintln!("Error: {error:#}");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_returns_value_on_success() {
        let res = run(
            OutputConfig {
                quiet: true,
                verbose: 0,
            },
            RuntimeConfig { max_workers: 1 },
            || async { Ok::<_, anyhow::Error>(42) },
        );
        assert_eq!(res, Some(42));
    }

    #[test]
    fn run_returns_none_on_failure() {
        let res: Option<()> = run(
            OutputConfig {
                quiet: true,
                verbose: 0,
            },
            RuntimeConfig::default(),
            || async {
                Err::<(), _>(anyhow::Error::from(Error::validation(
                    "Unknown operation: bogus",
                )))
            },
        );
        assert!(res.is_none());
    }
}
