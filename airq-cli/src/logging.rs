use tracing_subscriber::{EnvFilter, fmt};

/// Initialize structured logging on stderr.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` raises the default from `warn` to `debug`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "airq_core=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
