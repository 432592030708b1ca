//! adv-prep
//!
//! Batch front end over `sample-core`: validate, inspect and stage samples,
//! reporting one line per skipped sample without aborting the batch.

pub mod commands;

/// Initialize `env_logger`.
///
/// `RUST_LOG` wins when set; otherwise the filter is `warn`, or `debug` when
/// `verbose` is requested.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env).format_timestamp(None).try_init();
}
