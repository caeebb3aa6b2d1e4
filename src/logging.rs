use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;

/// Sends reader diagnostics to stderr, keeping stdout for command output.
///
/// Failed translations and skipped saves always show as warnings; `--verbose`
/// adds cache hits, in-flight waits and token usage.
pub fn init(verbose: bool) -> Result<()> {
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_max_level(max_level(verbose))
        .with_target(false)
        .with_level(true)
        .try_init();
    Ok(())
}

fn max_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    }
}
