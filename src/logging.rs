//! Logging setup for binaries and tests.
use tracing::Level;

/// Install a `tracing-subscriber` fmt subscriber at `level`. Calling this
/// again, or after another subscriber was installed, does nothing.
pub fn init(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// Parse a level name such as `info` or `debug`, falling back to `info`
pub fn level_from_name(name: &str) -> Level {
    name.parse().unwrap_or(Level::INFO)
}
