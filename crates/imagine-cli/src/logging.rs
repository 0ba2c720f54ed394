use std::path::Path;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "imagine=info";

/// Installs the global subscriber writing to `{logs_dir}/imagine.log.YYYY-MM-DD`.
///
/// The console is reserved for the menus, so nothing is logged to stdout.
/// `level` wins over `RUST_LOG`, which wins over the default filter.
pub fn init_logging(logs_dir: &Path, level: Option<&str>) {
    let file_appender = rolling::daily(logs_dir, "imagine.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true);

    let env_filter = match level {
        Some(level) => EnvFilter::try_new(filter_for(level))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();
}

/// A bare level applies to every imagine crate; anything else is used as a
/// full filter directive.
fn filter_for(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        bare @ ("trace" | "debug" | "info" | "warn" | "error") => {
            format!("imagine={bare}")
        }
        _ => level.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_for_bare_level() {
        assert_eq!(filter_for("DEBUG"), "imagine=debug");
        assert_eq!(filter_for("imagine_interaction=trace"), "imagine_interaction=trace");
    }
}
