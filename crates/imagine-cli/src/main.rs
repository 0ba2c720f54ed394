use anyhow::{Context, Result};
use clap::Parser;
use imagine_infrastructure::ImaginePaths;
use std::path::PathBuf;

mod app;
mod console;
mod logging;
mod observer;

use app::App;
use console::Console;

#[derive(Parser, Debug)]
#[command(name = "imagine")]
#[command(about = "Imagine - AI image generation from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding settings, API keys, generations and logs
    #[arg(long, env = "IMAGINE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = ImaginePaths::new(cli.data_dir.as_deref())?;
    let first_start = paths
        .ensure_dirs()
        .with_context(|| format!("failed to create {}", paths.root().display()))?;
    logging::init_logging(&paths.logs_dir(), cli.log_level.as_deref());
    tracing::info!(root = %paths.root().display(), first_start, "starting imagine");

    let mut app = App::new(&paths, Console::new()?);
    app.run(first_start).await?;

    tracing::info!("imagine exited");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from(["imagine", "--data-dir", "/tmp/imagine", "--log-level", "debug"])
            .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/imagine")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["imagine", "--verbose-mode"]).is_err());
    }
}
