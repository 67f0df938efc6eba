use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use setup_wash::error::unknown_failure_message;
use setup_wash::{logging, Api, InstallError, Installed, ToolSpec};

/// Install the wash CLI and print the path of the executable.
#[derive(Parser, Debug)]
#[command(name = "setup-wash", about)]
struct Cli {
    /// Version to install: `latest`, an exact version, or a `^`/`~` range.
    #[arg(long, env = "INPUT_VERSION", default_value = "latest")]
    version: String,

    /// Tool cache root.
    #[arg(long, env = "RUNNER_TOOL_CACHE")]
    cache_dir: Option<PathBuf>,

    /// Staging directory for downloads.
    #[arg(long, env = "RUNNER_TEMP")]
    temp_dir: Option<PathBuf>,

    /// Do not draw a download progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let tool = ToolSpec::wash();

    match run(cli, &tool).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = match err.downcast_ref::<InstallError>() {
                Some(install_err) => install_err.to_string(),
                None => {
                    tracing::debug!("{err:#}");
                    unknown_failure_message(&tool.name)
                }
            };
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, tool: &ToolSpec) -> anyhow::Result<()> {
    let mut api = Api::new().tool(tool.clone());
    if let Some(dir) = cli.cache_dir {
        api = api.cache_dir(dir);
    }
    if let Some(dir) = cli.temp_dir {
        api = api.temp_dir(dir);
    }
    if cli.no_progress {
        api = api.no_progress();
    }

    let installed = api.install(&cli.version).await?;
    println!("{}", installed.result.bin_path.display());

    publish(tool, &installed)?;
    Ok(())
}

/// Expose the install to a GitHub Actions runner, when running under one.
fn publish(tool: &ToolSpec, installed: &Installed) -> anyhow::Result<()> {
    if let Some(path_file) = std::env::var_os("GITHUB_PATH") {
        append_line(
            Path::new(&path_file),
            &installed.result.bin_dir().display().to_string(),
        )?;
    }
    if let Some(output_file) = std::env::var_os("GITHUB_OUTPUT") {
        let output_file = Path::new(&output_file);
        append_line(
            output_file,
            &format!("{}-path={}", tool.name, installed.result.bin_path.display()),
        )?;
        append_line(output_file, &format!("{}-version={}", tool.name, installed.version()))?;
    }
    Ok(())
}

fn append_line(path: &Path, line: &str) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_latest() {
        let cli = Cli::try_parse_from(["setup-wash"]).unwrap();
        if std::env::var_os("INPUT_VERSION").is_none() {
            assert_eq!(cli.version, "latest");
        }
        assert!(!cli.no_progress);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "setup-wash",
            "--version",
            "^1.0.0",
            "--cache-dir",
            "/tmp/cache",
            "--no-progress",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.version, "^1.0.0");
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert!(cli.no_progress);
        assert!(cli.verbose);
    }

    #[test]
    fn test_append_line() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("GITHUB_OUTPUT");
        append_line(&file, "wash-path=/opt/wash").unwrap();
        append_line(&file, "wash-version=1.0.0").unwrap();
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "wash-path=/opt/wash\nwash-version=1.0.0\n"
        );
    }
}
