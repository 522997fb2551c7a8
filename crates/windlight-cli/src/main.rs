use clap::Parser;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use windlight::cli::Cli;
use windlight::guard::run_guarded;
use windlight::{CompileOutput, CompileRequest, CompilerOptions, DEFAULT_INPUT, FileConfig, Session};

mod error;
mod watch;

use error::{CliError, CliResult};

/// Everything needed to run one build, after merging CLI flags over the config file
pub struct Settings {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub base: Option<PathBuf>,
    pub options: Option<CompilerOptions>,
}

impl Settings {
    /// Merge config: CLI args override file config
    fn merge(cli: &Cli, file_config: Option<FileConfig>) -> Self {
        let file_config = file_config.unwrap_or_default();

        let options = if cli.overrides_options() {
            let mut options = file_config.options.unwrap_or_default();
            options.transform.minify |= cli.minify;
            options.disable_transforms |= cli.disable_transforms;
            options.transform_twice |= cli.transform_twice;
            Some(options)
        } else {
            file_config.options
        };

        Self {
            input: cli.input.clone().or(file_config.input),
            output: cli.output.clone().or(file_config.output),
            base: cli.base.clone().or(file_config.base),
            options,
        }
    }

    /// Build a request from the current state of the input file
    pub fn request(&self) -> CliResult<CompileRequest> {
        let request = match &self.input {
            Some(path) => CompileRequest::from_file(path)?,
            None => CompileRequest::from_css(DEFAULT_INPUT),
        };
        Ok(request.with_base_path(self.base.clone()).with_options(self.options.clone()))
    }
}

/// Find default config file in directory
fn find_default_config(dir: &Path) -> Option<PathBuf> {
    let json_path = dir.join("windlight.json");
    if json_path.exists() {
        return Some(json_path);
    }

    let jsonc_path = dir.join("windlight.jsonc");
    if jsonc_path.exists() {
        return Some(jsonc_path);
    }

    None
}

/// Load config from file path, supporting .json and .jsonc
fn load_config_file(path: &Path) -> CliResult<FileConfig> {
    let parse_error = |message: String| CliError::ConfigParse {
        path: path.display().to_string(),
        message,
    };

    let mut content = fs::read_to_string(path)?;
    json_strip_comments::strip(&mut content).map_err(|e| parse_error(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))
}

fn resolve_file_config(cli: &Cli) -> CliResult<Option<FileConfig>> {
    if let Some(config_path) = &cli.config {
        // Use specified config file (error if not found)
        if !config_path.exists() {
            return Err(CliError::ConfigNotFound(config_path.display().to_string()));
        }
        return load_config_file(config_path).map(Some);
    }

    // Look for default config file in cwd
    let cwd = std::env::current_dir()?;
    Ok(find_default_config(&cwd).and_then(|path| match load_config_file(&path) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Ignoring config file: {e}");
            None
        }
    }))
}

/// Write the CSS to the output file, or stdout when none is configured
pub fn write_output(output: Option<&Path>, css: &str) -> CliResult<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, css)?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(css.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn build(session: &mut Session, settings: &Settings) -> CliResult<CompileOutput> {
    let output = session.run(&settings.request()?)?;
    write_output(settings.output.as_deref(), &output.css)?;
    Ok(output)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file_config = run_guarded(|| resolve_file_config(&cli));
    let settings = Settings::merge(&cli, file_config);

    let mut session = Session::new();
    let output = run_guarded(|| build(&mut session, &settings));

    if cli.watch {
        run_guarded(|| watch::watch(&mut session, &settings, output));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("windlight").chain(args.iter().copied()))
    }

    #[test]
    fn test_merge_without_overrides_keeps_file_options() {
        let file_config: FileConfig =
            serde_json::from_str(r#"{ "input": "app.css", "options": { "minify": true } }"#)
                .unwrap();
        let settings = Settings::merge(&cli(&[]), Some(file_config));

        assert_eq!(settings.input, Some(PathBuf::from("app.css")));
        assert!(settings.options.unwrap().transform.minify);
    }

    #[test]
    fn test_merge_cli_flags_override_file() {
        let file_config: FileConfig =
            serde_json::from_str(r#"{ "input": "app.css", "output": "out.css" }"#).unwrap();
        let settings =
            Settings::merge(&cli(&["-i", "main.css", "--transform-twice"]), Some(file_config));

        assert_eq!(settings.input, Some(PathBuf::from("main.css")));
        assert_eq!(settings.output, Some(PathBuf::from("out.css")));

        let options = settings.options.unwrap();
        assert!(options.transform_twice);
        assert_eq!(options.transform, windlight::TransformOptions::default());
    }

    #[test]
    fn test_merge_without_config_leaves_options_absent() {
        let settings = Settings::merge(&cli(&[]), None);
        assert!(settings.input.is_none());
        assert!(settings.options.is_none());
    }

    #[test]
    fn test_load_jsonc_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("windlight.jsonc");
        fs::write(
            &path,
            r#"{
                // entry stylesheet
                "input": "styles/app.css",
                "options": { "disableTransforms": true }
            }"#,
        )
        .unwrap();

        assert_eq!(find_default_config(dir.path()), Some(path.clone()));
        let config = load_config_file(&path).unwrap();
        assert_eq!(config.input, Some(PathBuf::from("styles/app.css")));
        assert!(config.options.unwrap().disable_transforms);
    }

    #[test]
    fn test_load_invalid_config_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("windlight.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(load_config_file(&path), Err(CliError::ConfigParse { .. })));
    }

    #[test]
    fn test_write_output_creates_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dist/css/app.css");

        write_output(Some(&path), ".a{}").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), ".a{}");
    }
}
