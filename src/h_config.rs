//! `heapcheck.toml` and how it combines with the command line.
//!
//! Every key is optional; a flag given on the command line always wins over
//! the file, and the file wins over the built-in default.

use crate::h_aggregate::{ResultFilter, SummaryMode};
use crate::h_analyze::AnalyzeOptions;
use crate::h_cli::Cli;
use crate::h_compiler::DEFAULT_GCFLAGS;
use crate::h_reports::ReportFormat;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "heapcheck.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub format: Option<ReportFormat>,
    pub escapes_only: Option<bool>,
    pub filter: Option<String>,
    pub verbose: Option<bool>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub go_binary: Option<PathBuf>,
    pub gcflags: Option<String>,
    pub consistent_summary: Option<bool>,
    pub color: Option<bool>,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// `explicit` must exist; otherwise the nearest `heapcheck.toml` upward
    /// from `start` is used, or defaults when there is none.
    pub fn discover(explicit: Option<&Path>, start: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            if !path.is_file() {
                bail!("config file {} does not exist", path.display());
            }
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        match find_config_upward(start) {
            Some(path) => {
                log::debug!("using config {}", path.display());
                Ok((Self::load(&path)?, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }
}

/// Walk from `start` towards the filesystem root looking for `heapcheck.toml`.
pub fn find_config_upward(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Where the diagnostics come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Compiler { packages: Vec<String> },
    File(PathBuf),
    Stdin,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub format: ReportFormat,
    pub verbose: bool,
    pub color: bool,
    pub input: InputSource,
    pub output: Option<PathBuf>,
    pub analyze: AnalyzeOptions,
}

impl Settings {
    pub fn resolve(cli: &Cli, config: &Config) -> Self {
        let filter = ResultFilter {
            escapes_only: cli.escapes_only || config.escapes_only.unwrap_or(false),
            path_prefix: cli
                .filter
                .clone()
                .or_else(|| config.filter.clone())
                .filter(|p| !p.is_empty()),
        };
        let summary = if cli.consistent_summary || config.consistent_summary.unwrap_or(false) {
            SummaryMode::Recompute
        } else {
            SummaryMode::Preserve
        };
        let timeout = cli
            .timeout
            .or(config.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let input = match cli.input.as_deref() {
            Some(path) if path == Path::new("-") => InputSource::Stdin,
            Some(path) => InputSource::File(path.to_path_buf()),
            None => InputSource::Compiler {
                packages: if cli.packages.is_empty() {
                    vec!["./...".to_string()]
                } else {
                    cli.packages.clone()
                },
            },
        };

        Settings {
            format: cli.format.or(config.format).unwrap_or_default(),
            verbose: cli.verbose || config.verbose.unwrap_or(false),
            color: !cli.no_color && config.color.unwrap_or(true),
            input,
            output: cli.output.clone(),
            analyze: AnalyzeOptions {
                jobs: cli.jobs.or(config.jobs).unwrap_or(1),
                timeout,
                go_binary: cli.go_binary.clone().or_else(|| config.go_binary.clone()),
                gcflags: config
                    .gcflags
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GCFLAGS.to_string()),
                execution_dir: None,
                filter,
                summary,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::tempdir;

    #[test]
    fn parses_all_keys() {
        let config = Config::from_toml(
            r#"
format = "json"
escapes_only = true
filter = "./internal"
verbose = true
jobs = 4
timeout_secs = 60
go_binary = "/usr/local/go/bin/go"
gcflags = "-m"
consistent_summary = true
color = false
"#,
        )
        .unwrap();
        assert_eq!(config.format, Some(ReportFormat::Json));
        assert_eq!(config.jobs, Some(4));
        assert_eq!(config.color, Some(false));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml("colour = true").unwrap_err();
        assert!(format!("{:#}", err).contains("colour"));
    }

    #[test]
    fn cli_overrides_config() {
        let config = Config {
            format: Some(ReportFormat::Html),
            jobs: Some(8),
            filter: Some("./pkg".to_string()),
            color: Some(false),
            ..Config::default()
        };
        let cli = Cli::parse_from(["heapcheck", "-f", "json", "--filter", "./cmd"]);
        let settings = Settings::resolve(&cli, &config);
        assert_eq!(settings.format, ReportFormat::Json);
        assert_eq!(settings.analyze.jobs, 8);
        assert_eq!(settings.analyze.filter.path_prefix.as_deref(), Some("./cmd"));
        assert!(!settings.color);
    }

    #[test]
    fn defaults_without_config() {
        let cli = Cli::parse_from(["heapcheck"]);
        let settings = Settings::resolve(&cli, &Config::default());
        assert_eq!(settings.format, ReportFormat::Text);
        assert!(settings.color);
        assert_eq!(settings.analyze.jobs, 1);
        assert_eq!(settings.analyze.timeout, None);
        assert_eq!(settings.analyze.summary, SummaryMode::Preserve);
        assert_eq!(
            settings.input,
            InputSource::Compiler {
                packages: vec!["./...".to_string()]
            }
        );
    }

    #[test]
    fn dash_means_stdin_and_zero_timeout_means_none() {
        let cli = Cli::parse_from(["heapcheck", "-i", "-", "--timeout", "0", "--consistent-summary"]);
        let settings = Settings::resolve(&cli, &Config::default());
        assert_eq!(settings.input, InputSource::Stdin);
        assert_eq!(settings.analyze.timeout, None);
        assert_eq!(settings.analyze.summary, SummaryMode::Recompute);
    }

    #[test]
    fn discovers_config_in_a_parent_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "format = \"sarif\"\n").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let (config, path) = Config::discover(None, &nested).unwrap();
        assert_eq!(config.format, Some(ReportFormat::Sarif));
        assert_eq!(path, Some(dir.path().join(CONFIG_FILE_NAME)));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::discover(Some(&missing), dir.path()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
