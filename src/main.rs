//! # heapcheck
//!
//! `heapcheck` runs the Go compiler with escape-analysis diagnostics and
//! explains, for every value that lands on the heap, why it escaped and what
//! to do about it.
//!
//! ## Quick Start
//! ```sh
//! cargo install heapcheck
//! heapcheck ./...
//! heapcheck --format=sarif -o heapcheck.sarif ./...
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use heapcheck::h_analyze::{analyze_packages, analyze_text_filtered};
use heapcheck::h_config::{Config, InputSource, Settings};
use heapcheck::h_reports::{render_report, save_report_to_file, ReportOptions};
use heapcheck::prelude::*;
use heapcheck::{BuildInfo, Cli};
use std::io::{IsTerminal, Read, Write};

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("HEAPCHECK_LOG", default))
        .init();
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("failed to read diagnostics from stdin")?;
    Ok(text)
}

fn run(cli: Cli) -> Result<()> {
    let build = BuildInfo::current();
    if cli.version {
        heapcheck::h_cli::print_version_and_features(&build);
        return Ok(());
    }

    let cwd = env::current_dir().context("cannot determine current directory")?;
    let (config, config_path) = Config::discover(cli.config.as_deref(), &cwd)?;
    let settings = Settings::resolve(&cli, &config);
    init_logging(settings.verbose);
    if let Some(path) = &config_path {
        info!("loaded config {}", path.display());
    }

    let analyze = &settings.analyze;
    let result = match &settings.input {
        InputSource::Compiler { packages } => {
            analyze_packages(packages, analyze).context("running compiler")?
        }
        InputSource::File(path) => {
            analyze_text_filtered(&read_file(path)?, &analyze.filter, analyze.summary)
        }
        InputSource::Stdin => analyze_text_filtered(&read_stdin()?, &analyze.filter, analyze.summary),
    };

    let color = settings.color && settings.output.is_none() && io::stdout().is_terminal();
    let opts = ReportOptions {
        verbose: settings.verbose,
        color,
        build,
    };
    let report = render_report(&result, settings.format, &opts)?;

    match &settings.output {
        Some(path) => {
            save_report_to_file(&report, path)?;
            info!("report written to {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(report.as_bytes())
                .context("failed to write report")?;
            stdout.flush().context("failed to write report")?;
        }
    }
    Ok(())
}

pub fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("heapcheck: {:#}", e);
        exit(1);
    }
}
