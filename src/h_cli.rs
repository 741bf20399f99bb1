use crate::h_reports::ReportFormat;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    author,
    version,
    about = "heapcheck - Go escape analysis made human-readable.",
    long_about = None,
    after_help = "Output formats:\n  text   Human-readable summary (default)\n  json   Machine-readable JSON\n  html   Visual HTML report\n  sarif  GitHub Code Scanning compatible\n\nExamples:\n  heapcheck ./...\n  heapcheck --format=json ./...\n  heapcheck --escapes-only --filter=./internal ./...\n  go build -gcflags=-m=2 ./... 2> escapes.txt; heapcheck -i escapes.txt"
)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Go package patterns handed to `go build`.
    #[arg(value_name = "PACKAGES", help = "Package patterns to analyze (default: ./...).")]
    pub packages: Vec<String>,

    #[arg(long, short = 'f', value_enum, help = "Output format (default: text).")]
    pub format: Option<ReportFormat>,

    #[arg(long, help = "Show only variables that are moved to or escape to the heap.")]
    pub escapes_only: bool,

    #[arg(long, value_name = "PREFIX", help = "Show only files whose path starts with PREFIX.")]
    pub filter: Option<String>,

    #[arg(
        long,
        short = 'v',
        help = "Show every escape in text output and enable info logging."
    )]
    pub verbose: bool,

    /// Diagnostic text saved from an earlier `go build -gcflags=-m=2`; `-` reads stdin.
    #[arg(
        long,
        short = 'i',
        value_name = "FILE",
        help = "Analyze saved compiler diagnostics instead of running go ('-' for stdin)."
    )]
    pub input: Option<PathBuf>,

    #[arg(long, short = 'o', value_name = "FILE", help = "Write the report to FILE.")]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        short = 'j',
        value_name = "N",
        help = "Compile up to N packages concurrently (default: 1)."
    )]
    pub jobs: Option<usize>,

    #[arg(
        long,
        value_name = "SECS",
        help = "Kill the compiler after SECS seconds (0 = no limit)."
    )]
    pub timeout: Option<u64>,

    #[arg(long = "go", value_name = "PATH", help = "Go binary to use (default: go on PATH).")]
    pub go_binary: Option<PathBuf>,

    #[arg(
        long,
        help = "Recompute summary counts from the filtered records instead of the whole run."
    )]
    pub consistent_summary: bool,

    #[arg(long, help = "Disable ANSI colors in text output.")]
    pub no_color: bool,

    #[arg(long, short = 'c', value_name = "FILE", help = "Read settings from FILE instead of heapcheck.toml.")]
    pub config: Option<PathBuf>,

    /// Print version and feature flags.
    #[arg(long, short = 'V', help = "Print version, build metadata and feature flags.")]
    pub version: bool,
}

/// Build metadata, fixed at compile time and handed to whoever needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub commit: String,
    pub date: String,
}

impl BuildInfo {
    /// Metadata of this binary; `build.rs` stamps commit and date when it can.
    pub fn current() -> Self {
        BuildInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: option_env!("HEAPCHECK_COMMIT").unwrap_or("unknown").to_string(),
            date: option_env!("HEAPCHECK_BUILD_DATE")
                .unwrap_or("unknown")
                .to_string(),
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}

/// Enabled features are listed plainly, disabled ones prefixed with `!`.
pub fn get_feature_flags() -> Vec<&'static str> {
    let mut flags = Vec::new();
    if cfg!(feature = "concurrent") {
        flags.push("concurrent");
    } else {
        flags.push("!concurrent");
    }
    flags
}

/// The `--version` text: version line, known build metadata, feature flags.
pub fn version_text(info: &BuildInfo) -> String {
    let mut out = format!("heapcheck version {}\n", info.version);
    if info.commit != "unknown" {
        out.push_str(&format!("  commit: {}\n", info.commit));
    }
    if info.date != "unknown" {
        out.push_str(&format!("  built:  {}\n", info.date));
    }
    let json_features = format!(
        "[{}]",
        get_feature_flags()
            .iter()
            .map(|f| format!("\"{}\"", f))
            .collect::<Vec<String>>()
            .join(", ")
    );
    out.push_str(&json_features);
    out.push('\n');
    out
}

pub fn print_version_and_features(info: &BuildInfo) {
    print!("{}", version_text(info));
}
