#![doc = include_str!("../README.md")]

// Re-export std common modules
pub mod prelude {
    pub use std::env;
    pub use std::fs;
    pub use std::io;
    pub use std::path::{Path, PathBuf};
    pub use std::process::exit;
    pub use std::sync::mpsc;
    pub use std::time::Instant;
    pub use log::{debug, error, info, log_enabled, warn, Level};
}

pub mod h_types;
pub use h_types::{DiagnosticKind, DiagnosticRecord, Location};
pub mod h_parser;
pub use h_parser::parse_diagnostics;
pub mod h_category;
pub use h_category::{Category, Suggestion};
pub mod h_categorizer;
pub use h_categorizer::categorize;
pub mod h_aggregate;
pub use h_aggregate::{aggregate, AggregateResult, CategorizedRecord, ResultFilter, SummaryMode};
pub mod h_analyze;
pub use h_analyze::{analyze_packages, analyze_text, AnalyzeOptions};
pub mod h_cli;
pub use h_cli::{BuildInfo, Cli};
pub mod h_compiler;
pub mod h_config;
pub mod h_fmt;
pub mod h_guard;
pub mod h_reports;
pub use h_reports::{render_report, ReportFormat, ReportOptions};
pub mod h_sarif;
