//! End-to-end driver: compiler output → parser → categorizer → aggregator.

use crate::h_aggregate::{aggregate, AggregateResult, ResultFilter, SummaryMode};
use crate::h_compiler::{run_compiler, GoBuildCommandBuilder, DEFAULT_GCFLAGS};
use crate::h_parser::parse_diagnostics;
use crate::prelude::*;
use anyhow::{anyhow, Result};
use std::time::Duration;

/// Knobs for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Concurrent compiler invocations; `<= 1` runs one invocation for all packages.
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub go_binary: Option<PathBuf>,
    pub gcflags: String,
    pub execution_dir: Option<PathBuf>,
    pub filter: ResultFilter,
    pub summary: SummaryMode,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        AnalyzeOptions {
            jobs: 1,
            timeout: None,
            go_binary: None,
            gcflags: DEFAULT_GCFLAGS.to_string(),
            execution_dir: None,
            filter: ResultFilter::default(),
            summary: SummaryMode::default(),
        }
    }
}

impl AnalyzeOptions {
    fn builder_for(&self, packages: &[String]) -> GoBuildCommandBuilder {
        GoBuildCommandBuilder::new()
            .with_packages(packages)
            .with_gcflags(self.gcflags.clone())
            .with_go_binary(self.go_binary.clone())
            .with_execution_dir(self.execution_dir.clone())
    }
}

/// The core pipeline over already captured diagnostic text.
pub fn analyze_text(text: &str) -> AggregateResult {
    aggregate(parse_diagnostics(text))
}

/// [`analyze_text`] followed by a filter.
pub fn analyze_text_filtered(text: &str, filter: &ResultFilter, mode: SummaryMode) -> AggregateResult {
    crate::h_aggregate::aggregate_filtered(parse_diagnostics(text), filter, mode)
}

// Recompute filters before aggregation; Preserve filters once after merging.
fn partial(text: &str, opts: &AnalyzeOptions) -> AggregateResult {
    match opts.summary {
        SummaryMode::Preserve => analyze_text(text),
        SummaryMode::Recompute => analyze_text_filtered(text, &opts.filter, SummaryMode::Recompute),
    }
}

fn finish(merged: AggregateResult, opts: &AnalyzeOptions) -> AggregateResult {
    match opts.summary {
        SummaryMode::Preserve => opts.filter.apply(merged),
        SummaryMode::Recompute => merged,
    }
}

fn analyze_one(packages: &[String], opts: &AnalyzeOptions) -> Result<AggregateResult> {
    let output = run_compiler(&opts.builder_for(packages), opts.timeout)?;
    Ok(partial(&output.diagnostics, opts))
}

/// Merge per-package results in input order; the first failure wins.
fn merge_in_order(results: Vec<Option<Result<AggregateResult>>>) -> Result<AggregateResult> {
    let mut merged = AggregateResult::default();
    for (index, result) in results.into_iter().enumerate() {
        let result = result.ok_or_else(|| anyhow!("no result for package #{}", index))?;
        merged.merge(result?);
    }
    Ok(merged)
}

/// Run the compiler over `packages` and analyse its diagnostics.
pub fn analyze_packages(packages: &[String], opts: &AnalyzeOptions) -> Result<AggregateResult> {
    let packages: Vec<String> = if packages.is_empty() {
        vec!["./...".to_string()]
    } else {
        packages.to_vec()
    };

    if opts.jobs <= 1 || packages.len() == 1 {
        let result = analyze_one(&packages, opts)?;
        return Ok(finish(result, opts));
    }

    let mut slots: Vec<Option<Result<AggregateResult>>> = Vec::new();
    slots.resize_with(packages.len(), || None);

    #[cfg(feature = "concurrent")]
    {
        use threadpool::ThreadPool;
        let pool = ThreadPool::new(opts.jobs.min(packages.len()));
        let (tx, rx) = mpsc::channel();

        let start_concurrent = Instant::now();
        for (index, package) in packages.iter().enumerate() {
            let tx = tx.clone();
            let package = vec![package.clone()];
            let opts = opts.clone();
            pool.execute(move || {
                let result = analyze_one(&package, &opts);
                // The receiver outlives the pool; a failed send means it was dropped.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);
        pool.join();
        debug!(
            "timing: {} packages on {} threads took {:?}",
            packages.len(),
            opts.jobs,
            start_concurrent.elapsed()
        );

        for (index, result) in rx {
            slots[index] = Some(result);
        }
    }

    // Sequential fallback: one package at a time.
    #[cfg(not(feature = "concurrent"))]
    {
        let start_seq = Instant::now();
        for (index, package) in packages.iter().enumerate() {
            slots[index] = Some(analyze_one(std::slice::from_ref(package), opts));
        }
        debug!("timing: sequential analysis took {:?}", start_seq.elapsed());
    }

    let merged = merge_in_order(slots)?;
    Ok(finish(merged, opts))
}
