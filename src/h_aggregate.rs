//! Folding categorized records into summary counts, plus the post-processing
//! filters applied before rendering.

use crate::h_categorizer::categorize;
use crate::h_category::{Category, Suggestion};
use crate::h_types::{DiagnosticKind, DiagnosticRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// A heap-bound record with its explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedRecord {
    #[serde(flatten)]
    pub record: DiagnosticRecord,
    pub category: Category,
    pub suggestion: Suggestion,
}

impl CategorizedRecord {
    pub fn new(record: DiagnosticRecord) -> Self {
        let category = categorize(&record);
        CategorizedRecord {
            record,
            category,
            suggestion: category.suggestion(),
        }
    }
}

/// Everything a renderer needs from one analysis run.
///
/// Maps are ordered so JSON output is stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub total_variables: usize,
    pub stack_allocated: usize,
    pub heap_allocated: usize,
    pub inlined: usize,
    pub by_file: BTreeMap<String, usize>,
    pub by_category: BTreeMap<Category, usize>,
    pub escapes: Vec<CategorizedRecord>,
}

impl AggregateResult {
    /// Fold one record into the counters.
    pub fn add(&mut self, record: DiagnosticRecord) {
        self.total_variables += 1;
        if record.kind.is_heap_bound() {
            self.heap_allocated += 1;
            *self.by_file.entry(record.location.file.clone()).or_insert(0) += 1;
            let categorized = CategorizedRecord::new(record);
            *self.by_category.entry(categorized.category).or_insert(0) += 1;
            self.escapes.push(categorized);
        } else if record.kind.is_inlining() {
            self.inlined += 1;
        } else {
            self.stack_allocated += 1;
        }
    }

    /// Sum counters and append `other`'s escapes after ours.
    pub fn merge(&mut self, other: AggregateResult) {
        self.total_variables += other.total_variables;
        self.stack_allocated += other.stack_allocated;
        self.heap_allocated += other.heap_allocated;
        self.inlined += other.inlined;
        for (file, count) in other.by_file {
            *self.by_file.entry(file).or_insert(0) += count;
        }
        for (category, count) in other.by_category {
            *self.by_category.entry(category).or_insert(0) += count;
        }
        self.escapes.extend(other.escapes);
    }

    pub fn is_empty(&self) -> bool {
        self.total_variables == 0
    }

    /// Share of `count` in `total_variables`, as a percentage.
    pub fn percent_of_total(&self, count: usize) -> f64 {
        crate::h_fmt::percent(count, self.total_variables)
    }
}

/// Build an [`AggregateResult`] from parsed records, preserving their order.
///
/// ```
/// use heapcheck::h_aggregate::aggregate;
/// use heapcheck::h_parser::parse_diagnostics;
///
/// let records = parse_diagnostics("./a.go:1:1: x does not escape\n./a.go:2:1: moved to heap: y\n");
/// let result = aggregate(records);
/// assert_eq!(result.total_variables, 2);
/// assert_eq!(result.stack_allocated, 1);
/// assert_eq!(result.heap_allocated, 1);
/// assert_eq!(result.escapes[0].record.subject, "y");
/// ```
pub fn aggregate<I>(records: I) -> AggregateResult
where
    I: IntoIterator<Item = DiagnosticRecord>,
{
    let mut result = AggregateResult::default();
    for record in records {
        result.add(record);
    }
    log::debug!(
        "aggregated {} records: {} stack, {} heap, {} inlined",
        result.total_variables,
        result.stack_allocated,
        result.heap_allocated,
        result.inlined
    );
    result
}

/// Which records a report should show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFilter {
    /// Keep only `moved to heap` and `escapes to heap`.
    pub escapes_only: bool,
    /// Keep only files whose path starts with this prefix.
    pub path_prefix: Option<String>,
}

/// How counters relate to a filtered escape list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryMode {
    /// Filter only the escape list; counters describe the whole run.
    #[default]
    Preserve,
    /// Filter records before aggregation so counters match the list.
    Recompute,
}

impl ResultFilter {
    pub fn is_noop(&self) -> bool {
        !self.escapes_only && self.path_prefix.as_deref().map_or(true, str::is_empty)
    }

    pub fn keeps(&self, record: &DiagnosticRecord) -> bool {
        if self.escapes_only
            && !matches!(
                record.kind,
                DiagnosticKind::MovedToHeap | DiagnosticKind::EscapesToHeap
            )
        {
            return false;
        }
        match self.path_prefix.as_deref() {
            Some(prefix) => record.location.file.starts_with(prefix),
            None => true,
        }
    }

    /// Drop records this filter rejects, before aggregation.
    ///
    /// `escapes_only` removes every non-escape record here, so stack and
    /// inlined counters end up zero in a recomputed summary.
    pub fn filter_records(&self, records: Vec<DiagnosticRecord>) -> Vec<DiagnosticRecord> {
        if self.is_noop() {
            return records;
        }
        records.into_iter().filter(|r| self.keeps(r)).collect()
    }

    /// Narrow the escape list of an existing result; counters are untouched.
    pub fn apply(&self, mut result: AggregateResult) -> AggregateResult {
        if !self.is_noop() {
            let before = result.escapes.len();
            result.escapes.retain(|c| self.keeps(&c.record));
            log::debug!(
                "filter kept {} of {} escapes",
                result.escapes.len(),
                before
            );
        }
        result
    }
}

/// Aggregate `records` and apply `filter` according to `mode`.
pub fn aggregate_filtered(
    records: Vec<DiagnosticRecord>,
    filter: &ResultFilter,
    mode: SummaryMode,
) -> AggregateResult {
    match mode {
        SummaryMode::Preserve => filter.apply(aggregate(records)),
        SummaryMode::Recompute => aggregate(filter.filter_records(records)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h_parser::parse_diagnostics;

    const SAMPLE: &str = "\
./cmd/main.go:5:6: can inline helper
./cmd/main.go:12:2: moved to heap: cfg
./cmd/main.go:12:2:   flow: ~r0 = &cfg:
./cmd/main.go:12:2:     from &cfg (address-of) at ./cmd/main.go:13:9
./cmd/main.go:12:2:     from return &cfg (return) at ./cmd/main.go:13:2
./cmd/main.go:20:13: ... argument does not escape
./internal/store/db.go:8:14: v escapes to heap
./internal/store/db.go:8:14:   flow: {heap} = v:
./internal/store/db.go:8:14:     from v (interface-converted) at ./internal/store/db.go:8:14
./internal/store/db.go:30:7: leaking param: p
./internal/store/db.go:31:9: inlining call to helper
";

    fn check_invariants(result: &AggregateResult) {
        assert_eq!(
            result.total_variables,
            result.stack_allocated + result.heap_allocated + result.inlined
        );
        assert_eq!(result.by_category.values().sum::<usize>(), result.heap_allocated);
        assert_eq!(result.by_file.values().sum::<usize>(), result.heap_allocated);
    }

    #[test]
    fn counts_every_bucket() {
        let result = aggregate(parse_diagnostics(SAMPLE));
        assert_eq!(result.total_variables, 6);
        assert_eq!(result.stack_allocated, 1);
        assert_eq!(result.heap_allocated, 3);
        assert_eq!(result.inlined, 2);
        assert_eq!(result.by_file["./cmd/main.go"], 1);
        assert_eq!(result.by_file["./internal/store/db.go"], 2);
        assert_eq!(result.by_category[&Category::ReturnPointer], 1);
        assert_eq!(result.by_category[&Category::InterfaceBoxing], 1);
        assert_eq!(result.by_category[&Category::LeakingParam], 1);
        check_invariants(&result);
    }

    #[test]
    fn escapes_keep_input_order() {
        let result = aggregate(parse_diagnostics(SAMPLE));
        let subjects: Vec<&str> = result
            .escapes
            .iter()
            .map(|c| c.record.subject.as_str())
            .collect();
        assert_eq!(subjects, vec!["cfg", "v", "p"]);
        assert_eq!(
            result.escapes[0].suggestion,
            Category::ReturnPointer.suggestion()
        );
    }

    #[test]
    fn empty_input_is_all_zero() {
        let result = aggregate(parse_diagnostics(""));
        assert_eq!(result, AggregateResult::default());
        assert!(result.is_empty());
        assert!(result.by_file.is_empty());
        assert!(result.by_category.is_empty());
        assert!(result.escapes.is_empty());
    }

    #[test]
    fn does_not_escape_is_stack_only() {
        let result = aggregate(parse_diagnostics("./a.go:1:1: x does not escape"));
        assert_eq!(result.stack_allocated, 1);
        assert_eq!(result.heap_allocated, 0);
        assert!(result.escapes.is_empty());
    }

    #[test]
    fn deterministic_on_repeat() {
        assert_eq!(
            aggregate(parse_diagnostics(SAMPLE)),
            aggregate(parse_diagnostics(SAMPLE))
        );
    }

    #[test]
    fn merge_sums_and_concatenates() {
        let (first, second) = SAMPLE.split_at(SAMPLE.find("./internal").unwrap());
        let mut merged = aggregate(parse_diagnostics(first));
        merged.merge(aggregate(parse_diagnostics(second)));
        assert_eq!(merged, aggregate(parse_diagnostics(SAMPLE)));
        check_invariants(&merged);
    }

    #[test]
    fn preserve_mode_only_filters_the_list() {
        let filter = ResultFilter {
            escapes_only: true,
            path_prefix: None,
        };
        let result = aggregate_filtered(parse_diagnostics(SAMPLE), &filter, SummaryMode::Preserve);
        assert_eq!(result.escapes.len(), 2);
        assert!(result
            .escapes
            .iter()
            .all(|c| c.record.kind != DiagnosticKind::LeakingParameter));
        // counters still describe the unfiltered run
        assert_eq!(result.heap_allocated, 3);
        assert_eq!(result.by_category[&Category::LeakingParam], 1);
        check_invariants(&result);
    }

    #[test]
    fn recompute_mode_agrees_with_the_list() {
        let filter = ResultFilter {
            escapes_only: false,
            path_prefix: Some("./internal/".to_string()),
        };
        let result = aggregate_filtered(parse_diagnostics(SAMPLE), &filter, SummaryMode::Recompute);
        assert_eq!(result.heap_allocated, 2);
        assert_eq!(result.escapes.len(), 2);
        assert_eq!(result.total_variables, 3);
        assert_eq!(result.by_file.len(), 1);
        check_invariants(&result);
    }

    #[test]
    fn path_prefix_is_a_plain_prefix() {
        let filter = ResultFilter {
            escapes_only: false,
            path_prefix: Some("./cmd".to_string()),
        };
        let result = filter.apply(aggregate(parse_diagnostics(SAMPLE)));
        assert_eq!(result.escapes.len(), 1);
        assert_eq!(result.escapes[0].record.location.file, "./cmd/main.go");
    }

    #[test]
    fn empty_prefix_is_noop() {
        let filter = ResultFilter {
            escapes_only: false,
            path_prefix: Some(String::new()),
        };
        assert!(filter.is_noop());
        let result = filter.apply(aggregate(parse_diagnostics(SAMPLE)));
        assert_eq!(result.escapes.len(), 3);
    }

    #[test]
    fn serializes_in_report_shape() {
        let value = serde_json::to_value(aggregate(parse_diagnostics(SAMPLE))).unwrap();
        assert_eq!(value["totalVariables"], 6);
        assert_eq!(value["stackAllocated"], 1);
        assert_eq!(value["heapAllocated"], 3);
        assert_eq!(value["inlined"], 2);
        assert_eq!(value["byCategory"]["return-pointer"], 1);
        let first = &value["escapes"][0];
        assert_eq!(first["file"], "./cmd/main.go");
        assert_eq!(first["line"], 12);
        assert_eq!(first["category"], "return-pointer");
        assert_eq!(first["diagnosticKind"], "moved-to-heap");
        assert_eq!(
            first["suggestion"]["short"],
            "Return by value if struct size ≤ 64 bytes"
        );
        assert_eq!(first["flowDetails"].as_array().unwrap().len(), 3);
    }
}
