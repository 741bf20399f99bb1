use serde::Serialize;
use std::fmt;

/// What the compiler decided about a single value.
///
/// Only `MovedToHeap`, `EscapesToHeap` and `LeakingParameter` are heap-bound
/// and go through the categorizer; the rest only feed the summary counters.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    MovedToHeap,
    EscapesToHeap,
    DoesNotEscape,
    #[serde(rename = "leaking-param")]
    LeakingParameter,
    CanInline,
    InliningCall,
    Unknown,
}

impl DiagnosticKind {
    /// Stable identifier used in every report format.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MovedToHeap => "moved-to-heap",
            DiagnosticKind::EscapesToHeap => "escapes-to-heap",
            DiagnosticKind::DoesNotEscape => "does-not-escape",
            DiagnosticKind::LeakingParameter => "leaking-param",
            DiagnosticKind::CanInline => "can-inline",
            DiagnosticKind::InliningCall => "inlining-call",
            DiagnosticKind::Unknown => "unknown",
        }
    }

    /// True for the kinds that count as a heap allocation.
    pub fn is_heap_bound(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::MovedToHeap
                | DiagnosticKind::EscapesToHeap
                | DiagnosticKind::LeakingParameter
        )
    }

    pub fn is_inlining(&self) -> bool {
        matches!(self, DiagnosticKind::CanInline | DiagnosticKind::InliningCall)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source position exactly as the compiler printed it.
///
/// The path is not canonicalized; `./pkg/a.go` and `pkg/a.go` are distinct.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// One parsed compiler diagnostic.
///
/// # Fields
/// - `location`: where the compiler reported it.
/// - `subject`: the variable or expression text, as worded by the compiler.
/// - `kind`: the decision the compiler made.
/// - `raw_message`: the header line, verbatim.
/// - `flow_details`: `flow:` / `from ...` explanation lines that followed the header.
///
/// # Example
/// ```
/// use heapcheck::h_types::{DiagnosticKind, DiagnosticRecord, Location};
///
/// let record = DiagnosticRecord {
///     location: Location { file: "./main.go".to_string(), line: 12, column: 2 },
///     subject: "z".to_string(),
///     kind: DiagnosticKind::MovedToHeap,
///     raw_message: "./main.go:12:2: moved to heap: z".to_string(),
///     flow_details: Vec::new(),
/// };
///
/// assert!(record.kind.is_heap_bound());
/// assert_eq!(record.location.to_string(), "./main.go:12:2");
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    #[serde(flatten)]
    pub location: Location,
    #[serde(rename = "subjectText")]
    pub subject: String,
    #[serde(rename = "diagnosticKind")]
    pub kind: DiagnosticKind,
    pub raw_message: String,
    pub flow_details: Vec<String>,
}
