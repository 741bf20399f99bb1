//! Parser for Go escape-analysis diagnostics (`go build -gcflags=-m=2`).
//!
//! Every header line has the shape `<file>:<line>:<col>: <message>`. Lines
//! that follow a header with the same prefix and an indented `flow:` or
//! `from ...` message are attached to that header as flow details.

use crate::h_types::{DiagnosticKind, DiagnosticRecord, Location};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;

/// A header regex paired with the kind it produces.
pub struct HeaderPattern {
    pub kind: DiagnosticKind,
    pub pattern: Regex,
}

impl fmt::Debug for HeaderPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderPattern")
            .field("kind", &self.kind)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

impl HeaderPattern {
    fn new(kind: DiagnosticKind, pattern: &str) -> Self {
        HeaderPattern {
            kind,
            pattern: Regex::new(pattern).expect("Invalid header regex"),
        }
    }

    fn matches(&self, line: &str) -> Option<DiagnosticRecord> {
        let caps = self.pattern.captures(line)?;
        let location = location_from(&caps)?;
        let subject = caps
            .name("subject")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        Some(DiagnosticRecord {
            location,
            subject,
            kind: self.kind,
            raw_message: line.to_string(),
            flow_details: Vec::new(),
        })
    }
}

const PREFIX: &str = r"^(?P<file>.+):(?P<line>\d+):(?P<col>\d+): ";

/// The six header shapes. The keywords are mutually exclusive, so the order
/// only decides which regex runs first.
pub static HEADER_PATTERNS: Lazy<Vec<HeaderPattern>> = Lazy::new(|| {
    vec![
        // ./file.go:10:2: moved to heap: x
        HeaderPattern::new(
            DiagnosticKind::MovedToHeap,
            &format!("{PREFIX}moved to heap: (?P<subject>.+)$"),
        ),
        // ./file.go:10:2: x escapes to heap
        // -m=2 appends a trailing ':' when flow lines follow, hence no '$'.
        HeaderPattern::new(
            DiagnosticKind::EscapesToHeap,
            &format!("{PREFIX}(?P<subject>.+) escapes to heap"),
        ),
        // ./file.go:10:2: x does not escape
        HeaderPattern::new(
            DiagnosticKind::DoesNotEscape,
            &format!("{PREFIX}(?P<subject>.+) does not escape$"),
        ),
        // ./file.go:10:2: leaking param: x to result ~r0 level=0
        // `leaking param content: x` lines are not headers.
        HeaderPattern::new(
            DiagnosticKind::LeakingParameter,
            &format!("{PREFIX}leaking param: (?P<subject>.+)"),
        ),
        // ./file.go:10:2: can inline foo
        HeaderPattern::new(
            DiagnosticKind::CanInline,
            &format!("{PREFIX}can inline (?P<subject>.+)$"),
        ),
        // ./file.go:10:2: inlining call to foo
        HeaderPattern::new(
            DiagnosticKind::InliningCall,
            &format!("{PREFIX}inlining call to (?P<subject>.+)$"),
        ),
    ]
});

// ./file.go:10:2:   flow: ~r0 = &x:
// ./file.go:10:2:     from &x (address-of) at ./file.go:10:9
static FLOW_DETAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.+:\d+:\d+:\s+(?P<detail>(?:flow: |from ).+)$").expect("Invalid flow regex")
});

fn location_from(caps: &Captures<'_>) -> Option<Location> {
    // Numbers too large for usize make the line unrecognised rather than wrong.
    let line = caps.name("line")?.as_str().parse().ok()?;
    let column = caps.name("col")?.as_str().parse().ok()?;
    Some(Location {
        file: caps.name("file")?.as_str().to_string(),
        line,
        column,
    })
}

/// Try every header pattern against a single line.
pub fn match_header(line: &str) -> Option<DiagnosticRecord> {
    HEADER_PATTERNS.iter().find_map(|p| p.matches(line))
}

/// Extract the flow detail text from a continuation line, if it is one.
pub fn match_flow_detail(line: &str) -> Option<String> {
    FLOW_DETAIL
        .captures(line)
        .and_then(|caps| caps.name("detail"))
        .map(|m| m.as_str().trim().to_string())
}

/// Incremental parser. Feed it lines as they arrive and call
/// [`DiagnosticParser::finish`] once the stream ends.
#[derive(Debug, Default)]
pub struct DiagnosticParser {
    records: Vec<DiagnosticRecord>,
    current: Option<DiagnosticRecord>,
    ignored_lines: usize,
}

impl DiagnosticParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one line of compiler output.
    pub fn feed_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        if let Some(record) = match_header(line) {
            if let Some(done) = self.current.replace(record) {
                self.records.push(done);
            }
            return;
        }

        match (self.current.as_mut(), match_flow_detail(line)) {
            (Some(current), Some(detail)) => current.flow_details.push(detail),
            _ => {
                self.ignored_lines += 1;
                log::trace!("ignoring unrecognised line: {}", line);
            }
        }
    }

    /// Number of non-blank lines that matched nothing so far.
    pub fn ignored_lines(&self) -> usize {
        self.ignored_lines
    }

    /// Seal the open record and return every record in input order.
    pub fn finish(mut self) -> Vec<DiagnosticRecord> {
        if let Some(done) = self.current.take() {
            self.records.push(done);
        }
        log::debug!(
            "parsed {} diagnostics ({} lines ignored)",
            self.records.len(),
            self.ignored_lines
        );
        self.records
    }
}

/// Parses raw compiler diagnostic text into records, preserving input order.
///
/// Unrecognised lines are skipped, never rejected.
///
/// # Example
/// ```
/// use heapcheck::h_parser::parse_diagnostics;
/// use heapcheck::h_types::DiagnosticKind;
///
/// let stderr = "./main.go:9:2: moved to heap: x\n./main.go:9:2:   flow: ~r0 = &x:\n";
/// let records = parse_diagnostics(stderr);
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].kind, DiagnosticKind::MovedToHeap);
/// assert_eq!(records[0].flow_details, vec!["flow: ~r0 = &x:"]);
/// ```
pub fn parse_diagnostics(text: &str) -> Vec<DiagnosticRecord> {
    let mut parser = DiagnosticParser::new();
    for line in text.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}
