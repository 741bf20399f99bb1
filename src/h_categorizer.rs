//! Heuristic explanation of heap escapes.
//!
//! [`RULES`] is evaluated top to bottom and the first rule whose predicate
//! holds decides the category. Nothing is scored or re-evaluated; when no
//! rule fires the escape is [`Category::Uncategorized`].

use crate::h_category::Category;
use crate::h_types::{DiagnosticKind, DiagnosticRecord};

/// Lowercased text a rule may look at.
#[derive(Debug, Clone)]
pub struct Evidence {
    pub kind: DiagnosticKind,
    /// The header line.
    pub raw: String,
    /// All flow details joined with a space.
    pub flow: String,
    /// `raw` followed by `flow`.
    pub combined: String,
    pub subject: String,
}

impl Evidence {
    pub fn from_record(record: &DiagnosticRecord) -> Self {
        let raw = record.raw_message.to_lowercase();
        let flow = record.flow_details.join(" ").to_lowercase();
        let combined = format!("{} {}", raw, flow);
        Evidence {
            kind: record.kind,
            raw,
            flow,
            combined,
            subject: record.subject.to_lowercase(),
        }
    }

    fn subject_or_raw(&self, needle: &str) -> bool {
        self.subject.contains(needle) || self.raw.contains(needle)
    }
}

/// One step of the cascade.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub category: Category,
    pub test: fn(&Evidence) -> bool,
}

/// The cascade, in priority order.
pub static RULES: &[Rule] = &[
    // high confidence
    Rule {
        name: "return-of-address",
        category: Category::ReturnPointer,
        test: |e| e.combined.contains("from return") && e.combined.contains('&'),
    },
    Rule {
        name: "address-of-returned",
        category: Category::ReturnPointer,
        test: |e| e.combined.contains("address-of") && e.combined.contains("return"),
    },
    Rule {
        name: "interface-converted",
        category: Category::InterfaceBoxing,
        test: |e| e.combined.contains("interface-converted"),
    },
    Rule {
        name: "interface",
        category: Category::InterfaceBoxing,
        test: |e| e.combined.contains("interface"),
    },
    Rule {
        name: "closure",
        category: Category::ClosureCapture,
        test: |e| e.combined.contains("closure") || e.combined.contains("captured"),
    },
    Rule {
        name: "goroutine",
        category: Category::GoroutineEscape,
        test: |e| e.combined.contains("go func") || e.combined.contains("goroutine"),
    },
    Rule {
        name: "channel",
        category: Category::ChannelSend,
        test: |e| e.combined.contains("chan") || e.combined.contains("channel"),
    },
    Rule {
        name: "append",
        category: Category::SliceGrow,
        test: |e| e.combined.contains("append") || e.flow.contains("appended"),
    },
    Rule {
        name: "non-constant-size",
        category: Category::UnknownSize,
        test: |e| e.combined.contains("non-constant"),
    },
    Rule {
        name: "too-large",
        category: Category::TooLarge,
        test: |e| e.combined.contains("too large"),
    },
    Rule {
        name: "fmt-call",
        category: Category::FmtCall,
        test: |e| e.combined.contains("fmt."),
    },
    Rule {
        name: "reflect",
        category: Category::Reflection,
        test: |e| e.combined.contains("reflect"),
    },
    // medium confidence
    Rule {
        name: "leaking-to-result",
        category: Category::ReturnPointer,
        test: |e| e.kind == DiagnosticKind::LeakingParameter && e.raw.contains("to result"),
    },
    Rule {
        name: "leaking-content",
        category: Category::InterfaceBoxing,
        test: |e| e.kind == DiagnosticKind::LeakingParameter && e.raw.contains("content"),
    },
    Rule {
        name: "leaking-param",
        category: Category::LeakingParam,
        test: |e| e.kind == DiagnosticKind::LeakingParameter,
    },
    Rule {
        name: "representation-conversion",
        category: Category::StringConversion,
        test: |e| e.subject.contains("string(") || e.subject.contains("([]byte)("),
    },
    Rule {
        name: "spill",
        category: Category::Spill,
        test: |e| e.flow.contains("spill"),
    },
    Rule {
        name: "assignment",
        category: Category::Assignment,
        test: |e| e.kind == DiagnosticKind::MovedToHeap && e.flow.contains("assign"),
    },
    Rule {
        name: "call-parameter",
        category: Category::CallParameter,
        test: |e| e.kind == DiagnosticKind::MovedToHeap && e.flow.contains("call parameter"),
    },
    Rule {
        name: "variadic",
        category: Category::InterfaceBoxing,
        test: |e| e.subject.contains("...") || e.raw.contains("... argument"),
    },
    // lower confidence
    Rule {
        name: "make-map",
        category: Category::MapAllocation,
        test: |e| e.subject_or_raw("make(map"),
    },
    Rule {
        name: "make-slice",
        category: Category::SliceGrow,
        test: |e| e.subject_or_raw("make([]"),
    },
    Rule {
        name: "new",
        category: Category::NewAllocation,
        test: |e| e.subject_or_raw("new("),
    },
    Rule {
        name: "literal",
        category: Category::CompositeLiteral,
        test: |e| e.subject_or_raw("literal"),
    },
    Rule {
        name: "address-of-literal",
        category: Category::CompositeLiteral,
        test: |e| e.raw.contains('&') && !e.flow.contains("return"),
    },
];

/// Name reported when no rule matched.
pub const FALLBACK_RULE: &str = "fallback";

/// The category together with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub rule: &'static str,
}

/// Run the cascade over a heap-bound record.
pub fn classify(record: &DiagnosticRecord) -> Classification {
    let evidence = Evidence::from_record(record);
    let hit = RULES
        .iter()
        .find(|rule| (rule.test)(&evidence))
        .map(|rule| Classification {
            category: rule.category,
            rule: rule.name,
        })
        .unwrap_or(Classification {
            category: Category::Uncategorized,
            rule: FALLBACK_RULE,
        });
    log::trace!(
        "{}: {} via rule {}",
        record.location,
        hit.category,
        hit.rule
    );
    hit
}

/// Category for a heap-bound record.
pub fn categorize(record: &DiagnosticRecord) -> Category {
    classify(record).category
}
