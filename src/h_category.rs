use serde::Serialize;
use std::fmt;

/// Why a value ended up on the heap, as far as the heuristics can tell.
///
/// The kebab-case identifier (`return-pointer`, `interface-boxing`, ...) is
/// the stable name used in JSON keys and SARIF rule ids.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    ReturnPointer,
    InterfaceBoxing,
    ClosureCapture,
    GoroutineEscape,
    ChannelSend,
    SliceGrow,
    UnknownSize,
    TooLarge,
    FmtCall,
    Reflection,
    LeakingParam,
    StringConversion,
    Spill,
    Assignment,
    CallParameter,
    MapAllocation,
    NewAllocation,
    CompositeLiteral,
    Uncategorized,
}

/// Actionable advice attached to every escape of a given category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub short: &'static str,
    pub details: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_link: Option<&'static str>,
}

impl Category {
    pub const ALL: [Category; 19] = [
        Category::ReturnPointer,
        Category::InterfaceBoxing,
        Category::ClosureCapture,
        Category::GoroutineEscape,
        Category::ChannelSend,
        Category::SliceGrow,
        Category::UnknownSize,
        Category::TooLarge,
        Category::FmtCall,
        Category::Reflection,
        Category::LeakingParam,
        Category::StringConversion,
        Category::Spill,
        Category::Assignment,
        Category::CallParameter,
        Category::MapAllocation,
        Category::NewAllocation,
        Category::CompositeLiteral,
        Category::Uncategorized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ReturnPointer => "return-pointer",
            Category::InterfaceBoxing => "interface-boxing",
            Category::ClosureCapture => "closure-capture",
            Category::GoroutineEscape => "goroutine-escape",
            Category::ChannelSend => "channel-send",
            Category::SliceGrow => "slice-grow",
            Category::UnknownSize => "unknown-size",
            Category::TooLarge => "too-large",
            Category::FmtCall => "fmt-call",
            Category::Reflection => "reflection",
            Category::LeakingParam => "leaking-param",
            Category::StringConversion => "string-conversion",
            Category::Spill => "spill",
            Category::Assignment => "assignment",
            Category::CallParameter => "call-parameter",
            Category::MapAllocation => "map-allocation",
            Category::NewAllocation => "new-allocation",
            Category::CompositeLiteral => "composite-literal",
            Category::Uncategorized => "uncategorized",
        }
    }

    /// The fixed suggestion for this category.
    pub fn suggestion(&self) -> Suggestion {
        match self {
            Category::ReturnPointer => Suggestion {
                short: "Return by value if struct size ≤ 64 bytes",
                details: "Returning a pointer to a local variable forces heap allocation. If the struct is small, return by value instead. For larger structs in hot paths, consider sync.Pool.",
                doc_link: Some("https://go.dev/doc/faq#stack_or_heap"),
            },
            Category::InterfaceBoxing => Suggestion {
                short: "Use concrete types in hot paths",
                details: "Assigning to interface{} or any causes heap allocation for the type metadata. Use generics (Go 1.18+) or concrete types in performance-critical code.",
                doc_link: Some("https://go.dev/blog/intro-generics"),
            },
            Category::ClosureCapture => Suggestion {
                short: "Pass variables as parameters instead of capturing",
                details: "Variables captured by closures often escape. Pass them as function parameters instead, especially for goroutines.",
                doc_link: None,
            },
            Category::GoroutineEscape => Suggestion {
                short: "Consider worker pools for high-frequency goroutines",
                details: "Variables passed to goroutines must outlive the creating function and thus escape. For high-throughput scenarios, use worker pools with pre-allocated buffers.",
                doc_link: None,
            },
            Category::ChannelSend => Suggestion {
                short: "Buffer channels or use sync.Pool for sent values",
                details: "Values sent on channels may escape. For frequently sent large objects, consider using sync.Pool.",
                doc_link: None,
            },
            Category::SliceGrow => Suggestion {
                short: "Pre-allocate slice capacity",
                details: "Slices that may grow via append can escape. Pre-allocate with make([]T, 0, expectedCap) when the final size is predictable.",
                doc_link: None,
            },
            Category::UnknownSize => Suggestion {
                short: "Use fixed-size arrays when length is known",
                details: "make([]T, n) with non-constant n causes heap allocation. If size is known at compile time, use arrays [N]T or pre-allocate.",
                doc_link: None,
            },
            Category::TooLarge => Suggestion {
                short: "Large allocations go to heap by design",
                details: "Very large structs or arrays are placed on heap regardless of escape. Consider if the full size is necessary or if you can use pointers to smaller chunks.",
                doc_link: None,
            },
            Category::FmtCall => Suggestion {
                short: "Use strconv in hot paths",
                details: "fmt.Sprintf and similar cause interface boxing. Use strconv.Itoa, strconv.FormatFloat, etc. for simple conversions in hot paths.",
                doc_link: None,
            },
            Category::Reflection => Suggestion {
                short: "Avoid reflect in hot paths",
                details: "Reflection defeats escape analysis. Avoid reflect package in performance-critical code; use code generation or generics instead.",
                doc_link: None,
            },
            Category::LeakingParam => Suggestion {
                short: "Parameter escapes function scope",
                details: "This parameter is stored or returned, causing it to escape. Consider if the storage is necessary or if you can restructure to avoid it.",
                doc_link: None,
            },
            Category::StringConversion => Suggestion {
                short: "String conversion allocates",
                details: "Converting []byte to string (or vice versa) allocates. In hot paths, consider using unsafe conversion or reusing buffers.",
                doc_link: None,
            },
            Category::Spill => Suggestion {
                short: "Compiler spilled value to heap",
                details: "The compiler determined this value may outlive the stack frame. Check if the value is stored in a long-lived data structure.",
                doc_link: None,
            },
            Category::Assignment => Suggestion {
                short: "Value assigned to escaping location",
                details: "This value is assigned to a variable that escapes (field, global, etc.). Consider if the assignment is necessary.",
                doc_link: None,
            },
            Category::CallParameter => Suggestion {
                short: "Value escapes via function call",
                details: "This value is passed to a function that causes it to escape. Check if the called function stores the parameter.",
                doc_link: None,
            },
            Category::MapAllocation => Suggestion {
                short: "Maps always allocate on heap",
                details: "Maps in Go always escape to heap. Consider using arrays for small fixed-size lookups, or sync.Pool for frequently created maps.",
                doc_link: None,
            },
            Category::NewAllocation => Suggestion {
                short: "new() always allocates on heap",
                details: "The new() builtin allocates on heap. For small structs, consider stack allocation with var x T followed by &x if needed.",
                doc_link: None,
            },
            Category::CompositeLiteral => Suggestion {
                short: "Composite literal escapes",
                details: "Struct/slice/map literals that escape the function are heap allocated. For hot paths, consider reusing allocations.",
                doc_link: None,
            },
            Category::Uncategorized => Suggestion {
                short: "Review escape flow details",
                details: "This escape couldn't be automatically categorized. Check the flow information for details on why the variable escapes.",
                doc_link: None,
            },
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
