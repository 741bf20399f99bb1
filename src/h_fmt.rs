use std::time::Duration;

/// `part` as a percentage of `whole`; zero when `whole` is zero.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Helper: Format a byte count in human readable form.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Signed variant of [`format_bytes`] for growth figures.
pub fn format_signed_bytes(bytes: i64) -> String {
    if bytes < 0 {
        format!("-{}", format_bytes(bytes.unsigned_abs()))
    } else {
        format!("+{}", format_bytes(bytes as u64))
    }
}

/// Helper: Format a Duration as seconds with millisecond precision.
pub fn format_duration_secs(d: Duration) -> String {
    format!("{}.{:03} secs", d.as_secs(), d.subsec_millis())
}

/// Keep the tail of a long path: `...` followed by the last `max - 3` chars.
///
/// ```
/// use heapcheck::h_fmt::truncate_path;
/// assert_eq!(truncate_path("./a.go", 40), "./a.go");
/// assert_eq!(truncate_path("abcdefghij", 8), "...fghij");
/// ```
pub fn truncate_path(path: &str, max: usize) -> String {
    let count = path.chars().count();
    if count <= max || max <= 3 {
        return path.to_string();
    }
    let keep = max - 3;
    let tail: String = path.chars().skip(count - keep).collect();
    format!("...{}", tail)
}

/// Escape text for interpolation into HTML.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
