use crate::h_aggregate::{AggregateResult, CategorizedRecord};
use crate::h_category::Category;
use crate::h_cli::BuildInfo;
use crate::h_fmt::{html_escape, percent, truncate_path};
use anyhow::{Context, Result};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Row, Table};
use nu_ansi_term::{Color, Style};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE_WIDTH: usize = 50;
const TEXT_HOTSPOTS: usize = 5;
const HTML_HOTSPOTS: usize = 10;
/// Above this many escapes the text report needs `-v` to list them all.
const DETAIL_THRESHOLD: usize = 10;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Html,
    Sarif,
}

/// Presentation settings shared by all renderers.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub verbose: bool,
    pub color: bool,
    pub build: BuildInfo,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            verbose: false,
            color: false,
            build: BuildInfo::current(),
        }
    }
}

/// Render `result` in the requested format.
pub fn render_report(
    result: &AggregateResult,
    format: ReportFormat,
    opts: &ReportOptions,
) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(result, opts)),
        ReportFormat::Json => generate_json_report(result),
        ReportFormat::Html => Ok(generate_html_report(result, opts)),
        ReportFormat::Sarif => crate::h_sarif::generate_sarif_report(result, &opts.build),
    }
}

pub fn save_report_to_file(report: &str, file_path: &Path) -> Result<()> {
    let mut file = File::create(file_path)
        .with_context(|| format!("failed to create {}", file_path.display()))?;
    file.write_all(report.as_bytes())
        .with_context(|| format!("failed to write {}", file_path.display()))?;
    Ok(())
}

/// Categories by count, most frequent first; ties by name.
pub fn sorted_categories(result: &AggregateResult) -> Vec<(Category, usize)> {
    let mut categories: Vec<(Category, usize)> =
        result.by_category.iter().map(|(c, n)| (*c, *n)).collect();
    categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
    categories
}

/// Files by escape count, most escapes first; ties by path.
pub fn sorted_files(result: &AggregateResult) -> Vec<(&str, usize)> {
    let mut files: Vec<(&str, usize)> = result
        .by_file
        .iter()
        .map(|(f, n)| (f.as_str(), *n))
        .collect();
    files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    files
}

// ---------------------------------------------------------------------------
// text

struct Painter {
    enabled: bool,
}

impl Painter {
    fn paint(&self, style: Style, text: &str) -> String {
        if self.enabled {
            style.paint(text).to_string()
        } else {
            text.to_string()
        }
    }
}

pub fn generate_text_report(result: &AggregateResult, opts: &ReportOptions) -> String {
    let p = Painter { enabled: opts.color };
    let rule = "─".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "📊 {}",
        p.paint(Style::new().bold(), "heapcheck - Escape Analysis Report")
    );
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out);

    let total = result.total_variables;
    let heap = result.heap_allocated;
    let _ = writeln!(out, "{}", p.paint(Style::new().bold(), "Summary:"));
    let _ = writeln!(out, "  Total variables analyzed: {}", total);
    let _ = writeln!(
        out,
        "  Stack allocated:          {} ({:.1}%)",
        result.stack_allocated,
        percent(result.stack_allocated, total)
    );
    let heap_line = format!("{} ({:.1}%)", heap, percent(heap, total));
    let _ = writeln!(
        out,
        "  Heap allocated:           {} ⚠️",
        p.paint(Color::Red.normal(), &heap_line)
    );
    if result.inlined > 0 {
        let _ = writeln!(out, "  Inlined calls:            {}", result.inlined);
    }
    let _ = writeln!(out);

    if heap == 0 {
        let _ = writeln!(
            out,
            "✅ {}",
            p.paint(
                Color::Green.bold(),
                "No heap escapes found! Your code is well-optimized."
            )
        );
        return out;
    }

    let _ = writeln!(out, "{}", p.paint(Style::new().bold(), "Escape Causes:"));
    let mut causes = Table::new();
    causes.set_content_arrangement(ContentArrangement::Dynamic);
    causes.set_header(vec!["#", "Category", "Count", "Share"]);
    for (i, (category, count)) in sorted_categories(result).iter().enumerate() {
        causes.add_row(Row::from(vec![
            Cell::new(i + 1),
            Cell::new(category.as_str()),
            Cell::new(count).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.1}%", percent(*count, heap)))
                .set_alignment(CellAlignment::Right),
        ]));
    }
    let _ = writeln!(out, "{}", causes);
    let _ = writeln!(out);

    if !result.by_file.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            p.paint(Style::new().bold(), "Hotspots (files with most escapes):")
        );
        let mut hotspots = Table::new();
        hotspots.set_content_arrangement(ContentArrangement::Dynamic);
        hotspots.set_header(vec!["File", "Escapes"]);
        for (file, count) in sorted_files(result).into_iter().take(TEXT_HOTSPOTS) {
            hotspots.add_row(Row::from(vec![
                Cell::new(truncate_path(file, 40)),
                Cell::new(count).set_alignment(CellAlignment::Right),
            ]));
        }
        let _ = writeln!(out, "{}", hotspots);
        let _ = writeln!(out);
    }

    if opts.verbose || result.escapes.len() <= DETAIL_THRESHOLD {
        let _ = writeln!(out, "{}", p.paint(Style::new().bold(), "Details:"));
        let _ = writeln!(out, "{}", rule);
        for escape in &result.escapes {
            write_escape_detail(&mut out, escape, &p);
        }
    } else {
        let _ = writeln!(
            out,
            "Run with -v for detailed breakdown of all {} escapes.",
            result.escapes.len()
        );
    }
    out
}

fn write_escape_detail(out: &mut String, escape: &CategorizedRecord, p: &Painter) {
    let record = &escape.record;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "📍 {}",
        p.paint(Color::Cyan.normal(), &record.location.to_string())
    );
    let _ = writeln!(out, "   Variable: {}", record.subject);
    let _ = writeln!(out, "   Type:     {}", record.kind);
    let _ = writeln!(out, "   Category: {}", escape.category);
    let _ = writeln!(
        out,
        "   💡 {}",
        p.paint(Color::Green.normal(), escape.suggestion.short)
    );
    if !record.flow_details.is_empty() {
        let _ = writeln!(out, "   Flow:");
        for flow in &record.flow_details {
            let _ = writeln!(out, "     {}", flow);
        }
    }
}

// ---------------------------------------------------------------------------
// json

pub fn generate_json_report(result: &AggregateResult) -> Result<String> {
    let mut json = serde_json::to_string_pretty(result).context("failed to serialize report")?;
    json.push('\n');
    Ok(json)
}

// ---------------------------------------------------------------------------
// html

/// CSS class of the badge shown next to a category.
pub fn category_badge_class(category: Category) -> &'static str {
    match category {
        Category::ReturnPointer | Category::InterfaceBoxing => "badge-red",
        Category::ClosureCapture | Category::GoroutineEscape => "badge-orange",
        Category::SliceGrow | Category::ChannelSend => "badge-yellow",
        Category::FmtCall | Category::Reflection => "badge-blue",
        Category::UnknownSize | Category::TooLarge => "badge-purple",
        _ => "badge-gray",
    }
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>heapcheck Report</title>
<script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
<style>
* { box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }
.container { max-width: 1400px; margin: 0 auto; }
h1 { color: #333; margin-bottom: 30px; }
h2 { color: #444; margin: 0 0 20px; border-bottom: 2px solid #e5e7eb; padding-bottom: 10px; }
.card { background: white; border-radius: 12px; padding: 24px; margin-bottom: 24px; box-shadow: 0 4px 6px rgba(0,0,0,0.07); }
.grid-2 { display: grid; grid-template-columns: 1fr 1fr; gap: 24px; }
.grid-3 { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 20px; margin-bottom: 24px; }
@media (max-width: 768px) { .grid-2 { grid-template-columns: 1fr; } }
.stat-card { border-radius: 12px; padding: 24px; color: white; text-align: center; }
.stat-card.info { background: linear-gradient(135deg, #2196F3 0%, #21CBF3 100%); }
.stat-card.success { background: linear-gradient(135deg, #11998e 0%, #38ef7d 100%); }
.stat-card.danger { background: linear-gradient(135deg, #eb3349 0%, #f45c43 100%); }
.stat-value { font-size: 3em; font-weight: bold; margin-bottom: 5px; }
.stat-label { opacity: 0.9; }
.stat-pct { font-size: 0.9em; opacity: 0.8; margin-top: 5px; }
.chart-container { position: relative; height: 300px; }
table { width: 100%; border-collapse: collapse; }
th, td { padding: 12px 16px; text-align: left; border-bottom: 1px solid #e5e7eb; }
th { background: #f9fafb; font-weight: 600; color: #374151; }
.category-badge { display: inline-block; padding: 4px 12px; border-radius: 20px; font-size: 0.85em; font-weight: 500; }
.badge-red { background: #fee2e2; color: #dc2626; }
.badge-orange { background: #ffedd5; color: #ea580c; }
.badge-yellow { background: #fef3c7; color: #ca8a04; }
.badge-blue { background: #dbeafe; color: #2563eb; }
.badge-purple { background: #f3e8ff; color: #9333ea; }
.badge-gray { background: #f3f4f6; color: #6b7280; }
.suggestion { color: #059669; font-style: italic; font-size: 0.9em; }
.file-link { color: #2563eb; font-family: monospace; }
.var-name { font-family: monospace; background: #f3f4f6; padding: 2px 6px; border-radius: 4px; }
.hotspot-bar { background: #e5e7eb; border-radius: 4px; height: 24px; overflow: hidden; }
.hotspot-fill { background: linear-gradient(90deg, #ef4444 0%, #f97316 100%); height: 100%; border-radius: 4px; }
.no-escapes { text-align: center; padding: 60px 20px; color: #059669; }
.no-escapes-text { font-size: 1.5em; font-weight: 600; }
.footer { text-align: center; color: #9ca3af; font-size: 0.85em; margin-top: 40px; padding: 20px; }
</style>
</head>
<body>
<div class="container">
<h1>📊 heapcheck Report</h1>
"#;

pub fn generate_html_report(result: &AggregateResult, opts: &ReportOptions) -> String {
    let total = result.total_variables;
    let mut html = String::from(HTML_HEAD);

    let _ = writeln!(html, r#"<div class="grid-3">"#);
    let _ = writeln!(
        html,
        r#"<div class="stat-card info"><div class="stat-value">{}</div><div class="stat-label">Total Variables</div></div>"#,
        total
    );
    let _ = writeln!(
        html,
        r#"<div class="stat-card success"><div class="stat-value">{}</div><div class="stat-label">Stack Allocated</div><div class="stat-pct">{:.1}% ✓</div></div>"#,
        result.stack_allocated,
        percent(result.stack_allocated, total)
    );
    let _ = writeln!(
        html,
        r#"<div class="stat-card danger"><div class="stat-value">{}</div><div class="stat-label">Heap Allocated</div><div class="stat-pct">{:.1}% ⚠</div></div>"#,
        result.heap_allocated,
        percent(result.heap_allocated, total)
    );
    let _ = writeln!(html, "</div>");

    if result.heap_allocated == 0 {
        let _ = writeln!(
            html,
            r#"<div class="card no-escapes"><div style="font-size: 4em;">🎉</div><div class="no-escapes-text">No heap escapes found!</div><p style="color: #6b7280;">Your code is well-optimized for stack allocation.</p></div>"#
        );
    } else {
        write_html_body(&mut html, result);
    }

    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let _ = writeln!(
        html,
        r#"<div class="footer">Generated by <strong>heapcheck</strong> {} on {} • <a href="https://github.com/harshakonda/heapcheck" style="color: #6b7280;">github.com/harshakonda/heapcheck</a></div>"#,
        html_escape(&opts.build.version),
        generated
    );
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn write_html_body(html: &mut String, result: &AggregateResult) {
    let _ = writeln!(
        html,
        r#"<div class="grid-2">
<div class="card"><h2>Allocation Distribution</h2><div class="chart-container"><canvas id="allocationChart"></canvas></div></div>
<div class="card"><h2>Escape Categories</h2><div class="chart-container"><canvas id="categoriesChart"></canvas></div></div>
</div>"#
    );

    let files = sorted_files(result);
    if let Some(max) = files.first().map(|(_, n)| *n) {
        let _ = writeln!(html, r#"<div class="card"><h2>🔥 Hotspots</h2>"#);
        let _ = writeln!(
            html,
            r#"<table><tr><th>File</th><th style="width: 50%;">Escapes</th><th style="width: 80px;">Count</th></tr>"#
        );
        for (file, count) in files.iter().take(HTML_HOTSPOTS) {
            let _ = writeln!(
                html,
                r#"<tr><td><span class="file-link">{}</span></td><td><div class="hotspot-bar"><div class="hotspot-fill" style="width: {:.1}%;"></div></div></td><td><strong>{}</strong></td></tr>"#,
                html_escape(file),
                percent(*count, max),
                count
            );
        }
        let _ = writeln!(html, "</table></div>");
    }

    let _ = writeln!(html, r#"<div class="card"><h2>📋 All Escapes</h2>"#);
    let _ = writeln!(
        html,
        "<table><tr><th>Location</th><th>Variable</th><th>Category</th><th>Suggestion</th></tr>"
    );
    for escape in &result.escapes {
        let record = &escape.record;
        let _ = writeln!(
            html,
            r#"<tr><td><span class="file-link">{}:{}</span></td><td><span class="var-name">{}</span></td><td><span class="category-badge {}">{}</span></td><td class="suggestion">{}</td></tr>"#,
            html_escape(&record.location.file),
            record.location.line,
            html_escape(&record.subject),
            category_badge_class(escape.category),
            escape.category,
            html_escape(escape.suggestion.short)
        );
    }
    let _ = writeln!(html, "</table></div>");

    let categories = sorted_categories(result);
    let labels = categories
        .iter()
        .map(|(c, _)| format!("'{}'", c))
        .collect::<Vec<_>>()
        .join(",");
    let counts = categories
        .iter()
        .map(|(_, n)| n.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let _ = writeln!(
        html,
        r#"<script>
new Chart(document.getElementById('allocationChart'), {{
  type: 'doughnut',
  data: {{
    labels: ['Stack Allocated', 'Heap Allocated'],
    datasets: [{{ data: [{stack}, {heap}], backgroundColor: ['#22c55e', '#ef4444'], borderWidth: 0, hoverOffset: 4 }}]
  }},
  options: {{
    responsive: true,
    maintainAspectRatio: false,
    plugins: {{
      legend: {{ position: 'bottom' }},
      tooltip: {{ callbacks: {{ label: function(context) {{
        let total = context.dataset.data.reduce((a, b) => a + b, 0);
        let pct = ((context.raw / total) * 100).toFixed(1);
        return context.label + ': ' + context.raw + ' (' + pct + '%)';
      }} }} }}
    }}
  }}
}});
new Chart(document.getElementById('categoriesChart'), {{
  type: 'bar',
  data: {{
    labels: [{labels}],
    datasets: [{{
      label: 'Count',
      data: [{counts}],
      backgroundColor: ['#ef4444', '#f97316', '#f59e0b', '#eab308', '#84cc16', '#22c55e', '#14b8a6', '#06b6d4', '#0ea5e9', '#3b82f6', '#6366f1', '#8b5cf6', '#a855f7', '#d946ef', '#ec4899'],
      borderRadius: 6
    }}]
  }},
  options: {{
    responsive: true,
    maintainAspectRatio: false,
    indexAxis: 'y',
    plugins: {{ legend: {{ display: false }} }},
    scales: {{ x: {{ beginAtZero: true, grid: {{ display: false }} }}, y: {{ grid: {{ display: false }} }} }}
  }}
}});
</script>"#,
        stack = result.stack_allocated,
        heap = result.heap_allocated,
        labels = labels,
        counts = counts
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h_analyze::analyze_text;

    const SAMPLE: &str = "\
./main.go:10:2: moved to heap: cfg
./main.go:10:2:   flow: ~r0 = &cfg:
./main.go:10:2:     from &cfg (address-of) at ./main.go:11:9
./main.go:10:2:     from return &cfg (return) at ./main.go:11:2
./main.go:14:6: x does not escape
./util.go:3:14: <b> escapes to heap
./util.go:3:14:   flow: {heap} = <b>:
./util.go:3:14:     from <b> (interface-converted) at ./util.go:3:14
./main.go:20:6: can inline helper
";

    fn opts(verbose: bool) -> ReportOptions {
        ReportOptions {
            verbose,
            color: false,
            build: BuildInfo {
                version: "0.1.4".to_string(),
                commit: "unknown".to_string(),
                date: "unknown".to_string(),
            },
        }
    }

    #[test]
    fn text_report_sections() {
        let text = generate_text_report(&analyze_text(SAMPLE), &opts(false));
        assert!(text.contains("heapcheck - Escape Analysis Report"));
        assert!(text.contains("Total variables analyzed: 4"));
        assert!(text.contains("Stack allocated:          1 (25.0%)"));
        assert!(text.contains("Heap allocated:           2 (50.0%)"));
        assert!(text.contains("Inlined calls:            1"));
        assert!(text.contains("Escape Causes:"));
        assert!(text.contains("Hotspots (files with most escapes):"));
        assert!(text.contains("📍 ./main.go:10:2"));
        assert!(text.contains("   Type:     moved-to-heap"));
        assert!(text.contains("   Category: return-pointer"));
        assert!(text.contains("     from return &cfg (return) at ./main.go:11:2"));
        assert!(!text.contains('\u{1b}'), "no ANSI codes when color is off");
    }

    #[test]
    fn text_report_without_heap() {
        let text = generate_text_report(&analyze_text("./a.go:1:1: x does not escape\n"), &opts(false));
        assert!(text.contains("No heap escapes found!"));
        assert!(!text.contains("Escape Causes:"));
    }

    #[test]
    fn text_report_hides_details_past_threshold() {
        let many: String = (1..=11)
            .map(|i| format!("./a.go:{}:2: moved to heap: v{}\n", i, i))
            .collect();
        let result = analyze_text(&many);
        let short = generate_text_report(&result, &opts(false));
        assert!(short.contains("Run with -v for detailed breakdown of all 11 escapes."));
        assert!(!short.contains("Details:"));
        let long = generate_text_report(&result, &opts(true));
        assert!(long.contains("Details:"));
        assert!(long.contains("   Variable: v11"));
    }

    #[test]
    fn colored_text_has_ansi() {
        let mut o = opts(false);
        o.color = true;
        let text = generate_text_report(&analyze_text(SAMPLE), &o);
        assert!(text.contains('\u{1b}'));
    }

    #[test]
    fn sorting_is_by_count_then_name() {
        let text = "\
./b.go:1:1: moved to heap: x
./a.go:1:1: moved to heap: y
./b.go:2:1: leaking param: p
";
        let result = analyze_text(text);
        let files = sorted_files(&result);
        assert_eq!(files, vec![("./b.go", 2), ("./a.go", 1)]);
        let categories = sorted_categories(&result);
        assert_eq!(categories[0], (Category::Uncategorized, 2));
        assert_eq!(categories[1], (Category::LeakingParam, 1));
    }

    #[test]
    fn json_report_is_the_aggregate() {
        let result = analyze_text(SAMPLE);
        let json = generate_json_report(&result).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["totalVariables"], 4);
        assert_eq!(value["escapes"][1]["subjectText"], "<b>");
        assert_eq!(value["escapes"][1]["category"], "interface-boxing");
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn html_report_escapes_text() {
        let html = generate_html_report(&analyze_text(SAMPLE), &opts(false));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("&lt;b&gt;"));
        assert!(!html.contains("<span class=\"var-name\"><b>"));
        assert!(html.contains("badge-red"));
        assert!(html.contains("allocationChart"));
        assert!(html.contains("data: [1, 2]"));
        assert!(html.contains("heapcheck</strong> 0.1.4"));
    }

    #[test]
    fn html_report_without_heap() {
        let html = generate_html_report(&analyze_text(""), &opts(false));
        assert!(html.contains("No heap escapes found!"));
        assert!(!html.contains("new Chart"));
    }

    #[test]
    fn badge_classes() {
        assert_eq!(category_badge_class(Category::ReturnPointer), "badge-red");
        assert_eq!(category_badge_class(Category::GoroutineEscape), "badge-orange");
        assert_eq!(category_badge_class(Category::ChannelSend), "badge-yellow");
        assert_eq!(category_badge_class(Category::Reflection), "badge-blue");
        assert_eq!(category_badge_class(Category::TooLarge), "badge-purple");
        assert_eq!(category_badge_class(Category::Spill), "badge-gray");
    }

    #[test]
    fn format_names_deserialize() {
        #[derive(Deserialize)]
        struct Holder {
            format: ReportFormat,
        }
        let h: Holder = toml::from_str("format = \"sarif\"").unwrap();
        assert_eq!(h.format, ReportFormat::Sarif);
    }

    #[test]
    fn saves_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        save_report_to_file("hello", &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
