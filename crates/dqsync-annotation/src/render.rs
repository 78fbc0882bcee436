use dqsync_checks::TableSummary;

use crate::merge::AnnotationMarkers;

const STATUS_TITLE: &str = "Anomalo Data Quality Checks";
const MARKDOWN_HEADER: &str = "**Anomalo Data Quality Checks**";
const HTML_HEADER: &str = "<!-- begin anomalo table summary -->";
const HTML_SEPARATOR: &str = "\n<!-- end anomalo table summary -->\n";
const RICH_CELL_STYLE: &str =
    "width:100px; border-width:1px; border-style:solid; border-color:rgb(171, 171, 171); background-color:transparent;";

/// Output dialects for a rendered status block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFormat {
    Plaintext,
    Markdown,
    Html,
    /// HTML table markup accepted by rich-text catalog fields.
    RichTable,
}

impl StatusFormat {
    pub fn markers(self) -> AnnotationMarkers {
        match self {
            Self::Plaintext => AnnotationMarkers::new(STATUS_TITLE, "\n\n======\n\n"),
            Self::Markdown => AnnotationMarkers::new(MARKDOWN_HEADER, "\n\n---\n\n"),
            Self::Html | Self::RichTable => AnnotationMarkers::new(HTML_HEADER, HTML_SEPARATOR),
        }
    }
}

/// Renders the status block for `summary`. The result starts with the
/// format's header and never contains its separator.
pub fn render_status(summary: &TableSummary, format: StatusFormat) -> String {
    match format {
        StatusFormat::Plaintext => render_plaintext(summary),
        StatusFormat::Markdown => render_markdown(summary),
        StatusFormat::Html => render_html(summary),
        StatusFormat::RichTable => render_rich_table(summary),
    }
}

fn render_plaintext(summary: &TableSummary) -> String {
    let mut lines = vec![
        STATUS_TITLE.to_string(),
        format!("    {}", single_line(summary.monitor_url())),
    ];
    lines.extend(
        summary
            .summary_lines()
            .into_iter()
            .map(|line| format!("    * {line}")),
    );
    lines.join("\n")
}

fn render_markdown(summary: &TableSummary) -> String {
    let mut rendered = format!(
        "{MARKDOWN_HEADER}\n[View table in Anomalo]({})\n",
        escape_markdown_url(summary.monitor_url())
    );
    for line in summary.summary_lines() {
        rendered.push_str(&format!("\n* {line}"));
    }
    rendered
}

fn render_html(summary: &TableSummary) -> String {
    let url = escape_html(summary.monitor_url());
    let items = summary
        .summary_lines()
        .iter()
        .enumerate()
        .map(|(index, line)| {
            format!(
                "    <li value=\"{}\"><span style=\"white-space: pre-wrap;\">{}</span></li>",
                index + 1,
                escape_html(line)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{HTML_HEADER}\n<p><a href=\"{url}\" rel=\"noopener noreferrer\" target=\"_blank\">{url}</a></p>\n<ul>\n{items}\n</ul>"
    )
}

fn render_rich_table(summary: &TableSummary) -> String {
    let url = escape_html(summary.monitor_url());
    let cell = |content: &str| format!("<td style=\"{RICH_CELL_STYLE}\">{content}</td>");
    let mut rows = vec![format!(
        "<tr>{}{}{}</tr>",
        cell("Check"),
        cell("Pass"),
        cell("Fail")
    )];
    for (category, tally) in summary.tallies() {
        let passed = if tally.passed > 0 && tally.failed == 0 {
            format!("{} ✅", tally.passed)
        } else {
            tally.passed.to_string()
        };
        let failed = if tally.failed > 0 {
            format!("{} ❌", tally.failed)
        } else {
            tally.failed.to_string()
        };
        rows.push(format!(
            "<tr>{}{}{}</tr>",
            cell(&escape_html(category.display_name())),
            cell(&passed),
            cell(&failed)
        ));
    }
    format!(
        "{HTML_HEADER}\n<div><span><a href=\"{url}\">{url}</a><br></span></div>\n<div><br></div>\n<div><table style=\"border-collapse:collapse;\"><tbody>\n{}\n</tbody></table></div>",
        rows.join("\n")
    )
}

/// Image markup for a profile attachment stored in a rich-text field.
pub fn render_profile_image(url: &str, alt: &str) -> String {
    format!(
        "<img src='{}' alt='{}' width='auto' height='auto' />",
        escape_html(url),
        escape_html(alt)
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_markdown_url(raw: &str) -> String {
    single_line(raw)
        .replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}

fn single_line(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
