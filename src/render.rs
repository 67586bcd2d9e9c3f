use crate::models::{ParseTweetResponse, ParsedImageResult};
use std::fmt::Write;

const WRAP_WIDTH: usize = 88;

/// Plain-text report of a parse for terminal output. Markdown is passed
/// through untouched.
pub fn summary(response: &ParseTweetResponse) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Tweet {}", response.tweet_id);
    let _ = writeln!(out, "URL:    {}", response.normalized_tweet_url);
    let _ = writeln!(out, "Media:  {}", response.source);
    let _ = writeln!(
        out,
        "Images: {} ({} failed), tables: {}",
        response.results.len(),
        response.failed_results().count(),
        response.table_count()
    );

    if !response.combined_markdown.trim().is_empty() {
        out.push_str("\n--- Combined markdown ---\n\n");
        out.push_str(response.combined_markdown.trim_end());
        out.push('\n');
    }

    for (idx, result) in response.results.iter().enumerate() {
        out.push('\n');
        push_image(&mut out, idx + 1, result);
    }

    if !response.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &response.warnings {
            push_wrapped(&mut out, warning, "  - ", "    ");
        }
    }

    out
}

fn push_image(out: &mut String, number: usize, result: &ParsedImageResult) {
    let status = if result.success { "ok" } else { "failed" };
    let _ = writeln!(
        out,
        "--- Image {}: {} [{}] ---",
        number, result.filename, status
    );
    let _ = writeln!(out, "{}", result.image_url);

    if !result.success {
        let error = result.error.as_deref().unwrap_or("Unknown error");
        push_wrapped(out, error, "Error: ", "       ");
        return;
    }

    if result.tables.is_empty() {
        out.push_str("No tables extracted.\n");
        return;
    }

    for (table_idx, table) in result.tables.iter().enumerate() {
        let _ = writeln!(
            out,
            "\nTable {} (page {}, {} rows x {} columns)",
            table_idx + 1,
            table.page_number,
            table.row_count,
            table.column_count
        );
        out.push_str(table.markdown.trim_end());
        out.push('\n');
    }
}

fn push_wrapped(out: &mut String, text: &str, first: &str, rest: &str) {
    let options = textwrap::Options::new(WRAP_WIDTH)
        .initial_indent(first)
        .subsequent_indent(rest);
    for line in textwrap::wrap(text, options) {
        out.push_str(&line);
        out.push('\n');
    }
}
