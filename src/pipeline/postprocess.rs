//! Cleanup of raw model output before it is stored in a caption report.
//!
//! Vision models answering "extract all text" routinely wrap their answer in
//! a fenced block, mix line-ending styles, pad lines with spaces, and emit
//! GFM tables with missing or duplicated separator rows when the figure is a
//! table. The rules below are deterministic string passes; none of them
//! changes the words the model produced.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule, in order, and trim the result.
///
/// 1. Strip one outer code fence (` ``` ` or ` ```markdown `/` ```text `)
/// 2. Normalise line endings (CRLF/CR → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of more than two blank lines
/// 5. Insert a missing header separator in GFM tables
/// 6. Drop separator rows inside a table body
/// 7. Remove invisible Unicode (zero-width spaces, BOM, soft hyphen)
///
/// The returned string has no leading or trailing whitespace; an empty
/// string means the model produced nothing usable.
pub fn clean_response(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_outer_fence(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = insert_table_separators(&s);
    let s = drop_body_separators(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Outer fence ──────────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A```(?:markdown|md|text|plaintext)?[ \t]*\n(.*?)\n?```\s*\z")
        .expect("static regex")
});

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Line endings ─────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trailing whitespace ──────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

// ── Rule 4: Blank-line runs ──────────────────────────────────────────────────

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").expect("static regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n\n").into_owned()
}

// ── Rules 5–6: Tables ────────────────────────────────────────────────────────

fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.len() > 2 && t.starts_with('|') && t.ends_with('|')
}

fn is_separator_row(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|')
        && t.contains('-')
        && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// A table whose first two rows are both content rows gets a separator
/// after the first row.
fn insert_table_separators(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 4);

    for (i, line) in lines.iter().enumerate() {
        out.push((*line).to_string());

        let starts_table = is_table_row(line)
            && !is_separator_row(line)
            && (i == 0 || !is_table_row(lines[i - 1]));
        let next_is_content = lines
            .get(i + 1)
            .map(|n| is_table_row(n) && !is_separator_row(n))
            .unwrap_or(false);

        if starts_table && next_is_content {
            let columns = line.trim().matches('|').count().saturating_sub(1).max(1);
            let mut sep = String::from("|");
            for _ in 0..columns {
                sep.push_str(" --- |");
            }
            out.push(sep);
        }
    }

    out.join("\n")
}

/// GFM allows one separator, directly under the header; any later one is
/// dropped.
fn drop_body_separators(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut row_in_table = 0usize;

    for line in input.lines() {
        if is_table_row(line) {
            row_in_table += 1;
            if is_separator_row(line) && row_in_table != 2 {
                continue;
            }
        } else {
            row_in_table = 0;
        }
        out.push(line);
    }

    out.join("\n")
}

// ── Rule 7: Invisible characters ─────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence() {
        assert_eq!(strip_outer_fence("```markdown\nAccuracy 87%\n```"), "Accuracy 87%");
        assert_eq!(strip_outer_fence("```\nline one\nline two\n```"), "line one\nline two");
    }

    #[test]
    fn inner_code_blocks_are_kept() {
        let input = "Intro\n```\ncode\n```\nOutro";
        assert_eq!(strip_outer_fence(input), input);
    }

    #[test]
    fn line_endings_and_trailing_whitespace() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(trim_trailing_whitespace("  a   \nb\t"), "  a\nb");
    }

    #[test]
    fn blank_runs_collapse() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn missing_header_separator_inserted() {
        let out = insert_table_separators("| Model | Acc |\n| A | 87% |");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "| --- | --- |");
    }

    #[test]
    fn well_formed_table_untouched() {
        let table = "| H1 | H2 |\n| --- | --- |\n| a | b |\n| c | d |";
        assert_eq!(insert_table_separators(table), table);
        assert_eq!(drop_body_separators(table), table);
    }

    #[test]
    fn body_separators_dropped() {
        let out = drop_body_separators("| A | B |\n|---|---|\n| 1 | 2 |\n|---|---|\n| 3 | 4 |");
        assert_eq!(out.lines().filter(|l| is_separator_row(l)).count(), 1);
        assert!(out.contains("| 3 | 4 |"));
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(
            remove_invisible_chars("Fig\u{200B}ure\u{FEFF} 1\u{00AD}"),
            "Figure 1"
        );
    }

    #[test]
    fn full_cleanup() {
        let raw = "```markdown\r\nTable 1   \r\n\r\n\r\n\r\n\r\n| Model | Acc |\r\n| A | 87% |\r\n```\r\n";
        let out = clean_response(raw);
        assert!(out.starts_with("Table 1"));
        assert!(!out.contains("\n\n\n\n"));
        assert!(out.contains("| --- | --- |"));
        assert!(!out.ends_with('\n'));
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(clean_response("  \n\u{200B}\n "), "");
    }
}
