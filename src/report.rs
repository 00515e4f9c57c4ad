//! Line-oriented scanner turning analysis markdown into typed blocks.
//!
//! The model's reply follows a light convention, nothing more:
//!
//! | Line | Block |
//! |------|-------|
//! | starts with `#` | [`Block::Heading`] (leading `#`s and surrounding whitespace removed) |
//! | trimmed equals `---` | [`Block::PageBreak`] |
//! | anything else non-blank | [`Block::Paragraph`] of [`TextRun`]s |
//! | blank | nothing |
//!
//! Inside a paragraph, `**…**` and `__…__` mark bold spans. A span opens and
//! closes with the same delimiter, is matched non-greedily and holds at least
//! one character. Markers never nest: in `**a __b__ c**` the inner `__` pair
//! is literal text. An opener without a closer is ordinary text.
//!
//! Parsing never fails; every input yields some block sequence.

use serde::{Deserialize, Serialize};

/// A contiguous piece of paragraph text with uniform weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

/// One structural element of the report body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Block {
    Heading(String),
    PageBreak,
    Paragraph(Vec<TextRun>),
}

const BOLD_DELIMITERS: [&str; 2] = ["**", "__"];

/// Scan the whole report into blocks, in source order.
pub fn parse_report(markdown: &str) -> Vec<Block> {
    markdown.lines().filter_map(parse_line).collect()
}

/// Classify a single line. `None` for blank lines.
pub fn parse_line(line: &str) -> Option<Block> {
    let trimmed = line.trim();
    if line.starts_with('#') {
        Some(Block::Heading(line.trim_start_matches('#').trim().to_string()))
    } else if trimmed == "---" {
        Some(Block::PageBreak)
    } else if !trimmed.is_empty() {
        Some(Block::Paragraph(parse_runs(line)))
    } else {
        None
    }
}

/// Split a paragraph line into plain and bold runs.
///
/// Plain text, whitespace included, is kept verbatim.
pub fn parse_runs(line: &str) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut plain_start = 0;
    let mut pos = 0;

    while pos < line.len() {
        if let Some((delim, close)) = match_bold_at(line, pos) {
            if pos > plain_start {
                runs.push(TextRun::plain(&line[plain_start..pos]));
            }
            runs.push(TextRun::bold(&line[pos + delim.len()..close]));
            pos = close + delim.len();
            plain_start = pos;
        } else {
            pos += line[pos..].chars().next().map_or(1, char::len_utf8);
        }
    }

    if plain_start < line.len() {
        runs.push(TextRun::plain(&line[plain_start..]));
    }
    runs
}

/// If a bold span opens at byte `pos`, return its delimiter and the byte
/// offset of the closing delimiter.
fn match_bold_at(line: &str, pos: usize) -> Option<(&'static str, usize)> {
    let rest = &line[pos..];
    let delim = BOLD_DELIMITERS.into_iter().find(|d| rest.starts_with(d))?;
    let content_start = pos + delim.len();
    // The span must hold at least one character.
    let first = line[content_start..].chars().next()?;
    let search_from = content_start + first.len_utf8();
    line[search_from..]
        .find(delim)
        .map(|offset| (delim, search_from + offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(runs: &[TextRun]) -> Block {
        Block::Paragraph(runs.to_vec())
    }

    #[test]
    fn headings_breaks_and_bold_in_order() {
        let blocks = parse_report("# Title\nSome **bold** text\n---\nAfter break");
        assert_eq!(
            blocks,
            vec![
                Block::Heading("Title".into()),
                para(&[
                    TextRun::plain("Some "),
                    TextRun::bold("bold"),
                    TextRun::plain(" text"),
                ]),
                Block::PageBreak,
                para(&[TextRun::plain("After break")]),
            ]
        );
    }

    #[test]
    fn unmatched_opener_is_plain_text() {
        assert_eq!(
            parse_report("a **b c"),
            vec![para(&[TextRun::plain("a **b c")])]
        );
    }

    #[test]
    fn mixed_delimiters_never_pair() {
        assert_eq!(
            parse_runs("**bold__ here"),
            vec![TextRun::plain("**bold__ here")]
        );
    }

    #[test]
    fn underscore_delimiters_are_bold() {
        assert_eq!(
            parse_runs("__Severity:__ Mild"),
            vec![TextRun::bold("Severity:"), TextRun::plain(" Mild")]
        );
    }

    #[test]
    fn nested_markers_stay_literal() {
        assert_eq!(
            parse_runs("**a __b__ c**"),
            vec![TextRun::bold("a __b__ c")]
        );
    }

    #[test]
    fn matching_is_non_greedy() {
        assert_eq!(
            parse_runs("**a** and **b**"),
            vec![
                TextRun::bold("a"),
                TextRun::plain(" and "),
                TextRun::bold("b"),
            ]
        );
    }

    #[test]
    fn empty_span_is_not_bold() {
        assert_eq!(parse_runs("****"), vec![TextRun::plain("****")]);
        assert_eq!(parse_runs("x ** y"), vec![TextRun::plain("x ** y")]);
    }

    #[test]
    fn triple_asterisks_follow_leftmost_match() {
        assert_eq!(
            parse_runs("***a***"),
            vec![TextRun::bold("*a"), TextRun::plain("*")]
        );
    }

    #[test]
    fn whitespace_is_preserved_verbatim() {
        assert_eq!(
            parse_runs("  - **Region:**  chest  "),
            vec![
                TextRun::plain("  - "),
                TextRun::bold("Region:"),
                TextRun::plain("  chest  "),
            ]
        );
    }

    #[test]
    fn heading_levels_collapse() {
        assert_eq!(
            parse_report("### 2. Detailed Observations #\n##Impression"),
            vec![
                Block::Heading("2. Detailed Observations #".into()),
                Block::Heading("Impression".into()),
            ]
        );
    }

    #[test]
    fn indented_hash_is_a_paragraph() {
        assert_eq!(
            parse_report("  # not a heading"),
            vec![para(&[TextRun::plain("  # not a heading")])]
        );
    }

    #[test]
    fn page_break_tolerates_surrounding_spaces() {
        assert_eq!(parse_report("  ---  "), vec![Block::PageBreak]);
        assert_eq!(
            parse_report("----"),
            vec![para(&[TextRun::plain("----")])]
        );
    }

    #[test]
    fn blank_lines_and_crlf_are_dropped() {
        assert_eq!(
            parse_report("one\r\n\r\n   \r\ntwo\r\n"),
            vec![
                para(&[TextRun::plain("one")]),
                para(&[TextRun::plain("two")]),
            ]
        );
    }

    #[test]
    fn multibyte_text_around_spans() {
        assert_eq!(
            parse_runs("Größe: **3 × 4 cm** – stabil"),
            vec![
                TextRun::plain("Größe: "),
                TextRun::bold("3 × 4 cm"),
                TextRun::plain(" – stabil"),
            ]
        );
    }

    #[test]
    fn multibyte_first_char_inside_span() {
        assert_eq!(parse_runs("**é**"), vec![TextRun::bold("é")]);
    }
}
