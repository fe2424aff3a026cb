//! Normalisation: raw extracted text → Markdown paragraphs.
//!
//! Text layers and OCR output both arrive as loosely formatted text with
//! mixed line endings. A blank line marks a paragraph break; a single line
//! break is either a hard wrap (PDF text layers) or a meaningful line (OCR
//! of receipts, forms, poems). [`LineBreaks`] selects between the two.

use once_cell::sync::Lazy;
use regex::Regex;

/// What to do with single line breaks inside a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineBreaks {
    /// Collapse each line break (and the whitespace around it) into one space.
    #[default]
    Join,
    /// Keep line breaks as they are.
    Preserve,
}

// A paragraph break is two or more newlines; whitespace-only lines in between count as blank.
static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

static RE_LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\n\s*").unwrap());

/// Normalise raw text into paragraphs separated by exactly one blank line,
/// joining wrapped lines.
///
/// Empty or whitespace-only input yields an empty string; the caller decides
/// what to show instead.
pub fn normalize(raw: &str) -> String {
    normalize_with(raw, LineBreaks::Join)
}

/// Normalise raw text with an explicit line-break policy.
pub fn normalize_with(raw: &str, line_breaks: LineBreaks) -> String {
    let text = raw.replace('\r', "");
    RE_PARAGRAPH_BREAK
        .split(&text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match line_breaks {
            LineBreaks::Join => RE_LINE_BREAK.replace_all(p, " ").into_owned(),
            LineBreaks::Preserve => p.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \r\n \n\t"), "");
    }

    #[test]
    fn single_paragraph_lines_are_joined() {
        assert_eq!(normalize("one\ntwo\nthree"), "one two three");
        assert_eq!(normalize("one  \n   two"), "one two");
    }

    #[test]
    fn paragraphs_are_separated_by_one_blank_line() {
        let raw = "first line\nwrapped\n\n\n\nsecond\r\n\r\nthird";
        assert_eq!(normalize(raw), "first line wrapped\n\nsecond\n\nthird");
    }

    #[test]
    fn whitespace_only_lines_break_paragraphs() {
        assert_eq!(normalize("a\n   \nb"), "a\n\nb");
    }

    #[test]
    fn carriage_returns_are_stripped() {
        assert_eq!(normalize("a\rb"), "ab");
        assert_eq!(normalize("a\r\nb"), "a b");
    }

    #[test]
    fn paragraphs_are_trimmed() {
        assert_eq!(normalize("   lead\n\n  trail   "), "lead\n\ntrail");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "x\ny\n\n\nz",
            "  a  \r\n\r\n\r\nb\nc  ",
            "single",
            "\n\n\n",
        ];
        for raw in inputs {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "input: {raw:?}");
            let kept = normalize_with(raw, LineBreaks::Preserve);
            assert_eq!(normalize_with(&kept, LineBreaks::Preserve), kept, "input: {raw:?}");
        }
    }

    #[test]
    fn preserve_keeps_single_line_breaks() {
        assert_eq!(
            normalize_with("Linha 1\nLinha 2\n\nLinha 3", LineBreaks::Preserve),
            "Linha 1\nLinha 2\n\nLinha 3"
        );
        assert_eq!(
            normalize_with("  a\nb  \n\n\n\nc\r\n", LineBreaks::Preserve),
            "a\nb\n\nc"
        );
    }
}
