//! DOCX conversion: OOXML markup → HTML → Markdown.
//!
//! ## Why go through HTML?
//!
//! An HTML intermediate keeps the DOCX walker small: it only has to decide
//! which paragraphs are headings, list items, or table cells, and which runs
//! are bold or italic. Markdown syntax (escaping, list markers, table pipes)
//! is then the HTML→Markdown converter's job.
//!
//! ## What is kept
//!
//! | DOCX | HTML |
//! |------|------|
//! | paragraph styled `heading 1`–`heading 6` / `title` | `<h1>`–`<h6>` |
//! | paragraph with numbering (`w:numPr`) | `<ol><li>` for numbered formats, `<ul><li>` for bullets |
//! | run with `w:b` / `w:i` | `<strong>` / `<em>` |
//! | `w:br` / `w:tab` | `<br />` / tab |
//! | `w:tbl` | `<table>`, first row as `<th>` |
//!
//! Empty paragraphs, deleted text (`w:delText`), field instructions and the
//! `mc:Fallback` copies of text boxes are dropped.

use crate::error::Doc2MdError;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

/// Convert a DOCX document to Markdown.
///
/// A document with no visible content yields an empty string; a malformed
/// archive or markup is an error.
pub fn extract_docx(bytes: &[u8]) -> Result<String, Doc2MdError> {
    let html = docx_to_html(bytes)?;
    if html.trim().is_empty() {
        debug!("DOCX produced no HTML");
        return Ok(String::new());
    }
    Ok(html_to_markdown(&html))
}

/// Convert a DOCX document's body to an HTML fragment.
pub fn docx_to_html(bytes: &[u8]) -> Result<String, Doc2MdError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| docx_error(format!(
        "not a DOCX archive: {e}"
    )))?;

    let document_xml = read_entry(&mut archive, "word/document.xml")?
        .ok_or_else(|| docx_error("missing word/document.xml"))?;

    // Both parts are optional; without styles.xml headings are recognised by
    // style id alone, without numbering.xml every list is a bullet list.
    let headings = match read_entry(&mut archive, "word/styles.xml") {
        Ok(Some(xml)) => parse_heading_styles(&xml),
        _ => HashMap::new(),
    };
    let numbering = match read_entry(&mut archive, "word/numbering.xml") {
        Ok(Some(xml)) => parse_numbering(&xml),
        _ => Numbering::default(),
    };
    debug!(
        "DOCX declares {} heading styles, {} numbering instances",
        headings.len(),
        numbering.abstract_of.len()
    );

    walk_body(&document_xml, &DocumentStyles { headings, numbering })
}

fn docx_error(detail: impl Into<String>) -> Doc2MdError {
    Doc2MdError::DocxExtraction {
        detail: detail.into(),
    }
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, Doc2MdError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(docx_error(format!("cannot open {name}: {e}"))),
    };
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| docx_error(format!("cannot read {name}: {e}")))?;
    Ok(Some(content))
}

// ── Styles ───────────────────────────────────────────────────────────────────

/// Heading level for a style name or id: `heading 2` / `Heading2` → 2, `Title` → 1.
fn heading_level(style: &str) -> Option<u8> {
    let key: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if key == "title" {
        return Some(1);
    }
    key.strip_prefix("heading")
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| (1..=6).contains(n))
}

/// Map style ids to heading levels using the style names in `word/styles.xml`.
///
/// Word stores built-in style names in English even when the ids are
/// localised (`Ttulo1` → `heading 1`), so names are the reliable key.
fn parse_heading_styles(xml: &str) -> HashMap<String, u8> {
    let mut levels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let mut current_id: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:style" => {
                current_id = get_attr(&e, b"w:styleId");
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"w:name" => {
                if let (Some(id), Some(level)) = (
                    current_id.as_ref(),
                    get_attr(&e, b"w:val").and_then(|n| heading_level(&n)),
                ) {
                    levels.insert(id.clone(), level);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:style" => current_id = None,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    levels
}

/// Numbering definitions from `word/numbering.xml`.
#[derive(Debug, Default)]
struct Numbering {
    /// `w:numId` → `w:abstractNumId`.
    abstract_of: HashMap<String, String>,
    /// (`w:abstractNumId`, `w:ilvl`) → `w:numFmt`.
    formats: HashMap<(String, u8), String>,
}

impl Numbering {
    /// Anything but a bullet (`decimal`, `lowerRoman`, `upperLetter`, ...) is ordered.
    fn is_ordered(&self, num_id: &str, level: u8) -> bool {
        self.abstract_of
            .get(num_id)
            .and_then(|abstract_id| self.formats.get(&(abstract_id.clone(), level)))
            .is_some_and(|format| format != "bullet" && format != "none")
    }
}

fn parse_numbering(xml: &str) -> Numbering {
    let mut numbering = Numbering::default();
    let mut reader = Reader::from_str(xml);
    let mut current_abstract: Option<String> = None;
    let mut current_level: Option<u8> = None;
    let mut current_num: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:abstractNum" => current_abstract = get_attr(&e, b"w:abstractNumId"),
                b"w:lvl" => {
                    current_level = get_attr(&e, b"w:ilvl").and_then(|l| l.parse().ok());
                }
                b"w:num" => current_num = get_attr(&e, b"w:numId"),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:numFmt" => {
                    if let (Some(abstract_id), Some(level), Some(format)) = (
                        current_abstract.as_ref(),
                        current_level,
                        get_attr(&e, b"w:val"),
                    ) {
                        numbering
                            .formats
                            .insert((abstract_id.clone(), level), format);
                    }
                }
                b"w:abstractNumId" => {
                    if let (Some(num_id), Some(abstract_id)) =
                        (current_num.as_ref(), get_attr(&e, b"w:val"))
                    {
                        numbering.abstract_of.insert(num_id.clone(), abstract_id);
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:abstractNum" => current_abstract = None,
                b"w:lvl" => current_level = None,
                b"w:num" => current_num = None,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    numbering
}

/// Style information the body walker consults.
#[derive(Debug, Default)]
struct DocumentStyles {
    /// Style id → heading level.
    headings: HashMap<String, u8>,
    numbering: Numbering,
}

// ── Body ─────────────────────────────────────────────────────────────────────

fn get_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(Result::ok)
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// `<w:b w:val="0"/>` and `<w:b w:val="false"/>` switch formatting off.
fn toggle_on(e: &BytesStart<'_>) -> bool {
    !matches!(get_attr(e, b"w:val").as_deref(), Some("0" | "false" | "none"))
}

/// Accumulates HTML while walking `word/document.xml`.
#[derive(Default)]
struct HtmlWriter<'a> {
    styles: Option<&'a DocumentStyles>,
    html: String,

    paragraph_depth: usize,
    paragraph: String,
    heading: Option<u8>,
    list_item: bool,
    num_id: Option<String>,
    list_level: u8,
    /// Tag of the list currently open, `ul` or `ol`.
    open_list: Option<&'static str>,

    in_run: bool,
    in_run_props: bool,
    in_text: bool,
    bold: bool,
    italic: bool,
    run: String,

    table_depth: usize,
    row_index: usize,
    cell: String,

    fallback_depth: usize,
}

impl<'a> HtmlWriter<'a> {
    fn new(styles: &'a DocumentStyles) -> Self {
        Self {
            styles: Some(styles),
            ..Self::default()
        }
    }

    fn start(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"mc:Fallback" => self.fallback_depth += 1,
            _ if self.fallback_depth > 0 => {}
            b"w:p" => {
                self.paragraph_depth += 1;
                if self.paragraph_depth == 1 {
                    self.paragraph.clear();
                    self.heading = None;
                    self.list_item = false;
                    self.num_id = None;
                    self.list_level = 0;
                }
            }
            b"w:r" => {
                self.flush_run();
                self.in_run = true;
                self.bold = false;
                self.italic = false;
            }
            b"w:rPr" if self.in_run => self.in_run_props = true,
            b"w:t" if self.in_run => self.in_text = true,
            b"w:tbl" => self.open_table(),
            b"w:tr" if self.table_depth == 1 => {
                self.html.push_str("<tr>");
            }
            b"w:tc" if self.table_depth == 1 => self.cell.clear(),
            _ => self.property(e),
        }
    }

    fn empty(&mut self, e: &BytesStart<'_>) {
        if self.fallback_depth > 0 {
            return;
        }
        match e.name().as_ref() {
            b"w:tab" if self.in_run => self.run.push('\t'),
            b"w:br" if self.in_run => {
                if get_attr(e, b"w:type").as_deref() != Some("page") {
                    self.run.push_str("<br />");
                }
            }
            _ => self.property(e),
        }
    }

    /// Paragraph and run properties; they appear both as empty and as open tags.
    fn property(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"w:pStyle" if self.paragraph_depth > 0 => {
                if let Some(id) = get_attr(e, b"w:val") {
                    self.heading = self
                        .styles
                        .and_then(|styles| styles.headings.get(&id).copied())
                        .or_else(|| heading_level(&id));
                }
            }
            b"w:numPr" if self.paragraph_depth > 0 => self.list_item = true,
            b"w:numId" if self.paragraph_depth > 0 => self.num_id = get_attr(e, b"w:val"),
            b"w:ilvl" if self.paragraph_depth > 0 => {
                self.list_level = get_attr(e, b"w:val")
                    .and_then(|l| l.parse().ok())
                    .unwrap_or(0);
            }
            b"w:b" if self.in_run_props => self.bold = toggle_on(e),
            b"w:i" if self.in_run_props => self.italic = toggle_on(e),
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        if self.fallback_depth > 0 {
            if name == b"mc:Fallback" {
                self.fallback_depth -= 1;
            }
            return;
        }
        match name {
            b"w:t" => self.in_text = false,
            b"w:rPr" => self.in_run_props = false,
            b"w:r" => {
                self.flush_run();
                self.in_run = false;
            }
            b"w:p" if self.paragraph_depth > 0 => {
                self.paragraph_depth -= 1;
                if self.paragraph_depth == 0 {
                    self.flush_run();
                    self.finish_paragraph();
                }
            }
            b"w:tc" if self.table_depth == 1 => {
                let tag = if self.row_index == 0 { "th" } else { "td" };
                self.html
                    .push_str(&format!("<{tag}>{}</{tag}>", self.cell.trim()));
            }
            b"w:tr" if self.table_depth == 1 => {
                self.html.push_str("</tr>");
                self.row_index += 1;
            }
            b"w:tbl" if self.table_depth > 0 => {
                self.table_depth -= 1;
                if self.table_depth == 0 {
                    self.html.push_str("</table>");
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_text && self.fallback_depth == 0 {
            self.run.push_str(&quick_xml::escape::escape(text));
        }
    }

    fn flush_run(&mut self) {
        if self.run.is_empty() {
            return;
        }
        let content = std::mem::take(&mut self.run);
        if content.trim().is_empty() {
            self.paragraph.push_str(&content);
            return;
        }
        let mut wrapped = content;
        if self.italic {
            wrapped = format!("<em>{wrapped}</em>");
        }
        if self.bold {
            wrapped = format!("<strong>{wrapped}</strong>");
        }
        self.paragraph.push_str(&wrapped);
    }

    fn finish_paragraph(&mut self) {
        let content = std::mem::take(&mut self.paragraph);
        let content = content.trim();
        if content.is_empty() {
            return;
        }

        if self.table_depth > 0 {
            if !self.cell.is_empty() {
                self.cell.push(' ');
            }
            self.cell.push_str(content);
            return;
        }

        // numId 0 explicitly removes numbering inherited from the style.
        if self.list_item && self.heading.is_none() && self.num_id.as_deref() != Some("0") {
            let tag = self.list_tag();
            if self.open_list != Some(tag) {
                self.close_list();
                self.html.push_str(&format!("<{tag}>"));
                self.open_list = Some(tag);
            }
            self.html.push_str(&format!("<li>{content}</li>"));
            return;
        }

        self.close_list();
        match self.heading {
            Some(level) => self
                .html
                .push_str(&format!("<h{level}>{content}</h{level}>")),
            None => self.html.push_str(&format!("<p>{content}</p>")),
        }
    }

    fn open_table(&mut self) {
        self.table_depth += 1;
        if self.table_depth == 1 {
            self.close_list();
            self.row_index = 0;
            self.html.push_str("<table>");
        }
    }

    fn list_tag(&self) -> &'static str {
        let ordered = match (self.styles, self.num_id.as_deref()) {
            (Some(styles), Some(num_id)) => styles.numbering.is_ordered(num_id, self.list_level),
            _ => false,
        };
        if ordered {
            "ol"
        } else {
            "ul"
        }
    }

    fn close_list(&mut self) {
        if let Some(tag) = self.open_list.take() {
            self.html.push_str(&format!("</{tag}>"));
        }
    }

    fn finish(mut self) -> String {
        self.close_list();
        self.html
    }
}

fn walk_body(xml: &str, styles: &DocumentStyles) -> Result<String, Doc2MdError> {
    let mut writer = HtmlWriter::new(styles);
    let mut reader = Reader::from_str(xml);
    // Whitespace inside w:t is significant (xml:space="preserve").
    reader.trim_text(false);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => writer.start(&e),
            Ok(Event::Empty(e)) => writer.empty(&e),
            Ok(Event::End(e)) => writer.end(e.name().as_ref()),
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| docx_error(format!("bad text in document.xml: {e}")))?;
                writer.text(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(docx_error(format!(
                    "malformed document.xml at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(writer.finish())
}

// ── HTML → Markdown ──────────────────────────────────────────────────────────

// The HTML converter emits setext underlines for the top two levels; rewrite them as ATX.
static RE_SETEXT_H1: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([^\n]*\S[^\n]*)\n=+[ \t]*$").unwrap());
static RE_SETEXT_H2: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([^\n]*\S[^\n]*)\n-+[ \t]*$").unwrap());
// Levels 3-6 come out closed (`### Título ###`).
static RE_CLOSED_ATX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,6}[ \t]+[^\n]*?)[ \t]+#+[ \t]*$").unwrap());
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static RE_TABLE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(<t[hd][^>]*>)(.*?)(</t[hd]>)").unwrap());
static RE_ORDERED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<p>(\d+)([.)]\s)").unwrap());

/// Stands in for a Markdown backslash escape while the HTML converter runs,
/// which would otherwise pass literal text through unescaped.
const ESCAPE_MARK: char = '\u{E000}';

/// Mark text that Markdown would read as syntax and the HTML converter leaves
/// alone: pipes inside table cells and paragraphs opening with `1.` or `1)`.
/// Bullet, heading and quote markers are already escaped by the converter.
fn mark_literal_syntax(html: &str) -> String {
    let html = RE_TABLE_CELL.replace_all(html, |caps: &regex::Captures<'_>| {
        format!(
            "{}{}{}",
            &caps[1],
            caps[2].replace('|', &format!("{ESCAPE_MARK}|")),
            &caps[3]
        )
    });
    let html = RE_ORDERED_MARKER.replace_all(&html, format!("<p>${{1}}{ESCAPE_MARK}${{2}}"));
    html.into_owned()
}

/// HTML → Markdown with open ATX headings and at most one blank line between blocks.
pub fn html_to_markdown(html: &str) -> String {
    let md = html2md::parse_html(&mark_literal_syntax(html));
    let md = RE_SETEXT_H1.replace_all(&md, "# ${1}");
    let md = RE_SETEXT_H2.replace_all(&md, "## ${1}");
    let md = RE_CLOSED_ATX.replace_all(&md, "${1}");
    let md = RE_BLANK_LINES.replace_all(&md, "\n\n");
    md.replace(ESCAPE_MARK, "\\").trim().to_string()
}
