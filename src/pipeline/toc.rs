//! Table-of-contents extraction.
//!
//! The publisher's TOC is a frame page with a predictable shape: the manual
//! title in the first `<p><b>` element, and a `<ul id="x">` whose `<nobr>`
//! wrapped `<li>` items each carry one chapter line ("Chapter 5 - Time
//! Limits") plus a nested `<ul>` of section anchors ("05-10 Overview").
//! Anything that breaks that shape is a [`AssemblyError::MalformedToc`].
//!
//! The extractor produces a flat [`TocOutline`]; turning it into a
//! [`crate::manual::Manual`] (chapter numbering, URL resolution) happens in
//! `Manual::from_outline`.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AssemblyError;

/// `"Chapter 5 - Time Limits"` → number 5, title "Time Limits".
static CHAPTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Chapter (\d+) - (.+)$").unwrap());

/// `"05-10 Overview"` → number 10, title "Overview".
/// The leading chapter half of the pair is discarded; the chapter is known
/// from context.
static SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+-(\d+) )?(.+)$").unwrap());

/// Parsed TOC page, before numbering and URL resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct TocOutline {
    pub title: String,
    pub chapters: Vec<TocItem>,
}

/// One chapter entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TocItem {
    /// Explicit chapter number, when the entry text matched "Chapter N - ...".
    pub number: Option<u32>,
    /// The raw entry text, used for front-matter detection.
    pub text: String,
    /// The human title with any "Chapter N - " prefix stripped.
    pub title: String,
    pub sections: Vec<TocSectionItem>,
}

/// One section anchor under a chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct TocSectionItem {
    pub number: Option<u32>,
    pub title: String,
    /// Relative href exactly as it appears in the page, fragment stripped.
    pub href: String,
}

/// Parses raw TOC page bytes into an outline.
pub trait TocExtractor: Send + Sync {
    fn extract(&self, html: &[u8]) -> Result<TocOutline, AssemblyError>;
}

/// The real extractor for the publisher's HTML TOC pages.
#[derive(Debug, Default)]
pub struct HtmlTocExtractor;

impl TocExtractor for HtmlTocExtractor {
    fn extract(&self, html: &[u8]) -> Result<TocOutline, AssemblyError> {
        let text = decode(html);
        let dom = parse_document(RcDom::default(), Default::default()).one(text);
        let document = dom.document;

        let title = find_title(&document).ok_or_else(|| AssemblyError::MalformedToc {
            reason: "no <p><b> manual title found".into(),
        })?;

        let list = find_element(&document, |h| {
            element_name(h) == Some("ul") && attr_value(h, "id").as_deref() == Some("x")
        })
        .ok_or_else(|| AssemblyError::MalformedToc {
            reason: "no chapter list (<ul id=\"x\">) found".into(),
        })?;

        let mut chapters = Vec::new();
        for item in collect_elements(&list, "li") {
            chapters.push(parse_chapter(&item)?);
        }
        if chapters.is_empty() {
            return Err(AssemblyError::MalformedToc {
                reason: "chapter list is empty".into(),
            });
        }

        Ok(TocOutline { title, chapters })
    }
}

fn parse_chapter(item: &Handle) -> Result<TocItem, AssemblyError> {
    let text = clean(&own_text(item));
    if text.is_empty() {
        return Err(AssemblyError::MalformedToc {
            reason: "chapter entry with no text".into(),
        });
    }

    let (number, title) = match CHAPTER_RE.captures(&text) {
        Some(caps) => {
            let n = caps[1].parse::<u32>().map_err(|_| AssemblyError::MalformedToc {
                reason: format!("chapter number out of range in '{text}'"),
            })?;
            (Some(n), caps[2].to_string())
        }
        None => (None, text.clone()),
    };

    let mut sections = Vec::new();
    if let Some(sublist) = find_element(item, |h| element_name(h) == Some("ul")) {
        for anchor in collect_elements(&sublist, "a") {
            let href = attr_value(&anchor, "href").ok_or_else(|| {
                AssemblyError::MalformedToc {
                    reason: format!("section anchor without href under '{text}'"),
                }
            })?;
            let href = href.split('#').next().unwrap_or_default().to_string();
            let sec_text = clean(&all_text(&anchor));
            let caps = SECTION_RE
                .captures(&sec_text)
                .ok_or_else(|| AssemblyError::MalformedToc {
                    reason: format!("unparseable section entry '{sec_text}'"),
                })?;
            let number = match caps.get(1) {
                Some(m) => Some(m.as_str().parse::<u32>().map_err(|_| {
                    AssemblyError::MalformedToc {
                        reason: format!("section number out of range in '{sec_text}'"),
                    }
                })?),
                None => None,
            };
            sections.push(TocSectionItem {
                number,
                title: caps[2].to_string(),
                href,
            });
        }
    }

    Ok(TocItem {
        number,
        text,
        title,
        sections,
    })
}

/// Decode page bytes: UTF-8 when valid, otherwise Latin-1 byte-by-byte.
///
/// The Latin-1 path is total (every byte maps to a char), so decoding never
/// fails here; genuinely unusable titles are rejected later, when the
/// bookmark emitter enforces ASCII.
fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Collapse whitespace runs (including NBSP) to single spaces and trim.
fn clean(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = true;
    for ch in text.chars() {
        if ch.is_whitespace() || ch == '\u{a0}' {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

// ── rcdom helpers ────────────────────────────────────────────────────────

fn element_name(handle: &Handle) -> Option<&str> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(&name.local),
        _ => None,
    }
}

fn attr_value(handle: &Handle, attr: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == attr)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Depth-first search for the first element matching the predicate.
fn find_element(handle: &Handle, pred: impl Fn(&Handle) -> bool + Copy) -> Option<Handle> {
    for child in handle.children.borrow().iter() {
        if element_name(child).is_some() && pred(child) {
            return Some(child.clone());
        }
        if let Some(found) = find_element(child, pred) {
            return Some(found);
        }
    }
    None
}

/// All descendant elements with the given tag, document order, without
/// descending into matches (a chapter `<li>` must not yield its section
/// `<li>` items).
fn collect_elements(handle: &Handle, tag: &str) -> Vec<Handle> {
    let mut out = Vec::new();
    collect_into(handle, tag, &mut out);
    out
}

fn collect_into(handle: &Handle, tag: &str, out: &mut Vec<Handle>) {
    for child in handle.children.borrow().iter() {
        if element_name(child) == Some(tag) {
            out.push(child.clone());
        } else {
            collect_into(child, tag, out);
        }
    }
}

/// Concatenated text of all descendants.
fn all_text(handle: &Handle) -> String {
    let mut out = String::new();
    text_into(handle, None, &mut out);
    out
}

/// Concatenated text of descendants, not descending into `skip` elements.
/// A chapter `<li>`'s own line excludes its nested section `<ul>`.
fn own_text(handle: &Handle) -> String {
    let mut out = String::new();
    text_into(handle, Some("ul"), &mut out);
    out
}

fn text_into(handle: &Handle, skip: Option<&str>, out: &mut String) {
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            NodeData::Element { .. } => {
                if skip.is_some() && element_name(child) == skip {
                    continue;
                }
                text_into(child, skip, out);
            }
            _ => {}
        }
    }
}

fn find_title(document: &Handle) -> Option<String> {
    let p = find_element(document, |h| element_name(h) == Some("p"))?;
    let b = find_element(&p, |h| element_name(h) == Some("b"))?;
    let title = clean(&all_text(&b));
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}
