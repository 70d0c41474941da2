//! "Recent Port Calls" extraction.
//!
//! The tracking site has no stable class names around its port call list, so
//! the block is found from its visible text: a heading reading "Recent Port
//! Calls", or failing that the element grouping several "Arrival (UTC)" labels.
//! Values are read from the first non-empty element following each label.
//! A page that no longer matches simply yields no events.

use std::cmp::Reverse;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use unicode_normalization::UnicodeNormalization;

const SECTION_HEADING: &str = "recent port calls";
const UNKNOWN_PORT: &str = "Unknown Port";

static HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3, h4, div").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Arrival,
    Departure,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::Arrival, EventKind::Departure];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Arrival => "Arrival",
            EventKind::Departure => "Departure",
        }
    }

    /// Lower-cased label preceding the timestamp on the page.
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Arrival => "arrival (utc)",
            EventKind::Departure => "departure (utc)",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One arrival or departure as printed on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub port: String,
    /// Timestamp text as shown, UTC, no year.
    pub when_raw: String,
    /// `href` of the port link, possibly relative, empty when absent.
    pub link: String,
    pub detail: String,
}

impl RawEvent {
    pub fn new(kind: EventKind, port: &str, when_raw: &str, link: &str) -> Self {
        RawEvent {
            kind,
            port: port.to_string(),
            when_raw: when_raw.to_string(),
            link: link.to_string(),
            detail: format!("{port} {kind} (UTC) {when_raw}"),
        }
    }
}

/// Traversal bounds of the extraction heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Empty siblings skipped between the section heading and its content.
    pub heading_hops: usize,
    /// Empty siblings skipped between a label and its value.
    pub value_hops: usize,
    /// Ancestors climbed from a lone label looking for the list container.
    pub ancestor_hops: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            heading_hops: 6,
            value_hops: 6,
            ancestor_hops: 6,
        }
    }
}

pub fn extract_events(html: &str, opts: &ExtractOptions) -> Vec<RawEvent> {
    let document = Html::parse_document(html);
    extract_from_document(&document, opts)
}

pub fn extract_from_document(document: &Html, opts: &ExtractOptions) -> Vec<RawEvent> {
    let Some(root) = find_section_root(document, opts) else {
        return Vec::new();
    };

    let mut events = Vec::new();
    for child in root.children().filter_map(ElementRef::wrap) {
        let entry = std::iter::once(child)
            .chain(child.children().filter_map(ElementRef::wrap))
            .find(|candidate| has_event_label(*candidate));
        let Some(entry) = entry else { continue };

        let anchor = entry.select(&ANCHOR).next();
        let port = anchor
            .map(|a| clean_text(&stripped_text(a, "")))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_PORT.to_string());
        let link = anchor
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.trim().to_string())
            .unwrap_or_default();

        for kind in EventKind::ALL {
            let when_raw = value_after_label(entry, kind.label(), opts.value_hops);
            if !when_raw.is_empty() {
                events.push(RawEvent::new(kind, &port, &when_raw, &link));
            }
        }
    }
    events
}

fn find_section_root<'a>(document: &'a Html, opts: &ExtractOptions) -> Option<ElementRef<'a>> {
    // Wrappers around the heading match too. Try the deepest candidates
    // first and fall back outwards when one has nothing after it.
    let mut headings: Vec<ElementRef<'a>> =
        document.select(&HEADING).filter(|el| mentions_section(*el)).collect();
    headings.sort_by_key(|el| Reverse(el.ancestors().count()));
    let from_heading = headings
        .into_iter()
        .find_map(|heading| next_meaningful_sibling(heading, opts.heading_hops));
    if from_heading.is_some() {
        return from_heading;
    }

    // No heading: climb from the first arrival label to an element holding
    // at least two of them.
    let arrival = EventKind::Arrival.label();
    let label = document
        .root_element()
        .descendants()
        .find(|node| text_contains(node.value(), arrival))?;
    label
        .ancestors()
        .take(opts.ancestor_hops)
        .filter_map(ElementRef::wrap)
        .find(|el| {
            el.descendants()
                .filter(|node| text_contains(node.value(), arrival))
                .count()
                >= 2
        })
}

fn mentions_section(el: ElementRef<'_>) -> bool {
    stripped_text(el, " ").to_lowercase().contains(SECTION_HEADING)
}

/// First non-empty element among the next `hops + 1` siblings, starting at the
/// first element sibling.
fn next_meaningful_sibling(el: ElementRef<'_>, hops: usize) -> Option<ElementRef<'_>> {
    el.next_siblings()
        .skip_while(|node| !node.value().is_element())
        .take(hops + 1)
        .filter_map(ElementRef::wrap)
        .find(|sibling| !stripped_text(*sibling, "").is_empty())
}

fn has_event_label(el: ElementRef<'_>) -> bool {
    let text = stripped_text(el, " ").to_lowercase();
    EventKind::ALL.iter().any(|kind| text.contains(kind.label()))
}

fn value_after_label(entry: ElementRef<'_>, label: &str, hops: usize) -> String {
    entry
        .descendants()
        .find(|node| text_contains(node.value(), label))
        .and_then(|text| text.parent())
        .and_then(ElementRef::wrap)
        .and_then(|label_el| next_meaningful_sibling(label_el, hops))
        .map(|value| clean_text(&stripped_text(value, "")))
        .unwrap_or_default()
}

fn text_contains(node: &Node, needle: &str) -> bool {
    node.as_text()
        .is_some_and(|text| text.to_lowercase().contains(needle))
}

/// Text of all descendant text nodes, each trimmed, empty ones dropped.
fn stripped_text(el: ElementRef<'_>, sep: &str) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// NFKC-normalize and collapse whitespace so equal text compares equal.
pub fn clean_text(s: &str) -> String {
    let normalized = s.nfkc().collect::<String>();
    RE_WHITESPACE.replace_all(&normalized, " ").trim().to_string()
}
