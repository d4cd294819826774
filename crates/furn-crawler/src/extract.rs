//! Text and link extraction from parsed pages.

use reqwest::Url;
use select::document::Document;
use select::node::Node;
use select::predicate::{Name, Predicate, Text};

/// Elements whose text is never shown to a reader.
const HIDDEN: [&str; 4] = ["script", "style", "noscript", "template"];

/// Text of every `h1`..`h6` in document order, one space between headings.
///
/// Text pieces inside one heading are trimmed and glued without a separator,
/// so `Bedroom <span>Furniture</span>` reads `BedroomFurniture`.
pub fn heading_text(document: &Document) -> String {
    let headings = Name("h1")
        .or(Name("h2"))
        .or(Name("h3"))
        .or(Name("h4"))
        .or(Name("h5"))
        .or(Name("h6"));

    document
        .find(headings)
        .map(|heading| glued_text(&heading))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Visible text of the whole page, each text node trimmed and joined by a space.
pub fn page_text(document: &Document) -> String {
    document
        .find(Text)
        .filter(|node| !is_hidden(node))
        .filter_map(|node| node.as_text().map(str::trim))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Absolute http(s) targets of every `<a href>`, resolved against `base`.
pub fn links(document: &Document, base: &Url) -> Vec<Url> {
    document
        .find(Name("a"))
        .filter_map(|a| a.attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .collect()
}

/// Host and explicit port, the part of a URL compared for same-origin links.
pub fn network_location(url: &Url) -> (Option<&str>, Option<u16>) {
    (url.host_str(), url.port())
}

fn glued_text(node: &Node) -> String {
    node.descendants()
        .filter_map(|n| n.as_text().map(str::trim))
        .collect()
}

fn is_hidden(node: &Node) -> bool {
    let mut parent = node.parent();
    while let Some(p) = parent {
        if p.name().is_some_and(|name| HIDDEN.contains(&name)) {
            return true;
        }
        parent = p.parent();
    }
    false
}
