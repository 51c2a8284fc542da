//! HTML to plain text
//!
//! Parses the page with `scraper`, prefers the `<article>` or `<main>`
//! region when one exists, and drops script, style and navigation chrome.

use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose content is never page text
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "nav", "footer", "aside", "noscript", "header", "form", "template",
];

/// Elements that start a new line
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "br", "div", "section", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "td", "th", "dd", "dt", "table",
    "blockquote", "figcaption", "article", "main",
];

/// Content regions, most specific first
const CONTENT_REGIONS: &[&str] = &["article", "main", "body"];

/// Readable text of a page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageText {
    /// Contents of `<title>`, whitespace collapsed
    pub title: String,

    /// Body text, one block per line
    pub text: String,
}

/// Extract title and main text from an HTML document
///
/// # Examples
///
/// ```
/// use relicseek_search::html::extract_page_text;
///
/// let page = extract_page_text(
///     "<html><head><title>Bronze Horse</title></head>\
///      <body><nav>Home</nav><main><p>Cast in bronze.</p></main></body></html>",
/// );
/// assert_eq!(page.title, "Bronze Horse");
/// assert_eq!(page.text, "Cast in bronze.");
/// ```
pub fn extract_page_text(html: &str) -> PageText {
    let document = Html::parse_document(html);

    let title = first_match(&document, "title")
        .map(|title| compact_ws(&title.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default();

    let text = CONTENT_REGIONS
        .iter()
        .find_map(|region| first_match(&document, region))
        .map(|root| {
            let mut raw = String::new();
            collect_text(root, &mut raw);
            tidy_lines(&raw)
        })
        .unwrap_or_default();

    PageText { title, text }
}

fn first_match<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

/// Text under `element`, skipping non-content subtrees and breaking lines at blocks
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(nested) = ElementRef::wrap(child) {
                    collect_text(nested, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn compact_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace inside lines and drop blank lines
fn tidy_lines(text: &str) -> String {
    text.lines()
        .map(compact_ws)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate to at most `max_chars` characters, marking the cut with "..."
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
