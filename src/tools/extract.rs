//! Readable-content extraction from retrieved HTML
//!
//! Extraction is a pure function of the page URL and body. The main text is
//! taken from the first candidate content region (`main`, `article`, common
//! content classes), falling back to `<body>`, after skipping non-content
//! elements. Only lines longer than a minimum length are kept.

use crate::types::{ContentMetadata, ImageInfo, PageContent};
use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose text never counts as page content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "footer", "header", "noscript"];

/// Candidate content regions, in priority order.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    ".content",
    ".main-content",
    ".post-content",
    ".entry-content",
    "#content",
    ".container",
];

const AUTHOR_SELECTORS: &[&str] = &[
    r#"meta[name="author"]"#,
    r#"meta[property="article:author"]"#,
    ".author",
    ".by-author",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    r#"meta[name="description"]"#,
    r#"meta[property="og:description"]"#,
];

const DATE_SELECTORS: &[&str] = &[
    r#"meta[property="article:published_time"]"#,
    r#"meta[name="date"]"#,
    "time[datetime]",
    ".date",
    ".publish-date",
];

const MAX_IMAGES: usize = 10;
const SUMMARY_CHARS: usize = 200;

/// Tunables for [`extract`].
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Lines with this many chars or fewer are dropped
    pub min_line_chars: usize,
    /// Extracted text longer than this is cut and suffixed with `...`
    pub max_content_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_line_chars: 10,
            max_content_chars: 1_000_000,
        }
    }
}

/// Extract readable content from an HTML document.
pub fn extract(url: &str, html: &str, options: ExtractOptions) -> PageContent {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let mut content = extract_main_text(&document, options.min_line_chars);

    if content.chars().count() > options.max_content_chars {
        content = content.chars().take(options.max_content_chars).collect();
        content.push_str("...");
    }

    let summary = summarize(&content);

    PageContent {
        url: url.to_string(),
        title,
        summary,
        metadata: extract_metadata(&document),
        images: extract_images(&document, url),
        content,
    }
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    Selector::parse(selector)
        .ok()
        .and_then(|s| document.select(&s).next())
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn extract_title(document: &Html) -> String {
    // Priority: <title> → og:title → <h1>
    if let Some(title) =
        select_first(document, "title").and_then(|el| non_empty(&el.text().collect::<String>()))
    {
        return title;
    }

    if let Some(title) = select_first(document, r#"meta[property="og:title"]"#)
        .and_then(|el| el.value().attr("content").and_then(non_empty))
    {
        return title;
    }

    select_first(document, "h1")
        .and_then(|el| non_empty(&el.text().collect::<String>()))
        .unwrap_or_default()
}

fn is_skipped(element: &ElementRef<'_>) -> bool {
    SKIPPED_ELEMENTS.contains(&element.value().name())
}

/// Whether `element` or one of its ancestors is a non-content element.
fn inside_skipped(element: &ElementRef<'_>) -> bool {
    is_skipped(element)
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| is_skipped(&ancestor))
}

/// Stripped text nodes of `root`, ignoring non-content subtrees, one per line.
fn region_text(root: ElementRef<'_>) -> String {
    let mut lines = Vec::new();
    let mut stack: Vec<_> = root.children().collect();
    stack.reverse();

    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    lines.push(text.to_string());
                }
            }
            Node::Element(element) => {
                if SKIPPED_ELEMENTS.contains(&element.name()) {
                    continue;
                }
                let mut children: Vec<_> = node.children().collect();
                children.reverse();
                stack.extend(children);
            }
            _ => {}
        }
    }

    lines.join("\n")
}

fn extract_main_text(document: &Html, min_line_chars: usize) -> String {
    let region = CONTENT_SELECTORS.iter().find_map(|selector| {
        Selector::parse(selector).ok().and_then(|s| {
            document
                .select(&s)
                .find(|el| !inside_skipped(el))
        })
    });

    let mut text = region.map(region_text).unwrap_or_default();
    if text.is_empty() {
        text = select_first(document, "body")
            .map(region_text)
            .unwrap_or_default();
    }

    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > min_line_chars)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn extract_metadata(document: &Html) -> ContentMetadata {
    let mut metadata = ContentMetadata::default();

    for selector in AUTHOR_SELECTORS {
        if let Some(el) = select_first(document, selector) {
            metadata.author = if el.value().name() == "meta" {
                el.value().attr("content").and_then(non_empty)
            } else {
                non_empty(&el.text().collect::<String>())
            };
            break;
        }
    }

    for selector in DESCRIPTION_SELECTORS {
        if let Some(el) = select_first(document, selector) {
            metadata.description = el.value().attr("content").and_then(non_empty);
            break;
        }
    }

    if let Some(el) = select_first(document, r#"meta[name="keywords"]"#) {
        metadata.keywords = el
            .value()
            .attr("content")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
    }

    for selector in DATE_SELECTORS {
        if let Some(el) = select_first(document, selector) {
            metadata.publish_date = match el.value().name() {
                "meta" => el.value().attr("content").and_then(non_empty),
                "time" => el.value().attr("datetime").and_then(non_empty),
                _ => non_empty(&el.text().collect::<String>()),
            };
            break;
        }
    }

    metadata
}

fn extract_images(document: &Html, page_url: &str) -> Vec<ImageInfo> {
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };
    let base = reqwest::Url::parse(page_url).ok();

    document
        .select(&selector)
        .take(MAX_IMAGES)
        .filter_map(|img| {
            let src = img.value().attr("src")?.trim();
            if src.is_empty() {
                return None;
            }
            let url = match &base {
                Some(base) => base.join(src).map(|u| u.to_string()).unwrap_or_else(|_| src.to_string()),
                None => src.to_string(),
            };
            Some(ImageInfo {
                url,
                alt: img.value().attr("alt").map(str::to_string),
                width: img.value().attr("width").and_then(|w| w.trim().parse().ok()),
                height: img.value().attr("height").and_then(|h| h.trim().parse().ok()),
            })
        })
        .collect()
}

/// Leading sentences of `content`, up to roughly [`SUMMARY_CHARS`] chars.
fn summarize(content: &str) -> String {
    if content.chars().count() <= SUMMARY_CHARS {
        return content.to_string();
    }

    let delimiter = if content.contains('。') { '。' } else { '.' };

    let mut summary = String::new();
    let mut length = 0;
    for sentence in content.split(delimiter) {
        let sentence_len = sentence.chars().count();
        if length + sentence_len > SUMMARY_CHARS {
            break;
        }
        summary.push_str(sentence);
        summary.push(delimiter);
        length += sentence_len + 1;
    }

    summary.trim().to_string()
}
