use crate::chunking::normalize_whitespace;
use crate::error::CrawlError;
use lopdf::Document;
use scraper::{Html, Node};
use tracing::warn;
use url::Url;

const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];
const NOT_FOUND_MARKER: &str = "page not found";

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Links found on one page, resolved to absolute URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    /// Every resolved href in page order, before any filtering.
    pub all: Vec<String>,
    pub pages: Vec<String>,
    pub documents: Vec<String>,
}

pub trait PdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, CrawlError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, CrawlError> {
        let document =
            Document::load_mem(bytes).map_err(|error| CrawlError::Pdf(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            match document.extract_text(&[page_no]) {
                Ok(text) if !text.trim().is_empty() => pages.push(PageText {
                    number: page_no,
                    text,
                }),
                Ok(_) => {}
                Err(error) => warn!(page = page_no, %error, "skipping unreadable pdf page"),
            }
        }

        Ok(pages)
    }
}

/// Concatenated text of every readable page.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, CrawlError> {
    let pages = LopdfExtractor.extract_pages(bytes)?;
    if pages.is_empty() {
        return Err(CrawlError::Pdf("pdf had no readable page text".to_string()));
    }
    Ok(pages
        .into_iter()
        .map(|page| page.text)
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Trims whitespace, drops the fragment and any trailing slash.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
    without_fragment.trim_end_matches('/').to_string()
}

pub fn is_document_link(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}

pub fn extract_links(html: &str, base: &Url) -> PageLinks {
    let document = Html::parse_document(html);
    let mut links = PageLinks::default();

    for node in document.root_element().descendants() {
        let Some(element) = node.value().as_element() else {
            continue;
        };
        if element.name() != "a" {
            continue;
        }
        let Some(href) = element.attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_href(href, base) else {
            continue;
        };

        let normalized = normalize_url(resolved.as_str());
        if is_document_link(&resolved) {
            links.documents.push(normalized.clone());
        } else {
            links.pages.push(normalized.clone());
        }
        links.all.push(normalized);
    }

    links
}

fn resolve_href(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

/// Visible text of a page, or `None` when the page is empty or a
/// "not found" page. Repeated neighbouring fragments (menus, footers
/// rendered twice) are collapsed.
pub fn extract_page_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let mut fragments: Vec<String> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|element| element.name()))
            .is_some_and(|name| SKIPPED_ELEMENTS.contains(&name));
        if hidden {
            continue;
        }

        let fragment = normalize_whitespace(text);
        if fragment.chars().count() <= 1 || !fragment.contains(' ') {
            continue;
        }
        if fragments.last() == Some(&fragment) {
            continue;
        }
        fragments.push(fragment);
    }

    let text = fragments.join("\n");
    if text.is_empty() || text.to_lowercase().contains(NOT_FOUND_MARKER) {
        return None;
    }
    Some(text)
}

/// Builds a PDF with one text line per page.
#[cfg(test)]
pub(crate) fn sample_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for line in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = document.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encodable content"),
        ));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    document.save_to(&mut bytes).expect("pdf written");
    bytes
}
