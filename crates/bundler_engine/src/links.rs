use std::collections::HashSet;

use bundler_core::PdfRef;
use scraper::{Html, Selector};
use url::Url;

const DEFAULT_MAX_LINKS: usize = 5_000;

/// Pulls `.pdf` hyperlinks out of one HTML document.
pub struct PdfLinkExtractor {
    max_links_per_page: usize,
}

impl PdfLinkExtractor {
    pub fn new() -> Self {
        Self::with_max_links(DEFAULT_MAX_LINKS)
    }

    pub fn with_max_links(max_links_per_page: usize) -> Self {
        Self { max_links_per_page }
    }

    /// Absolute PDF URLs in order of first appearance, without duplicates.
    ///
    /// Relative targets resolve against `<base href>` when present, else
    /// against `page_url`.
    pub fn extract(&self, html: &str, page_url: &Url) -> Vec<Url> {
        let document = Html::parse_document(html);
        let base = document_base(&document, page_url);

        let Ok(anchors) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for anchor in document.select(&anchors) {
            if links.len() >= self.max_links_per_page {
                break;
            }
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(mut url) = resolve_url(href, &base) else {
                continue;
            };
            if !is_pdf_path(&url) {
                continue;
            }
            url.set_fragment(None);
            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }
        links
    }

    pub fn extract_refs(&self, html: &str, page_url: &Url) -> Vec<PdfRef> {
        self.extract(html, page_url)
            .into_iter()
            .map(PdfRef::remote)
            .collect()
    }
}

impl Default for PdfLinkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn resolve_url(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("mailto:") {
        return None;
    }
    let url = base.join(trimmed).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn is_pdf_path(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}
