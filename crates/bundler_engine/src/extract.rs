use bundler_core::PdfRef;
use engine_logging::{engine_debug, engine_info};
use url::Url;

use crate::decode::decode_page;
use crate::fetch::Fetcher;
use crate::links::PdfLinkExtractor;
use crate::{FailureKind, FetchError, StageError};

/// Fetch `page_url` and return the PDF links it contains.
///
/// A page that cannot be fetched is fatal for the stage; a page without PDF
/// links is not.
pub async fn find_pdf_links(
    fetcher: &dyn Fetcher,
    extractor: &PdfLinkExtractor,
    page_url: &str,
) -> Result<Vec<PdfRef>, StageError> {
    let page_error = |source: FetchError| StageError::Page {
        url: page_url.to_string(),
        source,
    };

    engine_info!("Fetching {}", page_url);
    let output = fetcher.fetch_page(page_url).await.map_err(page_error)?;

    // Relative links resolve against wherever redirects ended up.
    let base = Url::parse(&output.metadata.final_url)
        .map_err(|err| page_error(FetchError::new(FailureKind::InvalidUrl, err.to_string())))?;
    let page = decode_page(&output.bytes, output.metadata.content_type.as_deref());
    engine_debug!(
        "Decoded {} bytes from {} as {}",
        output.metadata.byte_len,
        base,
        page.encoding_label
    );

    let links = extractor.extract_refs(&page.html, &base);
    engine_info!("Found {} unique PDF links on {}", links.len(), base);
    Ok(links)
}
