use sha2::{Digest, Sha256};
use url::Url;

const MAX_STEM_LEN: usize = 200;

/// Local file name for a downloaded PDF, derived from the URL's last path
/// segment: `https://x/docs/Annual%20Report.pdf?v=2` -> `Annual_Report.pdf`.
///
/// URLs without a usable segment fall back to `document-{short_hash(url)}.pdf`.
pub fn destination_file_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    let mut stem = sanitize(&decoded);
    if stem.to_ascii_lowercase().ends_with(".pdf") {
        stem.truncate(stem.len() - ".pdf".len());
    }
    stem = stem.trim_matches(&['_', '.'][..]).to_string();
    if stem.is_empty() {
        return format!("document-{}.pdf", short_hash(url.as_str()));
    }
    if stem.len() > MAX_STEM_LEN {
        stem.truncate(MAX_STEM_LEN);
    }
    if is_reserved_windows_name(&stem) {
        stem.push('_');
    }
    format!("{stem}.pdf")
}

fn sanitize(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(4).map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(url: &str) -> String {
        destination_file_name(&Url::parse(url).unwrap())
    }

    #[test]
    fn keeps_plain_names() {
        assert_eq!(name("https://example.com/files/report-2024.pdf"), "report-2024.pdf");
    }

    #[test]
    fn decodes_and_sanitizes() {
        assert_eq!(
            name("https://example.com/docs/Annual%20Report%20(final).pdf?v=2"),
            "Annual_Report__final.pdf"
        );
    }

    #[test]
    fn normalizes_extension_case_and_appends_missing() {
        assert_eq!(name("https://example.com/A.PDF"), "A.pdf");
        assert_eq!(name("https://example.com/download/123"), "123.pdf");
    }

    #[test]
    fn empty_segment_falls_back_to_hash() {
        let first = name("https://example.com/");
        assert!(first.starts_with("document-"));
        assert!(first.ends_with(".pdf"));
        assert_eq!(first.len(), "document-".len() + 8 + ".pdf".len());
        assert_eq!(first, name("https://example.com/"));
        assert_ne!(first, name("https://example.org/"));
    }

    #[test]
    fn reserved_names_are_patched() {
        assert_eq!(name("https://example.com/con.pdf"), "con_.pdf");
    }
}
