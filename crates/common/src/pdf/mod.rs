//! PDF inspection and text extraction.
//!
//! Extraction is best-effort: a scanned or malformed PDF yields no text
//! rather than an error, and callers fall back to other full-text
//! sources. Content sniffing goes by magic bytes, never by the
//! caller-supplied MIME type.

use md5::{Digest, Md5};
use tracing::{debug, warn};

/// True when the bytes start with the PDF magic
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Hex MD5 of the raw bytes, recorded as the content checksum
pub fn content_md5(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Number of pages, or None when the document cannot be parsed
pub fn page_count(bytes: &[u8]) -> Option<usize> {
    let doc = lopdf::Document::load_mem(bytes).ok()?;
    Some(doc.get_pages().len())
}

/// Best-effort text extraction across all pages.
///
/// Pages that fail to parse are skipped; returns None when nothing
/// usable comes out.
pub fn extract_text(bytes: &[u8]) -> Option<String> {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(error = %e, "PDF could not be parsed, no text extracted");
            return None;
        }
    };

    let mut text = String::new();
    for (page_num, page_id) in doc.get_pages() {
        match doc.get_page_content(page_id) {
            Ok(content) => {
                text.push_str(&text_from_content(&content));
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Skipping unreadable PDF page");
            }
        }
    }

    let cleaned = clean_text(&text);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Pull shown text out of a content stream, scanning BT/ET blocks for
/// the Tj/TJ/quote operators
fn text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content_str.lines() {
        let trimmed = line.trim();
        match trimmed {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                text.push(' ');
            }
            _ if in_text_block => {
                if let Some(shown) = text_from_operator(trimmed) {
                    text.push_str(&shown);
                }
            }
            _ => {}
        }
    }
    text
}

fn text_from_operator(line: &str) -> Option<String> {
    // (text) Tj and the ' / " show operators
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        let start = line.find('(')?;
        let end = line.rfind(')')?;
        if start < end {
            return Some(decode_pdf_string(&line[start + 1..end]));
        }
        return None;
    }

    // [(a) -12 (b)] TJ arrays
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut current = String::new();
        let mut in_paren = false;
        let mut escaped = false;
        for ch in line.chars() {
            if in_paren {
                if escaped {
                    current.push(ch);
                    escaped = false;
                } else if ch == '\\' {
                    current.push(ch);
                    escaped = true;
                } else if ch == ')' {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                } else {
                    current.push(ch);
                }
            } else if ch == '(' {
                in_paren = true;
            }
        }
        if !result.is_empty() {
            return Some(result);
        }
    }
    None
}

fn decode_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }
    result
}

/// Collapse whitespace runs and strip BOM artifacts
fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .filter(|w| *w != "\u{FEFF}")
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{FEFF}', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf_by_magic() {
        assert!(is_pdf(b"%PDF-1.7 rest of file"));
        assert!(!is_pdf(b"<html>not a pdf</html>"));
        assert!(!is_pdf(b""));
    }

    #[test]
    fn test_content_md5() {
        assert_eq!(content_md5(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_extract_text_garbage_is_none() {
        assert!(extract_text(b"not a pdf at all").is_none());
    }

    #[test]
    fn test_text_from_operator() {
        assert_eq!(text_from_operator("(Hello) Tj").as_deref(), Some("Hello"));
        assert_eq!(
            text_from_operator("[(Hel) -20 (lo)] TJ").as_deref(),
            Some("Hello")
        );
        assert_eq!(
            text_from_operator("(Paren \\(x\\)) Tj").as_deref(),
            Some("Paren (x)")
        );
        assert!(text_from_operator("1 0 0 1 50 700 Tm").is_none());
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("Hello   World\n\nAgain"), "Hello World Again");
    }
}
