//! Content type detection
//!
//! Extension first (via `mime_guess`), then a look at the leading bytes for
//! files whose name says nothing, such as `CNAME`, `_redirects` or
//! extension-less pretty URLs emitted by the site generator.

/// How many leading bytes are inspected when sniffing
const SNIFF_LEN: usize = 512;

/// Detect the `Content-Type` header value for a file.
pub fn detect_content_type(name: &str, content: &[u8]) -> String {
    let essence = match mime_guess::from_path(name).first() {
        Some(mime) => mime.essence_str().to_string(),
        None => sniff(content).to_string(),
    };
    with_charset(essence)
}

fn with_charset(essence: String) -> String {
    let textual = essence.starts_with("text/")
        || matches!(
            essence.as_str(),
            "application/javascript" | "application/json" | "application/xml"
        );
    if textual {
        format!("{essence}; charset=utf-8")
    } else {
        essence
    }
}

const MAGIC: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"\x1f\x8b\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00asm", "application/wasm"),
];

// Tags that mark a document as HTML when they open it, followed by a space or `>`
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Guess a MIME essence from the leading bytes of a file.
pub fn sniff(content: &[u8]) -> &'static str {
    let head = &content[..content.len().min(SNIFF_LEN)];

    for &(magic, mime) in MAGIC {
        if head.starts_with(magic) {
            return mime;
        }
    }
    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return "image/webp";
    }

    let trimmed = trim_leading_whitespace(head);
    if HTML_TAGS.iter().any(|tag| opens_with_tag(trimmed, tag)) {
        return "text/html";
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml";
    }

    if head.is_empty() || looks_textual(head) {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

fn trim_leading_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn opens_with_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() || !data[..tag.len()].eq_ignore_ascii_case(tag) {
        return false;
    }
    matches!(data[tag.len()], b' ' | b'>')
}

fn looks_textual(head: &[u8]) -> bool {
    let binary = head
        .iter()
        .any(|b| *b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b'\x1b'));
    // A multi-byte sequence may be cut at the sniff boundary
    !binary
        && match std::str::from_utf8(head) {
            Ok(_) => true,
            Err(e) => e.error_len().is_none(),
        }
}
