//! URL path canonicalization
//!
//! Both sides of a lookup go through this module: the store builder when it
//! turns a filesystem path into a key, and the request handler when it turns
//! a request path into one. Segments are escaped the same way on both sides,
//! so a file named `a b.html` is found by a request for `/a%20b.html`.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

/// File served for directory requests
pub const INDEX_FILE: &str = "index.html";

const INDEX_SUFFIX: &str = "/index.html";

fn is_stripped(c: char) -> bool {
    (c as u32) < 0x20 || c == '\u{7f}'
}

/// Remove control characters (below U+0020, plus DEL).
///
/// Keeps crafted paths from injecting newlines into access logs or headers.
pub fn strip_control(s: &str) -> Cow<'_, str> {
    if s.chars().any(is_stripped) {
        Cow::Owned(s.chars().filter(|c| !is_stripped(*c)).collect())
    } else {
        Cow::Borrowed(s)
    }
}

fn push_segment(out: &mut String, segment: &str) {
    out.push('/');
    out.push_str(&urlencoding::encode(&strip_control(segment)));
}

/// Turn a raw request path into a canonical lookup key.
///
/// Percent-decodes, drops control characters, then re-escapes every segment
/// while keeping `/` as the separator. The result always starts with `/`.
/// `..` segments are kept as-is: no key in the store contains one, so they
/// simply miss.
pub fn sanitize_path(raw: &str) -> String {
    let decoded = urlencoding::decode_binary(raw.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);

    let mut out = String::with_capacity(decoded.len() + 1);
    for segment in decoded.trim_start_matches('/').split('/') {
        push_segment(&mut out, segment);
    }
    out
}

/// Canonical URL path for a file or directory below `root`.
///
/// Directories get a trailing slash (`/`, `/post/`). Returns `None` when
/// `path` is not below `root` or contains `..`/prefix components.
pub fn url_path_for(root: &Path, path: &Path, is_dir: bool) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;

    let mut out = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => push_segment(&mut out, &name.to_string_lossy()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if is_dir || out.is_empty() {
        out.push('/');
    }
    Some(out)
}

/// Map a canonical key back to a root-relative filesystem path.
///
/// Used by the disk pass-through store. Refuses `.` and `..` segments since
/// that store touches the filesystem on every request.
pub fn key_to_relative(key: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in key.trim_start_matches('/').split('/') {
        if segment.is_empty() {
            continue;
        }
        let decoded = urlencoding::decode(segment).ok()?;
        if decoded == "." || decoded == ".." || decoded.contains(['/', '\\']) {
            return None;
        }
        relative.push(decoded.as_ref());
    }
    Some(relative)
}

/// Store keys to try for one request, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub primary: String,
    pub fallback: Option<String>,
}

impl Resolution {
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallback.as_deref())
    }
}

/// Apply the directory-index rule to a normalized path.
///
/// - `/post/` resolves to the directory record `/post/`, then `/post/index.html`.
/// - `/post` resolves to `/post`, then `/post/index.html`.
/// - `/post/index.html` resolves to itself only.
///
/// The memory store registers each directory's `index.html` under the
/// directory key, so a trailing-slash request hits on the first try. Stores
/// without directory records (disk) answer through the fallback.
pub fn resolve(normalized: &str) -> Resolution {
    if normalized.ends_with('/') {
        return Resolution {
            primary: normalized.to_string(),
            fallback: Some(format!("{normalized}{INDEX_FILE}")),
        };
    }

    let fallback = if normalized.ends_with(INDEX_SUFFIX) {
        None
    } else {
        Some(format!("{normalized}{INDEX_SUFFIX}"))
    };
    Resolution { primary: normalized.to_string(), fallback }
}
