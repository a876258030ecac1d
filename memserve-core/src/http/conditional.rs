//! Conditional GET and byte ranges
//!
//! Validation against a [`FileRecord`]: `If-None-Match`, `If-Modified-Since`,
//! `Range` and `If-Range`. Only single ranges are served; anything fancier is
//! ignored and the full body goes out.

use hyper::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, RANGE};
use hyper::Request;
use std::ops::Range;

use crate::store::FileRecord;

/// Whether the client's cached copy is still current.
///
/// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted
/// when it is absent.
pub fn is_not_modified<T>(req: &Request<T>, record: &FileRecord) -> bool {
    if let Some(value) = req.headers().get(IF_NONE_MATCH) {
        return value.to_str().map(|v| etag_matches(v, &record.etag())).unwrap_or(false);
    }

    req.headers()
        .get(IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok())
        .map(|since| record.modified_seconds() <= since)
        .unwrap_or(false)
}

/// Weak comparison of an `If-None-Match` list against `etag`.
pub fn etag_matches(header: &str, etag: &str) -> bool {
    let header = header.trim();
    if header == "*" {
        return true;
    }
    let ours = strip_weak(etag);
    header.split(',').any(|candidate| strip_weak(candidate.trim()) == ours)
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag).trim_matches('"')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable range: send the whole body
    Full,
    Partial(Range<usize>),
    Unsatisfiable,
}

/// Evaluate `Range` (and `If-Range`) for a record.
pub fn requested_range<T>(req: &Request<T>, record: &FileRecord) -> RangeOutcome {
    let Some(range) = req.headers().get(RANGE).and_then(|v| v.to_str().ok()) else {
        return RangeOutcome::Full;
    };

    if let Some(value) = req.headers().get(IF_RANGE) {
        let current = value.to_str().map(|v| if_range_matches(v, record)).unwrap_or(false);
        if !current {
            return RangeOutcome::Full;
        }
    }

    parse_range(range, record.len())
}

// Entity tags here are weak and If-Range needs a strong match, so only a date
// can ever validate.
fn if_range_matches(value: &str, record: &FileRecord) -> bool {
    let value = value.trim();
    if value.starts_with("W/") || value.starts_with('"') {
        return false;
    }
    httpdate::parse_http_date(value)
        .map(|date| date == record.modified_seconds())
        .unwrap_or(false)
}

/// Parse a single `bytes=` range against a body of `len` bytes.
///
/// Multiple ranges and malformed headers yield [`RangeOutcome::Full`].
pub fn parse_range(header: &str, len: usize) -> RangeOutcome {
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return RangeOutcome::Full;
    };
    if spec.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((start, end)) = spec.trim().split_once('-') else {
        return RangeOutcome::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        // Suffix range: the last N bytes
        let Ok(suffix) = end.parse::<usize>() else {
            return RangeOutcome::Full;
        };
        if suffix == 0 || len == 0 {
            return RangeOutcome::Unsatisfiable;
        }
        return RangeOutcome::Partial(len - suffix.min(len)..len);
    }

    let Ok(start) = start.parse::<usize>() else {
        return RangeOutcome::Full;
    };
    let end = if end.is_empty() {
        None
    } else {
        match end.parse::<usize>() {
            Ok(end) if end >= start => Some(end),
            _ => return RangeOutcome::Full,
        }
    };

    if start >= len {
        return RangeOutcome::Unsatisfiable;
    }
    let last = end.map_or(len - 1, |end| end.min(len - 1));
    RangeOutcome::Partial(start..last + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn record() -> FileRecord {
        let loaded = UNIX_EPOCH + Duration::from_millis(784_111_777_250);
        FileRecord::new("/index.html", "<h1>Home</h1>", loaded)
    }

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/index.html");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_if_none_match() {
        let record = record();
        let etag = record.etag();
        assert!(is_not_modified(&request(&[("if-none-match", etag.as_str())]), &record));
        assert!(is_not_modified(&request(&[("if-none-match", "*")]), &record));

        let strong = etag.trim_start_matches("W/").to_string();
        let list = format!("\"other\", {strong}");
        assert!(is_not_modified(&request(&[("if-none-match", list.as_str())]), &record));
        assert!(!is_not_modified(&request(&[("if-none-match", "\"other\"")]), &record));
    }

    #[test]
    fn test_if_none_match_wins_over_if_modified_since() {
        let record = record();
        let req = request(&[
            ("if-none-match", "\"stale\""),
            ("if-modified-since", "Sun, 06 Nov 1994 08:49:37 GMT"),
        ]);
        assert!(!is_not_modified(&req, &record));
    }

    #[test]
    fn test_if_modified_since_truncates_to_seconds() {
        let record = record();
        assert!(is_not_modified(
            &request(&[("if-modified-since", "Sun, 06 Nov 1994 08:49:37 GMT")]),
            &record
        ));
        assert!(is_not_modified(
            &request(&[("if-modified-since", "Mon, 07 Nov 1994 00:00:00 GMT")]),
            &record
        ));
        assert!(!is_not_modified(
            &request(&[("if-modified-since", "Sun, 06 Nov 1994 08:49:36 GMT")]),
            &record
        ));
        assert!(!is_not_modified(&request(&[("if-modified-since", "garbage")]), &record));
        assert!(!is_not_modified(&request(&[]), &record));
    }

    #[test]
    fn test_parse_range_forms() {
        assert_eq!(parse_range("bytes=0-3", 13), RangeOutcome::Partial(0..4));
        assert_eq!(parse_range("bytes=4-", 13), RangeOutcome::Partial(4..13));
        assert_eq!(parse_range("bytes=-5", 13), RangeOutcome::Partial(8..13));
        assert_eq!(parse_range("bytes=-50", 13), RangeOutcome::Partial(0..13));
        assert_eq!(parse_range("bytes=10-99", 13), RangeOutcome::Partial(10..13));
    }

    #[test]
    fn test_parse_range_rejections() {
        assert_eq!(parse_range("bytes=13-", 13), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range("bytes=-0", 13), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range("bytes=0-1,4-5", 13), RangeOutcome::Full);
        assert_eq!(parse_range("bytes=5-2", 13), RangeOutcome::Full);
        assert_eq!(parse_range("items=0-1", 13), RangeOutcome::Full);
        assert_eq!(parse_range("bytes=a-b", 13), RangeOutcome::Full);
    }

    #[test]
    fn test_if_range() {
        let record = record();
        let by_date = request(&[
            ("range", "bytes=0-3"),
            ("if-range", "Sun, 06 Nov 1994 08:49:37 GMT"),
        ]);
        assert_eq!(requested_range(&by_date, &record), RangeOutcome::Partial(0..4));

        let stale = request(&[
            ("range", "bytes=0-3"),
            ("if-range", "Sat, 05 Nov 1994 08:49:37 GMT"),
        ]);
        assert_eq!(requested_range(&stale, &record), RangeOutcome::Full);

        let etag = record.etag();
        let by_etag = request(&[("range", "bytes=0-3"), ("if-range", etag.as_str())]);
        assert_eq!(requested_range(&by_etag, &record), RangeOutcome::Full);
    }
}
