//! Filename extraction and sanitization for downloads.

use std::path::{Component, Path};

use tracing::debug;
use url::Url;

/// Replaces characters that are invalid or dangerous in file names.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// File name from the last (percent-decoded) URL path segment.
///
/// Returns `None` when the path ends in `/` or is empty, or when nothing
/// usable is left after sanitizing.
pub(crate) fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }

    let decoded = urlencoding::decode(last).map_or_else(
        |e| {
            debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
            last.to_string()
        },
        std::borrow::Cow::into_owned,
    );

    let name = sanitize_filename(&decoded);
    if name.trim_matches('_').is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_removes_invalid_chars() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f"), "a_b_c_d_e_f");
        assert_eq!(sanitize_filename("ok-name.iso"), "ok-name.iso");
    }

    #[test]
    fn test_sanitize_filename_neutralizes_dot_segments() {
        assert_eq!(sanitize_filename(".."), "__");
        assert_eq!(sanitize_filename("."), "_");
    }

    #[test]
    fn test_filename_from_url_uses_last_segment() {
        let url = Url::parse("https://example.com/pub/50MB-TESTFILE.ORG.pdf").unwrap();
        assert_eq!(filename_from_url(&url).unwrap(), "50MB-TESTFILE.ORG.pdf");
    }

    #[test]
    fn test_filename_from_url_decodes_percent_encoding() {
        let url = Url::parse("https://example.com/files/my%20file.bin").unwrap();
        assert_eq!(filename_from_url(&url).unwrap(), "my file.bin");
    }

    #[test]
    fn test_filename_from_url_rejects_directory_paths() {
        let url = Url::parse("https://example.com/files/").unwrap();
        assert!(filename_from_url(&url).is_none());
        let url = Url::parse("https://example.com").unwrap();
        assert!(filename_from_url(&url).is_none());
    }

    #[test]
    fn test_filename_from_url_cannot_escape_directory() {
        let url = Url::parse("https://example.com/a/%2E%2E").unwrap();
        let name = filename_from_url(&url);
        assert!(name.is_none() || name.unwrap() != "..");
    }
}
