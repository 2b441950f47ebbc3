//! URI helpers for file-backed resources.
//!
//! Asset ids of file-backed kinds are URIs. Only the small subset needed for
//! proxy naming is handled here: validation, `file://` conversion and
//! basename/directory manipulation.

use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Whether `candidate` is a syntactically valid URI.
///
/// Requires a scheme of at least two characters (so `C:\` paths are not
/// mistaken for URIs) followed by `:` and a non-empty remainder.
pub fn is_valid_uri(candidate: &str) -> bool {
    let Some((scheme, rest)) = candidate.split_once(':') else {
        return false;
    };
    scheme.len() >= 2
        && !rest.is_empty()
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Convert a `file://` URI into a filesystem path.
pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    let rest = uri.strip_prefix(FILE_SCHEME)?;
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    if !rest.starts_with('/') {
        return None;
    }
    percent_decode(rest).map(PathBuf::from)
}

/// Convert an absolute filesystem path into a `file://` URI.
pub fn path_to_file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut uri = String::with_capacity(FILE_SCHEME.len() + raw.len() + 1);
    uri.push_str(FILE_SCHEME);
    if !raw.starts_with('/') {
        uri.push('/');
    }
    for c in raw.chars() {
        match c {
            ' ' => uri.push_str("%20"),
            '%' => uri.push_str("%25"),
            '#' => uri.push_str("%23"),
            '?' => uri.push_str("%3F"),
            _ => uri.push(c),
        }
    }
    uri
}

/// Accept either a URI or a plain path, returning a URI.
pub fn to_uri(location: &str) -> String {
    if is_valid_uri(location) {
        location.to_string()
    } else {
        path_to_file_uri(Path::new(location))
    }
}

/// Last path segment of a URI.
pub fn basename(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Everything up to and including the last `/` of a URI.
pub fn directory(uri: &str) -> &str {
    match uri.rfind('/') {
        Some(index) => &uri[..=index],
        None => "",
    }
}

/// Append `name` to a directory URI, inserting a separator when needed.
pub fn join(directory_uri: &str, name: &str) -> String {
    if directory_uri.ends_with('/') {
        format!("{directory_uri}{name}")
    } else {
        format!("{directory_uri}/{name}")
    }
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
