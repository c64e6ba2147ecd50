//! Static extension <-> MIME type lookups.
//!
//! Both directions are partial: a miss yields `None` and callers decide
//! whether to drop the entry or surface it.

/// Extensions preferred when reverse-mapping common MIME types. Everything
/// else falls back to the first extension `mime_guess` lists for the type.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("application/gzip", "gz"),
    ("application/javascript", "js"),
    ("application/json", "json"),
    ("application/octet-stream", "bin"),
    ("application/pdf", "pdf"),
    ("application/xml", "xml"),
    ("application/zip", "zip"),
    ("audio/mpeg", "mp3"),
    ("image/gif", "gif"),
    ("image/jpeg", "jpeg"),
    ("image/png", "png"),
    ("image/svg+xml", "svg"),
    ("image/webp", "webp"),
    ("text/css", "css"),
    ("text/csv", "csv"),
    ("text/html", "html"),
    ("text/javascript", "js"),
    ("text/plain", "txt"),
    ("video/mp4", "mp4"),
];

/// Returns the canonical MIME type for a file extension.
///
/// A leading dot is ignored and matching is case-insensitive.
pub fn mime_for_extension(extension: &str) -> Option<String> {
    let extension = extension.trim().trim_start_matches('.');
    if extension.is_empty() {
        return None;
    }

    mime_guess::from_ext(&extension.to_ascii_lowercase())
        .first()
        .map(|mime| mime.essence_str().to_owned())
}

/// Returns the preferred file extension for a MIME type.
///
/// Parameters such as `; charset=utf-8` are ignored.
pub fn extension_for_mime(content_type: &str) -> Option<String> {
    let essence = essence_of(content_type)?;

    if let Some((_, ext)) = PREFERRED_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == essence.as_str())
    {
        return Some((*ext).to_owned());
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|extensions| extensions.first())
        .map(|ext| (*ext).to_owned())
}

/// Returns every extension known for a MIME type.
pub fn extensions_for_mime(content_type: &str) -> Vec<String> {
    let Some(essence) = essence_of(content_type) else {
        return Vec::new();
    };

    mime_guess::get_mime_extensions_str(&essence)
        .map(|extensions| extensions.iter().map(|ext| (*ext).to_owned()).collect())
        .unwrap_or_default()
}

/// Normalizes a content type to its lowercase `type/subtype` essence.
pub(crate) fn essence_of(content_type: &str) -> Option<String> {
    content_type
        .parse::<mime::Mime>()
        .ok()
        .map(|mime| mime.essence_str().to_ascii_lowercase())
}
