//! Static extension → MIME type table used when publishing extracted files.

/// Content type used for any extension missing from [`CONTENT_TYPES`].
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Lookup table keyed by extension, leading dot included.
const CONTENT_TYPES: &[(&str, &str)] = &[
    (".html", "text/html"),
    (".htm", "text/html"),
    (".css", "text/css"),
    (".js", "application/javascript"),
    (".json", "application/json"),
    (".txt", "text/plain"),
    (".csv", "text/csv"),
    (".xml", "application/xml"),
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".gif", "image/gif"),
    (".svg", "image/svg+xml"),
    (".ico", "image/x-icon"),
    (".webp", "image/webp"),
    (".pdf", "application/pdf"),
    (".zip", "application/zip"),
    (".mp4", "video/mp4"),
    (".mp3", "audio/mpeg"),
    (".woff", "font/woff"),
    (".woff2", "font/woff2"),
    (".wasm", "application/wasm"),
];

/// Resolve the MIME type for an extension such as `.png`.
///
/// Matching is exact and case-sensitive; unknown extensions (and the empty
/// string) fall back to [`DEFAULT_CONTENT_TYPE`].
pub fn resolve(extension: &str) -> &'static str {
    CONTENT_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// Return the extension of the last `/`-delimited segment of `name`,
/// including the leading dot, or `""` when the segment has no dot.
///
/// `photos/cat.tar.gz` yields `.gz`; `.bashrc` yields `.bashrc`.
pub fn extension_of(name: &str) -> &str {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    match file_name.rfind('.') {
        Some(idx) => &file_name[idx..],
        None => "",
    }
}
