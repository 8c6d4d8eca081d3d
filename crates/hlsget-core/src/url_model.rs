//! Output naming from the playlist URL.

/// Extracts the last path segment from a URL for use as a filename hint.
///
/// Returns `None` if the URL cannot be parsed or the path is empty/root.
/// Query strings do not leak into the result.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let path = parsed.path();
    let segment = path.split('/').filter(|s| !s.is_empty()).last()?;
    if segment.is_empty() || segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Stem for the merged output file: the source URL's last path segment with
/// everything from the first dot stripped, or a timestamp when no URL is
/// available (repeated runs then collide only within timestamp granularity).
pub fn output_stem(source_url: Option<&str>) -> String {
    if let Some(url) = source_url {
        if let Some(name) = filename_from_url_path(url) {
            let stem = name.split('.').next().unwrap_or("");
            if !stem.is_empty() {
                return stem.to_string();
            }
        }
    }
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
