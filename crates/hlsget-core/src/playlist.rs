//! Playlist retrieval and parsing.
//!
//! Fetches the m3u8 text with the session headers, decodes it under a fixed
//! list of candidate encodings, parses it, and resolves every segment
//! reference to an absolute URL against the playlist's base (the source URL
//! with its final path segment stripped).

use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// One media segment reference: dense 0-based playlist position plus the
/// resolved absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub url: String,
}

/// Errors from playlist fetch/parse. All of them stop the session before any
/// segment work starts.
#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    #[error("URL must point to an .m3u8 playlist: {0}")]
    InvalidUrl(String),
    #[error("playlist request failed: {0}")]
    Transport(#[from] curl::Error),
    #[error("playlist request returned HTTP {0}")]
    Http(u32),
    #[error("playlist could not be decoded under any candidate encoding")]
    Decode,
    #[error("playlist did not parse: {0}")]
    Parse(String),
    #[error("playlist contains no downloadable segments")]
    Empty,
}

/// Strict candidates tried in order before the lossy fallback. windows-1252
/// also covers the ISO-8859-1 family of labels, and single-byte decoding
/// cannot fail, so in practice the chain always yields text.
static CANDIDATE_ENCODINGS: [&encoding_rs::Encoding; 2] =
    [encoding_rs::UTF_8, encoding_rs::WINDOWS_1252];

/// Fetches and parses the playlist at `url`, returning segments with dense
/// indices and absolute URLs.
pub fn fetch(url: &str, headers: &HashMap<String, String>) -> Result<Vec<Segment>, PlaylistError> {
    let url = url.trim();
    if !url.to_ascii_lowercase().ends_with(".m3u8") {
        return Err(PlaylistError::InvalidUrl(url.to_string()));
    }
    let body = fetch_bytes(url, headers)?;
    let text = decode(&body)?;
    parse(url, &text)
}

fn fetch_bytes(
    url: &str,
    custom_headers: &HashMap<String, String>,
) -> Result<Vec<u8>, PlaylistError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(Duration::from_secs(60))?;

    let mut list = curl::easy::List::new();
    for (k, v) in custom_headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !custom_headers.is_empty() {
        easy.http_headers(list)?;
    }

    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    if code < 200 || code >= 300 {
        return Err(PlaylistError::Http(code));
    }
    Ok(body)
}

/// Decodes with the first candidate that decodes cleanly, then falls back to
/// lossy UTF-8 rather than give up on mixed-encoding playlists.
fn decode(bytes: &[u8]) -> Result<String, PlaylistError> {
    for encoding in CANDIDATE_ENCODINGS {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return Ok(text.into_owned());
        }
    }
    let text = String::from_utf8_lossy(bytes);
    if text.is_empty() && !bytes.is_empty() {
        return Err(PlaylistError::Decode);
    }
    Ok(text.into_owned())
}

fn parse(source_url: &str, text: &str) -> Result<Vec<Segment>, PlaylistError> {
    let media = match m3u8_rs::parse_playlist_res(text.as_bytes()) {
        Ok(m3u8_rs::Playlist::MediaPlaylist(media)) => media,
        // A master playlist references variant playlists, not media segments;
        // for this tool that is the same outcome as an empty playlist.
        Ok(m3u8_rs::Playlist::MasterPlaylist(_)) => return Err(PlaylistError::Empty),
        Err(e) => return Err(PlaylistError::Parse(e.to_string())),
    };
    if media.segments.is_empty() {
        return Err(PlaylistError::Empty);
    }

    let base = Url::parse(source_url).map_err(|e| PlaylistError::Parse(e.to_string()))?;
    media
        .segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            // Url::join resolves relative references against the source URL
            // minus its final path segment; absolute ones pass through.
            let url = base
                .join(&segment.uri)
                .map_err(|e| PlaylistError::Parse(format!("segment {}: {}", index, e)))?;
            Ok(Segment {
                index,
                url: url.into(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "https://cdn.example.com/show/ep1/index.m3u8";

    fn media_playlist(entries: &[&str]) -> String {
        let mut text = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n");
        for entry in entries {
            text.push_str("#EXTINF:9.0,\n");
            text.push_str(entry);
            text.push('\n');
        }
        text.push_str("#EXT-X-ENDLIST\n");
        text
    }

    #[test]
    fn rejects_non_m3u8_url() {
        let err = fetch("https://example.com/video.mp4", &HashMap::new()).unwrap_err();
        assert!(matches!(err, PlaylistError::InvalidUrl(_)));
    }

    #[test]
    fn url_extension_check_is_case_insensitive_and_trims() {
        // Reaches the transport stage instead of failing validation; an
        // unresolvable host is a Transport error.
        let err = fetch("  http://[::1]:1/x.M3U8  ", &HashMap::new()).unwrap_err();
        assert!(matches!(err, PlaylistError::Transport(_) | PlaylistError::Http(_)));
    }

    #[test]
    fn parse_resolves_relative_and_absolute_uris() {
        let text = media_playlist(&[
            "seg0.ts",
            "/root/seg1.ts",
            "https://other.example.com/seg2.ts",
        ]);
        let segments = parse(SOURCE, &text).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].index, 0);
        assert_eq!(segments[0].url, "https://cdn.example.com/show/ep1/seg0.ts");
        assert_eq!(segments[1].url, "https://cdn.example.com/root/seg1.ts");
        assert_eq!(segments[2].url, "https://other.example.com/seg2.ts");
    }

    #[test]
    fn parse_indices_are_dense() {
        let text = media_playlist(&["a.ts", "b.ts", "c.ts", "d.ts"]);
        let segments = parse(SOURCE, &text).unwrap();
        let indices: Vec<usize> = segments.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn parse_empty_playlist_fails() {
        let text = media_playlist(&[]);
        let err = parse(SOURCE, &text).unwrap_err();
        assert!(matches!(err, PlaylistError::Empty));
    }

    #[test]
    fn parse_master_playlist_has_no_segments() {
        let text = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1280000\nlow/index.m3u8\n";
        let err = parse(SOURCE, text).unwrap_err();
        assert!(matches!(err, PlaylistError::Empty));
    }

    #[test]
    fn decode_utf8() {
        assert_eq!(decode("caf\u{e9}".as_bytes()).unwrap(), "caf\u{e9}");
    }

    #[test]
    fn decode_falls_through_to_windows_1252() {
        // 0xE9 alone is invalid UTF-8 but is 'é' in windows-1252/latin-1.
        let bytes = b"caf\xe9";
        assert_eq!(decode(bytes).unwrap(), "caf\u{e9}");
    }
}
