use std::sync::LazyLock;

use regex::Regex;

/// Shown when no usable source has been selected yet.
pub const FALLBACK_EMBED_URL: &str = "https://www.youtube.com/embed/dQw4w9WgXcQ";

const EMBED_PREFIX: &str = "https://www.youtube.com/embed/";

static WATCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"youtube\.com/watch\?v=([^&]*)").expect("valid watch regex"));

static SHORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"youtu\.be/([^?]*)").expect("valid short-link regex"));

/// Convert a video link into a directly embeddable reference.
///
/// Watch-style and short links are rewritten to the embed form, anything else
/// is returned as-is. Never fails and never returns an empty string.
pub fn normalize(input: Option<&str>) -> String {
    let Some(input) = input.filter(|s| !s.trim().is_empty()) else {
        return FALLBACK_EMBED_URL.to_string();
    };

    if let Some(id) = capture_id(&WATCH_RE, input) {
        return embed_url(id);
    }
    if let Some(id) = capture_id(&SHORT_RE, input) {
        return embed_url(id);
    }

    input.to_string()
}

/// Embed form for a bare video id.
pub fn embed_url(id: &str) -> String {
    format!("{EMBED_PREFIX}{id}")
}

fn capture_id<'a>(re: &Regex, input: &'a str) -> Option<&'a str> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_input_falls_back() {
        assert_eq!(normalize(None), FALLBACK_EMBED_URL);
        assert_eq!(normalize(Some("")), FALLBACK_EMBED_URL);
        assert_eq!(normalize(Some("   ")), FALLBACK_EMBED_URL);
    }

    #[test]
    fn watch_link_drops_extra_query() {
        assert_eq!(
            normalize(Some("https://youtube.com/watch?v=ABC123&t=5")),
            "https://www.youtube.com/embed/ABC123"
        );
        assert_eq!(
            normalize(Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")),
            "https://www.youtube.com/embed/dQw4w9WgXcQ"
        );
    }

    #[test]
    fn short_link_drops_query() {
        assert_eq!(
            normalize(Some("https://youtu.be/XYZ789?t=5")),
            "https://www.youtube.com/embed/XYZ789"
        );
        assert_eq!(
            normalize(Some("youtu.be/XYZ789")),
            "https://www.youtube.com/embed/XYZ789"
        );
    }

    #[test]
    fn empty_id_is_kept_as_empty_segment() {
        assert_eq!(
            normalize(Some("https://youtube.com/watch?v=&t=5")),
            "https://www.youtube.com/embed/"
        );
        assert_eq!(
            normalize(Some("https://youtu.be/?t=5")),
            "https://www.youtube.com/embed/"
        );
    }

    #[test]
    fn other_inputs_pass_through() {
        for input in [
            "https://www.youtube.com/embed/already",
            "https://vimeo.com/123456",
            "not a url at all",
            "::::",
            "https://youtube.com/watch?list=abc",
        ] {
            assert_eq!(normalize(Some(input)), input);
        }
    }
}
