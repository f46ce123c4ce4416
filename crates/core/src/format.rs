use crate::types::{Annotation, ChatTurn};

/// Format seconds as HH:MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Parse a strict HH:MM:SS timestamp into seconds.
pub fn parse_timestamp(value: &str) -> Option<u32> {
    let mut parts = value.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let field = |part: &str| -> Option<u32> {
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    };

    let (hours, mins, secs) = (field(h)?, field(m)?, field(s)?);
    if mins >= 60 || secs >= 60 {
        return None;
    }
    Some(hours * 3600 + mins * 60 + secs)
}

/// One line per annotation: `[HH:MM:SS] title - description`
pub fn format_annotations(annotations: &[Annotation]) -> String {
    annotations
        .iter()
        .map(|a| format!("[{}] {} - {}", a.timestamp, a.title, a.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_transcript(transcript: &[ChatTurn]) -> String {
    transcript
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_timestamp(0.0), "00:00:00");
        assert_eq!(format_timestamp(98.7), "00:01:38");
        assert_eq!(format_timestamp(3725.0), "01:02:05");
        assert_eq!(format_timestamp(-4.0), "00:00:00");
    }

    #[test]
    fn parses_only_strict_timestamps() {
        assert_eq!(parse_timestamp("00:02:10"), Some(130));
        assert_eq!(parse_timestamp("01:00:00"), Some(3600));
        assert_eq!(parse_timestamp("2:10"), None);
        assert_eq!(parse_timestamp("00:60:00"), None);
        assert_eq!(parse_timestamp("00:00:61"), None);
        assert_eq!(parse_timestamp("aa:bb:cc"), None);
        assert_eq!(parse_timestamp("00:00:00:00"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn annotations_render_one_per_line() {
        let text = format_annotations(&[
            Annotation::new("00:00:15", "Intro", "Hello"),
            Annotation::new("00:01:00", "Topic", "Details"),
        ]);
        assert_eq!(text, "[00:00:15] Intro - Hello\n[00:01:00] Topic - Details");
    }
}
