use konspekt_core::{Annotation, VideoSelection};

pub const HELP: &str = "\
Commands:
  /select <url> [| name [| description]]   attach a video (resets the session)
  /keypoints                               generate AI keypoints
  /note <HH:MM:SS> | <title> | <description>
                                           add a personal note
  /notes                                   list keypoints and personal notes
  /show                                    print the session as JSON
  /help                                    show this help
  /quit                                    exit
Anything else is sent to the assistant as a question.";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Select(VideoSelection),
    Keypoints,
    Note(Annotation),
    Notes,
    Show,
    Help,
    Quit,
    Ask(String),
    Empty,
}

/// Split `a | b | c` into trimmed parts.
fn fields(rest: &str) -> Vec<String> {
    rest.split('|').map(|part| part.trim().to_string()).collect()
}

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    if !line.starts_with('/') {
        return Ok(Command::Ask(line.to_string()));
    }

    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    match name {
        "/select" => {
            let mut parts = fields(rest).into_iter();
            let selection = VideoSelection {
                source_url: parts.next(),
                name: parts.next(),
                description: parts.next(),
            };
            Ok(Command::Select(selection))
        }
        "/keypoints" => Ok(Command::Keypoints),
        "/note" => {
            let parts = fields(rest);
            let [timestamp, title, description] = <[String; 3]>::try_from(parts)
                .map_err(|_| "usage: /note <HH:MM:SS> | <title> | <description>".to_string())?;
            Ok(Command::Note(Annotation {
                timestamp,
                title,
                description,
            }))
        }
        "/notes" => Ok(Command::Notes),
        "/show" => Ok(Command::Show),
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        other => Err(format!("unknown command {other}, try /help")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(
            parse("  what does fit mean?  ").unwrap(),
            Command::Ask("what does fit mean?".into())
        );
        assert_eq!(parse("   ").unwrap(), Command::Empty);
    }

    #[test]
    fn select_takes_optional_name_and_description() {
        let Command::Select(selection) =
            parse("/select https://youtu.be/XYZ789 | German | slow practice").unwrap()
        else {
            panic!("expected select");
        };
        assert_eq!(selection.source_url.as_deref(), Some("https://youtu.be/XYZ789"));
        assert_eq!(selection.name.as_deref(), Some("German"));
        assert_eq!(selection.description.as_deref(), Some("slow practice"));

        // Validation of the missing URL happens in the session.
        let Command::Select(selection) = parse("/select").unwrap() else {
            panic!("expected select");
        };
        assert_eq!(selection.source_url.as_deref(), Some(""));
    }

    #[test]
    fn note_needs_three_fields() {
        assert_eq!(
            parse("/note 00:02:10 | Fit | means healthy").unwrap(),
            Command::Note(Annotation::new("00:02:10", "Fit", "means healthy"))
        );
        assert!(parse("/note 00:02:10 | Fit").is_err());
    }

    #[test]
    fn unknown_commands_are_reported() {
        assert!(parse("/dance").unwrap_err().contains("/dance"));
    }
}
