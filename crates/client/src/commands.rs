//! Line commands understood by the headless client.

use chrono::{DateTime, Utc};
use memehustle_shared::{parse_bid_credits, MemeId, NewMeme, ValidationError, VoteType};
use thiserror::Error;

pub const USAGE: &str = "\
commands:
  vote <id> up|down
  bid <id> <credits>
  caption <id>
  create <title> | <tags csv> [| <image url>]
  show
  refresh
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Vote(MemeId, VoteType),
    Bid(MemeId, u64),
    Caption(MemeId),
    Create(NewMeme),
    Show,
    Refresh,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    ///
    /// `now` seeds the placeholder image for `create` without an image URL.
    pub fn parse(line: &str, now: DateTime<Utc>) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "" => return Ok(None),
            "vote" => match args.as_slice() {
                [id, direction] => Command::Vote(MemeId::new(*id)?, direction.parse()?),
                _ => return Err(CommandError::Usage("vote <id> up|down")),
            },
            "bid" => match args.as_slice() {
                [id, credits] => Command::Bid(MemeId::new(*id)?, parse_bid_credits(credits)?),
                _ => return Err(CommandError::Usage("bid <id> <credits>")),
            },
            "caption" => match args.as_slice() {
                [id] => Command::Caption(MemeId::new(*id)?),
                _ => return Err(CommandError::Usage("caption <id>")),
            },
            "create" => {
                let parts: Vec<&str> = rest.split('|').collect();
                let (title, tags, image) = match parts.as_slice() {
                    [title, tags] => (*title, *tags, ""),
                    [title, tags, image] => (*title, *tags, *image),
                    _ => {
                        return Err(CommandError::Usage(
                            "create <title> | <tags csv> [| <image url>]",
                        ))
                    }
                };
                let meme = NewMeme::from_form(title, image, tags, now);
                meme.validate()?;
                Command::Create(meme)
            }
            "show" | "ls" => Command::Show,
            "refresh" => Command::Refresh,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        Command::parse(line, now())
    }

    fn id(raw: &str) -> MemeId {
        MemeId::new(raw).unwrap()
    }

    #[test]
    fn parses_mutations() {
        assert_eq!(
            parse("vote 7 UP").unwrap(),
            Some(Command::Vote(id("7"), VoteType::Up))
        );
        assert_eq!(parse("  bid 7 50 ").unwrap(), Some(Command::Bid(id("7"), 50)));
        assert_eq!(parse("caption abc").unwrap(), Some(Command::Caption(id("abc"))));
        assert_eq!(parse("quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn create_splits_title_tags_and_image() {
        let Some(Command::Create(meme)) = parse("create Doge | crypto, wow ,").unwrap() else {
            panic!("expected create");
        };
        assert_eq!(meme.title, "Doge");
        assert_eq!(meme.tags, vec!["crypto", "wow"]);
        assert!(meme
            .image_url
            .as_deref()
            .is_some_and(|url| url.ends_with("random=1700000000000")));

        let Some(Command::Create(meme)) =
            parse("create Doge | crypto | https://img.example/doge.png").unwrap()
        else {
            panic!("expected create");
        };
        assert_eq!(meme.image_url.as_deref(), Some("https://img.example/doge.png"));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            parse("bid 7 -5"),
            Err(CommandError::Invalid(ValidationError::NonPositiveBid))
        );
        assert_eq!(
            parse("bid 7 lots"),
            Err(CommandError::Invalid(ValidationError::InvalidBid("lots".into())))
        );
        assert_eq!(
            parse("vote 7 sideways"),
            Err(CommandError::Invalid(ValidationError::UnknownVoteType(
                "sideways".into()
            )))
        );
        assert_eq!(
            parse("create | crypto"),
            Err(CommandError::Invalid(ValidationError::EmptyTitle))
        );
        assert_eq!(
            parse("create Doge | , "),
            Err(CommandError::Invalid(ValidationError::NoTags))
        );
        assert!(matches!(parse("vote 7"), Err(CommandError::Usage(_))));
        assert_eq!(parse("dance"), Err(CommandError::Unknown("dance".into())));
    }
}
