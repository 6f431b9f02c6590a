//! Line commands accepted by the serving process on stdin.
//!
//! ```text
//! user <name> <age>        insert a user document
//! publish <message>        publish a message and wait for the acknowledgement
//! reconnect [docstore|broker]
//! health
//! ```

use crate::model::UserCreate;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid age {0:?}")]
    InvalidAge(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    DocStore,
    Broker,
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateUser(UserCreate),
    Publish(String),
    Reconnect(Target),
    Health,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .unwrap_or((line, ""));

        match verb.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "user" => {
                const USAGE: &str = "user <name> <age>";
                let (name, age) = rest.rsplit_once(' ').ok_or(CommandError::Usage(USAGE))?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(CommandError::Usage(USAGE));
                }
                let age = age
                    .parse()
                    .map_err(|_| CommandError::InvalidAge(age.to_string()))?;
                Ok(Command::CreateUser(UserCreate {
                    name: name.to_string(),
                    age,
                }))
            }
            "publish" if rest.is_empty() => Err(CommandError::Usage("publish <message>")),
            "publish" => Ok(Command::Publish(rest.to_string())),
            "reconnect" => match rest.to_ascii_lowercase().as_str() {
                "" => Ok(Command::Reconnect(Target::All)),
                "docstore" | "couchbase" => Ok(Command::Reconnect(Target::DocStore)),
                "broker" | "redpanda" => Ok(Command::Reconnect(Target::Broker)),
                _ => Err(CommandError::Usage("reconnect [docstore|broker]")),
            },
            "health" => Ok(Command::Health),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_name_may_contain_spaces() {
        let command: Command = "user Ada Lovelace 36".parse().unwrap();
        assert_eq!(
            command,
            Command::CreateUser(UserCreate {
                name: "Ada Lovelace".into(),
                age: 36
            })
        );
    }

    #[test]
    fn test_user_requires_numeric_age() {
        assert_eq!(
            "user Ada old".parse::<Command>(),
            Err(CommandError::InvalidAge("old".into()))
        );
        assert_eq!(
            "user 36".parse::<Command>(),
            Err(CommandError::Usage("user <name> <age>"))
        );
    }

    #[test]
    fn test_publish_keeps_message_verbatim() {
        assert_eq!(
            "publish  hello,  world ".parse::<Command>(),
            Ok(Command::Publish("hello,  world".into()))
        );
        assert!("publish".parse::<Command>().is_err());
    }

    #[test]
    fn test_reconnect_targets() {
        assert_eq!("reconnect".parse(), Ok(Command::Reconnect(Target::All)));
        assert_eq!("RECONNECT broker".parse(), Ok(Command::Reconnect(Target::Broker)));
        assert_eq!(
            "reconnect couchbase".parse(),
            Ok(Command::Reconnect(Target::DocStore))
        );
    }

    #[test]
    fn test_unknown_and_empty() {
        assert_eq!("   ".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!(
            "drop users".parse::<Command>(),
            Err(CommandError::Unknown("drop".into()))
        );
    }
}
