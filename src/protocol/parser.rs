//! Command parsing
//!
//! Splits a command line into whitespace-separated arguments. Double quotes
//! group an argument and understand `\n`, `\r`, `\t`, `\"` and `\\`.

use super::commands::{Command, escape};
use crate::error::NfsError;
use crate::namespace::Permission;

/// Quotes an argument only when it would not survive splitting as is.
pub(crate) fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\') {
        format!("\"{}\"", escape(arg))
    } else {
        arg.to_string()
    }
}

pub fn tokenize(line: &str) -> Result<Vec<String>, NfsError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };

        let mut token = String::new();
        if first == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('n') => token.push('\n'),
                        Some('r') => token.push('\r'),
                        Some('t') => token.push('\t'),
                        Some(other) => token.push(other),
                        None => break,
                    },
                    c => token.push(c),
                }
            }
            if !closed {
                return Err(NfsError::InvalidArgument("unterminated quoted argument".into()));
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                token.push(c);
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

/// Parses a raw command string received from a client into a [`Command`].
pub fn parse_command(raw: &str) -> Result<Command, NfsError> {
    let tokens = tokenize(raw.trim_end_matches(['\r', '\n']))?;
    let Some((keyword, args)) = tokens.split_first() else {
        return Err(NfsError::InvalidArgument("empty command".into()));
    };
    let keyword = keyword.to_ascii_uppercase();

    let arity = |min: usize, max: usize| -> Result<(), NfsError> {
        if args.len() < min || args.len() > max {
            Err(NfsError::InvalidArgument(format!(
                "{keyword} takes {} arguments, got {}",
                if min == max {
                    min.to_string()
                } else {
                    format!("{min}-{max}")
                },
                args.len()
            )))
        } else {
            Ok(())
        }
    };
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

    let command = match keyword.as_str() {
        "REGISTER" | "LOGIN" => {
            arity(2, 2)?;
            let (username, password) = (arg(0), arg(1));
            if keyword == "REGISTER" {
                Command::Register { username, password }
            } else {
                Command::Login { username, password }
            }
        }
        "CREATE" => {
            arity(1, 2)?;
            Command::Create {
                path: arg(0),
                content: arg(1),
            }
        }
        "READ" => {
            arity(1, 1)?;
            Command::Read { path: arg(0) }
        }
        "WRITE" => {
            arity(3, 3)?;
            let offset = arg(1).parse::<i64>().map_err(|_| {
                NfsError::InvalidArgument(format!("invalid offset {:?}", arg(1)))
            })?;
            Command::Write {
                path: arg(0),
                offset,
                content: arg(2),
            }
        }
        "DELETE" => {
            arity(1, 1)?;
            Command::Delete { path: arg(0) }
        }
        "INFO" => {
            arity(1, 1)?;
            Command::Info { path: arg(0) }
        }
        "COPY" | "MOVE" => {
            arity(2, 2)?;
            let (src, dst) = (arg(0), arg(1));
            if keyword == "COPY" {
                Command::Copy { src, dst }
            } else {
                Command::Move { src, dst }
            }
        }
        "CREATEFOLDER" => {
            arity(1, 1)?;
            Command::CreateFolder { path: arg(0) }
        }
        "VIEWFOLDER" => {
            arity(0, 1)?;
            let path = if args.is_empty() { "/".to_string() } else { arg(0) };
            Command::ViewFolder { path }
        }
        "ADDACCESS" => {
            arity(3, 3)?;
            Command::AddAccess {
                path: arg(0),
                grantee: arg(1),
                permission: Permission::parse(&arg(2))?,
            }
        }
        "REMACCESS" => {
            arity(2, 2)?;
            Command::RemAccess {
                path: arg(0),
                grantee: arg(1),
            }
        }
        "REQUESTACCESS" => {
            arity(1, 2)?;
            let permission = match args.get(1) {
                Some(raw) => Permission::parse(raw)?,
                None => Permission::Read,
            };
            Command::RequestAccess {
                path: arg(0),
                permission,
            }
        }
        "VIEWREQUESTS" => {
            arity(0, 0)?;
            Command::ViewRequests
        }
        "APPROVEREQUEST" | "DENYREQUEST" => {
            arity(2, 2)?;
            let (path, requester) = (arg(0), arg(1));
            if keyword == "APPROVEREQUEST" {
                Command::ApproveRequest { path, requester }
            } else {
                Command::DenyRequest { path, requester }
            }
        }
        "UNDO" => {
            arity(1, 1)?;
            Command::Undo { path: arg(0) }
        }
        "CHECKPOINT" | "VIEWCHECKPOINT" | "REVERT" => {
            arity(2, 2)?;
            let (path, tag) = (arg(0), arg(1));
            match keyword.as_str() {
                "CHECKPOINT" => Command::Checkpoint { path, tag },
                "VIEWCHECKPOINT" => Command::ViewCheckpoint { path, tag },
                _ => Command::Revert { path, tag },
            }
        }
        "LISTCHECKPOINTS" => {
            arity(1, 1)?;
            Command::ListCheckpoints { path: arg(0) }
        }
        "LIST" => {
            arity(0, 0)?;
            Command::List
        }
        "VIEW" => {
            arity(0, 0)?;
            Command::View
        }
        "QUIT" | "Q" => Command::Quit,
        other => {
            return Err(NfsError::InvalidArgument(format!("unknown command {other}")));
        }
    };

    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn quoted_content_keeps_spaces_and_escapes() {
        let command = parse_command("CREATE notes.txt \"This is a test file content.\\n\"\r\n")
            .unwrap();
        assert_eq!(
            command,
            Command::Create {
                path: "notes.txt".into(),
                content: "This is a test file content.\n".into(),
            }
        );
    }

    #[test]
    fn append_offset_and_keywords_are_case_insensitive() {
        let command = parse_command("write log.txt -1 \"Line from thread 3\\n\"").unwrap();
        assert_eq!(
            command,
            Command::Write {
                path: "log.txt".into(),
                offset: -1,
                content: "Line from thread 3\n".into(),
            }
        );
    }

    #[test]
    fn bad_input_is_invalid_argument() {
        for line in [
            "",
            "FROB x",
            "READ",
            "WRITE f abc \"x\"",
            "CREATE f \"unterminated",
            "ADDACCESS f bob EXECUTE",
        ] {
            let err = parse_command(line).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{line:?}");
        }
    }

    #[test]
    fn rendered_lines_parse_back() {
        let commands = [
            Command::Write {
                path: "dir/my file.txt".into(),
                offset: 4,
                content: "say \"hi\"\\n\n".into(),
            },
            Command::AddAccess {
                path: "a.txt".into(),
                grantee: "bob".into(),
                permission: Permission::Write,
            },
            Command::Create {
                path: "empty.txt".into(),
                content: String::new(),
            },
            Command::ViewFolder { path: "/".into() },
            Command::RequestAccess {
                path: "shared/notes.txt".into(),
                permission: Permission::Write,
            },
            Command::DenyRequest {
                path: "a.txt".into(),
                requester: "bob".into(),
            },
            Command::Revert {
                path: "a.txt".into(),
                tag: "before-edit".into(),
            },
            Command::ViewRequests,
        ];
        for command in commands {
            assert_eq!(parse_command(&command.to_line()).unwrap(), command);
        }
    }

    #[test]
    fn viewfolder_defaults_to_root() {
        assert_eq!(
            parse_command("VIEWFOLDER").unwrap(),
            Command::ViewFolder { path: "/".into() }
        );
    }

    #[test]
    fn request_access_defaults_to_read() {
        assert_eq!(
            parse_command("REQUESTACCESS a.txt").unwrap(),
            Command::RequestAccess {
                path: "a.txt".into(),
                permission: Permission::Read,
            }
        );
        assert_eq!(
            parse_command("requestaccess a.txt -W").unwrap(),
            Command::RequestAccess {
                path: "a.txt".into(),
                permission: Permission::Write,
            }
        );
        assert!(parse_command("CHECKPOINT a.txt").is_err());
        assert!(parse_command("UNDO").is_err());
    }

    #[test]
    fn only_changes_are_marked_as_mutating() {
        assert!(parse_command("UNDO a.txt").unwrap().mutates());
        assert!(parse_command("REGISTER bob pw").unwrap().mutates());
        assert!(!parse_command("LISTCHECKPOINTS a.txt").unwrap().mutates());
        assert!(!parse_command("LOGIN bob pw").unwrap().mutates());
    }

    #[test]
    fn summary_hides_secrets() {
        let command = parse_command("LOGIN alice hunter2").unwrap();
        assert!(!command.summary().contains("hunter2"));
    }
}
