//! Human-readable message syntax.
//!
//! `"/motor/0/speed 512"` parses to a message with one `Int` argument. Unquoted
//! tokens are typed by inference: a token with exactly one `.` that parses as a
//! float is a `Float`, a token that parses as an integer is an `Int`, anything
//! else is a `String`. Double quotes keep spaces inside one `String` argument.
//!
//! `Display` writes the same syntax, so a message without blobs survives a
//! print/parse cycle as long as its floats are finite and its strings contain no `"`.

use std::fmt;

use crate::error::ParseError;
use crate::message::{Argument, Message};

/// Parse a command line into a message.
pub fn parse_command(line: &str) -> Result<Message, ParseError> {
    let mut tokens = Tokens { line, pos: 0 };

    let address = match tokens.next_token()? {
        Some(Token::Bare(a)) if a.starts_with('/') => a,
        Some(Token::Bare(a)) | Some(Token::Quoted(a)) => {
            return Err(ParseError::InvalidAddress(a.to_owned()))
        }
        None => return Err(ParseError::Empty),
    };

    let mut msg = Message::new(address);
    while let Some(token) = tokens.next_token()? {
        msg.args.push(match token {
            Token::Quoted(s) => Argument::String(s.to_owned()),
            Token::Bare(s) => infer_argument(s),
        });
    }
    Ok(msg)
}

fn infer_argument(token: &str) -> Argument {
    if token.matches('.').count() == 1 {
        if let Ok(v) = token.parse::<f32>() {
            return Argument::Float(v);
        }
    }
    if let Ok(v) = token.parse::<i32>() {
        return Argument::Int(v);
    }
    Argument::String(token.to_owned())
}

enum Token<'a> {
    Bare(&'a str),
    Quoted(&'a str),
}

struct Tokens<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn next_token(&mut self) -> Result<Option<Token<'a>>, ParseError> {
        let rest = &self.line[self.pos..];
        let trimmed = rest.trim_start();
        let start = self.pos + (rest.len() - trimmed.len());
        if trimmed.is_empty() {
            self.pos = self.line.len();
            return Ok(None);
        }

        if let Some(body) = trimmed.strip_prefix('"') {
            let end = body
                .find('"')
                .ok_or(ParseError::UnterminatedQuote { column: start })?;
            self.pos = start + 1 + end + 1;
            return Ok(Some(Token::Quoted(&body[..end])));
        }

        let end = trimmed
            .find(char::is_whitespace)
            .unwrap_or(trimmed.len());
        self.pos = start + end;
        Ok(Some(Token::Bare(&trimmed[..end])))
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Int(v) => write!(f, "{v}"),
            Argument::Float(v) => {
                let s = v.to_string();
                if v.is_finite() && !s.contains('.') {
                    write!(f, "{s}.0")
                } else {
                    f.write_str(&s)
                }
            }
            Argument::String(s) => {
                if needs_quotes(s) {
                    write!(f, "\"{s}\"")
                } else {
                    f.write_str(s)
                }
            }
            Argument::Blob(b) => {
                f.write_str("[")?;
                for byte in b.iter() {
                    write!(f, " {byte:02x}")?;
                }
                f.write_str(" ]")
            }
        }
    }
}

// A bare token that would re-parse as something other than this string.
fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.starts_with('"')
        || s.contains(char::is_whitespace)
        || !matches!(infer_argument(s), Argument::String(_))
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn parses_typed_arguments() {
        let msg = parse_command("/motor/0/speed 512 -1.5 fast -7").unwrap();
        assert_eq!(msg.address, "/motor/0/speed");
        assert_eq!(
            msg.args,
            vec![
                Argument::Int(512),
                Argument::Float(-1.5),
                Argument::String("fast".into()),
                Argument::Int(-7),
            ]
        );
    }

    #[test]
    fn quoted_argument_keeps_spaces_and_stays_string() {
        let msg = parse_command(r#"/system/name "my board"  "42""#).unwrap();
        assert_eq!(
            msg.args,
            vec![Argument::String("my board".into()), Argument::String("42".into())]
        );
    }

    #[test]
    fn dotted_tokens_that_are_not_floats_are_strings() {
        let msg = parse_command("/network/address 192.168.0.200 1.2.3 .5").unwrap();
        assert_eq!(msg.args[0], Argument::String("192.168.0.200".into()));
        assert_eq!(msg.args[1], Argument::String("1.2.3".into()));
        assert_eq!(msg.args[2], Argument::Float(0.5));
    }

    #[test]
    fn address_only_is_a_query() {
        let msg = parse_command("  /system/version  ").unwrap();
        assert!(msg.is_query());
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse_command("   ").unwrap_err(), ParseError::Empty);
        assert_eq!(
            parse_command("motor 1").unwrap_err(),
            ParseError::InvalidAddress("motor".into())
        );
        assert_eq!(
            parse_command(r#"/a "open"#).unwrap_err(),
            ParseError::UnterminatedQuote { column: 3 }
        );
    }

    #[test]
    fn display_form() {
        let msg = Message::new("/x")
            .with_arg(3)
            .with_arg(2.0f32)
            .with_arg("two words")
            .with_arg("12")
            .with_arg(Bytes::from_static(&[0x0a, 0xff]));
        assert_eq!(msg.to_string(), r#"/x 3 2.0 "two words" "12" [ 0a ff ]"#);
        assert_eq!(Argument::Blob(Bytes::new()).to_string(), "[ ]");
        assert_eq!(Argument::String(String::new()).to_string(), r#""""#);
    }

    #[test]
    fn display_then_parse_is_identity() {
        let msg = Message::new("/appled/0/state")
            .with_arg(-12)
            .with_arg(0.001f32)
            .with_arg(1e20f32)
            .with_arg("")
            .with_arg("on")
            .with_arg("3.5");
        assert_eq!(parse_command(&msg.to_string()).unwrap(), msg);
    }
}
