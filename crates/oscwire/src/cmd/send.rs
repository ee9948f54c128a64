use std::time::Instant;

use oscwire_codec::address::error_reply;
use oscwire_codec::{parse_command, Message};
use oscwire_session::{Board, BoardEvent, SessionConfig};
use tracing::debug;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{
    parse_error, session_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, TRANSPORT_ERROR,
};
use crate::output::{print_message, MessageKind, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let messages = parse_commands(&args.commands)?;
    let expected = messages.iter().filter(|m| m.is_query()).count();

    let transport = args.target.board_transport()?;
    let mut board = Board::open(transport, SessionConfig::default())
        .map_err(|err| session_error("connect failed", err))?;
    let location = board.location();

    board
        .send_messages(messages)
        .map_err(|err| session_error("send failed", err))?;
    debug!(%location, count = args.commands.len(), "sent");

    if !args.wait {
        return Ok(SUCCESS);
    }

    let deadline = Instant::now() + timeout;
    let (mut replies, mut errors) = (0usize, 0usize);
    while expected == 0 || replies + errors < expected {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match board
            .recv_timeout(remaining)
            .map_err(|err| session_error("receive failed", err))?
        {
            None => break,
            Some(BoardEvent::Message(msg)) | Some(BoardEvent::InfoUpdated(msg)) => {
                print_message(&msg, MessageKind::Reply, &location, format);
                replies += 1;
            }
            Some(BoardEvent::ErrorReply { address, reason }) => {
                let msg = error_reply(&address, reason);
                print_message(&msg, MessageKind::Error, &location, format);
                errors += 1;
            }
            Some(BoardEvent::Closed) => {
                return Err(CliError::new(
                    TRANSPORT_ERROR,
                    format!("{location} closed before replying"),
                ));
            }
        }
    }

    if errors > 0 {
        return Ok(FAILURE);
    }
    if replies < expected {
        return Err(CliError::new(
            TIMEOUT,
            format!(
                "{location}: {replies} of {expected} replies within {}ms",
                timeout.as_millis()
            ),
        ));
    }
    Ok(SUCCESS)
}

fn parse_commands(commands: &[String]) -> CliResult<Vec<Message>> {
    commands
        .iter()
        .map(|line| {
            parse_command(line)
                .map_err(|err| parse_error(&format!("invalid command '{line}'"), err))
        })
        .collect()
}
