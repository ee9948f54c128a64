use std::io::ErrorKind;
use std::time::{Duration, Instant};

use oscwire_session::{Board, SessionConfig, SessionError};
use oscwire_transport::{PacketTransport, TransportError};

use crate::cmd::target::Target;
use crate::cmd::{parse_duration, InfoArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_info, OutputFormat};

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let start = Instant::now();

    let mut board = open_with_timeout(&args.target, timeout)?;
    let location = args.target.to_string();
    let remaining = timeout.saturating_sub(start.elapsed());
    let info = board
        .request_info(remaining)
        .map_err(|err| session_error("info request failed", err))?;

    print_info(info, &location, format);
    Ok(SUCCESS)
}

/// Open the board, retrying while a TCP listener is not up yet.
fn open_with_timeout(
    target: &Target,
    timeout: Duration,
) -> CliResult<Board<Box<dyn PacketTransport>>> {
    let start = Instant::now();
    loop {
        match Board::open(target.board_transport()?, SessionConfig::default()) {
            Ok(board) => return Ok(board),
            Err(err) => {
                if !is_retryable_open_error(&err) {
                    return Err(session_error("connect failed", err));
                }
                if start.elapsed() >= timeout {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect to {target} timed out after {timeout:?}"),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn is_retryable_open_error(err: &SessionError) -> bool {
    match err {
        SessionError::Transport(TransportError::Connect { source, .. }) => {
            matches!(source.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn only_refused_connects_are_retried() {
        let refused = SessionError::Transport(TransportError::Connect {
            target: "127.0.0.1:9".into(),
            source: io::Error::from(ErrorKind::ConnectionRefused),
        });
        assert!(is_retryable_open_error(&refused));

        let denied = SessionError::Transport(TransportError::Connect {
            target: "/dev/ttyACM0".into(),
            source: io::Error::from(ErrorKind::PermissionDenied),
        });
        assert!(!is_retryable_open_error(&denied));
        assert!(!is_retryable_open_error(&SessionError::Closed));
    }
}
