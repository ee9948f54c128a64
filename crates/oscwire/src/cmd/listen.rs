use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use oscwire_codec::address::error_reply;
use oscwire_session::{Board, BoardEvent, SessionConfig};
use oscwire_transport::PacketTransport;
use tracing::{debug, info};

use crate::cmd::target::Listener;
use crate::cmd::{install_ctrlc_handler, ListenArgs};
use crate::exit::{session_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_message, MessageKind, OutputFormat};

/// How often the loop checks for Ctrl-C.
const TICK: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = args.target.listen()?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    match listener {
        Listener::Link(transport) => {
            print_link(transport, &running, &mut printed, args.count, format)?;
        }
        Listener::Tcp(acceptor) => {
            while running.load(Ordering::SeqCst) && !limit_reached(printed, args.count) {
                let (session, peer) = acceptor
                    .accept()
                    .map_err(|err| transport_error("accept failed", err))?;
                info!(%peer, "tcp session");
                print_link(Box::new(session), &running, &mut printed, args.count, format)?;
            }
        }
    }

    Ok(SUCCESS)
}

fn limit_reached(printed: usize, count: Option<usize>) -> bool {
    count.is_some_and(|count| printed >= count)
}

/// Print events from one link until it closes, Ctrl-C, or `count` is reached.
fn print_link(
    transport: Box<dyn PacketTransport>,
    running: &AtomicBool,
    printed: &mut usize,
    count: Option<usize>,
    format: OutputFormat,
) -> CliResult<()> {
    let mut board = Board::open(transport, SessionConfig::default())
        .map_err(|err| session_error("open failed", err))?;
    let location = board.location();

    while running.load(Ordering::SeqCst) && !limit_reached(*printed, count) {
        let event = board
            .recv_timeout(TICK)
            .map_err(|err| session_error("receive failed", err))?;
        match event {
            None => continue,
            Some(BoardEvent::Message(msg)) | Some(BoardEvent::InfoUpdated(msg)) => {
                print_message(&msg, MessageKind::Received, &location, format);
            }
            Some(BoardEvent::ErrorReply { address, reason }) => {
                let msg = error_reply(&address, reason);
                print_message(&msg, MessageKind::Error, &location, format);
            }
            Some(BoardEvent::Closed) => {
                debug!(%location, "link closed");
                return Ok(());
            }
        }
        *printed = printed.saturating_add(1);
    }
    Ok(())
}
