//! Drive several boards at once, one thread per board.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use oscwire_codec::Message;
use oscwire_transport::PacketTransport;
use tracing::{debug, info, warn};

use crate::board::{Board, BoardEvent};
use crate::error::{Result, SessionError};

/// Identifies a board within one [`BoardPump`].
pub type BoardId = u64;

/// Cloneable sender for one pumped board.
#[derive(Debug, Clone)]
pub struct BoardHandle {
    id: BoardId,
    location: String,
    outgoing: Sender<Vec<Message>>,
}

impl BoardHandle {
    pub fn id(&self) -> BoardId {
        self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Queue one message for the board.
    pub fn send(&self, msg: Message) -> Result<()> {
        self.send_messages(vec![msg])
    }

    /// Queue messages to go out together in one packet.
    pub fn send_messages(&self, messages: Vec<Message>) -> Result<()> {
        self.outgoing
            .send(messages)
            .map_err(|_| SessionError::Closed)
    }
}

struct Worker {
    handle: BoardHandle,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Fan-in of events from many boards.
///
/// Each added board gets a thread that forwards `(id, event)` pairs to the
/// pump and writes queued outgoing messages. A board whose transport fails
/// reports [`BoardEvent::Closed`] and is removed.
pub struct BoardPump {
    events_tx: Sender<(BoardId, BoardEvent)>,
    events_rx: Receiver<(BoardId, BoardEvent)>,
    workers: HashMap<BoardId, Worker>,
    next_id: BoardId,
}

impl Default for BoardPump {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardPump {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            events_tx,
            events_rx,
            workers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Hand `board` to its own thread and return its handle.
    pub fn add<T: PacketTransport + 'static>(&mut self, board: Board<T>) -> Result<BoardHandle> {
        let id = self.next_id;
        self.next_id += 1;

        let (outgoing, outgoing_rx) = mpsc::channel();
        let handle = BoardHandle {
            id,
            location: board.location(),
            outgoing,
        };
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let events = self.events_tx.clone();
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name(format!("oscwire-board-{id}"))
                .spawn(move || pump_board(id, board, &outgoing_rx, &events, &stop))
                .map_err(oscwire_transport::TransportError::from)?
        };

        info!(id, location = %handle.location, "board added to pump");
        self.workers.insert(
            id,
            Worker {
                handle: handle.clone(),
                stop,
                thread: Some(thread),
            },
        );
        Ok(handle)
    }

    pub fn handle(&self, id: BoardId) -> Option<BoardHandle> {
        self.workers.get(&id).map(|w| w.handle.clone())
    }

    pub fn board_ids(&self) -> Vec<BoardId> {
        let mut ids: Vec<_> = self.workers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait up to `timeout` for the next event from any board.
    ///
    /// A [`BoardEvent::Closed`] event also removes the board from the pump.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<(BoardId, BoardEvent)> {
        match self.events_rx.recv_timeout(timeout) {
            Ok((id, BoardEvent::Closed)) => {
                if let Some(mut worker) = self.workers.remove(&id) {
                    worker.shutdown();
                    info!(id, location = %worker.handle.location, "board removed from pump");
                }
                Some((id, BoardEvent::Closed))
            }
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Stop a board's thread and close its transport.
    pub fn remove(&mut self, id: BoardId) -> bool {
        match self.workers.remove(&id) {
            Some(mut worker) => {
                worker.shutdown();
                debug!(id, "board removed from pump");
                true
            }
            None => false,
        }
    }
}

impl Drop for BoardPump {
    fn drop(&mut self) {
        for worker in self.workers.values_mut() {
            worker.shutdown();
        }
    }
}

fn pump_board<T: PacketTransport>(
    id: BoardId,
    mut board: Board<T>,
    outgoing: &Receiver<Vec<Message>>,
    events: &Sender<(BoardId, BoardEvent)>,
    stop: &AtomicBool,
) {
    let poll = board.config().poll_interval;
    while !stop.load(Ordering::SeqCst) {
        loop {
            match outgoing.try_recv() {
                Ok(messages) => {
                    if let Err(err) = board.send_messages(messages) {
                        warn!(id, error = %err, "pumped send failed");
                        break;
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        match board.recv_timeout(poll) {
            Ok(Some(BoardEvent::Closed)) | Err(_) => {
                let _ = events.send((id, BoardEvent::Closed));
                return;
            }
            Ok(Some(event)) => {
                if events.send((id, event)).is_err() {
                    return;
                }
            }
            Ok(None) => {}
        }
    }
    board.close();
}
