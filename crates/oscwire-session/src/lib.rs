//! Host-side sessions with OSC boards.
//!
//! A [`Board`] owns one transport, sends messages and bundles, and turns
//! incoming packets into [`BoardEvent`]s. Identity fields learned from info
//! replies accumulate in [`BoardInfo`]. [`BoardPump`] runs many boards on
//! their own threads and merges their events.

pub mod board;
pub mod error;
pub mod info;
pub mod pump;

pub use board::{Board, BoardEvent, SessionConfig};
pub use error::{Result, SessionError};
pub use info::BoardInfo;
pub use pump::{BoardHandle, BoardId, BoardPump};
