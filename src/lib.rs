//! Relay command engine for FTDI bit-bang relay boards.
//!
//! The CLI binary in this crate and any other front end (a GUI, say) drive
//! the same pipeline: enumerate adapters, open a [`session::Session`],
//! configure bit-bang mode, read the latched output byte into a
//! [`relay_state::RelayState`], fold a validated
//! [`compose::OperationRequest`] into one atomic write, optionally hold a
//! momentary pulse and restore, close. Failures map onto a closed set of
//! exit conditions in [`error::Error`].

pub mod compose;
pub mod engine;
pub mod error;
pub mod ftdi;
pub mod interrupt;
pub mod relay_state;
pub mod session;
pub mod settings;
