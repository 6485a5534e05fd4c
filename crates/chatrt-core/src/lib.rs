//! Unified adapter contract, event hub, and shared error taxonomy.
//!
//! Every platform adapter crate (`chatrt-botapi`, `chatrt-rpc`,
//! `chatrt-mobile`, `chatrt-browser`) depends on this crate and implements
//! [`adapter::Adapter`] over its own backend. Nothing here performs I/O
//! itself; it defines the contract and the machinery (event emission,
//! connection assertions) shared by every implementation.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod error;
pub mod event;

pub use adapter::{Adapter, Attachment};
pub use error::AdapterError;
pub use event::{AdapterEvent, EventBuilder, EventEmitter, EventId, ListenerId, PresenceKind};
