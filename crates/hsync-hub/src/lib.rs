//! `hsync-hub`: fans server-rendered fragments out to every open event
//! stream.
//!
//! # Overview
//!
//! A single coordinator task owns the registry of live [`Connection`]s and
//! processes three kinds of message strictly in order:
//!
//! | Message      | Effect                                                      |
//! |--------------|-------------------------------------------------------------|
//! | `Register`   | insert (closing any connection with the same identity)      |
//! | `Unregister` | remove, only if the stored entry is that same connection    |
//! | `Broadcast`  | snapshot the registry, queue the frame on each client       |
//!
//! Register and unregister also push an `online-count-updated` event rendered
//! by the caller's [`PresenceRenderer`].
//!
//! Every registered connection has one writer task draining an ordered
//! outbox through its [`EventSink`], so a client sees events in broadcast
//! order, and a failed or stalled client never blocks the coordinator or its
//! siblings.

pub mod connection;
pub mod error;
pub mod event;
pub mod hub;
pub mod presence;
pub mod sink;

pub use connection::{Connection, Delivery};
pub use error::{HubError, Result};
pub use event::{encode_frame, Event, ONLINE_COUNT_EVENT};
pub use hub::Hub;
pub use presence::PresenceRenderer;
pub use sink::{ChannelSink, EventSink};
