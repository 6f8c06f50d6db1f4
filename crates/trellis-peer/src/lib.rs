//! Peer client over a framed, handshaked channel.
//!
//! The client owns the request/response lifecycle on one connection:
//! outbound requests get [`handle::ResponseHandle`]s that collect streamed
//! replies under the seq/endSeq contract; inbound requests pass the
//! permission layer before reaching the application's [`client::PeerService`];
//! subscriptions and their unsubscribe mappings are bookkept per connection.
//!
//! Scheduling is cooperative: one `run` loop per connection drives all
//! bookkeeping, and shared tables are guarded for the spawned streaming
//! handlers.

#![forbid(unsafe_code)]

pub mod client;
pub mod enforce;
pub mod error;
pub mod handle;
pub mod subs;
pub mod transport;

pub use client::{BlobResponder, FetchResponder, PeerClient, PeerConf, PeerService};
pub use enforce::{enforce_fetch, enforce_simple, Locality};
pub use error::{CancelReason, PeerError, Result};
pub use handle::{ResponseHandle, StreamPhase};
pub use subs::{MuteList, Subscription, Subscriptions};
pub use transport::{Channel, ChannelEvent, MsgId};
