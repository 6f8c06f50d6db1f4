//! Relaying between peer clients: forwarding, license extension, and
//! auto-fetching.
//!
//! A [`Forwarder`] tunnels the six request kinds from one connection to
//! another. An [`Extender`] is a forwarder variant that signs license
//! extension candidates as they stream past, pushing grants toward the
//! remote peer. An [`AutoFetcher`] pairs a fetching connection with a
//! storing one, batching results and pulling missing blobs.
//!
//! All three treat downstream failures as reasons to unsubscribe, never to
//! close the underlying transport.

#![forbid(unsafe_code)]

pub mod auto_fetcher;
pub mod batch;
pub mod error;
pub mod extender;
pub mod forwarder;
pub mod signer;

pub use auto_fetcher::{AutoFetch, AutoFetcher};
pub use batch::{batch_images, MAX_BATCH_SIZE, MESSAGE_SPLIT_BYTES};
pub use error::{RelayError, Result};
pub use extender::Extender;
pub use forwarder::Forwarder;
pub use signer::{LocalSigner, Signer};
