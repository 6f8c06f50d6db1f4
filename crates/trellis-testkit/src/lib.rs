//! Test support: an in-memory channel pair, deterministic fixtures, and
//! tracing setup for tests.

#![forbid(unsafe_code)]

pub mod channel;
pub mod fixtures;

pub use channel::{channel_pair, MemChannel};
pub use fixtures::{
    data_node_draft, keypair_from_seed, license_draft, peer_props, signed_data_node,
};

use once_cell::sync::Lazy;

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
});

/// Initialize tracing once for the test binary; respects `RUST_LOG`.
pub fn init_tracing() {
    Lazy::force(&TRACING);
}
