//! Auto-fetching: subscribe on one connection, store on another.
//!
//! Each registered [`AutoFetch`] issues its fetch on the server connection
//! and forwards every resulting node image to the storage connection as
//! batched store requests, muting the echo through the shared mute list.
//! When a store reply names missing blobs, the fetcher pulls them through a
//! read/write pipeline, resuming partial transfers from the storage's
//! reported on-disk length.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use trellis_peer::{MuteList, PeerClient};
use trellis_protocol::{FetchRequest, ReadBlobRequest, StoreRequest, WriteBlobRequest};

use crate::batch::batch_images;
use crate::error::{RelayError, Result};

/// Blob pipeline chunk size.
const BLOB_CHUNK: u32 = 64 * 1024;

/// One auto-fetch registration.
#[derive(Debug, Clone)]
pub struct AutoFetch {
    /// Only apply against this remote peer; empty matches any.
    pub remote_public_key: Vec<u8>,
    /// The fetch to issue (usually a trigger subscription).
    pub fetch: FetchRequest,
    /// Largest blob to transfer: zero disables, negative means unlimited.
    pub blob_size_max_limit: i64,
    /// Swap the fetch and store roles of the two connections.
    pub reverse: bool,
}

struct BlobTransfer {
    task: JoinHandle<()>,
}

/// Pairs a fetching connection with a storing one.
pub struct AutoFetcher {
    server: Arc<PeerClient>,
    storage: Arc<PeerClient>,
    mutes: MuteList,
    syncing_blobs: Arc<Mutex<HashMap<[u8; 32], BlobTransfer>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AutoFetcher {
    /// Build an auto-fetcher over a server (fetch) and a storage (store)
    /// connection sharing `mutes` with any forwarder on the transport.
    #[must_use]
    pub fn new(server: Arc<PeerClient>, storage: Arc<PeerClient>, mutes: MuteList) -> Self {
        Self {
            server,
            storage,
            mutes,
            syncing_blobs: Arc::new(Mutex::new(HashMap::new())),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Register an auto-fetch; returns whether it matched this connection
    /// pair and was started.
    #[instrument(skip(self, auto_fetch), fields(reverse = auto_fetch.reverse))]
    pub async fn add_fetch(&self, auto_fetch: AutoFetch) -> Result<bool> {
        let (fetch_client, store_client) = if auto_fetch.reverse {
            (Arc::clone(&self.storage), Arc::clone(&self.server))
        } else {
            (Arc::clone(&self.server), Arc::clone(&self.storage))
        };

        if !auto_fetch.remote_public_key.is_empty()
            && fetch_client.remote_public_key() != auto_fetch.remote_public_key
        {
            return Ok(false);
        }

        let handle = fetch_client.fetch(auto_fetch.fetch.clone()).await?;
        self.mutes.add(handle.msg_id());

        let mutes = self.mutes.clone();
        let syncing = Arc::clone(&self.syncing_blobs);
        let blob_limit = auto_fetch.blob_size_max_limit;
        let preserve_transient = auto_fetch.fetch.query.preserve_transient;
        let target_public_key = auto_fetch.fetch.query.target_public_key.clone();
        let fetch_msg_id = handle.msg_id();

        let task = tokio::spawn(async move {
            loop {
                match handle.recv().await {
                    Ok(Some(response)) => {
                        let images: Vec<Vec<u8>> = response
                            .nodes
                            .iter()
                            .map(|image| image.to_vec())
                            .collect();
                        if images.is_empty() {
                            continue;
                        }
                        for nodes in batch_images(images) {
                            let request = StoreRequest {
                                nodes: nodes
                                    .into_iter()
                                    .map(serde_bytes::ByteBuf::from)
                                    .collect(),
                                source_public_key: fetch_client
                                    .remote_public_key()
                                    .to_vec(),
                                target_public_key: target_public_key.clone(),
                                mute_msg_ids: mutes
                                    .snapshot()
                                    .into_iter()
                                    .map(serde_bytes::ByteBuf::from)
                                    .collect(),
                                preserve_transient,
                                batch_id: 0,
                                has_more: false,
                            };
                            match store_client.store(request).await {
                                Ok(reply) => {
                                    spawn_blob_transfers(
                                        &reply.missing_blob_id1s,
                                        &reply.missing_blob_sizes,
                                        blob_limit,
                                        &fetch_client,
                                        &store_client,
                                        &target_public_key,
                                        &syncing,
                                    );
                                }
                                Err(e) => {
                                    // Downstream failure: give up on this
                                    // subscription, keep the transport.
                                    warn!(error = %e, "auto-fetch store failed, unsubscribing");
                                    let _ = fetch_client
                                        .unsubscribe(
                                            fetch_msg_id,
                                            target_public_key.clone(),
                                        )
                                        .await;
                                    mutes.remove(fetch_msg_id);
                                    return;
                                }
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!(error = %e, "auto-fetch stream ended");
                        break;
                    }
                }
            }
            mutes.remove(fetch_msg_id);
        });
        self.tasks.lock().push(task);
        Ok(true)
    }

    /// Whether a blob transfer for this id is currently in flight.
    #[must_use]
    pub fn is_syncing_blob(&self, node_id1: &[u8; 32]) -> bool {
        self.syncing_blobs.lock().contains_key(node_id1)
    }

    /// Abort every task this fetcher spawned.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        for (_, transfer) in self.syncing_blobs.lock().drain() {
            transfer.task.abort();
        }
    }
}

/// Start blob transfers for a store reply's missing list, skipping ids
/// already in flight and blobs beyond the size limit.
fn spawn_blob_transfers(
    missing_ids: &[serde_bytes::ByteBuf],
    missing_sizes: &[u64],
    blob_limit: i64,
    fetch_client: &Arc<PeerClient>,
    store_client: &Arc<PeerClient>,
    target_public_key: &[u8],
    syncing: &Arc<Mutex<HashMap<[u8; 32], BlobTransfer>>>,
) {
    if blob_limit == 0 {
        return;
    }
    for (position, id_buf) in missing_ids.iter().enumerate() {
        let Ok(node_id1) = <[u8; 32]>::try_from(id_buf.as_slice()) else {
            continue;
        };
        let size = missing_sizes.get(position).copied().unwrap_or(0);
        if blob_limit > 0 && size > blob_limit as u64 {
            debug!(id = %hex::encode(node_id1), size, "blob exceeds size limit");
            continue;
        }

        let mut table = syncing.lock();
        if table.contains_key(&node_id1) {
            // Re-entrant: the in-flight transfer covers this request.
            continue;
        }
        let fetch_client = Arc::clone(fetch_client);
        let store_client = Arc::clone(store_client);
        let target = target_public_key.to_vec();
        let syncing_done = Arc::clone(syncing);
        let task = tokio::spawn(async move {
            if let Err(e) =
                sync_blob(&fetch_client, &store_client, node_id1, size, &target).await
            {
                warn!(id = %hex::encode(node_id1), error = %e, "blob sync failed");
            }
            syncing_done.lock().remove(&node_id1);
        });
        table.insert(node_id1, BlobTransfer { task });
    }
}

/// Pull one blob from the fetch side and push it to the storage side.
///
/// The first (empty) write probes the storage's current on-disk length so
/// interrupted transfers resume instead of restarting.
async fn sync_blob(
    fetch_client: &Arc<PeerClient>,
    store_client: &Arc<PeerClient>,
    node_id1: [u8; 32],
    size: u64,
    target_public_key: &[u8],
) -> Result<()> {
    let probe = store_client
        .write_blob(WriteBlobRequest {
            node_id1: node_id1.to_vec(),
            source_public_key: Vec::new(),
            target_public_key: target_public_key.to_vec(),
            pos: 0,
            data: Vec::new(),
            mute_msg_ids: Vec::new(),
        })
        .await?;
    let mut pos = probe.current_length;

    while pos < size {
        let length = BLOB_CHUNK.min((size - pos) as u32);
        let handle = fetch_client
            .read_blob(ReadBlobRequest {
                node_id1: node_id1.to_vec(),
                target_public_key: target_public_key.to_vec(),
                source_public_key: Vec::new(),
                pos,
                length,
            })
            .await?;

        let mut advanced = false;
        loop {
            match handle.recv().await {
                Ok(Some(chunk)) => {
                    if chunk.data.is_empty() {
                        continue;
                    }
                    let reply = store_client
                        .write_blob(WriteBlobRequest {
                            node_id1: node_id1.to_vec(),
                            source_public_key: Vec::new(),
                            target_public_key: target_public_key.to_vec(),
                            pos: chunk.pos,
                            data: chunk.data,
                            mute_msg_ids: Vec::new(),
                        })
                        .await?;
                    if reply.current_length > pos {
                        pos = reply.current_length;
                        advanced = true;
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(RelayError::from(e)),
            }
        }
        if !advanced {
            return Err(RelayError::BlobSync(format!(
                "no progress at offset {pos} of {size}"
            )));
        }
    }
    Ok(())
}
