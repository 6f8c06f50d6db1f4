//! Request forwarding between two peer clients.
//!
//! A forwarder is the service of one connection ("near") that re-issues
//! every request on another connection ("far") and streams the responses
//! back. Subscriptions are re-mapped so an unsubscribe from the near side
//! cancels the far-side fetch, and subscription msg ids land in the shared
//! mute list so a companion auto-fetcher can suppress store echoes.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use trellis_peer::{
    FetchResponder, BlobResponder, MuteList, PeerClient, PeerService, Subscription,
};
use trellis_protocol::{
    FetchRequest, FetchResponse, GenericMessageRequest, GenericMessageResponse, ReadBlobRequest,
    ReadBlobResponse, Status, StoreRequest, StoreResponse, UnsubscribeRequest, WriteBlobRequest,
    WriteBlobResponse,
};

/// Tunnels requests from a near connection to a far one.
pub struct Forwarder {
    near: Arc<PeerClient>,
    far: Arc<PeerClient>,
    mutes: MuteList,
}

impl Forwarder {
    /// Forward requests arriving on `near` out through `far`.
    #[must_use]
    pub fn new(near: Arc<PeerClient>, far: Arc<PeerClient>, mutes: MuteList) -> Self {
        Self { near, far, mutes }
    }

    /// The shared mute list.
    #[must_use]
    pub fn mutes(&self) -> &MuteList {
        &self.mutes
    }

    /// Stream far-side fetch responses back to the near side.
    ///
    /// Downstream failures end the tunnel with a non-fatal error response;
    /// the near transport stays open.
    pub(crate) async fn tunnel_fetch(
        &self,
        request: FetchRequest,
        responder: FetchResponder,
    ) {
        let multi = !request.query.trigger_node_id.is_empty()
            || request.query.trigger_interval > 0;
        let target_public_key = request.query.target_public_key.clone();

        let handle = match self.far.fetch(request).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "far fetch failed");
                let _ = responder
                    .send(FetchResponse::error(Status::Error, e.to_string()))
                    .await;
                return;
            }
        };

        if multi {
            // Re-map the near-side subscription at the downstream id and
            // mute its echo for companion auto-fetchers.
            self.near.subscriptions().update_original(
                responder.msg_id(),
                &target_public_key,
                handle.msg_id(),
            );
            self.mutes.add(handle.msg_id());
        }

        loop {
            match handle.recv().await {
                Ok(Some(response)) => {
                    if responder.send(response).await.is_err() {
                        debug!("near side gone, unsubscribing far fetch");
                        let _ = self
                            .far
                            .unsubscribe(handle.msg_id(), target_public_key.clone())
                            .await;
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = responder
                        .send(FetchResponse::error(Status::Error, e.to_string()))
                        .await;
                    break;
                }
            }
        }
        if multi {
            self.mutes.remove(handle.msg_id());
        }
    }
}

#[async_trait]
impl PeerService for Forwarder {
    #[instrument(skip_all)]
    async fn fetch(&self, request: FetchRequest, responder: FetchResponder) {
        self.tunnel_fetch(request, responder).await;
    }

    async fn store(&self, request: StoreRequest) -> StoreResponse {
        match self.far.store(request).await {
            Ok(response) => response,
            Err(e) => StoreResponse {
                status: Status::Error,
                error: e.to_string(),
                ..Default::default()
            },
        }
    }

    async fn read_blob(&self, request: ReadBlobRequest, responder: BlobResponder) {
        let handle = match self.far.read_blob(request).await {
            Ok(handle) => handle,
            Err(e) => {
                let _ = responder
                    .send(ReadBlobResponse {
                        status: Status::Error,
                        error: e.to_string(),
                        seq: 0,
                        end_seq: 0,
                        data: Vec::new(),
                        pos: 0,
                        blob_length: 0,
                    })
                    .await;
                return;
            }
        };
        loop {
            match handle.recv().await {
                Ok(Some(chunk)) => {
                    if responder.send(chunk).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = responder
                        .send(ReadBlobResponse {
                            status: Status::Error,
                            error: e.to_string(),
                            seq: 0,
                            end_seq: 0,
                            data: Vec::new(),
                            pos: 0,
                            blob_length: 0,
                        })
                        .await;
                    break;
                }
            }
        }
    }

    async fn write_blob(&self, request: WriteBlobRequest) -> WriteBlobResponse {
        match self.far.write_blob(request).await {
            Ok(response) => response,
            Err(e) => WriteBlobResponse {
                status: Status::Error,
                error: e.to_string(),
                current_length: 0,
            },
        }
    }

    async fn unsubscribe(&self, subscription: Option<Subscription>, request: UnsubscribeRequest) {
        let Some(subscription) = subscription else {
            debug!("unsubscribe without a known subscription");
            return;
        };
        self.mutes.remove(subscription.original_msg_id);
        if let Err(e) = self
            .far
            .unsubscribe(subscription.original_msg_id, request.target_public_key)
            .await
        {
            // Best-effort; the far side will drop the stream on close.
            debug!(error = %e, "far unsubscribe failed");
        }
    }

    async fn generic_message(&self, request: GenericMessageRequest) -> GenericMessageResponse {
        match self.far.generic_message(request).await {
            Ok(response) => response,
            Err(e) => GenericMessageResponse {
                status: Status::Error,
                error: e.to_string(),
                data: Vec::new(),
            },
        }
    }
}
