//! License extension in transit.
//!
//! An extender forwards like a [`Forwarder`], but watches fetch responses
//! for license extension candidates in the `embed` images. Each candidate
//! is re-signed with the configured signer (attaching a sign cert when the
//! candidate's owner is not the signer's own key) and the signed licenses
//! are stored back in the same direction, extending the grant chain toward
//! the remote peer.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use trellis_codec::Value;
use trellis_model::fields::IDX_SIGN_CERT;
use trellis_model::{LicenseNode, ModelKind, Node};
use trellis_peer::{BlobResponder, FetchResponder, MuteList, PeerClient, PeerService, Subscription};
use trellis_protocol::{
    FetchRequest, FetchResponse, GenericMessageRequest, GenericMessageResponse, ReadBlobRequest,
    StoreRequest, UnsubscribeRequest, WriteBlobRequest, WriteBlobResponse, StoreResponse,
};

use crate::batch::batch_images;
use crate::error::Result;
use crate::forwarder::Forwarder;
use crate::signer::Signer;

/// A forwarder that extends license chains as they stream past.
pub struct Extender {
    forwarder: Forwarder,
    near: Arc<PeerClient>,
    far: Arc<PeerClient>,
    signer: Arc<dyn Signer>,
    /// Packed sign cert delegating the signer's key, for candidates owned
    /// by someone else.
    sign_cert: Option<Vec<u8>>,
    mutes: MuteList,
}

impl Extender {
    /// Build an extender tunneling `near` to `far`, signing with `signer`.
    #[must_use]
    pub fn new(
        near: Arc<PeerClient>,
        far: Arc<PeerClient>,
        mutes: MuteList,
        signer: Arc<dyn Signer>,
        sign_cert: Option<Vec<u8>>,
    ) -> Self {
        Self {
            forwarder: Forwarder::new(Arc::clone(&near), Arc::clone(&far), mutes.clone()),
            near,
            far,
            signer,
            sign_cert,
            mutes,
        }
    }

    /// Sign one license extension candidate.
    ///
    /// The candidate arrives as a packed draft; it is thawed, given the
    /// delegation cert when the owner differs from the signer's key, signed
    /// through the signer seam, and re-packed.
    async fn sign_candidate(&self, image: &[u8]) -> Result<Vec<u8>> {
        let candidate = LicenseNode::decode(image)?;
        let mut draft = candidate.model().to_draft();
        debug_assert_eq!(draft.kind(), ModelKind::LicenseNode);

        let owner_is_signer =
            candidate.model().owner()?.as_bytes() == self.signer.public_key().as_bytes();
        if !owner_is_signer {
            if let Some(cert) = &self.sign_cert {
                draft.set(IDX_SIGN_CERT, Value::Bytes(cert.clone()))?;
            }
        }

        let message = draft.next_signing_message()?;
        let signature = self.signer.sign(&message).await?;
        draft.add_signature(signature, self.signer.public_key(), self.signer.scheme())?;
        Ok(draft.pack()?.to_vec())
    }

    /// Sign every candidate of a response and store the results far-side.
    async fn extend_candidates(&self, response: &FetchResponse) {
        if response.embed.is_empty() {
            return;
        }
        let mut signed = Vec::new();
        for image in &response.embed {
            match self.sign_candidate(image).await {
                Ok(packed) => signed.push(packed),
                Err(e) => {
                    // A bad candidate never poisons the rest of the batch.
                    debug!(error = %e, "license candidate skipped");
                }
            }
        }
        if signed.is_empty() {
            return;
        }

        for nodes in batch_images(signed) {
            let request = StoreRequest {
                nodes: nodes.into_iter().map(serde_bytes_buf).collect(),
                source_public_key: self.signer.public_key().as_bytes().to_vec(),
                target_public_key: self.far.remote_public_key().to_vec(),
                mute_msg_ids: self
                    .mutes
                    .snapshot()
                    .into_iter()
                    .map(serde_bytes_buf)
                    .collect(),
                preserve_transient: false,
                batch_id: 0,
                has_more: false,
            };
            if let Err(e) = self.far.store(request).await {
                warn!(error = %e, "storing extended licenses failed");
                return;
            }
        }
    }
}

fn serde_bytes_buf(bytes: Vec<u8>) -> serde_bytes::ByteBuf {
    serde_bytes::ByteBuf::from(bytes)
}

#[async_trait]
impl PeerService for Extender {
    #[instrument(skip_all)]
    async fn fetch(&self, request: FetchRequest, responder: FetchResponder) {
        let multi = !request.query.trigger_node_id.is_empty()
            || request.query.trigger_interval > 0;
        let target_public_key = request.query.target_public_key.clone();

        let handle = match self.far.fetch(request).await {
            Ok(handle) => handle,
            Err(e) => {
                let _ = responder
                    .send(FetchResponse::error(
                        trellis_protocol::Status::Error,
                        e.to_string(),
                    ))
                    .await;
                return;
            }
        };
        if multi {
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
                    self.extend_candidates(&response).await;
                    if responder.send(response).await.is_err() {
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
                        .send(FetchResponse::error(
                            trellis_protocol::Status::Error,
                            e.to_string(),
                        ))
                        .await;
                    break;
                }
            }
        }
        if multi {
            self.mutes.remove(handle.msg_id());
        }
    }

    async fn store(&self, request: StoreRequest) -> StoreResponse {
        self.forwarder.store(request).await
    }

    async fn read_blob(&self, request: ReadBlobRequest, responder: BlobResponder) {
        self.forwarder.read_blob(request, responder).await;
    }

    async fn write_blob(&self, request: WriteBlobRequest) -> WriteBlobResponse {
        self.forwarder.write_blob(request).await
    }

    async fn unsubscribe(&self, subscription: Option<Subscription>, request: UnsubscribeRequest) {
        self.forwarder.unsubscribe(subscription, request).await;
    }

    async fn generic_message(&self, request: GenericMessageRequest) -> GenericMessageResponse {
        self.forwarder.generic_message(request).await
    }
}
