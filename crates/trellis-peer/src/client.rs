//! The peer client: request dispatch, streaming collection, inbound
//! permission enforcement, and subscription bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use trellis_model::{AuthCert, Cert};
use trellis_protocol::{
    decode_frame, encode_frame, FetchRequest, FetchResponse, GenericMessageRequest,
    GenericMessageResponse, PeerMessage, PeerProps, Permissions, ReadBlobRequest,
    ReadBlobResponse, Status, StoreRequest, StoreResponse, UnsubscribeRequest,
    UnsubscribeResponse, Version, WriteBlobRequest, WriteBlobResponse,
    SERIALIZE_FORMAT_BINCODE,
};

use crate::enforce::{enforce_fetch, enforce_simple, rewrite_source_key, Locality};
use crate::error::{CancelReason, PeerError, Result};
use crate::handle::{ResponseHandle, StreamPhase};
use crate::subs::{Subscription, Subscriptions};
use crate::transport::{Channel, ChannelEvent, MsgId};

/// Peer client configuration.
#[derive(Debug, Clone)]
pub struct PeerConf {
    /// Local protocol version.
    pub version: Version,
    /// Timeout awaiting the first reply of a request.
    pub request_timeout: Duration,
    /// Timeout between elements of a streamed reply.
    pub stream_timeout: Duration,
    /// Per-request cap on accumulated node + embed images; zero disables.
    pub max_accumulated: usize,
    /// Maximum tolerated clock skew in milliseconds; `None` disables.
    pub max_clock_skew: Option<u64>,
    /// Serialize formats the local side accepts.
    pub supported_formats: Vec<u16>,
    /// Locally declared region.
    pub region: Option<String>,
    /// Locally declared jurisdiction.
    pub jurisdiction: Option<String>,
}

impl Default for PeerConf {
    fn default() -> Self {
        Self {
            version: Version::new(0, 1, 0),
            request_timeout: Duration::from_secs(60),
            stream_timeout: Duration::from_secs(60),
            max_accumulated: 100_000,
            max_clock_skew: None,
            supported_formats: vec![SERIALIZE_FORMAT_BINCODE],
            region: None,
            jurisdiction: None,
        }
    }
}

/// Streams fetch responses back to an inbound request.
#[derive(Clone)]
pub struct FetchResponder {
    channel: Arc<dyn Channel>,
    msg_id: MsgId,
}

impl FetchResponder {
    /// Send one response message of the stream.
    pub async fn send(&self, response: FetchResponse) -> Result<()> {
        let frame = encode_frame(&PeerMessage::FetchResponse(response))?;
        self.channel.send_reply(self.msg_id, frame).await
    }

    /// The inbound request's id (a subscription's `fromMsgId`).
    #[must_use]
    pub fn msg_id(&self) -> MsgId {
        self.msg_id
    }
}

/// Streams blob read responses back to an inbound request.
#[derive(Clone)]
pub struct BlobResponder {
    channel: Arc<dyn Channel>,
    msg_id: MsgId,
}

impl BlobResponder {
    /// Send one response message of the stream.
    pub async fn send(&self, response: ReadBlobResponse) -> Result<()> {
        let frame = encode_frame(&PeerMessage::ReadBlobResponse(response))?;
        self.channel.send_reply(self.msg_id, frame).await
    }

    /// The inbound request's id.
    #[must_use]
    pub fn msg_id(&self) -> MsgId {
        self.msg_id
    }
}

/// The application seam: what the local side serves to the remote peer.
///
/// Every method sees a request that already passed permission enforcement
/// and key rewriting. Default implementations decline, so a service only
/// overrides what it actually serves.
#[async_trait]
pub trait PeerService: Send + Sync {
    /// Serve a fetch; stream responses through the responder.
    async fn fetch(&self, request: FetchRequest, responder: FetchResponder) {
        let _ = request;
        let _ = responder
            .send(FetchResponse::error(Status::Error, "fetch not served"))
            .await;
    }

    /// Serve a store.
    async fn store(&self, request: StoreRequest) -> StoreResponse {
        let _ = request;
        StoreResponse {
            status: Status::Error,
            error: "store not served".to_string(),
            ..Default::default()
        }
    }

    /// Serve a blob read; stream chunks through the responder.
    async fn read_blob(&self, request: ReadBlobRequest, responder: BlobResponder) {
        let _ = request;
        let _ = responder
            .send(ReadBlobResponse {
                status: Status::Error,
                error: "read blob not served".to_string(),
                seq: 0,
                end_seq: 0,
                data: Vec::new(),
                pos: 0,
                blob_length: 0,
            })
            .await;
    }

    /// Serve a blob write.
    async fn write_blob(&self, request: WriteBlobRequest) -> WriteBlobResponse {
        let _ = request;
        WriteBlobResponse {
            status: Status::Error,
            error: "write blob not served".to_string(),
            current_length: 0,
        }
    }

    /// A subscription was cancelled; tear down its downstream.
    async fn unsubscribe(&self, subscription: Option<Subscription>, request: UnsubscribeRequest) {
        let _ = (subscription, request);
    }

    /// Serve an application-layer message.
    async fn generic_message(&self, request: GenericMessageRequest) -> GenericMessageResponse {
        let _ = request;
        GenericMessageResponse {
            status: Status::Error,
            error: "generic message not served".to_string(),
            data: Vec::new(),
        }
    }
}

enum PendingKind {
    Fetch {
        handle: ResponseHandle<FetchResponse>,
        multi: bool,
    },
    ReadBlob(ResponseHandle<ReadBlobResponse>),
    Store(ResponseHandle<StoreResponse>),
    WriteBlob(ResponseHandle<WriteBlobResponse>),
    Unsubscribe(ResponseHandle<UnsubscribeResponse>),
    Generic(ResponseHandle<GenericMessageResponse>),
}

/// Request/response client over one handshaked channel.
pub struct PeerClient {
    channel: Arc<dyn Channel>,
    conf: PeerConf,
    perms: Permissions,
    remote: PeerProps,
    local_public_key: Vec<u8>,
    pending: Arc<Mutex<HashMap<MsgId, PendingKind>>>,
    subscriptions: Subscriptions,
}

impl PeerClient {
    /// Build a client, enforcing the handshake requirements.
    ///
    /// Besides version, clock-skew, and format checks, a presented auth
    /// cert must be valid at the local clock and must actually authorize
    /// the key that performed the handshake.
    pub fn new(
        channel: Arc<dyn Channel>,
        conf: PeerConf,
        perms: Permissions,
        remote: PeerProps,
        local_public_key: Vec<u8>,
        local_clock: u64,
    ) -> Result<Self> {
        remote
            .validate_against(
                conf.version,
                local_clock,
                conf.max_clock_skew,
                &conf.supported_formats,
            )
            .map_err(|e| PeerError::Handshake(e.to_string()))?;
        if let Some(cert_bytes) = &remote.auth_cert {
            let cert = AuthCert::decode(cert_bytes)
                .map_err(|e| PeerError::Handshake(format!("auth cert: {e}")))?;
            cert.validate(false, Some(local_clock))
                .map_err(|e| PeerError::Handshake(format!("auth cert: {e}")))?;
            let authorized = cert
                .authorizes(&remote.handshaked_public_key)
                .map_err(|e| PeerError::Handshake(format!("auth cert: {e}")))?;
            if !authorized {
                return Err(PeerError::Handshake(
                    "auth cert does not authorize the handshaked key".to_string(),
                ));
            }
            if let Some(claimed) = &remote.auth_cert_public_key {
                let owner = cert
                    .model()
                    .owner()
                    .map_err(|e| PeerError::Handshake(format!("auth cert: {e}")))?;
                if owner.as_bytes() != claimed.as_slice() {
                    return Err(PeerError::Handshake(
                        "auth cert owner does not match the claimed key".to_string(),
                    ));
                }
            }
        }
        Ok(Self {
            channel,
            conf,
            perms,
            remote,
            local_public_key,
            pending: Arc::new(Mutex::new(HashMap::new())),
            subscriptions: Subscriptions::new(),
        })
    }

    /// The verified key of the remote peer.
    #[must_use]
    pub fn remote_public_key(&self) -> &[u8] {
        self.remote.effective_public_key()
    }

    /// The local side's key.
    #[must_use]
    pub fn local_public_key(&self) -> &[u8] {
        &self.local_public_key
    }

    /// The remote peer's handshake properties.
    #[must_use]
    pub fn remote_props(&self) -> &PeerProps {
        &self.remote
    }

    /// The server-side subscription table.
    #[must_use]
    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// The underlying channel.
    #[must_use]
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    // ------------------------------------------------------------------
    // Outbound requests
    // ------------------------------------------------------------------

    /// Issue a fetch; replies stream through the returned handle.
    #[instrument(skip(self, request), fields(trigger = request.query.trigger_interval > 0))]
    pub async fn fetch(&self, request: FetchRequest) -> Result<ResponseHandle<FetchResponse>> {
        let multi = !request.query.trigger_node_id.is_empty()
            || request.query.trigger_interval > 0;
        let frame = encode_frame(&PeerMessage::FetchRequest(request))?;
        let msg_id = self.channel.send_request(frame).await?;
        let handle = ResponseHandle::new(msg_id);
        self.pending.lock().insert(
            msg_id,
            PendingKind::Fetch {
                handle: handle.clone(),
                multi,
            },
        );
        self.spawn_watchdog(handle.clone());
        Ok(handle)
    }

    /// Issue a store and await its single reply.
    pub async fn store(&self, request: StoreRequest) -> Result<StoreResponse> {
        let frame = encode_frame(&PeerMessage::StoreRequest(request))?;
        self.single_request(frame, PendingKind::Store).await
    }

    /// Issue a blob read; chunks stream through the returned handle.
    pub async fn read_blob(
        &self,
        request: ReadBlobRequest,
    ) -> Result<ResponseHandle<ReadBlobResponse>> {
        let frame = encode_frame(&PeerMessage::ReadBlobRequest(request))?;
        let msg_id = self.channel.send_request(frame).await?;
        let handle = ResponseHandle::new(msg_id);
        self.pending
            .lock()
            .insert(msg_id, PendingKind::ReadBlob(handle.clone()));
        self.spawn_watchdog(handle.clone());
        Ok(handle)
    }

    /// Issue a blob write and await its single reply.
    pub async fn write_blob(&self, request: WriteBlobRequest) -> Result<WriteBlobResponse> {
        let frame = encode_frame(&PeerMessage::WriteBlobRequest(request))?;
        self.single_request(frame, PendingKind::WriteBlob).await
    }

    /// Cancel a subscription, best-effort.
    ///
    /// The request is sent and the local mapping freed immediately, without
    /// waiting for acknowledgement.
    pub async fn unsubscribe(
        &self,
        original_msg_id: MsgId,
        target_public_key: Vec<u8>,
    ) -> Result<()> {
        self.cancel(original_msg_id, CancelReason::Local);
        let request = UnsubscribeRequest {
            original_msg_id: original_msg_id.to_vec(),
            target_public_key,
        };
        let frame = encode_frame(&PeerMessage::UnsubscribeRequest(request))?;
        let msg_id = self.channel.send_request(frame).await?;
        // The response is ignored; free the routing slot right away.
        self.channel.cancel(msg_id);
        Ok(())
    }

    /// Send an application-layer message and await its reply.
    pub async fn generic_message(
        &self,
        request: GenericMessageRequest,
    ) -> Result<GenericMessageResponse> {
        let frame = encode_frame(&PeerMessage::GenericMessageRequest(request))?;
        self.single_request(frame, PendingKind::Generic).await
    }

    /// Cancel a pending request locally.
    pub fn cancel(&self, msg_id: MsgId, reason: CancelReason) {
        let entry = self.pending.lock().remove(&msg_id);
        if let Some(entry) = entry {
            cancel_entry(&entry, reason);
        }
        self.channel.cancel(msg_id);
    }

    async fn single_request<T: Clone + Send + 'static>(
        &self,
        frame: Vec<u8>,
        wrap: impl FnOnce(ResponseHandle<T>) -> PendingKind,
    ) -> Result<T> {
        let msg_id = self.channel.send_request(frame).await?;
        let handle: ResponseHandle<T> = ResponseHandle::new(msg_id);
        self.pending.lock().insert(msg_id, wrap(handle.clone()));

        let outcome = tokio::time::timeout(self.conf.request_timeout, handle.recv()).await;
        match outcome {
            Ok(Ok(Some(response))) => Ok(response),
            Ok(Ok(None)) => Err(PeerError::Cancelled(CancelReason::Local)),
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => {
                self.cancel(msg_id, CancelReason::Timeout);
                Err(PeerError::Cancelled(CancelReason::Timeout))
            }
        }
    }

    fn spawn_watchdog<T: Clone + Send + 'static>(&self, handle: ResponseHandle<T>) {
        let channel = Arc::clone(&self.channel);
        let pending = Arc::clone(&self.pending);
        let request_timeout = self.conf.request_timeout;
        let stream_timeout = self.conf.stream_timeout;
        tokio::spawn(async move {
            let mut phase_rx = handle.phase_receiver();
            loop {
                let (phase, _generation) = *phase_rx.borrow_and_update();
                match phase {
                    StreamPhase::Finished => break,
                    StreamPhase::BetweenStreams => {
                        // A subscription waits indefinitely for the next
                        // trigger; only a phase change wakes us.
                        if phase_rx.changed().await.is_err() {
                            break;
                        }
                    }
                    StreamPhase::AwaitingFirst | StreamPhase::Streaming => {
                        let timeout = if phase == StreamPhase::AwaitingFirst {
                            request_timeout
                        } else {
                            stream_timeout
                        };
                        tokio::select! {
                            changed = phase_rx.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                            () = tokio::time::sleep(timeout) => {
                                handle.cancel(CancelReason::Timeout);
                                pending.lock().remove(&handle.msg_id());
                                channel.cancel(handle.msg_id());
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    /// Drive the channel until it closes.
    ///
    /// Inbound requests pass permission enforcement and go to the service;
    /// replies feed their pending handles. Store and other single-reply
    /// requests are served inline so they apply in arrival order; fetch and
    /// blob reads are spawned since they may stream for a long time.
    pub async fn run(&self, service: Arc<dyn PeerService>) {
        loop {
            match self.channel.next_event().await {
                ChannelEvent::Request { msg_id, frame } => {
                    self.handle_request(msg_id, frame, &service).await;
                }
                ChannelEvent::Reply { msg_id, frame } => {
                    self.handle_reply(msg_id, frame);
                }
                ChannelEvent::Closed => {
                    debug!("channel closed, cancelling pending requests");
                    let entries: Vec<PendingKind> =
                        self.pending.lock().drain().map(|(_, entry)| entry).collect();
                    for entry in entries {
                        cancel_entry(&entry, CancelReason::Closed);
                    }
                    self.subscriptions.drain();
                    break;
                }
            }
        }
    }

    async fn handle_request(&self, msg_id: MsgId, frame: Vec<u8>, service: &Arc<dyn PeerService>) {
        let message = match decode_frame(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(%msg_id, error = %e, "malformed inbound request");
                let response = FetchResponse::error(Status::Malformed, e.to_string());
                let _ = self.reply_fetch(msg_id, response).await;
                return;
            }
        };
        let remote_key = self.remote_public_key().to_vec();
        let locality = Locality {
            region: self.conf.region.clone(),
            jurisdiction: self.conf.jurisdiction.clone(),
            remote_region: self.remote.region.clone(),
            remote_jurisdiction: self.remote.jurisdiction.clone(),
        };

        match message {
            PeerMessage::FetchRequest(mut request) => {
                if let Err(denied) =
                    enforce_fetch(&self.perms, &locality, &remote_key, &mut request)
                {
                    debug!(%msg_id, %denied, "fetch denied");
                    let _ = self
                        .reply_fetch(msg_id, FetchResponse::error(Status::NotAllowed, denied))
                        .await;
                    return;
                }
                let wants_trigger = !request.query.trigger_node_id.is_empty()
                    || request.query.trigger_interval > 0;
                if wants_trigger {
                    self.subscriptions.add(Subscription {
                        from_msg_id: msg_id,
                        original_msg_id: msg_id,
                        target_public_key: request.query.target_public_key.clone(),
                    });
                }
                let responder = FetchResponder {
                    channel: Arc::clone(&self.channel),
                    msg_id,
                };
                let service = Arc::clone(service);
                tokio::spawn(async move {
                    service.fetch(request, responder).await;
                });
            }
            PeerMessage::StoreRequest(mut request) => {
                let mut source = std::mem::take(&mut request.source_public_key);
                let gate = enforce_simple(
                    self.perms.allow_store,
                    "store",
                    &self.perms,
                    &remote_key,
                    &mut source,
                );
                request.source_public_key = source;
                match gate {
                    Err(denied) => {
                        let response = StoreResponse {
                            status: Status::NotAllowed,
                            error: denied,
                            ..Default::default()
                        };
                        let _ = self
                            .send_reply_message(msg_id, PeerMessage::StoreResponse(response))
                            .await;
                    }
                    Ok(()) => {
                        let response = service.store(request).await;
                        let _ = self
                            .send_reply_message(msg_id, PeerMessage::StoreResponse(response))
                            .await;
                    }
                }
            }
            PeerMessage::ReadBlobRequest(mut request) => {
                let mut source = std::mem::take(&mut request.source_public_key);
                let gate = enforce_simple(
                    self.perms.allow_read_blob,
                    "read blob",
                    &self.perms,
                    &remote_key,
                    &mut source,
                );
                request.source_public_key = source;
                match gate {
                    Err(denied) => {
                        let response = ReadBlobResponse {
                            status: Status::NotAllowed,
                            error: denied,
                            seq: 0,
                            end_seq: 0,
                            data: Vec::new(),
                            pos: 0,
                            blob_length: 0,
                        };
                        let _ = self
                            .send_reply_message(msg_id, PeerMessage::ReadBlobResponse(response))
                            .await;
                    }
                    Ok(()) => {
                        let responder = BlobResponder {
                            channel: Arc::clone(&self.channel),
                            msg_id,
                        };
                        let service = Arc::clone(service);
                        tokio::spawn(async move {
                            service.read_blob(request, responder).await;
                        });
                    }
                }
            }
            PeerMessage::WriteBlobRequest(mut request) => {
                let mut source = std::mem::take(&mut request.source_public_key);
                let gate = enforce_simple(
                    self.perms.allow_write_blob,
                    "write blob",
                    &self.perms,
                    &remote_key,
                    &mut source,
                );
                request.source_public_key = source;
                match gate {
                    Err(denied) => {
                        let response = WriteBlobResponse {
                            status: Status::NotAllowed,
                            error: denied,
                            current_length: 0,
                        };
                        let _ = self
                            .send_reply_message(msg_id, PeerMessage::WriteBlobResponse(response))
                            .await;
                    }
                    Ok(()) => {
                        let response = service.write_blob(request).await;
                        let _ = self
                            .send_reply_message(msg_id, PeerMessage::WriteBlobResponse(response))
                            .await;
                    }
                }
            }
            PeerMessage::UnsubscribeRequest(request) => {
                let subscription = MsgId::from_slice(&request.original_msg_id).and_then(|id| {
                    self.subscriptions.remove(id, &request.target_public_key)
                });
                service.unsubscribe(subscription, request).await;
                let response = UnsubscribeResponse {
                    status: Status::Result,
                    error: String::new(),
                };
                let _ = self
                    .send_reply_message(msg_id, PeerMessage::UnsubscribeResponse(response))
                    .await;
            }
            PeerMessage::GenericMessageRequest(mut request) => {
                rewrite_source_key(&self.perms, &remote_key, &mut request.source_public_key);
                let response = service.generic_message(request).await;
                let _ = self
                    .send_reply_message(msg_id, PeerMessage::GenericMessageResponse(response))
                    .await;
            }
            other => {
                warn!(%msg_id, opcode = other.opcode(), "response opcode arrived as request");
            }
        }
    }

    fn handle_reply(&self, msg_id: MsgId, frame: Vec<u8>) {
        let message = match decode_frame(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(%msg_id, error = %e, "malformed reply");
                self.cancel(
                    msg_id,
                    CancelReason::Fatal {
                        status: Status::Malformed,
                        error: e.to_string(),
                    },
                );
                return;
            }
        };

        // The entry leaves the table while its reply is processed and is
        // re-inserted only when the stream continues; `handle_reply` runs
        // serially on the run loop, so no reply can race the gap.
        let Some(entry) = self.pending.lock().remove(&msg_id) else {
            debug!(%msg_id, "reply for unknown request");
            return;
        };

        match (entry, message) {
            (PendingKind::Fetch { handle, multi }, PeerMessage::FetchResponse(response)) => {
                if response.is_abort() || !response.status.is_ok() {
                    handle.cancel(CancelReason::Fatal {
                        status: response.status,
                        error: response.error,
                    });
                    self.channel.cancel(msg_id);
                    return;
                }
                let count = response.nodes.len() + response.embed.len();
                if handle.add_accumulated(count, self.conf.max_accumulated) {
                    handle.cancel(CancelReason::Overflow);
                    self.channel.cancel(msg_id);
                    return;
                }
                let ends_stream = response.is_end_of_stream();
                handle.push_reply(response);
                if ends_stream {
                    handle.finish_batch();
                    if multi {
                        handle.set_phase(StreamPhase::BetweenStreams);
                    } else {
                        handle.mark_done();
                        self.channel.cancel(msg_id);
                        return;
                    }
                } else {
                    handle.set_phase(StreamPhase::Streaming);
                }
                if !handle.is_cancelled() {
                    self.pending
                        .lock()
                        .insert(msg_id, PendingKind::Fetch { handle, multi });
                }
            }
            (PendingKind::ReadBlob(handle), PeerMessage::ReadBlobResponse(response)) => {
                if response.seq == 0 || !response.status.is_ok() {
                    handle.cancel(CancelReason::Fatal {
                        status: response.status,
                        error: response.error,
                    });
                    self.channel.cancel(msg_id);
                    return;
                }
                let ends_stream = response.seq == response.end_seq && response.end_seq > 0;
                handle.push_reply(response);
                if ends_stream {
                    handle.finish_batch();
                    handle.mark_done();
                    self.channel.cancel(msg_id);
                    return;
                }
                handle.set_phase(StreamPhase::Streaming);
                if !handle.is_cancelled() {
                    self.pending.lock().insert(msg_id, PendingKind::ReadBlob(handle));
                }
            }
            (PendingKind::Store(handle), PeerMessage::StoreResponse(response)) => {
                handle.push_reply(response);
                handle.mark_done();
                self.channel.cancel(msg_id);
            }
            (PendingKind::WriteBlob(handle), PeerMessage::WriteBlobResponse(response)) => {
                handle.push_reply(response);
                handle.mark_done();
                self.channel.cancel(msg_id);
            }
            (PendingKind::Unsubscribe(handle), PeerMessage::UnsubscribeResponse(response)) => {
                handle.push_reply(response);
                handle.mark_done();
                self.channel.cancel(msg_id);
            }
            (PendingKind::Generic(handle), PeerMessage::GenericMessageResponse(response)) => {
                handle.push_reply(response);
                handle.mark_done();
                self.channel.cancel(msg_id);
            }
            (entry, other) => {
                warn!(%msg_id, opcode = other.opcode(), "reply opcode mismatch");
                cancel_entry(
                    &entry,
                    CancelReason::Fatal {
                        status: Status::Mismatch,
                        error: "reply opcode does not match request".to_string(),
                    },
                );
                self.channel.cancel(msg_id);
            }
        }
    }

    async fn reply_fetch(&self, msg_id: MsgId, response: FetchResponse) -> Result<()> {
        self.send_reply_message(msg_id, PeerMessage::FetchResponse(response))
            .await
    }

    async fn send_reply_message(&self, msg_id: MsgId, message: PeerMessage) -> Result<()> {
        let frame = encode_frame(&message)?;
        self.channel.send_reply(msg_id, frame).await
    }
}

fn cancel_entry(entry: &PendingKind, reason: CancelReason) {
    match entry {
        PendingKind::Fetch { handle, .. } => handle.cancel(reason),
        PendingKind::ReadBlob(handle) => handle.cancel(reason),
        PendingKind::Store(handle) => handle.cancel(reason),
        PendingKind::WriteBlob(handle) => handle.cancel(reason),
        PendingKind::Unsubscribe(handle) => handle.cancel(reason),
        PendingKind::Generic(handle) => handle.cancel(reason),
    }
}
