//! End-to-end peer client tests over the in-memory channel pair.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use trellis_peer::{
    CancelReason, FetchResponder, PeerClient, PeerConf, PeerError, PeerService, Subscription,
};
use trellis_protocol::{
    FetchQuery, FetchRequest, FetchResponse, GenericMessageRequest, GenericMessageResponse,
    Match, Permissions, Status, StoreRequest, StoreResponse, UnsubscribeRequest,
};
use trellis_testkit::{channel_pair, init_tracing, keypair_from_seed, peer_props};

fn client_pair(
    perms_a: Permissions,
    perms_b: Permissions,
) -> (Arc<PeerClient>, Arc<PeerClient>) {
    let key_a = keypair_from_seed(1);
    let key_b = keypair_from_seed(2);
    let (chan_a, chan_b) = channel_pair();
    let conf = PeerConf {
        request_timeout: Duration::from_secs(5),
        stream_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let a = Arc::new(
        PeerClient::new(
            chan_a,
            conf.clone(),
            perms_a,
            peer_props(key_b.public_key().as_bytes()),
            key_a.public_key().as_bytes().to_vec(),
            1_700_000_000_000,
        )
        .unwrap(),
    );
    let b = Arc::new(
        PeerClient::new(
            chan_b,
            conf,
            perms_b,
            peer_props(key_a.public_key().as_bytes()),
            key_b.public_key().as_bytes().to_vec(),
            1_700_000_000_000,
        )
        .unwrap(),
    );
    (a, b)
}

fn run(client: &Arc<PeerClient>, service: Arc<dyn PeerService>) {
    let client = Arc::clone(client);
    tokio::spawn(async move {
        client.run(service).await;
    });
}

fn fetch_request(node_type: &[u8]) -> FetchRequest {
    FetchRequest {
        query: FetchQuery {
            match_clauses: vec![Match {
                node_type: node_type.to_vec(),
                filters: Vec::new(),
                limit: 0,
            }],
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Streams three messages for every fetch.
struct ThreeChunkService {
    invoked: AtomicBool,
}

#[async_trait]
impl PeerService for ThreeChunkService {
    async fn fetch(&self, _request: FetchRequest, responder: FetchResponder) {
        self.invoked.store(true, Ordering::SeqCst);
        for seq in 1..=3u32 {
            let mut response =
                FetchResponse::result(vec![format!("node-{seq}").into_bytes()], vec![]);
            response.seq = seq;
            response.end_seq = 3;
            responder.send(response).await.unwrap();
        }
    }
}

#[tokio::test]
async fn streamed_fetch_delivers_three_replies_then_closes() {
    init_tracing();
    let (a, b) = client_pair(Permissions::locked(), Permissions::permissive());
    run(&a, Arc::new(NullService));
    let service = Arc::new(ThreeChunkService {
        invoked: AtomicBool::new(false),
    });
    run(&b, service.clone());

    let handle = a
        .fetch(fetch_request(trellis_model::kind::DATA_NODE_TYPE))
        .await
        .unwrap();

    let mut replies = Vec::new();
    while let Some(response) = handle.recv().await.unwrap() {
        replies.push(response);
    }
    assert_eq!(replies.len(), 3);
    assert_eq!(replies[2].seq, 3);
    assert_eq!(replies[2].end_seq, 3);
    assert_eq!(handle.batch_count(), 1);
    assert!(handle.is_done());
    assert!(service.invoked.load(Ordering::SeqCst));
}

/// Never invoked; used to assert permission denials short-circuit.
struct NullService;

#[async_trait]
impl PeerService for NullService {}

struct TrackingService {
    fetch_invoked: AtomicBool,
}

#[async_trait]
impl PeerService for TrackingService {
    async fn fetch(&self, _request: FetchRequest, responder: FetchResponder) {
        self.fetch_invoked.store(true, Ordering::SeqCst);
        let _ = responder
            .send(FetchResponse::result(vec![], vec![]))
            .await;
    }
}

#[tokio::test]
async fn fetch_outside_allowed_prefix_returns_not_allowed() {
    init_tracing();
    let perms_b = Permissions {
        allow_node_types: vec![vec![0x01, 0x02, 0x01]],
        ..Permissions::default()
    };
    let (a, b) = client_pair(Permissions::locked(), perms_b);
    run(&a, Arc::new(NullService));
    let service = Arc::new(TrackingService {
        fetch_invoked: AtomicBool::new(false),
    });
    run(&b, service.clone());

    let handle = a.fetch(fetch_request(&[0x01, 0x02, 0x02])).await.unwrap();
    match handle.recv().await {
        Err(PeerError::Cancelled(CancelReason::Fatal { status, error })) => {
            assert_eq!(status, Status::NotAllowed);
            assert!(!error.is_empty());
        }
        other => panic!("expected NotAllowed, got {other:?}"),
    }
    assert!(!service.fetch_invoked.load(Ordering::SeqCst));
}

#[tokio::test]
async fn locked_peer_denies_store_but_serves_generic_messages() {
    init_tracing();
    let (a, b) = client_pair(Permissions::locked(), Permissions::locked());
    run(&a, Arc::new(NullService));
    run(&b, Arc::new(EchoService));

    let store = a
        .store(StoreRequest {
            nodes: vec![serde_bytes::ByteBuf::from(b"image".to_vec())],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(store.status, Status::NotAllowed);
    assert!(!store.error.is_empty());

    let echo = a
        .generic_message(GenericMessageRequest {
            action: "ping".into(),
            source_public_key: b"claimed".to_vec(),
            data: b"payload".to_vec(),
        })
        .await
        .unwrap();
    assert_eq!(echo.status, Status::Result);
    assert_eq!(echo.data, b"payload");
    // The claimed source key was rewritten to the verified remote key.
    assert_eq!(echo.error, hex::encode(keypair_from_seed(1).public_key().as_bytes()));
}

/// Echoes generic messages, reporting the observed source key.
struct EchoService;

#[async_trait]
impl PeerService for EchoService {
    async fn generic_message(&self, request: GenericMessageRequest) -> GenericMessageResponse {
        GenericMessageResponse {
            status: Status::Result,
            error: hex::encode(&request.source_public_key),
            data: request.data,
        }
    }
}

/// A subscription service: first stream immediately, second on demand.
struct SubscriptionService {
    responder_slot: parking_lot::Mutex<Option<FetchResponder>>,
    ready: Notify,
    unsubscribed: AtomicU32,
}

#[async_trait]
impl PeerService for SubscriptionService {
    async fn fetch(&self, _request: FetchRequest, responder: FetchResponder) {
        // First stream: two messages.
        for seq in 1..=2u32 {
            let mut response = FetchResponse::result(vec![b"first".to_vec()], vec![]);
            response.seq = seq;
            response.end_seq = 2;
            responder.send(response).await.unwrap();
        }
        *self.responder_slot.lock() = Some(responder);
        self.ready.notify_one();
    }

    async fn unsubscribe(
        &self,
        subscription: Option<Subscription>,
        _request: UnsubscribeRequest,
    ) {
        assert!(subscription.is_some());
        self.unsubscribed.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn subscription_delivers_multiple_streams_and_unsubscribes() {
    init_tracing();
    let (a, b) = client_pair(Permissions::locked(), Permissions::permissive());
    run(&a, Arc::new(NullService));
    let service = Arc::new(SubscriptionService {
        responder_slot: parking_lot::Mutex::new(None),
        ready: Notify::new(),
        unsubscribed: AtomicU32::new(0),
    });
    run(&b, service.clone());

    let mut request = fetch_request(trellis_model::kind::DATA_NODE_TYPE);
    request.query.trigger_interval = 60;
    let handle = a.fetch(request).await.unwrap();

    // First stream: two replies, then the handle idles between streams.
    assert!(handle.recv().await.unwrap().is_some());
    assert!(handle.recv().await.unwrap().is_some());
    service.ready.notified().await;
    assert_eq!(handle.batch_count(), 1);
    assert!(!handle.is_done());

    // A trigger fires the second stream.
    let responder = service.responder_slot.lock().take().unwrap();
    let mut response = FetchResponse::result(vec![b"second".to_vec()], vec![]);
    response.seq = 1;
    response.end_seq = 1;
    responder.send(response).await.unwrap();

    let second = handle.recv().await.unwrap().unwrap();
    assert_eq!(second.nodes[0].as_slice(), b"second");
    assert_eq!(handle.batch_count(), 2);

    // Unsubscribe: local mapping freed immediately, remote teardown fires.
    a.unsubscribe(handle.msg_id(), Vec::new()).await.unwrap();
    assert!(matches!(
        handle.recv().await,
        Err(PeerError::Cancelled(CancelReason::Local))
    ));
    // Give the remote side a moment to process the unsubscribe.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.unsubscribed.load(Ordering::SeqCst), 1);
    assert!(b.subscriptions().is_empty());
}

#[tokio::test]
async fn fatal_seq_zero_cancels_the_stream() {
    init_tracing();
    struct AbortService;
    #[async_trait]
    impl PeerService for AbortService {
        async fn fetch(&self, _request: FetchRequest, responder: FetchResponder) {
            let mut first = FetchResponse::result(vec![b"n".to_vec()], vec![]);
            first.seq = 1;
            first.end_seq = 3;
            responder.send(first).await.unwrap();
            responder
                .send(FetchResponse::error(Status::FetchFailed, "storage gone"))
                .await
                .unwrap();
        }
    }

    let (a, b) = client_pair(Permissions::locked(), Permissions::permissive());
    run(&a, Arc::new(NullService));
    run(&b, Arc::new(AbortService));

    let handle = a
        .fetch(fetch_request(trellis_model::kind::DATA_NODE_TYPE))
        .await
        .unwrap();
    assert!(handle.recv().await.unwrap().is_some());
    match handle.recv().await {
        Err(PeerError::Cancelled(CancelReason::Fatal { status, .. })) => {
            assert_eq!(status, Status::FetchFailed);
        }
        other => panic!("expected fatal cancel, got {other:?}"),
    }
    assert!(handle.is_cancelled());
}

#[tokio::test]
async fn stream_timeout_cancels_the_handle() {
    init_tracing();
    struct StallService;
    #[async_trait]
    impl PeerService for StallService {
        async fn fetch(&self, _request: FetchRequest, _responder: FetchResponder) {
            // Never reply; the client's request timeout must fire.
        }
    }

    let key_a = keypair_from_seed(1);
    let key_b = keypair_from_seed(2);
    let (chan_a, chan_b) = channel_pair();
    let conf = PeerConf {
        request_timeout: Duration::from_millis(100),
        stream_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let a = Arc::new(
        PeerClient::new(
            chan_a,
            conf.clone(),
            Permissions::locked(),
            peer_props(key_b.public_key().as_bytes()),
            key_a.public_key().as_bytes().to_vec(),
            1_700_000_000_000,
        )
        .unwrap(),
    );
    let b = Arc::new(
        PeerClient::new(
            chan_b,
            conf,
            Permissions::permissive(),
            peer_props(key_a.public_key().as_bytes()),
            key_b.public_key().as_bytes().to_vec(),
            1_700_000_000_000,
        )
        .unwrap(),
    );
    run(&a, Arc::new(NullService));
    run(&b, Arc::new(StallService));

    let handle = a
        .fetch(fetch_request(trellis_model::kind::DATA_NODE_TYPE))
        .await
        .unwrap();
    assert!(matches!(
        handle.recv().await,
        Err(PeerError::Cancelled(CancelReason::Timeout))
    ));
}

#[tokio::test]
async fn closed_channel_cancels_pending_requests() {
    init_tracing();
    struct SilentService;
    #[async_trait]
    impl PeerService for SilentService {
        async fn fetch(&self, _request: FetchRequest, _responder: FetchResponder) {}
    }

    let (a, b) = client_pair(Permissions::locked(), Permissions::permissive());
    run(&a, Arc::new(NullService));
    run(&b, Arc::new(SilentService));

    let handle = a
        .fetch(fetch_request(trellis_model::kind::DATA_NODE_TYPE))
        .await
        .unwrap();
    // The remote closes; the pending fetch funnels into cancel.
    b.channel().close().await;
    assert!(matches!(
        handle.recv().await,
        Err(PeerError::Cancelled(CancelReason::Closed))
    ));
}

#[tokio::test]
async fn cancel_event_fires_once_across_paths() {
    init_tracing();
    struct NeverReplies;
    #[async_trait]
    impl PeerService for NeverReplies {
        async fn fetch(&self, _request: FetchRequest, _responder: FetchResponder) {}
    }

    let (a, b) = client_pair(Permissions::locked(), Permissions::permissive());
    run(&a, Arc::new(NullService));
    run(&b, Arc::new(NeverReplies));

    let handle = a
        .fetch(fetch_request(trellis_model::kind::DATA_NODE_TYPE))
        .await
        .unwrap();
    let fired = Arc::new(AtomicU32::new(0));
    let fired_cb = Arc::clone(&fired);
    handle
        .on_cancel(move |_| {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    a.cancel(handle.msg_id(), CancelReason::Local);
    a.cancel(handle.msg_id(), CancelReason::Timeout);
    handle.cancel(CancelReason::Closed);

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(handle.on_cancel(|_| {}).is_err());
}
