//! Forwarder, extender, and auto-fetcher flows over in-memory channels.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use trellis_crypto::KeyPair;
use trellis_model::{LicenseNode, Node};
use trellis_peer::{
    FetchResponder, MuteList, PeerClient, PeerConf, PeerService,
};
use trellis_protocol::{
    FetchQuery, FetchRequest, FetchResponse, Match, Permissions, Status, StoreRequest,
    StoreResponse,
};
use trellis_relay::{AutoFetch, AutoFetcher, Extender, Forwarder, LocalSigner};
use trellis_testkit::{channel_pair, init_tracing, keypair_from_seed, license_draft, peer_props};

fn conf() -> PeerConf {
    PeerConf {
        request_timeout: Duration::from_secs(5),
        stream_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Build a connected client pair with the given permissions on each side.
fn connect(
    key_left: &KeyPair,
    key_right: &KeyPair,
    perms_left: Permissions,
    perms_right: Permissions,
) -> (Arc<PeerClient>, Arc<PeerClient>) {
    let (chan_left, chan_right) = channel_pair();
    let left = Arc::new(
        PeerClient::new(
            chan_left,
            conf(),
            perms_left,
            peer_props(key_right.public_key().as_bytes()),
            key_left.public_key().as_bytes().to_vec(),
            1_700_000_000_000,
        )
        .unwrap(),
    );
    let right = Arc::new(
        PeerClient::new(
            chan_right,
            conf(),
            perms_right,
            peer_props(key_left.public_key().as_bytes()),
            key_right.public_key().as_bytes().to_vec(),
            1_700_000_000_000,
        )
        .unwrap(),
    );
    (left, right)
}

fn run(client: &Arc<PeerClient>, service: Arc<dyn PeerService>) {
    let client = Arc::clone(client);
    tokio::spawn(async move {
        client.run(service).await;
    });
}

struct NullService;

#[async_trait]
impl PeerService for NullService {}

fn fetch_request() -> FetchRequest {
    FetchRequest {
        query: FetchQuery {
            match_clauses: vec![Match {
                node_type: trellis_model::kind::DATA_NODE_TYPE.to_vec(),
                filters: Vec::new(),
                limit: 0,
            }],
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Serves a two-message stream with fixed payloads.
struct StreamingStorage {
    embed: Vec<Vec<u8>>,
}

#[async_trait]
impl PeerService for StreamingStorage {
    async fn fetch(&self, _request: FetchRequest, responder: FetchResponder) {
        for seq in 1..=2u32 {
            let mut response = FetchResponse::result(
                vec![format!("chunk-{seq}").into_bytes()],
                if seq == 1 { self.embed.clone() } else { vec![] },
            );
            response.seq = seq;
            response.end_seq = 2;
            responder.send(response).await.unwrap();
        }
    }
}

/// Records store requests and acknowledges them.
#[derive(Default)]
struct RecordingStorage {
    requests: Mutex<Vec<StoreRequest>>,
}

#[async_trait]
impl PeerService for RecordingStorage {
    async fn store(&self, request: StoreRequest) -> StoreResponse {
        let stored = request
            .nodes
            .iter()
            .map(|image| serde_bytes::ByteBuf::from(image.to_vec()))
            .collect();
        self.requests.lock().push(request);
        StoreResponse {
            status: Status::Result,
            error: String::new(),
            stored_id1s: stored,
            missing_blob_id1s: Vec::new(),
            missing_blob_sizes: Vec::new(),
        }
    }
}

#[tokio::test]
async fn forwarder_tunnels_a_streamed_fetch() {
    init_tracing();
    let key_client = keypair_from_seed(1);
    let key_relay = keypair_from_seed(2);
    let key_server = keypair_from_seed(3);

    // client <-> relay-near, relay-far <-> server
    let (client, relay_near) = connect(
        &key_client,
        &key_relay,
        Permissions::locked(),
        Permissions::permissive(),
    );
    let (relay_far, server) = connect(
        &key_relay,
        &key_server,
        Permissions::locked(),
        Permissions::permissive(),
    );

    run(&client, Arc::new(NullService));
    run(&server, Arc::new(StreamingStorage { embed: vec![] }));
    run(&relay_far, Arc::new(NullService));

    let forwarder = Arc::new(Forwarder::new(
        Arc::clone(&relay_near),
        Arc::clone(&relay_far),
        MuteList::new(),
    ));
    run(&relay_near, forwarder);

    let handle = client.fetch(fetch_request()).await.unwrap();
    let mut payloads = Vec::new();
    while let Some(response) = handle.recv().await.unwrap() {
        for node in &response.nodes {
            payloads.push(node.to_vec());
        }
    }
    assert_eq!(payloads, vec![b"chunk-1".to_vec(), b"chunk-2".to_vec()]);
    assert_eq!(handle.batch_count(), 1);
}

#[tokio::test]
async fn forwarder_surfaces_far_side_denials_without_closing() {
    init_tracing();
    let key_client = keypair_from_seed(1);
    let key_relay = keypair_from_seed(2);
    let key_server = keypair_from_seed(3);

    let (client, relay_near) = connect(
        &key_client,
        &key_relay,
        Permissions::locked(),
        Permissions::permissive(),
    );
    // The far server denies stores.
    let (relay_far, server) = connect(
        &key_relay,
        &key_server,
        Permissions::locked(),
        Permissions::locked(),
    );

    run(&client, Arc::new(NullService));
    run(&server, Arc::new(RecordingStorage::default()));
    run(&relay_far, Arc::new(NullService));
    let forwarder = Arc::new(Forwarder::new(
        Arc::clone(&relay_near),
        Arc::clone(&relay_far),
        MuteList::new(),
    ));
    run(&relay_near, forwarder);

    let response = client
        .store(StoreRequest {
            nodes: vec![serde_bytes::ByteBuf::from(b"image".to_vec())],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.status, Status::NotAllowed);
    assert!(!response.error.is_empty());
    // The tunnel stays usable after the denial.
    assert!(!client.channel().is_closed());
}

#[tokio::test]
async fn auto_fetcher_stores_fetched_nodes_with_mutes() {
    init_tracing();
    let key_local = keypair_from_seed(1);
    let key_server = keypair_from_seed(2);
    let key_storage = keypair_from_seed(3);

    // Server connection: we fetch from here.
    let (server_client, server) = connect(
        &key_local,
        &key_server,
        Permissions::locked(),
        Permissions::permissive(),
    );
    // Storage connection: we store there.
    let (storage_client, storage) = connect(
        &key_local,
        &key_storage,
        Permissions::locked(),
        Permissions::permissive(),
    );

    run(&server_client, Arc::new(NullService));
    run(&server, Arc::new(StreamingStorage { embed: vec![] }));
    run(&storage_client, Arc::new(NullService));
    let recording = Arc::new(RecordingStorage::default());
    run(&storage, recording.clone());

    let mutes = MuteList::new();
    let fetcher = AutoFetcher::new(
        Arc::clone(&server_client),
        Arc::clone(&storage_client),
        mutes.clone(),
    );
    let started = fetcher
        .add_fetch(AutoFetch {
            remote_public_key: key_server.public_key().as_bytes().to_vec(),
            fetch: fetch_request(),
            blob_size_max_limit: 0,
            reverse: false,
        })
        .await
        .unwrap();
    assert!(started);

    // Wait for both chunks to land in storage.
    for _ in 0..50 {
        if recording.requests.lock().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let requests = recording.requests.lock();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].nodes[0].as_slice(), b"chunk-1");
    assert_eq!(requests[1].nodes[0].as_slice(), b"chunk-2");
    // The originating fetch's msg id is muted in the store request.
    assert!(!requests[0].mute_msg_ids.is_empty());
}

#[tokio::test]
async fn auto_fetcher_skips_non_matching_remote() {
    init_tracing();
    let key_local = keypair_from_seed(1);
    let key_server = keypair_from_seed(2);

    let (server_client, server) = connect(
        &key_local,
        &key_server,
        Permissions::locked(),
        Permissions::permissive(),
    );
    run(&server_client, Arc::new(NullService));
    run(&server, Arc::new(StreamingStorage { embed: vec![] }));

    let fetcher = AutoFetcher::new(
        Arc::clone(&server_client),
        Arc::clone(&server_client),
        MuteList::new(),
    );
    let started = fetcher
        .add_fetch(AutoFetch {
            remote_public_key: vec![0xee; 32],
            fetch: fetch_request(),
            blob_size_max_limit: 0,
            reverse: false,
        })
        .await
        .unwrap();
    assert!(!started);
}

#[tokio::test]
async fn extender_signs_license_candidates_and_stores_them_onward() {
    init_tracing();
    let key_client = keypair_from_seed(1);
    let key_relay = keypair_from_seed(2);
    let key_server = keypair_from_seed(3);
    let key_target = keypair_from_seed(4);

    // An unsigned extension draft owned by the relay's signer key.
    let mut draft = license_draft(
        &key_relay,
        key_target.public_key().as_bytes(),
        [7u8; 32],
        [8u8; 32],
    );
    let candidate = draft.model_mut().pack().unwrap().to_vec();

    let (client, relay_near) = connect(
        &key_client,
        &key_relay,
        Permissions::locked(),
        Permissions::permissive(),
    );
    let (relay_far, server) = connect(
        &key_relay,
        &key_server,
        Permissions::locked(),
        Permissions::permissive(),
    );

    run(&client, Arc::new(NullService));
    struct ServerSide {
        streaming: StreamingStorage,
        recording: Arc<RecordingStorage>,
    }
    #[async_trait]
    impl PeerService for ServerSide {
        async fn fetch(&self, request: FetchRequest, responder: FetchResponder) {
            self.streaming.fetch(request, responder).await;
        }
        async fn store(&self, request: StoreRequest) -> StoreResponse {
            self.recording.store(request).await
        }
    }
    let recording = Arc::new(RecordingStorage::default());
    run(
        &server,
        Arc::new(ServerSide {
            streaming: StreamingStorage {
                embed: vec![candidate],
            },
            recording: recording.clone(),
        }),
    );
    run(&relay_far, Arc::new(NullService));

    let signer = Arc::new(LocalSigner::new(key_relay.clone()));
    let extender = Arc::new(Extender::new(
        Arc::clone(&relay_near),
        Arc::clone(&relay_far),
        MuteList::new(),
        signer,
        None,
    ));
    run(&relay_near, extender);

    let handle = client.fetch(fetch_request()).await.unwrap();
    while handle.recv().await.unwrap().is_some() {}

    // The signed license landed on the far side.
    for _ in 0..50 {
        if !recording.requests.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let requests = recording.requests.lock();
    assert_eq!(requests.len(), 1);
    let stored = LicenseNode::decode(requests[0].nodes[0].as_slice()).unwrap();
    assert!(stored.model().verify(false).unwrap());
    assert_eq!(
        stored.model().owner().unwrap().as_bytes(),
        key_relay.public_key().as_bytes()
    );
}
