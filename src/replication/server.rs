//! Replication server.
//!
//! Serves two event streams over HTTP:
//! - `GET /v1/replication`: long-lived stream of `REP` (broadcast) and
//!   `REPAIR` (targeted) events, one per connected peer.
//! - `GET /v1/sync`: one-shot stream of `SYNC` events carrying the full
//!   catalog state, closed once every namespace has been exported.
//!
//! A single dispatcher task owns the set of connected peers and serializes
//! broadcast, repair and peer (dis)connection traffic. Each peer stream is
//! written by its own task, which buffers encoded events (optionally gzip
//! compressed) and flushes them on a fixed tick.

use std::collections::HashMap;
use std::io;
use std::io::Write;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashSet;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use warp::http::header::CACHE_CONTROL;
use warp::http::header::CONTENT_ENCODING;
use warp::http::header::CONTENT_TYPE;
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::reply::Response;
use warp::Filter;
use warp::Reply;

use super::encode_event;
use super::sync_from_peer;
use super::HealthStatus;
use super::InMessage;
use super::NamespaceReplicator;
use super::OutMessage;
use super::PeerClient;
use super::Replication;
use super::ReplicationHealthMonitor;
use super::Replicator;
use super::SseEvent;
use super::SyncRequest;
use super::MEMBER_ID_HEADER;
use crate::utils::send_with_timeout;
use crate::Member;
use crate::MemberId;
use crate::Membership;
use crate::MembershipListener;
use crate::Namespace;
use crate::NetworkError;
use crate::Registrator;
use crate::ReplicationConfig;
use crate::ReplicationError;
use crate::Result;
use crate::CONNECTED_PEERS;
use crate::REPLICATION_DROPPED_EVENTS;
use crate::REPLICATION_EVENTS;

pub const REPLICATION_EVENT: &str = "REP";
pub const REPAIR_EVENT: &str = "REPAIR";
pub const SYNC_EVENT: &str = "SYNC";

pub struct ReplicationServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    self_member: Member,
    config: ReplicationConfig,
    http: reqwest::Client,
    membership: Arc<dyn Membership>,
    registrator: Arc<dyn Registrator>,

    /// Bound at construction, served once the initial sync is over
    listener: Mutex<Option<TcpListener>>,
    dispatcher_inputs: Mutex<Option<DispatcherInputs>>,

    broadcast_tx: mpsc::Sender<OutMessage>,
    repair_tx: mpsc::Sender<OutMessage>,
    peer_events_tx: mpsc::Sender<PeerEvent>,

    notification_tx: mpsc::Sender<InMessage>,
    notification_rx: Mutex<Option<mpsc::Receiver<InMessage>>>,
    sync_request_tx: mpsc::Sender<SyncRequest>,
    sync_request_rx: Mutex<Option<mpsc::Receiver<SyncRequest>>>,

    replicators: DashSet<Namespace>,
    clients: Mutex<HashMap<MemberId, Arc<PeerClient>>>,
    health: ReplicationHealthMonitor,

    next_connection_id: AtomicU64,
    done: CancellationToken,
}

impl ReplicationServer {
    /// Binds the replication listener on the registrator's self address.
    ///
    /// Nothing is served, and the cluster is not joined, until
    /// [`Replication::sync`] has run.
    pub async fn new(
        config: ReplicationConfig,
        membership: Arc<dyn Membership>,
        registrator: Arc<dyn Registrator>,
    ) -> Result<Self> {
        config.validate()?;
        let self_member = registrator.self_member();

        let address = self_member.socket_addr();
        let listener = TcpListener::bind(address).await.map_err(|source| NetworkError::Bind {
            address: address.to_string(),
            source,
        })?;

        let mut http = reqwest::Client::builder()
            .connect_timeout(config.send_timeout())
            .tcp_nodelay(true);
        if !config.gzip {
            http = http.no_gzip();
        }
        let http = http.build().map_err(NetworkError::Http)?;

        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_queue_size);
        let (repair_tx, repair_rx) = mpsc::channel(config.repair_queue_size);
        let (peer_events_tx, peer_events_rx) = mpsc::channel(config.peer_queue_size);
        let (notification_tx, notification_rx) = mpsc::channel(config.notification_queue_size);
        let (sync_request_tx, sync_request_rx) = mpsc::channel(config.notification_queue_size);

        info!(member = %self_member, "Replication listener bound");
        Ok(ReplicationServer {
            inner: Arc::new(ServerInner {
                health: ReplicationHealthMonitor::new(config.disconnected_threshold()),
                self_member,
                config,
                http,
                membership,
                registrator,
                listener: Mutex::new(Some(listener)),
                dispatcher_inputs: Mutex::new(Some(DispatcherInputs {
                    broadcast_rx,
                    repair_rx,
                    peer_events_rx,
                })),
                broadcast_tx,
                repair_tx,
                peer_events_tx,
                notification_tx,
                notification_rx: Mutex::new(Some(notification_rx)),
                sync_request_tx,
                sync_request_rx: Mutex::new(Some(sync_request_rx)),
                replicators: DashSet::new(),
                clients: Mutex::new(HashMap::new()),
                next_connection_id: AtomicU64::new(0),
                done: CancellationToken::new(),
            }),
        })
    }

    pub fn self_member(&self) -> &Member {
        &self.inner.self_member
    }

    /// Unhealthy once a replication client stayed disconnected past the
    /// configured threshold
    pub fn health(&self) -> HealthStatus {
        self.inner.health.check()
    }
}

#[async_trait]
impl Replication for ReplicationServer {
    fn get_replicator(
        &self,
        namespace: &Namespace,
    ) -> Result<Arc<dyn Replicator>> {
        if !self.inner.replicators.insert(namespace.clone()) {
            return Err(ReplicationError::ReplicatorExists(namespace.to_string()).into());
        }
        debug!(namespace = %namespace, "Created replicator");
        Ok(Arc::new(NamespaceReplicator {
            namespace: namespace.clone(),
            broadcast_tx: self.inner.broadcast_tx.clone(),
            repair_tx: self.inner.repair_tx.clone(),
            send_timeout: self.inner.config.send_timeout(),
            done: self.inner.done.clone(),
        }))
    }

    fn notifications(&self) -> Option<mpsc::Receiver<InMessage>> {
        self.inner.notification_rx.lock().take()
    }

    fn sync(
        &self,
        wait: Duration,
    ) -> mpsc::Receiver<InMessage> {
        let (tx, rx) = mpsc::channel(self.inner.config.notification_queue_size);
        tokio::spawn(self.inner.clone().sync_then_serve(wait, tx));
        rx
    }

    fn sync_requests(&self) -> Option<mpsc::Receiver<SyncRequest>> {
        self.inner.sync_request_rx.lock().take()
    }

    async fn stop(&self) {
        self.inner.stop();
    }
}

impl ServerInner {
    async fn sync_then_serve(
        self: Arc<Self>,
        wait: Duration,
        out: mpsc::Sender<InMessage>,
    ) {
        let deadline = Instant::now() + wait;
        let mut synced_from = None;

        'poll: loop {
            for member in self.membership.members() {
                if member.id == self.self_member.id {
                    continue;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if self.done.is_cancelled() || remaining.is_zero() {
                    break 'poll;
                }
                let attempt = sync_from_peer(
                    &self.http,
                    &self.self_member.id,
                    &member,
                    &out,
                    remaining,
                    self.config.send_timeout(),
                );
                match attempt.await {
                    Ok(received) => {
                        info!(peer = %member, received, "Synchronized catalog from peer");
                        synced_from = Some(member.id);
                        break 'poll;
                    }
                    Err(e) => debug!(peer = %member, "Sync attempt failed: {:?}", e),
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::select! {
                _ = self.done.cancelled() => break,
                _ = tokio::time::sleep(self.config.sync_poll_interval()) => {}
            }
        }
        if synced_from.is_none() {
            info!("No peer answered a sync request within {:?}", wait);
        }
        drop(out);

        self.start_service();
    }

    fn start_service(self: &Arc<Self>) {
        if self.done.is_cancelled() {
            return;
        }
        let (Some(listener), Some(inputs)) = (self.listener.lock().take(), self.dispatcher_inputs.lock().take()) else {
            warn!("Replication service already started");
            return;
        };

        let done = self.done.clone();
        let server = warp::serve(routes(self.clone()))
            .serve_incoming_with_graceful_shutdown(TcpListenerStream::new(listener), async move {
                done.cancelled().await;
            });
        tokio::spawn(server);

        let dispatcher = Dispatcher::new(self.registrator.clone(), self.config.send_timeout(), self.done.clone());
        tokio::spawn(dispatcher.run(inputs));

        if let Err(e) = self.registrator.join() {
            error!("Failed to join the cluster: {:?}", e);
        }
        self.membership
            .register_listener(Arc::new(MembershipBridge(Arc::downgrade(self))));
        for member in self.membership.members() {
            self.add_client(&member);
        }
        info!(member = %self.self_member, "Replication service started");
    }

    fn add_client(
        &self,
        member: &Member,
    ) {
        if member.id == self.self_member.id || self.done.is_cancelled() {
            return;
        }
        let client = PeerClient::spawn(
            self.self_member.id.clone(),
            member.clone(),
            self.http.clone(),
            self.notification_tx.clone(),
            &self.config,
            &self.done,
        );
        self.health.add_client(member.id.clone(), client.clone());
        if let Some(previous) = self.clients.lock().insert(member.id.clone(), client) {
            debug!(peer = %previous.member(), "Replacing replication client");
            previous.close();
        }
    }

    fn remove_client(
        &self,
        member: &Member,
    ) {
        if let Some(client) = self.clients.lock().remove(&member.id) {
            info!(peer = %client.member(), "Closing replication client");
            client.close();
        }
        self.health.remove_client(&member.id);
    }

    fn stop(&self) {
        if self.done.is_cancelled() {
            return;
        }
        info!(member = %self.self_member, "Stopping replication server");
        self.done.cancel();
        // Never started: release the port now
        self.listener.lock().take();

        let clients: Vec<_> = self.clients.lock().drain().collect();
        for (member_id, client) in clients {
            client.close();
            self.health.remove_client(&member_id);
        }
    }

    /// Member id a request is allowed to stream as
    fn validate_peer(
        &self,
        member_id: Option<String>,
    ) -> std::result::Result<MemberId, Response> {
        let member_id = match member_id {
            Some(id) if !id.trim().is_empty() => MemberId::new(id.trim()),
            _ => return Err(error_reply(StatusCode::BAD_REQUEST, "Missing Member-ID header")),
        };
        if member_id == self.self_member.id {
            return Err(error_reply(
                StatusCode::BAD_REQUEST,
                "Member-ID must not be the serving member",
            ));
        }
        if self.done.is_cancelled() {
            return Err(error_reply(StatusCode::SERVICE_UNAVAILABLE, "Replication server is stopping"));
        }
        Ok(member_id)
    }

    fn accepts_gzip(
        &self,
        accept_encoding: &Option<String>,
    ) -> bool {
        self.config.gzip && accept_encoding.as_deref().is_some_and(|value| value.contains("gzip"))
    }
}

struct MembershipBridge(Weak<ServerInner>);

impl MembershipListener for MembershipBridge {
    fn on_join(
        &self,
        member: &Member,
    ) {
        if let Some(inner) = self.0.upgrade() {
            inner.add_client(member);
        }
    }

    fn on_leave(
        &self,
        member: &Member,
    ) {
        if let Some(inner) = self.0.upgrade() {
            if member.id != inner.self_member.id {
                inner.remove_client(member);
            }
        }
    }
}

//-----------------------------------------------------------
// HTTP

fn routes(inner: Arc<ServerInner>) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let with_inner = warp::any().map(move || inner.clone());

    let replication = warp::path!("v1" / "replication")
        .and(warp::get())
        .and(with_inner.clone())
        .and(warp::header::optional::<String>(MEMBER_ID_HEADER))
        .and(warp::header::optional::<String>("accept-encoding"))
        .then(serve_replication);

    let sync = warp::path!("v1" / "sync")
        .and(warp::get())
        .and(with_inner)
        .and(warp::header::optional::<String>(MEMBER_ID_HEADER))
        .and(warp::header::optional::<String>("accept-encoding"))
        .then(serve_sync);

    replication.or(sync).unify()
}

async fn serve_replication(
    inner: Arc<ServerInner>,
    member_id: Option<String>,
    accept_encoding: Option<String>,
) -> Response {
    let peer = match inner.validate_peer(member_id) {
        Ok(peer) => peer,
        Err(reply) => return reply,
    };
    let gzip = inner.accepts_gzip(&accept_encoding);

    let (events_tx, events_rx) = mpsc::channel(inner.config.peer_queue_size);
    let connection_id = inner.next_connection_id.fetch_add(1, Ordering::Relaxed);
    let stream = PeerStream {
        member_id: peer.clone(),
        connection_id,
        events: events_tx,
    };
    if let Err(e) = send_with_timeout(
        &inner.peer_events_tx,
        PeerEvent::Connected(stream),
        inner.config.send_timeout(),
        "peer",
    )
    .await
    {
        warn!(peer = %peer, "Cannot register peer stream: {:?}", e);
        return error_reply(StatusCode::SERVICE_UNAVAILABLE, "Replication server is busy");
    }
    info!(peer = %peer, gzip, "Peer connected to replication stream");

    let (body_tx, body_rx) = mpsc::channel(inner.config.peer_queue_size);
    tokio::spawn(async move {
        write_event_stream(
            events_rx,
            body_tx,
            gzip,
            inner.config.flush_interval(),
            inner.done.clone(),
        )
        .await;
        info!(peer = %peer, "Peer disconnected from replication stream");
        let closed = PeerEvent::Closed {
            member_id: peer,
            connection_id,
        };
        let _ = send_with_timeout(&inner.peer_events_tx, closed, inner.config.send_timeout(), "peer").await;
    });

    stream_response(body_rx, gzip)
}

async fn serve_sync(
    inner: Arc<ServerInner>,
    member_id: Option<String>,
    accept_encoding: Option<String>,
) -> Response {
    let peer = match inner.validate_peer(member_id) {
        Ok(peer) => peer,
        Err(reply) => return reply,
    };
    let gzip = inner.accepts_gzip(&accept_encoding);

    let (sync_tx, mut sync_rx) = mpsc::channel::<OutMessage>(inner.config.peer_queue_size);
    if let Err(e) = send_with_timeout(&inner.sync_request_tx, sync_tx, inner.config.send_timeout(), "sync request").await {
        warn!(peer = %peer, "Cannot queue sync request: {:?}", e);
        return error_reply(StatusCode::SERVICE_UNAVAILABLE, "Replication server is busy");
    }
    info!(peer = %peer, gzip, "Serving sync request");

    // Catalog exports arrive as messages; number them as SYNC events
    let (events_tx, events_rx) = mpsc::channel(inner.config.peer_queue_size);
    tokio::spawn(async move {
        let mut next_id: u64 = 0;
        while let Some(message) = sync_rx.recv().await {
            let data = match message.to_wire() {
                Ok(data) => data,
                Err(e) => {
                    warn!("Skipping unencodable sync message: {:?}", e);
                    continue;
                }
            };
            let event = SseEvent::new(next_id.to_string(), SYNC_EVENT, data);
            next_id += 1;
            if events_tx.send(event).await.is_err() {
                break;
            }
        }
    });

    let (body_tx, body_rx) = mpsc::channel(inner.config.peer_queue_size);
    let flush_interval = inner.config.flush_interval();
    let done = inner.done.clone();
    tokio::spawn(write_event_stream(events_rx, body_tx, gzip, flush_interval, done));

    stream_response(body_rx, gzip)
}

fn stream_response(
    body_rx: mpsc::Receiver<io::Result<Bytes>>,
    gzip: bool,
) -> Response {
    let mut builder = warp::http::Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if gzip {
        builder = builder.header(CONTENT_ENCODING, "gzip");
    }
    builder
        .body(Body::wrap_stream(ReceiverStream::new(body_rx)))
        .unwrap_or_else(|e| error_reply(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))
}

fn error_reply(
    status: StatusCode,
    message: &str,
) -> Response {
    warp::reply::with_status(message.to_string(), status).into_response()
}

/// Pumps `events` into the response body until the event source closes,
/// the peer goes away, or the server stops
async fn write_event_stream(
    mut events: mpsc::Receiver<SseEvent>,
    body: mpsc::Sender<io::Result<Bytes>>,
    gzip: bool,
    flush_interval: Duration,
    done: CancellationToken,
) {
    let mut writer = StreamWriter::new(gzip);
    let mut ticker = tokio::time::interval(flush_interval);

    loop {
        tokio::select! {
            _ = done.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => {
                    if let Err(e) = writer.write_event(&event) {
                        warn!("Failed to encode event: {:?}", e);
                        return;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if body.is_closed() {
                    return;
                }
                let chunk = match writer.take_chunk() {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("Failed to flush event stream: {:?}", e);
                        return;
                    }
                };
                tokio::select! {
                    _ = done.cancelled() => break,
                    sent = body.send(Ok(chunk)) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    match writer.finish() {
        Ok(tail) if !tail.is_empty() => {
            let _ = body.send(Ok(tail)).await;
        }
        Ok(_) => {}
        Err(e) => warn!("Failed to finish event stream: {:?}", e),
    }
}

/// Event buffer of one response body
enum StreamWriter {
    Plain { buffer: Vec<u8> },
    Gzip { encoder: GzEncoder<Vec<u8>>, dirty: bool },
}

impl StreamWriter {
    fn new(gzip: bool) -> Self {
        if gzip {
            StreamWriter::Gzip {
                encoder: GzEncoder::new(Vec::new(), Compression::default()),
                dirty: false,
            }
        } else {
            StreamWriter::Plain { buffer: Vec::new() }
        }
    }

    fn write_event(
        &mut self,
        event: &SseEvent,
    ) -> io::Result<()> {
        match self {
            StreamWriter::Plain { buffer } => encode_event(event, buffer),
            StreamWriter::Gzip { encoder, dirty } => {
                *dirty = true;
                encode_event(event, encoder)
            }
        }
    }

    /// Bytes produced since the last call, if any
    fn take_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let buffer = match self {
            StreamWriter::Plain { buffer } => buffer,
            StreamWriter::Gzip { encoder, dirty } => {
                if !*dirty {
                    return Ok(None);
                }
                // sync flush: everything written so far becomes decodable
                encoder.flush()?;
                *dirty = false;
                encoder.get_mut()
            }
        };
        if buffer.is_empty() {
            return Ok(None);
        }
        Ok(Some(Bytes::from(std::mem::take(buffer))))
    }

    fn finish(self) -> io::Result<Bytes> {
        match self {
            StreamWriter::Plain { buffer } => Ok(Bytes::from(buffer)),
            StreamWriter::Gzip { encoder, .. } => encoder.finish().map(Bytes::from),
        }
    }
}

//-----------------------------------------------------------
// Dispatcher

struct DispatcherInputs {
    broadcast_rx: mpsc::Receiver<OutMessage>,
    repair_rx: mpsc::Receiver<OutMessage>,
    peer_events_rx: mpsc::Receiver<PeerEvent>,
}

pub(super) struct PeerStream {
    pub(super) member_id: MemberId,
    pub(super) connection_id: u64,
    pub(super) events: mpsc::Sender<SseEvent>,
}

pub(super) enum PeerEvent {
    Connected(PeerStream),
    Closed { member_id: MemberId, connection_id: u64 },
}

pub(super) struct Dispatcher {
    registrator: Arc<dyn Registrator>,
    pub(super) peers: HashMap<MemberId, PeerStream>,
    next_id: u64,
    send_timeout: Duration,
    done: CancellationToken,
}

impl Dispatcher {
    pub(super) fn new(
        registrator: Arc<dyn Registrator>,
        send_timeout: Duration,
        done: CancellationToken,
    ) -> Self {
        Dispatcher {
            registrator,
            peers: HashMap::new(),
            next_id: 0,
            send_timeout,
            done,
        }
    }

    async fn run(
        mut self,
        mut inputs: DispatcherInputs,
    ) {
        let done = self.done.clone();
        loop {
            tokio::select! {
                biased;
                _ = done.cancelled() => break,
                Some(event) = inputs.peer_events_rx.recv() => self.on_peer_event(event),
                Some(message) = inputs.repair_rx.recv() => self.repair(message).await,
                Some(message) = inputs.broadcast_rx.recv() => self.broadcast(message).await,
                else => break,
            }
        }

        self.peers.clear();
        CONNECTED_PEERS.set(0);
        if let Err(e) = self.registrator.leave() {
            warn!("Failed to leave the cluster: {:?}", e);
        }
        info!("Replication dispatcher stopped");
    }

    pub(super) fn on_peer_event(
        &mut self,
        event: PeerEvent,
    ) {
        match event {
            PeerEvent::Connected(stream) => {
                // Dropping the previous sender ends the previous stream
                if self.peers.insert(stream.member_id.clone(), stream).is_some() {
                    info!("Replaced existing replication stream of peer");
                }
            }
            PeerEvent::Closed {
                member_id,
                connection_id,
            } => {
                if self.peers.get(&member_id).map(|p| p.connection_id) == Some(connection_id) {
                    self.peers.remove(&member_id);
                }
            }
        }
        CONNECTED_PEERS.set(self.peers.len() as i64);
    }

    fn remove_peer(
        &mut self,
        member_id: &MemberId,
    ) {
        if self.peers.remove(member_id).is_some() {
            debug!(peer = %member_id, "Removed closed replication stream");
        }
        CONNECTED_PEERS.set(self.peers.len() as i64);
    }

    pub(super) async fn broadcast(
        &mut self,
        message: OutMessage,
    ) {
        let data = match message.to_wire() {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode broadcast message: {:?}", e);
                return;
            }
        };
        self.next_id += 1;
        let event = SseEvent::new(self.next_id.to_string(), REPLICATION_EVENT, data);
        REPLICATION_EVENTS.with_label_values(&[REPLICATION_EVENT]).inc();

        let mut closed = Vec::new();
        for (member_id, peer) in &self.peers {
            if !deliver(peer, event.clone(), self.send_timeout).await {
                closed.push(member_id.clone());
            }
        }
        for member_id in closed {
            self.remove_peer(&member_id);
        }
    }

    pub(super) async fn repair(
        &mut self,
        message: OutMessage,
    ) {
        let Some(target) = message.target.clone() else {
            warn!(namespace = %message.namespace, "Dropping repair message without target");
            return;
        };
        let Some(peer) = self.peers.get(&target) else {
            warn!(peer = %target, "Repair target is not connected");
            REPLICATION_DROPPED_EVENTS.with_label_values(&["repair"]).inc();
            return;
        };
        let data = match message.to_wire() {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode repair message: {:?}", e);
                return;
            }
        };
        REPLICATION_EVENTS.with_label_values(&[REPAIR_EVENT]).inc();
        if !deliver(peer, SseEvent::new("0", REPAIR_EVENT, data), self.send_timeout).await {
            self.remove_peer(&target);
        }
    }
}

/// Hands `event` to a peer stream; false once the stream is gone
async fn deliver(
    peer: &PeerStream,
    event: SseEvent,
    send_timeout: Duration,
) -> bool {
    match peer.events.send_timeout(event, send_timeout).await {
        Ok(()) => true,
        Err(SendTimeoutError::Timeout(_)) => {
            warn!(peer = %peer.member_id, "Peer stream is full, dropping event");
            REPLICATION_DROPPED_EVENTS.with_label_values(&["peer"]).inc();
            true
        }
        Err(SendTimeoutError::Closed(_)) => false,
    }
}
