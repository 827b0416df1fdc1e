use std::io;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use bytes::Bytes;
use futures::Stream;
use futures::TryStreamExt;
use reqwest::header::ACCEPT;
use reqwest::header::CACHE_CONTROL;
use reqwest::RequestBuilder;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ClientConnection;
use super::Decoder;
use super::InMessage;
use crate::utils::next_backoff;
use crate::utils::send_with_timeout;
use crate::Member;
use crate::MemberId;
use crate::NetworkError;
use crate::ReplicationConfig;
use crate::Result;
use crate::REPLICATION_DROPPED_EVENTS;

pub(crate) const MEMBER_ID_HEADER: &str = "Member-ID";
pub(crate) const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

pub(crate) type ResponseReader = StreamReader<Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>, Bytes>;

/// GET request for an event stream of `member`, identifying as `self_id`
pub(crate) fn event_stream_request(
    http: &reqwest::Client,
    url: String,
    self_id: &MemberId,
) -> RequestBuilder {
    http.get(url)
        .header(CACHE_CONTROL, "no-cache")
        .header(ACCEPT, "text/event-stream")
        .header(MEMBER_ID_HEADER, self_id.as_str())
}

/// Sends `request` and wraps a 200 response body into a [`Decoder`]
pub(crate) async fn open_event_stream(request: RequestBuilder) -> Result<Decoder<ResponseReader>> {
    let response = request.send().await.map_err(NetworkError::Http)?;
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(NetworkError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        }
        .into());
    }

    let body = response
        .bytes_stream()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
    let body: Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>> = Box::pin(body);
    Ok(Decoder::new(StreamReader::new(body)))
}

/// Long-lived replication stream reader of one peer.
///
/// Reconnects until closed, backing off exponentially from the base delay
/// (or the delay last requested by the peer through `retry:`).
pub(crate) struct PeerClient {
    member: Member,
    connected: AtomicBool,
    cancel: CancellationToken,
}

impl PeerClient {
    pub(crate) fn spawn(
        self_id: MemberId,
        member: Member,
        http: reqwest::Client,
        notifications: mpsc::Sender<InMessage>,
        config: &ReplicationConfig,
        parent: &CancellationToken,
    ) -> Arc<Self> {
        let client = Arc::new(PeerClient {
            member,
            connected: AtomicBool::new(false),
            cancel: parent.child_token(),
        });
        let reader = StreamReaderTask {
            client: client.clone(),
            self_id,
            http,
            notifications,
            last_event_id: None,
            received: 0,
            retry: config.reconnect_base_delay(),
            max_delay: config.reconnect_max_delay(),
            send_timeout: config.send_timeout(),
        };
        tokio::spawn(reader.run());
        client
    }

    pub(crate) fn member(&self) -> &Member {
        &self.member
    }

    /// Stops reconnecting and drops the current stream
    pub(crate) fn close(&self) {
        self.cancel.cancel();
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl ClientConnection for PeerClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// A stream that delivered an event or stayed open this long counts as
/// healthy and resets the reconnect backoff
const STABLE_CONNECTION: Duration = Duration::from_secs(10);

struct StreamReaderTask {
    client: Arc<PeerClient>,
    self_id: MemberId,
    http: reqwest::Client,
    notifications: mpsc::Sender<InMessage>,
    last_event_id: Option<String>,
    /// Events read from the current connection
    received: u64,
    retry: Duration,
    max_delay: Duration,
    send_timeout: Duration,
}

impl StreamReaderTask {
    async fn run(mut self) {
        let peer = self.client.member.id.clone();
        let mut delay = self.retry;
        loop {
            let attempt = tokio::select! {
                _ = self.client.cancel.cancelled() => break,
                result = self.connect() => result,
            };

            match attempt {
                Ok(decoder) => {
                    self.client.connected.store(true, Ordering::SeqCst);
                    info!(peer = %peer, "Connected to replication peer");

                    let opened = Instant::now();
                    self.received = 0;
                    let result = self.read_events(decoder).await;
                    self.client.connected.store(false, Ordering::SeqCst);
                    match result {
                        Ok(()) => info!(peer = %peer, events = self.received, "Replication stream closed"),
                        Err(e) => warn!(peer = %peer, events = self.received, "Replication stream failed: {:?}", e),
                    }
                    if self.received > 0 || opened.elapsed() >= STABLE_CONNECTION {
                        delay = self.retry;
                    }
                }
                Err(e) => {
                    debug!(peer = %peer, "Failed to connect: {:?}", e);
                }
            }

            debug!(peer = %peer, "Reconnecting in {:?}", delay);
            tokio::select! {
                _ = self.client.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = next_backoff(delay, self.max_delay);
        }
        self.client.connected.store(false, Ordering::SeqCst);
        debug!(peer = %peer, "Replication client stopped");
    }

    async fn connect(&self) -> Result<Decoder<ResponseReader>> {
        let mut request = event_stream_request(&self.http, self.client.member.url("v1/replication"), &self.self_id);
        if let Some(id) = &self.last_event_id {
            request = request.header(LAST_EVENT_ID_HEADER, id.as_str());
        }
        open_event_stream(request).await
    }

    async fn read_events(
        &mut self,
        mut decoder: Decoder<ResponseReader>,
    ) -> Result<()> {
        loop {
            let event = tokio::select! {
                _ = self.client.cancel.cancelled() => return Ok(()),
                event = decoder.decode() => event?,
            };
            let Some(event) = event else {
                return Ok(());
            };

            self.received += 1;
            if !event.id.is_empty() {
                self.last_event_id = Some(event.id.clone());
            }
            if let Some(retry) = event.retry.filter(|retry| *retry > 0) {
                self.retry = Duration::from_millis(retry);
            }
            if event.data.is_empty() {
                continue;
            }

            let message = match InMessage::from_wire(self.client.member.id.clone(), &event.data) {
                Ok(message) => message,
                Err(e) => {
                    warn!(peer = %self.client.member.id, "Skipping malformed replication event: {:?}", e);
                    continue;
                }
            };
            if let Err(e) = send_with_timeout(&self.notifications, message, self.send_timeout, "notification").await {
                REPLICATION_DROPPED_EVENTS.with_label_values(&["notification"]).inc();
                warn!(peer = %self.client.member.id, "Dropping replicated message: {:?}", e);
            }
        }
    }
}
