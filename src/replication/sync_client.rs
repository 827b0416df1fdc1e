use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;
use tracing::warn;

use super::event_stream_request;
use super::open_event_stream;
use super::InMessage;
use crate::utils::send_with_timeout;
use crate::Member;
use crate::MemberId;
use crate::NetworkError;
use crate::Result;

/// Pulls the full catalog state of `member` once.
///
/// Fails only when the stream cannot be opened within `open_timeout`; a
/// stream interrupted midway still counts as a sync with whatever was
/// received.
pub(crate) async fn sync_from_peer(
    http: &reqwest::Client,
    self_id: &MemberId,
    member: &Member,
    out: &mpsc::Sender<InMessage>,
    open_timeout: Duration,
    send_timeout: Duration,
) -> Result<usize> {
    let request = event_stream_request(http, member.url("v1/sync"), self_id);
    // A peer still running its own sync accepts connections but answers
    // nothing until it starts serving
    let mut decoder = tokio::time::timeout(open_timeout, open_event_stream(request))
        .await
        .map_err(|_| NetworkError::Connect(format!("sync stream of {} not opened within {:?}", member, open_timeout)))??;

    let mut received = 0;
    loop {
        let event = match decoder.decode().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(e) => {
                warn!(peer = %member, received, "Sync stream interrupted: {:?}", e);
                break;
            }
        };
        if event.data.is_empty() {
            continue;
        }
        match InMessage::from_wire(member.id.clone(), &event.data) {
            Ok(message) => {
                send_with_timeout(out, message, send_timeout, "sync").await?;
                received += 1;
            }
            Err(e) => warn!(peer = %member, "Skipping malformed sync event: {:?}", e),
        }
    }
    debug!(peer = %member, received, "Sync stream finished");
    Ok(received)
}
