use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::ReplicationError;
use crate::Result;

/// Bounded hand-off used by every replication channel.
///
/// Fails with [`ReplicationError::SendTimeout`] when the receiver does not
/// make room within `timeout`, and with [`ReplicationError::ChannelClosed`]
/// when the receiver is gone.
pub(crate) async fn send_with_timeout<T>(
    sender: &mpsc::Sender<T>,
    value: T,
    timeout: Duration,
    channel: &'static str,
) -> Result<()> {
    sender.send_timeout(value, timeout).await.map_err(|e| match e {
        SendTimeoutError::Timeout(_) => ReplicationError::SendTimeout {
            channel,
            duration: timeout,
        }
        .into(),
        SendTimeoutError::Closed(_) => ReplicationError::ChannelClosed(channel).into(),
    })
}

/// Doubles `delay`, saturating at `max`
pub(crate) fn next_backoff(
    delay: Duration,
    max: Duration,
) -> Duration {
    delay.saturating_mul(2).min(max)
}
