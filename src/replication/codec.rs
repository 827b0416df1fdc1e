//! Server-sent events framing.
//!
//! An event is a block of `field: value` lines terminated by a blank line.
//! Recognised fields are `id`, `event`, `data` and `retry`; lines starting
//! with `:` are comments. Multi-line values are split into one field line
//! per line and joined back with `\n` when decoding.

use std::io;
use std::io::Write;

use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;

use crate::NetworkError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub id: String,
    pub event: String,
    pub data: String,
    /// Reconnect delay in milliseconds requested by the server
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn new(
        id: impl Into<String>,
        event: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        SseEvent {
            id: id.into(),
            event: event.into(),
            data: data.into(),
            retry: None,
        }
    }
}

/// Writes `event` to `w`; empty fields are omitted
pub fn encode_event<W: Write>(
    event: &SseEvent,
    w: &mut W,
) -> io::Result<()> {
    write_field(w, "id", &event.id)?;
    write_field(w, "event", &event.event)?;
    if let Some(retry) = event.retry {
        write_field(w, "retry", &retry.to_string())?;
    }
    write_field(w, "data", &event.data)?;
    w.write_all(b"\n")
}

fn write_field<W: Write>(
    w: &mut W,
    name: &str,
    value: &str,
) -> io::Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    for line in value.split('\n') {
        w.write_all(name.as_bytes())?;
        w.write_all(b": ")?;
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

/// Incremental event reader over a buffered byte stream
pub struct Decoder<R> {
    reader: R,
    line: String,
}

impl<R: AsyncBufRead + Unpin> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Decoder {
            reader,
            line: String::new(),
        }
    }

    /// Next event, or `None` when the stream ends between events.
    ///
    /// A stream ending in the middle of an event is an error.
    pub async fn decode(&mut self) -> Result<Option<SseEvent>, NetworkError> {
        if self.reader.fill_buf().await?.is_empty() {
            return Ok(None);
        }

        let mut event = SseEvent::default();
        let mut data: Option<String> = None;
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Err(NetworkError::Decode("stream ended inside an event".to_string()));
            }
            let line = self.line.trim_end_matches('\n').trim_end_matches('\r');
            if line.is_empty() {
                break;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "id" => event.id = value.to_string(),
                "event" => event.event = value.to_string(),
                "data" => match data.as_mut() {
                    Some(buffer) => {
                        buffer.push('\n');
                        buffer.push_str(value);
                    }
                    None => data = Some(value.to_string()),
                },
                "retry" => event.retry = value.trim().parse().ok(),
                _ => {}
            }
        }
        event.data = data.unwrap_or_default();
        Ok(Some(event))
    }
}
