//! Outbound delivery of response envelopes.

use crate::protocol::{encode_response, Response};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Destination for responses produced by the broker.
pub trait ResponseSink: Send {
    /// Deliver one response. Delivery failures are the sink's to report; the
    /// broker has already finished with the request.
    fn send(&mut self, response: Response);
}

impl ResponseSink for mpsc::UnboundedSender<Response> {
    fn send(&mut self, response: Response) {
        let request_id = response.request_id();
        if mpsc::UnboundedSender::send(self, response).is_err() {
            tracing::debug!(%request_id, "response receiver gone, dropping response");
        }
    }
}

/// Drain `responses` into `writer` as newline-delimited JSON, one flushed
/// line per response, until every sender is dropped.
///
/// Runs as its own task so a slow reader on the other end never blocks the
/// broker's event loop. Returns the number of lines written.
pub async fn write_ndjson<W>(
    mut writer: W,
    mut responses: mpsc::UnboundedReceiver<Response>,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(response) = responses.recv().await {
        let mut line = encode_response(&response)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        written += 1;
    }
    tracing::debug!(written, "response stream closed");
    Ok(written)
}
