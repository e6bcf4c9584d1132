//! Single-writer outbound path
//!
//! The turn loop and the broadcast drain never touch the connection
//! directly. Both enqueue whole frames on an `Outbound` handle, and one
//! writer task owns the sink and writes frames one at a time.

use super::transport::{FrameSink, TransportError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cloneable handle for enqueueing outbound frames
#[derive(Clone)]
pub struct Outbound {
    tx: mpsc::Sender<String>,
}

impl Outbound {
    /// Queue a frame; fails once the writer has stopped
    pub async fn send(&self, frame: impl Into<String>) -> Result<(), TransportError> {
        self.tx
            .send(frame.into())
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// Start the writer task. It runs until every `Outbound` clone is dropped
/// (flushing what was queued) or a write fails, in which case `on_failure`
/// is cancelled so the session shuts down.
pub fn spawn_writer<W>(
    sink: W,
    capacity: usize,
    on_failure: CancellationToken,
) -> (Outbound, JoinHandle<Result<(), TransportError>>)
where
    W: FrameSink + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(write_loop(sink, rx, on_failure));
    (Outbound { tx }, task)
}

async fn write_loop<W: FrameSink>(
    mut sink: W,
    mut rx: mpsc::Receiver<String>,
    on_failure: CancellationToken,
) -> Result<(), TransportError> {
    let mut result = Ok(());

    while let Some(frame) = rx.recv().await {
        if let Err(e) = sink.send_frame(frame).await {
            tracing::warn!(error = %e, "Outbound write failed, closing session");
            on_failure.cancel();
            result = Err(e);
            break;
        }
    }

    rx.close();
    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "Error while closing connection");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    #[tokio::test]
    async fn test_concurrent_writers_never_interleave() {
        let (sink, probe) = RecordingSink::chunked(3);
        let (outbound, writer) = spawn_writer(sink, 4, CancellationToken::new());

        // One task stands in for the turn loop, the other for the broadcast drain
        let turn_loop = {
            let outbound = outbound.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    outbound.send(format!("reply-{i}-{}", "r".repeat(40))).await.unwrap();
                }
            })
        };
        let drain = {
            let outbound = outbound.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    outbound.send(format!("broadcast-{i}-{}", "b".repeat(40))).await.unwrap();
                }
            })
        };
        turn_loop.await.unwrap();
        drain.await.unwrap();
        drop(outbound);
        writer.await.unwrap().unwrap();

        let frames = probe.frames();
        assert_eq!(frames.len(), 100);
        for frame in &frames {
            let intact = (frame.starts_with("reply-") && frame.ends_with(&"r".repeat(40)))
                || (frame.starts_with("broadcast-") && frame.ends_with(&"b".repeat(40)));
            assert!(intact, "corrupted frame: {frame}");
        }
        // Per-producer order is preserved
        let replies: Vec<_> = frames.iter().filter(|f| f.starts_with("reply-")).collect();
        assert!(replies[0].starts_with("reply-0-"));
        assert!(replies[49].starts_with("reply-49-"));
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn test_queued_frames_flushed_before_close() {
        let (sink, probe) = RecordingSink::chunked(64);
        let (outbound, writer) = spawn_writer(sink, 8, CancellationToken::new());
        outbound.send("one").await.unwrap();
        outbound.send("two").await.unwrap();
        drop(outbound);

        writer.await.unwrap().unwrap();
        assert_eq!(probe.frames(), ["one", "two"]);
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn test_write_failure_cancels_session() {
        let (sink, probe) = RecordingSink::failing_after(1);
        let token = CancellationToken::new();
        let (outbound, writer) = spawn_writer(sink, 8, token.clone());

        outbound.send("ok").await.unwrap();
        outbound.send("boom").await.unwrap();
        let result = writer.await.unwrap();

        assert!(matches!(result, Err(TransportError::Write(_))));
        assert!(token.is_cancelled());
        assert_eq!(probe.frames(), ["ok"]);
        assert!(probe.is_closed());
        assert_eq!(outbound.send("late").await, Err(TransportError::Closed));
    }
}
