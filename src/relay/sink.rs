//! Output sinks for relay sessions
//!
//! A sink is the client side of a session. A failed write means the client
//! went away and the session should end normally.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// The client stopped accepting data
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Client disconnected")]
pub struct SinkClosed;

/// Destination for relayed bytes
#[async_trait]
pub trait OutputSink: Send {
    /// Deliver one chunk to the client
    async fn write(&mut self, data: Bytes) -> Result<(), SinkClosed>;
}

/// Chunk type carried by a [`ChannelSink`]
pub type BodyChunk = Result<Bytes, io::Error>;

/// Sink feeding an HTTP response body through a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<BodyChunk>,
}

impl ChannelSink {
    /// Wrap an existing sender
    pub fn new(tx: mpsc::Sender<BodyChunk>) -> Self {
        ChannelSink { tx }
    }

    /// Create a sink and the stream to hand to the response body
    pub fn channel(capacity: usize) -> (Self, ReceiverStream<BodyChunk>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ChannelSink { tx }, ReceiverStream::new(rx))
    }

    /// Terminate the body with an error so the client sees a truncated response
    pub async fn abort(&self, error: io::Error) {
        let _ = self.tx.send(Err(error)).await;
    }

    /// Whether the receiving side is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl OutputSink for ChannelSink {
    async fn write(&mut self, data: Bytes) -> Result<(), SinkClosed> {
        self.tx.send(Ok(data)).await.map_err(|_| SinkClosed)
    }
}

/// Sink writing straight into an async writer
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        WriterSink { writer }
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> OutputSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, data: Bytes) -> Result<(), SinkClosed> {
        self.writer.write_all(&data).await.map_err(|_| SinkClosed)?;
        self.writer.flush().await.map_err(|_| SinkClosed)
    }
}
