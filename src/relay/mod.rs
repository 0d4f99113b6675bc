//! Relay engine
//!
//! Turns a routed [`SourceDescriptor`] into a running session. Opening a
//! session acquires the upstream (socket or HTTP response) so failures can
//! be reported to the client before any body bytes are sent; running it
//! copies data into an [`OutputSink`] until the client or upstream ends.

mod http;
mod multicast;
mod sink;

pub use http::{copy_body, open_http, relay_http, upstream_content_type};
pub use multicast::{
    open_multicast_source, relay_multicast, PacketSource, SocketAcquirer, SourceAcquirer,
    UdpPacketSource,
};
pub use sink::{BodyChunk, ChannelSink, OutputSink, SinkClosed, WriterSink};

use crate::config::{SourceDescriptor, SourceKind};
use crate::error::{RelayError, StreamError};
use crate::helper::MULTICAST_CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The client stopped reading
    ClientGone,
    /// The upstream body finished
    UpstreamClosed,
}

/// An opened upstream, ready to relay
#[derive(Debug)]
pub enum Session {
    /// Multicast socket and the read buffer size to use with it
    Multicast {
        /// Open packet source
        source: Box<dyn PacketSource>,
        /// Read buffer size
        buffer_size: usize,
    },
    /// Upstream HTTP response with a success status
    Http {
        /// Response whose body is still unread
        response: reqwest::Response,
    },
}

impl Session {
    /// Content type to answer the client with
    pub fn content_type(&self) -> String {
        match self {
            Session::Multicast { .. } => MULTICAST_CONTENT_TYPE.to_string(),
            Session::Http { response } => upstream_content_type(response)
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        }
    }

    /// Copy upstream data into `sink` until one side ends
    pub async fn run<S>(self, sink: &mut S) -> Result<StreamEnd, StreamError>
    where
        S: OutputSink + ?Sized,
    {
        match self {
            Session::Multicast {
                source,
                buffer_size,
            } => relay_multicast(source.as_ref(), sink, buffer_size).await,
            Session::Http { response } => copy_body(response, sink).await,
        }
    }
}

/// Opens sessions for routed sources
#[derive(Debug, Clone)]
pub struct Relay {
    acquirer: Arc<dyn SourceAcquirer>,
    client: reqwest::Client,
}

impl Relay {
    /// Relay using real multicast sockets
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_acquirer(Arc::new(SocketAcquirer::new()))
    }

    /// Relay using a custom packet source acquirer
    pub fn with_acquirer(acquirer: Arc<dyn SourceAcquirer>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(acquirer, client))
    }

    /// Relay using a custom acquirer and HTTP client
    pub fn with_client(acquirer: Arc<dyn SourceAcquirer>, client: reqwest::Client) -> Self {
        Relay { acquirer, client }
    }

    /// Acquire the upstream for `descriptor`
    pub async fn open(
        &self,
        descriptor: &SourceDescriptor,
        buffer_size: usize,
    ) -> Result<Session, RelayError> {
        match &descriptor.kind {
            SourceKind::Multicast(source) => {
                let source = self.acquirer.open(source)?;
                Ok(Session::Multicast {
                    source,
                    buffer_size,
                })
            }
            SourceKind::Http(url) => {
                let response = open_http(&self.client, url).await?;
                Ok(Session::Http { response })
            }
        }
    }

    /// Open and run a session for one client
    pub async fn serve<S>(
        &self,
        descriptor: &SourceDescriptor,
        remote_addr: &str,
        buffer_size: usize,
        sink: &mut S,
    ) -> Result<StreamEnd, RelayError>
    where
        S: OutputSink + ?Sized,
    {
        let session = self.open(descriptor, buffer_size).await?;
        info!("Serving {} to {}", descriptor.kind, remote_addr);
        let end = session.run(sink).await?;
        info!("Stream {} to {} ended: {:?}", descriptor.kind, remote_addr, end);
        Ok(end)
    }
}
