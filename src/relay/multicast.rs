//! Multicast packet sources
//!
//! Each relay session owns its own UDP socket, bound to the group address
//! and joined on the configured interface. The socket is closed when the
//! source is dropped.

use super::sink::OutputSink;
use super::StreamEnd;
use crate::config::MulticastSource;
use crate::error::{SocketError, StreamError};
use async_trait::async_trait;
use bytes::Bytes;
use socket2::{Domain, InterfaceIndexOrAddress, Protocol, Socket, Type};
use std::fmt::Debug;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;
use tracing::debug;

/// A stream of datagrams for one session
#[async_trait]
pub trait PacketSource: Debug + Send + Sync {
    /// Receive one datagram into `buf`, returning its length
    async fn read_packet(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Address the source is bound to
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Opens packet sources for multicast descriptors
pub trait SourceAcquirer: Debug + Send + Sync {
    /// Open a fresh source for one session
    fn open(&self, source: &MulticastSource) -> Result<Box<dyn PacketSource>, SocketError>;
}

/// Acquirer backed by real UDP sockets
#[derive(Debug, Clone)]
pub struct SocketAcquirer {
    bind_device: bool,
}

impl Default for SocketAcquirer {
    fn default() -> Self {
        SocketAcquirer { bind_device: true }
    }
}

impl SocketAcquirer {
    /// Create an acquirer that pins sockets to their interface where supported
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable SO_BINDTODEVICE (Linux only, needs CAP_NET_RAW)
    pub fn with_bind_device(mut self, enabled: bool) -> Self {
        self.bind_device = enabled;
        self
    }
}

impl SourceAcquirer for SocketAcquirer {
    fn open(&self, source: &MulticastSource) -> Result<Box<dyn PacketSource>, SocketError> {
        let socket = UdpPacketSource::open(source, self.bind_device)?;
        Ok(Box::new(socket))
    }
}

/// Open a real socket for `source` with the default acquirer settings
pub fn open_multicast_source(source: &MulticastSource) -> Result<Box<dyn PacketSource>, SocketError> {
    SocketAcquirer::new().open(source)
}

/// UDP socket receiving one group on one interface
#[derive(Debug)]
pub struct UdpPacketSource {
    socket: UdpSocket,
    group: SocketAddrV4,
    interface: String,
}

impl UdpPacketSource {
    /// Create, bind and join a socket for `source`.
    ///
    /// Must be called from within a tokio runtime. A unicast group address
    /// is bound without a join, which receives datagrams sent straight to it.
    pub fn open(source: &MulticastSource, bind_device: bool) -> Result<Self, SocketError> {
        let group = source.group;
        if group.port() == 0 {
            return Err(SocketError::AddressInvalid(group.to_string()));
        }

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(SocketError::Create)?;
        socket.set_reuse_address(true).map_err(SocketError::Create)?;

        if bind_device {
            pin_to_device(&socket, &source.interface);
        }

        socket
            .bind(&SocketAddr::V4(group).into())
            .map_err(|e| SocketError::Bind {
                addr: group,
                source: e,
            })?;

        if group.ip().is_multicast() {
            let index = nix::net::if_::if_nametoindex(source.interface.as_str()).map_err(|e| {
                SocketError::InterfaceNotFound {
                    interface: source.interface.clone(),
                    source: io::Error::from(e),
                }
            })?;

            socket
                .join_multicast_v4_n(group.ip(), &InterfaceIndexOrAddress::Index(index))
                .map_err(|e| SocketError::Join {
                    group,
                    interface: source.interface.clone(),
                    source: e,
                })?;
            debug!("Joined {} on {} (index {})", group, source.interface, index);
        } else {
            debug!("{} is not a multicast group, receiving unicast", group.ip());
        }

        socket.set_nonblocking(true).map_err(SocketError::Create)?;
        let socket = UdpSocket::from_std(socket.into()).map_err(SocketError::Create)?;

        let local = socket.local_addr().map_err(SocketError::Create)?;
        if local != SocketAddr::V4(group) {
            return Err(SocketError::Bind {
                addr: group,
                source: io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("socket bound to {} instead", local),
                ),
            });
        }

        Ok(UdpPacketSource {
            socket,
            group,
            interface: source.interface.clone(),
        })
    }

    /// Group this socket receives
    pub fn group(&self) -> SocketAddrV4 {
        self.group
    }

    /// Interface the group was joined on
    pub fn interface(&self) -> &str {
        &self.interface
    }
}

#[async_trait]
impl PacketSource for UdpPacketSource {
    async fn read_packet(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn pin_to_device(socket: &Socket, interface: &str) {
    if let Err(e) = socket.bind_device(Some(interface.as_bytes())) {
        debug!("Not pinning socket to {}: {}", interface, e);
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn pin_to_device(_socket: &Socket, _interface: &str) {}

/// Copy datagrams from `source` to `sink` until either side ends.
///
/// Each datagram becomes one chunk. Returns [`StreamEnd::ClientGone`] when
/// the sink refuses a write; a read error ends the session with an error.
pub async fn relay_multicast<S>(
    source: &dyn PacketSource,
    sink: &mut S,
    buffer_size: usize,
) -> Result<StreamEnd, StreamError>
where
    S: OutputSink + ?Sized,
{
    let mut buf = vec![0u8; buffer_size];

    loop {
        let n = source
            .read_packet(&mut buf)
            .await
            .map_err(StreamError::Read)?;
        if n == 0 {
            continue;
        }

        if sink.write(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
            debug!("Client gone, closing source");
            return Ok(StreamEnd::ClientGone);
        }
    }
}
