//! One accepted inbound connection.

use crate::error::Result;
use crate::messages::StatusHeader;
use crate::wire::WireStream;
use std::net::{IpAddr, TcpStream};

/// An accepted descriptor plus the peer's address; owned exclusively by the
/// worker serving it and closed when dropped.
#[derive(Debug)]
pub struct ServerConnection {
    wire: WireStream,
    peer_ip: IpAddr,
}

impl ServerConnection {
    pub(crate) fn new(stream: TcpStream, peer_ip: IpAddr) -> Self {
        Self {
            wire: WireStream::new(stream),
            peer_ip,
        }
    }

    /// Address of the connected peer.
    pub fn peer_ip(&self) -> IpAddr {
        self.peer_ip
    }

    pub(crate) fn wire(&mut self) -> &mut WireStream {
        &mut self.wire
    }

    /// Send a header-only status reply.
    pub fn reply_status(&mut self, status: &StatusHeader) -> Result<()> {
        self.wire.write_header_only(status)
    }
}
